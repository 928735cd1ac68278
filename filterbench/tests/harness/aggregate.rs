//! Aggregation over report directories.

use std::fs;

use filterbench::aggregate::{SUMMARY_FILE, read_reports};
use filterbench::report::{BaselineReport, DirectorySink, Latency};
use filterbench::{Report, ReportAggregator, ReportCategory, ReportSink, SummaryRow, write_summary};
use serde_json::json;
use tempfile::TempDir;

fn baseline(timestamp: u64) -> Report {
    Report::Baseline(BaselineReport {
        timestamp,
        rows: 100_000,
        dimensions: 10,
        columnar: timestamp % 2 == 0,
        ingest_ms: Some(12.5),
        index: Latency { ms: Some(3.25) },
        filter: Latency { ms: Some(0.75) },
        clear_ms: Some(0.5),
        clear_strategy: None,
        samples: Vec::new(),
    })
}

#[test]
fn test_seven_baselines_keep_latest_six() {
    let dir = TempDir::new().unwrap();
    let mut sink = DirectorySink::new(dir.path()).unwrap();
    for i in 1..=7u64 {
        sink.write(ReportCategory::Baseline, &baseline(1_700_000_000_000 + i))
            .unwrap();
    }

    let rows = ReportAggregator::default().aggregate_dir(dir.path()).unwrap();
    let files: Vec<&str> = rows.iter().map(|r| r.report.as_str()).collect();
    let expected: Vec<String> = (2..=7u64)
        .map(|i| format!("baseline-{}.json", 1_700_000_000_000 + i))
        .collect();
    assert_eq!(files, expected);
    assert!(rows.iter().all(|r| r.index.as_deref() == Some("3.25ms")));
}

#[test]
fn test_multi_filter_without_shard_summary() {
    let dir = TempDir::new().unwrap();
    let raw = json!({
        "timestamp": 1_700_000_000_500u64,
        "rows": 100000,
        "dimensions": 10,
        "ingestMs": 40.0,
        "filters": [{ "dim": "dim0", "ms": 1.5 }, { "dim": "dim1", "ms": 2.25 }],
        "clears": [{ "dim": "dim1", "ms": 0.5 }, { "dim": "dim0", "ms": 0.25 }]
    });
    fs::write(
        dir.path().join("multi-rows-1700000000500.json"),
        serde_json::to_vec(&raw).unwrap(),
    )
    .unwrap();

    let rows = ReportAggregator::default().aggregate_dir(dir.path()).unwrap();
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.shard_flushes, Some(0));
    assert_eq!(row.shard_rows, Some(0));
    assert_eq!(row.filter_chain.as_deref(), Some("dim0:1.50ms → dim1:2.25ms"));
    assert_eq!(row.clear_chain.as_deref(), Some("dim1:0.50ms → dim0:0.25ms"));

    let value = serde_json::to_value(row).unwrap();
    assert_eq!(value["shardFlushes"], 0);
    assert_eq!(value["shardRows"], 0);
}

#[test]
fn test_unrelated_and_broken_files_skipped() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("notes.txt"), "hello").unwrap();
    fs::write(dir.path().join("baseline-1.json"), "{ \"timestamp\": 1 }").unwrap();
    let mut sink = DirectorySink::new(dir.path()).unwrap();
    sink.write(ReportCategory::Baseline, &baseline(2)).unwrap();

    let entries = read_reports(dir.path()).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].file_name, "baseline-2.json");
}

#[test]
fn test_summary_file_round_trips() {
    let dir = TempDir::new().unwrap();
    let mut sink = DirectorySink::new(dir.path()).unwrap();
    sink.write(ReportCategory::Baseline, &baseline(10)).unwrap();
    let rows = ReportAggregator::default().aggregate_dir(dir.path()).unwrap();

    let path = write_summary(dir.path(), &rows).unwrap();
    assert_eq!(path.file_name().unwrap(), SUMMARY_FILE);
    let read: Vec<SummaryRow> = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
    assert_eq!(read, rows);

    // the summary itself is not mistaken for a report
    let again = ReportAggregator::default().aggregate_dir(dir.path()).unwrap();
    assert_eq!(again, rows);
}
