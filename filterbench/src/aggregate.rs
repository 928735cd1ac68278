//! Report aggregation.
//!
//! Reduces a directory of run reports to a short list of [`SummaryRow`]s:
//! the most recent `keep_baselines` baseline reports in file-name order,
//! followed by at most one row for the most recent multi-filter report.
//! Histogram micro-benchmarks are not summarised.

use std::fs;
use std::path::{Path, PathBuf};

use filterbench_core::{BenchResult, Layout};
use serde::{Deserialize, Serialize};

use crate::report::{
    BaselineReport, ChainEntry, MultiFilterReport, Report, ReportCategory, ShardSummary,
};

/// File the summary is written to inside the report directory.
pub const SUMMARY_FILE: &str = "summary.json";

/// One report as found on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportEntry {
    /// File name, e.g. `baseline-1700000000000.json`.
    pub file_name: String,
    /// Category parsed from the file name.
    pub category: ReportCategory,
    /// Timestamp parsed from the file name.
    pub epoch_millis: u64,
    /// Decoded report.
    pub report: Report,
}

impl ReportEntry {
    /// Build an entry from a report file name, or `None` if the name is not a
    /// report file name.
    pub fn new(file_name: impl Into<String>, report: Report) -> Option<Self> {
        let file_name = file_name.into();
        let (category, epoch_millis) = ReportCategory::parse_file_name(&file_name)?;
        Some(Self {
            file_name,
            category,
            epoch_millis,
            report,
        })
    }
}

/// One line of the summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRow {
    /// Human-readable description of the run.
    pub label: String,
    /// Ingest latency.
    pub ingest: String,
    /// Index build latency (baselines).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    /// Filter latency (baselines).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    /// Filter chain (multi-filter).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_chain: Option<String>,
    /// Clear latency (baselines).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clear: Option<String>,
    /// Clear chain (multi-filter).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clear_chain: Option<String>,
    /// Shard flushes (multi-filter).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shard_flushes: Option<u64>,
    /// Rows written back by shard flushes (multi-filter).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shard_rows: Option<u64>,
    /// Source report file name.
    pub report: String,
}

/// Format a latency, `n/a` when the operation failed.
pub fn fmt_ms(ms: Option<f64>) -> String {
    match ms {
        Some(ms) => format!("{ms:.2}ms"),
        None => "n/a".to_string(),
    }
}

/// `dim0:1.23ms → dim1:0.45ms`, in chain order.
pub fn fmt_chain(chain: &[ChainEntry]) -> String {
    chain
        .iter()
        .map(|e| format!("{}:{}", e.dim, fmt_ms(e.ms)))
        .collect::<Vec<_>>()
        .join(" → ")
}

fn layout_label(columnar: bool) -> &'static str {
    if columnar {
        Layout::Columnar.label()
    } else {
        Layout::Rows.label()
    }
}

fn baseline_row(file_name: &str, report: &BaselineReport) -> SummaryRow {
    let mut label = format!(
        "baseline {} {}x{}",
        layout_label(report.columnar),
        report.rows,
        report.dimensions
    );
    if let Some(strategy) = report.clear_strategy {
        label.push_str(&format!(" ({} clear)", strategy.label()));
    }
    SummaryRow {
        label,
        ingest: fmt_ms(report.ingest_ms),
        index: Some(fmt_ms(report.index.ms)),
        filter: Some(fmt_ms(report.filter.ms)),
        filter_chain: None,
        clear: Some(fmt_ms(report.clear_ms)),
        clear_chain: None,
        shard_flushes: None,
        shard_rows: None,
        report: file_name.to_string(),
    }
}

fn multi_filter_row(file_name: &str, report: &MultiFilterReport) -> SummaryRow {
    let shard = report.shard_summary.unwrap_or_default();
    SummaryRow {
        label: format!(
            "multi-filter {} {}x{}",
            layout_label(report.columnar),
            report.rows,
            report.dimensions
        ),
        ingest: fmt_ms(report.ingest_ms),
        index: None,
        filter: None,
        filter_chain: Some(fmt_chain(&report.filters)),
        clear: None,
        clear_chain: Some(fmt_chain(&report.clears)),
        shard_flushes: Some(shard.total_flushes),
        shard_rows: Some(shard.total_rows),
        report: file_name.to_string(),
    }
}

/// Reduces reports to summary rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportAggregator {
    keep_baselines: usize,
}

impl Default for ReportAggregator {
    fn default() -> Self {
        Self { keep_baselines: 6 }
    }
}

impl ReportAggregator {
    /// Keep the most recent `keep_baselines` baselines.
    pub fn new(keep_baselines: usize) -> Self {
        Self { keep_baselines }
    }

    /// Summarise `entries`.
    ///
    /// Baselines are ordered by file name and the last `keep_baselines` kept;
    /// the multi-filter report with the newest timestamp is appended after
    /// them. A multi-filter report without a shard summary is summarised with
    /// zeroed counters.
    pub fn aggregate(&self, entries: &[ReportEntry]) -> Vec<SummaryRow> {
        let mut baselines: Vec<(&str, &BaselineReport)> = Vec::new();
        let mut latest_multi: Option<(&ReportEntry, &MultiFilterReport)> = None;

        for entry in entries {
            match (&entry.report, entry.category) {
                (Report::Baseline(report), ReportCategory::Baseline) => {
                    baselines.push((entry.file_name.as_str(), report));
                }
                (Report::MultiFilter(report), category) if category.is_multi_filter() => {
                    let newer = latest_multi.is_none_or(|(current, _)| {
                        (entry.epoch_millis, &entry.file_name)
                            > (current.epoch_millis, &current.file_name)
                    });
                    if newer {
                        latest_multi = Some((entry, report));
                    }
                }
                (Report::Micro(_), ReportCategory::MicroHistogram) => {}
                _ => tracing::warn!(
                    "Skipping {}: shape does not match category {}",
                    entry.file_name,
                    entry.category
                ),
            }
        }

        baselines.sort_by(|a, b| a.0.cmp(b.0));
        let skip = baselines.len().saturating_sub(self.keep_baselines);
        let mut rows: Vec<SummaryRow> = baselines
            .into_iter()
            .skip(skip)
            .map(|(name, report)| baseline_row(name, report))
            .collect();
        if let Some((entry, report)) = latest_multi {
            rows.push(multi_filter_row(&entry.file_name, report));
        }
        rows
    }

    /// Read every report file in `dir` and summarise them.
    ///
    /// Files that are not named like reports are ignored; report files that
    /// fail to decode are logged and skipped.
    pub fn aggregate_dir(&self, dir: impl AsRef<Path>) -> BenchResult<Vec<SummaryRow>> {
        let entries = read_reports(dir.as_ref())?;
        Ok(self.aggregate(&entries))
    }
}

/// Load every report file from `dir`.
pub fn read_reports(dir: &Path) -> BenchResult<Vec<ReportEntry>> {
    let mut entries = Vec::new();
    for item in fs::read_dir(dir)? {
        let item = item?;
        let file_name = item.file_name().to_string_lossy().into_owned();
        if ReportCategory::parse_file_name(&file_name).is_none() {
            continue;
        }
        let bytes = fs::read(item.path())?;
        match Report::from_slice(&bytes) {
            Ok(report) => entries.extend(ReportEntry::new(file_name, report)),
            Err(err) => tracing::warn!("Skipping {}: {}", file_name, err),
        }
    }
    Ok(entries)
}

/// Write `rows` to `summary.json` in `dir`, replacing any previous summary.
pub fn write_summary(dir: impl AsRef<Path>, rows: &[SummaryRow]) -> BenchResult<PathBuf> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;
    let path = dir.join(SUMMARY_FILE);
    let tmp = dir.join(format!(".{SUMMARY_FILE}.tmp"));
    fs::write(&tmp, serde_json::to_vec_pretty(rows)?)?;
    fs::rename(&tmp, &path)?;
    tracing::info!("Wrote summary of {} reports to {}", rows.len(), path.display());
    Ok(path)
}
