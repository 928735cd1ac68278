//! Run reports.
//!
//! A report is one run's complete output. Three shapes exist on disk:
//!
//! | Shape | Distinguishing field | Category file prefixes |
//! |-------|----------------------|------------------------|
//! | [`BaselineReport`] | `index` | `baseline` |
//! | [`MultiFilterReport`] | `filters` | `multi-simd-profile`, `multi-rows`, `multi-columnar` |
//! | [`MicroReport`] | `histograms` | `micro-histogram` |
//!
//! Decoding goes through [`Report::from_value`], which classifies by shape
//! once at the boundary; callers then work with the closed [`Report`] enum.

pub mod sink;

use std::fmt;

use filterbench_core::{BenchError, BenchResult, ClearStrategy};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use sink::{DirectorySink, MemorySink, ReportSink, epoch_millis};

/// Background reclamation counters observed during a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShardSummary {
    /// Shard flushes that wrote bins back.
    pub total_flushes: u64,
    /// Flushes forced by slot eviction.
    pub total_evictions: u64,
    /// Rows written back by all flushes.
    pub total_rows: u64,
}

/// One measured operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingSample {
    /// Operation name, e.g. `Ingest (columnar)`.
    pub name: String,
    /// Rows in the dataset the operation ran against.
    pub dataset_size: usize,
    /// Elapsed milliseconds; absent when the operation failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<f64>,
    /// Failure reason; present only when the operation failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TimingSample {
    /// A successful sample.
    pub fn succeeded(name: impl Into<String>, dataset_size: usize, elapsed_ms: f64) -> Self {
        Self {
            name: name.into(),
            dataset_size,
            elapsed_ms: Some(elapsed_ms),
            error: None,
        }
    }

    /// A failed sample carrying an error marker instead of a time.
    pub fn failed(name: impl Into<String>, dataset_size: usize, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dataset_size,
            elapsed_ms: None,
            error: Some(error.into()),
        }
    }

    /// Whether the operation completed.
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

impl fmt::Display for TimingSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.elapsed_ms, &self.error) {
            (Some(ms), None) => write!(f, "{} [{} rows]: {:.3}ms", self.name, self.dataset_size, ms),
            (_, Some(err)) => write!(f, "{} [{} rows]: FAILED ({})", self.name, self.dataset_size, err),
            (None, None) => write!(f, "{} [{} rows]: n/a", self.name, self.dataset_size),
        }
    }
}

/// A single latency wrapped as `{ "ms": ... }`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Latency {
    /// Elapsed milliseconds; `null` when the operation failed.
    pub ms: Option<f64>,
}

/// One link of a filter or clear chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainEntry {
    /// Dimension label.
    pub dim: String,
    /// Elapsed milliseconds; `null` when the operation failed.
    pub ms: Option<f64>,
}

/// Single-filter baseline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaselineReport {
    /// Epoch milliseconds at which the run finished.
    pub timestamp: u64,
    /// Row count.
    pub rows: usize,
    /// Dimension count.
    pub dimensions: usize,
    /// Whether the dataset was ingested in columnar form.
    pub columnar: bool,
    /// Ingest latency.
    pub ingest_ms: Option<f64>,
    /// Index build latency.
    pub index: Latency,
    /// Filter latency.
    pub filter: Latency,
    /// Clear latency.
    pub clear_ms: Option<f64>,
    /// Strategy used for the clear, when recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clear_strategy: Option<ClearStrategy>,
    /// Every sample taken during the run, failures included.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub samples: Vec<TimingSample>,
}

/// Multi-filter chain run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiFilterReport {
    /// Epoch milliseconds at which the run finished.
    pub timestamp: u64,
    /// Row count.
    pub rows: usize,
    /// Dimension count.
    pub dimensions: usize,
    /// Whether the dataset was ingested in columnar form.
    #[serde(default)]
    pub columnar: bool,
    /// Ingest latency.
    pub ingest_ms: Option<f64>,
    /// Filter latencies, one per dimension, in application order.
    pub filters: Vec<ChainEntry>,
    /// Clear latencies, one per dimension, in application order.
    pub clears: Vec<ChainEntry>,
    /// Reclamation counters; older reports may omit them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shard_summary: Option<ShardSummary>,
    /// Every sample taken during the run, failures included.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub samples: Vec<TimingSample>,
}

/// One histogram width measured by the micro-benchmark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MicroEntry {
    /// Histogram bin count.
    pub bins: usize,
    /// Bin ids accumulated.
    pub rows: usize,
    /// Elapsed milliseconds.
    pub ms: f64,
    /// Slot flushes.
    pub flushes: u64,
    /// Slot evictions.
    pub evictions: u64,
}

/// Histogram accumulation micro-benchmark run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MicroReport {
    /// Epoch milliseconds at which the run finished.
    pub timestamp: u64,
    /// One entry per histogram width.
    pub histograms: Vec<MicroEntry>,
}

/// Any report, classified by shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Report {
    /// Single-filter baseline.
    Baseline(BaselineReport),
    /// Multi-filter chain.
    MultiFilter(MultiFilterReport),
    /// Histogram micro-benchmark.
    Micro(MicroReport),
}

impl Report {
    /// Classify and decode a parsed report.
    pub fn from_value(value: Value) -> BenchResult<Self> {
        let Some(object) = value.as_object() else {
            return Err(BenchError::InvalidReport("report is not an object".to_string()));
        };
        if object.get("filters").is_some_and(Value::is_array) {
            Ok(Report::MultiFilter(serde_json::from_value(value)?))
        } else if object.contains_key("index") {
            Ok(Report::Baseline(serde_json::from_value(value)?))
        } else if object.get("histograms").is_some_and(Value::is_array) {
            Ok(Report::Micro(serde_json::from_value(value)?))
        } else {
            let keys: Vec<&str> = object.keys().map(String::as_str).collect();
            Err(BenchError::InvalidReport(format!(
                "unrecognised report shape with fields {keys:?}"
            )))
        }
    }

    /// Decode JSON bytes.
    pub fn from_slice(bytes: &[u8]) -> BenchResult<Self> {
        Self::from_value(serde_json::from_slice(bytes)?)
    }

    /// Epoch milliseconds at which the run finished.
    pub fn timestamp(&self) -> u64 {
        match self {
            Report::Baseline(r) => r.timestamp,
            Report::MultiFilter(r) => r.timestamp,
            Report::Micro(r) => r.timestamp,
        }
    }
}

/// Report category, which also names report files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportCategory {
    /// Single-filter baselines.
    Baseline,
    /// Multi-filter chain with the wide-histogram engine profile.
    MultiSimdProfile,
    /// Multi-filter chain over row-form input.
    MultiRows,
    /// Multi-filter chain over columnar input.
    MultiColumnar,
    /// Histogram accumulation micro-benchmark.
    MicroHistogram,
}

impl ReportCategory {
    /// Every category.
    pub const ALL: [ReportCategory; 5] = [
        ReportCategory::Baseline,
        ReportCategory::MultiSimdProfile,
        ReportCategory::MultiRows,
        ReportCategory::MultiColumnar,
        ReportCategory::MicroHistogram,
    ];

    /// File-name prefix.
    pub fn as_str(self) -> &'static str {
        match self {
            ReportCategory::Baseline => "baseline",
            ReportCategory::MultiSimdProfile => "multi-simd-profile",
            ReportCategory::MultiRows => "multi-rows",
            ReportCategory::MultiColumnar => "multi-columnar",
            ReportCategory::MicroHistogram => "micro-histogram",
        }
    }

    /// Whether reports in this category are multi-filter chains.
    pub fn is_multi_filter(self) -> bool {
        matches!(
            self,
            ReportCategory::MultiSimdProfile
                | ReportCategory::MultiRows
                | ReportCategory::MultiColumnar
        )
    }

    /// `<category>-<epochMillis>.json`
    pub fn file_name(self, epoch_millis: u64) -> String {
        format!("{}-{}.json", self.as_str(), epoch_millis)
    }

    /// Parse a report file name back into its category and timestamp.
    pub fn parse_file_name(name: &str) -> Option<(ReportCategory, u64)> {
        let stem = name.strip_suffix(".json")?;
        let (prefix, millis) = stem.rsplit_once('-')?;
        let millis = millis.parse().ok()?;
        let category = Self::ALL.into_iter().find(|c| c.as_str() == prefix)?;
        Some((category, millis))
    }
}

impl fmt::Display for ReportCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
