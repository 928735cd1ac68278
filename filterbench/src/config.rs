//! Harness configuration.
//!
//! Loaded from an optional JSON file (camelCase keys, every field optional)
//! and then overridden by command-line flags.
//!
//! ```json
//! { "seed": 7, "idleTimeoutMs": 5000, "rows": 50000, "reportDir": "bench-results" }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use filterbench_core::{BenchError, BenchResult};
use serde::{Deserialize, Serialize};

use crate::engine::EngineConfig;

/// Settings for a suite run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HarnessConfig {
    /// Dataset and scenario seed.
    pub seed: u64,
    /// Bound on each quiescence wait, in milliseconds.
    pub idle_timeout_ms: u64,
    /// Bound on each suite step, in milliseconds.
    pub step_timeout_ms: u64,
    /// Directory reports and the summary are written to.
    pub report_dir: PathBuf,
    /// Baseline reports kept by the aggregator.
    pub keep_baselines: usize,
    /// Rows in the standard datasets.
    pub rows: usize,
    /// Rows in the large-dataset variants.
    pub large_rows: usize,
    /// Dimensions per dataset.
    pub dimensions: usize,
    /// Dimensions filtered by the multi-filter chains.
    pub chain_length: usize,
    /// Histogram bins per dimension.
    pub bins: u16,
    /// Mutating commands between reclamation cycles (0 disables).
    pub reclaim_every: usize,
    /// Fail a step on its first failed sample instead of recording it.
    pub abort_on_first_failure: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            idle_timeout_ms: 30_000,
            step_timeout_ms: 600_000,
            report_dir: PathBuf::from("bench-results"),
            keep_baselines: 6,
            rows: 100_000,
            large_rows: 1_000_000,
            dimensions: 10,
            chain_length: 4,
            bins: 4096,
            reclaim_every: 1,
            abort_on_first_failure: false,
        }
    }
}

impl HarnessConfig {
    /// Load from a JSON file; missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> BenchResult<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        let config: Self = serde_json::from_slice(&bytes)?;
        Ok(config)
    }

    /// Reject settings no run could use.
    pub fn validate(&self) -> BenchResult<()> {
        let fail = |msg: String| Err(BenchError::InvalidConfig(msg));
        if self.idle_timeout_ms == 0 {
            return fail("idleTimeoutMs must be greater than zero".to_string());
        }
        if self.step_timeout_ms == 0 {
            return fail("stepTimeoutMs must be greater than zero".to_string());
        }
        if self.keep_baselines == 0 {
            return fail("keepBaselines must be greater than zero".to_string());
        }
        if self.dimensions == 0 || self.dimensions > 64 {
            return fail(format!(
                "dimensions must be between 1 and 64, got {}",
                self.dimensions
            ));
        }
        if self.chain_length == 0 || self.chain_length > self.dimensions {
            return fail(format!(
                "chainLength must be between 1 and {}, got {}",
                self.dimensions, self.chain_length
            ));
        }
        if self.bins == 0 {
            return fail("bins must be greater than zero".to_string());
        }
        Ok(())
    }

    /// Per-settle bound.
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    /// Per-step bound.
    pub fn step_timeout(&self) -> Duration {
        Duration::from_millis(self.step_timeout_ms)
    }

    /// Engine options derived from these settings.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::default()
            .with_bins(self.bins)
            .with_reclaim_every(self.reclaim_every)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = HarnessConfig::default();
        config.validate().unwrap();
        assert_eq!(config.idle_timeout(), Duration::from_secs(30));
        assert_eq!(config.engine_config().bin_count(), 4096);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "seed": 7, "idleTimeoutMs": 250, "reportDir": "out" }}"#).unwrap();
        let config = HarnessConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.idle_timeout_ms, 250);
        assert_eq!(config.report_dir, PathBuf::from("out"));
        assert_eq!(config.rows, 100_000);
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let config = HarnessConfig {
            chain_length: 11,
            ..HarnessConfig::default()
        };
        assert!(matches!(config.validate(), Err(BenchError::InvalidConfig(_))));

        let config = HarnessConfig {
            idle_timeout_ms: 0,
            ..HarnessConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
