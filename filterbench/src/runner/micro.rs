//! Histogram accumulation micro-benchmark.

use async_trait::async_trait;
use filterbench_core::{
    BenchError, BenchResult, RandomProvider, SeededRandomProvider, TimeProvider,
};

use super::{BenchmarkPlan, PlanContext};
use crate::engine::{EngineFactory, shard};
use crate::report::{MicroEntry, MicroReport, Report, ReportCategory, epoch_millis};

/// Times [`shard::accumulate`] over random bin ids at several histogram widths.
///
/// No engine is involved; the plan isolates the shard cache the reference
/// engine uses for reclamation.
#[derive(Debug, Clone)]
pub struct MicroHistogramPlan {
    rows: usize,
    widths: Vec<usize>,
}

impl MicroHistogramPlan {
    /// Accumulate `rows` ids at the default widths (256, 4096, 16384, 65536).
    pub fn new(rows: usize) -> Self {
        Self {
            rows,
            widths: vec![256, 4096, 16_384, 65_536],
        }
    }

    /// Replace the measured widths. Each must be in `1..=65536`.
    pub fn widths(mut self, widths: Vec<usize>) -> BenchResult<Self> {
        if let Some(bad) = widths.iter().find(|w| **w == 0 || **w > 65_536) {
            return Err(BenchError::InvalidConfig(format!(
                "histogram width must be in 1..=65536, got {bad}"
            )));
        }
        self.widths = widths;
        Ok(self)
    }
}

#[async_trait(?Send)]
impl<F: EngineFactory, T: TimeProvider> BenchmarkPlan<F, T> for MicroHistogramPlan {
    fn name(&self) -> &str {
        "micro-histogram"
    }

    fn category(&self) -> ReportCategory {
        ReportCategory::MicroHistogram
    }

    async fn run(&mut self, ctx: &PlanContext<'_, F, T>) -> BenchResult<Report> {
        let random = SeededRandomProvider::new(ctx.seed());
        let mut runner = ctx.runner();
        let mut histograms = Vec::with_capacity(self.widths.len());

        for &width in &self.widths {
            let ids: Vec<u16> = (0..self.rows)
                .map(|_| random.random_range(0..width as u32) as u16)
                .collect();
            let measurement = runner
                .measure(format!("Histogram ({width} bins)"), self.rows, async {
                    shard::accumulate(&ids, width)
                })
                .await?;
            if let (Some(ms), Some((_, metrics))) = (measurement.elapsed_ms(), measurement.output) {
                histograms.push(MicroEntry {
                    bins: width,
                    rows: self.rows,
                    ms,
                    flushes: metrics.flushes,
                    evictions: metrics.evictions,
                });
            }
        }

        Ok(Report::Micro(MicroReport {
            timestamp: epoch_millis(),
            histograms,
        }))
    }
}
