//! Worker task behind [`LocalEngine`](super::LocalEngine).
//!
//! Requests are applied strictly in arrival order. Rows carry a bitmask with
//! one bit per dimension whose filter excludes them; a row is active when its
//! mask is zero.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::ops::Range;

use filterbench_core::{BenchResult, ClearStrategy, Command, Dataset};
use tokio::sync::{mpsc, oneshot};

use super::EngineConfig;
use super::shard;
use crate::barrier::IdleTracker;
use crate::report::ShardSummary;

/// Largest number of dimensions one row mask can track.
pub(crate) const MAX_DIMENSIONS: usize = 64;

/// Messages from the facade to the worker.
pub(crate) enum Request {
    /// Mutating protocol command; counted in flight by the sender.
    Apply(Command),
    /// Mutating index build; counted in flight by the sender.
    BuildIndex {
        name: String,
        reply: oneshot::Sender<BenchResult<()>>,
    },
    Resolve {
        name: String,
        reply: oneshot::Sender<bool>,
    },
    ActiveCount {
        reply: oneshot::Sender<usize>,
    },
    ShardSummary {
        reply: oneshot::Sender<ShardSummary>,
    },
    Shutdown,
}

struct Dimension {
    values: Vec<f64>,
    bins: Vec<u16>,
    /// Row ids sorted by value, NaN last.
    index: Option<Vec<u32>>,
    filter: Option<Range<f64>>,
}

impl Dimension {
    fn new(values: Vec<f64>, bin_count: u16) -> Self {
        let (lo, hi) = values
            .iter()
            .filter(|v| v.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        let width = hi - lo;
        let top = bin_count.saturating_sub(1);
        let bins = values
            .iter()
            .map(|&v| {
                if !v.is_finite() {
                    u16::MAX
                } else if width > 0.0 {
                    (((v - lo) / width) * f64::from(bin_count)).min(f64::from(top)) as u16
                } else {
                    0
                }
            })
            .collect();
        Self {
            values,
            bins,
            index: None,
            filter: None,
        }
    }

    fn build_index(&mut self) {
        let values = &self.values;
        let mut ids: Vec<u32> = (0..values.len() as u32).collect();
        ids.sort_unstable_by(|&a, &b| {
            let (x, y) = (values[a as usize], values[b as usize]);
            x.partial_cmp(&y)
                .unwrap_or_else(|| x.is_nan().cmp(&y.is_nan()))
        });
        self.index = Some(ids);
    }

    /// Index positions whose values fall in `range`; the whole index when unfiltered.
    fn positions(index: &[u32], values: &[f64], range: Option<&Range<f64>>) -> Range<usize> {
        match range {
            None => 0..index.len(),
            Some(r) => {
                let lower = index.partition_point(|&row| values[row as usize] < r.start);
                let upper = index.partition_point(|&row| values[row as usize] < r.end);
                lower..upper.max(lower)
            }
        }
    }
}

pub(crate) struct Store {
    rows: usize,
    dims: Vec<Dimension>,
    lookup: HashMap<String, usize>,
    masks: Vec<u64>,
    active: usize,
    bin_count: u16,
    reclaim_every: usize,
    since_reclaim: usize,
    summary: ShardSummary,
}

impl Store {
    pub(crate) fn ingest(dataset: Dataset, config: &EngineConfig) -> Self {
        let bin_count = config.bin_count();
        let (rows, columns) = dataset.into_columns();
        let mut lookup = HashMap::with_capacity(columns.len());
        let dims = columns
            .into_iter()
            .enumerate()
            .map(|(i, column)| {
                lookup.insert(column.name, i);
                Dimension::new(column.values, bin_count)
            })
            .collect();
        tracing::debug!("Ingested {} rows", rows);
        Self {
            rows,
            dims,
            lookup,
            masks: vec![0; rows],
            active: rows,
            bin_count,
            reclaim_every: config.reclaim_every,
            since_reclaim: 0,
            summary: ShardSummary::default(),
        }
    }

    fn exclude(&mut self, row: usize, bit: u64) {
        let mask = &mut self.masks[row];
        if *mask & bit == 0 {
            if *mask == 0 {
                self.active -= 1;
            }
            *mask |= bit;
        }
    }

    fn include(&mut self, row: usize, bit: u64) {
        let mask = &mut self.masks[row];
        if *mask & bit != 0 {
            *mask &= !bit;
            if *mask == 0 {
                self.active += 1;
            }
        }
    }

    /// Move dimension `d` from its current filter to `next`, toggling only
    /// rows whose membership changes when an index exists.
    fn refilter(&mut self, d: usize, next: Option<Range<f64>>) {
        let bit = 1u64 << d;
        let dim = &mut self.dims[d];
        let previous = dim.filter.take();
        dim.filter = next.clone();

        let Some(index) = self.dims[d].index.take() else {
            for row in 0..self.rows {
                let keep = next
                    .as_ref()
                    .is_none_or(|r| r.contains(&self.dims[d].values[row]));
                if keep {
                    self.include(row, bit);
                } else {
                    self.exclude(row, bit);
                }
            }
            return;
        };

        let values = &self.dims[d].values;
        let old = Dimension::positions(&index, values, previous.as_ref());
        let new = Dimension::positions(&index, values, next.as_ref());

        let leaving = [old.start..old.end.min(new.start), old.start.max(new.end)..old.end];
        let entering = [new.start..new.end.min(old.start), new.start.max(old.end)..new.end];
        for span in leaving {
            for pos in span {
                self.exclude(index[pos] as usize, bit);
            }
        }
        for span in entering {
            for pos in span {
                self.include(index[pos] as usize, bit);
            }
        }
        self.dims[d].index = Some(index);
    }

    fn recompute_clear(&mut self, d: usize) {
        let bit = 1u64 << d;
        self.dims[d].filter = None;
        for mask in self.masks.iter_mut() {
            *mask &= !bit;
        }
        self.active = self.masks.iter().filter(|m| **m == 0).count();
    }

    /// Apply a command; returns the dimension to reclaim, if a cycle is due.
    pub(crate) fn apply(&mut self, command: &Command) -> Option<usize> {
        let Some(&d) = self.lookup.get(command.dim_id()) else {
            tracing::warn!("Dropping {} for unknown dimension {}", command.tag(), command.dim_id());
            return None;
        };
        match command {
            Command::FilterSet { lo, hi, .. } => self.refilter(d, Some(*lo..*hi)),
            Command::FilterClear {
                strategy: ClearStrategy::Delta,
                ..
            } => self.refilter(d, None),
            Command::FilterClear {
                strategy: ClearStrategy::Recompute,
                ..
            } => self.recompute_clear(d),
        }
        tracing::debug!("Applied {} seq={} active={}", command.tag(), command.seq(), self.active);

        if self.reclaim_every == 0 {
            return None;
        }
        self.since_reclaim += 1;
        if self.since_reclaim >= self.reclaim_every {
            self.since_reclaim = 0;
            Some(d)
        } else {
            None
        }
    }

    /// Re-histogram the active rows of dimension `d` through the shard cache.
    pub(crate) fn reclaim(&mut self, d: usize) {
        let bins = &self.dims[d].bins;
        let active: Vec<u16> = self
            .masks
            .iter()
            .zip(bins)
            .filter(|(mask, _)| **mask == 0)
            .map(|(_, bin)| *bin)
            .collect();
        match shard::accumulate(&active, usize::from(self.bin_count)) {
            Ok((_, metrics)) => {
                self.summary.total_flushes += metrics.flushes;
                self.summary.total_evictions += metrics.evictions;
                self.summary.total_rows += metrics.rows;
            }
            Err(e) => tracing::warn!("Reclamation skipped: {}", e),
        }
    }

    pub(crate) fn build_index(&mut self, name: &str) -> bool {
        match self.lookup.get(name) {
            Some(&d) => {
                self.dims[d].build_index();
                true
            }
            None => false,
        }
    }

    pub(crate) fn has_dimension(&self, name: &str) -> bool {
        self.lookup.contains_key(name)
    }
}

/// Marks the tracker closed however the worker exits.
struct CloseOnDrop(IdleTracker);

impl Drop for CloseOnDrop {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// Worker main loop. The caller has already counted the ingest as in flight.
pub(crate) async fn run(
    dataset: Dataset,
    config: EngineConfig,
    mut rx: mpsc::UnboundedReceiver<Request>,
    tracker: IdleTracker,
) {
    let _close = CloseOnDrop(tracker.clone());
    let mut store = Store::ingest(dataset, &config);
    tracker.complete(false);

    while let Some(request) = rx.recv().await {
        match request {
            Request::Apply(command) => {
                let reclaim = store.apply(&command);
                tracker.complete(reclaim.is_some());
                if let Some(d) = reclaim {
                    // reclamation runs after the acknowledgement, like a background pass
                    tokio::task::yield_now().await;
                    store.reclaim(d);
                    tracker.reclaim_done();
                }
            }
            Request::BuildIndex { name, reply } => {
                let result = if store.build_index(&name) {
                    Ok(())
                } else {
                    Err(filterbench_core::BenchError::UnknownDimension(name))
                };
                tracker.complete(false);
                let _ = reply.send(result);
            }
            Request::Resolve { name, reply } => {
                let _ = reply.send(store.has_dimension(&name));
            }
            Request::ActiveCount { reply } => {
                let _ = reply.send(store.active);
            }
            Request::ShardSummary { reply } => {
                let _ = reply.send(store.summary);
            }
            Request::Shutdown => break,
        }
    }
    tracing::debug!("Engine worker stopped");
}
