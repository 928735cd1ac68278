//! Shard-cached histogram accumulation.
//!
//! Bin increments are grouped into shards of `2^shard_bits` bins. A bounded
//! set of slots keeps the hottest shards in a compact scratch store; when a
//! new shard needs a slot and none is free, the next slot in round-robin order
//! is flushed into the backing histogram and reused. Each flush, eviction and
//! the number of rows written back are counted, which is what the engine
//! reports as its shard summary.

use filterbench_core::{BenchError, BenchResult};

/// Counters describing one or more accumulation passes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShardMetrics {
    /// Slot flushes that wrote at least one bin back.
    pub flushes: u64,
    /// Flushes caused by slot eviction.
    pub evictions: u64,
    /// Flushes performed at the end of a pass.
    pub final_flushes: u64,
    /// Distinct bins written back across all flushes.
    pub bins: u64,
    /// Rows written back across all flushes.
    pub rows: u64,
}

impl ShardMetrics {
    /// Add `other` into `self`.
    pub fn merge(&mut self, other: &ShardMetrics) {
        self.flushes += other.flushes;
        self.evictions += other.evictions;
        self.final_flushes += other.final_flushes;
        self.bins += other.bins;
        self.rows += other.rows;
    }
}

#[derive(Debug, Clone, Copy)]
enum FlushReason {
    Evict,
    Final,
}

/// Shard width (as a bit shift) and shard size for a histogram of `len` bins.
fn shard_params(len: usize) -> (usize, usize) {
    match len {
        n if n <= 256 => (0, n.max(1)),
        n if n <= 2048 => (6, 64),
        n if n <= 16384 => (8, 256),
        _ => (10, 512),
    }
}

/// Number of slots to keep hot for a histogram of `len` bins.
fn slot_count(len: usize) -> usize {
    let (shard_bits, _) = shard_params(len);
    let shards = if shard_bits == 0 {
        1
    } else {
        (len.saturating_sub(1) >> shard_bits) + 1
    };
    let cap = match len {
        n if n <= 2048 => 8,
        n if n <= 16384 => 16,
        _ => 32,
    };
    shards.clamp(1, cap)
}

struct ShardCache {
    shard_bits: usize,
    shard_size: usize,
    /// Shard id held by each slot.
    slot_ids: Vec<Option<usize>>,
    /// Whether each slot holds unflushed counts.
    slot_used: Vec<bool>,
    /// shard id -> slot index + 1 (0 = not cached).
    shard_map: Vec<u8>,
    store: Vec<u32>,
    next_evict: usize,
    metrics: ShardMetrics,
}

impl ShardCache {
    fn new(bin_count: usize) -> Self {
        let (shard_bits, shard_size) = shard_params(bin_count);
        let slots = slot_count(bin_count);
        let map_size = if shard_bits == 0 {
            1
        } else {
            1 << (16 - shard_bits)
        };
        Self {
            shard_bits,
            shard_size,
            slot_ids: vec![None; slots],
            slot_used: vec![false; slots],
            shard_map: vec![0; map_size],
            store: vec![0; shard_size * slots],
            next_evict: 0,
            metrics: ShardMetrics::default(),
        }
    }

    fn split(&self, bin: usize) -> (usize, usize) {
        if self.shard_bits == 0 {
            (0, bin)
        } else {
            (bin >> self.shard_bits, bin & ((1 << self.shard_bits) - 1))
        }
    }

    fn increment(&mut self, bin: usize, counts: &mut [u32]) {
        if bin >= counts.len() {
            return;
        }
        let (shard, local) = self.split(bin);
        let slot = self.ensure_slot(shard, counts);
        if local < self.shard_size {
            self.store[slot * self.shard_size + local] += 1;
            self.slot_used[slot] = true;
        } else {
            counts[bin] += 1;
        }
    }

    fn ensure_slot(&mut self, shard: usize, counts: &mut [u32]) -> usize {
        if let Some(&cached) = self.shard_map.get(shard)
            && cached > 0
        {
            return usize::from(cached - 1);
        }

        let slot = match self.slot_ids.iter().position(Option::is_none) {
            Some(free) => free,
            None => {
                let victim = self.next_evict % self.slot_ids.len();
                self.flush_slot(victim, counts, FlushReason::Evict);
                if let Some(old) = self.slot_ids[victim]
                    && let Some(entry) = self.shard_map.get_mut(old)
                {
                    *entry = 0;
                }
                self.next_evict = (victim + 1) % self.slot_ids.len();
                victim
            }
        };

        self.reset_slot(slot);
        self.slot_ids[slot] = Some(shard);
        self.slot_used[slot] = false;
        if let Some(entry) = self.shard_map.get_mut(shard) {
            // slot counts are capped at 32, so slot + 1 always fits
            *entry = (slot + 1) as u8;
        }
        slot
    }

    fn flush_slot(&mut self, slot: usize, counts: &mut [u32], reason: FlushReason) {
        let Some(shard) = self.slot_ids[slot] else {
            return;
        };
        if !self.slot_used[slot] {
            return;
        }
        let base = shard << self.shard_bits;
        let start = slot * self.shard_size;
        let mut bins_written = 0u64;
        let mut rows_written = 0u64;
        for (offset, value) in self.store[start..start + self.shard_size]
            .iter_mut()
            .enumerate()
        {
            if *value == 0 {
                continue;
            }
            if let Some(target) = counts.get_mut(base + offset) {
                *target += *value;
                rows_written += u64::from(*value);
            }
            *value = 0;
            bins_written += 1;
        }
        self.slot_used[slot] = false;

        if bins_written > 0 {
            self.metrics.flushes += 1;
            self.metrics.bins += bins_written;
            self.metrics.rows += rows_written;
            match reason {
                FlushReason::Evict => self.metrics.evictions += 1,
                FlushReason::Final => self.metrics.final_flushes += 1,
            }
        }
    }

    fn reset_slot(&mut self, slot: usize) {
        let start = slot * self.shard_size;
        self.store[start..start + self.shard_size].fill(0);
    }

    fn flush_all(&mut self, counts: &mut [u32]) {
        for slot in 0..self.slot_ids.len() {
            self.flush_slot(slot, counts, FlushReason::Final);
            self.slot_ids[slot] = None;
            self.slot_used[slot] = false;
        }
        self.shard_map.fill(0);
    }
}

/// Count occurrences of each bin id in `bins` into a histogram of `bin_count` bins.
///
/// Ids at or above `bin_count` are ignored.
pub fn accumulate(bins: &[u16], bin_count: usize) -> BenchResult<(Vec<u32>, ShardMetrics)> {
    if bin_count == 0 {
        return Err(BenchError::InvalidConfig(
            "bin_count must be greater than zero".to_string(),
        ));
    }
    let mut counts = vec![0u32; bin_count];
    let mut cache = ShardCache::new(bin_count);
    for &bin in bins {
        cache.increment(usize::from(bin), &mut counts);
    }
    cache.flush_all(&mut counts);
    Ok((counts, cache.metrics))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naive(bins: &[u16], bin_count: usize) -> Vec<u32> {
        let mut counts = vec![0u32; bin_count];
        for &b in bins {
            if let Some(c) = counts.get_mut(usize::from(b)) {
                *c += 1;
            }
        }
        counts
    }

    #[test]
    fn test_zero_bins_rejected() {
        assert!(matches!(
            accumulate(&[1, 2], 0),
            Err(BenchError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_narrow_histogram_single_final_flush() {
        let bins = [0u16, 1, 1, 3, 3, 3];
        let (counts, metrics) = accumulate(&bins, 4).unwrap();
        assert_eq!(counts, vec![1, 2, 0, 3]);
        assert_eq!(metrics.flushes, 1);
        assert_eq!(metrics.evictions, 0);
        assert_eq!(metrics.final_flushes, 1);
        assert_eq!(metrics.rows, 6);
        assert_eq!(metrics.bins, 3);
    }

    #[test]
    fn test_wide_histogram_matches_naive_and_evicts() {
        let bin_count = 8192;
        // 32 shards against 16 slots: striding across them forces rotation
        let bins: Vec<u16> = (0..20_000u32).map(|i| ((i * 257) % 8192) as u16).collect();
        let (counts, metrics) = accumulate(&bins, bin_count).unwrap();
        assert_eq!(counts, naive(&bins, bin_count));
        assert!(metrics.evictions > 0);
        assert_eq!(metrics.flushes, metrics.evictions + metrics.final_flushes);
        assert_eq!(metrics.rows, bins.len() as u64);
    }

    #[test]
    fn test_out_of_range_ids_ignored() {
        let (counts, metrics) = accumulate(&[0, 9, 9, 1], 2).unwrap();
        assert_eq!(counts, vec![1, 1]);
        assert_eq!(metrics.rows, 2);
    }
}
