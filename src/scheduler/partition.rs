//! Capacity resolution, round selection, and partition math.

use std::num::NonZeroUsize;
use std::ops::Range;

use rand::seq::SliceRandom;
use rand::Rng;

/// Rounds smaller than this go to a single worker.
pub const SMALL_BATCH_THRESHOLD: usize = 100;

/// Number of logical processors available to this process.
pub fn available_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

/// Resolve the maximum number of concurrently running partitions.
///
/// Without multithreading the capacity is 1. Otherwise `core_use` is clamped
/// to `available`, and -1 (or any negative value) means all of `available`.
pub fn effective_capacity(use_multithreading: bool, core_use: i32, available: usize) -> usize {
    let available = available.max(1);
    if !use_multithreading {
        return 1;
    }
    match usize::try_from(core_use) {
        Ok(requested) => requested.clamp(1, available),
        Err(_) => available,
    }
}

/// Shuffle the candidates and keep at most `max` of them.
pub fn select_round<T, R: Rng + ?Sized>(mut candidates: Vec<T>, max: usize, rng: &mut R) -> Vec<T> {
    candidates.shuffle(rng);
    candidates.truncate(max);
    candidates
}

/// Split `len` items across `slots` workers.
///
/// Below [`SMALL_BATCH_THRESHOLD`] everything goes in one range. Otherwise
/// there are exactly `slots` ranges of `len / slots` items, and the last one
/// also takes the `len % slots` remainder.
pub fn partition_ranges(len: usize, slots: usize) -> Vec<Range<usize>> {
    if len == 0 || slots == 0 {
        return Vec::new();
    }
    if len < SMALL_BATCH_THRESHOLD {
        return vec![0..len];
    }
    let per_slot = len / slots;
    (0..slots)
        .map(|i| {
            let start = i * per_slot;
            let end = if i == slots - 1 { len } else { start + per_slot };
            start..end
        })
        .collect()
}

/// Split a round into owned, non-empty partitions.
pub fn split_round<T>(round: Vec<T>, slots: usize) -> Vec<Vec<T>> {
    let ranges = partition_ranges(round.len(), slots);
    let mut items = round.into_iter();
    ranges
        .into_iter()
        .map(|range| items.by_ref().take(range.len()).collect::<Vec<T>>())
        .filter(|part| !part.is_empty())
        .collect()
}
