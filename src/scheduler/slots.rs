//! Running-partition accounting shared between the scheduler and its workers.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Counts running partitions.
///
/// The scheduler reserves slots (check-and-increment under one lock); each
/// worker releases its slot by dropping the [`SlotGuard`] when it finishes,
/// including when it panics.
#[derive(Debug, Clone, Default)]
pub struct PartitionSlots {
    running: Arc<Mutex<usize>>,
}

/// A reserved slot, released on drop.
#[derive(Debug)]
pub struct SlotGuard {
    running: Arc<Mutex<usize>>,
}

impl PartitionSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of partitions currently running.
    pub fn running(&self) -> usize {
        *lock(&self.running)
    }

    /// Reserve up to `wanted` slots without exceeding `capacity`.
    pub fn try_reserve(&self, capacity: usize, wanted: usize) -> Vec<SlotGuard> {
        let mut running = lock(&self.running);
        let granted = wanted.min(capacity.saturating_sub(*running));
        *running += granted;
        (0..granted)
            .map(|_| SlotGuard {
                running: Arc::clone(&self.running),
            })
            .collect()
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        let mut running = lock(&self.running);
        *running = running.saturating_sub(1);
    }
}

fn lock(running: &Mutex<usize>) -> MutexGuard<'_, usize> {
    running.lock().unwrap_or_else(PoisonError::into_inner)
}
