// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::histogram::HistogramAggregator;
use crate::limiter::CardinalityLimiter;
use crate::measurement::MeasurementAggregator;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Everything aggregated during one flush interval.
#[derive(Debug, Default)]
pub struct Store {
    pub measurements: MeasurementAggregator,
    pub histograms: HistogramAggregator,
    pub transaction_names: CardinalityLimiter,
    pub transaction_name_overflow: bool,
}

/// Active store plus a standby store, swapped at flush time.
///
/// Writers lock the active buffer and confirm it is still active before
/// touching it. A snapshot locks the active buffer, flips the index while the
/// lock is held and takes the contents, so every write lands in exactly one
/// snapshot.
#[derive(Debug)]
pub struct DoubleBufferedAggregator {
    buffers: [Mutex<Store>; 2],
    active_index: AtomicUsize,
}

impl Default for DoubleBufferedAggregator {
    fn default() -> Self {
        Self::new()
    }
}

fn lock(buffer: &Mutex<Store>) -> MutexGuard<'_, Store> {
    // A panic inside a writer leaves the store usable; keep aggregating.
    buffer.lock().unwrap_or_else(PoisonError::into_inner)
}

impl DoubleBufferedAggregator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffers: [Mutex::new(Store::default()), Mutex::new(Store::default())],
            active_index: AtomicUsize::new(0),
        }
    }

    /// Runs `f` against the active store.
    pub fn with_active<R>(&self, f: impl FnOnce(&mut Store) -> R) -> R {
        loop {
            let index = self.active_index.load(Ordering::Acquire);
            let mut store = lock(&self.buffers[index]);
            if self.active_index.load(Ordering::Acquire) == index {
                return f(&mut store);
            }
            // Flipped between the load and the lock; retry on the new buffer.
        }
    }

    /// Takes the active store's contents and makes the standby buffer active.
    pub fn snapshot(&self) -> Store {
        let old_index = self.active_index.load(Ordering::Acquire);
        let mut store = lock(&self.buffers[old_index]);
        self.active_index.store(1 - old_index, Ordering::Release);
        std::mem::take(&mut *store)
    }
}
