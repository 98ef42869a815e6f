/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use crate::report::OperationCounts;
use keyed_store::StoreError;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use tracing::warn;

/// An `f64` sum that many tasks add to concurrently.
#[derive(Debug, Default)]
pub(crate) struct ChargeAccumulator(AtomicU64);

impl ChargeAccumulator {
    pub(crate) fn add(&self, charge: f64) {
        // fetch_update retries until no other add raced with this one, so the closure never
        // returns None.
        let _ = self
            .0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                Some((f64::from_bits(bits) + charge).to_bits())
            });
    }

    pub(crate) fn total(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Acquire))
    }
}

/// Per-phase outcome counters. A fresh tally is created for every phase.
#[derive(Debug, Default)]
pub(crate) struct Tally {
    requests: AtomicUsize,
    attempted: AtomicUsize,
    succeeded: AtomicUsize,
    non_success: AtomicUsize,
    failed: AtomicUsize,
    charge: ChargeAccumulator,
    channel_closed: AtomicBool,
}

impl Tally {
    pub(crate) fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn record_charge(&self, charge: f64) {
        self.charge.add(charge);
    }

    pub(crate) fn record_succeeded(&self, keys: usize) {
        self.attempted.fetch_add(keys, Ordering::AcqRel);
        self.succeeded.fetch_add(keys, Ordering::AcqRel);
    }

    pub(crate) fn record_non_success(&self, keys: usize) {
        self.attempted.fetch_add(keys, Ordering::AcqRel);
        self.non_success.fetch_add(keys, Ordering::AcqRel);
    }

    pub(crate) fn record_failed(&self, keys: usize) {
        self.attempted.fetch_add(keys, Ordering::AcqRel);
        self.failed.fetch_add(keys, Ordering::AcqRel);
    }

    pub(crate) fn record_store_error(&self, err: &StoreError, keys: usize) {
        if err.is_fatal() {
            self.channel_closed.store(true, Ordering::Release);
        }
        warn!(error = %err, keys, "request was not submitted");
        self.record_failed(keys);
    }

    pub(crate) fn is_channel_closed(&self) -> bool {
        self.channel_closed.load(Ordering::Acquire)
    }

    pub(crate) fn requests(&self) -> usize {
        self.requests.load(Ordering::Acquire)
    }

    pub(crate) fn charge(&self) -> f64 {
        self.charge.total()
    }

    pub(crate) fn counts(&self) -> OperationCounts {
        OperationCounts {
            attempted: self.attempted.load(Ordering::Acquire),
            succeeded: self.succeeded.load(Ordering::Acquire),
            non_success: self.non_success.load(Ordering::Acquire),
            failed: self.failed.load(Ordering::Acquire),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn charge_sums_across_threads() {
        let charge = Arc::new(ChargeAccumulator::default());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let charge = charge.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        charge.add(0.5);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(4000.0, charge.total());
    }

    #[test]
    fn fatal_errors_close_the_channel() {
        let tally = Tally::default();
        tally.record_store_error(&StoreError::dispatch("reset"), 2);
        assert!(!tally.is_channel_closed());
        tally.record_store_error(&StoreError::closed(), 1);
        assert!(tally.is_channel_closed());
        assert_eq!(
            OperationCounts {
                attempted: 3,
                succeeded: 0,
                non_success: 0,
                failed: 3
            },
            tally.counts()
        );
    }
}
