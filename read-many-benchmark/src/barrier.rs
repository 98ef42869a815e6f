/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! A countdown barrier for a known number of independent asynchronous operations.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Waits until `expected` arrivals have been observed.
///
/// Arrivals may come from any task or thread. The waiter sleeps on a [`Notify`] and is woken
/// once, by the arrival that completes the count.
#[derive(Debug)]
pub struct CompletionBarrier {
    expected: usize,
    arrived: AtomicUsize,
    notify: Notify,
}

/// The barrier was not complete when the wait bound expired.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BarrierTimeout {
    /// Arrivals the barrier was waiting for.
    pub expected: usize,
    /// Arrivals observed before the bound expired.
    pub observed: usize,
}

impl fmt::Display for BarrierTimeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "only {} of {} operations completed",
            self.observed, self.expected
        )
    }
}

impl std::error::Error for BarrierTimeout {}

impl CompletionBarrier {
    /// Creates a barrier expecting `expected` arrivals. A barrier expecting zero is already
    /// complete.
    pub fn new(expected: usize) -> Self {
        Self {
            expected,
            arrived: AtomicUsize::new(0),
            notify: Notify::new(),
        }
    }

    /// Records one arrival.
    pub fn arrive(&self) {
        let arrived = self.arrived.fetch_add(1, Ordering::AcqRel) + 1;
        if arrived == self.expected {
            self.notify.notify_waiters();
        }
    }

    /// Returns a guard that arrives when dropped, including on panic or cancellation.
    pub fn arrival(self: &Arc<Self>) -> Arrival {
        Arrival(self.clone())
    }

    /// Arrivals observed so far.
    pub fn arrived(&self) -> usize {
        self.arrived.load(Ordering::Acquire)
    }

    /// True once every expected arrival has been observed.
    pub fn is_complete(&self) -> bool {
        self.arrived() >= self.expected
    }

    /// Waits until the barrier is complete.
    pub async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking so an arrival between the check and the await still
            // wakes us.
            notified.as_mut().enable();
            if self.is_complete() {
                return;
            }
            notified.await;
        }
    }

    /// Waits until the barrier is complete or `limit` elapses.
    pub async fn wait_timeout(&self, limit: Duration) -> Result<(), BarrierTimeout> {
        tokio::time::timeout(limit, self.wait())
            .await
            .map_err(|_| BarrierTimeout {
                expected: self.expected,
                observed: self.arrived(),
            })
    }
}

/// Arrives at its [`CompletionBarrier`] when dropped.
#[derive(Debug)]
pub struct Arrival(Arc<CompletionBarrier>);

impl Drop for Arrival {
    fn drop(&mut self) {
        self.0.arrive();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn zero_expected_is_complete() {
        let barrier = CompletionBarrier::new(0);
        assert!(barrier.is_complete());
        barrier.wait_timeout(Duration::from_millis(1)).await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn wakes_after_last_arrival() {
        let barrier = Arc::new(CompletionBarrier::new(64));
        for _ in 0..64 {
            let arrival = barrier.arrival();
            tokio::spawn(async move {
                tokio::task::yield_now().await;
                drop(arrival);
            });
        }
        barrier
            .wait_timeout(Duration::from_secs(10))
            .await
            .expect("all arrivals observed");
        assert_eq!(64, barrier.arrived());
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_when_arrivals_are_missing() {
        let barrier = Arc::new(CompletionBarrier::new(3));
        barrier.arrive();
        let err = barrier
            .wait_timeout(Duration::from_secs(30))
            .await
            .unwrap_err();
        assert_eq!(
            BarrierTimeout {
                expected: 3,
                observed: 1
            },
            err
        );
        assert_eq!("only 1 of 3 operations completed", err.to_string());
    }

    #[tokio::test]
    async fn panicking_task_still_arrives() {
        let barrier = Arc::new(CompletionBarrier::new(1));
        let arrival = barrier.arrival();
        let task = tokio::spawn(async move {
            let _arrival = arrival;
            panic!("request handler panicked");
        });
        assert!(task.await.is_err());
        barrier
            .wait_timeout(Duration::from_secs(1))
            .await
            .expect("guard arrived during unwind");
    }
}
