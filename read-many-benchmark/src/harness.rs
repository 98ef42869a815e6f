/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Inserts a [`Dataset`] and times reading it back individually and in batches.

use crate::barrier::CompletionBarrier;
use crate::dataset::Dataset;
use crate::report::{ComparisonReport, InsertReport, RetrievalResult, Strategy};
use crate::tally::Tally;
use keyed_store::{ItemIdentity, KeyedStore, SharedKeyedStore, Status};
use std::error::Error as StdError;
use std::fmt;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, info_span, warn, Instrument};

/// Splits the dataset's identities into consecutive chunks of at most `chunk_size`, keeping
/// their order.
pub fn chunk_identities(dataset: &Dataset, chunk_size: NonZeroUsize) -> Vec<Vec<ItemIdentity>> {
    dataset
        .records()
        .chunks(chunk_size.get())
        .map(|chunk| chunk.iter().map(|r| r.identity().clone()).collect())
        .collect()
}

/// Settings for a [`BenchmarkHarness`].
#[derive(Clone, Debug)]
pub struct HarnessConfig {
    completion_timeout: Duration,
    max_in_flight: Option<NonZeroUsize>,
}

impl HarnessConfig {
    /// Creates a config. Every phase fails if its requests have not all completed within
    /// `completion_timeout`.
    pub fn new(completion_timeout: Duration) -> Self {
        Self {
            completion_timeout,
            max_in_flight: None,
        }
    }

    /// Caps the number of requests in flight at once. Unbounded when unset.
    pub fn max_in_flight(mut self, limit: NonZeroUsize) -> Self {
        self.max_in_flight = Some(limit);
        self
    }

    /// Sets or clears the in-flight cap.
    pub fn set_max_in_flight(mut self, limit: Option<NonZeroUsize>) -> Self {
        self.max_in_flight = limit;
        self
    }

    /// The completion bound of every phase.
    pub fn completion_timeout(&self) -> Duration {
        self.completion_timeout
    }
}

#[derive(Debug)]
enum HarnessErrorKind {
    CompletionTimeout { expected: usize, observed: usize },
    SubmissionChannelClosed { failed: usize },
}

/// A benchmark phase could not finish.
#[derive(Debug)]
pub struct HarnessError {
    kind: HarnessErrorKind,
    phase: &'static str,
}

impl HarnessError {
    /// True if the phase gave up waiting for its requests to complete.
    pub fn is_completion_timeout(&self) -> bool {
        matches!(self.kind, HarnessErrorKind::CompletionTimeout { .. })
    }

    /// True if the store stopped accepting requests during the phase.
    pub fn is_submission_channel_closed(&self) -> bool {
        matches!(self.kind, HarnessErrorKind::SubmissionChannelClosed { .. })
    }

    /// The phase that failed.
    pub fn phase(&self) -> &'static str {
        self.phase
    }
}

impl fmt::Display for HarnessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            HarnessErrorKind::CompletionTimeout { expected, observed } => write!(
                f,
                "{}: only {} of {} requests completed before the timeout",
                self.phase, observed, expected
            ),
            HarnessErrorKind::SubmissionChannelClosed { failed } => write!(
                f,
                "{}: the store stopped accepting requests ({} keys failed)",
                self.phase, failed
            ),
        }
    }
}

impl StdError for HarnessError {}

const INSERT: &str = "insert";
const INDIVIDUAL: &str = "individual reads";
const BATCHED: &str = "batched reads";

/// Drives a [`KeyedStore`] through an insert phase and two timed read phases.
///
/// Each phase fans out all of its requests at once (or up to the configured in-flight cap)
/// and then waits on a [`CompletionBarrier`] for every one of them. Outcome counters and the
/// charge sum are created fresh for each phase, so one harness can run phases repeatedly.
#[derive(Debug)]
pub struct BenchmarkHarness {
    store: SharedKeyedStore,
    config: HarnessConfig,
    limiter: Option<Arc<Semaphore>>,
}

impl BenchmarkHarness {
    /// Creates a harness over `store`.
    pub fn new(store: SharedKeyedStore, config: HarnessConfig) -> Self {
        let limiter = config
            .max_in_flight
            .map(|limit| Arc::new(Semaphore::new(limit.get())));
        Self {
            store,
            config,
            limiter,
        }
    }

    /// Inserts the dataset, then reads it back individually and in chunks of `chunk_size`.
    pub async fn run(
        &self,
        dataset: &Dataset,
        chunk_size: NonZeroUsize,
    ) -> Result<ComparisonReport, HarnessError> {
        let insert = self.insert_all(dataset).await?;
        info!(elapsed = ?insert.elapsed, counts = %insert.counts, "insert complete");
        let individual = self.read_individually(dataset).await?;
        info!(elapsed = ?individual.elapsed, counts = %individual.counts, "individual reads complete");
        let batched = self.read_batched(dataset, chunk_size).await?;
        info!(elapsed = ?batched.elapsed, counts = %batched.counts, "batched reads complete");
        Ok(ComparisonReport {
            records: dataset.len(),
            insert,
            individual,
            batched,
        })
    }

    /// Creates every record with one concurrent request per record.
    ///
    /// A record counts as succeeded only when the store reports [`Status::CREATED`].
    pub async fn insert_all(&self, dataset: &Dataset) -> Result<InsertReport, HarnessError> {
        let tally = Arc::new(Tally::default());
        let span = info_span!("insert_all", records = dataset.len());
        let elapsed = self
            .fan_out(INSERT, dataset.len(), |index| {
                let store = self.store.clone();
                let dataset = dataset.clone();
                let tally = tally.clone();
                async move {
                    let record = &dataset.records()[index];
                    if tally.is_channel_closed() {
                        tally.record_failed(1);
                        return;
                    }
                    tally.record_request();
                    match store.create(record).await {
                        Ok(response) => {
                            tally.record_charge(response.request_charge());
                            if response.status() == Status::CREATED {
                                tally.record_succeeded(1);
                            } else {
                                warn!(id = record.id(), status = %response.status(), "create did not return 201");
                                tally.record_non_success(1);
                            }
                        }
                        Err(err) => tally.record_store_error(&err, 1),
                    }
                }
            })
            .instrument(span)
            .await?;
        check_channel(INSERT, &tally)?;
        Ok(InsertReport {
            elapsed,
            request_charge: tally.charge(),
            requests_issued: tally.requests(),
            counts: tally.counts(),
        })
    }

    /// Reads every record with one concurrent point read per record, addressed by the record's
    /// identity exactly as [`read_batched`](Self::read_batched) addresses it.
    pub async fn read_individually(
        &self,
        dataset: &Dataset,
    ) -> Result<RetrievalResult, HarnessError> {
        if dataset.is_empty() {
            return Ok(RetrievalResult::empty(Strategy::Individual));
        }
        let tally = Arc::new(Tally::default());
        let span = info_span!("read_individually", records = dataset.len());
        let elapsed = self
            .fan_out(INDIVIDUAL, dataset.len(), |index| {
                let store = self.store.clone();
                let identity = dataset.records()[index].identity().clone();
                let tally = tally.clone();
                async move {
                    if tally.is_channel_closed() {
                        tally.record_failed(1);
                        return;
                    }
                    tally.record_request();
                    match store.read_one(&identity).await {
                        Ok(response) => {
                            tally.record_charge(response.request_charge());
                            if response.status() == Status::OK {
                                tally.record_succeeded(1);
                            } else {
                                warn!(id = identity.id(), status = %response.status(), "read did not return 200");
                                tally.record_non_success(1);
                            }
                        }
                        Err(err) => tally.record_store_error(&err, 1),
                    }
                }
            })
            .instrument(span)
            .await?;
        check_channel(INDIVIDUAL, &tally)?;
        Ok(RetrievalResult {
            strategy: Strategy::Individual,
            elapsed,
            request_charge: tally.charge(),
            requests_issued: tally.requests(),
            counts: tally.counts(),
        })
    }

    /// Reads the records with one concurrent read-many request per chunk of `chunk_size` ids.
    ///
    /// Keys missing from a successful chunk response count as non-success.
    pub async fn read_batched(
        &self,
        dataset: &Dataset,
        chunk_size: NonZeroUsize,
    ) -> Result<RetrievalResult, HarnessError> {
        let strategy = Strategy::Batched {
            chunk_size: chunk_size.get(),
        };
        if dataset.is_empty() {
            return Ok(RetrievalResult::empty(strategy));
        }
        let chunks = Arc::new(chunk_identities(dataset, chunk_size));
        let tally = Arc::new(Tally::default());
        let span = info_span!("read_batched", records = dataset.len(), chunks = chunks.len());
        let elapsed = self
            .fan_out(BATCHED, chunks.len(), |index| {
                let store = self.store.clone();
                let chunks = chunks.clone();
                let tally = tally.clone();
                async move {
                    let chunk = &chunks[index];
                    if tally.is_channel_closed() {
                        tally.record_failed(chunk.len());
                        return;
                    }
                    tally.record_request();
                    match store.read_many(chunk).await {
                        Ok(response) => {
                            tally.record_charge(response.request_charge());
                            if response.status().is_success() {
                                let found = response.output().len().min(chunk.len());
                                if found < chunk.len() {
                                    debug!(chunk = index, missing = chunk.len() - found, "keys missing from read-many response");
                                }
                                tally.record_succeeded(found);
                                tally.record_non_success(chunk.len() - found);
                            } else {
                                warn!(chunk = index, status = %response.status(), "read-many did not succeed");
                                tally.record_non_success(chunk.len());
                            }
                        }
                        Err(err) => tally.record_store_error(&err, chunk.len()),
                    }
                }
            })
            .instrument(span)
            .await?;
        check_channel(BATCHED, &tally)?;
        Ok(RetrievalResult {
            strategy,
            elapsed,
            request_charge: tally.charge(),
            requests_issued: tally.requests(),
            counts: tally.counts(),
        })
    }

    /// Spawns `jobs` requests and waits for all of them, returning the elapsed wall-clock time.
    ///
    /// Outstanding requests are aborted if the completion bound expires.
    async fn fan_out<F, Fut>(
        &self,
        phase: &'static str,
        jobs: usize,
        mut job: F,
    ) -> Result<Duration, HarnessError>
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if jobs == 0 {
            return Ok(Duration::ZERO);
        }
        let barrier = Arc::new(CompletionBarrier::new(jobs));
        let mut tasks = JoinSet::new();
        let start = Instant::now();
        for index in 0..jobs {
            let arrival = barrier.arrival();
            let limiter = self.limiter.clone();
            let request = job(index);
            tasks.spawn(async move {
                let _arrival = arrival;
                let _permit = match limiter {
                    Some(limiter) => limiter.acquire_owned().await.ok(),
                    None => None,
                };
                request.await;
            });
        }
        debug!(phase, jobs, "all requests submitted");

        let completed = barrier.wait_timeout(self.config.completion_timeout).await;
        let elapsed = start.elapsed();
        if let Err(timeout) = completed {
            tasks.abort_all();
            warn!(phase, %timeout, "giving up on outstanding requests");
            return Err(HarnessError {
                kind: HarnessErrorKind::CompletionTimeout {
                    expected: timeout.expected,
                    observed: timeout.observed,
                },
                phase,
            });
        }
        Ok(elapsed)
    }
}

fn check_channel(phase: &'static str, tally: &Tally) -> Result<(), HarnessError> {
    if tally.is_channel_closed() {
        return Err(HarnessError {
            kind: HarnessErrorKind::SubmissionChannelClosed {
                failed: tally.counts().failed,
            },
            phase,
        });
    }
    Ok(())
}
