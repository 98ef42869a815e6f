/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Per-phase results and the human readable summary.

use serde::{Serialize, Serializer};
use std::fmt;
use std::time::Duration;

fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(millis(*duration))
}

fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

/// How many keys a phase attempted and how each attempt ended.
///
/// `attempted == succeeded + non_success + failed` once the phase has completed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationCounts {
    /// Keys whose operation completed, whatever the outcome.
    pub attempted: usize,
    /// Keys the store served with a success status.
    pub succeeded: usize,
    /// Keys the store answered with a non-success status, including keys missing from a
    /// batched response.
    pub non_success: usize,
    /// Keys whose request was never answered by the store.
    pub failed: usize,
}

impl fmt::Display for OperationCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "attempted: {}, succeeded: {}, non-success: {}, failed: {}",
            self.attempted, self.succeeded, self.non_success, self.failed
        )
    }
}

/// A retrieval strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum Strategy {
    /// One point read per key, all issued concurrently.
    Individual,
    /// One read-many request per chunk of keys, all chunks issued concurrently.
    #[serde(rename_all = "camelCase")]
    Batched {
        /// Most keys carried by one request.
        chunk_size: usize,
    },
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Individual => write!(f, "Individual reads"),
            Strategy::Batched { chunk_size } => {
                write!(f, "Read-many (chunks of {chunk_size})")
            }
        }
    }
}

/// Outcome of inserting a dataset.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertReport {
    /// Time from the first submission to the last completion.
    #[serde(rename = "elapsedMs", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
    /// Sum of request charges.
    pub request_charge: f64,
    /// Create requests sent to the store.
    pub requests_issued: usize,
    /// Per-record outcomes.
    pub counts: OperationCounts,
}

impl fmt::Display for InsertReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Insert: {:.3} ms, request charge {:.2}, {} requests",
            millis(self.elapsed),
            self.request_charge,
            self.requests_issued
        )?;
        writeln!(f, "  {}", self.counts)
    }
}

/// Outcome of reading a dataset back with one [`Strategy`].
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalResult {
    /// The strategy that produced this result.
    pub strategy: Strategy,
    /// Time from the first submission to the last completion.
    #[serde(rename = "elapsedMs", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
    /// Sum of request charges.
    pub request_charge: f64,
    /// Requests sent to the store.
    pub requests_issued: usize,
    /// Per-key outcomes.
    pub counts: OperationCounts,
}

impl RetrievalResult {
    pub(crate) fn empty(strategy: Strategy) -> Self {
        Self {
            strategy,
            elapsed: Duration::ZERO,
            request_charge: 0.0,
            requests_issued: 0,
            counts: OperationCounts::default(),
        }
    }
}

impl fmt::Display for RetrievalResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{}: {:.3} ms, request charge {:.2}, {} requests",
            self.strategy,
            millis(self.elapsed),
            self.request_charge,
            self.requests_issued
        )?;
        writeln!(f, "  {}", self.counts)
    }
}

/// Results of a full benchmark run.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonReport {
    /// Records in the dataset.
    pub records: usize,
    /// The insert phase.
    pub insert: InsertReport,
    /// Reading every record with its own request.
    pub individual: RetrievalResult,
    /// Reading the records in batches.
    pub batched: RetrievalResult,
}

impl fmt::Display for ComparisonReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Records: {}", self.records)?;
        write!(f, "{}", self.insert)?;
        write!(f, "{}", self.individual)?;
        write!(f, "{}", self.batched)?;
        writeln!(
            f,
            "Total latency with individual reads (ms): {:.3}",
            millis(self.individual.elapsed)
        )?;
        writeln!(
            f,
            "Total latency using read-many (ms): {:.3}",
            millis(self.batched.elapsed)
        )?;
        writeln!(
            f,
            "Total request charge with individual reads: {:.2}",
            self.individual.request_charge
        )?;
        writeln!(
            f,
            "Total request charge using read-many: {:.2}",
            self.batched.request_charge
        )
    }
}
