/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Compares two ways of fetching many records by key from a [`KeyedStore`]:
//! one concurrent point read per key, or one batched read-many request per chunk of keys.
//!
//! [`DatasetGenerator`] produces uniquely keyed records, and [`BenchmarkHarness`] inserts them
//! and times both read strategies, reporting elapsed time, request charge, and how many keys
//! succeeded, were refused by the store, or failed to be submitted.
//!
//! [`KeyedStore`]: keyed_store::KeyedStore

#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod barrier;
pub mod config;
pub mod dataset;
pub mod harness;
pub mod report;
mod tally;

pub use dataset::{Dataset, DatasetGenerator, GenerationError};
pub use harness::{BenchmarkHarness, HarnessConfig, HarnessError};
pub use report::{ComparisonReport, InsertReport, OperationCounts, RetrievalResult, Strategy};
