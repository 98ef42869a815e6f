/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! A keyed document store abstraction.
//!
//! [`KeyedStore`] is the contract the read-many benchmark drives: create a record, read one
//! record by identity, or read many records in a single batched request. Every response carries
//! a [`Status`] and the request charge the store reported for it.
//!
//! Two implementations are provided:
//! - [`memory::InMemoryStore`], a simulated store with configurable latency and cost
//! - [`dynamodb::DynamoDbStore`], backed by Amazon DynamoDB

#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod dynamodb;
mod error;
pub mod memory;
mod record;
mod status;
mod store;

pub use error::{BoxError, StoreError, StoreErrorKind};
pub use record::{ItemIdentity, Record};
pub use status::Status;
pub use store::{KeyedStore, SharedKeyedStore, StoreResponse};
