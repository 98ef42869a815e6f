/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! A simulated [`KeyedStore`] held in process memory.
//!
//! Every request sleeps for a configurable latency and is charged according to a
//! [`CostModel`], which makes the store usable both in tests and for running the benchmark
//! without a real database.

use crate::{ItemIdentity, KeyedStore, Record, Status, StoreError, StoreResponse};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

/// Request charges applied by [`InMemoryStore`].
#[derive(Clone, Debug, PartialEq)]
pub struct CostModel {
    /// Charge for a create, successful or not.
    pub create: f64,
    /// Charge for a point read, hit or miss.
    pub point_read: f64,
    /// Fixed charge for a batched read.
    pub read_many_base: f64,
    /// Additional charge per identity in a batched read.
    pub read_many_per_key: f64,
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            create: 5.0,
            point_read: 1.0,
            read_many_base: 2.0,
            read_many_per_key: 0.5,
        }
    }
}

impl CostModel {
    fn read_many(&self, keys: usize) -> f64 {
        self.read_many_base + self.read_many_per_key * keys as f64
    }
}

/// Number of requests an [`InMemoryStore`] has served, by operation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RequestCounts {
    /// `create` requests.
    pub creates: usize,
    /// `read_one` requests.
    pub point_reads: usize,
    /// `read_many` requests.
    pub batch_reads: usize,
}

impl RequestCounts {
    /// Sum of all requests.
    pub fn total(&self) -> usize {
        self.creates + self.point_reads + self.batch_reads
    }
}

#[derive(Debug, Default)]
struct Counters {
    creates: AtomicUsize,
    point_reads: AtomicUsize,
    batch_reads: AtomicUsize,
}

/// Builder for [`InMemoryStore`].
#[derive(Clone, Debug, Default)]
pub struct Builder {
    latency: Option<Duration>,
    cost_model: Option<CostModel>,
}

impl Builder {
    /// Sets the simulated latency of every request. Defaults to zero.
    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Sets the cost model. Defaults to [`CostModel::default`].
    pub fn cost_model(mut self, cost_model: CostModel) -> Self {
        self.cost_model = Some(cost_model);
        self
    }

    /// Builds the store.
    pub fn build(self) -> InMemoryStore {
        InMemoryStore {
            records: RwLock::new(HashMap::new()),
            latency: self.latency.unwrap_or_default(),
            cost_model: self.cost_model.unwrap_or_default(),
            closed: AtomicBool::new(false),
            counters: Counters::default(),
        }
    }
}

/// An in-memory [`KeyedStore`].
#[derive(Debug)]
pub struct InMemoryStore {
    records: RwLock<HashMap<ItemIdentity, Record>>,
    latency: Duration,
    cost_model: CostModel,
    closed: AtomicBool,
    counters: Counters,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl InMemoryStore {
    /// Creates a store with no latency and the default cost model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a builder.
    pub fn builder() -> Builder {
        Builder::default()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// True if no record is stored.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Requests served so far. Requests rejected after [`shutdown`](Self::shutdown) are not
    /// counted.
    pub fn request_counts(&self) -> RequestCounts {
        RequestCounts {
            creates: self.counters.creates.load(Ordering::Acquire),
            point_reads: self.counters.point_reads.load(Ordering::Acquire),
            batch_reads: self.counters.batch_reads.load(Ordering::Acquire),
        }
    }

    /// Rejects every later request with a fatal [`StoreError`].
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
    }

    async fn admit(&self, counter: &AtomicUsize) -> Result<(), StoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::closed());
        }
        counter.fetch_add(1, Ordering::AcqRel);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        Ok(())
    }
}

#[async_trait]
impl KeyedStore for InMemoryStore {
    async fn create(&self, record: &Record) -> Result<StoreResponse<()>, StoreError> {
        self.admit(&self.counters.creates).await?;
        let mut records = self.records.write().await;
        let status = if records.contains_key(record.identity()) {
            Status::CONFLICT
        } else {
            records.insert(record.identity().clone(), record.clone());
            Status::CREATED
        };
        Ok(StoreResponse::new(status, self.cost_model.create, ()))
    }

    async fn read_one(
        &self,
        identity: &ItemIdentity,
    ) -> Result<StoreResponse<Option<Record>>, StoreError> {
        self.admit(&self.counters.point_reads).await?;
        let found = self.records.read().await.get(identity).cloned();
        let status = match found {
            Some(_) => Status::OK,
            None => Status::NOT_FOUND,
        };
        Ok(StoreResponse::new(status, self.cost_model.point_read, found))
    }

    async fn read_many(
        &self,
        identities: &[ItemIdentity],
    ) -> Result<StoreResponse<Vec<Record>>, StoreError> {
        self.admit(&self.counters.batch_reads).await?;
        let records = self.records.read().await;
        let found = identities
            .iter()
            .filter_map(|identity| records.get(identity).cloned())
            .collect();
        Ok(StoreResponse::new(
            Status::OK,
            self.cost_model.read_many(identities.len()),
            found,
        ))
    }
}
