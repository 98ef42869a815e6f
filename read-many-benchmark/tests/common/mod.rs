/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

#![allow(dead_code)]

use async_trait::async_trait;
use keyed_store::memory::InMemoryStore;
use keyed_store::{ItemIdentity, KeyedStore, Record, Status, StoreError, StoreResponse};
use read_many_benchmark::HarnessConfig;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub fn harness_config() -> HarnessConfig {
    HarnessConfig::new(Duration::from_secs(30))
}

/// Wraps an [`InMemoryStore`] and misbehaves for selected ids.
#[derive(Debug, Default)]
pub struct FaultyStore {
    pub inner: InMemoryStore,
    pub throttled: HashSet<String>,
    pub unreachable: HashSet<String>,
    pub silent: HashSet<String>,
}

impl FaultyStore {
    async fn fault(&self, ids: &[&str]) -> Result<Option<Status>, StoreError> {
        let mut status = None;
        for &id in ids {
            if self.silent.contains(id) {
                std::future::pending::<()>().await;
            }
            if self.unreachable.contains(id) {
                return Err(StoreError::dispatch(format!("connection to {id} reset")));
            }
            if self.throttled.contains(id) {
                status = Some(Status::TOO_MANY_REQUESTS);
            }
        }
        Ok(status)
    }
}

#[async_trait]
impl KeyedStore for FaultyStore {
    async fn create(&self, record: &Record) -> Result<StoreResponse<()>, StoreError> {
        self.inner.create(record).await
    }

    async fn read_one(
        &self,
        identity: &ItemIdentity,
    ) -> Result<StoreResponse<Option<Record>>, StoreError> {
        if let Some(status) = self.fault(&[identity.id()]).await? {
            return Ok(StoreResponse::new(status, 0.0, None));
        }
        self.inner.read_one(identity).await
    }

    async fn read_many(
        &self,
        identities: &[ItemIdentity],
    ) -> Result<StoreResponse<Vec<Record>>, StoreError> {
        let ids: Vec<&str> = identities.iter().map(|i| i.id()).collect();
        if let Some(status) = self.fault(&ids).await? {
            return Ok(StoreResponse::new(status, 0.0, Vec::new()));
        }
        self.inner.read_many(identities).await
    }
}

/// Records the highest number of requests it has served at the same time.
#[derive(Debug, Default)]
pub struct GaugeStore {
    pub inner: InMemoryStore,
    in_flight: AtomicUsize,
    pub peak: AtomicUsize,
}

impl GaugeStore {
    async fn measure<T>(&self, request: impl std::future::Future<Output = T>) -> T {
        let current = self.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak.fetch_max(current, Ordering::AcqRel);
        tokio::time::sleep(Duration::from_millis(2)).await;
        let output = request.await;
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
        output
    }
}

#[async_trait]
impl KeyedStore for GaugeStore {
    async fn create(&self, record: &Record) -> Result<StoreResponse<()>, StoreError> {
        self.measure(self.inner.create(record)).await
    }

    async fn read_one(
        &self,
        identity: &ItemIdentity,
    ) -> Result<StoreResponse<Option<Record>>, StoreError> {
        self.measure(self.inner.read_one(identity)).await
    }

    async fn read_many(
        &self,
        identities: &[ItemIdentity],
    ) -> Result<StoreResponse<Vec<Record>>, StoreError> {
        self.measure(self.inner.read_many(identities)).await
    }
}

pub fn shared<T: KeyedStore + 'static>(store: &Arc<T>) -> keyed_store::SharedKeyedStore {
    keyed_store::SharedKeyedStore::from(store.clone())
}
