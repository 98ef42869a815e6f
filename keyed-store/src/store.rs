/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use crate::{ItemIdentity, Record, Status, StoreError};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// A store response: the status, the request charge, and the operation's output.
#[derive(Clone, Debug, PartialEq)]
pub struct StoreResponse<T> {
    status: Status,
    request_charge: f64,
    output: T,
}

impl<T> StoreResponse<T> {
    /// Creates a new response.
    pub fn new(status: Status, request_charge: f64, output: T) -> Self {
        Self {
            status,
            request_charge,
            output,
        }
    }

    /// The status the store reported.
    pub fn status(&self) -> Status {
        self.status
    }

    /// The cost the store charged for this request.
    pub fn request_charge(&self) -> f64 {
        self.request_charge
    }

    /// The operation's output.
    pub fn output(&self) -> &T {
        &self.output
    }

    /// Consumes the response, returning the output.
    pub fn into_output(self) -> T {
        self.output
    }
}

/// A remote store of [`Record`]s addressable by [`ItemIdentity`].
///
/// `Err` is reserved for requests that never produced a response. A store that answers with a
/// refusal (not found, throttled, conflict) returns `Ok` with a non-success [`Status`].
#[async_trait]
pub trait KeyedStore: Send + Sync {
    /// Creates `record`. A successful creation reports [`Status::CREATED`].
    async fn create(&self, record: &Record) -> Result<StoreResponse<()>, StoreError>;

    /// Reads the record at `identity`. A hit reports [`Status::OK`].
    async fn read_one(
        &self,
        identity: &ItemIdentity,
    ) -> Result<StoreResponse<Option<Record>>, StoreError>;

    /// Reads every record in `identities` with a single request.
    ///
    /// Identities with no record are absent from the output.
    async fn read_many(
        &self,
        identities: &[ItemIdentity],
    ) -> Result<StoreResponse<Vec<Record>>, StoreError>;
}

#[async_trait]
impl<T> KeyedStore for Arc<T>
where
    T: KeyedStore + ?Sized,
{
    async fn create(&self, record: &Record) -> Result<StoreResponse<()>, StoreError> {
        T::create(self, record).await
    }

    async fn read_one(
        &self,
        identity: &ItemIdentity,
    ) -> Result<StoreResponse<Option<Record>>, StoreError> {
        T::read_one(self, identity).await
    }

    async fn read_many(
        &self,
        identities: &[ItemIdentity],
    ) -> Result<StoreResponse<Vec<Record>>, StoreError> {
        T::read_many(self, identities).await
    }
}

/// Wrapper type for a sharable [`KeyedStore`].
#[derive(Clone)]
pub struct SharedKeyedStore(Arc<dyn KeyedStore>);

impl SharedKeyedStore {
    /// Creates a new `SharedKeyedStore` from a `KeyedStore`.
    pub fn new(store: impl KeyedStore + 'static) -> Self {
        Self(Arc::new(store))
    }
}

impl fmt::Debug for SharedKeyedStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SharedKeyedStore").finish()
    }
}

impl<T> From<Arc<T>> for SharedKeyedStore
where
    T: KeyedStore + 'static,
{
    fn from(store: Arc<T>) -> Self {
        Self(store)
    }
}

#[async_trait]
impl KeyedStore for SharedKeyedStore {
    async fn create(&self, record: &Record) -> Result<StoreResponse<()>, StoreError> {
        self.0.create(record).await
    }

    async fn read_one(
        &self,
        identity: &ItemIdentity,
    ) -> Result<StoreResponse<Option<Record>>, StoreError> {
        self.0.read_one(identity).await
    }

    async fn read_many(
        &self,
        identities: &[ItemIdentity],
    ) -> Result<StoreResponse<Vec<Record>>, StoreError> {
        self.0.read_many(identities).await
    }
}
