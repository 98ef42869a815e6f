/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use serde_json::{Map, Value};

/// The `(id, partition key)` pair that addresses a single record.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ItemIdentity {
    id: String,
    partition_key: String,
}

impl ItemIdentity {
    /// Creates an identity from an id and a partition key.
    pub fn new(id: impl Into<String>, partition_key: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            partition_key: partition_key.into(),
        }
    }

    /// Creates an identity whose partition key is the id itself.
    pub fn from_id(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            partition_key: id.clone(),
            id,
        }
    }

    /// The record id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The partition key.
    pub fn partition_key(&self) -> &str {
        &self.partition_key
    }
}

/// A document stored under an [`ItemIdentity`].
///
/// The identity is fixed at construction. Attributes are free-form JSON values.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    identity: ItemIdentity,
    attributes: Map<String, Value>,
}

impl Record {
    /// Creates a record with no attributes.
    pub fn new(identity: ItemIdentity) -> Self {
        Self {
            identity,
            attributes: Map::new(),
        }
    }

    /// Creates a record with the given attributes.
    pub fn with_attributes(identity: ItemIdentity, attributes: Map<String, Value>) -> Self {
        Self {
            identity,
            attributes,
        }
    }

    /// The record id.
    pub fn id(&self) -> &str {
        self.identity.id()
    }

    /// The partition key.
    pub fn partition_key(&self) -> &str {
        self.identity.partition_key()
    }

    /// The identity that addresses this record.
    pub fn identity(&self) -> &ItemIdentity {
        &self.identity
    }

    /// The record's attributes, excluding its identity.
    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }
}
