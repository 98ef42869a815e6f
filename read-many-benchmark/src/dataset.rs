/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Generation of uniquely keyed benchmark records.

use keyed_store::{BoxError, ItemIdentity, Record};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Attribute holding the filler payload.
pub const PAYLOAD_ATTRIBUTE: &str = "data";

/// Largest filler payload a record may carry. DynamoDB rejects items over 400 KB.
pub const MAX_PAYLOAD_BYTES: usize = 400 * 1000 - 1024;

/// Source of record identifiers.
pub trait IdSource {
    /// Returns the next identifier.
    fn next_id(&mut self) -> Result<String, BoxError>;
}

/// Random version 4 UUIDs in canonical hyphenated form.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomIds;

impl IdSource for RandomIds {
    fn next_id(&mut self) -> Result<String, BoxError> {
        Ok(Uuid::new_v4().to_string())
    }
}

#[derive(Debug)]
enum GenerationErrorKind {
    IdSource(BoxError),
    DuplicateId(String),
    PayloadTooLarge(usize),
}

/// Dataset generation failed. No records are returned when this occurs.
#[derive(Debug)]
pub struct GenerationError {
    kind: GenerationErrorKind,
    index: usize,
}

impl GenerationError {
    /// Index of the record that could not be generated.
    pub fn index(&self) -> usize {
        self.index
    }
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            GenerationErrorKind::IdSource(_) => {
                write!(f, "failed to generate an id for record {}", self.index)
            }
            GenerationErrorKind::DuplicateId(id) => {
                write!(f, "record {} has duplicate id `{}`", self.index, id)
            }
            GenerationErrorKind::PayloadTooLarge(size) => write!(
                f,
                "payload of {size} bytes exceeds the {MAX_PAYLOAD_BYTES} byte limit"
            ),
        }
    }
}

impl StdError for GenerationError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match &self.kind {
            GenerationErrorKind::IdSource(err) => Some(err.as_ref() as _),
            _ => None,
        }
    }
}

/// An ordered, read-only set of records. Cloning is cheap.
#[derive(Clone, Debug, Default)]
pub struct Dataset {
    records: Arc<[Record]>,
}

impl Dataset {
    /// Wraps existing records. Callers are responsible for their identities being unique.
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records: records.into(),
        }
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if there are no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The records, in generation order.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// The identities of the records, in generation order.
    pub fn identities(&self) -> impl Iterator<Item = &ItemIdentity> + '_ {
        self.records.iter().map(Record::identity)
    }
}

/// Generates [`Dataset`]s whose records use their id as their partition key.
#[derive(Debug)]
pub struct DatasetGenerator<S = RandomIds> {
    ids: S,
    payload_bytes: usize,
}

impl Default for DatasetGenerator<RandomIds> {
    fn default() -> Self {
        Self::new()
    }
}

impl DatasetGenerator<RandomIds> {
    /// A generator using random UUIDs and no payload.
    pub fn new() -> Self {
        Self::with_id_source(RandomIds)
    }
}

impl<S: IdSource> DatasetGenerator<S> {
    /// A generator drawing ids from `ids`.
    pub fn with_id_source(ids: S) -> Self {
        Self {
            ids,
            payload_bytes: 0,
        }
    }

    /// Attaches a filler payload of `bytes` bytes to every record. Zero means no payload.
    pub fn payload_bytes(mut self, bytes: usize) -> Self {
        self.payload_bytes = bytes;
        self
    }

    /// Generates `count` records with pairwise distinct ids.
    pub fn generate(&mut self, count: usize) -> Result<Dataset, GenerationError> {
        let attributes = self.payload()?;
        let mut seen = HashSet::with_capacity(count);
        let mut records = Vec::with_capacity(count);
        for index in 0..count {
            let id = self.ids.next_id().map_err(|err| GenerationError {
                kind: GenerationErrorKind::IdSource(err),
                index,
            })?;
            if !seen.insert(id.clone()) {
                return Err(GenerationError {
                    kind: GenerationErrorKind::DuplicateId(id),
                    index,
                });
            }
            records.push(Record::with_attributes(
                ItemIdentity::from_id(id),
                attributes.clone(),
            ));
        }
        info!(count, payload_bytes = self.payload_bytes, "generated dataset");
        Ok(Dataset::new(records))
    }

    fn payload(&self) -> Result<Map<String, Value>, GenerationError> {
        let mut attributes = Map::new();
        if self.payload_bytes > MAX_PAYLOAD_BYTES {
            return Err(GenerationError {
                kind: GenerationErrorKind::PayloadTooLarge(self.payload_bytes),
                index: 0,
            });
        }
        if self.payload_bytes > 0 {
            attributes.insert(
                PAYLOAD_ATTRIBUTE.to_string(),
                Value::String("x".repeat(self.payload_bytes)),
            );
        }
        Ok(attributes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    struct Sequence(Vec<Result<&'static str, &'static str>>);

    impl IdSource for Sequence {
        fn next_id(&mut self) -> Result<String, BoxError> {
            match self.0.remove(0) {
                Ok(id) => Ok(id.to_string()),
                Err(msg) => Err(msg.into()),
            }
        }
    }

    #[test]
    fn ids_are_canonical_uuids() {
        let dataset = DatasetGenerator::new().generate(3).unwrap();
        for record in dataset.records() {
            let parsed = Uuid::parse_str(record.id()).expect("valid uuid");
            assert_eq!(parsed.hyphenated().to_string(), record.id());
            assert_eq!(record.id(), record.partition_key());
            assert!(record.attributes().is_empty());
        }
    }

    #[test]
    fn empty_dataset() {
        let dataset = DatasetGenerator::new().generate(0).unwrap();
        assert!(dataset.is_empty());
    }

    #[test]
    fn payload_is_attached() {
        let dataset = DatasetGenerator::new()
            .payload_bytes(1024)
            .generate(2)
            .unwrap();
        for record in dataset.records() {
            let data = record.attributes()[PAYLOAD_ATTRIBUTE].as_str().unwrap();
            assert_eq!(1024, data.len());
        }
    }

    #[test]
    fn oversized_payload_fails() {
        let err = DatasetGenerator::new()
            .payload_bytes(MAX_PAYLOAD_BYTES + 1)
            .generate(1)
            .unwrap_err();
        assert!(err.to_string().contains("exceeds"));
    }

    #[test]
    fn id_source_failure_returns_no_records() {
        let mut generator =
            DatasetGenerator::with_id_source(Sequence(vec![Ok("a"), Ok("b"), Err("no entropy")]));
        let err = generator.generate(3).unwrap_err();
        assert_eq!(2, err.index());
        assert_eq!("no entropy", err.source().unwrap().to_string());
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let mut generator =
            DatasetGenerator::with_id_source(Sequence(vec![Ok("a"), Ok("b"), Ok("a")]));
        let err = generator.generate(3).unwrap_err();
        assert_eq!("record 2 has duplicate id `a`", err.to_string());
    }

    proptest! {
        #[test]
        fn generates_exactly_n_distinct_ids(n in 0usize..2000) {
            let dataset = DatasetGenerator::new().generate(n).unwrap();
            prop_assert_eq!(n, dataset.len());
            let distinct: HashSet<_> = dataset.identities().map(|i| i.id()).collect();
            prop_assert_eq!(n, distinct.len());
        }
    }
}
