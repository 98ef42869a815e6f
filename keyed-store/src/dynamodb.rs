/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! A [`KeyedStore`] backed by an Amazon DynamoDB table.
//!
//! The table uses `pk` (the record's partition key) as its hash key and `id` as its range key.
//! The request charge of every response is the consumed capacity DynamoDB reported for it.

mod attribute;

use crate::{ItemIdentity, KeyedStore, Record, Status, StoreError, StoreResponse};
use async_trait::async_trait;
use attribute::{identity_to_key, record_from_item, record_to_item};
use aws_sdk_dynamodb::config::http::HttpResponse;
use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::types::{
    AttributeDefinition, BillingMode, ConsumedCapacity, KeySchemaElement, KeyType,
    KeysAndAttributes, ProvisionedThroughput, ReturnConsumedCapacity, ScalarAttributeType,
    TableStatus,
};
use aws_sdk_dynamodb::Client;
use std::error::Error as StdError;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Name of the range key attribute holding the record id.
pub const ID_ATTRIBUTE: &str = "id";
/// Name of the hash key attribute holding the partition key.
pub const PARTITION_KEY_ATTRIBUTE: &str = "pk";
/// The most keys a single `BatchGetItem` request may carry.
pub const MAX_BATCH_GET_KEYS: usize = 100;

const MAX_BATCH_GET_ATTEMPTS: u32 = 5;
const UNPROCESSED_KEYS_BACKOFF: Duration = Duration::from_millis(50);
const TABLE_POLL_INTERVAL: Duration = Duration::from_secs(1);
const MAX_TABLE_POLLS: u32 = 120;

/// Maps a DynamoDB service error to the status a document store would report for it.
///
/// DynamoDB answers most refusals with HTTP 400 and distinguishes them by error code.
pub fn status_for_error_code(code: Option<&str>, http_status: u16) -> Status {
    match code {
        Some("ConditionalCheckFailedException") => Status::CONFLICT,
        Some(
            "ProvisionedThroughputExceededException"
            | "ThrottlingException"
            | "RequestLimitExceeded",
        ) => Status::TOO_MANY_REQUESTS,
        Some("ResourceNotFoundException") => Status::NOT_FOUND,
        _ => Status::from_u16(http_status),
    }
}

fn sdk_failure<E>(err: SdkError<E, HttpResponse>) -> StoreError
where
    E: StdError + Send + Sync + 'static,
{
    match err {
        SdkError::TimeoutError(_) => StoreError::timeout(err),
        SdkError::ConstructionFailure(_) => StoreError::invalid_request(err),
        other => StoreError::dispatch(other),
    }
}

/// Service errors become a status; anything that never produced a response is a `StoreError`.
fn classify<E>(err: SdkError<E, HttpResponse>) -> Result<Status, StoreError>
where
    E: ProvideErrorMetadata + StdError + Send + Sync + 'static,
{
    match &err {
        SdkError::ServiceError(context) => {
            let status =
                status_for_error_code(context.err().code(), context.raw().status().as_u16());
            debug!(%status, error = %DisplayErrorContext(&err), "service error");
            Ok(status)
        }
        _ => Err(sdk_failure(err)),
    }
}

fn capacity_units(consumed: Option<&ConsumedCapacity>) -> f64 {
    consumed
        .and_then(|capacity| capacity.capacity_units())
        .unwrap_or_default()
}

/// A [`KeyedStore`] over one DynamoDB table.
#[derive(Clone, Debug)]
pub struct DynamoDbStore {
    client: Client,
    table_name: String,
}

impl DynamoDbStore {
    /// Creates a store for `table_name`. The table is not created; see
    /// [`create_table_if_not_exists`](Self::create_table_if_not_exists).
    pub fn new(client: Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    /// The table this store reads and writes.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Creates the table with `throughput` provisioned read and write capacity units unless it
    /// already exists, then waits for it to become active.
    pub async fn create_table_if_not_exists(&self, throughput: i64) -> Result<(), StoreError> {
        let exists = match self
            .client
            .describe_table()
            .table_name(&self.table_name)
            .send()
            .await
        {
            Ok(_) => true,
            Err(err)
                if err
                    .as_service_error()
                    .map(|e| e.is_resource_not_found_exception())
                    .unwrap_or(false) =>
            {
                false
            }
            Err(err) => return Err(sdk_failure(err)),
        };

        if exists {
            info!(table = %self.table_name, "table already exists");
        } else {
            info!(table = %self.table_name, throughput, "creating table");
            self.client
                .create_table()
                .table_name(&self.table_name)
                .key_schema(
                    KeySchemaElement::builder()
                        .attribute_name(PARTITION_KEY_ATTRIBUTE)
                        .key_type(KeyType::Hash)
                        .build()
                        .map_err(StoreError::invalid_request)?,
                )
                .key_schema(
                    KeySchemaElement::builder()
                        .attribute_name(ID_ATTRIBUTE)
                        .key_type(KeyType::Range)
                        .build()
                        .map_err(StoreError::invalid_request)?,
                )
                .attribute_definitions(
                    AttributeDefinition::builder()
                        .attribute_name(PARTITION_KEY_ATTRIBUTE)
                        .attribute_type(ScalarAttributeType::S)
                        .build()
                        .map_err(StoreError::invalid_request)?,
                )
                .attribute_definitions(
                    AttributeDefinition::builder()
                        .attribute_name(ID_ATTRIBUTE)
                        .attribute_type(ScalarAttributeType::S)
                        .build()
                        .map_err(StoreError::invalid_request)?,
                )
                .billing_mode(BillingMode::Provisioned)
                .provisioned_throughput(
                    ProvisionedThroughput::builder()
                        .read_capacity_units(throughput)
                        .write_capacity_units(throughput)
                        .build()
                        .map_err(StoreError::invalid_request)?,
                )
                .send()
                .await
                .map_err(sdk_failure)?;
        }

        self.wait_until_active().await
    }

    async fn wait_until_active(&self) -> Result<(), StoreError> {
        for _ in 0..MAX_TABLE_POLLS {
            let output = self
                .client
                .describe_table()
                .table_name(&self.table_name)
                .send()
                .await
                .map_err(sdk_failure)?;
            let status = output.table().and_then(|table| table.table_status());
            if status == Some(&TableStatus::Active) {
                info!(table = %self.table_name, "table is active");
                return Ok(());
            }
            debug!(table = %self.table_name, ?status, "waiting for table");
            tokio::time::sleep(TABLE_POLL_INTERVAL).await;
        }
        Err(StoreError::timeout(format!(
            "table `{}` did not become active",
            self.table_name
        )))
    }

    /// Deletes the table.
    pub async fn delete_table(&self) -> Result<(), StoreError> {
        info!(table = %self.table_name, "deleting table");
        self.client
            .delete_table()
            .table_name(&self.table_name)
            .send()
            .await
            .map_err(sdk_failure)?;
        Ok(())
    }
}

#[async_trait]
impl KeyedStore for DynamoDbStore {
    async fn create(&self, record: &Record) -> Result<StoreResponse<()>, StoreError> {
        let result = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(record_to_item(record)))
            .condition_expression("attribute_not_exists(#id)")
            .expression_attribute_names("#id", ID_ATTRIBUTE)
            .return_consumed_capacity(ReturnConsumedCapacity::Total)
            .send()
            .await;
        match result {
            Ok(output) => Ok(StoreResponse::new(
                Status::CREATED,
                capacity_units(output.consumed_capacity()),
                (),
            )),
            Err(err) => classify(err).map(|status| StoreResponse::new(status, 0.0, ())),
        }
    }

    async fn read_one(
        &self,
        identity: &ItemIdentity,
    ) -> Result<StoreResponse<Option<Record>>, StoreError> {
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .set_key(Some(identity_to_key(identity)))
            .return_consumed_capacity(ReturnConsumedCapacity::Total)
            .send()
            .await;
        let output = match result {
            Ok(output) => output,
            Err(err) => return classify(err).map(|status| StoreResponse::new(status, 0.0, None)),
        };
        let charge = capacity_units(output.consumed_capacity());
        match output.item {
            Some(item) => Ok(StoreResponse::new(
                Status::OK,
                charge,
                Some(record_from_item(item)?),
            )),
            None => Ok(StoreResponse::new(Status::NOT_FOUND, charge, None)),
        }
    }

    /// Unprocessed keys are requested again, with backoff, within the same call. Keys still
    /// unprocessed after the last attempt, or when a retry fails after some records were
    /// already read, are left out of an `OK` output.
    async fn read_many(
        &self,
        identities: &[ItemIdentity],
    ) -> Result<StoreResponse<Vec<Record>>, StoreError> {
        if identities.len() > MAX_BATCH_GET_KEYS {
            return Err(StoreError::invalid_request(format!(
                "BatchGetItem accepts at most {MAX_BATCH_GET_KEYS} keys, got {}",
                identities.len()
            )));
        }

        let mut pending: Vec<_> = identities.iter().map(identity_to_key).collect();
        let mut records = Vec::with_capacity(identities.len());
        let mut charge = 0.0;
        let mut attempt = 0;
        while !pending.is_empty() {
            let requested = pending.len();
            let keys = KeysAndAttributes::builder()
                .set_keys(Some(std::mem::take(&mut pending)))
                .build()
                .map_err(StoreError::invalid_request)?;
            let result = self
                .client
                .batch_get_item()
                .request_items(&self.table_name, keys)
                .return_consumed_capacity(ReturnConsumedCapacity::Total)
                .send()
                .await;
            let output = match result {
                Ok(output) => output,
                // Records from earlier attempts were read; the keys still pending are missing.
                Err(err) if !records.is_empty() => {
                    warn!(
                        unprocessed = requested,
                        error = %DisplayErrorContext(&err),
                        "retrying unprocessed keys failed"
                    );
                    break;
                }
                Err(err) => {
                    return classify(err).map(|status| StoreResponse::new(status, charge, records))
                }
            };

            charge += output
                .consumed_capacity()
                .iter()
                .filter_map(|capacity| capacity.capacity_units())
                .sum::<f64>();
            if let Some(items) = output
                .responses
                .and_then(|mut responses| responses.remove(&self.table_name))
            {
                for item in items {
                    records.push(record_from_item(item)?);
                }
            }
            if let Some(unprocessed) = output
                .unprocessed_keys
                .and_then(|mut unprocessed| unprocessed.remove(&self.table_name))
            {
                pending = unprocessed.keys().to_vec();
            }

            attempt += 1;
            if !pending.is_empty() {
                if attempt >= MAX_BATCH_GET_ATTEMPTS {
                    warn!(
                        unprocessed = pending.len(),
                        attempts = attempt,
                        "giving up on unprocessed keys"
                    );
                    break;
                }
                tokio::time::sleep(UNPROCESSED_KEYS_BACKOFF * 2u32.pow(attempt - 1)).await;
            }
        }

        Ok(StoreResponse::new(Status::OK, charge, records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_map_to_statuses() {
        assert_eq!(
            Status::CONFLICT,
            status_for_error_code(Some("ConditionalCheckFailedException"), 400)
        );
        assert_eq!(
            Status::TOO_MANY_REQUESTS,
            status_for_error_code(Some("ProvisionedThroughputExceededException"), 400)
        );
        assert_eq!(
            Status::TOO_MANY_REQUESTS,
            status_for_error_code(Some("ThrottlingException"), 400)
        );
        assert_eq!(
            Status::NOT_FOUND,
            status_for_error_code(Some("ResourceNotFoundException"), 400)
        );
        assert_eq!(
            Status::BAD_REQUEST,
            status_for_error_code(Some("ValidationException"), 400)
        );
        assert_eq!(
            Status::SERVICE_UNAVAILABLE,
            status_for_error_code(None, 503)
        );
    }

    #[test]
    fn missing_consumed_capacity_is_free() {
        assert_eq!(0.0, capacity_units(None));
        let consumed = ConsumedCapacity::builder().capacity_units(2.5).build();
        assert_eq!(2.5, capacity_units(Some(&consumed)));
    }
}
