/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Benchmark configuration, from command line flags or a JSON file.

use crate::harness::HarnessConfig;
use keyed_store::dynamodb::MAX_BATCH_GET_KEYS;
use serde::Deserialize;
use std::error::Error as StdError;
use std::fmt;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Which store to benchmark against.
#[derive(Copy, Clone, Debug, PartialEq, Eq, clap::ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// The in-process simulated store.
    Memory,
    /// An Amazon DynamoDB table.
    #[value(name = "dynamodb")]
    DynamoDb,
}

/// How the final report is printed.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, clap::ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human readable summary.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
}

/// Settings for the simulated store.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MemoryConfig {
    /// Latency added to every request, in milliseconds.
    pub simulated_latency_ms: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            simulated_latency_ms: 5,
        }
    }
}

/// Settings for the DynamoDB store.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DynamoDbConfig {
    /// Table to create and benchmark against.
    pub table_name: String,
    /// AWS region.
    pub region: String,
    /// AWS credentials profile.
    pub profile: Option<String>,
    /// Endpoint override, for example DynamoDB Local.
    pub endpoint_url: Option<String>,
    /// Read and write capacity units provisioned when the table is created.
    pub provisioned_throughput: i64,
    /// Delete the table when the benchmark finishes.
    pub cleanup: bool,
}

impl Default for DynamoDbConfig {
    fn default() -> Self {
        Self {
            table_name: "ReadManyItems".to_string(),
            region: "us-east-1".to_string(),
            profile: None,
            endpoint_url: None,
            provisioned_throughput: 15_000,
            cleanup: false,
        }
    }
}

/// A complete benchmark configuration.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BenchmarkConfig {
    /// Store to benchmark.
    pub store: StoreKind,
    /// Records to generate and insert.
    pub record_count: usize,
    /// Keys per read-many request.
    pub chunk_size: NonZeroUsize,
    /// Cap on concurrent requests. Unbounded when absent.
    #[serde(default)]
    pub max_in_flight: Option<NonZeroUsize>,
    /// Bound on how long each phase may wait for its requests, in seconds.
    pub completion_timeout_secs: u64,
    /// Filler bytes attached to each record.
    #[serde(default)]
    pub payload_bytes: usize,
    /// Report format.
    #[serde(default)]
    pub output: OutputFormat,
    /// Simulated store settings.
    #[serde(default)]
    pub memory: MemoryConfig,
    /// DynamoDB settings.
    #[serde(default)]
    pub dynamodb: DynamoDbConfig,
}

impl BenchmarkConfig {
    /// Reads a JSON configuration file.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|err| ConfigError {
            kind: ConfigErrorKind::Read(path.to_path_buf(), err),
        })?;
        Self::from_json(&contents)
    }

    /// Parses and validates a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: BenchmarkConfig = serde_json::from_str(json).map_err(|err| ConfigError {
            kind: ConfigErrorKind::Parse(err),
        })?;
        config.validate()
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.completion_timeout_secs == 0 {
            return Err(ConfigError::invalid("completion timeout must be positive"));
        }
        if self.store == StoreKind::DynamoDb && self.chunk_size.get() > MAX_BATCH_GET_KEYS {
            return Err(ConfigError::invalid(format!(
                "DynamoDB reads at most {MAX_BATCH_GET_KEYS} keys per batch, chunk size is {}",
                self.chunk_size
            )));
        }
        if self.store == StoreKind::DynamoDb && self.dynamodb.provisioned_throughput <= 0 {
            return Err(ConfigError::invalid("provisioned throughput must be positive"));
        }
        Ok(self)
    }

    /// Harness settings derived from this configuration.
    pub fn harness_config(&self) -> HarnessConfig {
        HarnessConfig::new(Duration::from_secs(self.completion_timeout_secs))
            .set_max_in_flight(self.max_in_flight)
    }
}

#[derive(Debug)]
enum ConfigErrorKind {
    Read(PathBuf, std::io::Error),
    Parse(serde_json::Error),
    Invalid(String),
}

/// The configuration could not be loaded.
#[derive(Debug)]
pub struct ConfigError {
    kind: ConfigErrorKind,
}

impl ConfigError {
    fn invalid(message: impl Into<String>) -> Self {
        Self {
            kind: ConfigErrorKind::Invalid(message.into()),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ConfigErrorKind::Read(path, _) => {
                write!(f, "failed to read config file `{}`", path.display())
            }
            ConfigErrorKind::Parse(_) => write!(f, "failed to parse config"),
            ConfigErrorKind::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl StdError for ConfigError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match &self.kind {
            ConfigErrorKind::Read(_, err) => Some(err),
            ConfigErrorKind::Parse(err) => Some(err),
            ConfigErrorKind::Invalid(_) => None,
        }
    }
}

/// Command line arguments.
#[derive(Debug, Clone, clap::Parser)]
#[command(about = "Compare concurrent point reads with batched read-many requests")]
pub struct Args {
    /// JSON configuration file. When given, every other flag is ignored.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Which store to benchmark against.
    #[arg(long, value_enum, default_value_t = StoreKind::Memory)]
    pub store: StoreKind,

    /// Number of records to generate.
    #[arg(long, default_value_t = 1000)]
    pub record_count: usize,

    /// Keys per read-many request.
    #[arg(long, default_value = "100")]
    pub chunk_size: NonZeroUsize,

    /// Cap on concurrent requests. Unbounded by default.
    #[arg(long)]
    pub max_in_flight: Option<NonZeroUsize>,

    /// How long each phase may wait for its requests, in seconds.
    #[arg(long, required_unless_present = "config")]
    pub completion_timeout_secs: Option<u64>,

    /// Filler bytes attached to each record.
    #[arg(long, default_value_t = 0)]
    pub payload_bytes: usize,

    /// Report format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,

    /// Latency of the simulated store, in milliseconds.
    #[arg(long, default_value_t = 5)]
    pub simulated_latency_ms: u64,

    /// DynamoDB table to benchmark against.
    #[arg(long, default_value = "ReadManyItems")]
    pub table_name: String,

    /// AWS region to use.
    #[arg(long, default_value = "us-east-1")]
    pub region: String,

    /// AWS credentials profile to use.
    #[arg(long)]
    pub profile: Option<String>,

    /// Endpoint override, for example `http://localhost:8000` for DynamoDB Local.
    #[arg(long)]
    pub endpoint_url: Option<String>,

    /// Read and write capacity units provisioned for a new table.
    #[arg(long, default_value_t = 15_000)]
    pub provisioned_throughput: i64,

    /// Delete the DynamoDB table when the benchmark finishes.
    #[arg(long)]
    pub cleanup: bool,
}

impl Args {
    /// Resolves the arguments into a validated configuration.
    pub fn into_config(self) -> Result<BenchmarkConfig, ConfigError> {
        if let Some(path) = &self.config {
            return BenchmarkConfig::from_path(path);
        }
        let completion_timeout_secs = self
            .completion_timeout_secs
            .ok_or_else(|| ConfigError::invalid("a completion timeout is required"))?;
        BenchmarkConfig {
            store: self.store,
            record_count: self.record_count,
            chunk_size: self.chunk_size,
            max_in_flight: self.max_in_flight,
            completion_timeout_secs,
            payload_bytes: self.payload_bytes,
            output: self.output,
            memory: MemoryConfig {
                simulated_latency_ms: self.simulated_latency_ms,
            },
            dynamodb: DynamoDbConfig {
                table_name: self.table_name,
                region: self.region,
                profile: self.profile,
                endpoint_url: self.endpoint_url,
                provisioned_throughput: self.provisioned_throughput,
                cleanup: self.cleanup,
            },
        }
        .validate()
    }
}
