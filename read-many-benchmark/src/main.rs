/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_dynamodb::error::DisplayErrorContext;
use clap::Parser as _;
use keyed_store::dynamodb::DynamoDbStore;
use keyed_store::memory::InMemoryStore;
use keyed_store::{BoxError, SharedKeyedStore};
use read_many_benchmark::config::{Args, BenchmarkConfig, DynamoDbConfig, OutputFormat, StoreKind};
use read_many_benchmark::{BenchmarkHarness, Dataset, DatasetGenerator};
use std::process;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    if let Err(err) = run(args).await {
        println!("benchmark failed: {}", DisplayErrorContext(err.as_ref()));
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), BoxError> {
    let config = args.into_config()?;
    let dataset = DatasetGenerator::new()
        .payload_bytes(config.payload_bytes)
        .generate(config.record_count)?;

    match config.store {
        StoreKind::Memory => {
            let store = InMemoryStore::builder()
                .latency(Duration::from_millis(config.memory.simulated_latency_ms))
                .build();
            benchmark(SharedKeyedStore::new(store), &config, &dataset).await
        }
        StoreKind::DynamoDb => {
            let sdk_config = load_sdk_config(&config.dynamodb).await;
            let store = DynamoDbStore::new(
                aws_sdk_dynamodb::Client::new(&sdk_config),
                &config.dynamodb.table_name,
            );
            info!(table = %store.table_name(), region = %config.dynamodb.region, "using DynamoDB");
            store
                .create_table_if_not_exists(config.dynamodb.provisioned_throughput)
                .await?;
            let result = benchmark(SharedKeyedStore::new(store.clone()), &config, &dataset).await;
            if config.dynamodb.cleanup {
                store.delete_table().await?;
            }
            result
        }
    }
}

async fn load_sdk_config(config: &DynamoDbConfig) -> SdkConfig {
    let mut loader =
        aws_config::defaults(BehaviorVersion::latest()).region(Region::new(config.region.clone()));
    if let Some(profile) = config.profile.as_ref() {
        loader = loader.profile_name(profile);
    }
    if let Some(endpoint_url) = config.endpoint_url.as_ref() {
        loader = loader.endpoint_url(endpoint_url);
    }
    loader.load().await
}

async fn benchmark(
    store: SharedKeyedStore,
    config: &BenchmarkConfig,
    dataset: &Dataset,
) -> Result<(), BoxError> {
    let harness = BenchmarkHarness::new(store, config.harness_config());
    let report = harness.run(dataset, config.chunk_size).await?;
    match config.output {
        OutputFormat::Text => {
            println!("=============== Read-many benchmark result ================");
            print!("{report}");
            println!("===========================================================");
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}
