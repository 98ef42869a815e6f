/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use keyed_store::memory::InMemoryStore;
use keyed_store::{ItemIdentity, Record};
use read_many_benchmark::{
    BenchmarkHarness, Dataset, DatasetGenerator, HarnessConfig, OperationCounts, Strategy,
};
use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

mod common;
use common::{harness_config, shared, FaultyStore, GaugeStore};

fn chunk(size: usize) -> NonZeroUsize {
    NonZeroUsize::new(size).unwrap()
}

fn dataset(count: usize) -> Dataset {
    DatasetGenerator::new().generate(count).unwrap()
}

fn all_succeeded(count: usize) -> OperationCounts {
    OperationCounts {
        attempted: count,
        succeeded: count,
        non_success: 0,
        failed: 0,
    }
}

fn ids(dataset: &Dataset, indices: &[usize]) -> HashSet<String> {
    indices
        .iter()
        .map(|&i| dataset.records()[i].id().to_string())
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn insert_then_read_a_thousand_records() {
    let store = Arc::new(InMemoryStore::new());
    let harness = BenchmarkHarness::new(shared(&store), harness_config());
    let dataset = dataset(1000);

    let insert = harness.insert_all(&dataset).await.unwrap();
    assert_eq!(all_succeeded(1000), insert.counts);
    assert_eq!(1000, insert.requests_issued);
    assert_eq!(5000.0, insert.request_charge);
    assert_eq!(1000, store.len().await);

    let individual = harness.read_individually(&dataset).await.unwrap();
    assert_eq!(Strategy::Individual, individual.strategy);
    assert_eq!(all_succeeded(1000), individual.counts);
    assert_eq!(1000, individual.requests_issued);
    assert_eq!(1000.0, individual.request_charge);

    let batched = harness.read_batched(&dataset, chunk(100)).await.unwrap();
    assert_eq!(Strategy::Batched { chunk_size: 100 }, batched.strategy);
    assert_eq!(all_succeeded(1000), batched.counts);
    assert_eq!(10, batched.requests_issued);
    assert_eq!(10.0 * (2.0 + 0.5 * 100.0), batched.request_charge);

    let requests = store.request_counts();
    assert_eq!(1000, requests.point_reads);
    assert_eq!(10, requests.batch_reads);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn run_reports_every_phase() {
    let store = Arc::new(
        InMemoryStore::builder()
            .latency(Duration::from_millis(1))
            .build(),
    );
    let harness = BenchmarkHarness::new(shared(&store), harness_config());
    let report = harness.run(&dataset(300), chunk(100)).await.unwrap();

    assert_eq!(300, report.records);
    assert_eq!(all_succeeded(300), report.insert.counts);
    assert_eq!(all_succeeded(300), report.individual.counts);
    assert_eq!(all_succeeded(300), report.batched.counts);
    assert_eq!(3, report.batched.requests_issued);
    assert!(report.individual.request_charge >= 0.0);
    assert!(report.batched.request_charge >= 0.0);
    assert!(report.individual.elapsed >= Duration::from_millis(1));
    assert!(report.to_string().contains("Read-many (chunks of 100)"));
}

#[tokio::test]
async fn empty_dataset_issues_no_requests() {
    let store = Arc::new(InMemoryStore::new());
    let harness = BenchmarkHarness::new(shared(&store), harness_config());
    let empty = dataset(0);

    let report = harness.run(&empty, chunk(100)).await.unwrap();
    for result in [&report.individual, &report.batched] {
        assert_eq!(Duration::ZERO, result.elapsed);
        assert_eq!(0.0, result.request_charge);
        assert_eq!(0, result.requests_issued);
        assert_eq!(OperationCounts::default(), result.counts);
    }
    assert_eq!(Duration::ZERO, report.insert.elapsed);
    assert_eq!(0, store.request_counts().total());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn oversized_chunk_issues_one_request() {
    let store = Arc::new(InMemoryStore::new());
    let harness = BenchmarkHarness::new(shared(&store), harness_config());
    let dataset = dataset(1000);
    harness.insert_all(&dataset).await.unwrap();

    let batched = harness.read_batched(&dataset, chunk(5000)).await.unwrap();
    assert_eq!(1, batched.requests_issued);
    assert_eq!(1, store.request_counts().batch_reads);
    assert_eq!(all_succeeded(1000), batched.counts);
    assert_eq!(2.0 + 0.5 * 1000.0, batched.request_charge);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn attempted_count_does_not_depend_on_chunk_size() {
    let store = Arc::new(InMemoryStore::new());
    let harness = BenchmarkHarness::new(shared(&store), harness_config());
    let dataset = dataset(1000);
    harness.insert_all(&dataset).await.unwrap();

    let individual = harness.read_individually(&dataset).await.unwrap();
    for size in [1, 7, 100, 999, 1000, 5000] {
        let batched = harness.read_batched(&dataset, chunk(size)).await.unwrap();
        assert_eq!(individual.counts.attempted, batched.counts.attempted);
        assert_eq!((1000 + size - 1) / size, batched.requests_issued);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn ten_thousand_concurrent_completions_are_all_counted() {
    let store = Arc::new(InMemoryStore::new());
    let harness = BenchmarkHarness::new(shared(&store), harness_config());
    let dataset = dataset(10_000);

    let insert = harness.insert_all(&dataset).await.unwrap();
    assert_eq!(all_succeeded(10_000), insert.counts);

    let individual = harness.read_individually(&dataset).await.unwrap();
    assert_eq!(all_succeeded(10_000), individual.counts);
    assert_eq!(10_000, individual.requests_issued);
    assert_eq!(10_000.0, individual.request_charge);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn non_success_statuses_are_counted_separately() {
    let dataset = dataset(1000);
    let store = Arc::new(FaultyStore {
        throttled: ids(&dataset, &[0, 150, 999]),
        ..Default::default()
    });
    let harness = BenchmarkHarness::new(shared(&store), harness_config());
    harness.insert_all(&dataset).await.unwrap();

    let individual = harness.read_individually(&dataset).await.unwrap();
    assert_eq!(
        OperationCounts {
            attempted: 1000,
            succeeded: 997,
            non_success: 3,
            failed: 0
        },
        individual.counts
    );

    // The throttled ids land in three different chunks.
    let batched = harness.read_batched(&dataset, chunk(100)).await.unwrap();
    assert_eq!(
        OperationCounts {
            attempted: 1000,
            succeeded: 700,
            non_success: 300,
            failed: 0
        },
        batched.counts
    );
    assert_eq!(10, batched.requests_issued);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn submission_errors_fail_only_their_keys() {
    let dataset = dataset(200);
    let store = Arc::new(FaultyStore {
        unreachable: ids(&dataset, &[5]),
        ..Default::default()
    });
    let harness = BenchmarkHarness::new(shared(&store), harness_config());
    harness.insert_all(&dataset).await.unwrap();

    let individual = harness.read_individually(&dataset).await.unwrap();
    assert_eq!(
        OperationCounts {
            attempted: 200,
            succeeded: 199,
            non_success: 0,
            failed: 1
        },
        individual.counts
    );

    let batched = harness.read_batched(&dataset, chunk(50)).await.unwrap();
    assert_eq!(
        OperationCounts {
            attempted: 200,
            succeeded: 150,
            non_success: 0,
            failed: 50
        },
        batched.counts
    );
}

#[tokio::test]
async fn missing_records_are_non_success() {
    let store = Arc::new(InMemoryStore::new());
    let harness = BenchmarkHarness::new(shared(&store), harness_config());
    let dataset = dataset(10);

    let individual = harness.read_individually(&dataset).await.unwrap();
    assert_eq!(10, individual.counts.non_success);
    assert_eq!(0, individual.counts.succeeded);

    let batched = harness.read_batched(&dataset, chunk(4)).await.unwrap();
    assert_eq!(10, batched.counts.attempted);
    assert_eq!(10, batched.counts.non_success);
    assert_eq!(3, batched.requests_issued);
}

#[tokio::test]
async fn inserting_twice_conflicts() {
    let store = Arc::new(InMemoryStore::new());
    let harness = BenchmarkHarness::new(shared(&store), harness_config());
    let dataset = dataset(25);

    harness.insert_all(&dataset).await.unwrap();
    let again = harness.insert_all(&dataset).await.unwrap();
    assert_eq!(
        OperationCounts {
            attempted: 25,
            succeeded: 0,
            non_success: 25,
            failed: 0
        },
        again.counts
    );
    assert_eq!(25, store.len().await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn lost_responses_hit_the_completion_timeout() {
    let dataset = dataset(20);
    let store = Arc::new(FaultyStore {
        silent: ids(&dataset, &[3]),
        ..Default::default()
    });
    let harness = BenchmarkHarness::new(
        shared(&store),
        HarnessConfig::new(Duration::from_millis(200)),
    );
    harness.insert_all(&dataset).await.unwrap();

    let err = harness.read_individually(&dataset).await.unwrap_err();
    assert!(err.is_completion_timeout());
    assert_eq!("individual reads", err.phase());
    assert_eq!(
        "individual reads: only 19 of 20 requests completed before the timeout",
        err.to_string()
    );

    let err = harness
        .read_batched(&dataset, chunk(5))
        .await
        .unwrap_err();
    assert!(err.is_completion_timeout());
    assert_eq!("batched reads", err.phase());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn closed_store_aborts_the_phase() {
    let store = Arc::new(InMemoryStore::new());
    let harness = BenchmarkHarness::new(shared(&store), harness_config());
    let dataset = dataset(100);
    harness.insert_all(&dataset).await.unwrap();

    store.shutdown();
    let err = harness.read_individually(&dataset).await.unwrap_err();
    assert!(err.is_submission_channel_closed());
    let err = harness
        .read_batched(&dataset, chunk(10))
        .await
        .unwrap_err();
    assert!(err.is_submission_channel_closed());
    assert_eq!(0, store.request_counts().point_reads);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn in_flight_requests_respect_the_cap() {
    let store = Arc::new(GaugeStore::default());
    let harness = BenchmarkHarness::new(
        shared(&store),
        harness_config().max_in_flight(NonZeroUsize::new(8).unwrap()),
    );
    let dataset = dataset(200);

    harness.insert_all(&dataset).await.unwrap();
    harness.read_individually(&dataset).await.unwrap();
    harness.read_batched(&dataset, chunk(10)).await.unwrap();

    let peak = store.peak.load(Ordering::Acquire);
    assert!(peak <= 8, "peak in-flight requests was {peak}");
    assert!(peak > 0);
}

#[tokio::test]
async fn both_strategies_read_the_stored_partition_key() {
    let store = Arc::new(InMemoryStore::new());
    let harness = BenchmarkHarness::new(shared(&store), harness_config());
    let dataset = Dataset::new(
        (0..12)
            .map(|i| {
                let partition_key = format!("tenant-{}", i % 3);
                Record::new(ItemIdentity::new(format!("item-{i}"), partition_key))
            })
            .collect(),
    );
    harness.insert_all(&dataset).await.unwrap();

    let individual = harness.read_individually(&dataset).await.unwrap();
    assert_eq!(all_succeeded(12), individual.counts);
    let batched = harness.read_batched(&dataset, chunk(5)).await.unwrap();
    assert_eq!(all_succeeded(12), batched.counts);
}
