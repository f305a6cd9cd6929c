//! Load tests for the informer cache.
//!
//! These tests verify the system can handle high load scenarios:
//! - Hundreds of kinds requested concurrently
//! - Thousands of cached objects behind field indexes
//! - Concurrent readers while the cluster keeps changing
//!
//! Run with: `cargo test --package integration-tests --test load_tests -- --nocapture`

mod common;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{eventually, generated_kind, pod, pods};
use kinformer::prelude::*;
use tokio::sync::Barrier;

fn fast_relist() -> InformerConfig {
    InformerConfig {
        initial_backoff: Duration::from_millis(10),
        max_backoff: Duration::from_millis(100),
    }
}

/// Cluster serving pods plus `kinds` generated kinds.
fn cluster_with_kinds(kinds: usize) -> Arc<MemoryCluster> {
    let cluster = Arc::new(MemoryCluster::new());
    cluster.register(pods(), ResourceDescriptor::namespaced("", "v1", "pods"));
    for i in 0..kinds {
        let (kind, resource) = generated_kind(i);
        cluster.register(kind, resource);
    }
    cluster
}

async fn build(cluster: &Arc<MemoryCluster>) -> InformerCache {
    InformerCache::builder()
        .client(cluster.clone())
        .informer_config(fast_relist())
        .sync_poll_interval(Duration::from_millis(5))
        .build()
        .await
        .unwrap()
}

/// Every task asks for every kind; each kind is still built once.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_200_kinds_concurrent_requests() {
    let num_kinds = 200;
    let num_tasks = 10;
    let cluster = cluster_with_kinds(num_kinds);
    let cache = build(&cluster).await;
    let barrier = Arc::new(Barrier::new(num_tasks));

    let start = Instant::now();

    let mut handles = Vec::new();
    for task_id in 0..num_tasks {
        let cache = cache.clone();
        let barrier = Arc::clone(&barrier);
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            // Each task walks the kinds from a different offset
            for i in 0..num_kinds {
                let (kind, _) = generated_kind((i + task_id * 20) % num_kinds);
                cache.get_informer_for_kind(&kind).await.unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.expect("Task panicked");
    }

    let duration = start.elapsed();
    let total = (num_kinds * num_tasks) as f64;
    println!(
        "Resolved {} informer requests in {:?} ({:.2} µs/op)",
        total,
        duration,
        duration.as_micros() as f64 / total
    );

    let stats = cache.stats();
    println!(
        "Registry stats: hits={}, misses={}, created={}, hit_rate={:.2}%",
        stats.informer_hits(),
        stats.informer_misses(),
        stats.informers_created(),
        stats.hit_rate() * 100.0
    );

    assert_eq!(stats.informers_created(), num_kinds as u64);
    assert_eq!(cache.kinds().len(), num_kinds);

    let stop = StopHandle::new();
    cache.start(stop.signal()).unwrap();
    assert!(cache.wait_for_cache_sync(stop.signal()).await);
}

/// Indexed queries over 5000 cached pods.
#[tokio::test]
async fn test_5000_objects_indexed_queries() {
    let num_pods = 5000;
    let num_nodes = 50;
    let cluster = cluster_with_kinds(0);

    for i in 0..num_pods {
        let ns = if i % 2 == 0 { "even" } else { "odd" };
        cluster
            .apply(&pods(), pod(ns, &format!("web-{i}"), &format!("node-{}", i % num_nodes)))
            .unwrap();
    }

    let cache = build(&cluster).await;
    cache
        .index_field_for_kind(&pods(), "spec.nodeName", dynamic_field("spec.nodeName"))
        .unwrap();
    let stop = StopHandle::new();
    cache.start(stop.signal()).unwrap();

    let start = Instant::now();
    cache.get_informer_for_kind(&pods()).await.unwrap();
    assert!(cache.wait_for_cache_sync(stop.signal()).await);
    println!("Synced {} pods in {:?}", num_pods, start.elapsed());

    let start = Instant::now();
    for n in 0..num_nodes {
        let found = cache
            .list(
                &pods(),
                &ListOptions::new().matching_field("spec.nodeName", format!("node-{n}")),
            )
            .await
            .unwrap();
        assert_eq!(found.len(), num_pods / num_nodes);
    }
    let duration = start.elapsed();
    println!(
        "Ran {} field queries in {:?} ({:.2} µs/op)",
        num_nodes,
        duration,
        duration.as_micros() as f64 / num_nodes as f64
    );

    // Namespace-scoped field query
    let even = cache
        .list(
            &pods(),
            &ListOptions::new()
                .in_namespace("even")
                .matching_field("spec.nodeName", "node-0"),
        )
        .await
        .unwrap();
    assert_eq!(even.len(), num_pods / num_nodes);

    let odd = cache
        .list(
            &pods(),
            &ListOptions::new()
                .in_namespace("odd")
                .matching_field("spec.nodeName", "node-0"),
        )
        .await
        .unwrap();
    assert!(odd.is_empty());
}

/// Readers keep reading while the cluster changes underneath.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_readers_during_writes() {
    let num_readers = 8;
    let ops_per_reader = 500;
    let num_writes = 1000;
    let cluster = cluster_with_kinds(0);
    let cache = build(&cluster).await;
    let stop = StopHandle::new();

    cache.start(stop.signal()).unwrap();
    cache.get_informer_for_kind(&pods()).await.unwrap();
    assert!(cache.wait_for_cache_sync(stop.signal()).await);

    let barrier = Arc::new(Barrier::new(num_readers + 1));
    let read_count = Arc::new(AtomicU64::new(0));

    let start = Instant::now();
    let mut handles = Vec::new();

    for _ in 0..num_readers {
        let cache = cache.clone();
        let barrier = Arc::clone(&barrier);
        let read_count = Arc::clone(&read_count);
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            for _ in 0..ops_per_reader {
                cache.list(&pods(), &ListOptions::new()).await.unwrap();
                read_count.fetch_add(1, Ordering::Relaxed);
            }
        }));
    }

    let writer = {
        let cluster = Arc::clone(&cluster);
        let barrier = Arc::clone(&barrier);
        tokio::spawn(async move {
            barrier.wait().await;
            for i in 0..num_writes {
                cluster
                    .apply(&pods(), pod("default", &format!("web-{i}"), "node-1"))
                    .unwrap();
                if i % 100 == 0 {
                    tokio::task::yield_now().await;
                }
            }
        })
    };

    for handle in handles {
        handle.await.expect("Task panicked");
    }
    writer.await.expect("Task panicked");

    let duration = start.elapsed();
    let reads = read_count.load(Ordering::Relaxed);
    println!(
        "Concurrent reads: {} lists during {} writes in {:?} ({:.0} lists/sec)",
        reads,
        num_writes,
        duration,
        reads as f64 / duration.as_secs_f64()
    );
    assert_eq!(reads, (num_readers * ops_per_reader) as u64);

    // The cache catches up with the cluster, relisting if the watch fell behind
    let reader = &cache;
    eventually(|| async move {
        reader.list(&pods(), &ListOptions::new()).await.unwrap().len() == num_writes
    })
    .await;
}
