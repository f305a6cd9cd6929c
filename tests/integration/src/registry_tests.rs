//! Informer registry integration tests.
//!
//! These drive [`InformersMap`] directly over an in-memory cluster with real
//! informers.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{cluster, generated_kind, pods, services, CountingFactory};
use futures::future::join_all;
use kinformer::prelude::*;
use kinformer_cache::InformersMap;
use tokio::sync::Barrier;

fn registry(cluster: &Arc<MemoryCluster>, factory: Arc<CountingFactory>) -> InformersMap {
    let mapper = StaticRestMapper::new()
        .with(pods(), ResourceDescriptor::namespaced("", "v1", "pods"))
        .with(services(), ResourceDescriptor::namespaced("", "v1", "services"));
    let mapper = (0..16).fold(mapper, |mapper, i| {
        let (kind, resource) = generated_kind(i);
        cluster.register(kind.clone(), resource.clone());
        mapper.with(kind, resource)
    });

    InformersMap::new(Arc::new(mapper), factory, Duration::from_secs(3600))
        .with_sync_poll_interval(Duration::from_millis(10))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn contended_creation_builds_one_informer() {
    let cluster = cluster();
    let factory = Arc::new(CountingFactory::new(cluster.clone()).with_delay(Duration::from_millis(20)));
    let map = Arc::new(registry(&cluster, factory.clone()));
    let barrier = Arc::new(Barrier::new(64));

    let handles: Vec<_> = (0..64)
        .map(|_| {
            let map = Arc::clone(&map);
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move {
                barrier.wait().await;
                map.get_or_create(&pods()).await
            })
        })
        .collect();

    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|r| r.expect("task panicked").expect("creation failed"))
        .collect();

    let first = &results[0].0;
    assert!(results.iter().all(|(entry, _)| Arc::ptr_eq(entry, first)));
    assert_eq!(results.iter().filter(|(_, created)| *created).count(), 1);
    assert_eq!(factory.creates(), 1);
}

#[tokio::test]
async fn held_construction_does_not_block_other_kinds() {
    let cluster = cluster();
    let factory = Arc::new(CountingFactory::new(cluster.clone()).holding(services()));
    let map = Arc::new(registry(&cluster, factory.clone()));

    let held = {
        let map = Arc::clone(&map);
        tokio::spawn(async move { map.get_or_create(&services()).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    let (entry, created) = tokio::time::timeout(Duration::from_secs(1), map.get_or_create(&pods()))
        .await
        .expect("pods blocked behind services")
        .unwrap();
    assert!(created);
    assert_eq!(entry.kind(), &pods());
    assert!(!held.is_finished());

    factory.release();
    let (entry, created) = held.await.unwrap().unwrap();
    assert!(created);
    assert_eq!(entry.kind(), &services());
    assert_eq!(factory.creates(), 2);
}

#[tokio::test]
async fn failure_on_one_kind_leaves_others_alone() {
    let cluster = cluster();
    let factory = Arc::new(CountingFactory::new(cluster.clone()).failing(1));
    let map = registry(&cluster, factory.clone());

    assert!(map.get_or_create(&pods()).await.is_err());
    assert!(map.for_kind(&pods()).is_none());

    map.get_or_create(&services()).await.unwrap();
    map.get_or_create(&pods()).await.unwrap();
    assert_eq!(map.kinds(), vec![pods(), services()]);
    assert_eq!(map.stats().construction_failures(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn start_races_with_creation() {
    let cluster = cluster();
    let factory = Arc::new(CountingFactory::new(cluster.clone()));
    let map = Arc::new(registry(&cluster, factory));
    let stop = StopHandle::new();
    let barrier = Arc::new(Barrier::new(17));

    let creators: Vec<_> = (0..16)
        .map(|i| {
            let map = Arc::clone(&map);
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move {
                barrier.wait().await;
                map.get_or_create(&generated_kind(i).0).await
            })
        })
        .collect();

    barrier.wait().await;
    map.start(stop.signal()).unwrap();

    for handle in creators {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(map.len(), 16);
    assert!(map.entries().iter().all(|e| e.is_started()));
    assert!(map.wait_for_cache_sync(stop.signal()).await);
}

#[tokio::test]
async fn wait_for_cache_sync_covers_every_kind() {
    let cluster = cluster();
    let factory = Arc::new(CountingFactory::new(cluster.clone()));
    let map = registry(&cluster, factory);
    let stop = StopHandle::new();

    for i in 0..8 {
        map.get_or_create(&generated_kind(i).0).await.unwrap();
    }
    map.get_or_create(&pods()).await.unwrap();
    map.start(stop.signal()).unwrap();

    assert!(map.wait_for_cache_sync(stop.signal()).await);
    assert!(map.entries().iter().all(|e| e.has_synced()));
    assert_eq!(map.for_kind(&pods()).unwrap().store().len(), 4);
}

#[tokio::test]
async fn second_start_is_rejected() {
    let cluster = cluster();
    let map = registry(&cluster, Arc::new(CountingFactory::new(cluster.clone())));
    let stop = StopHandle::new();

    map.start(stop.signal()).unwrap();
    assert!(matches!(map.start(stop.signal()), Err(CacheError::AlreadyStarted)));
}
