//! Cache integration tests.

mod common;

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use common::{cache, cluster, eventually, keys, pod, pods, services, CountingFactory};
use kinformer::prelude::*;
use kinformer_core::ConstructionStage;

#[tokio::test]
async fn cache_follows_cluster_changes() {
    let cluster = cluster();
    let cache = cache(&cluster).await;
    let stop = StopHandle::new();

    cache.get_informer_for_kind(&pods()).await.unwrap();
    cache.start(stop.signal()).unwrap();
    assert!(cache.wait_for_cache_sync(stop.signal()).await);

    let all = cache.list(&pods(), &ListOptions::new()).await.unwrap();
    assert_eq!(all.len(), 4);

    // Create
    cluster.apply(&pods(), pod("default", "web-2", "node-2")).unwrap();
    let reader = &cache;
    eventually(|| async move {
        reader
            .get(&pods(), &ObjectKey::namespaced("default", "web-2"))
            .await
            .is_ok()
    })
    .await;

    // Delete
    cluster.delete(&pods(), &ObjectKey::namespaced("default", "db-0"));
    eventually(|| async move {
        matches!(
            reader.get(&pods(), &ObjectKey::namespaced("default", "db-0")).await,
            Err(CacheError::NotFound { .. })
        )
    })
    .await;

    let web = cache
        .list(&pods(), &ListOptions::new().matching_label("app", "web"))
        .await
        .unwrap();
    assert_eq!(
        keys(&web),
        vec!["default/web-0", "default/web-1", "default/web-2", "prod/web-0"]
    );
}

#[tokio::test]
async fn field_index_registration_order_independent() {
    let cluster = cluster();
    let stop = StopHandle::new();

    // Registered before the informer exists
    let early = cache(&cluster).await;
    early
        .index_field_for_kind(&pods(), "spec.nodeName", dynamic_field("spec.nodeName"))
        .unwrap();
    early.start(stop.signal()).unwrap();

    // Registered after the informer synced
    let late = cache(&cluster).await;
    late.start(stop.signal()).unwrap();
    late.get_informer_for_kind(&pods()).await.unwrap();
    assert!(late.wait_for_cache_sync(stop.signal()).await);
    late.index_field_for_kind(&pods(), "spec.nodeName", dynamic_field("spec.nodeName"))
        .unwrap();

    for options in [
        ListOptions::new().matching_field("spec.nodeName", "node-1"),
        ListOptions::new()
            .in_namespace("prod")
            .matching_field("spec.nodeName", "node-3"),
        ListOptions::new().matching_field("spec.nodeName", "node-9"),
    ] {
        let a = early.list(&pods(), &options).await.unwrap();
        let b = late.list(&pods(), &options).await.unwrap();
        assert_eq!(keys(&a), keys(&b));
    }

    let on_node_1 = early
        .list(&pods(), &ListOptions::new().matching_field("spec.nodeName", "node-1"))
        .await
        .unwrap();
    assert_eq!(keys(&on_node_1), vec!["default/db-0", "default/web-0"]);
}

#[tokio::test]
async fn field_index_duplicate_policy() {
    let cache = cache(&cluster()).await;
    let extract = dynamic_field("spec.nodeName");

    cache
        .index_field_for_kind(&pods(), "spec.nodeName", Arc::clone(&extract))
        .unwrap();
    cache
        .index_field_for_kind(&pods(), "spec.nodeName", Arc::clone(&extract))
        .unwrap();

    let err = cache
        .index_field_for_kind(&pods(), "spec.nodeName", dynamic_field("spec.nodeName"))
        .unwrap_err();
    assert!(matches!(err, CacheError::DuplicateIndex { .. }));

    // Same field on a different kind is fine
    cache
        .index_field_for_kind(&services(), "spec.nodeName", dynamic_field("spec.nodeName"))
        .unwrap();
}

#[tokio::test]
async fn multi_valued_index_query_matches_either_key() {
    let cluster = cluster();
    let cache = cache(&cluster).await;
    let stop = StopHandle::new();

    let aliases: IndexFunc = Arc::new(|obj: &dyn Object| {
        vec![format!("short-{}", obj.name()), format!("long-{}", obj.name())]
    });
    cache.index_field_for_kind(&pods(), "aliases", aliases).unwrap();
    cache.start(stop.signal()).unwrap();

    for alias in ["short-db-0", "long-db-0"] {
        let found = cache
            .list(&pods(), &ListOptions::new().matching_field("aliases", alias))
            .await
            .unwrap();
        assert_eq!(keys(&found), vec!["default/db-0"]);
    }
}

#[tokio::test]
async fn wait_for_cache_sync_false_when_stopped_before_list() {
    let cluster = cluster();
    cluster.pause_lists();
    let cache = cache(&cluster).await;
    let stop = StopHandle::new();

    cache.get_informer_for_kind(&pods()).await.unwrap();
    cache.start(stop.signal()).unwrap();

    let stopper = stop.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        stopper.stop();
    });

    assert!(!cache.wait_for_cache_sync(stop.signal()).await);
    assert_eq!(cache.state(), CacheState::Stopped);
}

#[tokio::test]
async fn cancelled_wait_leaves_informers_running() {
    let cluster = cluster();
    cluster.pause_lists();
    let cache = cache(&cluster).await;
    let run = StopHandle::new();
    let wait = StopHandle::new();

    cache.get_informer_for_kind(&pods()).await.unwrap();
    cache.start(run.signal()).unwrap();

    wait.stop();
    assert!(!cache.wait_for_cache_sync(wait.signal()).await);

    cluster.resume_lists();
    assert!(cache.wait_for_cache_sync(run.signal()).await);
}

#[tokio::test]
async fn informer_created_after_start_is_started() {
    let cluster = cluster();
    let cache = cache(&cluster).await;
    let stop = StopHandle::new();

    cache.start(stop.signal()).unwrap();
    let informer = cache.get_informer_for_kind(&services()).await.unwrap();

    let informer = &informer;
    eventually(|| async move { informer.has_synced() }).await;
    assert!(cache.wait_for_cache_sync(stop.signal()).await);
}

#[tokio::test]
async fn repeated_lookups_construct_once() {
    let cluster = cluster();
    let factory = Arc::new(CountingFactory::new(cluster.clone()));
    let cache = InformerCache::builder()
        .client(cluster)
        .informer_factory(factory.clone())
        .build()
        .await
        .unwrap();

    for _ in 0..10 {
        cache.get_informer_for_kind(&pods()).await.unwrap();
    }
    cache.get_informer(&pod("default", "web-0", "node-1")).await.unwrap();

    assert_eq!(factory.creates(), 1);
    assert_eq!(cache.stats().informer_hits(), 10);
}

#[tokio::test]
async fn construction_failure_is_not_remembered() {
    let cluster = cluster();
    let factory = Arc::new(CountingFactory::new(cluster.clone()).failing(1));
    let cache = InformerCache::builder()
        .client(cluster)
        .informer_factory(factory.clone())
        .build()
        .await
        .unwrap();

    let err = cache.get_informer_for_kind(&pods()).await.unwrap_err();
    assert!(matches!(
        err,
        CacheError::PrimitiveConstruction {
            stage: ConstructionStage::Informer,
            ..
        }
    ));
    assert!(err.is_retryable());

    cache.get_informer_for_kind(&pods()).await.unwrap();
    assert_eq!(factory.creates(), 1);
}

#[tokio::test]
async fn unknown_kind_fails_at_mapping() {
    let cache = cache(&cluster()).await;

    let err = cache
        .get_informer_for_kind(&KindKey::new("batch", "v1", "CronJob"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CacheError::PrimitiveConstruction {
            stage: ConstructionStage::Mapping,
            ..
        }
    ));
}

#[tokio::test]
async fn discovery_failure_prevents_cache() {
    let cluster = cluster();
    cluster.set_discovery_failure(true);

    let err = InformerCache::new(cluster, Options::new()).await.unwrap_err();
    assert!(matches!(err, CacheError::MapperDiscovery { .. }));
}

/// A typed object resolved through a scheme.
#[derive(Debug, Clone)]
struct Node {
    name: String,
    ready: bool,
}

impl Object for Node {
    fn name(&self) -> &str {
        &self.name
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[tokio::test]
async fn typed_objects_resolve_through_scheme() {
    let nodes = KindKey::new("", "v1", "Node");
    let cluster = cluster();
    cluster.register(nodes.clone(), ResourceDescriptor::cluster_scoped("", "v1", "nodes"));
    for (name, ready) in [("node-1", true), ("node-2", false)] {
        cluster
            .apply(&nodes, Node { name: name.to_string(), ready })
            .unwrap();
    }

    let scheme = Arc::new(Scheme::new());
    scheme.register::<Node>(nodes.clone());

    let cache = InformerCache::builder()
        .client(cluster)
        .scheme(scheme)
        .build()
        .await
        .unwrap();
    let stop = StopHandle::new();

    let probe = Node { name: String::new(), ready: false };
    let informer = cache.get_informer(&probe).await.unwrap();
    assert_eq!(informer.kind(), &nodes);

    cache
        .index_field(
            &probe,
            "status.ready",
            Arc::new(|obj: &dyn Object| {
                obj.as_any()
                    .downcast_ref::<Node>()
                    .map(|n| vec![n.ready.to_string()])
                    .unwrap_or_default()
            }),
        )
        .unwrap();
    cache.start(stop.signal()).unwrap();

    let ready = cache
        .list(&nodes, &ListOptions::new().matching_field("status.ready", "true"))
        .await
        .unwrap();
    assert_eq!(keys(&ready), vec!["node-1"]);
    assert!(downcast::<Node>(&ready[0]).is_some_and(|n| n.ready));
}

#[tokio::test]
async fn unregistered_typed_object_fails_resolution() {
    let cache = cache(&cluster()).await;
    let probe = Node { name: "x".to_string(), ready: true };

    let err = cache.get_informer(&probe).await.unwrap_err();
    assert!(matches!(err, CacheError::Resolution { .. }));
}
