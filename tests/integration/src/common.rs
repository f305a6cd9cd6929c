//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kinformer::prelude::*;
use kinformer_cache::{InformerFactory, SharedInformerFactory};
use serde_json::json;
use tokio::sync::Notify;

pub fn pods() -> KindKey {
    KindKey::new("", "v1", "Pod")
}

pub fn services() -> KindKey {
    KindKey::new("", "v1", "Service")
}

/// Kind number `i` of a generated API group.
pub fn generated_kind(i: usize) -> (KindKey, ResourceDescriptor) {
    (
        KindKey::new("load.example.com", "v1", format!("Widget{i}")),
        ResourceDescriptor::namespaced("load.example.com", "v1", format!("widget{i}s")),
    )
}

pub fn pod(namespace: &str, name: &str, node: &str) -> DynamicObject {
    DynamicObject::new(pods(), name)
        .within(namespace)
        .label("app", name.rsplit_once('-').map_or(name, |(app, _)| app))
        .data(json!({"spec": {"nodeName": node}}))
}

/// A cluster serving pods and services, with a few pods.
pub fn cluster() -> Arc<MemoryCluster> {
    let cluster = Arc::new(MemoryCluster::new());
    cluster.register(pods(), ResourceDescriptor::namespaced("", "v1", "pods"));
    cluster.register(services(), ResourceDescriptor::namespaced("", "v1", "services"));

    for (ns, name, node) in [
        ("default", "web-0", "node-1"),
        ("default", "web-1", "node-2"),
        ("default", "db-0", "node-1"),
        ("prod", "web-0", "node-3"),
    ] {
        cluster.apply(&pods(), pod(ns, name, node)).unwrap();
    }
    cluster
}

pub async fn cache(cluster: &Arc<MemoryCluster>) -> InformerCache {
    InformerCache::builder()
        .client(cluster.clone())
        .sync_poll_interval(Duration::from_millis(10))
        .build()
        .await
        .unwrap()
}

pub fn keys(objects: &[BoxObject]) -> Vec<String> {
    objects
        .iter()
        .map(|o| ObjectKey::of(o.as_ref()).to_string())
        .collect()
}

/// Poll `condition` until it holds or two seconds pass.
pub async fn eventually<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition().await {
        assert!(tokio::time::Instant::now() < deadline, "condition not met in time");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Wraps [`SharedInformerFactory`], counting constructions.
///
/// Can slow down every construction, hold one kind until released, or
/// fail a number of constructions.
#[derive(Debug)]
pub struct CountingFactory {
    inner: SharedInformerFactory,
    creates: AtomicUsize,
    failures_left: AtomicUsize,
    delay: Option<Duration>,
    held: Option<KindKey>,
    release: Notify,
}

impl CountingFactory {
    pub fn new(cluster: Arc<MemoryCluster>) -> Self {
        Self {
            inner: SharedInformerFactory::new(cluster),
            creates: AtomicUsize::new(0),
            failures_left: AtomicUsize::new(0),
            delay: None,
            held: None,
            release: Notify::new(),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn holding(mut self, kind: KindKey) -> Self {
        self.held = Some(kind);
        self
    }

    pub fn failing(self, times: usize) -> Self {
        self.failures_left.store(times, Ordering::SeqCst);
        self
    }

    pub fn release(&self) {
        self.release.notify_one();
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InformerFactory for CountingFactory {
    async fn create(
        &self,
        kind: &KindKey,
        resource: ResourceDescriptor,
        resync: Duration,
    ) -> Result<Arc<dyn Informer>> {
        if self.held.as_ref() == Some(kind) {
            self.release.notified().await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(CacheError::Client {
                message: "connection refused".to_string(),
                source: None,
            });
        }

        self.creates.fetch_add(1, Ordering::SeqCst);
        self.inner.create(kind, resource, resync).await
    }
}
