//! Simple Informer Cache Example
//!
//! This example demonstrates a read-through cache that:
//! - Serves pods and nodes from an in-memory cluster
//! - Indexes pods by the node they run on
//! - Keeps changing the cluster and reads the changes back from the cache
//!
//! Run with:
//! ```bash
//! cargo run -p simple-cache
//! ```

use std::sync::Arc;
use std::time::Duration;

use kinformer::prelude::*;
use serde_json::json;
use tokio::signal;
use tracing::{info, info_span, Level};
use tracing_subscriber::FmtSubscriber;

/// Configuration for the example.
struct Config {
    /// Number of nodes in the sample cluster.
    num_nodes: usize,
    /// Pods created per node at startup.
    pods_per_node: usize,
    /// Interval between cluster changes.
    churn_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_nodes: 3,
            pods_per_node: 4,
            churn_interval: Duration::from_secs(5),
        }
    }
}

fn pod_kind() -> KindKey {
    KindKey::new("", "v1", "Pod")
}

fn node_kind() -> KindKey {
    KindKey::new("", "v1", "Node")
}

fn pod(name: &str, node: &str) -> DynamicObject {
    DynamicObject::new(pod_kind(), name)
        .within("default")
        .label("app", "web")
        .data(json!({"spec": {"nodeName": node}}))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting simple informer cache example");
    info!("{}", kinformer::version::version_string());

    let config = Config::default();

    let cluster = Arc::new(MemoryCluster::new());
    setup_sample_data(&cluster, &config)?;

    // Create the cache; the REST mapper comes from discovery
    let cache = InformerCache::builder()
        .client(cluster.clone())
        .resync_period(Duration::from_secs(300))
        .span(info_span!("cache"))
        .build()
        .await?;

    cache.index_field_for_kind(&pod_kind(), "spec.nodeName", dynamic_field("spec.nodeName"))?;
    cache.get_informer_for_kind(&pod_kind()).await?;
    cache.get_informer_for_kind(&node_kind()).await?;

    let stop = StopHandle::new();
    cache.start(stop.signal())?;
    if !cache.wait_for_cache_sync(stop.signal()).await {
        anyhow::bail!("caches did not sync");
    }
    info!(kinds = cache.kinds().len(), "caches synced");

    // Keep the cluster changing in the background
    let churn = {
        let cluster = Arc::clone(&cluster);
        let interval = config.churn_interval;
        let num_nodes = config.num_nodes;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            let mut generation = 0usize;
            loop {
                ticker.tick().await;
                generation += 1;
                let name = format!("burst-{}", generation);
                let node = format!("node-{}", generation % num_nodes);
                if let Err(err) = cluster.apply(&pod_kind(), pod(&name, &node)) {
                    tracing::warn!(error = %err, "failed to create pod");
                }
                info!("Created pod {} on {}", name, node);
            }
        })
    };

    // Report what the cache sees
    let reporter = {
        let cache = cache.clone();
        let interval = config.churn_interval;
        let num_nodes = config.num_nodes;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                for n in 0..num_nodes {
                    let node = format!("node-{}", n);
                    match cache
                        .list(&pod_kind(), &ListOptions::new().matching_field("spec.nodeName", &node))
                        .await
                    {
                        Ok(pods) => info!("{} runs {} pods", node, pods.len()),
                        Err(err) => tracing::warn!(error = %err, "list failed"),
                    }
                }
                let stats = cache.stats();
                info!(
                    "Cache stats: hits={}, misses={}, hit_rate={:.2}%",
                    stats.informer_hits(),
                    stats.informer_misses(),
                    stats.hit_rate() * 100.0
                );
            }
        })
    };

    info!("Press Ctrl+C to shutdown");

    // Wait for shutdown signal
    signal::ctrl_c().await?;

    info!("Shutting down...");
    stop.stop();
    churn.abort();
    reporter.abort();
    Ok(())
}

/// Set up sample data in the cluster.
fn setup_sample_data(cluster: &MemoryCluster, config: &Config) -> anyhow::Result<()> {
    cluster.register(pod_kind(), ResourceDescriptor::namespaced("", "v1", "pods"));
    cluster.register(node_kind(), ResourceDescriptor::cluster_scoped("", "v1", "nodes"));

    for n in 0..config.num_nodes {
        let node = format!("node-{}", n);
        cluster.apply(&node_kind(), DynamicObject::new(node_kind(), node.as_str()))?;
        for p in 0..config.pods_per_node {
            cluster.apply(&pod_kind(), pod(&format!("web-{}-{}", n, p), &node))?;
        }
    }

    info!(
        "Initialized cluster with {} nodes and {} pods",
        cluster.object_count(&node_kind()),
        cluster.object_count(&pod_kind())
    );
    Ok(())
}
