//! Firehose Ingest — Binary Entrypoint
//! Wires the connection manager, rule engine, classification pipeline,
//! metrics collector, and the operational HTTP server, then runs the
//! consumption loop until shutdown.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use firehose_ingest::collector::DataCollector;
use firehose_ingest::connection::{ConnectionManager, Publisher};
use firehose_ingest::consumer::Consumer;
use firehose_ingest::storage::{MemoryStore, Storage};
use firehose_ingest::transport::jetstream::JetstreamTransport;
use firehose_ingest::transport::{DeliveryQuality, Transport};
use firehose_ingest::{api, classify, rules, AppConfig};

fn init_tracing(dev_mode: bool) {
    let default = if dev_mode {
        "firehose_ingest=debug,info"
    } else {
        "firehose_ingest=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    // Fatal before serving: the process must not start half-configured.
    let cfg = AppConfig::from_env().context("loading configuration")?;
    init_tracing(cfg.dev_mode);
    info!(dev_mode = cfg.dev_mode, feed = %cfg.jetstream_url, "starting firehose ingest");

    // Operational HTTP surface (health + Prometheus).
    let prometheus = api::init_prometheus();
    let addr = format!("{}:{}", cfg.host, cfg.server_port);
    tokio::spawn(async move {
        if let Err(e) = api::serve(addr, api::router(prometheus)).await {
            warn!(error = %e, "health server failed");
        }
    });

    let storage: Arc<dyn Storage> = Arc::new(MemoryStore::new());
    let rules = rules::from_config(&cfg);
    let pipeline = classify::from_config(&cfg);
    info!(rules = rules.len(), "rule engine initialized");

    let transport: Arc<dyn Transport> = Arc::new(JetstreamTransport::new(
        cfg.jetstream_url.clone(),
        cfg.feed_collection.clone(),
    ));
    let manager = Arc::new(ConnectionManager::new(transport));
    let events = manager
        .take_events()
        .expect("event stream taken once at startup");

    // Inbound consumption wants at-least-once delivery; registered before
    // the connect loop starts so the first replay picks it up.
    manager
        .subscribe(&cfg.feed_collection, DeliveryQuality::AtLeastOnce)
        .await?;
    let manager_task = manager.start();

    let publisher: Option<Arc<dyn Publisher>> = cfg
        .publish_enabled
        .then(|| Arc::clone(&manager) as Arc<dyn Publisher>);

    let mut collector = DataCollector::new(
        Arc::clone(&storage),
        Duration::from_secs(cfg.metrics_interval_secs),
    );
    if let Some(publisher) = &publisher {
        collector =
            collector.with_publisher(Arc::clone(publisher), cfg.publish_metrics_topic.clone());
    }
    let collector = Arc::new(collector);
    let flush_task = collector.start();

    let mut consumer = Consumer::new(rules, pipeline, Arc::clone(&storage), Arc::clone(&collector));
    if let Some(publisher) = &publisher {
        consumer =
            consumer.with_publisher(Arc::clone(publisher), cfg.publish_messages_topic.clone());
    }

    // Block until the first connect+replay completes (bounded).
    manager.wait_ready().await.context("waiting for feed readiness")?;
    info!("feed ready; consuming");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::select! {
        _ = consumer.run(events, shutdown_rx) => {
            warn!("consumption loop ended");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    }

    manager.disconnect().await;
    manager_task.abort();
    flush_task.abort();
    Ok(())
}
