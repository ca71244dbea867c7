// src/consumer.rs
// Routing glue: one single-threaded consumption loop taking decoded frames
// from the connection manager through rules -> classification -> sinks.
// Events are handled sequentially; per-message latency bounds throughput,
// which is the intended simplicity-over-throughput tradeoff.

use std::collections::HashMap;
use std::sync::Arc;

use metrics::counter;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, trace};

use crate::classify::{self, Pipeline};
use crate::collector::DataCollector;
use crate::connection::Publisher;
use crate::event::{EnrichedRecord, FinSentiment, IncomingEvent};
use crate::rules::RuleSet;
use crate::storage::Storage;
use crate::transport::InboundFrame;

pub struct Consumer {
    rules: RuleSet,
    pipeline: Pipeline,
    storage: Arc<dyn Storage>,
    publisher: Option<Arc<dyn Publisher>>,
    messages_topic: Option<String>,
    collector: Arc<DataCollector>,
}

impl Consumer {
    pub fn new(
        rules: RuleSet,
        pipeline: Pipeline,
        storage: Arc<dyn Storage>,
        collector: Arc<DataCollector>,
    ) -> Self {
        Self {
            rules,
            pipeline,
            storage,
            publisher: None,
            messages_topic: None,
            collector,
        }
    }

    /// Also republish stored records to `topic`, best-effort.
    pub fn with_publisher(mut self, publisher: Arc<dyn Publisher>, topic: impl Into<String>) -> Self {
        self.publisher = Some(publisher);
        self.messages_topic = Some(topic.into());
        self
    }

    /// Consume frames until the stream closes or `shutdown` flips to true.
    /// Shutdown is cooperative: an in-flight message may be abandoned.
    pub async fn run(&self, mut events: mpsc::Receiver<InboundFrame>, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!("consumer shutting down");
                        break;
                    }
                }
                frame = events.recv() => match frame {
                    Some(frame) => self.handle_frame(frame).await,
                    None => {
                        debug!("frame stream closed");
                        break;
                    }
                },
            }
        }
    }

    async fn handle_frame(&self, frame: InboundFrame) {
        counter!("consumer_events_total").increment(1);

        // Malformed payloads are dropped; the loop continues.
        let event = match IncomingEvent::decode(&frame.payload) {
            Ok(event) => event,
            Err(e) => {
                debug!(topic = %frame.topic, error = %e, "dropping undecodable event");
                counter!("consumer_decode_errors_total").increment(1);
                return;
            }
        };
        self.process_event(event).await;
    }

    /// Rule evaluation, enrichment, persistence, republish, metrics.
    pub async fn process_event(&self, event: IncomingEvent) {
        let (passed, breakdown) = self.rules.evaluate_all(event.text());
        trace!(?breakdown, passed, "rules evaluated");
        if !passed {
            counter!("consumer_filtered_total").increment(1);
            return;
        }

        let labels = self.pipeline.process_all(event.text()).await;
        let record = enrich(event, &labels);

        if record.is_storable() {
            // Best-effort sinks: failures are logged, never retried, and do
            // not keep the record out of the aggregated metrics.
            if let Err(e) = self.storage.insert(record.clone().into()).await {
                error!(error = %e, "failed to store record");
            }
            if let (Some(publisher), Some(topic)) = (&self.publisher, &self.messages_topic) {
                match serde_json::to_string(&record) {
                    Ok(payload) => {
                        if let Err(e) = publisher.publish(topic, payload).await {
                            debug!(topic, error = %e, "record republish missed");
                        }
                    }
                    Err(e) => error!(error = %e, "failed to encode record"),
                }
            }
            counter!("consumer_stored_total").increment(1);
        }

        self.collector.add(&record);
    }
}

/// Fold the per-step labels into an enriched record. Missing or empty labels
/// mean "unclassified", never a distinguished value.
pub fn enrich(event: IncomingEvent, labels: &HashMap<String, String>) -> EnrichedRecord {
    let categories = labels
        .get(classify::CATEGORY_STEP)
        .map(|label| classify::split_categories(label))
        .unwrap_or_default();
    let fin_sentiment = labels
        .get(classify::FIN_SENTIMENT_STEP)
        .and_then(|label| FinSentiment::from_label(label));
    EnrichedRecord {
        event,
        categories,
        fin_sentiment,
    }
}
