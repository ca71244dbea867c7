// src/collector.rs
// Metrics aggregator: thread-safe running counters over a sliding reporting
// window, flushed periodically to storage and (best-effort) to the metrics
// topic. Snapshot and reset happen under one held lock, so no reader ever
// observes a mix of pre- and post-reset state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::connection::Publisher;
use crate::event::{CategoryMetric, EnrichedRecord, FinSentiment};
use crate::storage::Storage;

/// Fixed allow-list of topical categories we aggregate sentiment for.
pub const TRACKED_CATEGORIES: [&str; 4] = ["labour", "politics", "economy", "conflict"];

pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Default, Clone, Copy)]
struct CategoryCounts {
    positive: u64,
    negative: u64,
}

#[derive(Debug, Default)]
struct Inner {
    // Monotonically non-decreasing totals.
    total_posts: u64,
    total_tokens: u64,
    // Window counters, reset on every flush.
    window_posts: u64,
    window_tokens: u64,
    window_sentiment: HashMap<String, CategoryCounts>,
    flush_calls: u64,
}

impl Inner {
    fn zeroed() -> Self {
        let mut inner = Self::default();
        for category in TRACKED_CATEGORIES {
            inner
                .window_sentiment
                .insert(category.to_string(), CategoryCounts::default());
        }
        inner
    }

    /// Snapshot per-category metrics and reset the window in one step.
    fn snapshot_and_reset(&mut self, timestamp: i64) -> (u64, u64, Vec<CategoryMetric>) {
        self.flush_calls += 1;
        let posts = self.window_posts;
        let tokens = self.window_tokens;

        let snapshot = TRACKED_CATEGORIES
            .iter()
            .map(|&category| {
                let counts = self
                    .window_sentiment
                    .get(category)
                    .copied()
                    .unwrap_or_default();
                CategoryMetric {
                    category: category.to_string(),
                    positive: counts.positive,
                    negative: counts.negative,
                    timestamp,
                }
            })
            .collect();

        // Reset to zero, never to an absent state.
        self.window_posts = 0;
        self.window_tokens = 0;
        for counts in self.window_sentiment.values_mut() {
            *counts = CategoryCounts::default();
        }

        (posts, tokens, snapshot)
    }
}

pub struct DataCollector {
    inner: Mutex<Inner>,
    storage: Arc<dyn Storage>,
    publisher: Option<Arc<dyn Publisher>>,
    metrics_topic: Option<String>,
    interval: Duration,
}

impl DataCollector {
    pub fn new(storage: Arc<dyn Storage>, interval: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner::zeroed()),
            storage,
            publisher: None,
            metrics_topic: None,
            interval,
        }
    }

    /// Also republish each flushed snapshot to `topic`, best-effort.
    pub fn with_publisher(mut self, publisher: Arc<dyn Publisher>, topic: impl Into<String>) -> Self {
        self.publisher = Some(publisher);
        self.metrics_topic = Some(topic.into());
        self
    }

    /// Record one accepted post. Safe for concurrent callers. Total counters
    /// always advance; category sentiment only counts tracked categories on
    /// records with a definite sentiment.
    pub fn add(&self, record: &EnrichedRecord) {
        let tokens = record.token_count() as u64;
        let mut inner = self.inner.lock().expect("collector mutex poisoned");

        inner.total_posts += 1;
        inner.window_posts += 1;
        inner.total_tokens += tokens;
        inner.window_tokens += tokens;

        let sentiment = match record.fin_sentiment {
            Some(FinSentiment::Positive) => FinSentiment::Positive,
            Some(FinSentiment::Negative) => FinSentiment::Negative,
            _ => return,
        };

        for category in &record.categories {
            let Some(counts) = inner.window_sentiment.get_mut(category.as_str()) else {
                continue; // not a tracked category
            };
            match sentiment {
                FinSentiment::Positive => counts.positive += 1,
                FinSentiment::Negative => counts.negative += 1,
                FinSentiment::Other => {}
            }
        }
    }

    /// `(total_posts, total_tokens)` so far.
    pub fn totals(&self) -> (u64, u64) {
        let inner = self.inner.lock().expect("collector mutex poisoned");
        (inner.total_posts, inner.total_tokens)
    }

    /// `(window_posts, window_tokens)` of the current (unflushed) window.
    pub fn window(&self) -> (u64, u64) {
        let inner = self.inner.lock().expect("collector mutex poisoned");
        (inner.window_posts, inner.window_tokens)
    }

    /// Log window rates, persist one `CategoryMetric` per tracked category,
    /// and reset the window. Executed by the single flush task, so runs
    /// never overlap.
    pub async fn flush(&self) {
        let timestamp = chrono::Utc::now().timestamp();
        let (posts, tokens, snapshot, totals, calls) = {
            let mut inner = self.inner.lock().expect("collector mutex poisoned");
            let (posts, tokens, snapshot) = inner.snapshot_and_reset(timestamp);
            (
                posts,
                tokens,
                snapshot,
                (inner.total_posts, inner.total_tokens),
                inner.flush_calls,
            )
        };

        let secs = self.interval.as_secs().max(1);
        info!(
            posts_per_sec = posts / secs,
            total_posts = totals.0,
            tokens_per_sec = tokens / secs,
            total_tokens = totals.1,
            flushes = calls,
            "metrics window"
        );

        for metric in snapshot {
            info!(
                category = %metric.category,
                positive = metric.positive,
                negative = metric.negative,
                "category sentiment"
            );
            if let Err(e) = self.storage.insert(metric.clone().into()).await {
                error!(category = %metric.category, error = %e, "failed to store metrics");
            }
            if let (Some(publisher), Some(topic)) = (&self.publisher, &self.metrics_topic) {
                match serde_json::to_string(&metric) {
                    Ok(payload) => {
                        if let Err(e) = publisher.publish(topic, payload).await {
                            error!(topic, error = %e, "failed to publish metrics");
                        }
                    }
                    Err(e) => error!(error = %e, "failed to encode metrics"),
                }
            }
        }
    }

    /// Spawn the flush loop: one immediate flush for a fast zero baseline,
    /// then a fixed-period tick until the task is aborted.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let collector = Arc::clone(self);
        info!("metrics collection started");
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(collector.interval);
            loop {
                // First tick completes immediately.
                ticker.tick().await;
                collector.flush().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::IncomingEvent;
    use crate::storage::{MemoryStore, StoragePayload};
    use std::collections::BTreeSet;

    fn record(text: &str, sentiment: Option<FinSentiment>, categories: &[&str]) -> EnrichedRecord {
        let mut event = IncomingEvent::default();
        event.commit.record.text = text.to_string();
        EnrichedRecord {
            event,
            categories: categories.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
            fin_sentiment: sentiment,
        }
    }

    fn collector() -> (Arc<DataCollector>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let dc = Arc::new(DataCollector::new(
            store.clone() as Arc<dyn Storage>,
            Duration::from_secs(60),
        ));
        (dc, store)
    }

    #[tokio::test]
    async fn totals_accumulate_and_window_resets_to_zero() {
        let (dc, _store) = collector();
        for _ in 0..3 {
            dc.add(&record("a b c d e", None, &[]));
        }
        assert_eq!(dc.totals(), (3, 15));
        assert_eq!(dc.window(), (3, 15));

        dc.flush().await;
        assert_eq!(dc.window(), (0, 0));
        // Totals never decrease across a flush.
        assert_eq!(dc.totals(), (3, 15));

        dc.add(&record("one two", None, &[]));
        assert_eq!(dc.totals(), (4, 17));
        assert_eq!(dc.window(), (1, 2));
    }

    #[tokio::test]
    async fn tracked_category_sentiment_is_counted() {
        let (dc, store) = collector();
        dc.add(&record(
            "jobs report strong",
            Some(FinSentiment::Positive),
            &["economy", "labour"],
        ));
        dc.add(&record(
            "strikes spread",
            Some(FinSentiment::Negative),
            &["labour", "untracked"],
        ));
        dc.add(&record(
            "nothing definite",
            Some(FinSentiment::Other),
            &["economy"],
        ));

        dc.flush().await;

        let stored = store.find_all().await.unwrap();
        // One snapshot per tracked category, zeroes included.
        assert_eq!(stored.len(), TRACKED_CATEGORIES.len());
        let metric = |name: &str| {
            stored
                .iter()
                .find_map(|p| match p {
                    StoragePayload::Metric(m) if m.category == name => Some(m.clone()),
                    _ => None,
                })
                .expect("tracked category snapshot present")
        };
        let labour = metric("labour");
        assert_eq!((labour.positive, labour.negative), (1, 1));
        let economy = metric("economy");
        assert_eq!((economy.positive, economy.negative), (1, 0));
        let politics = metric("politics");
        assert_eq!((politics.positive, politics.negative), (0, 0));
    }

    #[tokio::test]
    async fn concurrent_adds_are_all_counted() {
        let (dc, _store) = collector();
        let mut handles = Vec::new();
        for _ in 0..8 {
            let dc = dc.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..100 {
                    dc.add(&record("one two three four five", None, &[]));
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(dc.totals(), (800, 4000));
    }
}
