// src/classify/mod.rs
// Classification pipeline: an ordered set of named enrichment steps, each
// calling a remote model endpoint. Steps fail independently; a failed step
// contributes an empty label ("unclassified") and never aborts its siblings.

pub mod client;

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use metrics::counter;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::classify::client::ClassifierClient;
use crate::config::AppConfig;
use crate::error::Result;

/// Step name for the topical category classifier.
pub const CATEGORY_STEP: &str = "TextCategoryClassifier";
/// Step name for the financial sentiment classifier.
pub const FIN_SENTIMENT_STEP: &str = "TextFinSentimentClassifier";

/// A named enrichment step. Implementations must be idempotent: the same
/// text may be resubmitted after a transient failure.
#[async_trait]
pub trait EnrichmentStep: Send + Sync {
    fn name(&self) -> &str;
    async fn classify(&self, text: &str) -> Result<String>;
}

/// Ordered pipeline of enrichment steps.
#[derive(Default)]
pub struct Pipeline {
    steps: Vec<Box<dyn EnrichmentStep>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_step(&mut self, step: Box<dyn EnrichmentStep>) {
        self.steps.push(step);
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every step against `text` in insertion order. A failing step maps
    /// to an empty label for its name; the error is logged, not propagated.
    pub async fn process_all(&self, text: &str) -> HashMap<String, String> {
        let mut results = HashMap::with_capacity(self.steps.len());
        for step in &self.steps {
            let label = match step.classify(text).await {
                Ok(label) => label,
                Err(e) => {
                    warn!(step = step.name(), error = %e, "enrichment step failed");
                    counter!("classify_step_errors_total").increment(1);
                    String::new()
                }
            };
            results.insert(step.name().to_string(), label);
        }
        results
    }
}

static RE_NON_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\W_]+").expect("valid non-word regex"));

/// Tokenize a free-text category label into a set of category keywords by
/// splitting on runs of non-word characters. Kept as a pure function because
/// the label format is fragile and this is the single place it is interpreted.
pub fn split_categories(label: &str) -> BTreeSet<String> {
    RE_NON_WORD
        .split(label)
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Category classifier backed by the remote model endpoint.
pub struct CategoryStep {
    client: ClassifierClient,
}

impl CategoryStep {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: ClassifierClient::new(base_url),
        }
    }
}

#[async_trait]
impl EnrichmentStep for CategoryStep {
    fn name(&self) -> &str {
        CATEGORY_STEP
    }

    async fn classify(&self, text: &str) -> Result<String> {
        Ok(self.client.classify(text).await?.label)
    }
}

/// Financial sentiment classifier; labels are one of positive/negative/other.
pub struct FinSentimentStep {
    client: ClassifierClient,
}

impl FinSentimentStep {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: ClassifierClient::new(base_url),
        }
    }
}

#[async_trait]
impl EnrichmentStep for FinSentimentStep {
    fn name(&self) -> &str {
        FIN_SENTIMENT_STEP
    }

    async fn classify(&self, text: &str) -> Result<String> {
        Ok(self.client.classify(text).await?.label)
    }
}

/// Build the pipeline from configuration. Disabled classifiers are absent.
pub fn from_config(cfg: &AppConfig) -> Pipeline {
    let mut pipeline = Pipeline::new();
    if cfg.text_category_classifier {
        pipeline.add_step(Box::new(CategoryStep::new(
            cfg.text_category_classifier_url.clone(),
        )));
    }
    if cfg.text_fin_sentiment_classifier {
        pipeline.add_step(Box::new(FinSentimentStep::new(
            cfg.text_fin_sentiment_classifier_url.clone(),
        )));
    }
    pipeline
}
