// src/config.rs
// Environment-driven configuration. `.env` is loaded by the binary before
// this runs; a missing or invalid required setting is fatal at startup.

use std::env;
use std::str::FromStr;

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub dev_mode: bool,
    pub host: String,
    pub server_port: u16,

    /// Upstream feed websocket endpoint. Required.
    pub jetstream_url: String,
    /// Record collection consumed from the feed.
    pub feed_collection: String,

    pub rule_english_only: bool,
    pub rule_min_length: bool,
    pub rule_min_length_value: usize,
    pub rule_contains_url: bool,
    pub rule_contains_keywords: bool,
    pub rule_contains_keywords_values: Vec<String>,
    pub rule_contains_hashtag: bool,
    pub rule_contains_hashtag_values: Vec<String>,

    pub text_category_classifier: bool,
    pub text_category_classifier_url: String,
    pub text_fin_sentiment_classifier: bool,
    pub text_fin_sentiment_classifier_url: String,

    /// Republish qualifying records and metric snapshots downstream.
    pub publish_enabled: bool,
    pub publish_messages_topic: String,
    pub publish_metrics_topic: String,

    pub metrics_interval_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let cfg = Self {
            dev_mode: env_bool("DEV_MODE"),
            host: env_or("HOST", "0.0.0.0"),
            server_port: env_parse("SERVER_PORT", 8080)?,

            jetstream_url: env_required("JETSTREAM_URL")?,
            feed_collection: env_or("FEED_COLLECTION", "app.bsky.feed.post"),

            rule_english_only: env_bool("RULE_ENGLISH_ONLY"),
            rule_min_length: env_bool("RULE_MIN_LENGTH"),
            rule_min_length_value: env_parse("RULE_MIN_LENGTH_VALUE", 20)?,
            rule_contains_url: env_bool("RULE_CONTAINS_URL"),
            rule_contains_keywords: env_bool("RULE_CONTAINS_KEYWORDS"),
            rule_contains_keywords_values: env_list("RULE_CONTAINS_KEYWORDS_VALUE"),
            rule_contains_hashtag: env_bool("RULE_CONTAINS_HASHTAG"),
            rule_contains_hashtag_values: env_list("RULE_CONTAINS_HASHTAG_VALUE"),

            text_category_classifier: env_bool("TEXT_CATEGORY_CLASSIFIER"),
            text_category_classifier_url: env_or("TEXT_CATEGORY_CLASSIFIER_URL", ""),
            text_fin_sentiment_classifier: env_bool("TEXT_FIN_SENTIMENT_CLASSIFIER"),
            text_fin_sentiment_classifier_url: env_or("TEXT_FIN_SENTIMENT_CLASSIFIER_URL", ""),

            publish_enabled: env_bool("PUBLISH_ENABLED"),
            publish_messages_topic: env_or("PUBLISH_MESSAGES_TOPIC", "firehose/messages"),
            publish_metrics_topic: env_or("PUBLISH_METRICS_TOPIC", "firehose/metrics"),

            metrics_interval_secs: env_parse("METRICS_INTERVAL_SECS", 60)?,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.text_category_classifier && self.text_category_classifier_url.is_empty() {
            return Err(Error::Config(
                "TEXT_CATEGORY_CLASSIFIER_URL is required when the category classifier is enabled"
                    .to_string(),
            ));
        }
        if self.text_fin_sentiment_classifier && self.text_fin_sentiment_classifier_url.is_empty()
        {
            return Err(Error::Config(
                "TEXT_FIN_SENTIMENT_CLASSIFIER_URL is required when the sentiment classifier is enabled"
                    .to_string(),
            ));
        }
        if self.metrics_interval_secs == 0 {
            return Err(Error::Config(
                "METRICS_INTERVAL_SECS must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_bool(key: &str) -> bool {
    env::var(key)
        .map(|v| {
            let v = v.trim().to_ascii_lowercase();
            v == "1" || v == "true" || v == "yes"
        })
        .unwrap_or(false)
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_required(key: &str) -> Result<String> {
    match env::var(key) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(Error::Config(format!("{key} is required"))),
    }
}

fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(v) => v
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("{key}: {e}"))),
        Err(_) => Ok(default),
    }
}

/// Comma-separated list; entries trimmed, empties dropped.
fn env_list(key: &str) -> Vec<String> {
    env::var(key)
        .map(|v| {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_parsing_trims_and_drops_empties() {
        env::set_var("TEST_LIST_KEY", " tutorial, golang ,, rustlang ");
        let got = env_list("TEST_LIST_KEY");
        assert_eq!(got, vec!["tutorial", "golang", "rustlang"]);
        env::remove_var("TEST_LIST_KEY");
    }

    #[test]
    fn bool_parsing_accepts_common_forms() {
        env::set_var("TEST_BOOL_KEY", "TRUE");
        assert!(env_bool("TEST_BOOL_KEY"));
        env::set_var("TEST_BOOL_KEY", "0");
        assert!(!env_bool("TEST_BOOL_KEY"));
        env::remove_var("TEST_BOOL_KEY");
        assert!(!env_bool("TEST_BOOL_KEY"));
    }

    #[test]
    fn invalid_numeric_value_is_a_config_error() {
        env::set_var("TEST_NUM_KEY", "not-a-number");
        let got: Result<u64> = env_parse("TEST_NUM_KEY", 5);
        assert!(matches!(got, Err(Error::Config(_))));
        env::remove_var("TEST_NUM_KEY");
        let got: Result<u64> = env_parse("TEST_NUM_KEY", 5);
        assert_eq!(got.unwrap(), 5);
    }
}
