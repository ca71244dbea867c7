// src/event.rs
// Types for decoded firehose events and the enriched records derived from
// them. Inbound frames are permissive JSON: every field defaults so a partial
// commit does not fail the whole decode.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Reply linkage of a post. Parent/root are opaque references; we only care
/// whether they are present.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Reply {
    pub parent: Option<serde_json::Value>,
    pub root: Option<serde_json::Value>,
}

/// The authored post inside a commit.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PostRecord {
    #[serde(rename = "$type")]
    pub record_type: String,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    pub langs: Vec<String>,
    pub text: String,
    pub reply: Option<Reply>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Commit {
    pub rev: String,
    pub operation: String,
    pub collection: String,
    pub rkey: String,
    pub cid: String,
    pub record: PostRecord,
}

/// Raw decoded post event as delivered by the feed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IncomingEvent {
    pub did: String,
    /// Microsecond timestamp assigned by the feed.
    pub time_us: u64,
    pub kind: String,
    pub commit: Commit,
}

impl IncomingEvent {
    /// Decode one inbound JSON frame. Failures are `Error::Decode` and the
    /// caller drops the event.
    pub fn decode(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn text(&self) -> &str {
        &self.commit.record.text
    }

    // Convenience predicates over the decoded shape. In-pipeline filtering
    // goes through the rule engine; these are for rule predicates and
    // downstream consumers that look at decoded events directly.

    /// The feed tags posts with BCP-47 language codes; first tag wins.
    pub fn is_english(&self) -> bool {
        self.commit
            .record
            .langs
            .first()
            .is_some_and(|l| l == "en" || l.starts_with("en-"))
    }

    /// A root post has no reply linkage.
    pub fn is_root(&self) -> bool {
        self.commit
            .record
            .reply
            .as_ref()
            .is_none_or(|r| r.root.is_none())
    }

    pub fn is_too_short(&self) -> bool {
        self.commit.record.text.len() < 20
    }

    pub fn is_valid(&self) -> bool {
        self.is_english() && self.is_root() && !self.is_too_short()
    }
}

/// Financial sentiment label produced by the remote classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinSentiment {
    Positive,
    Negative,
    Other,
}

impl FinSentiment {
    /// Map a classifier label to a sentiment. Empty means the step failed
    /// for this cycle ("unclassified"), anything unrecognized is `Other`.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "" => None,
            "positive" => Some(Self::Positive),
            "negative" => Some(Self::Negative),
            _ => Some(Self::Other),
        }
    }
}

/// An event that passed the rule pipeline, plus enrichment output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnrichedRecord {
    #[serde(flatten)]
    pub event: IncomingEvent,
    pub categories: BTreeSet<String>,
    pub fin_sentiment: Option<FinSentiment>,
}

impl EnrichedRecord {
    pub fn text(&self) -> &str {
        self.event.text()
    }

    /// Whitespace-delimited word count of the post text.
    pub fn token_count(&self) -> usize {
        self.event.text().split_whitespace().count()
    }

    /// Only posts with a definite financial sentiment are persisted and
    /// republished; `Other` and unclassified are metrics-only.
    pub fn is_storable(&self) -> bool {
        matches!(
            self.fin_sentiment,
            Some(FinSentiment::Positive) | Some(FinSentiment::Negative)
        )
    }
}

/// Per-window sentiment counts for one tracked category.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategoryMetric {
    pub category: String,
    pub positive: u64,
    pub negative: u64,
    /// Unix seconds of the flush that produced this snapshot.
    pub timestamp: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event_json(text: &str, langs: &[&str]) -> String {
        serde_json::json!({
            "did": "did:plc:abc123",
            "time_us": 1_700_000_000_000_000u64,
            "kind": "commit",
            "commit": {
                "rev": "aaa",
                "operation": "create",
                "collection": "app.bsky.feed.post",
                "rkey": "3kabc",
                "cid": "bafy",
                "record": {
                    "$type": "app.bsky.feed.post",
                    "createdAt": "2024-01-01T00:00:00Z",
                    "langs": langs,
                    "text": text,
                }
            }
        })
        .to_string()
    }

    #[test]
    fn decode_full_frame() {
        let ev = IncomingEvent::decode(&event_json("hello world, long enough text", &["en"]))
            .expect("decode");
        assert_eq!(ev.kind, "commit");
        assert_eq!(ev.text(), "hello world, long enough text");
        assert!(ev.is_english());
        assert!(ev.is_root());
        assert!(ev.is_valid());
    }

    #[test]
    fn decode_tolerates_missing_fields() {
        let ev = IncomingEvent::decode(r#"{"did":"did:plc:x","kind":"commit"}"#).expect("decode");
        assert_eq!(ev.text(), "");
        assert!(!ev.is_english());
        assert!(ev.is_too_short());
    }

    #[test]
    fn decode_rejects_malformed_json() {
        assert!(IncomingEvent::decode("{not json").is_err());
    }

    #[test]
    fn reply_makes_event_non_root() {
        let mut ev = IncomingEvent::decode(&event_json("some reply text over twenty", &["en"]))
            .expect("decode");
        ev.commit.record.reply = Some(Reply {
            parent: Some(serde_json::json!({"cid": "x"})),
            root: Some(serde_json::json!({"cid": "y"})),
        });
        assert!(!ev.is_root());
        assert!(!ev.is_valid());
    }

    #[test]
    fn sentiment_label_mapping() {
        assert_eq!(FinSentiment::from_label("positive"), Some(FinSentiment::Positive));
        assert_eq!(FinSentiment::from_label("negative"), Some(FinSentiment::Negative));
        assert_eq!(FinSentiment::from_label("neutral"), Some(FinSentiment::Other));
        assert_eq!(FinSentiment::from_label(""), None);
    }

    #[test]
    fn storability_requires_definite_sentiment() {
        let base = EnrichedRecord {
            event: IncomingEvent::default(),
            categories: BTreeSet::new(),
            fin_sentiment: None,
        };
        assert!(!base.is_storable());

        let mut rec = base.clone();
        rec.fin_sentiment = Some(FinSentiment::Other);
        assert!(!rec.is_storable());

        rec.fin_sentiment = Some(FinSentiment::Negative);
        assert!(rec.is_storable());
    }

    #[test]
    fn token_count_is_whitespace_delimited() {
        let mut rec = EnrichedRecord {
            event: IncomingEvent::default(),
            categories: BTreeSet::new(),
            fin_sentiment: None,
        };
        rec.event.commit.record.text = "  one two\tthree\nfour five  ".to_string();
        assert_eq!(rec.token_count(), 5);
    }
}
