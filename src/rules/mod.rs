// src/rules/mod.rs
// Rule engine: an ordered set of pure text predicates. Not every post is
// worth sending to the downstream classifiers, so the rules cut volume early.

pub mod language;

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::AppConfig;

/// A single filtering rule. Predicates must be pure and stateless.
pub struct Rule {
    description: String,
    predicate: Box<dyn Fn(&str) -> bool + Send + Sync>,
}

/// Ordered, independent rule set. All rules always run (no short-circuit) so
/// the per-rule breakdown is complete even when the aggregate fails.
#[derive(Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule. Evaluation order is insertion order.
    pub fn add_rule<F>(&mut self, description: impl Into<String>, predicate: F)
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.rules.push(Rule {
            description: description.into(),
            predicate: Box::new(predicate),
        });
    }

    /// Evaluate every rule against `text`. Returns the aggregate AND plus a
    /// map of rule description to individual outcome.
    pub fn evaluate_all(&self, text: &str) -> (bool, HashMap<String, bool>) {
        let mut results = HashMap::with_capacity(self.rules.len());
        let mut all_passed = true;
        for rule in &self.rules {
            let passed = (rule.predicate)(text);
            if !passed {
                all_passed = false;
            }
            results.insert(rule.description.clone(), passed);
        }
        (all_passed, results)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

// Permissive URL shape: optional scheme, hostname-ish run, TLD.
static RE_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(https?://)?([\w.-]+)\.([a-z]{2,6})(/\S*)?").expect("valid url regex")
});

pub fn contains_url(text: &str) -> bool {
    RE_URL.is_match(text)
}

pub fn contains_any_keyword(text: &str, keywords: &[String]) -> bool {
    let lower = text.to_lowercase();
    keywords
        .iter()
        .any(|k| !k.is_empty() && lower.contains(&k.to_lowercase()))
}

pub fn contains_any_hashtag(text: &str, hashtags: &[String]) -> bool {
    let lower = text.to_lowercase();
    hashtags
        .iter()
        .any(|h| !h.is_empty() && lower.contains(&format!("#{}", h.to_lowercase())))
}

/// Build the rule set from configuration. Disabled rules are simply absent.
pub fn from_config(cfg: &AppConfig) -> RuleSet {
    let mut rs = RuleSet::new();

    if cfg.rule_english_only {
        rs.add_rule("English posts only", |text| {
            language::is_likely_english(text)
        });
    }

    if cfg.rule_min_length {
        let min_length = cfg.rule_min_length_value;
        rs.add_rule(
            format!("Length greater than {min_length} characters"),
            move |text| text.len() > min_length,
        );
    }

    if cfg.rule_contains_url {
        rs.add_rule("Contains a URL", contains_url);
    }

    if cfg.rule_contains_keywords {
        let keywords = cfg.rule_contains_keywords_values.clone();
        rs.add_rule("Contains relevant keywords", move |text| {
            contains_any_keyword(text, &keywords)
        });
    }

    if cfg.rule_contains_hashtag {
        let hashtags = cfg.rule_contains_hashtag_values.clone();
        rs.add_rule("Contains relevant hashtags", move |text| {
            contains_any_hashtag(text, &hashtags)
        });
    }

    rs
}
