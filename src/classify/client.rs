// src/classify/client.rs
// Thin client for the remote text-classification services. One bounded call
// per post and step; no local retry, a failed call is a miss for that cycle.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize)]
pub struct ClassifyRequestItem {
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassifyRequest {
    pub items: Vec<ClassifyRequestItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClassifyResponseItem {
    pub label: String,
    #[serde(default)]
    pub score: f64,
}

#[derive(Debug, Clone)]
pub struct ClassifierClient {
    base_url: String,
    http: reqwest::Client,
}

impl ClassifierClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(10))
            .build()
            .expect("reqwest client");
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        }
    }

    /// POST `{base}/classify` with a single-item batch and return the first
    /// result. Any non-200 status or decode failure is a hard error for this
    /// call.
    pub async fn classify(&self, text: &str) -> Result<ClassifyResponseItem> {
        let url = format!("{}/classify", self.base_url);
        let body = ClassifyRequest {
            items: vec![ClassifyRequestItem {
                text: text.to_string(),
            }],
        };

        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Classification(format!("request to {url}: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Classification(format!(
                "unexpected status {status} from {url}: {body}"
            )));
        }

        let items: Vec<ClassifyResponseItem> = resp
            .json()
            .await
            .map_err(|e| Error::Classification(format!("decoding response from {url}: {e}")))?;

        items
            .into_iter()
            .next()
            .ok_or_else(|| Error::Classification(format!("empty response from {url}")))
    }
}
