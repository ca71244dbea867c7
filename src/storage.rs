// src/storage.rs
// Storage collaborator: a minimal insert/find/update/delete contract that
// accepts both enriched records and metric snapshots, dispatching by payload
// type. Production deployments plug a database adapter in behind `Storage`;
// the in-memory store backs tests and local runs.

use std::sync::Mutex;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::event::{CategoryMetric, EnrichedRecord};

/// Payload accepted by the storage collaborator.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum StoragePayload {
    Record(Box<EnrichedRecord>),
    Metric(CategoryMetric),
}

impl StoragePayload {
    /// Stable identifier used for find/update/delete.
    pub fn id(&self) -> String {
        match self {
            StoragePayload::Record(r) => format!("{}/{}", r.event.did, r.event.commit.rkey),
            StoragePayload::Metric(m) => format!("{}@{}", m.category, m.timestamp),
        }
    }
}

impl From<EnrichedRecord> for StoragePayload {
    fn from(r: EnrichedRecord) -> Self {
        StoragePayload::Record(Box::new(r))
    }
}

impl From<CategoryMetric> for StoragePayload {
    fn from(m: CategoryMetric) -> Self {
        StoragePayload::Metric(m)
    }
}

#[async_trait]
pub trait Storage: Send + Sync {
    async fn insert(&self, payload: StoragePayload) -> Result<()>;
    async fn find_all(&self) -> Result<Vec<StoragePayload>>;
    async fn find_by_id(&self, id: &str) -> Result<StoragePayload>;
    async fn update(&self, id: &str, payload: StoragePayload) -> Result<()>;
    async fn delete(&self, id: &str) -> Result<()>;
}

/// In-memory store, insertion-ordered.
#[derive(Default)]
pub struct MemoryStore {
    items: Mutex<Vec<(String, StoragePayload)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.lock().expect("memory store mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Storage for MemoryStore {
    async fn insert(&self, payload: StoragePayload) -> Result<()> {
        let mut items = self.items.lock().expect("memory store mutex poisoned");
        items.push((payload.id(), payload));
        Ok(())
    }

    async fn find_all(&self) -> Result<Vec<StoragePayload>> {
        let items = self.items.lock().expect("memory store mutex poisoned");
        Ok(items.iter().map(|(_, p)| p.clone()).collect())
    }

    async fn find_by_id(&self, id: &str) -> Result<StoragePayload> {
        let items = self.items.lock().expect("memory store mutex poisoned");
        items
            .iter()
            .find(|(item_id, _)| item_id == id)
            .map(|(_, p)| p.clone())
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    async fn update(&self, id: &str, payload: StoragePayload) -> Result<()> {
        let mut items = self.items.lock().expect("memory store mutex poisoned");
        match items.iter_mut().find(|(item_id, _)| item_id == id) {
            Some(slot) => {
                slot.1 = payload;
                Ok(())
            }
            None => Err(Error::NotFound(id.to_string())),
        }
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut items = self.items.lock().expect("memory store mutex poisoned");
        let before = items.len();
        items.retain(|(item_id, _)| item_id != id);
        if items.len() == before {
            return Err(Error::NotFound(id.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metric(category: &str, ts: i64) -> StoragePayload {
        CategoryMetric {
            category: category.to_string(),
            positive: 1,
            negative: 2,
            timestamp: ts,
        }
        .into()
    }

    #[tokio::test]
    async fn crud_round_trip() {
        let store = MemoryStore::new();
        let payload = metric("economy", 100);
        let id = payload.id();

        store.insert(payload.clone()).await.unwrap();
        assert_eq!(store.find_all().await.unwrap().len(), 1);
        assert_eq!(store.find_by_id(&id).await.unwrap(), payload);

        let updated = metric("economy", 100);
        store.update(&id, updated).await.unwrap();

        store.delete(&id).await.unwrap();
        assert!(matches!(
            store.find_by_id(&id).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn missing_id_is_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.delete("nope").await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            store.update("nope", metric("x", 1)).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn accepts_both_payload_kinds() {
        let store = MemoryStore::new();
        store.insert(metric("politics", 7)).await.unwrap();

        let record = crate::event::EnrichedRecord {
            event: crate::event::IncomingEvent::default(),
            categories: Default::default(),
            fin_sentiment: Some(crate::event::FinSentiment::Positive),
        };
        store.insert(record.into()).await.unwrap();
        assert_eq!(store.len(), 2);
    }
}
