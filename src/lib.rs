// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod api;
pub mod classify;
pub mod collector;
pub mod config;
pub mod connection;
pub mod consumer;
pub mod error;
pub mod event;
pub mod rules;
pub mod storage;
pub mod transport;

// ---- Re-exports for stable public API ----
pub use crate::classify::Pipeline;
pub use crate::collector::DataCollector;
pub use crate::config::AppConfig;
pub use crate::connection::{ConnectionManager, ConnectionState, Publisher};
pub use crate::consumer::Consumer;
pub use crate::error::{Error, Result};
pub use crate::event::{CategoryMetric, EnrichedRecord, FinSentiment, IncomingEvent};
pub use crate::rules::RuleSet;
pub use crate::storage::{MemoryStore, Storage, StoragePayload};
pub use crate::transport::{DeliveryQuality, InboundFrame, Transport};
