// src/error.rs
// Error taxonomy for the ingestion pipeline. Each variant maps to a distinct
// handling policy: transport errors are retried forever, decode errors drop
// the event, classification errors yield an empty label, storage errors are
// logged best-effort, config errors are fatal at startup.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("transport: {0}")]
    Transport(String),

    #[error("malformed inbound payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("classification call failed: {0}")]
    Classification(String),

    #[error("storage: {0}")]
    Storage(String),

    #[error("no stored item with id {0}")]
    NotFound(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("not connected")]
    NotConnected,

    #[error("timed out waiting for first connection")]
    ReadyTimeout,
}

pub type Result<T> = std::result::Result<T, Error>;
