// src/transport/jetstream.rs
// Websocket transport for the upstream post feed. Topics map to record
// collections; subscribing pushes an options update with the full wanted set.
// The feed is read-only, so publishes are rejected here; republish targets a
// broker-backed transport instead.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::transport::{DeliveryQuality, InboundFrame, LinkHandle, Transport, TransportLink};

const EVENT_BUFFER: usize = 256;

pub struct JetstreamTransport {
    url: String,
    /// Topic label stamped on inbound frames.
    topic: String,
}

impl JetstreamTransport {
    pub fn new(url: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            topic: topic.into(),
        }
    }
}

#[async_trait]
impl Transport for JetstreamTransport {
    async fn dial(&self) -> Result<TransportLink> {
        let (ws, _resp) = connect_async(self.url.as_str())
            .await
            .map_err(|e| Error::Transport(format!("dialing {}: {e}", self.url)))?;
        debug!(url = %self.url, "feed websocket connected");

        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let alive = Arc::new(AtomicBool::new(true));

        tokio::spawn(pump(ws, event_tx, cmd_rx, Arc::clone(&alive), self.topic.clone()));

        Ok(TransportLink {
            handle: Arc::new(JetstreamHandle {
                cmd_tx,
                alive,
                wanted: Mutex::new(BTreeSet::new()),
            }),
            events: event_rx,
        })
    }
}

enum Command {
    Options(Vec<String>),
    Close,
}

struct JetstreamHandle {
    cmd_tx: mpsc::Sender<Command>,
    alive: Arc<AtomicBool>,
    wanted: Mutex<BTreeSet<String>>,
}

#[async_trait]
impl LinkHandle for JetstreamHandle {
    async fn subscribe(&self, topic: &str, _quality: DeliveryQuality) -> Result<()> {
        // The feed takes the full wanted set on every update, so accumulate.
        let wanted: Vec<String> = {
            let mut guard = self.wanted.lock().expect("wanted set mutex poisoned");
            guard.insert(topic.to_string());
            guard.iter().cloned().collect()
        };
        self.cmd_tx
            .send(Command::Options(wanted))
            .await
            .map_err(|_| Error::Transport("feed link is gone".to_string()))
    }

    async fn publish(&self, topic: &str, _payload: String) -> Result<()> {
        Err(Error::Transport(format!(
            "feed link is read-only, cannot publish to {topic}"
        )))
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        let _ = self.cmd_tx.send(Command::Close).await;
    }
}

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

async fn pump(
    ws: WsStream,
    event_tx: mpsc::Sender<InboundFrame>,
    mut cmd_rx: mpsc::Receiver<Command>,
    alive: Arc<AtomicBool>,
    topic: String,
) {
    let (mut sink, mut stream) = ws.split();
    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => match cmd {
                Some(Command::Options(collections)) => {
                    let frame = json!({
                        "type": "options_update",
                        "payload": { "wantedCollections": collections },
                    });
                    if sink.send(Message::Text(frame.to_string())).await.is_err() {
                        break;
                    }
                }
                Some(Command::Close) | None => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            },
            msg = stream.next() => match msg {
                Some(Ok(Message::Text(payload))) => {
                    let frame = InboundFrame {
                        topic: topic.clone(),
                        payload: payload.to_string(),
                    };
                    if event_tx.send(frame).await.is_err() {
                        break; // consumer went away
                    }
                }
                Some(Ok(Message::Ping(data))) => {
                    let _ = sink.send(Message::Pong(data)).await;
                }
                Some(Ok(Message::Close(_))) | None => {
                    debug!("feed websocket closed by peer");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "feed websocket read error");
                    break;
                }
            },
        }
    }
    alive.store(false, Ordering::SeqCst);
    // event_tx drops here, closing the frame stream and signaling disconnect.
}
