// src/connection.rs
// Connection manager: maintains exactly one logical inbound connection,
// survives transient failures via automatic reconnect, and replays the
// desired subscription set on every (re)connect so no topic is silently
// lost. Owned explicitly and passed down; there is no global client handle.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::error::{Error, Result};
use crate::transport::{DeliveryQuality, InboundFrame, LinkHandle, Transport, TransportLink};

/// Fixed delay between reconnect attempts.
const RECONNECT_BACKOFF: Duration = Duration::from_secs(5);
/// Bound on waiting for the first successful connect.
const READY_TIMEOUT: Duration = Duration::from_secs(30);

const EVENT_BUFFER: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Outbound side of the pub/sub collaborator. Implemented by the connection
/// manager; consumers of the trait never see transport details.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, topic: &str, payload: String) -> Result<()>;
    fn is_connected(&self) -> bool;
}

pub struct ConnectionManager {
    transport: Arc<dyn Transport>,
    /// Topic -> delivery quality. Survives reconnects; only `subscribe`
    /// grows it and nothing ever clears it.
    desired: AsyncMutex<BTreeMap<String, DeliveryQuality>>,
    link: Mutex<Option<Arc<dyn LinkHandle>>>,
    state_tx: watch::Sender<ConnectionState>,
    /// One-shot ready latch: flips to true after the first subscription
    /// replay completes, and never again for the process lifetime.
    ready_tx: watch::Sender<bool>,
    /// Flipped by `disconnect()`; suppresses further auto-reconnect and
    /// interrupts the frame-forwarding loop even when no frame arrives.
    terminal_tx: watch::Sender<bool>,
    events_tx: mpsc::Sender<InboundFrame>,
    events_rx: Mutex<Option<mpsc::Receiver<InboundFrame>>>,
    backoff: Duration,
}

impl ConnectionManager {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (ready_tx, _) = watch::channel(false);
        let (terminal_tx, _) = watch::channel(false);
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        Self {
            transport,
            desired: AsyncMutex::new(BTreeMap::new()),
            link: Mutex::new(None),
            state_tx,
            ready_tx,
            terminal_tx,
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            backoff: RECONNECT_BACKOFF,
        }
    }

    /// Shorter backoff for tests.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Take the inbound frame stream. Yields frames across reconnects;
    /// closes only on terminal disconnect. Callable once.
    pub fn take_events(&self) -> Option<mpsc::Receiver<InboundFrame>> {
        self.events_rx.lock().expect("events mutex poisoned").take()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// True only when both the local state and the transport's own liveness
    /// check agree.
    pub fn is_connected(&self) -> bool {
        if self.state() != ConnectionState::Connected {
            return false;
        }
        self.link
            .lock()
            .expect("link mutex poisoned")
            .as_ref()
            .is_some_and(|h| h.is_alive())
    }

    /// Idempotent: records the topic in the desired set under the set's
    /// lock, subscribing immediately when connected. When disconnected the
    /// subscription is deferred to the next connect.
    pub async fn subscribe(&self, topic: &str, quality: DeliveryQuality) -> Result<()> {
        let mut desired = self.desired.lock().await;
        // Re-inserting an existing topic just refreshes its quality.
        desired.insert(topic.to_string(), quality);

        let handle = self
            .link
            .lock()
            .expect("link mutex poisoned")
            .clone()
            .filter(|h| h.is_alive());
        match handle {
            Some(handle) => handle.subscribe(topic, quality).await,
            None => {
                info!(topic, "not connected; topic will be subscribed on connect");
                Ok(())
            }
        }
    }

    /// Spawn the connection loop: dial, replay subscriptions, forward frames,
    /// and on transport error retry with fixed backoff until `disconnect()`.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let mgr = Arc::clone(self);
        tokio::spawn(async move { mgr.run().await })
    }

    async fn run(self: Arc<Self>) {
        while !*self.terminal_tx.borrow() {
            self.state_tx.send_replace(ConnectionState::Connecting);
            let TransportLink { handle, mut events } = match self.transport.dial().await {
                Ok(link) => link,
                Err(e) => {
                    warn!(error = %e, "connect failed; retrying");
                    self.state_tx.send_replace(ConnectionState::Disconnected);
                    tokio::time::sleep(self.backoff).await;
                    continue;
                }
            };

            // A terminal disconnect may have raced the handshake; the fresh
            // link must not come up in that case.
            let mut terminal_rx = self.terminal_tx.subscribe();
            if *terminal_rx.borrow() {
                handle.close().await;
                break;
            }

            // On-connect: under the desired-set lock, reissue every desired
            // subscription before inbound dispatch is considered ready.
            {
                let desired = self.desired.lock().await;
                for (topic, quality) in desired.iter() {
                    info!(topic, "subscribing");
                    if let Err(e) = handle.subscribe(topic, *quality).await {
                        error!(topic, error = %e, "failed to subscribe");
                    }
                }
                *self.link.lock().expect("link mutex poisoned") = Some(Arc::clone(&handle));
                self.state_tx.send_replace(ConnectionState::Connected);
            }
            info!("connected");

            // First connect only; later reconnects do not re-signal.
            self.ready_tx.send_if_modified(|ready| {
                if *ready {
                    false
                } else {
                    *ready = true;
                    true
                }
            });

            // Forward frames until the link dies or we are told to stop.
            // Quiet feeds still react to disconnect via the terminal signal.
            loop {
                tokio::select! {
                    changed = terminal_rx.changed() => {
                        if changed.is_err() || *terminal_rx.borrow() {
                            break;
                        }
                    }
                    frame = events.recv() => match frame {
                        Some(frame) => {
                            if self.events_tx.send(frame).await.is_err() {
                                // Consumer dropped its receiver; nothing left
                                // to feed.
                                self.terminal_tx.send_replace(true);
                                break;
                            }
                        }
                        None => break,
                    },
                }
            }

            // On-disconnect: clear the live link, keep desired subscriptions.
            handle.close().await;
            *self.link.lock().expect("link mutex poisoned") = None;
            self.state_tx.send_replace(ConnectionState::Disconnected);

            if *self.terminal_tx.borrow() {
                break;
            }
            warn!("connection lost; reconnecting");
            tokio::time::sleep(self.backoff).await;
        }
        self.state_tx.send_replace(ConnectionState::Disconnected);
    }

    /// Block until the manager reports Connected. Pair with `start`; retries
    /// inside the loop mean this only returns once a handshake succeeded.
    pub async fn connect(&self) {
        let mut rx = self.state_tx.subscribe();
        while *rx.borrow_and_update() != ConnectionState::Connected {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Wait for the one-shot ready signal: first connect complete with all
    /// desired subscriptions reinstated. Bounded; fails with `ReadyTimeout`.
    pub async fn wait_ready(&self) -> Result<()> {
        let mut rx = self.ready_tx.subscribe();
        let wait = async {
            while !*rx.borrow_and_update() {
                if rx.changed().await.is_err() {
                    return Err(Error::NotConnected);
                }
            }
            Ok(())
        };
        tokio::time::timeout(READY_TIMEOUT, wait)
            .await
            .map_err(|_| Error::ReadyTimeout)?
    }

    /// Terminal disconnect: closes the live connection and suppresses any
    /// further auto-reconnect.
    pub async fn disconnect(&self) {
        self.terminal_tx.send_replace(true);
        let handle = self.link.lock().expect("link mutex poisoned").clone();
        if let Some(handle) = handle {
            handle.close().await;
        }
    }
}

#[async_trait]
impl Publisher for ConnectionManager {
    /// At-most-once: callers log failures and move on.
    async fn publish(&self, topic: &str, payload: String) -> Result<()> {
        let handle = self
            .link
            .lock()
            .expect("link mutex poisoned")
            .clone()
            .filter(|h| h.is_alive())
            .ok_or(Error::NotConnected)?;
        handle.publish(topic, payload).await
    }

    fn is_connected(&self) -> bool {
        ConnectionManager::is_connected(self)
    }
}
