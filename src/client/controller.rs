//! Stream client with reconnection and render batching
//!
//! Runs in the consuming process. Owns the connection lifecycle (exponential
//! backoff with jitter, bounded attempts) and decouples the network tick
//! rate from the visible-state commit rate: incoming batches merge into a
//! pending buffer keyed by symbol, and a bounded-frequency commit loop moves
//! that buffer into the visible quote map, parking itself when idle.

use crate::client::backoff::Backoff;
use crate::core::Tick;
use crate::gateway::protocol::{ClientMessage, ServerMessage};
use crate::infrastructure::config::ClientConfig;
use crate::{Result, TickError};
use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{debug, info, warn};

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientStatus {
    Idle,
    Connecting,
    Open,
    /// Clean, client-initiated close
    Closed,
    /// Reconnect attempts exhausted; terminal
    Failed,
}

/// Consumer-side streaming client
pub struct StreamClient {
    url: String,
    symbols: Vec<String>,
    config: ClientConfig,
    status: Mutex<ClientStatus>,
    /// Quotes awaiting the next render commit (last-write-wins per symbol)
    pending: Mutex<HashMap<String, Tick>>,
    /// Committed, UI-visible quotes
    visible: Arc<RwLock<HashMap<String, Tick>>>,
    /// Wakes the commit loop when new ticks arrive
    dirty: Notify,
    /// Set by close(); interrupts the reconnect sleep and the read loop
    shutdown: Notify,
    closing: AtomicBool,
    commit_task: Mutex<Option<JoinHandle<()>>>,
}

impl StreamClient {
    pub fn new(url: impl Into<String>, symbols: Vec<String>, config: ClientConfig) -> Arc<Self> {
        Arc::new(Self {
            url: url.into(),
            symbols,
            config,
            status: Mutex::new(ClientStatus::Idle),
            pending: Mutex::new(HashMap::new()),
            visible: Arc::new(RwLock::new(HashMap::new())),
            dirty: Notify::new(),
            shutdown: Notify::new(),
            closing: AtomicBool::new(false),
            commit_task: Mutex::new(None),
        })
    }

    /// Current lifecycle state
    pub fn status(&self) -> ClientStatus {
        *self.status.lock()
    }

    /// Committed quote map, as the UI sees it
    pub fn quotes(&self) -> HashMap<String, Tick> {
        self.visible.read().clone()
    }

    /// Request a clean shutdown. Does not trigger reconnection and cancels
    /// the render-commit loop.
    pub fn close(&self) {
        self.closing.store(true, Ordering::SeqCst);
        self.shutdown.notify_waiters();
        self.shutdown.notify_one();
        if let Some(task) = self.commit_task.lock().take() {
            task.abort();
        }
    }

    /// Connect and stream until closed or the retry budget is exhausted.
    ///
    /// Returns `Ok(())` after a clean close; an error once reconnection
    /// gives up.
    pub async fn run(self: &Arc<Self>) -> Result<()> {
        self.start_render_loop();
        let backoff = Backoff::from_config(&self.config);
        let mut attempt: u32 = 0;

        loop {
            if self.closing.load(Ordering::SeqCst) {
                *self.status.lock() = ClientStatus::Closed;
                break;
            }

            *self.status.lock() = ClientStatus::Connecting;
            match connect_async(&self.url).await {
                Ok((stream, _)) => {
                    info!("Connected to {}", self.url);
                    *self.status.lock() = ClientStatus::Open;
                    attempt = 0;
                    self.stream_session(stream).await;
                }
                Err(e) => {
                    debug!("Connect to {} failed: {}", self.url, e);
                }
            }

            if self.closing.load(Ordering::SeqCst) {
                *self.status.lock() = ClientStatus::Closed;
                break;
            }

            // Unclean close: schedule the next attempt or give up.
            // The thread-local RNG must not live across an await point.
            let delay = backoff.delay_for(attempt, &mut rand::thread_rng());
            match delay {
                Some(delay) => {
                    attempt += 1;
                    debug!("Reconnect attempt {} in {:?}", attempt, delay);
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = self.shutdown.notified() => {}
                    }
                }
                None => {
                    warn!(
                        "Giving up on {} after {} attempts",
                        self.url,
                        backoff.max_attempts()
                    );
                    *self.status.lock() = ClientStatus::Failed;
                    if let Some(task) = self.commit_task.lock().take() {
                        task.abort();
                    }
                    return Err(TickError::WebSocket(
                        "reconnect attempts exhausted".to_string(),
                    ));
                }
            }
        }

        if let Some(task) = self.commit_task.lock().take() {
            task.abort();
        }
        Ok(())
    }

    /// One open-connection session: subscribe, then pump frames until the
    /// transport drops or a shutdown is requested.
    async fn stream_session(
        &self,
        stream: tokio_tungstenite::WebSocketStream<
            tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
        >,
    ) {
        let (mut tx, mut rx) = stream.split();

        let subscribe = ClientMessage::Subscribe {
            symbols: self.symbols.clone(),
        };
        let json = match serde_json::to_string(&subscribe) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize subscribe: {}", e);
                return;
            }
        };
        if tx.send(Message::text(json)).await.is_err() {
            return;
        }

        loop {
            tokio::select! {
                _ = self.shutdown.notified() => {
                    let _ = tx.send(Message::Close(None)).await;
                    return;
                }
                msg = rx.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => self.handle_frame(text.as_str()),
                        Some(Ok(Message::Ping(payload))) => {
                            if tx.send(Message::Pong(payload)).await.is_err() {
                                return;
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => return,
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            debug!("Receive error: {}", e);
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Parse one server frame; unknown frames are ignored
    fn handle_frame(&self, text: &str) {
        match serde_json::from_str::<ServerMessage>(text) {
            Ok(ServerMessage::Quotes { items }) => self.merge_quotes(items),
            Ok(ServerMessage::Hello) => debug!("Handshake acknowledged"),
            Ok(ServerMessage::Subscribed { symbols }) => {
                debug!("Subscription confirmed: {:?}", symbols)
            }
            Err(e) => debug!("Ignoring unparseable frame: {}", e),
        }
    }

    /// Merge a batch into the pending buffer and wake the commit loop
    fn merge_quotes(&self, items: Vec<Tick>) {
        if items.is_empty() {
            return;
        }
        {
            let mut pending = self.pending.lock();
            for tick in items {
                pending.insert(tick.symbol.clone(), tick);
            }
        }
        self.dirty.notify_one();
    }

    /// Spawn the bounded-frequency commit loop.
    ///
    /// The loop sleeps until woken by an arriving tick, then drains the
    /// pending buffer into the visible map once per commit interval. An
    /// empty drain parks it again, so there is zero scheduled work while
    /// the stream is quiet.
    fn start_render_loop(self: &Arc<Self>) {
        let mut slot = self.commit_task.lock();
        if slot.is_some() {
            return;
        }

        let client = Arc::clone(self);
        let period = Duration::from_millis(self.config.commit_interval_ms);
        *slot = Some(tokio::spawn(async move {
            loop {
                client.dirty.notified().await;
                loop {
                    tokio::time::sleep(period).await;
                    let batch = std::mem::take(&mut *client.pending.lock());
                    if batch.is_empty() {
                        break;
                    }
                    let mut visible = client.visible.write();
                    for (symbol, tick) in batch {
                        visible.insert(symbol, tick);
                    }
                }
            }
        }));
    }
}
