//! Fan-out publisher with last-write-wins coalescing
//!
//! Central coordinator between tick production and delivery. Incoming ticks
//! land in a pending batch keyed by symbol; a fixed-period flush swaps the
//! batch out under the lock and delivers the per-subscriber intersection
//! outside it, so one slow subscriber can never stall the others. A separate
//! heartbeat timer probes connections and prunes dead ones.

use crate::core::{Tick, TickStore};
use crate::infrastructure::config::PublisherConfig;
use crate::publisher::subscriber::{Outbound, SubscriberEntry, SubscriberId};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// State shared by the flush timer, the heartbeat timer and connection
/// events. One lock for both maps; mutations are never interleaved with
/// iteration by construction.
#[derive(Default)]
struct PublisherState {
    /// symbol -> newest not-yet-flushed tick (last-write-wins)
    pending: HashMap<String, Tick>,
    /// registry of live subscribers
    subscribers: HashMap<SubscriberId, SubscriberEntry>,
}

/// Coalescing fan-out publisher.
///
/// Per flush the cost is O(subscribers x their interest size), independent
/// of how many ticks arrived in the window.
pub struct FanoutPublisher {
    store: Arc<TickStore>,
    config: PublisherConfig,
    state: Mutex<PublisherState>,
    next_id: AtomicU64,
    /// Flush and heartbeat task handles while running
    tasks: Mutex<Option<(JoinHandle<()>, JoinHandle<()>)>>,
}

impl FanoutPublisher {
    /// Create a publisher writing through to `store`
    pub fn new(store: Arc<TickStore>, config: PublisherConfig) -> Self {
        Self {
            store,
            config,
            state: Mutex::new(PublisherState::default()),
            next_id: AtomicU64::new(0),
            tasks: Mutex::new(None),
        }
    }

    /// Register a subscriber with a (possibly empty) interest set.
    ///
    /// Returns the new id and the receiving half of its outbound channel.
    pub fn add_subscriber(
        &self,
        initial_symbols: Vec<String>,
    ) -> (SubscriberId, mpsc::Receiver<Outbound>) {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.config.channel_capacity);

        let entry = SubscriberEntry {
            interest: initial_symbols.into_iter().collect(),
            tx,
            last_seen: Instant::now(),
        };
        self.state.lock().subscribers.insert(id, entry);

        tracing::info!("Subscriber {} registered", id);
        (id, rx)
    }

    /// Replace a subscriber's interest set. Overwrites, never merges.
    ///
    /// Unknown ids are a logged no-op.
    pub fn update_subscription(&self, id: SubscriberId, symbols: Vec<String>) {
        let mut state = self.state.lock();
        match state.subscribers.get_mut(&id) {
            Some(entry) => {
                entry.interest = symbols.into_iter().collect();
                entry.last_seen = Instant::now();
            }
            None => tracing::debug!("Subscription update for unknown subscriber {}", id),
        }
    }

    /// Deregister a subscriber. Safe to call for ids that were never added
    /// or were already removed.
    pub fn remove_subscriber(&self, id: SubscriberId) {
        if self.state.lock().subscribers.remove(&id).is_some() {
            tracing::info!("Subscriber {} removed", id);
        }
    }

    /// Push one frame onto a subscriber's outbound channel.
    ///
    /// Returns false when the subscriber is unknown or its channel is
    /// closed/full; the caller decides whether that ends the connection.
    pub fn send_to(&self, id: SubscriberId, frame: Outbound) -> bool {
        let tx = match self.state.lock().subscribers.get(&id) {
            Some(entry) => entry.tx.clone(),
            None => return false,
        };
        tx.try_send(frame).is_ok()
    }

    /// Record inbound traffic from a connection for liveness tracking
    pub fn touch(&self, id: SubscriberId) {
        if let Some(entry) = self.state.lock().subscribers.get_mut(&id) {
            entry.last_seen = Instant::now();
        }
    }

    /// Current interest set of a subscriber, if registered
    pub fn interest(&self, id: SubscriberId) -> Option<HashSet<String>> {
        self.state
            .lock()
            .subscribers
            .get(&id)
            .map(|e| e.interest.clone())
    }

    /// Number of registered subscribers
    pub fn subscriber_count(&self) -> usize {
        self.state.lock().subscribers.len()
    }

    /// Ingest one tick: write through to the store, then overwrite the
    /// symbol's slot in the pending batch.
    pub fn publish(&self, symbol: &str, price: f64, ts: DateTime<Utc>) {
        self.store.upsert(symbol, price, ts);
        self.state
            .lock()
            .pending
            .insert(symbol.to_string(), Tick::at(symbol, price, ts));
    }

    /// One flush cycle: swap out the pending batch and deliver the filtered
    /// intersection to each subscriber. Returns the number of frames sent.
    ///
    /// With no subscribers the batch stays put and keeps coalescing, bounded
    /// by the symbol set size. Delivery happens entirely outside the lock;
    /// a failed send only marks that one subscriber for removal.
    fn flush_once(&self) -> usize {
        let deliveries = {
            let mut state = self.state.lock();
            if state.pending.is_empty() || state.subscribers.is_empty() {
                return 0;
            }
            let batch = std::mem::take(&mut state.pending);

            let mut deliveries = Vec::with_capacity(state.subscribers.len());
            for (id, entry) in &state.subscribers {
                let items: Vec<Tick> = batch
                    .values()
                    .filter(|t| entry.interest.contains(&t.symbol))
                    .cloned()
                    .collect();
                // No matching symbols: nothing this cycle, never an empty payload
                if !items.is_empty() {
                    deliveries.push((*id, entry.tx.clone(), items));
                }
            }
            deliveries
        };

        let mut delivered = 0;
        let mut dead = Vec::new();
        for (id, tx, items) in deliveries {
            match tx.try_send(Outbound::Batch(items)) {
                Ok(()) => delivered += 1,
                Err(_) => dead.push(id),
            }
        }
        for id in dead {
            tracing::warn!("Delivery to {} failed, pruning", id);
            self.remove_subscriber(id);
        }
        delivered
    }

    /// One heartbeat cycle: probe every subscriber and prune those whose
    /// channel is gone or that have been silent past the stale window.
    fn heartbeat_once(&self) {
        let probes: Vec<(SubscriberId, mpsc::Sender<Outbound>, Instant)> = {
            let state = self.state.lock();
            state
                .subscribers
                .iter()
                .map(|(id, e)| (*id, e.tx.clone(), e.last_seen))
                .collect()
        };

        // Two silent heartbeat windows count as a dead connection
        let stale_after = self.config.heartbeat_interval() * 2;

        for (id, tx, last_seen) in probes {
            if last_seen.elapsed() > stale_after {
                tracing::warn!("Subscriber {} silent for {:?}, pruning", id, last_seen.elapsed());
                self.remove_subscriber(id);
                continue;
            }
            if tx.try_send(Outbound::Ping).is_err() {
                tracing::warn!("Heartbeat to {} failed, pruning", id);
                self.remove_subscriber(id);
            }
        }
    }

    /// Spawn the flush and heartbeat timers. Starting while already running
    /// replaces the previous timers.
    pub fn start(self: &Arc<Self>) {
        let mut tasks = self.tasks.lock();
        if let Some((flush, heartbeat)) = tasks.take() {
            flush.abort();
            heartbeat.abort();
        }

        let flush_task = {
            let publisher = Arc::clone(self);
            tokio::spawn(async move {
                let mut ticker = interval(publisher.config.flush_interval());
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    ticker.tick().await;
                    publisher.flush_once();
                }
            })
        };

        let heartbeat_task = {
            let publisher = Arc::clone(self);
            tokio::spawn(async move {
                let mut ticker = interval(publisher.config.heartbeat_interval());
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    ticker.tick().await;
                    publisher.heartbeat_once();
                }
            })
        };

        *tasks = Some((flush_task, heartbeat_task));
        tracing::info!(
            "Publisher started: flush every {:?}, heartbeat every {:?}",
            self.config.flush_interval(),
            self.config.heartbeat_interval()
        );
    }

    /// Cancel both timers. Safe to call repeatedly or before start.
    pub fn stop(&self) {
        if let Some((flush, heartbeat)) = self.tasks.lock().take() {
            flush.abort();
            heartbeat.abort();
            tracing::info!("Publisher stopped");
        }
    }

    /// The store this publisher writes through to
    pub fn store(&self) -> &Arc<TickStore> {
        &self.store
    }
}

impl Drop for FanoutPublisher {
    fn drop(&mut self) {
        self.stop();
    }
}
