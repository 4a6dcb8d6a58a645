//! Subscriber identity and outbound frames

use crate::core::Tick;
use std::collections::HashSet;
use std::time::Instant;
use tokio::sync::mpsc;

/// Stable identifier for one live subscriber connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(pub u64);

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Frame pushed onto a subscriber's outbound channel.
///
/// The publisher never touches the transport; the connection's own send
/// task converts these into wire messages.
#[derive(Debug, Clone)]
pub enum Outbound {
    /// Pre-serialized control frame (handshake, subscribe ack)
    Control(String),
    /// Coalesced ticks matching the subscriber's interest set
    Batch(Vec<Tick>),
    /// Liveness probe
    Ping,
}

/// Registry entry for one subscriber, owned by the publisher
pub(crate) struct SubscriberEntry {
    /// Symbols this subscriber asked for. Replaced wholesale on every
    /// subscribe message, never merged.
    pub(crate) interest: HashSet<String>,
    /// Outbound delivery channel; bounded, written with try_send only
    pub(crate) tx: mpsc::Sender<Outbound>,
    /// Last inbound traffic from this connection
    pub(crate) last_seen: Instant,
}
