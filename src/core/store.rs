//! Last-value tick store
//!
//! Pure in-memory mapping from symbol to its most recent tick. Content is
//! lost on restart by design; there is no history and no persistence.

use crate::core::tick::Tick;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Point-in-time store of the latest tick per symbol.
///
/// Writes always win: `upsert` replaces the stored tick unconditionally,
/// with no compare-and-swap on the timestamp. Callers are trusted to supply
/// monotonically sensible timestamps.
#[derive(Default)]
pub struct TickStore {
    ticks: RwLock<HashMap<String, Tick>>,
}

impl TickStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored tick for `symbol` unconditionally
    pub fn upsert(&self, symbol: &str, price: f64, ts: DateTime<Utc>) {
        let tick = Tick::at(symbol, price, ts);
        self.ticks.write().insert(symbol.to_string(), tick);
    }

    /// Latest tick for one symbol, or `None` if never published
    pub fn get(&self, symbol: &str) -> Option<Tick> {
        self.ticks.read().get(symbol).cloned()
    }

    /// Latest tick for each requested symbol.
    ///
    /// Unknown symbols map to `None`; they are never an error.
    pub fn snapshot(&self, symbols: &[String]) -> HashMap<String, Option<Tick>> {
        let ticks = self.ticks.read();
        symbols
            .iter()
            .map(|s| (s.clone(), ticks.get(s).cloned()))
            .collect()
    }

    /// Every currently known tick
    pub fn all(&self) -> Vec<Tick> {
        self.ticks.read().values().cloned().collect()
    }

    /// Number of symbols with at least one observed tick
    pub fn len(&self) -> usize {
        self.ticks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.read().is_empty()
    }
}
