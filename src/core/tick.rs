//! A single price observation
//!
//! One `Tick` exists per (symbol, update) event. The store and the pending
//! batch both retain only the newest tick per symbol; superseded ticks are
//! dropped, not archived.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One (symbol, price, timestamp) observation. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub symbol: String,
    pub price: f64,
    /// Observation time, RFC3339 on the wire
    pub ts: DateTime<Utc>,
}

impl Tick {
    /// Create a tick stamped with the current time
    pub fn now(symbol: impl Into<String>, price: f64) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            ts: Utc::now(),
        }
    }

    /// Create a tick with an explicit timestamp
    pub fn at(symbol: impl Into<String>, price: f64, ts: DateTime<Utc>) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            ts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_serializes_rfc3339() {
        let ts = DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let tick = Tick::at("AAPL", 101.5, ts);

        let json = serde_json::to_string(&tick).unwrap();
        assert!(json.contains("\"symbol\":\"AAPL\""));
        assert!(json.contains("2024-05-01T12:00:00Z"));

        let back: Tick = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tick);
    }
}
