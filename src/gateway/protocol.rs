//! WebSocket protocol message types
//!
//! JSON message format for the streaming subscription channel. Every frame
//! carries a lowercase `type` tag.

use crate::core::Tick;
use serde::{Deserialize, Serialize};

/// Message sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Replace the interest set. Overwrites prior subscriptions entirely.
    Subscribe { symbols: Vec<String> },
}

/// Message sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Handshake acknowledgement, sent once on connect
    Hello,
    /// Echo of the resulting interest set after a subscribe
    Subscribed { symbols: Vec<String> },
    /// One coalesced batch per flush cycle, never empty
    Quotes { items: Vec<Tick> },
}

/// De-duplicate a symbol list, preserving first-seen order
pub fn dedup_symbols(symbols: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    symbols
        .into_iter()
        .filter(|s| seen.insert(s.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_parse_subscribe() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"subscribe","symbols":["AAPL","MSFT"]}"#).unwrap();
        let ClientMessage::Subscribe { symbols } = msg;
        assert_eq!(symbols, vec!["AAPL".to_string(), "MSFT".to_string()]);
    }

    #[test]
    fn test_reject_unknown_type() {
        let res = serde_json::from_str::<ClientMessage>(r#"{"type":"shout","symbols":[]}"#);
        assert!(res.is_err());
    }

    #[test]
    fn test_server_message_tags() {
        assert_eq!(
            serde_json::to_string(&ServerMessage::Hello).unwrap(),
            r#"{"type":"hello"}"#
        );

        let ack = ServerMessage::Subscribed {
            symbols: vec!["AAPL".to_string()],
        };
        assert_eq!(
            serde_json::to_string(&ack).unwrap(),
            r#"{"type":"subscribed","symbols":["AAPL"]}"#
        );
    }

    #[test]
    fn test_quotes_frame_shape() {
        let frame = ServerMessage::Quotes {
            items: vec![Tick::at("AAPL", 101.0, Utc::now())],
        };
        let json = serde_json::to_string(&frame).unwrap();
        assert!(json.starts_with(r#"{"type":"quotes","items":["#));
        assert!(json.contains(r#""symbol":"AAPL""#));
        assert!(json.contains(r#""price":101.0"#));
        assert!(json.contains(r#""ts":""#));
    }

    #[test]
    fn test_dedup_preserves_order() {
        let symbols = ["AAPL", "MSFT", "AAPL", "GOOG", "MSFT"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(
            dedup_symbols(symbols),
            vec!["AAPL".to_string(), "MSFT".to_string(), "GOOG".to_string()]
        );
    }
}
