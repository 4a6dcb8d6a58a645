//! WebSocket gateway and HTTP control surface
//!
//! Accepts subscriber connections, parses inbound control messages and
//! bridges each connection's outbound channel onto the wire. Also exposes
//! the point-in-time snapshot query and the generator control endpoints.

use crate::gateway::protocol::{dedup_symbols, ClientMessage, ServerMessage};
use crate::generator::SyntheticGenerator;
use crate::infrastructure::config::GeneratorConfig;
use crate::publisher::{FanoutPublisher, Outbound, SubscriberId};
use crate::{Result, TickError};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

/// Per-connection protocol state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnState {
    /// Accepted, empty interest set
    Connected,
    /// At least one subscribe processed
    Subscribed,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub publisher: Arc<FanoutPublisher>,
    pub generator: Arc<SyntheticGenerator>,
}

/// Build the gateway router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .route("/api/snapshot", post(snapshot_handler))
        .route("/api/quotes", get(quotes_handler))
        .route("/api/generator/start", post(generator_start_handler))
        .route("/api/generator/stop", post(generator_stop_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the gateway server
pub async fn start_server(state: AppState, port: u16) -> Result<()> {
    let app = create_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(TickError::Io)?;
    axum::serve(listener, app).await.map_err(TickError::Io)?;

    Ok(())
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    format!(
        r#"{{"status":"ok","subscribers":{},"symbols":{}}}"#,
        state.publisher.subscriber_count(),
        state.publisher.store().len()
    )
}

#[derive(Debug, Deserialize)]
pub struct SnapshotRequest {
    pub symbols: Vec<String>,
}

/// Point-in-time query: symbol -> latest tick or null if never published
async fn snapshot_handler(
    State(state): State<AppState>,
    Json(req): Json<SnapshotRequest>,
) -> impl IntoResponse {
    Json(state.publisher.store().snapshot(&req.symbols))
}

/// Full dump of current prices for the tabular listing collaborator
async fn quotes_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.publisher.store().all())
}

async fn generator_start_handler(
    State(state): State<AppState>,
    Json(config): Json<GeneratorConfig>,
) -> impl IntoResponse {
    state.generator.start(config);
    r#"{"status":"started"}"#
}

async fn generator_stop_handler(State(state): State<AppState>) -> impl IntoResponse {
    state.generator.stop();
    r#"{"status":"stopped"}"#
}

/// WebSocket upgrade handler
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Drive one subscriber connection until it closes.
///
/// Registers with the publisher on accept and deregisters on any exit path,
/// so a closed transport can never leave a dangling registration.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (id, mut rx) = state.publisher.add_subscriber(Vec::new());
    let mut conn_state = ConnState::Connected;

    info!("Connection {} accepted", id);

    // Handshake acknowledgement goes out before anything else
    if !send_control(&state.publisher, id, &ServerMessage::Hello) {
        state.publisher.remove_subscriber(id);
        return;
    }

    // Forward outbound frames from the publisher onto the wire
    let send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let msg = match frame {
                Outbound::Control(json) => Message::Text(json),
                Outbound::Batch(items) => {
                    match serde_json::to_string(&ServerMessage::Quotes { items }) {
                        Ok(json) => Message::Text(json),
                        Err(e) => {
                            warn!("Failed to serialize batch: {}", e);
                            continue;
                        }
                    }
                }
                Outbound::Ping => Message::Ping(Vec::new()),
            };
            if ws_tx.send(msg).await.is_err() {
                break;
            }
        }
    });

    while let Some(msg) = ws_rx.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                state.publisher.touch(id);
                handle_control(&state, id, &text, &mut conn_state);
            }
            Ok(Message::Binary(data)) => {
                state.publisher.touch(id);
                if let Ok(text) = std::str::from_utf8(&data) {
                    handle_control(&state, id, text, &mut conn_state);
                }
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                // Any transport-level traffic counts as liveness
                state.publisher.touch(id);
            }
            Ok(Message::Close(_)) => break,
            Err(e) => {
                warn!("Transport error on {}: {}", id, e);
                break;
            }
        }
    }

    // CLOSED: terminal, no further messages are processed
    state.publisher.remove_subscriber(id);
    send_task.abort();
    info!("Connection {} closed", id);
}

/// Process one inbound control message.
///
/// Malformed or unrecognized messages are silently ignored; the connection
/// stays open and no error is surfaced to the peer.
fn handle_control(state: &AppState, id: SubscriberId, text: &str, conn_state: &mut ConnState) {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::Subscribe { symbols }) => {
            let symbols = dedup_symbols(symbols);
            debug!("{} subscribing to {:?}", id, symbols);

            state.publisher.update_subscription(id, symbols.clone());
            *conn_state = ConnState::Subscribed;

            send_control(&state.publisher, id, &ServerMessage::Subscribed { symbols });
        }
        Err(e) => {
            debug!("Ignoring malformed message from {}: {}", id, e);
        }
    }
}

/// Serialize a control frame and push it onto the subscriber's channel
fn send_control(publisher: &FanoutPublisher, id: SubscriberId, msg: &ServerMessage) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => publisher.send_to(id, Outbound::Control(json)),
        Err(e) => {
            warn!("Failed to serialize control frame for {}: {}", id, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TickStore;
    use crate::infrastructure::config::PublisherConfig;
    use tokio::sync::mpsc;

    fn test_state() -> AppState {
        let store = Arc::new(TickStore::new());
        let publisher = Arc::new(FanoutPublisher::new(store, PublisherConfig::default()));
        let generator = Arc::new(SyntheticGenerator::new(Arc::clone(&publisher)));
        AppState {
            publisher,
            generator,
        }
    }

    fn expect_control(rx: &mut mpsc::Receiver<Outbound>) -> String {
        match rx.try_recv() {
            Ok(Outbound::Control(json)) => json,
            other => panic!("expected control frame, got {:?}", other),
        }
    }

    #[test]
    fn test_subscribe_dedups_and_acks() {
        let state = test_state();
        let (id, mut rx) = state.publisher.add_subscriber(Vec::new());
        let mut conn = ConnState::Connected;

        handle_control(
            &state,
            id,
            r#"{"type":"subscribe","symbols":["AAPL","AAPL","MSFT"]}"#,
            &mut conn,
        );

        assert_eq!(conn, ConnState::Subscribed);
        let ack = expect_control(&mut rx);
        assert_eq!(
            ack,
            r#"{"type":"subscribed","symbols":["AAPL","MSFT"]}"#
        );

        let interest = state.publisher.interest(id).unwrap();
        assert_eq!(interest.len(), 2);
        assert!(interest.contains("AAPL"));
    }

    #[test]
    fn test_resubscribe_overwrites() {
        let state = test_state();
        let (id, mut rx) = state.publisher.add_subscriber(Vec::new());
        let mut conn = ConnState::Connected;

        handle_control(
            &state,
            id,
            r#"{"type":"subscribe","symbols":["AAPL"]}"#,
            &mut conn,
        );
        handle_control(
            &state,
            id,
            r#"{"type":"subscribe","symbols":["MSFT"]}"#,
            &mut conn,
        );

        let interest = state.publisher.interest(id).unwrap();
        assert_eq!(interest.len(), 1);
        assert!(interest.contains("MSFT"));

        // Both subscribes were acknowledged
        expect_control(&mut rx);
        expect_control(&mut rx);
    }

    #[test]
    fn test_malformed_message_is_silently_ignored() {
        let state = test_state();
        let (id, mut rx) = state.publisher.add_subscriber(Vec::new());
        let mut conn = ConnState::Connected;

        handle_control(&state, id, "not json at all", &mut conn);
        handle_control(&state, id, r#"{"type":"dance"}"#, &mut conn);

        // No reply, no state change, still registered
        assert!(rx.try_recv().is_err());
        assert_eq!(conn, ConnState::Connected);
        assert_eq!(state.publisher.subscriber_count(), 1);
    }

    #[test]
    fn test_send_control_to_removed_subscriber_fails() {
        let state = test_state();
        let (id, _rx) = state.publisher.add_subscriber(Vec::new());
        state.publisher.remove_subscriber(id);

        assert!(!send_control(&state.publisher, id, &ServerMessage::Hello));
    }

    #[tokio::test]
    async fn test_end_to_end_subscribe_publish_receive() {
        use crate::client::StreamClient;
        use crate::infrastructure::config::ClientConfig;
        use chrono::Utc;
        use std::time::Duration;

        let store = Arc::new(TickStore::new());
        let publisher = Arc::new(FanoutPublisher::new(
            store,
            PublisherConfig {
                flush_interval_ms: 10,
                ..Default::default()
            },
        ));
        let generator = Arc::new(SyntheticGenerator::new(Arc::clone(&publisher)));
        let state = AppState {
            publisher: Arc::clone(&publisher),
            generator,
        };
        publisher.start();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = create_router(state);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = StreamClient::new(
            format!("ws://{}/ws", addr),
            vec!["AAPL".to_string()],
            ClientConfig {
                commit_interval_ms: 5,
                ..Default::default()
            },
        );
        let runner = Arc::clone(&client);
        let run_handle = tokio::spawn(async move { runner.run().await });

        // Wait until the subscribe message has been processed server-side
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let subscribed = publisher.subscriber_count() == 1
                    && publisher
                        .interest(crate::publisher::SubscriberId(0))
                        .map(|i| i.contains("AAPL"))
                        .unwrap_or(false);
                if subscribed {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("client should register and subscribe");

        publisher.publish("AAPL", 123.45, Utc::now());

        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if let Some(tick) = client.quotes().get("AAPL") {
                    assert_eq!(tick.price, 123.45);
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("tick should travel from publisher to visible quotes");

        client.close();
        let result = tokio::time::timeout(Duration::from_secs(2), run_handle)
            .await
            .expect("client loop should exit after close")
            .unwrap();
        assert!(result.is_ok());
        publisher.stop();
    }
}
