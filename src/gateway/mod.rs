//! Connection gateway: wire protocol and WebSocket/HTTP server

pub mod protocol;
pub mod server;

pub use protocol::{ClientMessage, ServerMessage};
pub use server::{create_router, start_server, AppState};
