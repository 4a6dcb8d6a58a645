//! Consumer-side stream client: reconnection and render batching

pub mod backoff;
pub mod controller;

pub use backoff::Backoff;
pub use controller::{ClientStatus, StreamClient};
