//! Core data types: ticks and the last-value store

pub mod store;
pub mod tick;

pub use store::TickStore;
pub use tick::Tick;
