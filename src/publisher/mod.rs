//! Coalescing fan-out publisher

pub mod fanout;
pub mod subscriber;

pub use fanout::FanoutPublisher;
pub use subscriber::{Outbound, SubscriberId};
