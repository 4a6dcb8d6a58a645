//! Real-time market tick distribution service
//!
//! # Architecture
//! - **core**: Tick type and last-value store
//! - **publisher**: coalescing fan-out with flush and heartbeat timers
//! - **gateway**: WebSocket subscriber connections and HTTP control surface
//! - **generator**: deterministic synthetic tick driver
//! - **client**: consumer-side reconnect and render-batching controller
//! - **infrastructure**: cold path (logging, config)

use std::sync::Arc;
use tickcast::core::TickStore;
use tickcast::gateway::{start_server, AppState};
use tickcast::generator::SyntheticGenerator;
use tickcast::infrastructure::{init_logging, Config};
use tickcast::publisher::FanoutPublisher;
use tickcast::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let _guards = init_logging();

    let config = Config::load().unwrap_or_default();
    tracing::info!("Starting tick distribution service");

    // Explicitly constructed and owned instances, wired top-down
    let store = Arc::new(TickStore::new());
    let publisher = Arc::new(FanoutPublisher::new(
        Arc::clone(&store),
        config.publisher.clone(),
    ));
    let generator = Arc::new(SyntheticGenerator::new(Arc::clone(&publisher)));

    publisher.start();

    if config.generator.autostart {
        generator.start(config.generator.clone());
    }

    let state = AppState {
        publisher: Arc::clone(&publisher),
        generator: Arc::clone(&generator),
    };
    let result = start_server(state, config.api.port).await;

    generator.stop();
    publisher.stop();
    result
}
