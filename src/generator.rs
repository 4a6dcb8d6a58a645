//! Synthetic tick generator
//!
//! Deterministic pseudo-random driver for demonstration and load testing.
//! The random walk itself is a seedable, runtime-free struct so repeated
//! runs with the same configuration produce identical price sequences; the
//! async driver only adds pacing on top.

use self::walk::PriceWalk;
use crate::infrastructure::config::GeneratorConfig;
use crate::publisher::FanoutPublisher;
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

mod walk {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// Fraction of the current price used as the maximum step size
    const STEP_FRACTION: f64 = 0.005;

    /// Seeded random walk over a fixed symbol set.
    ///
    /// Each step picks one symbol uniformly, perturbs its running mid-price
    /// by a small signed delta and clamps it to the positive floor. The
    /// sequence of (symbol, price) pairs is a pure function of the seed and
    /// the configuration.
    pub struct PriceWalk {
        rng: StdRng,
        symbols: Vec<String>,
        prices: Vec<f64>,
        floor: f64,
    }

    impl PriceWalk {
        pub fn new(seed: u64, symbols: Vec<String>, start_price: f64, floor: f64) -> Self {
            let prices = vec![start_price.max(floor); symbols.len()];
            Self {
                rng: StdRng::seed_from_u64(seed),
                symbols,
                prices,
                floor,
            }
        }

        /// Next perturbation, or `None` for an empty symbol set
        pub fn next_tick(&mut self) -> Option<(&str, f64)> {
            if self.symbols.is_empty() {
                return None;
            }
            let idx = self.rng.gen_range(0..self.symbols.len());
            let delta = self.prices[idx] * STEP_FRACTION * self.rng.gen_range(-1.0..1.0);
            let price = (self.prices[idx] + delta).max(self.floor);
            self.prices[idx] = price;
            Some((&self.symbols[idx], price))
        }
    }
}

/// Owns the background driver task feeding the publisher.
///
/// Starting while a driver is already running replaces it; stopping when
/// none is running is a no-op.
pub struct SyntheticGenerator {
    publisher: Arc<FanoutPublisher>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl SyntheticGenerator {
    pub fn new(publisher: Arc<FanoutPublisher>) -> Self {
        Self {
            publisher,
            handle: Mutex::new(None),
        }
    }

    /// Start generating at the configured aggregate rate, replacing any
    /// driver that is already running.
    pub fn start(&self, config: GeneratorConfig) {
        let mut slot = self.handle.lock();
        if let Some(old) = slot.take() {
            old.abort();
            tracing::info!("Replacing running generator");
        }

        let rate = config.rate_per_sec.max(1);
        let period = Duration::from_secs_f64(1.0 / rate as f64);
        let mut walk = PriceWalk::new(
            config.seed,
            config.symbols.clone(),
            config.start_price,
            config.price_floor,
        );
        let publisher = Arc::clone(&self.publisher);

        tracing::info!(
            "Generator started: {} updates/s over {} symbols (seed {})",
            rate,
            config.symbols.len(),
            config.seed
        );

        *slot = Some(tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if let Some((symbol, price)) = walk.next_tick() {
                    let symbol = symbol.to_string();
                    publisher.publish(&symbol, price, Utc::now());
                }
            }
        }));
    }

    /// Stop the driver if one is running. Safe to call repeatedly.
    pub fn stop(&self) {
        if let Some(handle) = self.handle.lock().take() {
            handle.abort();
            tracing::info!("Generator stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.lock().is_some()
    }
}

impl Drop for SyntheticGenerator {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::walk::PriceWalk;
    use super::*;
    use crate::core::TickStore;
    use crate::infrastructure::config::PublisherConfig;

    fn test_symbols() -> Vec<String> {
        vec!["AAPL".to_string(), "MSFT".to_string(), "GOOG".to_string()]
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = PriceWalk::new(7, test_symbols(), 100.0, 0.01);
        let mut b = PriceWalk::new(7, test_symbols(), 100.0, 0.01);

        for _ in 0..500 {
            let (sym_a, price_a) = a.next_tick().map(|(s, p)| (s.to_string(), p)).unwrap();
            let (sym_b, price_b) = b.next_tick().map(|(s, p)| (s.to_string(), p)).unwrap();
            assert_eq!(sym_a, sym_b);
            assert_eq!(price_a, price_b);
        }
    }

    #[test]
    fn test_different_seed_diverges() {
        let mut a = PriceWalk::new(1, test_symbols(), 100.0, 0.01);
        let mut b = PriceWalk::new(2, test_symbols(), 100.0, 0.01);

        let seq_a: Vec<f64> = (0..50).filter_map(|_| a.next_tick().map(|(_, p)| p)).collect();
        let seq_b: Vec<f64> = (0..50).filter_map(|_| b.next_tick().map(|(_, p)| p)).collect();
        assert_ne!(seq_a, seq_b);
    }

    #[test]
    fn test_price_clamped_to_floor() {
        // Start at the floor so every downward step must clamp
        let mut walk = PriceWalk::new(3, test_symbols(), 0.01, 0.01);
        for _ in 0..1000 {
            let (_, price) = walk.next_tick().unwrap();
            assert!(price >= 0.01);
        }
    }

    #[test]
    fn test_empty_symbol_set_yields_nothing() {
        let mut walk = PriceWalk::new(0, Vec::new(), 100.0, 0.01);
        assert!(walk.next_tick().is_none());
    }

    #[tokio::test]
    async fn test_start_replaces_and_stop_is_idempotent() {
        let store = Arc::new(TickStore::new());
        let publisher = Arc::new(FanoutPublisher::new(store, PublisherConfig::default()));
        let generator = SyntheticGenerator::new(publisher);

        generator.stop(); // nothing running: no-op
        generator.start(GeneratorConfig::default());
        assert!(generator.is_running());
        generator.start(GeneratorConfig::default()); // replaces, not doubles
        assert!(generator.is_running());
        generator.stop();
        assert!(!generator.is_running());
        generator.stop();
    }

    #[tokio::test]
    async fn test_generator_feeds_publisher() {
        let store = Arc::new(TickStore::new());
        let publisher = Arc::new(FanoutPublisher::new(
            Arc::clone(&store),
            PublisherConfig::default(),
        ));
        let generator = SyntheticGenerator::new(Arc::clone(&publisher));

        generator.start(GeneratorConfig {
            rate_per_sec: 1000,
            symbols: vec!["AAPL".to_string()],
            ..Default::default()
        });

        tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                if store.get("AAPL").is_some() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("generator should publish within a second");

        generator.stop();
    }
}
