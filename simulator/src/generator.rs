use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rand::Rng;

use matching_engine::{Order, Side};

/// Simulation parameters. Prices are whole ticks around a midpoint.
#[derive(Debug, Clone)]
pub struct SimConfig {
    pub orders: usize,
    pub threads: usize,
    pub symbol: String,
    pub base_price: u64,
    pub price_range: u64,
    pub min_quantity: u64,
    pub max_quantity: u64,
    pub batch_size: usize,
    pub csv_logging: bool,
    pub perf_monitoring: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            orders: 100_000,
            threads: 4,
            symbol: "AAPL".to_string(),
            base_price: 10_000,
            price_range: 1_000,
            min_quantity: 1,
            max_quantity: 1_000,
            batch_size: 100,
            csv_logging: true,
            perf_monitoring: true,
        }
    }
}

/// Random order flow for the simulation runs. Order ids are handed out
/// from an atomic counter so batches can be generated from any thread.
pub struct OrderGenerator {
    config: SimConfig,
    next_id: AtomicU64,
}

impl OrderGenerator {
    pub fn new(config: SimConfig) -> Self {
        Self {
            config,
            next_id: AtomicU64::new(1),
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// One uniformly random order within the configured price band.
    pub fn generate(&self) -> Arc<Order> {
        let mut rng = rand::thread_rng();

        let low = self.config.base_price.saturating_sub(self.config.price_range).max(1);
        let high = self.config.base_price + self.config.price_range;
        let price = rng.gen_range(low..=high);
        let quantity = rng.gen_range(self.config.min_quantity..=self.config.max_quantity);
        let side = if rng.gen_bool(0.5) { Side::Buy } else { Side::Sell };

        Arc::new(Order::new(self.next_id(), side, price, quantity))
    }

    pub fn generate_batch(&self, count: usize) -> Vec<Arc<Order>> {
        (0..count).map(|_| self.generate()).collect()
    }

    /// Flow engineered for maximum matching: half the orders cross the
    /// whole configured band (buys priced above it, sells below it), the
    /// other half build a passive book for them to trade against.
    pub fn generate_aggressive(&self, count: usize) -> Vec<Arc<Order>> {
        let mut rng = rand::thread_rng();
        let mut orders = Vec::with_capacity(count);

        for _ in 0..count / 2 {
            let quantity = rng.gen_range(self.config.min_quantity..=self.config.max_quantity);
            let side = if rng.gen_bool(0.5) { Side::Buy } else { Side::Sell };
            let overshoot = rng.gen_range(0..500);
            let price = match side {
                Side::Buy => self.config.base_price + self.config.price_range + overshoot,
                Side::Sell => self
                    .config
                    .base_price
                    .saturating_sub(self.config.price_range + overshoot)
                    .max(1),
            };
            orders.push(Arc::new(Order::new(self.next_id(), side, price, quantity)));
        }

        let passive = count - count / 2;
        orders.extend(self.generate_batch(passive));
        orders
    }
}
