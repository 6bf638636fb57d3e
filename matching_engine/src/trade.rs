use std::fmt;

use chrono::{DateTime, Local};

use crate::order::{OrderId, Price, Quantity};

/// A completed fill between two orders. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trade {
    pub buy_order_id: OrderId,
    pub sell_order_id: OrderId,
    pub price: Price,
    pub quantity: Quantity,
    /// Execution time, captured when the fill happens.
    pub timestamp: DateTime<Local>,
}

impl Trade {
    pub fn new(
        buy_order_id: OrderId,
        sell_order_id: OrderId,
        price: Price,
        quantity: Quantity,
    ) -> Self {
        Self {
            buy_order_id,
            sell_order_id,
            price,
            quantity,
            timestamp: Local::now(),
        }
    }

    /// One CSV row: the trade's own execution timestamp, then the four ids
    /// and amounts. Matches the trade-log header layout.
    pub fn to_csv_row(&self) -> String {
        format!(
            "{},{},{},{},{}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            self.buy_order_id,
            self.sell_order_id,
            self.price,
            self.quantity
        )
    }
}

impl fmt::Display for Trade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Trade{{Buy:{}, Sell:{}, Price:{}, Qty:{}}}",
            self.buy_order_id, self.sell_order_id, self.price, self.quantity
        )
    }
}
