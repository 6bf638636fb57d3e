use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

pub type OrderId = u64;

// Prices are whole ticks. Integer arithmetic end to end, no rounding.
pub type Price = u64;
pub type Quantity = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderType {
    Limit,
    Market,
}

/// A single order. Identity, side, price and original quantity are fixed at
/// creation; only the remaining quantity changes, and only downwards.
///
/// The remaining quantity is atomic because an order is shared between the
/// submitting caller and the book while it rests (`Arc<Order>`), and fills
/// decrement it outside the book lock.
#[derive(Debug)]
pub struct Order {
    id: OrderId,
    side: Side,
    price: Price,
    quantity: Quantity,
    remaining: AtomicU64,
    timestamp: Instant,
    order_type: OrderType,
}

impl Order {
    pub fn new(id: OrderId, side: Side, price: Price, quantity: Quantity) -> Self {
        Self {
            id,
            side,
            price,
            quantity,
            remaining: AtomicU64::new(quantity),
            timestamp: Instant::now(),
            order_type: OrderType::Limit,
        }
    }

    /// Tag the order as a different type. The tag is informational: the
    /// matcher prices every order by its stated limit price.
    pub fn with_type(mut self, order_type: OrderType) -> Self {
        self.order_type = order_type;
        self
    }

    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn price(&self) -> Price {
        self.price
    }

    /// Original quantity, as submitted.
    pub fn quantity(&self) -> Quantity {
        self.quantity
    }

    pub fn remaining_quantity(&self) -> Quantity {
        self.remaining.load(Ordering::Acquire)
    }

    pub fn filled_quantity(&self) -> Quantity {
        self.quantity - self.remaining_quantity()
    }

    /// Arrival instant; the time-priority key within a price level.
    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }

    pub fn order_type(&self) -> OrderType {
        self.order_type
    }

    pub fn is_filled(&self) -> bool {
        self.remaining_quantity() == 0
    }

    pub fn is_partially_filled(&self) -> bool {
        let remaining = self.remaining_quantity();
        remaining > 0 && remaining < self.quantity
    }

    /// Reduce the remaining quantity by up to `qty`, clamping at what is
    /// left, and return the amount actually taken. Two racing fills can
    /// never drive the remaining quantity negative or double-count.
    pub fn reduce_quantity(&self, qty: Quantity) -> Quantity {
        let mut current = self.remaining.load(Ordering::Acquire);
        loop {
            let take = qty.min(current);
            if take == 0 {
                return 0;
            }
            match self.remaining.compare_exchange_weak(
                current,
                current - take,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return take,
                Err(actual) => current = actual,
            }
        }
    }
}

impl PartialEq for Order {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Order {}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Order{{id: {}, side: {:?}, price: {}, qty: {}/{}}}",
            self.id,
            self.side,
            self.price,
            self.remaining_quantity(),
            self.quantity
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_order_is_unfilled() {
        let order = Order::new(1, Side::Buy, 100, 10);
        assert_eq!(order.remaining_quantity(), 10);
        assert_eq!(order.filled_quantity(), 0);
        assert!(!order.is_filled());
        assert!(!order.is_partially_filled());
    }

    #[test]
    fn test_reduce_quantity_partial() {
        let order = Order::new(1, Side::Sell, 100, 10);

        assert_eq!(order.reduce_quantity(4), 4);
        assert_eq!(order.remaining_quantity(), 6);
        assert_eq!(order.filled_quantity(), 4);
        assert!(order.is_partially_filled());
    }

    #[test]
    fn test_reduce_quantity_clamps_at_remaining() {
        let order = Order::new(1, Side::Sell, 100, 10);

        assert_eq!(order.reduce_quantity(25), 10);
        assert_eq!(order.remaining_quantity(), 0);
        assert!(order.is_filled());

        // Nothing left to take
        assert_eq!(order.reduce_quantity(1), 0);
    }

    #[test]
    fn test_conservation_at_every_step() {
        let order = Order::new(1, Side::Buy, 100, 100);
        for step in [30, 30, 30, 30] {
            order.reduce_quantity(step);
            assert_eq!(
                order.filled_quantity() + order.remaining_quantity(),
                order.quantity()
            );
        }
        assert!(order.is_filled());
    }

    #[test]
    fn test_market_tag_is_informational() {
        let order = Order::new(7, Side::Buy, 100, 5).with_type(OrderType::Market);
        assert_eq!(order.order_type(), OrderType::Market);
        assert_eq!(order.price(), 100);
    }

    #[test]
    fn test_timestamps_are_monotonic() {
        let first = Order::new(1, Side::Buy, 100, 1);
        let second = Order::new(2, Side::Buy, 100, 1);
        assert!(first.timestamp() <= second.timestamp());
    }
}
