use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt::Write as _;
use std::sync::{Arc, Mutex};

use crate::lock;
use crate::order::{Order, OrderId, Price, Quantity, Side};

/// All orders resting at one price, in arrival order. The queue is
/// sequential: FIFO at a level is cheap and per-level depth is small.
///
/// `total_quantity` caches the sum of the queued orders' remaining
/// quantities; every mutation that changes a remaining quantity at this
/// level must go through `add`/`remove`/`adjust` to keep it in sync.
#[derive(Debug)]
struct PriceLevel {
    price: Price,
    total_quantity: Quantity,
    orders: VecDeque<Arc<Order>>,
}

impl PriceLevel {
    fn new(price: Price) -> Self {
        Self {
            price,
            total_quantity: 0,
            orders: VecDeque::new(),
        }
    }

    fn add(&mut self, order: Arc<Order>) {
        self.total_quantity += order.remaining_quantity();
        self.orders.push_back(order);
    }

    fn remove(&mut self, order_id: OrderId) -> bool {
        match self.orders.iter().position(|o| o.id() == order_id) {
            Some(index) => {
                let removed = self.orders.remove(index).unwrap();
                self.total_quantity -= removed.remaining_quantity();
                true
            }
            None => false,
        }
    }

    /// Re-sync the cached total after one order went from `old_remaining`
    /// to `new_remaining`. No search; the delta is all that matters.
    fn adjust(&mut self, old_remaining: Quantity, new_remaining: Quantity) {
        self.total_quantity = self.total_quantity - old_remaining + new_remaining;
    }

    fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

#[derive(Debug, Default)]
struct BookInner {
    bids: BTreeMap<Price, PriceLevel>,
    asks: BTreeMap<Price, PriceLevel>,
    orders: HashMap<OrderId, Arc<Order>>,
}

impl BookInner {
    fn side_map(&mut self, side: Side) -> &mut BTreeMap<Price, PriceLevel> {
        match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        }
    }

    fn best_bid(&self) -> Option<Price> {
        self.bids.keys().next_back().copied()
    }

    fn best_ask(&self) -> Option<Price> {
        self.asks.keys().next().copied()
    }

    fn spread(&self) -> Option<Price> {
        match (self.best_ask(), self.best_bid()) {
            (Some(ask), Some(bid)) if ask > bid => Some(ask - bid),
            _ => None,
        }
    }

    fn depth(&self, levels: usize) -> (Vec<(Price, Quantity)>, Vec<(Price, Quantity)>) {
        let bid_levels = self
            .bids
            .values()
            .rev()
            .take(levels)
            .map(|level| (level.price, level.total_quantity))
            .collect();
        let ask_levels = self
            .asks
            .values()
            .take(levels)
            .map(|level| (level.price, level.total_quantity))
            .collect();
        (bid_levels, ask_levels)
    }
}

/// Per-symbol book state: bid and ask price levels plus an id index for
/// O(1) cancel and lookup.
///
/// A single mutex guards the whole book; every public operation acquires
/// it, and none of them call back out while holding it. Individual
/// operations are atomic; a multi-operation submission is not (the engine
/// re-reads the top of book on every match iteration).
#[derive(Debug)]
pub struct OrderBook {
    symbol: String,
    inner: Mutex<BookInner>,
}

impl OrderBook {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            inner: Mutex::new(BookInner::default()),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Place a resting order. Rejects orders with nothing left to fill;
    /// otherwise the order lands in the id index and at the back of its
    /// price level's queue.
    pub fn add_order(&self, order: Arc<Order>) -> bool {
        if order.remaining_quantity() == 0 {
            return false;
        }

        let mut inner = lock(&self.inner);
        inner.orders.insert(order.id(), Arc::clone(&order));
        let price = order.price();
        inner
            .side_map(order.side())
            .entry(price)
            .or_insert_with(|| PriceLevel::new(price))
            .add(order);
        true
    }

    /// Remove an order from both the level queue and the id index,
    /// collapsing the level if it empties. Unknown ids return false and
    /// change nothing.
    pub fn cancel_order(&self, order_id: OrderId) -> bool {
        let mut inner = lock(&self.inner);
        let Some(order) = inner.orders.remove(&order_id) else {
            return false;
        };

        let side_map = inner.side_map(order.side());
        if let Some(level) = side_map.get_mut(&order.price()) {
            if level.remove(order_id) && level.is_empty() {
                side_map.remove(&order.price());
            }
        }
        true
    }

    pub fn best_bid(&self) -> Option<Price> {
        lock(&self.inner).best_bid()
    }

    pub fn best_ask(&self) -> Option<Price> {
        lock(&self.inner).best_ask()
    }

    pub fn spread(&self) -> Option<Price> {
        lock(&self.inner).spread()
    }

    pub fn best_bid_quantity(&self) -> Quantity {
        let inner = lock(&self.inner);
        inner
            .bids
            .values()
            .next_back()
            .map_or(0, |level| level.total_quantity)
    }

    pub fn best_ask_quantity(&self) -> Quantity {
        let inner = lock(&self.inner);
        inner
            .asks
            .values()
            .next()
            .map_or(0, |level| level.total_quantity)
    }

    pub fn order(&self, order_id: OrderId) -> Option<Arc<Order>> {
        lock(&self.inner).orders.get(&order_id).cloned()
    }

    pub fn orders_at(&self, price: Price, side: Side) -> Vec<Arc<Order>> {
        let mut inner = lock(&self.inner);
        inner
            .side_map(side)
            .get(&price)
            .map(|level| level.orders.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Orders at the most competitive price on `side`, in queue order.
    /// Empty if the side is empty. The matcher works from this snapshot;
    /// the lock is released before it picks a counterparty.
    pub fn best_level_orders(&self, side: Side) -> Vec<Arc<Order>> {
        let inner = lock(&self.inner);
        let level = match side {
            Side::Buy => inner.bids.values().next_back(),
            Side::Sell => inner.asks.values().next(),
        };
        level
            .map(|level| level.orders.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Top-of-book snapshot: up to `levels` (price, total quantity) pairs
    /// per side, bids high to low, asks low to high.
    pub fn depth(&self, levels: usize) -> (Vec<(Price, Quantity)>, Vec<(Price, Quantity)>) {
        lock(&self.inner).depth(levels)
    }

    /// Re-sync a level's cached total after an order's remaining quantity
    /// moved from `old_remaining` to `new_remaining`. Ids not resting in
    /// the book are ignored: an aggressor being matched during its own
    /// submission is not in the book yet, and callers written for a model
    /// where it is can still call this unconditionally.
    pub fn update_quantity(
        &self,
        order_id: OrderId,
        old_remaining: Quantity,
        new_remaining: Quantity,
    ) {
        let mut inner = lock(&self.inner);
        let Some(order) = inner.orders.get(&order_id).cloned() else {
            return;
        };
        if let Some(level) = inner.side_map(order.side()).get_mut(&order.price()) {
            level.adjust(old_remaining, new_remaining);
        }
    }

    pub fn order_count(&self) -> usize {
        lock(&self.inner).orders.len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.inner).orders.is_empty()
    }

    pub fn clear(&self) {
        let mut inner = lock(&self.inner);
        inner.bids.clear();
        inner.asks.clear();
        inner.orders.clear();
    }

    /// Text rendering of the top of the book, asks on top, bids below.
    pub fn render(&self, levels: usize) -> String {
        let inner = lock(&self.inner);
        let (bid_levels, ask_levels) = inner.depth(levels);
        let spread = inner.spread().unwrap_or(0);
        let order_count = inner.orders.len();
        drop(inner);

        let mut out = String::new();
        let _ = writeln!(out, "\n=== Order Book: {} ===", self.symbol);
        let _ = writeln!(out, "ASKS:");
        for (price, quantity) in ask_levels.iter().rev() {
            let _ = writeln!(out, "{:>8} | {:>10}", price, quantity);
        }
        let _ = writeln!(out, "--------|------------");
        let _ = writeln!(out, "SPREAD: {}", spread);
        let _ = writeln!(out, "--------|------------");
        let _ = writeln!(out, "BIDS:");
        for (price, quantity) in &bid_levels {
            let _ = writeln!(out, "{:>8} | {:>10}", price, quantity);
        }
        let _ = writeln!(out, "\nTotal Orders: {}", order_count);
        let _ = writeln!(out, "==================");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::Order;

    fn resting(id: OrderId, side: Side, price: Price, qty: Quantity) -> Arc<Order> {
        Arc::new(Order::new(id, side, price, qty))
    }

    #[test]
    fn test_empty_book() {
        let book = OrderBook::new("AAPL");
        assert_eq!(book.best_bid(), None);
        assert_eq!(book.best_ask(), None);
        assert_eq!(book.spread(), None);
        assert_eq!(book.best_bid_quantity(), 0);
        assert_eq!(book.best_ask_quantity(), 0);
        assert!(book.is_empty());
    }

    #[test]
    fn test_add_order_rejects_drained_order() {
        let book = OrderBook::new("AAPL");
        let order = resting(1, Side::Buy, 100, 10);
        order.reduce_quantity(10);

        assert!(!book.add_order(order));
        assert!(book.is_empty());
    }

    #[test]
    fn test_best_prices_and_spread() {
        let book = OrderBook::new("AAPL");
        book.add_order(resting(1, Side::Buy, 99, 10));
        book.add_order(resting(2, Side::Buy, 98, 10));
        book.add_order(resting(3, Side::Sell, 101, 5));
        book.add_order(resting(4, Side::Sell, 103, 5));

        assert_eq!(book.best_bid(), Some(99));
        assert_eq!(book.best_ask(), Some(101));
        assert_eq!(book.spread(), Some(2));
        assert_eq!(book.best_bid_quantity(), 10);
        assert_eq!(book.best_ask_quantity(), 5);
    }

    #[test]
    fn test_cancel_collapses_empty_level() {
        let book = OrderBook::new("AAPL");
        book.add_order(resting(1, Side::Buy, 100, 10));

        assert!(book.cancel_order(1));
        assert!(book.is_empty());
        assert_eq!(book.best_bid(), None);

        // Idempotent on unknown ids
        assert!(!book.cancel_order(1));
        assert!(!book.cancel_order(999));
    }

    #[test]
    fn test_cancel_leaves_rest_of_level_intact() {
        let book = OrderBook::new("AAPL");
        book.add_order(resting(1, Side::Sell, 100, 4));
        book.add_order(resting(2, Side::Sell, 100, 6));

        assert!(book.cancel_order(1));
        assert_eq!(book.best_ask(), Some(100));
        assert_eq!(book.best_ask_quantity(), 6);
        assert_eq!(book.order_count(), 1);
    }

    #[test]
    fn test_orders_at_preserves_queue_order() {
        let book = OrderBook::new("AAPL");
        book.add_order(resting(1, Side::Sell, 100, 4));
        book.add_order(resting(2, Side::Sell, 100, 6));

        let at_level = book.orders_at(100, Side::Sell);
        assert_eq!(at_level.len(), 2);
        assert_eq!(at_level[0].id(), 1);
        assert_eq!(at_level[1].id(), 2);

        assert!(book.orders_at(101, Side::Sell).is_empty());
    }

    #[test]
    fn test_best_level_orders() {
        let book = OrderBook::new("AAPL");
        book.add_order(resting(1, Side::Sell, 101, 5));
        book.add_order(resting(2, Side::Sell, 100, 5));
        book.add_order(resting(3, Side::Buy, 99, 5));

        let best_asks = book.best_level_orders(Side::Sell);
        assert_eq!(best_asks.len(), 1);
        assert_eq!(best_asks[0].id(), 2);

        let best_bids = book.best_level_orders(Side::Buy);
        assert_eq!(best_bids[0].id(), 3);

        let empty_book = OrderBook::new("AAPL");
        assert!(empty_book.best_level_orders(Side::Buy).is_empty());
    }

    #[test]
    fn test_depth_ordering_and_bounds() {
        let book = OrderBook::new("AAPL");
        for (id, price) in [(1, 97), (2, 98), (3, 99)] {
            book.add_order(resting(id, Side::Buy, price, 10));
        }
        for (id, price) in [(4, 101), (5, 102), (6, 103)] {
            book.add_order(resting(id, Side::Sell, price, 20));
        }

        let (bids, asks) = book.depth(2);
        assert_eq!(bids, vec![(99, 10), (98, 10)]);
        assert_eq!(asks, vec![(101, 20), (102, 20)]);

        let (bids, asks) = book.depth(10);
        assert_eq!(bids.len(), 3);
        assert_eq!(asks.len(), 3);
    }

    #[test]
    fn test_update_quantity_adjusts_cached_total() {
        let book = OrderBook::new("AAPL");
        let order = resting(1, Side::Sell, 100, 10);
        book.add_order(Arc::clone(&order));
        book.add_order(resting(2, Side::Sell, 100, 5));

        assert_eq!(book.best_ask_quantity(), 15);

        order.reduce_quantity(4);
        book.update_quantity(1, 10, 6);

        assert_eq!(book.best_ask_quantity(), 11);
    }

    #[test]
    fn test_update_quantity_unknown_id_is_noop() {
        let book = OrderBook::new("AAPL");
        book.add_order(resting(1, Side::Buy, 100, 10));

        book.update_quantity(42, 10, 5);
        assert_eq!(book.best_bid_quantity(), 10);
    }

    #[test]
    fn test_level_total_matches_order_sum() {
        let book = OrderBook::new("AAPL");
        book.add_order(resting(1, Side::Buy, 100, 3));
        book.add_order(resting(2, Side::Buy, 100, 4));
        book.add_order(resting(3, Side::Buy, 100, 5));

        let sum: Quantity = book
            .orders_at(100, Side::Buy)
            .iter()
            .map(|o| o.remaining_quantity())
            .sum();
        assert_eq!(book.best_bid_quantity(), sum);

        book.cancel_order(2);
        let sum: Quantity = book
            .orders_at(100, Side::Buy)
            .iter()
            .map(|o| o.remaining_quantity())
            .sum();
        assert_eq!(book.best_bid_quantity(), sum);
    }

    #[test]
    fn test_clear() {
        let book = OrderBook::new("AAPL");
        book.add_order(resting(1, Side::Buy, 100, 10));
        book.add_order(resting(2, Side::Sell, 101, 10));

        book.clear();
        assert!(book.is_empty());
        assert_eq!(book.order_count(), 0);
        assert_eq!(book.best_bid(), None);
        assert_eq!(book.best_ask(), None);
    }

    #[test]
    fn test_render_mentions_symbol_and_spread() {
        let book = OrderBook::new("MSFT");
        book.add_order(resting(1, Side::Buy, 99, 10));
        book.add_order(resting(2, Side::Sell, 101, 10));

        let rendered = book.render(5);
        assert!(rendered.contains("Order Book: MSFT"));
        assert!(rendered.contains("SPREAD: 2"));
        assert!(rendered.contains("Total Orders: 2"));
    }
}
