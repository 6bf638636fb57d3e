use std::fmt::Write as _;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, error};

use crate::book::OrderBook;
use crate::lock;
use crate::order::{Order, OrderId, Price, Side};
use crate::trade::Trade;
use crate::trade_log::TradeLog;

pub type TradeCallback = Box<dyn Fn(&Trade) + Send + Sync>;
pub type OrderCallback = Box<dyn Fn(&Order) + Send + Sync>;

/// Continuous double-auction matcher for one symbol.
///
/// Incoming orders are matched against the opposite side of the book under
/// price-time priority; whatever cannot be filled rests in the book. Every
/// fill is appended to the trade history, counted in the statistics, and
/// fanned out to the registered sinks.
///
/// The engine is shared across submitting threads (`Arc<MatchingEngine>`,
/// all methods take `&self`). Submissions serialize on a dedicated lock
/// spanning the whole match loop, so a submission never observes another
/// one mid-flight and the book can never be left crossed. Queries and
/// cancels take only the book's own lock and run concurrently with a
/// submission. The book lock is never held while a callback runs, so
/// callbacks may query the book or cancel; submitting from a callback
/// would deadlock on the submission lock.
pub struct MatchingEngine {
    symbol: String,
    book: OrderBook,
    // Serializes match loop + residual insertion; see submit_order
    submit_lock: Mutex<()>,
    trades: Mutex<Vec<Trade>>,
    trade_count: AtomicU64,
    total_volume: AtomicU64,
    total_value: AtomicU64,
    trade_callback: Mutex<Option<TradeCallback>>,
    order_callback: Mutex<Option<OrderCallback>>,
    trade_log: Mutex<Option<TradeLog>>,
}

impl MatchingEngine {
    pub fn new(symbol: impl Into<String>) -> Self {
        let symbol = symbol.into();
        Self {
            book: OrderBook::new(symbol.clone()),
            symbol,
            submit_lock: Mutex::new(()),
            trades: Mutex::new(Vec::new()),
            trade_count: AtomicU64::new(0),
            total_volume: AtomicU64::new(0),
            total_value: AtomicU64::new(0),
            trade_callback: Mutex::new(None),
            order_callback: Mutex::new(None),
            trade_log: Mutex::new(None),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn book(&self) -> &OrderBook {
        &self.book
    }

    /// Match the order against the book, then rest any unfilled remainder
    /// on its own side at its own price. Returns false only for invalid
    /// input (nothing left to fill), with no state change.
    ///
    /// Two racing submissions that each saw no counterparty could
    /// otherwise both rest and leave the book crossed; holding the
    /// submission lock across the loop and the residual insertion rules
    /// that out.
    pub fn submit_order(&self, order: Arc<Order>) -> bool {
        if order.remaining_quantity() == 0 {
            return false;
        }

        let _submitting = lock(&self.submit_lock);

        self.match_order(&order);

        if !order.is_filled() {
            self.book.add_order(Arc::clone(&order));
            self.notify_order(&order);
        }
        true
    }

    /// Cancel a resting order. Unknown ids return false and change
    /// nothing; on success the order event sink sees the cancelled order.
    pub fn cancel_order(&self, order_id: OrderId) -> bool {
        let order = self.book.order(order_id);
        if self.book.cancel_order(order_id) {
            if let Some(order) = order {
                self.notify_order(&order);
            }
            true
        } else {
            false
        }
    }

    /// Submit each order in turn; returns how many were accepted.
    pub fn submit_batch(&self, orders: &[Arc<Order>]) -> usize {
        orders
            .iter()
            .filter(|order| self.submit_order(Arc::clone(order)))
            .count()
    }

    /// Drop all book state, trade history and statistics counters.
    pub fn clear(&self) {
        self.book.clear();
        lock(&self.trades).clear();
        self.trade_count.store(0, Ordering::Relaxed);
        self.total_volume.store(0, Ordering::Relaxed);
        self.total_value.store(0, Ordering::Relaxed);
    }

    pub fn trade_count(&self) -> u64 {
        self.trade_count.load(Ordering::Relaxed)
    }

    /// Sum of executed trade quantities.
    pub fn total_volume(&self) -> u64 {
        self.total_volume.load(Ordering::Relaxed)
    }

    /// Sum of price * quantity over executed trades.
    pub fn total_value(&self) -> u64 {
        self.total_value.load(Ordering::Relaxed)
    }

    /// Volume-weighted average trade price; None before the first fill.
    pub fn average_trade_price(&self) -> Option<Price> {
        let volume = self.total_volume();
        if volume == 0 {
            None
        } else {
            Some(self.total_value() / volume)
        }
    }

    /// All executed trades, in execution order.
    pub fn trades(&self) -> Vec<Trade> {
        lock(&self.trades).clone()
    }

    pub fn book_snapshot(&self, levels: usize) -> String {
        self.book.render(levels)
    }

    pub fn market_stats(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "\n=== Market Statistics ===");
        let _ = writeln!(out, "Symbol: {}", self.symbol);
        let _ = writeln!(out, "Total Trades: {}", self.trade_count());
        let _ = writeln!(out, "Total Volume: {}", self.total_volume());
        let _ = writeln!(out, "Total Value: {}", self.total_value());
        let _ = writeln!(out, "Active Orders: {}", self.book.order_count());
        let _ = writeln!(
            out,
            "Best Bid: {} (Qty: {})",
            self.book.best_bid().unwrap_or(0),
            self.book.best_bid_quantity()
        );
        let _ = writeln!(
            out,
            "Best Ask: {} (Qty: {})",
            self.book.best_ask().unwrap_or(0),
            self.book.best_ask_quantity()
        );
        let _ = writeln!(out, "Spread: {}", self.book.spread().unwrap_or(0));
        if let Some(average) = self.average_trade_price() {
            let _ = writeln!(out, "Average Trade Price: {}", average);
        }
        let _ = writeln!(out, "========================");
        out
    }

    /// Replace the trade sink; fires synchronously once per trade, after
    /// the trade is recorded and counted.
    pub fn set_trade_callback(&self, callback: impl Fn(&Trade) + Send + Sync + 'static) {
        *lock(&self.trade_callback) = Some(Box::new(callback));
    }

    /// Replace the order event sink; fires when a residual rests in the
    /// book and when a resting order leaves it (full fill or cancel).
    pub fn set_order_callback(&self, callback: impl Fn(&Order) + Send + Sync + 'static) {
        *lock(&self.order_callback) = Some(Box::new(callback));
    }

    /// Open (or re-open) the CSV trade log. A failed row write later on is
    /// logged and dropped; it never rolls back the trade.
    pub fn enable_csv_logging(&self, path: impl AsRef<Path>) -> io::Result<()> {
        *lock(&self.trade_log) = Some(TradeLog::open(path)?);
        Ok(())
    }

    /// Close the CSV trade log, if open.
    pub fn disable_csv_logging(&self) {
        *lock(&self.trade_log) = None;
    }

    fn crosses(incoming: &Order, resting: &Order) -> bool {
        match incoming.side() {
            Side::Buy => incoming.price() >= resting.price(),
            Side::Sell => incoming.price() <= resting.price(),
        }
    }

    /// The match loop. One counterparty per iteration: the time-earliest
    /// crossing order at the opposing best level. Consuming the last order
    /// at a level exposes the next level on the following iteration, so
    /// multi-level sweeps happen across iterations, never within one.
    fn match_order(&self, incoming: &Arc<Order>) {
        while !incoming.is_filled() {
            let resting = self.book.best_level_orders(incoming.side().opposite());
            if resting.is_empty() {
                break;
            }

            // Select by timestamp, not queue position: insertion order is
            // FIFO under a single clock, but the priority rule is defined
            // by the timestamp even if arrivals are reordered.
            let mut best: Option<&Arc<Order>> = None;
            for candidate in &resting {
                if candidate.is_filled() || !Self::crosses(incoming, candidate) {
                    continue;
                }
                match best {
                    Some(current) if candidate.timestamp() >= current.timestamp() => {}
                    _ => best = Some(candidate),
                }
            }
            let Some(best) = best else {
                break;
            };

            // The passive side sets the price; the aggressor's price is
            // only the crossing threshold.
            let trade_price = best.price();
            let quantity = incoming
                .remaining_quantity()
                .min(best.remaining_quantity());

            let old_remaining = best.remaining_quantity();
            best.reduce_quantity(quantity);
            incoming.reduce_quantity(quantity);

            // Only the passive level's cached total needs refreshing; the
            // incoming order is not resting during its own submission.
            self.book
                .update_quantity(best.id(), old_remaining, old_remaining - quantity);

            let (buy_id, sell_id) = match incoming.side() {
                Side::Buy => (incoming.id(), best.id()),
                Side::Sell => (best.id(), incoming.id()),
            };
            self.record_trade(Trade::new(buy_id, sell_id, trade_price, quantity));

            if best.is_filled() && self.book.cancel_order(best.id()) {
                self.notify_order(best);
            }
        }
    }

    fn record_trade(&self, trade: Trade) {
        lock(&self.trades).push(trade.clone());
        self.trade_count.fetch_add(1, Ordering::Relaxed);
        self.total_volume.fetch_add(trade.quantity, Ordering::Relaxed);
        self.total_value
            .fetch_add(trade.price * trade.quantity, Ordering::Relaxed);
        debug!("executed {}", trade);

        if let Some(log) = lock(&self.trade_log).as_mut() {
            if let Err(e) = log.append(&trade) {
                error!("trade log write failed: {}", e);
            }
        }
        if let Some(callback) = lock(&self.trade_callback).as_ref() {
            callback(&trade);
        }
    }

    fn notify_order(&self, order: &Order) {
        if let Some(callback) = lock(&self.order_callback).as_ref() {
            callback(order);
        }
    }
}
