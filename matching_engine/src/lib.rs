pub mod book;
pub mod engine;
pub mod order;
pub mod trade;
pub mod trade_log;

// Re-export main types for easier use
pub use book::OrderBook;
pub use engine::{MatchingEngine, OrderCallback, TradeCallback};
pub use order::{Order, OrderId, OrderType, Price, Quantity, Side};
pub use trade::Trade;

use std::sync::{Mutex, MutexGuard, PoisonError};

// A panicked worker task must not take the book or the sinks with it; the
// guarded state is consistent after every operation, so the poison marker
// carries no information.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
