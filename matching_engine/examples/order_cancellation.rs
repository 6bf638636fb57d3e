use std::sync::Arc;

use matching_engine::{MatchingEngine, Order, Side};

fn main() {
    let engine = MatchingEngine::new("AAPL");

    engine.submit_order(Arc::new(Order::new(1, Side::Buy, 100, 50)));
    engine.submit_order(Arc::new(Order::new(2, Side::Buy, 99, 75)));
    engine.submit_order(Arc::new(Order::new(3, Side::Sell, 101, 60)));

    println!("Best bid: {:?}", engine.book().best_bid());
    println!("Best ask: {:?}", engine.book().best_ask());
    println!("Spread: {:?}", engine.book().spread());

    let cancelled = engine.cancel_order(1);
    println!("Cancelled order 1: {}", cancelled);
    println!("Best bid after cancellation: {:?}", engine.book().best_bid());

    assert!(cancelled);
    assert_eq!(engine.book().best_bid(), Some(99));

    let failed = engine.cancel_order(999);
    println!("Cancelled non-existent order 999: {}", failed);
    assert!(!failed);
}
