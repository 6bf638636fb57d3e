use std::sync::Arc;

use matching_engine::{MatchingEngine, Order, Side};

fn main() {
    let engine = MatchingEngine::new("AAPL");

    engine.submit_order(Arc::new(Order::new(1, Side::Sell, 100, 50)));

    let buyer = Arc::new(Order::new(2, Side::Buy, 100, 100));
    engine.submit_order(Arc::clone(&buyer));

    println!("Requested: 100 units");
    println!("Filled: {} units", buyer.filled_quantity());
    println!("Resting: {} units", buyer.remaining_quantity());

    assert_eq!(buyer.filled_quantity(), 50);
    assert_eq!(buyer.remaining_quantity(), 50);
    // The residual rests on the bid side at the order's own price
    assert_eq!(engine.book().best_bid(), Some(100));
    assert_eq!(engine.book().best_bid_quantity(), 50);
    assert_eq!(engine.book().best_ask(), None);

    // The resting maker keeps its queue position after a nibble
    let engine2 = MatchingEngine::new("AAPL");
    engine2.submit_order(Arc::new(Order::new(1, Side::Sell, 100, 30)));
    engine2.submit_order(Arc::new(Order::new(2, Side::Sell, 100, 30)));
    engine2.submit_order(Arc::new(Order::new(3, Side::Buy, 100, 10)));

    println!("Multi-maker level:");
    for order in engine2.book().orders_at(100, Side::Sell) {
        println!("  {}", order);
    }
    assert_eq!(engine2.book().best_ask_quantity(), 50);
}
