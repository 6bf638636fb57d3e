use std::sync::Arc;

use matching_engine::{MatchingEngine, Order, Side};

fn main() {
    let engine = MatchingEngine::new("AAPL");

    engine.submit_order(Arc::new(Order::new(1, Side::Buy, 99, 100)));
    engine.submit_order(Arc::new(Order::new(2, Side::Buy, 98, 150)));
    engine.submit_order(Arc::new(Order::new(3, Side::Buy, 97, 200)));

    // A sell below the best bid sweeps levels until its own price
    engine.submit_order(Arc::new(Order::new(4, Side::Sell, 98, 250)));

    let trades = engine.trades();
    let total_filled: u64 = trades.iter().map(|t| t.quantity).sum();
    println!("Filled {} units across {} trades", total_filled, trades.len());

    for trade in &trades {
        println!("{} units @ {}", trade.quantity, trade.price);
    }

    println!("Best bid: {:?}", engine.book().best_bid());
    println!("Best ask: {:?}", engine.book().best_ask());

    assert_eq!(trades.len(), 2);
    assert_eq!(total_filled, 250);
    // Best-priced bid swept first, each trade at the resting order's price
    assert_eq!(trades[0].price, 99);
    assert_eq!(trades[1].price, 98);
    assert_eq!(engine.book().best_bid(), Some(97));
}
