use std::sync::Arc;

use matching_engine::{Order, OrderBook, Side};

fn main() {
    let book = OrderBook::new("AAPL");

    book.add_order(Arc::new(Order::new(1, Side::Buy, 99, 100)));
    book.add_order(Arc::new(Order::new(2, Side::Buy, 98, 150)));
    book.add_order(Arc::new(Order::new(3, Side::Buy, 97, 200)));

    book.add_order(Arc::new(Order::new(4, Side::Sell, 101, 100)));
    book.add_order(Arc::new(Order::new(5, Side::Sell, 102, 150)));
    book.add_order(Arc::new(Order::new(6, Side::Sell, 103, 200)));

    println!("Best bid: {:?}", book.best_bid());
    println!("Best ask: {:?}", book.best_ask());
    println!("Spread: {:?}", book.spread());
    println!("{}", book.render(5));

    assert_eq!(book.best_bid(), Some(99));
    assert_eq!(book.best_ask(), Some(101));
    assert_eq!(book.spread(), Some(2));
}
