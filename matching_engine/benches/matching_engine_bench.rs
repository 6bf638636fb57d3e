use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use matching_engine::{MatchingEngine, Order, Side};

// Simulates realistic exchange behavior with mixed passive/aggressive flow
fn simulate_exchange_orders(engine: &MatchingEngine, order_count: usize) {
    let base_price = 10_000u64;
    let mut order_ids = Vec::new();

    for i in 0..order_count as u64 {
        let side = if i % 2 == 0 { Side::Buy } else { Side::Sell };
        let quantity = (i % 5) + 1;

        // 70% passive orders around the midpoint, 30% aggressive crossers
        if i % 10 < 7 {
            let price = base_price + (i % 10) - 5;
            let order = Arc::new(Order::new(i + 1, side, price, quantity));
            order_ids.push(order.id());
            engine.submit_order(order);

            // Cancel 10% of resting orders to simulate real behavior
            if i % 10 == 0 && !order_ids.is_empty() {
                let cancel_idx = (i as usize) % order_ids.len();
                engine.cancel_order(order_ids[cancel_idx]);
            }
        } else {
            let price = match side {
                Side::Buy => base_price + 50,
                Side::Sell => base_price - 50,
            };
            engine.submit_order(Arc::new(Order::new(i + 1, side, price, quantity)));
        }
    }
}

fn bench_mixed_order_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("exchange_simulation");

    for order_count in [100, 1000, 10000].iter() {
        group.throughput(Throughput::Elements(*order_count as u64));

        group.bench_with_input(
            format!("{}_orders", order_count),
            order_count,
            |b, &count| {
                b.iter(|| {
                    let engine = MatchingEngine::new("BENCH");
                    simulate_exchange_orders(black_box(&engine), black_box(count));
                });
            },
        );
    }

    group.finish();
}

fn bench_limit_order_placement(c: &mut Criterion) {
    let mut group = c.benchmark_group("limit_orders");

    group.bench_function("place_resting_order", |b| {
        let engine = MatchingEngine::new("BENCH");
        let mut next_id = 0u64;

        b.iter(|| {
            next_id += 1;
            engine.submit_order(black_box(Arc::new(Order::new(
                next_id,
                Side::Buy,
                10_000,
                1,
            ))));
        });
    });

    group.finish();
}

fn bench_crossing_order_execution(c: &mut Criterion) {
    let mut group = c.benchmark_group("crossing_orders");

    group.bench_function("execute_crossing_order", |b| {
        b.iter_batched(
            || {
                let engine = MatchingEngine::new("BENCH");
                // Build book with liquidity
                for i in 0..10u64 {
                    engine.submit_order(Arc::new(Order::new(i + 1, Side::Sell, 10_000 + i, 10)));
                }
                engine
            },
            |engine| {
                engine.submit_order(black_box(Arc::new(Order::new(100, Side::Buy, 10_000, 5))));
            },
            criterion::BatchSize::SmallInput,
        );
    });

    group.finish();
}

fn bench_deep_book_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("deep_book");

    group.bench_function("sweep_across_levels", |b| {
        b.iter_batched(
            || {
                let engine = MatchingEngine::new("BENCH");
                for i in 0..100u64 {
                    engine.submit_order(Arc::new(Order::new(i + 1, Side::Sell, 10_000 + i, 100)));
                }
                engine
            },
            |engine| {
                // Large order that crosses many levels
                engine.submit_order(black_box(Arc::new(Order::new(
                    1000,
                    Side::Buy,
                    10_100,
                    5000,
                ))));
            },
            criterion::BatchSize::SmallInput,
        );
    });

    group.finish();
}

fn bench_high_frequency_trading(c: &mut Criterion) {
    let mut group = c.benchmark_group("high_frequency");
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("hft_simulation", |b| {
        b.iter(|| {
            let engine = MatchingEngine::new("BENCH");

            // Rapid placement and cancellation around the midpoint
            for i in 0..1000u64 {
                let price = 10_000 + (i % 10) / 5;
                engine.submit_order(Arc::new(Order::new(i + 1, Side::Buy, price, 1)));

                if i % 3 == 0 {
                    engine.cancel_order(i + 1);
                }
            }
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_mixed_order_throughput,
    bench_limit_order_placement,
    bench_crossing_order_execution,
    bench_deep_book_sweep,
    bench_high_frequency_trading
);

criterion_main!(benches);
