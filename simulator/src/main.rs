use std::sync::Arc;
use std::time::Instant;

use clap::error::ErrorKind;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use matching_engine::MatchingEngine;
use perf_monitor::PerformanceMonitor;
use worker_pool::WorkerPool;

mod generator;
use generator::{OrderGenerator, SimConfig};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Parser, Debug)]
#[command(name = "simulator")]
#[command(about = "Low-latency order book simulator")]
struct Args {
    /// Run the single-threaded benchmark and exit
    #[arg(long)]
    benchmark: bool,

    /// Run the aggressive order simulation and exit
    #[arg(long)]
    aggressive: bool,

    /// Number of orders to generate
    #[arg(long, default_value_t = 100_000)]
    orders: usize,

    /// Number of worker threads
    #[arg(long, default_value_t = 4)]
    threads: usize,

    /// Trading symbol
    #[arg(long, default_value = "AAPL")]
    symbol: String,

    /// Disable CSV trade logging
    #[arg(long)]
    no_csv: bool,

    /// Disable latency monitoring
    #[arg(long)]
    no_perf: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Unknown options exit 1; --help is a successful run
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if e.kind() == ErrorKind::DisplayHelp => {
            let _ = e.print();
            return;
        }
        Err(e) => {
            let _ = e.print();
            std::process::exit(1);
        }
    };

    println!("==========================================");
    println!("  Low-Latency Order Book Simulator");
    println!("  High-Frequency Trading Infrastructure");
    println!("==========================================");

    let config = SimConfig {
        orders: args.orders,
        threads: args.threads,
        symbol: args.symbol.clone(),
        csv_logging: !args.no_csv,
        perf_monitoring: !args.no_perf,
        ..SimConfig::default()
    };

    let result = if args.benchmark {
        run_benchmark(&config)
    } else if args.aggressive {
        run_aggressive(&config)
    } else {
        run_simulation(&config)
    };

    match result {
        Ok(()) => info!("Simulation completed successfully"),
        Err(e) => {
            error!("Simulation failed: {}", e);
            std::process::exit(1);
        }
    }
}

/// Single-threaded throughput benchmark over a fixed 50k-order flow.
fn run_benchmark(config: &SimConfig) -> Result<(), BoxError> {
    println!("\n=== Running Benchmark Tests ===");

    let config = SimConfig {
        orders: 50_000,
        ..config.clone()
    };

    let monitor = PerformanceMonitor::new(true);
    let engine = MatchingEngine::new(config.symbol.as_str());
    if config.csv_logging {
        engine.enable_csv_logging("benchmark_trades.csv")?;
    }

    let generator = OrderGenerator::new(config.clone());
    info!("Generating {} orders...", config.orders);
    let orders = generator.generate_batch(config.orders);

    info!("Processing orders...");
    let start = Instant::now();
    let mut processed = 0usize;
    for order in &orders {
        let _timer = monitor.time("order_submission", order.id());
        if engine.submit_order(Arc::clone(order)) {
            processed += 1;
        }
    }
    let elapsed = start.elapsed();

    println!("\nBenchmark Results:");
    println!("Orders Processed: {}", processed);
    println!("Total Time: {} microseconds", elapsed.as_micros());
    println!(
        "Throughput: {:.2} orders/second",
        processed as f64 / elapsed.as_secs_f64()
    );

    print_latency_report(&monitor)?;
    println!("{}", engine.market_stats());
    Ok(())
}

/// Fan orders out over the worker pool in fixed-size batches.
fn run_simulation(config: &SimConfig) -> Result<(), BoxError> {
    println!("\n=== Multi-Threaded Simulation ===");
    info!("Orders: {}", config.orders);
    info!("Threads: {}", config.threads);
    info!("Symbol: {}", config.symbol);

    let monitor = Arc::new(PerformanceMonitor::new(config.perf_monitoring));
    let engine = Arc::new(MatchingEngine::new(config.symbol.as_str()));
    let pool = WorkerPool::new(config.threads)?;
    if config.csv_logging {
        engine.enable_csv_logging("simulation_trades.csv")?;
    }

    let generator = OrderGenerator::new(config.clone());
    info!("Generating orders...");
    let orders = generator.generate_batch(config.orders);

    info!("Processing orders with worker pool...");
    let start = Instant::now();

    let mut handles = Vec::new();
    for batch in orders.chunks(config.batch_size) {
        let engine = Arc::clone(&engine);
        let monitor = Arc::clone(&monitor);
        let timing = config.perf_monitoring;
        let batch = batch.to_vec();

        handles.push(pool.submit(move || {
            let mut accepted = 0usize;
            for order in batch {
                let timer = timing.then(|| monitor.time("order_submission", order.id()));
                if engine.submit_order(order) {
                    accepted += 1;
                }
                drop(timer);
            }
            accepted
        })?);
    }

    let processed: usize = handles.into_iter().filter_map(|h| h.wait()).sum();
    let elapsed = start.elapsed();
    pool.wait_idle();

    println!("\nSimulation Results:");
    println!("Orders Processed: {}", processed);
    println!("Total Time: {} microseconds", elapsed.as_micros());
    println!(
        "Throughput: {:.2} orders/second",
        processed as f64 / elapsed.as_secs_f64()
    );

    if config.perf_monitoring {
        print_latency_report(&monitor)?;
    }
    println!("{}", engine.market_stats());
    println!("{}", pool.render_stats());
    Ok(())
}

/// Single-threaded run over flow engineered to cross; reports fill rate
/// and the final state of the book.
fn run_aggressive(config: &SimConfig) -> Result<(), BoxError> {
    println!("\n=== Aggressive Order Simulation ===");

    let monitor = PerformanceMonitor::new(true);
    let engine = MatchingEngine::new(config.symbol.as_str());
    if config.csv_logging {
        engine.enable_csv_logging("aggressive_trades.csv")?;
    }

    let generator = OrderGenerator::new(config.clone());
    info!("Generating aggressive orders for maximum matching...");
    let orders = generator.generate_aggressive(config.orders);

    info!("Processing {} orders...", orders.len());
    let start = Instant::now();
    let mut processed = 0usize;
    for order in &orders {
        let _timer = monitor.time("order_submission", order.id());
        if engine.submit_order(Arc::clone(order)) {
            processed += 1;
        }
    }
    let elapsed = start.elapsed();

    println!("\nAggressive Simulation Results:");
    println!("Orders Processed: {}", processed);
    println!("Trades Executed: {}", engine.trade_count());
    println!("Total Volume: {}", engine.total_volume());
    println!(
        "Fill Rate: {:.2}%",
        engine.trade_count() as f64 * 2.0 / processed as f64 * 100.0
    );
    println!("Total Time: {} microseconds", elapsed.as_micros());
    println!(
        "Throughput: {:.2} orders/second",
        processed as f64 / elapsed.as_secs_f64()
    );

    print_latency_report(&monitor)?;
    println!("{}", engine.market_stats());

    println!("\nFinal Order Book State:");
    println!("{}", engine.book_snapshot(10));
    Ok(())
}

fn print_latency_report(monitor: &PerformanceMonitor) -> Result<(), BoxError> {
    println!("\n=== Overall Performance Statistics ===");
    println!("{}", monitor.overall_stats());
    println!("=======================================");

    monitor.export_csv("latency_report.csv")?;
    info!("Latency measurements exported to latency_report.csv");
    Ok(())
}
