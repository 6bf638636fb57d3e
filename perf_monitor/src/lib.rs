use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// One recorded operation, kept only in detailed mode.
#[derive(Debug, Clone)]
pub struct LatencySample {
    pub operation: String,
    pub order_id: u64,
    pub latency_ns: u64,
}

/// Aggregated latency statistics for one operation type (or overall).
/// Throughput is derived from the mean: a single pipeline at this latency
/// sustains `1e9 / mean_ns` operations per second.
#[derive(Debug, Clone, Default)]
pub struct LatencyStats {
    pub operations: u64,
    pub min_ns: u64,
    pub max_ns: u64,
    pub mean_ns: f64,
    pub median_ns: f64,
    pub p95_ns: f64,
    pub p99_ns: f64,
    pub std_dev_ns: f64,
    pub throughput_ops_per_sec: f64,
}

impl fmt::Display for LatencyStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total Operations: {}", self.operations)?;
        writeln!(f, "Min Latency: {} ns", self.min_ns)?;
        writeln!(f, "Max Latency: {} ns", self.max_ns)?;
        writeln!(f, "Mean Latency: {:.2} ns", self.mean_ns)?;
        writeln!(f, "Median Latency: {:.2} ns", self.median_ns)?;
        writeln!(f, "95th Percentile: {:.2} ns", self.p95_ns)?;
        writeln!(f, "99th Percentile: {:.2} ns", self.p99_ns)?;
        writeln!(f, "Std Deviation: {:.2} ns", self.std_dev_ns)?;
        write!(
            f,
            "Throughput: {:.2} ops/sec",
            self.throughput_ops_per_sec
        )
    }
}

#[derive(Debug, Default)]
struct MonitorInner {
    series: HashMap<String, Vec<u64>>,
    samples: Vec<LatencySample>,
}

/// Thread-safe latency monitor keyed by operation type.
///
/// Latencies are recorded in nanoseconds; statistics (percentiles by linear
/// interpolation) are computed on demand. With detailed mode on, every
/// sample keeps its order id so the full distribution can be exported.
#[derive(Debug)]
pub struct PerformanceMonitor {
    detailed: bool,
    inner: Mutex<MonitorInner>,
}

impl PerformanceMonitor {
    pub fn new(detailed: bool) -> Self {
        Self {
            detailed,
            inner: Mutex::new(MonitorInner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MonitorInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a measurement; record it by dropping the returned guard.
    pub fn time<'a>(&'a self, operation: &'a str, order_id: u64) -> OpTimer<'a> {
        OpTimer {
            monitor: self,
            operation,
            order_id,
            start: Instant::now(),
        }
    }

    pub fn record_elapsed(&self, start: Instant, operation: &str, order_id: u64) {
        self.record_ns(start.elapsed().as_nanos() as u64, operation, order_id);
    }

    pub fn record_ns(&self, latency_ns: u64, operation: &str, order_id: u64) {
        let mut inner = self.lock();
        inner
            .series
            .entry(operation.to_string())
            .or_default()
            .push(latency_ns);
        if self.detailed {
            inner.samples.push(LatencySample {
                operation: operation.to_string(),
                order_id,
                latency_ns,
            });
        }
    }

    pub fn stats_for(&self, operation: &str) -> LatencyStats {
        let inner = self.lock();
        inner
            .series
            .get(operation)
            .map(|latencies| calculate_stats(latencies))
            .unwrap_or_default()
    }

    pub fn overall_stats(&self) -> LatencyStats {
        let inner = self.lock();
        let all: Vec<u64> = inner.series.values().flatten().copied().collect();
        calculate_stats(&all)
    }

    pub fn operation_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.lock().series.keys().cloned().collect();
        types.sort();
        types
    }

    pub fn sample_count(&self) -> u64 {
        self.lock().series.values().map(|v| v.len() as u64).sum()
    }

    pub fn throughput(&self, operation: Option<&str>) -> f64 {
        match operation {
            Some(op) => self.stats_for(op).throughput_ops_per_sec,
            None => self.overall_stats().throughput_ops_per_sec,
        }
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.series.clear();
        inner.samples.clear();
    }

    /// Write every measurement as `operation_type,order_id,latency_ns,
    /// latency_us`. Without detailed mode the order id column is 0.
    pub fn export_csv(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let inner = self.lock();
        let mut file = BufWriter::new(File::create(path)?);
        writeln!(file, "operation_type,order_id,latency_ns,latency_us")?;

        if self.detailed {
            for sample in &inner.samples {
                writeln!(
                    file,
                    "{},{},{},{:.3}",
                    sample.operation,
                    sample.order_id,
                    sample.latency_ns,
                    sample.latency_ns as f64 / 1000.0
                )?;
            }
        } else {
            let mut operations: Vec<&String> = inner.series.keys().collect();
            operations.sort();
            for operation in operations {
                for &latency_ns in &inner.series[operation] {
                    writeln!(
                        file,
                        "{},0,{},{:.3}",
                        operation,
                        latency_ns,
                        latency_ns as f64 / 1000.0
                    )?;
                }
            }
        }
        file.flush()
    }
}

/// Guard measuring one operation from creation to drop.
pub struct OpTimer<'a> {
    monitor: &'a PerformanceMonitor,
    operation: &'a str,
    order_id: u64,
    start: Instant,
}

impl Drop for OpTimer<'_> {
    fn drop(&mut self) {
        self.monitor
            .record_elapsed(self.start, self.operation, self.order_id);
    }
}

fn calculate_stats(latencies: &[u64]) -> LatencyStats {
    if latencies.is_empty() {
        return LatencyStats::default();
    }

    let mut sorted = latencies.to_vec();
    sorted.sort_unstable();

    let count = sorted.len();
    let sum: u64 = sorted.iter().sum();
    let mean = sum as f64 / count as f64;

    let median = if count % 2 == 0 {
        (sorted[count / 2 - 1] + sorted[count / 2]) as f64 / 2.0
    } else {
        sorted[count / 2] as f64
    };

    let variance = sorted
        .iter()
        .map(|&latency| {
            let diff = latency as f64 - mean;
            diff * diff
        })
        .sum::<f64>()
        / count as f64;

    LatencyStats {
        operations: count as u64,
        min_ns: sorted[0],
        max_ns: sorted[count - 1],
        mean_ns: mean,
        median_ns: median,
        p95_ns: percentile(&sorted, 0.95),
        p99_ns: percentile(&sorted, 0.99),
        std_dev_ns: variance.sqrt(),
        throughput_ops_per_sec: if mean > 0.0 { 1e9 / mean } else { 0.0 },
    }
}

// Linear interpolation between the two nearest ranks
fn percentile(sorted: &[u64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let index = p * (sorted.len() - 1) as f64;
    let lower = index.floor() as usize;
    let upper = index.ceil() as usize;
    if lower == upper {
        sorted[lower] as f64
    } else {
        let weight = index - lower as f64;
        sorted[lower] as f64 * (1.0 - weight) + sorted[upper] as f64 * weight
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_monitor() {
        let monitor = PerformanceMonitor::new(false);
        let stats = monitor.overall_stats();
        assert_eq!(stats.operations, 0);
        assert_eq!(monitor.sample_count(), 0);
        assert!(monitor.operation_types().is_empty());
    }

    #[test]
    fn test_stats_math() {
        let monitor = PerformanceMonitor::new(false);
        for latency in [100, 200, 300, 400] {
            monitor.record_ns(latency, "submit", 0);
        }

        let stats = monitor.stats_for("submit");
        assert_eq!(stats.operations, 4);
        assert_eq!(stats.min_ns, 100);
        assert_eq!(stats.max_ns, 400);
        assert!((stats.mean_ns - 250.0).abs() < f64::EPSILON);
        assert!((stats.median_ns - 250.0).abs() < f64::EPSILON);
        assert!((stats.throughput_ops_per_sec - 1e9 / 250.0).abs() < 1e-6);
    }

    #[test]
    fn test_percentile_interpolation() {
        let sorted: Vec<u64> = (1..=100).collect();
        assert!((percentile(&sorted, 0.95) - 95.05).abs() < 1e-9);
        assert!((percentile(&sorted, 0.99) - 99.01).abs() < 1e-9);
        assert!((percentile(&sorted, 0.0) - 1.0).abs() < f64::EPSILON);
        assert!((percentile(&sorted, 1.0) - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_series_kept_per_operation() {
        let monitor = PerformanceMonitor::new(false);
        monitor.record_ns(100, "submit", 1);
        monitor.record_ns(900, "cancel", 2);

        assert_eq!(monitor.operation_types(), vec!["cancel", "submit"]);
        assert_eq!(monitor.stats_for("submit").operations, 1);
        assert_eq!(monitor.stats_for("cancel").max_ns, 900);
        assert_eq!(monitor.overall_stats().operations, 2);
        assert_eq!(monitor.stats_for("unknown").operations, 0);
    }

    #[test]
    fn test_timer_guard_records() {
        let monitor = PerformanceMonitor::new(false);
        {
            let _timer = monitor.time("submit", 7);
        }
        assert_eq!(monitor.sample_count(), 1);
    }

    #[test]
    fn test_clear() {
        let monitor = PerformanceMonitor::new(true);
        monitor.record_ns(100, "submit", 1);
        monitor.clear();
        assert_eq!(monitor.sample_count(), 0);
    }

    #[test]
    fn test_export_csv_detailed() {
        let monitor = PerformanceMonitor::new(true);
        monitor.record_ns(1500, "submit", 42);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latency.csv");
        monitor.export_csv(&path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], "operation_type,order_id,latency_ns,latency_us");
        assert_eq!(lines[1], "submit,42,1500,1.500");
    }

    #[test]
    fn test_export_csv_aggregate_zeroes_order_id() {
        let monitor = PerformanceMonitor::new(false);
        monitor.record_ns(2000, "cancel", 42);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latency.csv");
        monitor.export_csv(&path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.lines().any(|l| l == "cancel,0,2000,2.000"));
    }
}
