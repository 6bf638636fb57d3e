use std::fmt::Write as _;
use std::io;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use thiserror::Error;
use tracing::error;

type Task = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("worker pool is stopped")]
    Stopped,
}

#[derive(Debug, Default)]
struct PoolCounters {
    submitted: AtomicU64,
    completed: AtomicU64,
    panicked: AtomicU64,
}

#[derive(Debug, Clone)]
pub struct PoolStatsSnapshot {
    pub submitted: u64,
    pub completed: u64,
    pub panicked: u64,
    pub pending: u64,
}

/// Handle for a task submitted with [`WorkerPool::submit`]. `wait` blocks
/// until the task ran; `None` means it panicked.
pub struct TaskHandle<R> {
    rx: Receiver<R>,
}

impl<R> TaskHandle<R> {
    pub fn wait(self) -> Option<R> {
        self.rx.recv().ok()
    }
}

/// Fixed pool of worker threads draining a shared task queue.
///
/// Tasks run in submission order per the queue; a panicking task is caught,
/// counted and logged, and the worker keeps going. Submissions after
/// `stop()` are rejected at the boundary. Stopping drains the queue and
/// joins every worker; dropping the pool stops it.
pub struct WorkerPool {
    tx: Option<Sender<Task>>,
    workers: Vec<JoinHandle<()>>,
    counters: Arc<PoolCounters>,
    stopped: AtomicBool,
}

impl WorkerPool {
    /// Spawn `num_threads` workers; 0 means one per available core
    /// (fallback 4 when parallelism cannot be queried).
    pub fn new(num_threads: usize) -> io::Result<Self> {
        let num_threads = if num_threads == 0 {
            thread::available_parallelism().map(usize::from).unwrap_or(4)
        } else {
            num_threads
        };

        let (tx, rx) = unbounded::<Task>();
        let counters = Arc::new(PoolCounters::default());

        let mut workers = Vec::with_capacity(num_threads);
        for i in 0..num_threads {
            let rx = rx.clone();
            let counters = Arc::clone(&counters);
            let handle = thread::Builder::new()
                .name(format!("worker-{}", i))
                .spawn(move || worker_loop(rx, counters))?;
            workers.push(handle);
        }

        Ok(Self {
            tx: Some(tx),
            workers,
            counters,
            stopped: AtomicBool::new(false),
        })
    }

    /// Queue a task, fire and forget.
    pub fn execute<F>(&self, task: F) -> Result<(), PoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.stopped.load(Ordering::Acquire) {
            return Err(PoolError::Stopped);
        }
        let tx = self.tx.as_ref().ok_or(PoolError::Stopped)?;
        tx.send(Box::new(task)).map_err(|_| PoolError::Stopped)?;
        self.counters.submitted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Queue a task and get a handle to its result.
    pub fn submit<F, R>(&self, task: F) -> Result<TaskHandle<R>, PoolError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (result_tx, result_rx) = crossbeam_channel::bounded(1);
        self.execute(move || {
            let _ = result_tx.send(task());
        })?;
        Ok(TaskHandle { rx: result_rx })
    }

    pub fn thread_count(&self) -> usize {
        self.workers.len()
    }

    pub fn pending_count(&self) -> usize {
        self.tx.as_ref().map_or(0, |tx| tx.len())
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Block until every submitted task has run (completed or panicked).
    pub fn wait_idle(&self) {
        loop {
            let submitted = self.counters.submitted.load(Ordering::Acquire);
            let done = self.counters.completed.load(Ordering::Acquire)
                + self.counters.panicked.load(Ordering::Acquire);
            if done >= submitted {
                return;
            }
            thread::sleep(Duration::from_millis(1));
        }
    }

    /// Reject further submissions, drain the queue, and join the workers.
    pub fn stop(&mut self) {
        self.stopped.store(true, Ordering::Release);
        // Workers exit once the queue is empty and the sender is gone
        self.tx.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }

    pub fn stats(&self) -> PoolStatsSnapshot {
        PoolStatsSnapshot {
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            panicked: self.counters.panicked.load(Ordering::Relaxed),
            pending: self.pending_count() as u64,
        }
    }

    pub fn render_stats(&self) -> String {
        let stats = self.stats();
        let mut out = String::new();
        let _ = writeln!(out, "WorkerPool Statistics:");
        let _ = writeln!(out, "  Worker Threads: {}", self.thread_count());
        let _ = writeln!(out, "  Tasks Submitted: {}", stats.submitted);
        let _ = writeln!(out, "  Tasks Completed: {}", stats.completed);
        let _ = writeln!(out, "  Tasks Panicked: {}", stats.panicked);
        let _ = writeln!(out, "  Pending Tasks: {}", stats.pending);
        let _ = writeln!(
            out,
            "  Stopped: {}",
            if self.is_stopped() { "Yes" } else { "No" }
        );
        out
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_loop(rx: Receiver<Task>, counters: Arc<PoolCounters>) {
    while let Ok(task) = rx.recv() {
        match catch_unwind(AssertUnwindSafe(task)) {
            Ok(()) => {
                counters.completed.fetch_add(1, Ordering::Release);
            }
            Err(_) => {
                counters.panicked.fetch_add(1, Ordering::Release);
                error!("worker task panicked; worker continues");
            }
        }
    }
}
