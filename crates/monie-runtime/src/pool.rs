//! Fixed-size worker pool for CPU-bound dispatches.
//!
//! Jobs run on a rayon [`ThreadPool`]; results come back to the async side
//! over a oneshot channel. Excess jobs queue inside the pool and are never
//! dropped.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::Serialize;
use tokio::sync::oneshot;
use tracing::debug;

use crate::error::{Result, RuntimeError};
use crate::router::panic_message;

/// Snapshot of pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolInfo {
    pub workers: usize,
    pub queued: usize,
    pub active: usize,
    pub completed: usize,
}

#[derive(Default)]
struct Counters {
    queued: AtomicUsize,
    active: AtomicUsize,
    completed: AtomicUsize,
}

/// A rayon thread pool with job accounting.
pub struct WorkerPool {
    pool: ThreadPool,
    workers: usize,
    counters: Arc<Counters>,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Result<Self> {
        let workers = workers.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("monie-worker-{i}"))
            .build()
            .map_err(|e| RuntimeError::Pool(e.to_string()))?;
        debug!(workers, "worker pool started");
        Ok(Self {
            pool,
            workers,
            counters: Arc::new(Counters::default()),
        })
    }

    /// Run `job` on a worker thread and wait for its result.
    ///
    /// A panicking job yields [`RuntimeError::Pool`]; the worker survives.
    pub async fn run<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let counters = Arc::clone(&self.counters);
        counters.queued.fetch_add(1, Ordering::SeqCst);

        self.pool.spawn(move || {
            counters.queued.fetch_sub(1, Ordering::SeqCst);
            counters.active.fetch_add(1, Ordering::SeqCst);
            let result = std::panic::catch_unwind(AssertUnwindSafe(job));
            counters.active.fetch_sub(1, Ordering::SeqCst);
            counters.completed.fetch_add(1, Ordering::SeqCst);
            // The receiver may be gone if the caller was dropped.
            let _ = tx.send(result);
        });

        match rx.await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(payload)) => Err(RuntimeError::Pool(format!(
                "worker panicked: {}",
                panic_message(payload)
            ))),
            Err(_) => Err(RuntimeError::Pool("worker dropped the job".into())),
        }
    }

    pub fn info(&self) -> PoolInfo {
        PoolInfo {
            workers: self.workers,
            queued: self.counters.queued.load(Ordering::SeqCst),
            active: self.counters.active.load(Ordering::SeqCst),
            completed: self.counters.completed.load(Ordering::SeqCst),
        }
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("info", &self.info())
            .finish()
    }
}
