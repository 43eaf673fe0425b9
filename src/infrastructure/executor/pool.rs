//! Bounded worker pools with discard-oldest overflow.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// A unit of work run by a pool worker.
pub type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Sizing of a single pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSize {
    /// Number of concurrent workers.
    pub workers: usize,
    /// Queued jobs kept before the oldest is discarded.
    pub queue_capacity: usize,
}

impl PoolSize {
    /// Creates a pool size.
    #[must_use]
    pub const fn new(workers: usize, queue_capacity: usize) -> Self {
        Self {
            workers,
            queue_capacity,
        }
    }
}

/// Counters describing a pool's lifetime activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Jobs accepted by `execute`.
    pub submitted: u64,
    /// Jobs dropped from the queue on overflow.
    pub discarded: u64,
    /// Jobs run to completion.
    pub completed: u64,
}

struct PoolShared {
    name: &'static str,
    capacity: usize,
    queue: Mutex<VecDeque<Job>>,
    notify: Notify,
    closed: AtomicBool,
    submitted: AtomicU64,
    discarded: AtomicU64,
    completed: AtomicU64,
}

/// A fixed set of tokio worker tasks draining a bounded queue.
///
/// When the queue is full the oldest queued job is dropped without running.
pub struct TaskPool {
    shared: Arc<PoolShared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for TaskPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskPool")
            .field("name", &self.shared.name)
            .field("capacity", &self.shared.capacity)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl TaskPool {
    /// Creates a pool and spawns its workers on the current tokio runtime.
    ///
    /// # Panics
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn new(name: &'static str, size: PoolSize) -> Self {
        let shared = Arc::new(PoolShared {
            name,
            capacity: size.queue_capacity.max(1),
            queue: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
            submitted: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
            completed: AtomicU64::new(0),
        });

        let workers = (0..size.workers.max(1))
            .map(|index| tokio::spawn(worker_loop(shared.clone(), index)))
            .collect();

        debug!(
            pool = name,
            workers = size.workers.max(1),
            queue = shared.capacity,
            "Started task pool"
        );

        Self {
            shared,
            workers: Mutex::new(workers),
        }
    }

    /// Queues a job. Returns false if the pool has been shut down.
    pub fn execute<F>(&self, job: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.shared.closed.load(Ordering::Acquire) {
            return false;
        }

        let dropped = {
            let mut queue = self.shared.queue.lock();
            let dropped = if queue.len() >= self.shared.capacity {
                queue.pop_front()
            } else {
                None
            };
            queue.push_back(Box::pin(job));
            dropped
        };

        self.shared.submitted.fetch_add(1, Ordering::Relaxed);
        if dropped.is_some() {
            self.shared.discarded.fetch_add(1, Ordering::Relaxed);
            debug!(pool = self.shared.name, "Queue full, discarded oldest job");
        }
        self.shared.notify.notify_one();
        true
    }

    /// Returns the number of jobs waiting in the queue.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.shared.queue.lock().len()
    }

    /// Returns lifetime counters.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            submitted: self.shared.submitted.load(Ordering::Relaxed),
            discarded: self.shared.discarded.load(Ordering::Relaxed),
            completed: self.shared.completed.load(Ordering::Relaxed),
        }
    }

    /// Stops the workers and drops any queued jobs.
    pub fn shutdown(&self) {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.shared.queue.lock().clear();
        for worker in self.workers.lock().drain(..) {
            worker.abort();
        }
        debug!(pool = self.shared.name, "Stopped task pool");
    }
}

impl Drop for TaskPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn worker_loop(shared: Arc<PoolShared>, index: usize) {
    loop {
        let job = shared.queue.lock().pop_front();
        match job {
            Some(job) => {
                trace!(pool = shared.name, worker = index, "Running job");
                job.await;
                shared.completed.fetch_add(1, Ordering::Relaxed);
            }
            None => shared.notify.notified().await,
        }
    }
}

/// Sizing of the three pipeline pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Classification pool.
    pub dispatch: PoolSize,
    /// Network fetch pool.
    pub network: PoolSize,
    /// Local read and decode pool.
    pub local: PoolSize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            dispatch: PoolSize::new(1, 20),
            network: PoolSize::new(5, 20),
            local: PoolSize::new(1, 20),
        }
    }
}

/// The dispatch, network and local pools, created once and owned by the
/// pipeline context.
#[derive(Debug)]
pub struct Executors {
    /// Routes requests; never performs blocking I/O.
    pub dispatch: TaskPool,
    /// Runs network fetches.
    pub network: TaskPool,
    /// Reads local sources and decodes.
    pub local: TaskPool,
}

impl Executors {
    /// Starts all three pools.
    #[must_use]
    pub fn new(config: ExecutorConfig) -> Self {
        Self {
            dispatch: TaskPool::new("dispatch", config.dispatch),
            network: TaskPool::new("network", config.network),
            local: TaskPool::new("local", config.local),
        }
    }

    /// Stops all three pools.
    pub fn shutdown(&self) {
        self.dispatch.shutdown();
        self.network.shutdown();
        self.local.shutdown();
    }
}
