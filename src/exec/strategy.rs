// src/exec/strategy.rs

//! Parallelization strategies for multi-result nodes.
//!
//! A strategy governs how the sub-invocations of one node (repeats and
//! generated sub-tests) are run: inline one after another, or as separate
//! tokio tasks, optionally capped by a semaphore.
//!
//! The interface follows a prepare / spawn / wait cycle: [`Strategy::prepare`]
//! returns a fresh [`SpawnBatch`] with zeroed counters, every sub-invocation
//! goes through [`SpawnBatch::spawn`], and [`SpawnBatch::wait`] resolves once
//! everything spawned in that batch has completed.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Notify, Semaphore};
use tracing::trace;

/// Boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One unit of work handed to a strategy.
pub type Job = BoxFuture<'static, ()>;

/// Pluggable policy for running one node's sub-invocations.
pub trait Strategy: Send + Sync + fmt::Debug {
    /// Start a new spawn cycle.
    fn prepare(&self) -> Box<dyn SpawnBatch>;

    /// Upper bound on concurrently running sub-invocations, `None` when
    /// unbounded.
    fn concurrency(&self) -> Option<usize>;
}

/// One prepare/spawn/wait cycle.
pub trait SpawnBatch: Send {
    /// Arrange for `job` to run. The returned future resolves once the job
    /// has been handed off (serial strategies run it to completion here).
    fn spawn(&mut self, job: Job) -> BoxFuture<'_, ()>;

    /// Resolve once every job spawned in this batch has completed.
    fn wait(self: Box<Self>) -> BoxFuture<'static, ()>;
}

/// Runs sub-invocations synchronously, one after another.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialStrategy;

impl Strategy for SerialStrategy {
    fn prepare(&self) -> Box<dyn SpawnBatch> {
        Box::new(SerialBatch)
    }

    fn concurrency(&self) -> Option<usize> {
        Some(1)
    }
}

struct SerialBatch;

impl SpawnBatch for SerialBatch {
    fn spawn(&mut self, job: Job) -> BoxFuture<'_, ()> {
        job
    }

    fn wait(self: Box<Self>) -> BoxFuture<'static, ()> {
        Box::pin(async {})
    }
}

/// Every sub-invocation gets its own task, with no cap.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnlimitedParallelStrategy;

impl Strategy for UnlimitedParallelStrategy {
    fn prepare(&self) -> Box<dyn SpawnBatch> {
        Box::new(ParallelBatch::new(None))
    }

    fn concurrency(&self) -> Option<usize> {
        None
    }
}

/// Every sub-invocation gets its own task, but at most `limit` of them run
/// at the same time.
#[derive(Debug, Clone, Copy)]
pub struct LimitedParallelStrategy {
    limit: usize,
}

impl LimitedParallelStrategy {
    /// `limit` is clamped to at least 1.
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

impl Strategy for LimitedParallelStrategy {
    fn prepare(&self) -> Box<dyn SpawnBatch> {
        Box::new(ParallelBatch::new(Some(Arc::new(Semaphore::new(self.limit)))))
    }

    fn concurrency(&self) -> Option<usize> {
        Some(self.limit)
    }
}

/// Live-task counter whose return to zero wakes the waiter.
#[derive(Default)]
struct LiveCount {
    count: Mutex<usize>,
    zero: Notify,
}

/// Decrements the live count when the spawned task ends, even by panic.
struct LiveGuard(Arc<LiveCount>);

impl Drop for LiveGuard {
    fn drop(&mut self) {
        let mut count = self.0.count.lock();
        *count -= 1;
        if *count == 0 {
            self.0.zero.notify_one();
        }
    }
}

struct ParallelBatch {
    live: Arc<LiveCount>,
    limit: Option<Arc<Semaphore>>,
}

impl ParallelBatch {
    fn new(limit: Option<Arc<Semaphore>>) -> Self {
        Self {
            live: Arc::new(LiveCount::default()),
            limit,
        }
    }
}

impl SpawnBatch for ParallelBatch {
    fn spawn(&mut self, job: Job) -> BoxFuture<'_, ()> {
        *self.live.count.lock() += 1;
        let guard = LiveGuard(Arc::clone(&self.live));
        let limit = self.limit.clone();

        tokio::spawn(async move {
            let _guard = guard;
            // The semaphore is never closed, so acquisition only fails if
            // that invariant is broken; run uncapped rather than drop the job.
            let _permit = match limit {
                Some(sem) => sem.acquire_owned().await.ok(),
                None => None,
            };
            job.await;
        });

        Box::pin(async {})
    }

    fn wait(self: Box<Self>) -> BoxFuture<'static, ()> {
        let live = self.live;
        Box::pin(async move {
            loop {
                // A permit may be left over from an earlier return to zero,
                // so re-check the count after every wake-up.
                let notified = live.zero.notified();
                if *live.count.lock() == 0 {
                    trace!("strategy batch drained");
                    return;
                }
                notified.await;
            }
        })
    }
}
