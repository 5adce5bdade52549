//! Asynchronous pool of publishing workers.
//!
//! This module defines the [`WorkerPool`] struct, which owns the ordered set of
//! live workers for one sink. Workers run as independent Tokio tasks; the pool
//! only tracks a [`WorkerHandle`] per worker, in creation order, behind a
//! single mutex.
//!
//! The tracked sequence shrinks in exactly two ways: a scale-down splices
//! handles off its tail, or a finished worker removes its own handle. Every
//! transition to empty wakes all [`WorkerPool::wait_idle`] callers.

use super::worker::{Worker, WorkerHandle, WorkerSettings};
use crate::common::{MessageFactory, Sink};
use core::cmp::Ordering;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// A pool of publishing workers that can be resized while it runs.
///
/// Cloning is cheap and yields another handle to the same pool.
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    workers: Mutex<Vec<Arc<WorkerHandle>>>,
    // Only notified while `workers` is locked.
    idle: Notify,
    sink: Arc<dyn Sink>,
    factory: Arc<dyn MessageFactory>,
    settings: WorkerSettings,
}

impl WorkerPool {
    /// Creates an empty pool whose workers publish `factory` messages into
    /// `sink` under the given per-worker limits.
    pub fn new(
        sink: Arc<dyn Sink>,
        factory: Arc<dyn MessageFactory>,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                workers: Mutex::new(Vec::new()),
                idle: Notify::new(),
                sink,
                factory,
                settings,
            }),
        }
    }

    /// Adds (`delta > 0`) or removes (`delta < 0`) workers.
    ///
    /// New workers are bound to a child of `parent` and start immediately.
    /// Removal stops the most recently added workers first and is clamped to
    /// the number of tracked workers.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn scale(&self, parent: &CancellationToken, delta: isize) {
        let mut workers = self.inner.workers.lock();

        match delta.cmp(&0) {
            Ordering::Greater => {
                tracing::info!(topic = self.inner.sink.id(), count = delta, "Starting publishers");
                for _ in 0..delta {
                    let handle = self.spawn_worker(parent, workers.len());
                    workers.push(handle);
                }
            }
            Ordering::Less => {
                let keep = workers.len().saturating_sub(delta.unsigned_abs());
                let stopped = workers.split_off(keep);
                tracing::info!(
                    topic = self.inner.sink.id(),
                    count = stopped.len(),
                    "Stopping publishers"
                );
                for handle in &stopped {
                    handle.stop();
                }
                if workers.is_empty() && !stopped.is_empty() {
                    self.inner.idle.notify_waiters();
                }
            }
            Ordering::Equal => {}
        }
    }

    fn spawn_worker(&self, parent: &CancellationToken, index: usize) -> Arc<WorkerHandle> {
        let name = format!("{}-publisher-{index}", self.inner.sink.id());
        let handle = Arc::new(WorkerHandle::new(name, parent.child_token()));
        let settings = self.inner.settings;

        let worker = Worker {
            handle: Arc::clone(&handle),
            deadline: (!settings.timeout.is_zero()).then(|| Instant::now() + settings.timeout),
            sink: Arc::clone(&self.inner.sink),
            factory: Arc::clone(&self.inner.factory),
            settings,
            registration: Registration {
                pool: Arc::clone(&self.inner),
                handle: Arc::clone(&handle),
            },
        };
        tokio::spawn(worker.run());
        handle
    }

    /// Requests every tracked worker to stop without waiting for them.
    ///
    /// Workers leave the pool as their loops observe the cancellation; use
    /// [`WorkerPool::wait_idle`] to wait for that.
    pub fn stop(&self) {
        let workers = self.inner.workers.lock();
        tracing::debug!(
            topic = self.inner.sink.id(),
            count = workers.len(),
            "Stopping all publishers"
        );
        for handle in workers.iter() {
            handle.stop();
        }
    }

    /// Waits until no workers are tracked.
    ///
    /// Returns immediately for an empty pool. Workers added while waiting
    /// extend the wait; only a transition to empty ends it. There is no
    /// timeout: bound the wait through worker deadlines or [`WorkerPool::stop`].
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            // Register before checking so a concurrent zero-crossing is not
            // missed.
            notified.as_mut().enable();

            if self.inner.workers.lock().is_empty() {
                return;
            }
            notified.await;
        }
    }

    /// Number of tracked workers.
    pub fn len(&self) -> usize {
        self.inner.workers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.workers.lock().is_empty()
    }

    /// Names of the tracked workers, oldest first.
    pub fn worker_names(&self) -> Vec<String> {
        self.inner
            .workers
            .lock()
            .iter()
            .map(|handle| handle.name().to_owned())
            .collect()
    }

    #[cfg(test)]
    pub(super) fn handles(&self) -> Vec<Arc<WorkerHandle>> {
        self.inner.workers.lock().clone()
    }
}

/// Membership of one worker in its pool, released on drop.
pub(super) struct Registration {
    pool: Arc<PoolInner>,
    handle: Arc<WorkerHandle>,
}

impl Drop for Registration {
    fn drop(&mut self) {
        let mut workers = self.pool.workers.lock();
        // Already spliced out by a scale-down: nothing to do.
        let Some(index) = workers.iter().position(|h| Arc::ptr_eq(h, &self.handle)) else {
            return;
        };
        workers.remove(index);
        if workers.is_empty() {
            self.pool.idle.notify_waiters();
        }
    }
}
