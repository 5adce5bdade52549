use super::manager::Registration;
use crate::common::{MessageFactory, Sink};
use core::time::Duration;
use std::sync::Arc;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;

/// Per-worker limits shared by every worker in a pool.
///
/// A zero `timeout`, zero `max_count` or zero `delay` disables that limit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerSettings {
    /// How long each worker publishes, measured from its creation.
    pub timeout: Duration,
    /// Iterations after which a worker finishes on its own.
    pub max_count: u64,
    /// Pause between iterations.
    pub delay: Duration,
}

/// The pool-facing side of a running worker.
///
/// Names are labels for logs only and may repeat after a scale-down. The pool
/// identifies workers by handle identity.
#[derive(Debug)]
pub struct WorkerHandle {
    name: String,
    token: CancellationToken,
}

impl WorkerHandle {
    pub(super) const fn new(name: String, token: CancellationToken) -> Self {
        Self { name, token }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Requests the worker to stop. The in-flight publish, if any, completes.
    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Why a worker left its loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    Cancelled,
    Deadline,
    Completed,
}

/// Everything a worker task owns while it runs.
///
/// Dropping the worker drops its [`Registration`], which removes the worker
/// from its pool. This also happens when a collaborator panics mid-iteration.
pub(super) struct Worker {
    pub(super) handle: Arc<WorkerHandle>,
    pub(super) deadline: Option<Instant>,
    pub(super) sink: Arc<dyn Sink>,
    pub(super) factory: Arc<dyn MessageFactory>,
    pub(super) settings: WorkerSettings,
    pub(super) registration: Registration,
}

impl Worker {
    /// Publishes until the worker is cancelled, its deadline passes, or it
    /// reaches its iteration limit.
    pub(super) async fn run(self) {
        let name = self.handle.name();
        tracing::debug!(worker = name, "Started");

        let mut iterations = 0_u64;
        let exit = loop {
            if self.handle.is_stopped() {
                break Exit::Cancelled;
            }
            if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                break Exit::Deadline;
            }

            let message = self.factory.produce();
            match self.sink.publish(message).await {
                Ok(id) => tracing::trace!(worker = name, %id, "Published message"),
                Err(e) => tracing::warn!(worker = name, error = %e, "Publish failed"),
            }
            iterations += 1;

            if self.settings.delay.is_zero() {
                // Nothing else suspends when the sink resolves immediately.
                tokio::task::yield_now().await;
            } else {
                self.pause().await;
            }

            if self.settings.max_count > 0 && iterations >= self.settings.max_count {
                break Exit::Completed;
            }
        };

        tracing::debug!(worker = name, ?exit, iterations, "Stopped");
        drop(self.registration);
    }

    /// Sleeps for the configured delay, waking early on cancellation or when
    /// the deadline falls inside the delay.
    async fn pause(&self) {
        let mut wake_at = Instant::now() + self.settings.delay;
        if let Some(deadline) = self.deadline {
            wake_at = wake_at.min(deadline);
        }
        tokio::select! {
            () = self.handle.token.cancelled() => {}
            () = sleep_until(wake_at) => {}
        }
    }
}
