//! Single-generator lifecycle.
//!
//! [`GeneratorSupervisor`] binds one [`WorkerPool`] to one sink at a time. Its
//! state lives in a single slot behind one lock:
//!
//! ```text
//! Idle --start--> Starting --connected--> Running --stop / pool idle--> Draining --released--> Idle
//!                    |
//!                    +--connect failed--> Idle
//! ```
//!
//! Only one generator may be outside `Idle` at a time. Release (stopping the
//! sink, closing the connection) runs exactly once per generator, whether the
//! pool drained because of [`GeneratorSupervisor::stop`], worker deadlines or
//! iteration limits.

use crate::common::{Connection, Connector, Error, MessageFactory, Result, Sink, SinkSettings};
use crate::pool::{manager::WorkerPool, worker::WorkerSettings};
use core::time::Duration;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;


/// Observable lifecycle state of the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorState {
    Idle,
    Starting,
    Running,
    Draining,
}

/// Parameters of one generator run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StartRequest {
    /// Workers started immediately.
    pub workers: usize,
    /// Per-worker publishing time. Zero runs until stopped.
    pub timeout: Duration,
    /// Per-worker iteration limit. Zero means unlimited.
    pub max_count: u64,
    /// Pause between iterations of one worker.
    pub delay: Duration,
}

impl StartRequest {
    pub fn new(workers: usize) -> Self {
        Self {
            workers,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_max_count(mut self, max_count: u64) -> Self {
        self.max_count = max_count;
        self
    }

    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    const fn worker_settings(&self) -> WorkerSettings {
        WorkerSettings {
            timeout: self.timeout,
            max_count: self.max_count,
            delay: self.delay,
        }
    }
}

/// Owns the active generator, if any.
///
/// Cloning yields another handle to the same supervisor. A process is expected
/// to create one supervisor and share it.
#[derive(Clone)]
pub struct GeneratorSupervisor {
    inner: Arc<Inner>,
}

struct Inner {
    connector: Arc<dyn Connector>,
    settings: SinkSettings,
    slot: Mutex<Slot>,
    // Mirrors `slot`; only written while `slot` is locked.
    state: watch::Sender<GeneratorState>,
}

enum Slot {
    Idle,
    Starting { stop_requested: bool },
    Running(Arc<Generator>),
    Draining(Arc<Generator>),
}

impl Slot {
    const fn state(&self) -> GeneratorState {
        match self {
            Self::Idle => GeneratorState::Idle,
            Self::Starting { .. } => GeneratorState::Starting,
            Self::Running(_) => GeneratorState::Running,
            Self::Draining(_) => GeneratorState::Draining,
        }
    }

    fn holds(&self, generator: &Arc<Generator>) -> bool {
        match self {
            Self::Running(current) | Self::Draining(current) => Arc::ptr_eq(current, generator),
            Self::Idle | Self::Starting { .. } => false,
        }
    }
}

/// One live pairing of pool, sink and connection.
struct Generator {
    connection: Box<dyn Connection>,
    sink: Arc<dyn Sink>,
    pool: WorkerPool,
    root: CancellationToken,
    released: AtomicBool,
}

impl Generator {
    /// Graceful pool stop plus forced cancellation of every worker lifetime.
    fn stop(&self) {
        self.pool.stop();
        self.root.cancel();
    }
}

impl GeneratorSupervisor {
    /// Creates an idle supervisor that opens sinks described by `settings`
    /// through `connector`.
    pub fn new(connector: Arc<dyn Connector>, settings: SinkSettings) -> Self {
        let (state, _) = watch::channel(GeneratorState::Idle);
        Self {
            inner: Arc::new(Inner {
                connector,
                settings,
                slot: Mutex::new(Slot::Idle),
                state,
            }),
        }
    }

    /// Starts a generator publishing `factory` messages with `request.workers`
    /// workers.
    ///
    /// Returns once the workers are running. A background task waits for the
    /// pool to drain and then releases the sink and connection.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidRequest`] if `request.workers` exceeds `isize::MAX`.
    ///   Nothing changes.
    /// - [`Error::AlreadyRunning`] if a generator is starting, running or
    ///   draining. Nothing changes.
    /// - The connector's error (normally [`Error::Connection`]) if connecting
    ///   fails. The supervisor returns to idle.
    #[tracing::instrument(skip_all, fields(workers = request.workers))]
    pub async fn start(
        &self,
        factory: Arc<dyn MessageFactory>,
        request: StartRequest,
    ) -> Result<()> {
        let Ok(workers) = isize::try_from(request.workers) else {
            return Err(Error::invalid_request(format!(
                "{} workers exceeds the maximum of {}",
                request.workers,
                isize::MAX
            )));
        };
        {
            let mut slot = self.inner.slot.lock();
            if !matches!(*slot, Slot::Idle) {
                tracing::warn!(state = ?slot.state(), "Refusing to start a second generator");
                return Err(Error::AlreadyRunning);
            }
            self.inner.set(&mut slot, Slot::Starting { stop_requested: false });
        }
        let guard = StartingGuard {
            inner: &self.inner,
            armed: true,
        };

        tracing::info!(
            timeout = ?request.timeout,
            max_count = request.max_count,
            delay = ?request.delay,
            "Starting event generator"
        );
        let connection = match self.inner.connector.connect().await {
            Ok(connection) => connection,
            Err(e) => {
                tracing::error!(error = %e, "Failed to connect to the message bus");
                return Err(e);
            }
        };

        let sink = connection.open_sink(&self.inner.settings);
        let pool = WorkerPool::new(Arc::clone(&sink), factory, request.worker_settings());
        let generator = Arc::new(Generator {
            connection,
            sink,
            pool,
            root: CancellationToken::new(),
            released: AtomicBool::new(false),
        });

        let stop_requested = {
            let mut slot = self.inner.slot.lock();
            let stop_requested = matches!(*slot, Slot::Starting { stop_requested: true });
            let next = if stop_requested {
                Slot::Draining(Arc::clone(&generator))
            } else {
                Slot::Running(Arc::clone(&generator))
            };
            self.inner.set(&mut slot, next);
            stop_requested
        };
        guard.disarm();

        if stop_requested {
            // Stopped while connecting: no workers, so the watcher releases
            // straight away.
            tracing::info!("Stop requested during start, releasing");
        } else {
            generator.pool.scale(&generator.root, workers);
        }

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            generator.pool.wait_idle().await;
            inner.release(&generator).await;
        });
        Ok(())
    }

    /// Stops the active generator.
    ///
    /// Workers are asked to stop gracefully and their lifetimes are cancelled;
    /// release follows once the pool drains. Stopping while a start is still
    /// connecting makes that start release immediately. No-op when idle or
    /// already draining.
    pub fn stop(&self) {
        let generator = {
            let mut slot = self.inner.slot.lock();
            match &mut *slot {
                Slot::Idle => {
                    tracing::info!("There is no running generator");
                    return;
                }
                Slot::Starting { stop_requested } => {
                    tracing::info!("Generator is starting, stop deferred");
                    *stop_requested = true;
                    return;
                }
                Slot::Draining(_) => {
                    tracing::debug!("Generator is already draining");
                    return;
                }
                Slot::Running(generator) => {
                    let generator = Arc::clone(generator);
                    self.inner.set(&mut slot, Slot::Draining(Arc::clone(&generator)));
                    generator
                }
            }
        };

        tracing::info!(topic = generator.sink.id(), "Stopping event generator");
        generator.stop();
    }

    /// Adds or removes workers of the running generator and returns the new
    /// worker count.
    ///
    /// # Errors
    ///
    /// [`Error::NotRunning`] unless a generator is running.
    pub fn scale(&self, delta: isize) -> Result<usize> {
        let slot = self.inner.slot.lock();
        let Slot::Running(generator) = &*slot else {
            return Err(Error::NotRunning);
        };
        generator.pool.scale(&generator.root, delta);
        Ok(generator.pool.len())
    }

    pub fn state(&self) -> GeneratorState {
        *self.inner.state.borrow()
    }

    /// Workers tracked by the active generator, `0` when there is none.
    pub fn worker_count(&self) -> usize {
        match &*self.inner.slot.lock() {
            Slot::Running(generator) | Slot::Draining(generator) => generator.pool.len(),
            Slot::Idle | Slot::Starting { .. } => 0,
        }
    }

    /// Waits until the supervisor is idle, i.e. any generator has been fully
    /// released.
    pub async fn wait_until_idle(&self) {
        let mut state = self.inner.state.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = state.wait_for(|state| *state == GeneratorState::Idle).await;
    }
}

impl Inner {
    fn set(&self, slot: &mut Slot, next: Slot) {
        *slot = next;
        self.state.send_replace(slot.state());
    }

    /// Stops the sink, closes the connection and clears the slot. Runs once
    /// per generator.
    async fn release(&self, generator: &Arc<Generator>) {
        if generator.released.swap(true, Ordering::AcqRel) {
            return;
        }

        {
            let mut slot = self.slot.lock();
            if matches!(*slot, Slot::Running(_)) && slot.holds(generator) {
                self.set(&mut slot, Slot::Draining(Arc::clone(generator)));
            }
        }

        tracing::info!(topic = generator.sink.id(), "Releasing event generator");
        // Workers added after the pool drained must not outlive the sink.
        generator.root.cancel();
        generator.sink.stop();
        if let Err(e) = generator.connection.close().await {
            let e = match e {
                Error::Release { .. } => e,
                other => Error::release(other.to_string()),
            };
            tracing::error!(error = %e, "Failed to close the message bus connection");
        }

        let mut slot = self.slot.lock();
        if slot.holds(generator) {
            self.set(&mut slot, Slot::Idle);
        }
        tracing::info!("Event generator released");
    }
}

/// Returns the slot to idle if a start is abandoned before it finishes.
struct StartingGuard<'a> {
    inner: &'a Inner,
    armed: bool,
}

impl StartingGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for StartingGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut slot = self.inner.slot.lock();
        if matches!(*slot, Slot::Starting { .. }) {
            self.inner.set(&mut slot, Slot::Idle);
        }
    }
}
