//! Resolver lifecycle and single-flight orchestration.
//!
//! A started [`Resolver`] owns one worker task that runs resolution attempts
//! one at a time. Refresh requests, whether from the caller or the periodic
//! timer, go through a channel of depth one, so any number of requests made
//! while an attempt is in flight collapse into a single follow-up attempt.

use super::types::ResolutionOutcome;
use crate::error::ResolverError;
use parking_lot::Mutex;
use std::{
    fmt,
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::{
    runtime::Handle,
    sync::{
        mpsc::{self, error::TrySendError},
        watch,
    },
    time::{Instant, MissedTickBehavior},
};
use tracing::Instrument;

/// Receives the outcome of every resolution attempt.
///
/// Called from the resolver's worker task without any resolver lock held,
/// so a listener may dispose or drop the resolver that is calling it.
/// Implementations should return quickly.
pub trait ResultListener: Send + Sync {
    fn on_result(&self, outcome: ResolutionOutcome);
}

impl<F> ResultListener for F
where
    F: Fn(ResolutionOutcome) + Send + Sync,
{
    fn on_result(&self, outcome: ResolutionOutcome) {
        self(outcome)
    }
}

/// One resolution attempt, supplied by a concrete resolver.
///
/// Dropping the returned future cancels the attempt; implementations must
/// leave no observable side effects for an attempt dropped mid-way.
pub trait Resolve: Send {
    fn resolve(&mut self) -> Pin<Box<dyn Future<Output = ResolutionOutcome> + Send + '_>>;
}

/// Observable lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverState {
    Created,
    Started,
    Disposed,
}

impl fmt::Display for ResolverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResolverState::Created => "created",
            ResolverState::Started => "started",
            ResolverState::Disposed => "disposed",
        };
        f.write_str(name)
    }
}

enum Lifecycle {
    Created {
        resolve: Box<dyn Resolve>,
    },
    Started {
        refresh_tx: mpsc::Sender<()>,
        shutdown_tx: watch::Sender<bool>,
    },
    Disposed,
}

impl Lifecycle {
    fn state(&self) -> ResolverState {
        match self {
            Lifecycle::Created { .. } => ResolverState::Created,
            Lifecycle::Started { .. } => ResolverState::Started,
            Lifecycle::Disposed => ResolverState::Disposed,
        }
    }
}

/// Listener slot shared by the resolver handle and its worker.
///
/// `active` is cleared by disposal before the listener is released. A
/// delivery that passed the check just before disposal may still land.
struct Delivery {
    active: AtomicBool,
    listener: Mutex<Option<Arc<dyn ResultListener>>>,
}

impl Delivery {
    fn new() -> Self {
        Self {
            active: AtomicBool::new(false),
            listener: Mutex::new(None),
        }
    }

    fn attach(&self, listener: Arc<dyn ResultListener>) {
        *self.listener.lock() = Some(listener);
        self.active.store(true, Ordering::SeqCst);
    }

    fn detach(&self) -> Option<Arc<dyn ResultListener>> {
        self.active.store(false, Ordering::SeqCst);
        self.listener.lock().take()
    }

    fn deliver(&self, outcome: ResolutionOutcome) {
        let listener = self.listener.lock().clone();
        match listener {
            Some(listener) if self.active.load(Ordering::SeqCst) => listener.on_result(outcome),
            _ => tracing::debug!("Resolver disposed, dropping outcome"),
        }
    }
}

/// A name resolver with a start/refresh/dispose lifecycle.
///
/// Must be started from within a tokio runtime. Dropping the resolver
/// disposes it.
pub struct Resolver {
    target: String,
    refresh_interval: Option<Duration>,
    lifecycle: Mutex<Lifecycle>,
    delivery: Arc<Delivery>,
}

impl Resolver {
    /// Wraps a resolution strategy. `refresh_interval` of `None` disables
    /// periodic refresh.
    pub fn new(
        target: impl Into<String>,
        resolve: Box<dyn Resolve>,
        refresh_interval: Option<Duration>,
    ) -> Self {
        Self {
            target: target.into(),
            refresh_interval,
            lifecycle: Mutex::new(Lifecycle::Created { resolve }),
            delivery: Arc::new(Delivery::new()),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn state(&self) -> ResolverState {
        self.lifecycle.lock().state()
    }

    /// Registers `listener` and schedules the first resolution attempt.
    ///
    /// Returns immediately; outcomes arrive on the listener. Fails with
    /// [`ResolverError::InvalidState`] unless the resolver is freshly created.
    pub fn start(&self, listener: Arc<dyn ResultListener>) -> Result<(), ResolverError> {
        let runtime = Handle::try_current()
            .map_err(|e| ResolverError::InvalidState(format!("no tokio runtime: {}", e)))?;

        let mut lifecycle = self.lifecycle.lock();
        let resolve = match std::mem::replace(&mut *lifecycle, Lifecycle::Disposed) {
            Lifecycle::Created { resolve } => resolve,
            other => {
                let state = other.state();
                *lifecycle = other;
                return Err(ResolverError::InvalidState(format!(
                    "cannot start a resolver that is already {}",
                    state
                )));
            }
        };

        self.delivery.attach(listener);

        let (refresh_tx, refresh_rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        // Initial attempt; the channel is empty so this cannot fail.
        let _ = refresh_tx.try_send(());

        let worker = Worker {
            resolve,
            delivery: self.delivery.clone(),
            refresh_rx,
            shutdown_rx: shutdown_rx.clone(),
        };
        let span = tracing::info_span!("resolver", uri = %self.target);
        runtime.spawn(worker.run().instrument(span.clone()));

        if let Some(period) = self.refresh_interval {
            let timer = run_refresh_timer(period, refresh_tx.clone(), shutdown_rx);
            runtime.spawn(timer.instrument(span));
        }

        *lifecycle = Lifecycle::Started {
            refresh_tx,
            shutdown_tx,
        };
        tracing::info!(
            uri = %self.target,
            refresh_interval = ?self.refresh_interval,
            "Resolver started"
        );
        Ok(())
    }

    /// Requests a resolution attempt outside the periodic schedule.
    ///
    /// Coalesced with any request already pending. Ignored unless started.
    pub fn refresh(&self) {
        match &*self.lifecycle.lock() {
            Lifecycle::Started { refresh_tx, .. } => match refresh_tx.try_send(()) {
                Ok(()) => tracing::debug!(uri = %self.target, "Refresh requested"),
                Err(TrySendError::Full(())) => {
                    tracing::trace!(uri = %self.target, "Refresh already pending")
                }
                Err(TrySendError::Closed(())) => {
                    tracing::warn!(uri = %self.target, "Resolution worker has stopped")
                }
            },
            other => tracing::debug!(
                uri = %self.target,
                state = %other.state(),
                "Refresh ignored"
            ),
        }
    }

    /// Cancels any in-flight attempt, stops the timer and releases the
    /// listener. Safe to call from inside the listener.
    pub fn dispose(&self) {
        let previous = std::mem::replace(&mut *self.lifecycle.lock(), Lifecycle::Disposed);
        if let Lifecycle::Disposed = previous {
            return;
        }
        if let Lifecycle::Started { shutdown_tx, .. } = &previous {
            shutdown_tx.send_replace(true);
        }
        // Dropped outside the lock; may run the listener's own destructor.
        let released = self.delivery.detach();
        drop(released);
        tracing::info!(uri = %self.target, "Resolver disposed");
    }
}

impl Drop for Resolver {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("target", &self.target)
            .field("refresh_interval", &self.refresh_interval)
            .field("state", &self.state())
            .finish()
    }
}

struct Worker {
    resolve: Box<dyn Resolve>,
    delivery: Arc<Delivery>,
    refresh_rx: mpsc::Receiver<()>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Worker {
    async fn run(mut self) {
        loop {
            tokio::select! {
                _ = self.shutdown_rx.changed() => break,
                request = self.refresh_rx.recv() => {
                    if request.is_none() {
                        break;
                    }
                }
            }

            tracing::debug!("Resolution attempt starting");
            let outcome = tokio::select! {
                _ = self.shutdown_rx.changed() => {
                    tracing::debug!("Resolution attempt canceled");
                    break;
                }
                outcome = self.resolve.resolve() => outcome,
            };
            self.delivery.deliver(outcome);
        }
        tracing::debug!("Resolution worker stopped");
    }
}

/// Sends a refresh request every `period`, first one `period` after start.
async fn run_refresh_timer(
    period: Duration,
    refresh_tx: mpsc::Sender<()>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticks = tokio::time::interval_at(Instant::now() + period, period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => return,
            _ = ticks.tick() => match refresh_tx.try_send(()) {
                Ok(()) => tracing::debug!("Periodic refresh requested"),
                Err(TrySendError::Full(())) => tracing::trace!("Periodic refresh coalesced"),
                Err(TrySendError::Closed(())) => {
                    tracing::warn!("Resolution worker has stopped, ending periodic refresh");
                    return;
                }
            },
        }
    }
}
