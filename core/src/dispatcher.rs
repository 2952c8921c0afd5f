//! Bounded worker pool that runs CPAS calls and delivers their outcomes.
//!
//! # Design
//! The dispatcher owns a dedicated tokio runtime. Each submitted call:
//!
//! 1. snapshots the connection config on the submitting thread,
//! 2. waits for one of `max_workers` semaphore permits,
//! 3. fetches the body with `reqwest` under `tokio::time::timeout`; on expiry
//!    the request future is dropped, which also closes the connection,
//! 4. decodes the body and hands the outcome to the caller's handler on the
//!    runtime's blocking pool, whose threads start at zero, are capped at
//!    `max_workers` and exit after `idle_timeout` without work.
//!
//! The permit is held until the handler returns, also when the call is
//! cancelled while its handler is running. The handler is wrapped in a
//! `Completion` guard that runs it exactly once: with the real outcome, or
//! with `CpasError::Cancelled` if the call is dropped first (handle
//! cancelled, dispatcher shut down).

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::runtime::Runtime;
use tokio::sync::{oneshot, Notify, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::config::{ConfigHolder, DispatcherConfig};
use crate::decode::decode;
use crate::error::CpasError;
use crate::types::CpasResponse;

type Handler<T> = Box<dyn FnOnce(Result<T, CpasError>) + Send>;

/// Point-in-time counters for the pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatcherMetrics {
    /// Submitted calls whose handler has not run yet.
    pub pending: usize,
    /// Calls holding a worker permit.
    pub inflight: usize,
    /// Highest `inflight` seen since the dispatcher started.
    pub peak_inflight: usize,
    pub completed: usize,
    /// Completed calls whose outcome was an error.
    pub failed: usize,
}

#[derive(Default)]
struct Tracker {
    pending: AtomicUsize,
    inflight: AtomicUsize,
    peak_inflight: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
    idle: Notify,
}

impl Tracker {
    fn snapshot(&self) -> DispatcherMetrics {
        DispatcherMetrics {
            pending: self.pending.load(Ordering::Relaxed),
            inflight: self.inflight.load(Ordering::Relaxed),
            peak_inflight: self.peak_inflight.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }

    fn finished(&self, failed: bool) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        if self.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.notify_waiters();
        }
    }

    async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.pending.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Decrements `inflight` when the call releases its permit.
struct InflightGuard(Arc<Tracker>);

impl InflightGuard {
    fn enter(tracker: Arc<Tracker>) -> Self {
        let now = tracker.inflight.fetch_add(1, Ordering::AcqRel) + 1;
        tracker.peak_inflight.fetch_max(now, Ordering::AcqRel);
        Self(tracker)
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.0.inflight.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Runs the caller's handler exactly once.
struct Completion<T> {
    handler: Option<Handler<T>>,
    done: Option<oneshot::Sender<Result<(), CpasError>>>,
    tracker: Arc<Tracker>,
    path: String,
}

impl<T> Completion<T> {
    fn complete(mut self, outcome: Result<T, CpasError>) {
        self.fire(outcome);
    }

    fn fire(&mut self, outcome: Result<T, CpasError>) {
        let Some(handler) = self.handler.take() else {
            return;
        };
        let failed = match &outcome {
            Ok(_) => {
                debug!(path = %self.path, "call completed");
                false
            }
            Err(e) => {
                warn!(path = %self.path, error = %e, "call failed");
                true
            }
        };
        let status = match panic::catch_unwind(AssertUnwindSafe(move || handler(outcome))) {
            Ok(()) => Ok(()),
            Err(_) => {
                error!(path = %self.path, "completion handler panicked");
                Err(CpasError::HandlerPanicked)
            }
        };
        self.tracker.finished(failed);
        if let Some(done) = self.done.take() {
            let _ = done.send(status);
        }
    }
}

impl<T> Drop for Completion<T> {
    fn drop(&mut self) {
        self.fire(Err(CpasError::Cancelled));
    }
}

/// Handle to a submitted call.
///
/// Dropping the handle detaches the call; its handler still runs.
#[derive(Debug)]
pub struct CallHandle {
    task: JoinHandle<()>,
    done: oneshot::Receiver<Result<(), CpasError>>,
}

impl CallHandle {
    /// Block until the handler has run.
    ///
    /// Returns `HandlerPanicked` if the handler panicked. Must not be called
    /// from inside an async context; use [`CallHandle::join`] there.
    pub fn wait(self) -> Result<(), CpasError> {
        self.done.blocking_recv().unwrap_or(Err(CpasError::Cancelled))
    }

    /// Wait asynchronously until the handler has run.
    pub async fn join(self) -> Result<(), CpasError> {
        self.done.await.unwrap_or(Err(CpasError::Cancelled))
    }

    /// Abandon the call. If its handler has not started, it runs with
    /// `CpasError::Cancelled`; an in-progress fetch is dropped.
    pub fn cancel(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

#[derive(Clone)]
struct CallContext {
    http: reqwest::Client,
    permits: Arc<Semaphore>,
    tracker: Arc<Tracker>,
    fetch_timeout: Duration,
}

/// Executes calls on a bounded pool against the current connection config.
pub struct Dispatcher {
    runtime: Runtime,
    connection: Arc<ConfigHolder>,
    context: CallContext,
}

impl Dispatcher {
    pub fn new(connection: Arc<ConfigHolder>, settings: DispatcherConfig) -> Result<Self, CpasError> {
        settings.validate()?;
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(settings.io_threads)
            .max_blocking_threads(settings.max_workers)
            .thread_keep_alive(settings.idle_timeout)
            .thread_name("cpas-dispatch")
            .enable_all()
            .build()
            .map_err(|e| CpasError::Runtime(e.to_string()))?;
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| CpasError::Runtime(e.to_string()))?;

        Ok(Self {
            runtime,
            connection,
            context: CallContext {
                http,
                permits: Arc::new(Semaphore::new(settings.max_workers)),
                tracker: Arc::new(Tracker::default()),
                fetch_timeout: settings.fetch_timeout,
            },
        })
    }

    /// Queue a call to `path` and decode its response as `T`.
    ///
    /// The connection config is captured now; reconfiguring afterwards does
    /// not affect this call. `on_complete` runs exactly once, on a pool
    /// thread, with either the decoded value or the error.
    pub fn submit<T, F>(&self, path: String, on_complete: F) -> CallHandle
    where
        T: CpasResponse,
        F: FnOnce(Result<T, CpasError>) + Send + 'static,
    {
        let url = self.connection.snapshot().map(|config| config.url_for(&path));
        let (done_tx, done_rx) = oneshot::channel();

        self.context.tracker.pending.fetch_add(1, Ordering::AcqRel);
        debug!(shape = %T::SHAPE, path = %path, "call submitted");
        let completion = Completion {
            handler: Some(Box::new(on_complete)),
            done: Some(done_tx),
            tracker: self.context.tracker.clone(),
            path,
        };

        let task = self.runtime.spawn(run_call(self.context.clone(), url, completion));
        CallHandle { task, done: done_rx }
    }

    pub fn metrics(&self) -> DispatcherMetrics {
        self.context.tracker.snapshot()
    }

    /// Wait up to `grace` for outstanding calls to finish, then tear the
    /// pool down. Calls still queued or in flight afterwards are cancelled.
    ///
    /// Blocks the current thread; must not be called from an async context.
    pub fn shutdown(self, grace: Duration) {
        let tracker = self.context.tracker.clone();
        let drained = self
            .runtime
            .block_on(async { tokio::time::timeout(grace, tracker.wait_idle()).await.is_ok() });
        if !drained {
            warn!(
                pending = tracker.pending.load(Ordering::Relaxed),
                "shutdown grace period elapsed, cancelling outstanding calls"
            );
        }
        self.runtime.shutdown_timeout(grace);
    }
}

async fn run_call<T: CpasResponse>(
    context: CallContext,
    url: Result<String, CpasError>,
    completion: Completion<T>,
) {
    let url = match url {
        Ok(url) => url,
        Err(e) => return deliver(completion, Err(e), None).await,
    };
    let permit = match context.permits.clone().acquire_owned().await {
        Ok(permit) => permit,
        Err(_) => return deliver(completion, Err(CpasError::Cancelled), None).await,
    };
    let slot = WorkerSlot {
        _inflight: InflightGuard::enter(context.tracker.clone()),
        _permit: permit,
    };

    let outcome = fetch::<T>(&context.http, &url, context.fetch_timeout).await;
    deliver(completion, outcome, Some(slot)).await;
}

/// A worker permit plus its `inflight` count, released together.
struct WorkerSlot {
    _inflight: InflightGuard,
    _permit: OwnedSemaphorePermit,
}

/// Run the handler on the blocking pool and wait for it to return.
///
/// The slot moves into the blocking closure so it stays held until the
/// handler returns, even if the call task is aborted meanwhile.
async fn deliver<T: CpasResponse>(
    completion: Completion<T>,
    outcome: Result<T, CpasError>,
    slot: Option<WorkerSlot>,
) {
    let handler = tokio::task::spawn_blocking(move || {
        completion.complete(outcome);
        drop(slot);
    });
    // A join error means the runtime is shutting down; the guard inside the
    // closure has already answered the handler.
    let _ = handler.await;
}

async fn fetch<T: CpasResponse>(
    http: &reqwest::Client,
    url: &str,
    limit: Duration,
) -> Result<T, CpasError> {
    let body = match tokio::time::timeout(limit, fetch_body(http, url)).await {
        Ok(body) => body?,
        Err(_) => return Err(CpasError::Timeout(limit)),
    };
    decode::<T>(&body)
}

async fn fetch_body(http: &reqwest::Client, url: &str) -> Result<String, CpasError> {
    let response = http.get(url).send().await.map_err(CpasError::network)?;
    let response = response.error_for_status().map_err(CpasError::network)?;
    response.text().await.map_err(CpasError::network)
}
