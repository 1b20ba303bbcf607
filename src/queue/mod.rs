//! The deduplicating FIFO queue.
//!
//! Jobs flow producer → [`Queue::add`] → relay → dispatcher →
//! [`JobReceiver`] → worker → [`Queue::finish`] → callbacks.
//!
//! At most one job per identifier is in flight: a second admission for the
//! same identifier returns `false` until the first one is finished. Jobs are
//! delivered in admission order. Cancelling the queue's token closes
//! admission, drains every job already queued to the workers, and then
//! closes the job stream.

mod dispatch;
mod ledger;
mod relay;

use opentelemetry::KeyValue;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::telemetry::metrics;
use dispatch::Dispatcher;
use ledger::{Admission, Admitted, Ledger};

/// Bounds every job identifier must meet.
pub trait JobId: Eq + Hash + Clone + Debug + Send + Sync + 'static {}

impl<T> JobId for T where T: Eq + Hash + Clone + Debug + Send + Sync + 'static {}

/// An admitted unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job<K, V> {
    pub id: K,
    pub request: V,
}

/// Completion callback. Runs once, on its own blocking thread, with the
/// response passed to [`Queue::finish`].
pub type Callback<R> = Box<dyn FnOnce(R) + Send + 'static>;

/// Box a closure as a [`Callback`].
pub fn callback<R, F>(f: F) -> Callback<R>
where
    F: FnOnce(R) + Send + 'static,
{
    Box::new(f)
}

/// A handle onto the queue's job stream.
///
/// Clone it once per worker. Every job is received by exactly one handle;
/// `recv` returns `None` once the queue has shut down and drained.
pub struct JobReceiver<K, V> {
    inner: Arc<tokio::sync::Mutex<mpsc::Receiver<Job<K, V>>>>,
}

impl<K, V> Clone for JobReceiver<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> JobReceiver<K, V> {
    /// Wait for the next job.
    pub async fn recv(&self) -> Option<Job<K, V>> {
        self.inner.lock().await.recv().await
    }
}

/// The queue. Cheap to clone; clones share the same tables and stream.
pub struct Queue<K, V, R> {
    ledger: Arc<Ledger<K, V, R>>,
    jobs: JobReceiver<K, V>,
    token: CancellationToken,
    closed: CancellationToken,
}

impl<K, V, R> Clone for Queue<K, V, R> {
    fn clone(&self) -> Self {
        Self {
            ledger: Arc::clone(&self.ledger),
            jobs: self.jobs.clone(),
            token: self.token.clone(),
            closed: self.closed.clone(),
        }
    }
}

impl<K, V, R> Queue<K, V, R>
where
    K: JobId,
    V: Clone + Send + 'static,
    R: Clone + Send + 'static,
{
    /// Create a queue and start its relay and dispatcher tasks.
    ///
    /// The queue runs under a child of `parent`: cancelling `parent` or
    /// calling [`Queue::shutdown`] shuts it down. Must be called from within
    /// a tokio runtime.
    pub fn new(parent: &CancellationToken) -> Self {
        let (relay_tx, relay_rx) = relay::channel();
        let (jobs_tx, jobs_rx) = mpsc::channel(1);

        let ledger = Arc::new(Ledger::new(relay_tx));
        let token = parent.child_token();
        let closed = CancellationToken::new();

        tokio::spawn(
            Dispatcher {
                ledger: Arc::clone(&ledger),
                ids: relay_rx,
                jobs: jobs_tx,
                token: token.clone(),
                closed: closed.clone(),
            }
            .run(),
        );

        Self {
            ledger,
            jobs: JobReceiver {
                inner: Arc::new(tokio::sync::Mutex::new(jobs_rx)),
            },
            token,
            closed,
        }
    }

    /// Queue a job, registering `callbacks` even if `id` is already in
    /// flight (they then fire when that job finishes).
    ///
    /// Returns `true` iff this call queued a new job. Returns `false`
    /// without registering anything once the queue is shut down.
    pub async fn add(
        &self,
        id: K,
        request: V,
        callbacks: impl IntoIterator<Item = Callback<R>>,
    ) -> bool {
        self.admit(id, request, callbacks, Admission::Join).await
    }

    /// Queue a job, registering `callbacks` only if this call queued it.
    ///
    /// A duplicate leaves the in-flight job's callbacks untouched.
    pub async fn add_and_close_once(
        &self,
        id: K,
        request: V,
        callbacks: impl IntoIterator<Item = Callback<R>>,
    ) -> bool {
        self.admit(id, request, callbacks, Admission::Once).await
    }

    async fn admit(
        &self,
        id: K,
        request: V,
        callbacks: impl IntoIterator<Item = Callback<R>>,
        admission: Admission,
    ) -> bool {
        let callbacks: Vec<_> = callbacks.into_iter().collect();
        let job = Job {
            id: id.clone(),
            request,
        };

        let admitted = self.ledger.admit(job, callbacks, admission).await;
        debug!(job.id = ?id, ?admission, result = admitted.as_str(), "admission");
        metrics::jobs_admitted().add(1, &[KeyValue::new("result", admitted.as_str())]);

        admitted == Admitted::Queued
    }

    /// Report the result for `id`.
    ///
    /// Removes the job so `id` can be queued again, then runs every
    /// registered callback, in registration order, each on its own thread.
    /// Does not wait for the callbacks. Safe to call when nothing was
    /// registered.
    pub async fn finish(&self, id: &K, response: R) {
        let completed = self.ledger.complete(id).await;

        let count = completed.callbacks.len();
        for callback in completed.callbacks {
            let response = response.clone();
            tokio::task::spawn_blocking(move || callback(response));
        }

        debug!(job.id = ?id, callbacks = count, "job finished");
        metrics::jobs_finished().add(1, &[]);
        metrics::callbacks_dispatched().add(count as u64, &[]);
        if let Some(elapsed) = completed.in_flight {
            metrics::job_in_flight_ms().record(elapsed.as_secs_f64() * 1_000.0, &[]);
        }
    }

    /// A handle onto the job stream for one worker.
    pub fn jobs(&self) -> JobReceiver<K, V> {
        self.jobs.clone()
    }

    /// Cancel this queue. Queued jobs are still delivered before the job
    /// stream closes.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether this queue (or its parent token) has been cancelled.
    pub fn is_shutdown(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait until the job stream has closed.
    pub async fn closed(&self) {
        self.closed.cancelled().await;
    }

    /// Number of admitted jobs not yet finished.
    pub async fn in_flight(&self) -> usize {
        self.ledger.in_flight().await
    }
}
