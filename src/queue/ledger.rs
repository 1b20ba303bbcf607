//! Job table and callback registry.
//!
//! Both tables live behind their own mutex. Whenever both are needed the
//! table lock is taken first, and every such path goes through [`Ledger`],
//! so the order cannot be violated from outside this module.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

use super::relay;
use super::{Callback, Job, JobId};

/// Which admission rule to apply when the identifier is already in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    /// Always register the callbacks, joining an in-flight job if present.
    Join,
    /// Register the callbacks only when this call queues the job.
    Once,
}

/// What an admission attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admitted {
    /// New job inserted and handed to the relay.
    Queued,
    /// Identifier already in flight.
    Duplicate,
    /// The queue is shut down; nothing was recorded.
    Closed,
}

impl Admitted {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Admitted::Queued => "queued",
            Admitted::Duplicate => "duplicate",
            Admitted::Closed => "closed",
        }
    }
}

struct Entry<K, V> {
    job: Job<K, V>,
    admitted_at: Instant,
}

struct JobTable<K, V> {
    jobs: HashMap<K, Entry<K, V>>,
    /// Inbound side of the relay. `None` once shutdown has closed it.
    relay: Option<relay::Sender<K>>,
}

/// Result of finishing a job: its callbacks, detached from the registry.
pub(crate) struct Completed<R> {
    pub(crate) callbacks: Vec<Callback<R>>,
    /// Time since admission, if the job was still in the table.
    pub(crate) in_flight: Option<Duration>,
}

pub(crate) struct Ledger<K, V, R> {
    table: tokio::sync::Mutex<JobTable<K, V>>,
    callbacks: Mutex<HashMap<K, Vec<Callback<R>>>>,
}

impl<K, V, R> Ledger<K, V, R>
where
    K: JobId,
    V: Clone + Send + 'static,
    R: Send + 'static,
{
    pub(crate) fn new(relay: relay::Sender<K>) -> Self {
        Self {
            table: tokio::sync::Mutex::new(JobTable {
                jobs: HashMap::new(),
                relay: Some(relay),
            }),
            callbacks: Mutex::new(HashMap::new()),
        }
    }

    /// Admit a job under the table lock.
    ///
    /// The lock stays held through the relay handoff so identifiers reach
    /// the relay in the same order their jobs entered the table.
    pub(crate) async fn admit(
        &self,
        job: Job<K, V>,
        callbacks: Vec<Callback<R>>,
        admission: Admission,
    ) -> Admitted {
        let mut table = self.table.lock().await;

        let Some(relay) = table.relay.clone() else {
            return Admitted::Closed;
        };

        let in_flight = table.jobs.contains_key(&job.id);
        if admission == Admission::Join || !in_flight {
            self.register(&job.id, callbacks);
        }
        if in_flight {
            return Admitted::Duplicate;
        }

        let id = job.id.clone();
        table.jobs.insert(
            id.clone(),
            Entry {
                job,
                admitted_at: Instant::now(),
            },
        );

        if let Err(id) = relay.push(id).await {
            // Relay manager is gone; undo so the identifier is not stuck
            // in flight forever.
            table.jobs.remove(&id);
            self.lock_callbacks().remove(&id);
            return Admitted::Closed;
        }

        Admitted::Queued
    }

    /// Look up the job for an identifier pulled from the relay.
    pub(crate) async fn lookup(&self, id: &K) -> Option<Job<K, V>> {
        self.table
            .lock()
            .await
            .jobs
            .get(id)
            .map(|entry| entry.job.clone())
    }

    /// Remove a job and detach its callbacks in one step.
    pub(crate) async fn complete(&self, id: &K) -> Completed<R> {
        let mut table = self.table.lock().await;
        let entry = table.jobs.remove(id);
        let callbacks = self.lock_callbacks().remove(id).unwrap_or_default();
        drop(table);

        Completed {
            callbacks,
            in_flight: entry.map(|e| e.admitted_at.elapsed()),
        }
    }

    /// Close the relay inbound side. Returns `false` if it was already closed.
    pub(crate) async fn close_relay(&self) -> bool {
        let closed = self.table.lock().await.relay.take();
        closed.is_some()
    }

    pub(crate) async fn in_flight(&self) -> usize {
        self.table.lock().await.jobs.len()
    }

    // Callers hold the table lock.
    fn register(&self, id: &K, callbacks: Vec<Callback<R>>) {
        if callbacks.is_empty() {
            return;
        }
        debug!(job.id = ?id, count = callbacks.len(), "registering callbacks");
        self.lock_callbacks()
            .entry(id.clone())
            .or_default()
            .extend(callbacks);
    }

    fn lock_callbacks(&self) -> std::sync::MutexGuard<'_, HashMap<K, Vec<Callback<R>>>> {
        // Callbacks never run under this lock, so a poisoned guard still
        // holds a consistent map.
        self.callbacks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
