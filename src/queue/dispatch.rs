//! Dispatcher: moves identifiers from the relay to the job stream.

use opentelemetry::KeyValue;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::ledger::Ledger;
use super::relay;
use super::{Job, JobId};
use crate::telemetry::metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Waiting on cancellation or the next identifier.
    Running,
    /// Relay inbound closed; delivering what is left.
    Draining,
}

pub(crate) struct Dispatcher<K, V, R> {
    pub(crate) ledger: Arc<Ledger<K, V, R>>,
    pub(crate) ids: relay::Receiver<K>,
    pub(crate) jobs: mpsc::Sender<Job<K, V>>,
    pub(crate) token: CancellationToken,
    /// Cancelled once the job stream is closed.
    pub(crate) closed: CancellationToken,
}

impl<K, V, R> Dispatcher<K, V, R>
where
    K: JobId,
    V: Clone + Send + 'static,
    R: Send + 'static,
{
    pub(crate) async fn run(mut self) {
        let mut state = State::Running;

        loop {
            let next = match state {
                State::Running => tokio::select! {
                    _ = self.token.cancelled() => {
                        self.ledger.close_relay().await;
                        info!("queue cancelled, draining relay");
                        state = State::Draining;
                        continue;
                    }
                    id = self.ids.pull() => id,
                },
                State::Draining => self.ids.pull().await,
            };

            let Some(id) = next else {
                break;
            };

            let Some(job) = self.ledger.lookup(&id).await else {
                // Finished before it was delivered.
                warn!(job.id = ?id, "queued job missing from table, skipping");
                continue;
            };

            debug!(job.id = ?id, "delivering job");
            if self.jobs.send(job).await.is_err() {
                warn!("job stream has no receivers, stopping dispatch");
                break;
            }
            metrics::jobs_delivered().add(1, &[KeyValue::new("state", state.as_str())]);
        }

        // Dropping the sender closes the stream for every consumer.
        drop(self.jobs);
        self.closed.cancel();
        info!("job stream closed");
    }
}

impl State {
    fn as_str(self) -> &'static str {
        match self {
            State::Running => "running",
            State::Draining => "draining",
        }
    }
}
