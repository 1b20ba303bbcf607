//! Unbounded FIFO relay between admission and dispatch.
//!
//! Producers hand values to a capacity-1 inbound channel, a single reader
//! pulls them from a capacity-1 outbound channel, and a manager task keeps
//! everything in between in a `VecDeque`. A slow reader never blocks a
//! producer for longer than one handoff.
//!
//! Dropping every [`Sender`] closes the inbound side. The manager keeps
//! offering its backlog to the reader and closes the outbound side once the
//! backlog is empty, so nothing accepted before the close is lost.

use std::collections::VecDeque;
use tokio::sync::mpsc;
use tracing::debug;

/// Producer half of the relay.
#[derive(Debug)]
pub(crate) struct Sender<T> {
    inner: mpsc::Sender<T>,
}

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Sender<T> {
    /// Hand a value to the relay. Waits only while the inbound slot is
    /// occupied. Fails, returning the value, if the manager has stopped.
    pub(crate) async fn push(&self, value: T) -> Result<(), T> {
        self.inner.send(value).await.map_err(|e| e.0)
    }
}

/// Reader half of the relay.
#[derive(Debug)]
pub(crate) struct Receiver<T> {
    inner: mpsc::Receiver<T>,
}

impl<T> Receiver<T> {
    /// Next value in acceptance order, or `None` once the relay is closed
    /// and drained.
    pub(crate) async fn pull(&mut self) -> Option<T> {
        self.inner.recv().await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Inbound open: accept and offer.
    Running,
    /// Inbound closed: offer the backlog until empty.
    Draining,
}

/// Create a relay and spawn its manager task on the current runtime.
pub(crate) fn channel<T: Send + 'static>() -> (Sender<T>, Receiver<T>) {
    let (push_tx, push_rx) = mpsc::channel(1);
    let (pull_tx, pull_rx) = mpsc::channel(1);
    tokio::spawn(manage(push_rx, pull_tx));
    (Sender { inner: push_tx }, Receiver { inner: pull_rx })
}

async fn manage<T>(mut push: mpsc::Receiver<T>, pull: mpsc::Sender<T>) {
    let mut backlog = VecDeque::new();
    let mut state = State::Running;

    loop {
        if backlog.is_empty() {
            if state == State::Draining {
                break;
            }
            // Nothing to offer: wait for the next value or the close.
            match push.recv().await {
                Some(value) => backlog.push_back(value),
                None => break,
            }
            continue;
        }

        tokio::select! {
            permit = pull.reserve() => match permit {
                Ok(permit) => {
                    if let Some(value) = backlog.pop_front() {
                        permit.send(value);
                    }
                }
                Err(_) => {
                    debug!(dropped = backlog.len(), "relay reader gone");
                    return;
                }
            },
            value = push.recv(), if state == State::Running => match value {
                Some(value) => backlog.push_back(value),
                None => {
                    debug!(backlog = backlog.len(), "relay inbound closed, draining");
                    state = State::Draining;
                }
            },
        }
    }

    debug!("relay closed");
    // `pull` drops here, closing the outbound side.
}
