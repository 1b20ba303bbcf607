//! # fifo-rs
//!
//! A deduplicating FIFO work queue for tokio applications.
//!
//! Producers submit identified jobs, at most one job per identifier is in
//! flight at a time, and any number of workers pull jobs from a shared
//! stream. Callers can attach callbacks that fire once the job's result is
//! reported with [`Queue::finish`]. Canceling the queue's token drains the
//! remaining jobs to the workers and then closes the stream.

pub mod config;
pub mod error;
pub mod queue;
pub mod telemetry;

pub use queue::{Callback, Job, JobId, JobReceiver, Queue, callback};
