//! Metric instrument factories for fifo-rs.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! Without a provider these are no-ops. All instruments come from the
//! `"fifo-rs"` meter.

use opentelemetry::metrics::{Counter, Histogram, Meter};

/// Returns the shared meter for fifo-rs instruments.
fn meter() -> Meter {
    opentelemetry::global::meter("fifo-rs")
}

/// Counter: admission attempts.
/// Labels: `result` ("queued" | "duplicate" | "closed").
pub fn jobs_admitted() -> Counter<u64> {
    meter()
        .u64_counter("fifo.jobs.admitted")
        .with_description("Number of job admission attempts")
        .build()
}

/// Counter: jobs handed to a worker.
/// Labels: `state` ("running" | "draining").
pub fn jobs_delivered() -> Counter<u64> {
    meter()
        .u64_counter("fifo.jobs.delivered")
        .with_description("Number of jobs delivered to workers")
        .build()
}

/// Counter: finish calls.
pub fn jobs_finished() -> Counter<u64> {
    meter()
        .u64_counter("fifo.jobs.finished")
        .with_description("Number of jobs finished")
        .build()
}

/// Counter: callbacks spawned by finish.
pub fn callbacks_dispatched() -> Counter<u64> {
    meter()
        .u64_counter("fifo.callbacks.dispatched")
        .with_description("Number of completion callbacks dispatched")
        .build()
}

/// Histogram: time from admission to finish in milliseconds.
pub fn job_in_flight_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("fifo.job.in_flight_ms")
        .with_description("Time a job spends between admission and finish")
        .with_unit("ms")
        .build()
}
