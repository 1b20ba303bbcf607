//! Integration tests for telemetry initialization and span helpers.

use fifo_rs::telemetry::{TelemetryConfig, init_telemetry, job, metrics};

#[test]
fn telemetry_initializes_without_endpoint() {
    // A global subscriber can only be set once per process; a second
    // init in the same binary returns Err, which is acceptable here.
    let config = TelemetryConfig {
        endpoint: None,
        service_name: "fifo-test".to_string(),
        default_filter: "debug".to_string(),
    };
    if let Ok(guard) = init_telemetry(config) {
        assert!(!guard.is_exporting());
        guard.force_flush();
    }
}

#[test]
fn job_span_records_outcome() {
    let span = job::start_job_span("worker-0", &"job-42");
    job::record_outcome(&span, "ok");
}

#[test]
fn metrics_are_noops_without_provider() {
    metrics::jobs_admitted().add(1, &[opentelemetry::KeyValue::new("result", "queued")]);
    metrics::jobs_delivered().add(1, &[]);
    metrics::jobs_finished().add(1, &[]);
    metrics::callbacks_dispatched().add(3, &[]);
    metrics::job_in_flight_ms().record(12.5, &[]);
}
