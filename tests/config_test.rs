use fifo_rs::config::Config;
use std::time::Duration;

const VARS: [&str; 5] = [
    "LOG_LEVEL",
    "OTEL_ENDPOINT",
    "FIFO_WORKERS",
    "FIFO_FAST_TIMEOUT_MS",
    "FIFO_SLOW_TIMEOUT_MS",
];

fn clear_env() {
    for var in VARS {
        unsafe {
            std::env::remove_var(var);
        }
    }
}

// Environment is process-global, so every case runs in one test.
#[test]
fn config_from_env() {
    clear_env();

    // Defaults
    let config = Config::from_env().unwrap();
    assert_eq!(config.log_level, "info");
    assert!(config.otel_endpoint.is_none());
    assert_eq!(config.workers, 4);
    assert_eq!(config.fast_timeout, Duration::from_secs(1));
    assert_eq!(config.slow_timeout, Duration::from_secs(10));

    // Overrides
    unsafe {
        std::env::set_var("LOG_LEVEL", "fifo_rs=debug");
        std::env::set_var("OTEL_ENDPOINT", "http://localhost:4317");
        std::env::set_var("FIFO_WORKERS", " 12 ");
        std::env::set_var("FIFO_FAST_TIMEOUT_MS", "250");
        std::env::set_var("FIFO_SLOW_TIMEOUT_MS", "5000");
    }
    let config = Config::from_env().unwrap();
    assert_eq!(config.log_level, "fifo_rs=debug");
    assert_eq!(config.otel_endpoint.as_deref(), Some("http://localhost:4317"));
    assert_eq!(config.workers, 12);
    assert_eq!(config.fast_timeout, Duration::from_millis(250));
    assert_eq!(config.slow_timeout, Duration::from_secs(5));

    // Malformed values fail fast
    unsafe {
        std::env::set_var("FIFO_WORKERS", "lots");
    }
    let err = Config::from_env().unwrap_err();
    assert!(err.to_string().contains("FIFO_WORKERS"), "{err}");

    unsafe {
        std::env::set_var("FIFO_WORKERS", "0");
    }
    assert!(Config::from_env().is_err());

    unsafe {
        std::env::set_var("FIFO_WORKERS", "2");
        std::env::set_var("FIFO_SLOW_TIMEOUT_MS", "-1");
    }
    assert!(Config::from_env().is_err());

    clear_env();
}
