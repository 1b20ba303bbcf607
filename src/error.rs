//! Error types for fifo-rs.
//!
//! The queue itself reports outcomes structurally (admission returns a
//! `bool`, shutdown closes the job stream). These errors cover the
//! surrounding setup: configuration and telemetry.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
