//! Error taxonomy for the spectra listener
//!
//! Startup failures (`BrokerUnavailable`, `AuthenticationFailed`,
//! `CorruptLedger`) abort before the poll loop starts. `FetchFailed` and
//! `Transport` are handled at batch granularity with a short backoff; the
//! remaining variants are per-spectrum and leave the spectrum unmarked so it
//! is retried on a later cycle.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("broker not reachable at {url}")]
    BrokerUnavailable { url: String },

    #[error("broker rejected the API token")]
    AuthenticationFailed,

    #[error("broker query failed with status {status}: {detail}")]
    FetchFailed { status: u16, detail: String },

    #[error("request to broker failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("too few finite samples to normalize ({finite} found, need at least 2)")]
    InsufficientData { finite: usize },

    #[error("feature vector has length {actual}, model expects {expected}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("spectrum {id} is malformed: {detail}")]
    MalformedSpectrum { id: i64, detail: String },

    #[error("model inference failed: {0}")]
    Inference(String),

    #[error("ledger file {path} is unreadable or corrupt: {detail}")]
    CorruptLedger { path: PathBuf, detail: String },

    #[error("ledger I/O failed: {0}")]
    Io(#[from] std::io::Error),
}
