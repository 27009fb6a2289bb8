//! Error types for image acquisition.

use chrono::NaiveDate;
use std::time::Duration;
use thiserror::Error;

/// Errors produced while acquiring images.
#[derive(Error, Debug)]
pub enum CloudError {
    #[error(transparent)]
    Request(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}: {body}")]
    Status { status: u16, url: String, body: String },

    #[error("authentication error: {0}")]
    Auth(String),

    #[error("network error: {0}")]
    Network(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("export job {job_id} failed: {message}")]
    ExportFailed { job_id: String, message: String },

    #[error("{what} did not finish within {after:?}")]
    Timeout { what: String, after: Duration },

    #[error("invalid date window: {start} is after {end}")]
    InvalidWindow { start: NaiveDate, end: NaiveDate },

    #[error("acquisition backend failed: {0}")]
    Backend(String),

    #[error(transparent)]
    Core(#[from] landwatch_core::Error),
}

/// Result alias for acquisition operations.
pub type Result<T> = std::result::Result<T, CloudError>;
