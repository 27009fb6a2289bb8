//! Failure classification for a task check.
//!
//! | class          | examples                                         | reported as |
//! |----------------|--------------------------------------------------|-------------|
//! | `Precondition` | shape mismatch, missing file/band, bad threshold | failed      |
//! | `Transient`    | no cloud-free image in a window                  | skipped     |
//! | `Unexpected`   | remote errors, decode errors, timeouts           | failed      |
//!
//! In every class the task keeps its `last_checked_date`, so it stays due
//! and is retried on the next pass.

use crate::error::MonitorError;
use landwatch_cloud::CloudError;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    Precondition,
    Transient,
    Unexpected,
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Precondition => "precondition",
            Self::Transient => "transient",
            Self::Unexpected => "unexpected",
        };
        f.write_str(name)
    }
}

/// Classify an error raised while checking one task.
pub fn classify(err: &MonitorError) -> FailureClass {
    match err {
        MonitorError::NoValidPixels { .. } => FailureClass::Transient,
        MonitorError::InvalidTask { .. } | MonitorError::Config(_) => FailureClass::Precondition,
        MonitorError::Core(e) if e.is_precondition() => FailureClass::Precondition,
        MonitorError::Cloud(CloudError::Core(e)) if e.is_precondition() => {
            FailureClass::Precondition
        }
        MonitorError::Cloud(CloudError::InvalidWindow { .. }) => FailureClass::Precondition,
        _ => FailureClass::Unexpected,
    }
}
