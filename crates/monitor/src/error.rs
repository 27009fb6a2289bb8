//! Error types for the monitor.

use landwatch_cloud::{CloudError, DateWindow};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error(transparent)]
    Core(#[from] landwatch_core::Error),

    #[error(transparent)]
    Cloud(#[from] CloudError),

    #[error("no valid pixels for {aoi_id} in {label} window {window}")]
    NoValidPixels {
        aoi_id: String,
        label: String,
        window: DateWindow,
    },

    #[error("invalid task {aoi_id}: {reason}")]
    InvalidTask { aoi_id: String, reason: String },

    #[error("task {0} already exists")]
    DuplicateTask(String),

    #[error("task {0} not found")]
    TaskNotFound(String),

    #[error("cannot access task store {path}: {source}")]
    StoreIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("task store {path} is not a valid task list: {source}")]
    StoreFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("task store is locked by another pass ({path} exists)")]
    StoreLocked { path: PathBuf },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{program} failed: {message}")]
    Process { program: String, message: String },

    #[error("{program} did not finish within {after:?}")]
    ProcessTimeout { program: String, after: Duration },

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("detector task failed: {0}")]
    Detector(String),

    #[error("alert delivery failed: {0}")]
    Alert(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MonitorError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;
    use std::io::ErrorKind;

    fn chain(err: &MonitorError) -> String {
        let mut parts = vec![err.to_string()];
        let mut source = err.source();
        while let Some(e) = source {
            parts.push(e.to_string());
            source = e.source();
        }
        parts.join(": ")
    }

    #[test]
    fn test_wrapped_errors_print_once() {
        let io = MonitorError::from(std::io::Error::new(ErrorKind::NotFound, "t2.tif missing"));
        assert_eq!(chain(&io).matches("t2.tif missing").count(), 1);

        let cloud = MonitorError::from(CloudError::from(std::io::Error::new(
            ErrorKind::PermissionDenied,
            "work dir read-only",
        )));
        assert_eq!(chain(&cloud).matches("work dir read-only").count(), 1);
    }
}
