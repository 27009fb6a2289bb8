//! Neural change inference boundary.
//!
//! The model itself lives outside this crate; it is driven through the
//! [`ChangeInference`] trait and only its numeric outputs are consumed.

use crate::error::{MonitorError, Result};
use crate::process::{run_json, CommandSpec};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Result of one inference run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceOutput {
    pub percentage_change: f64,
    #[serde(default)]
    pub total_change_pixels: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_mask_path: Option<PathBuf>,
}

impl InferenceOutput {
    fn validate(self) -> Result<Self> {
        if !self.percentage_change.is_finite() || !(0.0..=100.0).contains(&self.percentage_change) {
            return Err(MonitorError::Inference(format!(
                "percentage_change {} is outside [0, 100]",
                self.percentage_change
            )));
        }
        Ok(self)
    }
}

#[async_trait]
pub trait ChangeInference: Send + Sync {
    /// Estimate change between the images at `before` and `after`.
    async fn infer(&self, before: &Path, after: &Path) -> Result<InferenceOutput>;
}

/// Stand-in used when no model is configured: always 0 % change.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledInference;

#[async_trait]
impl ChangeInference for DisabledInference {
    async fn infer(&self, _before: &Path, _after: &Path) -> Result<InferenceOutput> {
        debug!("inference disabled, reporting no change");
        Ok(InferenceOutput {
            percentage_change: 0.0,
            total_change_pixels: 0,
            change_mask_path: None,
        })
    }
}

/// Runs an external model as `<command...> <before> <after>`.
///
/// The reply is the last JSON object on stdout with at least
/// `percentage_change`; `{"status": "error", "message": ...}` is a failure.
/// A relative `change_mask_path` is resolved against the directory of
/// `after`.
#[derive(Debug, Clone)]
pub struct CommandInference {
    spec: CommandSpec,
}

impl CommandInference {
    pub fn new(spec: CommandSpec) -> Self {
        Self { spec }
    }
}

#[async_trait]
impl ChangeInference for CommandInference {
    async fn infer(&self, before: &Path, after: &Path) -> Result<InferenceOutput> {
        let reply = run_json(&self.spec, [before.as_os_str(), after.as_os_str()])
            .await
            .map_err(|e| match e {
                MonitorError::Process { message, .. } => MonitorError::Inference(message),
                other => other,
            })?;

        let mut output: InferenceOutput = serde_json::from_value(reply)
            .map_err(|e| MonitorError::Inference(format!("malformed reply: {e}")))?;
        if let (Some(mask), Some(dir)) = (&output.change_mask_path, after.parent()) {
            if mask.is_relative() {
                output.change_mask_path = Some(dir.join(mask));
            }
        }

        let output = output.validate()?;
        info!(
            percentage = output.percentage_change,
            pixels = output.total_change_pixels,
            "inference complete"
        );
        Ok(output)
    }
}
