//! Acquisition through an external command.
//!
//! The command is invoked as
//! `<command...> <geojson> <start> <end> <output_path>` and replies with one
//! of:
//!
//! - `{"status": "success", "path": "..."}` (path defaults to `output_path`)
//! - `{"status": "no_valid_pixels"}`
//! - `{"status": "error", "message": "..."}`

use crate::error::MonitorError;
use crate::process::{run_json, CommandSpec};
use async_trait::async_trait;
use landwatch_cloud::{Acquisition, AcquisitionGateway, AcquisitionRequest, CloudError};
use serde_json::Value;
use std::path::PathBuf;
use tracing::info;

pub struct CommandGateway {
    spec: CommandSpec,
    work_dir: PathBuf,
    search_padding_days: i64,
}

impl CommandGateway {
    pub fn new(spec: CommandSpec, work_dir: impl Into<PathBuf>, search_padding_days: i64) -> Self {
        Self {
            spec,
            work_dir: work_dir.into(),
            search_padding_days,
        }
    }
}

fn interpret(reply: &Value, default_path: PathBuf) -> landwatch_cloud::Result<Acquisition> {
    match reply.get("status").and_then(Value::as_str) {
        Some("success") => Ok(Acquisition::Image(
            reply
                .get("path")
                .and_then(Value::as_str)
                .map(PathBuf::from)
                .unwrap_or(default_path),
        )),
        Some("no_valid_pixels") => Ok(Acquisition::NoValidPixels),
        other => Err(CloudError::InvalidResponse(format!(
            "unknown acquisition status {other:?}"
        ))),
    }
}

#[async_trait]
impl AcquisitionGateway for CommandGateway {
    async fn acquire(&self, request: &AcquisitionRequest) -> landwatch_cloud::Result<Acquisition> {
        tokio::fs::create_dir_all(&self.work_dir).await?;
        let output = self.work_dir.join(request.file_name());
        let search = request.window.padded(self.search_padding_days);

        let args = [
            request.geometry.to_geojson_string(),
            search.start.to_string(),
            search.end.to_string(),
            output.display().to_string(),
        ];
        let reply = run_json(&self.spec, &args).await.map_err(|e| match e {
            MonitorError::ProcessTimeout { program, after } => CloudError::Timeout {
                what: program,
                after,
            },
            other => CloudError::Backend(other.to_string()),
        })?;

        let acquisition = interpret(&reply, output)?;
        if let Acquisition::Image(path) = &acquisition {
            info!(aoi_id = %request.aoi_id, path = %path.display(), "image acquired");
        }
        Ok(acquisition)
    }
}
