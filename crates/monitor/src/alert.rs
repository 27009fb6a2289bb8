//! Alert sinks.

use crate::error::Result;
use crate::fusion::Signal;
use crate::task::MonitoringTask;
use crate::workflow::CheckReport;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use tracing::warn;

/// A raised change alert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub aoi_id: String,
    pub date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_recipient: Option<String>,
    pub combined_change_percentage: f64,
    pub threshold: f64,
    pub ndvi_percentage: f64,
    pub inference_percentage: f64,
    pub cva_percentage: f64,
    pub inputs: Vec<Signal>,
}

impl Alert {
    pub fn from_check(task: &MonitoringTask, report: &CheckReport) -> Self {
        Self {
            aoi_id: task.aoi_id.clone(),
            date: report.current_window.end,
            email_recipient: task.email_recipient.clone(),
            combined_change_percentage: report.decision.combined_change_percentage,
            threshold: report.decision.threshold,
            ndvi_percentage: report.ndvi.percentage_change,
            inference_percentage: report.inference.percentage_change,
            cva_percentage: report.cva.percentage_change,
            inputs: report.decision.inputs.clone(),
        }
    }
}

#[async_trait]
pub trait AlertSink: Send + Sync {
    fn name(&self) -> &str;
    async fn notify(&self, alert: &Alert) -> Result<()>;
}

/// Deliver `alert` to every sink. A failing sink is logged and skipped.
pub async fn notify_all(sinks: &[Box<dyn AlertSink>], alert: &Alert) {
    for sink in sinks {
        if let Err(e) = sink.notify(alert).await {
            warn!(sink = sink.name(), aoi_id = %alert.aoi_id, error = %e, "alert sink failed");
        }
    }
}

/// Writes each alert as a warn-level log event.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAlertSink;

#[async_trait]
impl AlertSink for LogAlertSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn notify(&self, alert: &Alert) -> Result<()> {
        warn!(
            aoi_id = %alert.aoi_id,
            date = %alert.date,
            combined = alert.combined_change_percentage,
            threshold_pct = alert.threshold * 100.0,
            recipient = alert.email_recipient.as_deref().unwrap_or("-"),
            "significant land-cover change detected"
        );
        Ok(())
    }
}

/// Appends one JSON record per alert to a file.
#[derive(Debug, Clone)]
pub struct JsonlAlertSink {
    path: PathBuf,
}

impl JsonlAlertSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl AlertSink for JsonlAlertSink {
    fn name(&self) -> &str {
        "jsonl"
    }

    async fn notify(&self, alert: &Alert) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut line = serde_json::to_string(alert)?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}
