//! Export-job acquisition gateway.
//!
//! The export service accepts an AOI, a search window and a band list,
//! picks the least cloudy scene, masks cloud and shadow classes, and renders
//! a fixed-size GeoTIFF asynchronously:
//!
//! - `POST {base}/exports` with an [`ExportRequest`] returns an [`ExportJob`]
//! - `GET {base}/exports/{job_id}` returns the job's current state
//! - a `completed` job carries a `download_url` (absolute or relative to base)
//! - a `no_valid_pixels` job means the AOI is fully masked in the window

use crate::auth::CloudAuth;
use crate::error::{CloudError, Result};
use crate::gateway::{Acquisition, AcquisitionGateway, AcquisitionRequest};
use crate::http::HttpClient;
use async_trait::async_trait;
use chrono::NaiveDate;
use landwatch_core::AoiPolygon;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Body of `POST /exports`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportRequest {
    pub aoi_id: String,
    pub geometry: AoiPolygon,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub bands: Vec<String>,
    /// `"<width>x<height>"` in pixels
    pub dimensions: String,
    /// Scene classification classes to mask out (cloud, shadow, cirrus...)
    pub masked_classes: Vec<u8>,
    pub sort_by: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportState {
    Pending,
    Running,
    Completed,
    Failed,
    NoValidPixels,
}

impl ExportState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::NoValidPixels)
    }
}

/// Export job as reported by the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportJob {
    pub job_id: String,
    pub state: ExportState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Configuration for [`HttpExportGateway`].
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Bands in output order (default B4, B3, B2, B8)
    pub bands: Vec<String>,
    /// Output width and height in pixels (default 1024)
    pub dimensions: u32,
    /// Days added on both sides of the requested window (default 15)
    pub search_padding_days: i64,
    /// Scene classes masked before selection (default 1, 3, 8, 9, 10)
    pub masked_classes: Vec<u8>,
    /// First delay between status polls (default 2 s)
    pub poll_interval: Duration,
    /// Cap on the poll delay (default 60 s)
    pub max_poll_interval: Duration,
    /// Watchdog for one whole export, submit to download (default 20 min)
    pub deadline: Duration,
    /// Directory receiving downloaded images
    pub work_dir: PathBuf,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            bands: ["B4", "B3", "B2", "B8"].iter().map(|b| b.to_string()).collect(),
            dimensions: 1024,
            search_padding_days: 15,
            masked_classes: vec![1, 3, 8, 9, 10],
            poll_interval: Duration::from_secs(2),
            max_poll_interval: Duration::from_secs(60),
            deadline: Duration::from_secs(20 * 60),
            work_dir: PathBuf::from("work"),
        }
    }
}

/// Capped exponential back-off between status polls.
#[derive(Debug, Clone)]
pub struct PollBackoff {
    next: Duration,
    max: Duration,
}

impl PollBackoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            next: initial.min(max),
            max,
        }
    }

    /// Delay to wait now; doubles the following one up to the cap.
    pub fn next_delay(&mut self) -> Duration {
        let current = self.next;
        self.next = (current * 2).min(self.max);
        current
    }
}

/// [`AcquisitionGateway`] backed by a remote export service.
pub struct HttpExportGateway {
    base_url: String,
    http: HttpClient,
    auth: Box<dyn CloudAuth>,
    options: ExportOptions,
}

impl HttpExportGateway {
    pub fn new(
        base_url: impl Into<String>,
        http: HttpClient,
        auth: Box<dyn CloudAuth>,
        options: ExportOptions,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
            auth,
            options,
        }
    }

    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    /// Build the export body for `request`, padding its window.
    pub fn export_request(&self, request: &AcquisitionRequest) -> ExportRequest {
        let search = request.window.padded(self.options.search_padding_days);
        ExportRequest {
            aoi_id: request.aoi_id.clone(),
            geometry: request.geometry.clone(),
            start_date: search.start,
            end_date: search.end,
            bands: self.options.bands.clone(),
            dimensions: format!("{0}x{0}", self.options.dimensions),
            masked_classes: self.options.masked_classes.clone(),
            sort_by: "CLOUDY_PIXEL_PERCENTAGE".to_string(),
        }
    }

    /// Submit an export job.
    pub async fn submit(&self, request: &AcquisitionRequest) -> Result<ExportJob> {
        let url = format!("{}/exports", self.base_url);
        let body = self.export_request(request);
        let job: ExportJob = self.http.post_json(&url, &body, self.auth.as_ref()).await?;
        info!(
            aoi_id = %request.aoi_id,
            job_id = %job.job_id,
            window = %request.window,
            "export submitted"
        );
        Ok(job)
    }

    /// Fetch the current state of a job.
    pub async fn status(&self, job_id: &str) -> Result<ExportJob> {
        let url = format!("{}/exports/{}", self.base_url, job_id);
        self.http.get_json(&url, self.auth.as_ref()).await
    }

    /// Poll until the job reaches a terminal state.
    pub async fn wait(&self, mut job: ExportJob) -> Result<ExportJob> {
        let mut backoff = PollBackoff::new(self.options.poll_interval, self.options.max_poll_interval);
        while !job.state.is_terminal() {
            let delay = backoff.next_delay();
            debug!(job_id = %job.job_id, state = ?job.state, ?delay, "export not finished");
            tokio::time::sleep(delay).await;
            job = self.status(&job.job_id).await?;
        }
        Ok(job)
    }

    fn resolve_url(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!("{}/{}", self.base_url, url.trim_start_matches('/'))
        }
    }

    async fn run_export(&self, request: &AcquisitionRequest) -> Result<Acquisition> {
        let job = self.submit(request).await?;
        let job = self.wait(job).await?;

        match job.state {
            ExportState::NoValidPixels => {
                warn!(aoi_id = %request.aoi_id, window = %request.window, "no valid pixels in window");
                Ok(Acquisition::NoValidPixels)
            }
            ExportState::Failed => Err(CloudError::ExportFailed {
                job_id: job.job_id,
                message: job
                    .error_message
                    .unwrap_or_else(|| "no error message".to_string()),
            }),
            ExportState::Completed => {
                let url = job.download_url.as_deref().ok_or_else(|| {
                    CloudError::InvalidResponse(format!(
                        "job {} completed without a download_url",
                        job.job_id
                    ))
                })?;
                let dest = self.options.work_dir.join(request.file_name());
                self.http
                    .download_to(&self.resolve_url(url), &dest, self.auth.as_ref())
                    .await?;
                info!(aoi_id = %request.aoi_id, path = %dest.display(), "image acquired");
                Ok(Acquisition::Image(dest))
            }
            ExportState::Pending | ExportState::Running => Err(CloudError::InvalidResponse(
                format!("job {} left polling in state {:?}", job.job_id, job.state),
            )),
        }
    }
}

#[async_trait]
impl AcquisitionGateway for HttpExportGateway {
    async fn acquire(&self, request: &AcquisitionRequest) -> Result<Acquisition> {
        let deadline = self.options.deadline;
        tokio::time::timeout(deadline, self.run_export(request))
            .await
            .map_err(|_| CloudError::Timeout {
                what: format!("export for {} ({})", request.aoi_id, request.label),
                after: deadline,
            })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::NoAuth;
    use crate::window::DateWindow;

    fn gateway() -> HttpExportGateway {
        let http = HttpClient::new(Duration::from_secs(5), 0).unwrap();
        HttpExportGateway::new(
            "https://exports.example.invalid/v1/",
            http,
            Box::new(NoAuth),
            ExportOptions::default(),
        )
    }

    #[test]
    fn test_backoff_doubles_to_cap() {
        let mut b = PollBackoff::new(Duration::from_secs(2), Duration::from_secs(10));
        let delays: Vec<u64> = (0..5).map(|_| b.next_delay().as_secs()).collect();
        assert_eq!(delays, vec![2, 4, 8, 10, 10]);
    }

    #[test]
    fn test_state_wire_names() {
        let job: ExportJob =
            serde_json::from_str(r#"{"job_id":"j1","state":"no_valid_pixels"}"#).unwrap();
        assert_eq!(job.state, ExportState::NoValidPixels);
        assert!(job.state.is_terminal());
        assert!(!ExportState::Running.is_terminal());
    }

    #[test]
    fn test_export_request_pads_window() {
        let geometry =
            AoiPolygon::from_rings(vec![vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]])
                .unwrap();
        let day = NaiveDate::from_ymd_opt(2024, 5, 20).unwrap();
        let req = AcquisitionRequest::new("farm-1", geometry, DateWindow::single(day), "t1");

        let body = gateway().export_request(&req);
        assert_eq!(body.start_date, NaiveDate::from_ymd_opt(2024, 5, 5).unwrap());
        assert_eq!(body.end_date, NaiveDate::from_ymd_opt(2024, 6, 4).unwrap());
        assert_eq!(body.bands, vec!["B4", "B3", "B2", "B8"]);
        assert_eq!(body.dimensions, "1024x1024");
    }

    #[test]
    fn test_resolve_relative_download() {
        let g = gateway();
        assert_eq!(
            g.resolve_url("/files/j1.tif"),
            "https://exports.example.invalid/v1/files/j1.tif"
        );
        assert_eq!(g.resolve_url("https://cdn.invalid/a.tif"), "https://cdn.invalid/a.tif");
    }
}
