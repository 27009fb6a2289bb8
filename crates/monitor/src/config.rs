//! Monitor configuration from TOML.
//!
//! ```toml
//! [store]
//! path = "monitoring_tasks.json"
//!
//! [scheduler]
//! interval_secs = 300
//!
//! [detection]
//! cva_threshold = 30.0
//! write_masks = true
//! fusion = "ndvi_and_inference"
//!
//! [acquisition]
//! backend = "http"
//! base_url = "https://exports.example.org/v1"
//! token_env = "LANDWATCH_EXPORT_TOKEN"
//! work_dir = "work"
//!
//! [inference]
//! command = ["python3", "unet_inference.py"]
//!
//! [alerts]
//! jsonl_path = "alerts.jsonl"
//!
//! [alerts.email]
//! smtp_host = "smtp.example.org"
//! from = "alerts@example.org"
//! username = "alerts@example.org"
//! password_env = "LANDWATCH_SMTP_PASSWORD"
//! ```
//!
//! Every key is optional. Secrets are never stored here: `token_env` names
//! the environment variable holding the bearer token and `password_env` the
//! one holding the SMTP password.

use crate::acquire::CommandGateway;
use crate::alert::{AlertSink, JsonlAlertSink, LogAlertSink};
use crate::email::{EmailAlertSink, EmailSettings};
use crate::error::{MonitorError, Result};
use crate::fusion::FusionPolicy;
use crate::inference::{ChangeInference, CommandInference, DisabledInference};
use crate::process::CommandSpec;
use crate::store::TaskStore;
use crate::workflow::DetectionSettings;
use landwatch_algorithms::imagery::{NdviBands, PixelArea, DEFAULT_CVA_THRESHOLD, DEFAULT_PIXEL_AREA_SQM};
use landwatch_cloud::{
    AcquisitionGateway, BearerToken, CloudAuth, ExportOptions, HttpClient, HttpExportGateway, NoAuth,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub store: StoreSettings,
    pub scheduler: SchedulerSettings,
    pub detection: DetectionConfig,
    pub acquisition: AcquisitionSettings,
    pub inference: InferenceSettings,
    pub alerts: AlertSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    #[serde(default = "default_stale_lock_secs")]
    pub stale_lock_secs: u64,
}

fn default_store_path() -> PathBuf {
    PathBuf::from("monitoring_tasks.json")
}

fn default_stale_lock_secs() -> u64 {
    3600
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            stale_lock_secs: default_stale_lock_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSettings {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

fn default_interval_secs() -> u64 {
    300
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    #[serde(default = "default_cva_threshold")]
    pub cva_threshold: f64,
    #[serde(default = "default_pixel_area_sqm")]
    pub pixel_area_sqm: f64,
    /// Zero-based band positions in the acquired image
    #[serde(default = "default_red_band")]
    pub red_band: usize,
    #[serde(default = "default_nir_band")]
    pub nir_band: usize,
    #[serde(default)]
    pub write_masks: bool,
    #[serde(default)]
    pub fusion: FusionPolicy,
}

fn default_cva_threshold() -> f64 {
    DEFAULT_CVA_THRESHOLD
}

fn default_pixel_area_sqm() -> f64 {
    DEFAULT_PIXEL_AREA_SQM
}

fn default_red_band() -> usize {
    NdviBands::EXPORT_LAYOUT.red
}

fn default_nir_band() -> usize {
    NdviBands::EXPORT_LAYOUT.nir
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            cva_threshold: default_cva_threshold(),
            pixel_area_sqm: default_pixel_area_sqm(),
            red_band: default_red_band(),
            nir_band: default_nir_band(),
            write_masks: false,
            fusion: FusionPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionBackend {
    #[default]
    Http,
    Command,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionSettings {
    #[serde(default)]
    pub backend: AcquisitionBackend,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub token_env: Option<String>,
    /// argv of the acquisition command for the `command` backend
    #[serde(default)]
    pub command: Vec<String>,
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_max_poll_interval_secs")]
    pub max_poll_interval_secs: u64,
    /// Watchdog for one acquisition, including download
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
    #[serde(default = "default_search_padding_days")]
    pub search_padding_days: i64,
    #[serde(default = "default_dimensions")]
    pub dimensions: u32,
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("work")
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_poll_interval_secs() -> u64 {
    2
}

fn default_max_poll_interval_secs() -> u64 {
    60
}

fn default_deadline_secs() -> u64 {
    20 * 60
}

fn default_search_padding_days() -> i64 {
    15
}

fn default_dimensions() -> u32 {
    1024
}

impl Default for AcquisitionSettings {
    fn default() -> Self {
        Self {
            backend: AcquisitionBackend::default(),
            base_url: None,
            token_env: None,
            command: Vec::new(),
            work_dir: default_work_dir(),
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: default_max_retries(),
            poll_interval_secs: default_poll_interval_secs(),
            max_poll_interval_secs: default_max_poll_interval_secs(),
            deadline_secs: default_deadline_secs(),
            search_padding_days: default_search_padding_days(),
            dimensions: default_dimensions(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceSettings {
    /// argv of the inference command; empty disables inference
    #[serde(default)]
    pub command: Vec<String>,
    #[serde(default = "default_inference_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_inference_timeout_secs() -> u64 {
    600
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            timeout_secs: default_inference_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertSettings {
    #[serde(default)]
    pub jsonl_path: Option<PathBuf>,
    #[serde(default)]
    pub email: Option<EmailSettings>,
}

impl MonitorConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            MonitorError::Config(format!(
                "failed to read config file {}: {e}",
                path.as_ref().display()
            ))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: MonitorConfig = toml::from_str(content)
            .map_err(|e| MonitorError::Config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given and present, otherwise use defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) if p.exists() => Self::from_file(p),
            Some(p) => {
                info!(path = %p.display(), "config file not found, using defaults");
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let d = &self.detection;
        if !d.cva_threshold.is_finite() || d.cva_threshold < 0.0 {
            return Err(MonitorError::Config(format!(
                "detection.cva_threshold {} must be finite and non-negative",
                d.cva_threshold
            )));
        }
        if d.red_band == d.nir_band {
            return Err(MonitorError::Config(
                "detection.red_band and detection.nir_band must differ".into(),
            ));
        }
        PixelArea::new(d.pixel_area_sqm).map_err(|e| MonitorError::Config(e.to_string()))?;
        if self.scheduler.interval_secs == 0 {
            return Err(MonitorError::Config("scheduler.interval_secs must be positive".into()));
        }
        Ok(())
    }

    pub fn task_store(&self) -> TaskStore {
        TaskStore::new(&self.store.path)
            .with_stale_lock_after(Duration::from_secs(self.store.stale_lock_secs))
    }

    pub fn tick(&self) -> Duration {
        Duration::from_secs(self.scheduler.interval_secs)
    }

    pub fn detection_settings(&self) -> Result<DetectionSettings> {
        let d = &self.detection;
        Ok(DetectionSettings {
            cva_threshold: d.cva_threshold,
            pixel_area: PixelArea::new(d.pixel_area_sqm)?,
            ndvi_bands: NdviBands {
                red: d.red_band,
                nir: d.nir_band,
            },
            write_masks: d.write_masks,
            fusion: d.fusion,
        })
    }

    pub fn export_options(&self) -> ExportOptions {
        let a = &self.acquisition;
        ExportOptions {
            dimensions: a.dimensions,
            search_padding_days: a.search_padding_days,
            poll_interval: Duration::from_secs(a.poll_interval_secs),
            max_poll_interval: Duration::from_secs(a.max_poll_interval_secs),
            deadline: Duration::from_secs(a.deadline_secs),
            work_dir: a.work_dir.clone(),
            ..ExportOptions::default()
        }
    }

    /// Build the configured acquisition gateway.
    pub fn build_gateway(&self) -> Result<Arc<dyn AcquisitionGateway>> {
        let a = &self.acquisition;
        match a.backend {
            AcquisitionBackend::Http => {
                let base_url = a.base_url.clone().ok_or_else(|| {
                    MonitorError::Config("acquisition.base_url is required for the http backend".into())
                })?;
                let auth: Box<dyn CloudAuth> = match &a.token_env {
                    Some(var) => Box::new(BearerToken::from_env(var)?),
                    None => Box::new(NoAuth),
                };
                let http = HttpClient::new(Duration::from_secs(a.request_timeout_secs), a.max_retries)?;
                Ok(Arc::new(HttpExportGateway::new(
                    base_url,
                    http,
                    auth,
                    self.export_options(),
                )))
            }
            AcquisitionBackend::Command => {
                let spec = CommandSpec::from_argv(&a.command, Duration::from_secs(a.deadline_secs))?;
                Ok(Arc::new(CommandGateway::new(
                    spec,
                    a.work_dir.clone(),
                    a.search_padding_days,
                )))
            }
        }
    }

    /// Build the inference step; an empty command disables it.
    pub fn build_inference(&self) -> Result<Arc<dyn ChangeInference>> {
        let i = &self.inference;
        if i.command.is_empty() {
            return Ok(Arc::new(DisabledInference));
        }
        let spec = CommandSpec::from_argv(&i.command, Duration::from_secs(i.timeout_secs))?;
        Ok(Arc::new(CommandInference::new(spec)))
    }

    /// Alert sinks: the log sink always, plus JSONL and email when configured.
    pub fn build_sinks(&self) -> Result<Vec<Box<dyn AlertSink>>> {
        let mut sinks: Vec<Box<dyn AlertSink>> = vec![Box::new(LogAlertSink)];
        if let Some(path) = &self.alerts.jsonl_path {
            sinks.push(Box::new(JsonlAlertSink::new(path.clone())));
        }
        if let Some(email) = &self.alerts.email {
            sinks.push(Box::new(EmailAlertSink::from_settings(email)?));
        }
        Ok(sinks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_is_default() {
        let config = MonitorConfig::from_toml_str("").unwrap();
        assert_eq!(config.scheduler.interval_secs, 300);
        assert_eq!(config.store.path, PathBuf::from("monitoring_tasks.json"));
        assert_eq!(config.detection.cva_threshold, 30.0);
        assert_eq!(config.detection.fusion, FusionPolicy::NdviAndInference);
        assert_eq!(config.acquisition.backend, AcquisitionBackend::Http);
        assert_eq!(config.acquisition.search_padding_days, 15);
    }

    #[test]
    fn test_partial_sections() {
        let config = MonitorConfig::from_toml_str(
            r#"
            [scheduler]
            interval_secs = 60

            [detection]
            write_masks = true
            fusion = "include_spectral"

            [acquisition]
            backend = "command"
            command = ["python3", "acquire.py"]

            [alerts]
            jsonl_path = "alerts.jsonl"
            "#,
        )
        .unwrap();
        assert_eq!(config.tick(), Duration::from_secs(60));
        assert!(config.detection.write_masks);
        assert_eq!(config.detection.fusion, FusionPolicy::IncludeSpectral);
        assert_eq!(config.detection.pixel_area_sqm, 100.0);
        assert_eq!(config.acquisition.backend, AcquisitionBackend::Command);
        assert!(config.build_gateway().is_ok());
        assert_eq!(config.build_sinks().unwrap().len(), 2);
    }

    #[test]
    fn test_email_section() {
        let config = MonitorConfig::from_toml_str(
            r#"
            [alerts.email]
            smtp_host = "localhost"
            smtp_port = 2525
            security = "plain"
            from = "alerts@example.org"
            default_recipient = "ops@example.org"
            "#,
        )
        .unwrap();
        let email = config.alerts.email.as_ref().unwrap();
        assert_eq!(email.smtp_port, 2525);
        assert_eq!(email.security, crate::email::SmtpSecurity::Plain);
        assert_eq!(config.build_sinks().unwrap().len(), 2);

        let missing_secret = MonitorConfig::from_toml_str(
            r#"
            [alerts.email]
            smtp_host = "localhost"
            from = "alerts@example.org"
            username = "alerts@example.org"
            password_env = "LANDWATCH_TEST_SMTP_PASSWORD_UNSET"
            "#,
        )
        .unwrap();
        assert!(matches!(missing_secret.build_sinks(), Err(MonitorError::Config(_))));
    }

    #[test]
    fn test_invalid_values() {
        assert!(MonitorConfig::from_toml_str("[scheduler]\ninterval_secs = 0").is_err());
        assert!(MonitorConfig::from_toml_str("[detection]\ncva_threshold = -1.0").is_err());
        assert!(MonitorConfig::from_toml_str("[detection]\nred_band = 3").is_err());
        assert!(MonitorConfig::from_toml_str("[detection]\nfusion = \"median\"").is_err());
    }

    #[test]
    fn test_http_backend_needs_base_url() {
        let config = MonitorConfig::default();
        assert!(matches!(config.build_gateway(), Err(MonitorError::Config(_))));
    }

    #[test]
    fn test_disabled_inference_by_default() {
        assert!(MonitorConfig::default().build_inference().is_ok());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config =
            MonitorConfig::load_or_default(Some(Path::new("/nonexistent/landwatch.toml"))).unwrap();
        assert_eq!(config.scheduler.interval_secs, 300);
    }
}
