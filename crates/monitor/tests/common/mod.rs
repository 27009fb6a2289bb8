//! Test doubles shared by the monitor integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use landwatch_cloud::{Acquisition, AcquisitionGateway, AcquisitionRequest, CloudError};
use landwatch_core::io::write_band_image;
use landwatch_core::{AoiPolygon, BandImage};
use landwatch_monitor::{
    Alert, AlertSink, ChangeInference, InferenceOutput, MonitoringTask, Result as MonitorResult,
};
use ndarray::Array3;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn square() -> AoiPolygon {
    AoiPolygon::from_rings(vec![vec![
        [-70.60, -33.45],
        [-70.59, -33.45],
        [-70.59, -33.44],
        [-70.60, -33.45],
    ]])
    .unwrap()
}

pub fn task(id: &str, interval: u32, threshold: f64, last: Option<NaiveDate>) -> MonitoringTask {
    let mut t = MonitoringTask::new(id, square(), interval, threshold);
    t.last_checked_date = last;
    t
}

/// 10x10 image, (red, green, blue, nir) = (100, 80, 60, 100).
pub fn baseline_image() -> BandImage {
    BandImage::constant(10, 10, &[100.0, 80.0, 60.0, 100.0])
}

/// Baseline with the first `changed` pixels turned to (50, 80, 60, 150).
pub fn greened_image(changed: usize) -> BandImage {
    let mut data: Array3<f64> = baseline_image().data().clone();
    for i in 0..changed {
        let (row, col) = (i / 10, i % 10);
        data[[0, row, col]] = 50.0;
        data[[3, row, col]] = 150.0;
    }
    BandImage::new(data)
}

/// What the fake gateway returns for one label.
#[derive(Clone)]
pub enum Scripted {
    Image(BandImage),
    NoValidPixels,
    Fail(String),
}

/// Gateway writing scripted images into a directory, keyed by label.
pub struct ScriptedGateway {
    dir: PathBuf,
    by_label: HashMap<String, Scripted>,
    pub requests: Mutex<Vec<AcquisitionRequest>>,
}

impl ScriptedGateway {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            by_label: HashMap::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn on(mut self, label: &str, outcome: Scripted) -> Self {
        self.by_label.insert(label.to_string(), outcome);
        self
    }
}

#[async_trait]
impl AcquisitionGateway for ScriptedGateway {
    async fn acquire(&self, request: &AcquisitionRequest) -> landwatch_cloud::Result<Acquisition> {
        self.requests.lock().unwrap().push(request.clone());
        match self.by_label.get(&request.label) {
            Some(Scripted::Image(img)) => {
                let path = self.dir.join(request.file_name());
                write_band_image(img, &path)?;
                Ok(Acquisition::Image(path))
            }
            Some(Scripted::NoValidPixels) => Ok(Acquisition::NoValidPixels),
            Some(Scripted::Fail(msg)) => Err(CloudError::Backend(msg.clone())),
            None => Err(CloudError::Backend(format!("no script for {}", request.label))),
        }
    }
}

/// Inference returning a fixed percentage.
pub struct FixedInference(pub f64);

#[async_trait]
impl ChangeInference for FixedInference {
    async fn infer(&self, _before: &Path, _after: &Path) -> MonitorResult<InferenceOutput> {
        Ok(InferenceOutput {
            percentage_change: self.0,
            total_change_pixels: 0,
            change_mask_path: None,
        })
    }
}

/// Sink collecting alerts in memory.
#[derive(Clone, Default)]
pub struct RecordingSink {
    pub alerts: Arc<Mutex<Vec<Alert>>>,
}

#[async_trait]
impl AlertSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    async fn notify(&self, alert: &Alert) -> MonitorResult<()> {
        self.alerts.lock().unwrap().push(alert.clone());
        Ok(())
    }
}
