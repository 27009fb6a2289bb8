//! Per-task change check.

use crate::error::{MonitorError, Result};
use crate::fusion::{fuse, ChangeSignals, FusedDecision, FusionPolicy};
use crate::inference::{ChangeInference, InferenceOutput};
use crate::report::{CvaReport, NdviReport};
use crate::task::MonitoringTask;
use chrono::NaiveDate;
use landwatch_algorithms::imagery::{
    change_vector_analysis, ndvi_difference, CvaParams, NdviBands, NdviChangeParams, PixelArea,
    DEFAULT_CVA_THRESHOLD,
};
use landwatch_cloud::{Acquisition, AcquisitionGateway, AcquisitionRequest, DateWindow};
use landwatch_core::io::{read_bands, write_mask};
use landwatch_core::BandImage;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// 1-based file bands read for detection: B4, B3, B2, B8.
const DETECTION_BANDS: [usize; 4] = [1, 2, 3, 4];

#[derive(Debug, Clone, Copy)]
pub struct DetectionSettings {
    pub cva_threshold: f64,
    pub pixel_area: PixelArea,
    pub ndvi_bands: NdviBands,
    /// Write CVA and NDVI masks next to the current image
    pub write_masks: bool,
    pub fusion: FusionPolicy,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            cva_threshold: DEFAULT_CVA_THRESHOLD,
            pixel_area: PixelArea::default(),
            ndvi_bands: NdviBands::default(),
            write_masks: false,
            fusion: FusionPolicy::default(),
        }
    }
}

/// Everything learned from one successful check.
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub aoi_id: String,
    pub baseline_window: DateWindow,
    pub current_window: DateWindow,
    pub before: PathBuf,
    pub after: PathBuf,
    pub cva: CvaReport,
    pub ndvi: NdviReport,
    pub inference: InferenceOutput,
    pub decision: FusedDecision,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub masks: Vec<PathBuf>,
}

/// Output of the two band-algebra detectors on one image pair.
#[derive(Debug, Clone)]
pub struct DetectorOutputs {
    pub cva: CvaReport,
    pub ndvi: NdviReport,
    pub masks: Vec<PathBuf>,
}

/// Read the detection bands of an image pair and check they line up.
pub fn load_pair(before: &Path, after: &Path) -> Result<(BandImage, BandImage)> {
    let t1 = read_bands(before, &DETECTION_BANDS)?;
    let t2 = read_bands(after, &DETECTION_BANDS)?;
    t1.ensure_same_layout(&t2)?;
    Ok((t1, t2))
}

fn mask_path(after: &Path, suffix: &str) -> PathBuf {
    let stem = after
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "change".to_string());
    after.with_file_name(format!("{stem}_{suffix}.tif"))
}

/// Run CVA and NDVI difference on two image files.
///
/// Blocking; the NDVI threshold is the task's threshold.
pub fn run_detectors(
    before: &Path,
    after: &Path,
    ndvi_threshold: f64,
    settings: &DetectionSettings,
) -> Result<DetectorOutputs> {
    let (t1, t2) = load_pair(before, after)?;

    let cva = change_vector_analysis(
        &t1,
        &t2,
        &CvaParams {
            threshold: settings.cva_threshold,
            pixel_area: settings.pixel_area,
        },
    )?;
    let ndvi = ndvi_difference(
        &t1,
        &t2,
        &NdviChangeParams {
            threshold: ndvi_threshold,
            bands: settings.ndvi_bands,
            pixel_area: settings.pixel_area,
        },
    )?;

    let mut masks = Vec::new();
    if settings.write_masks {
        let cva_path = mask_path(after, "cva_mask");
        write_mask(&cva.mask, &cva_path)?;
        let ndvi_path = mask_path(after, "ndvi_mask");
        write_mask(&ndvi.change_mask(), &ndvi_path)?;
        debug!(cva = %cva_path.display(), ndvi = %ndvi_path.display(), "masks written");
        masks.extend([cva_path, ndvi_path]);
    }

    Ok(DetectorOutputs {
        cva: CvaReport::new(&cva.summary, settings.cva_threshold),
        ndvi: NdviReport::new(&ndvi.summary, ndvi_threshold),
        masks,
    })
}

/// Acquire, detect, infer and fuse for one task.
pub struct ChangeWorkflow {
    gateway: Arc<dyn AcquisitionGateway>,
    inference: Arc<dyn ChangeInference>,
    settings: DetectionSettings,
}

impl ChangeWorkflow {
    pub fn new(
        gateway: Arc<dyn AcquisitionGateway>,
        inference: Arc<dyn ChangeInference>,
        settings: DetectionSettings,
    ) -> Self {
        Self {
            gateway,
            inference,
            settings,
        }
    }

    pub fn settings(&self) -> &DetectionSettings {
        &self.settings
    }

    async fn acquire(
        &self,
        task: &MonitoringTask,
        window: DateWindow,
        label: &str,
    ) -> Result<PathBuf> {
        let request = AcquisitionRequest::new(&task.aoi_id, task.geometry.clone(), window, label);
        match self.gateway.acquire(&request).await? {
            Acquisition::Image(path) => Ok(path),
            Acquisition::NoValidPixels => Err(MonitorError::NoValidPixels {
                aoi_id: task.aoi_id.clone(),
                label: label.to_string(),
                window,
            }),
        }
    }

    async fn detect(&self, before: &Path, after: &Path, ndvi_threshold: f64) -> Result<DetectorOutputs> {
        let settings = self.settings;
        let (before, after) = (before.to_path_buf(), after.to_path_buf());
        tokio::task::spawn_blocking(move || run_detectors(&before, &after, ndvi_threshold, &settings))
            .await
            .map_err(|e| MonitorError::Detector(e.to_string()))?
    }

    /// Check `task` as of `today`.
    ///
    /// Does not touch the task; the caller advances `last_checked_date` on
    /// success.
    pub async fn check(&self, task: &MonitoringTask, today: NaiveDate) -> Result<CheckReport> {
        self.compare(task, task.baseline_window(today), task.current_window(today))
            .await
    }

    /// Compare `task`'s area between two explicit windows.
    ///
    /// Used directly for one-shot checks that never enter the task store.
    pub async fn compare(
        &self,
        task: &MonitoringTask,
        baseline_window: DateWindow,
        current_window: DateWindow,
    ) -> Result<CheckReport> {
        task.validate()?;
        let before = self.acquire(task, baseline_window, "t1").await?;
        let after = self.acquire(task, current_window, "t2").await?;

        let (detected, inferred) = tokio::join!(
            self.detect(&before, &after, task.threshold),
            self.inference.infer(&before, &after),
        );
        let detected = detected?;
        let inferred = inferred?;

        let signals = ChangeSignals {
            ndvi: detected.ndvi.percentage_change,
            inference: inferred.percentage_change,
            cva: Some(detected.cva.percentage_change),
        };
        let decision = fuse(signals, task.threshold, self.settings.fusion);
        info!(
            aoi_id = %task.aoi_id,
            ndvi = signals.ndvi,
            inference = signals.inference,
            cva = detected.cva.percentage_change,
            combined = decision.combined_change_percentage,
            alerted = decision.alerted,
            "change check complete"
        );

        Ok(CheckReport {
            aoi_id: task.aoi_id.clone(),
            baseline_window,
            current_window,
            before,
            after,
            cva: detected.cva,
            ndvi: detected.ndvi,
            inference: inferred,
            decision,
            masks: detected.masks,
        })
    }
}
