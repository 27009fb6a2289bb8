//! JSON shapes of detector results.
//!
//! The same summaries are printed by `landwatch detect` and embedded in pass
//! reports:
//!
//! ```json
//! {"status":"success","summary":{"method":"ndvi","threshold":0.1,...}}
//! {"status":"error","message":"..."}
//! ```

use landwatch_algorithms::imagery::{CvaSummary, NdviChangeSummary, EXPORT_BANDS};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CvaReport {
    pub threshold: f64,
    pub bands_used: Vec<String>,
    pub changed_pixels: usize,
    pub changed_area_ha: f64,
    pub total_aoi_area_ha: f64,
    pub percentage_change: f64,
}

impl CvaReport {
    pub fn new(summary: &CvaSummary, threshold: f64) -> Self {
        Self {
            threshold,
            bands_used: EXPORT_BANDS.iter().map(|b| b.to_string()).collect(),
            changed_pixels: summary.changed_pixels,
            changed_area_ha: summary.changed_area_ha,
            total_aoi_area_ha: summary.total_area_ha,
            percentage_change: summary.percentage_change,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NdviReport {
    pub threshold: f64,
    pub gain_pixels: usize,
    pub loss_pixels: usize,
    pub gain_area_ha: f64,
    pub loss_area_ha: f64,
    pub total_change_area_ha: f64,
    pub total_aoi_area_ha: f64,
    pub percentage_change: f64,
}

impl NdviReport {
    pub fn new(summary: &NdviChangeSummary, threshold: f64) -> Self {
        Self {
            threshold,
            gain_pixels: summary.gain_pixels,
            loss_pixels: summary.loss_pixels,
            gain_area_ha: summary.gain_area_ha,
            loss_area_ha: summary.loss_area_ha,
            total_change_area_ha: summary.total_change_area_ha,
            total_aoi_area_ha: summary.total_area_ha,
            percentage_change: summary.percentage_change,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum DetectorSummary {
    Cva(CvaReport),
    Ndvi(NdviReport),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DetectorReport {
    Success { summary: DetectorSummary },
    Error { message: String },
}

impl DetectorReport {
    pub fn success(summary: DetectorSummary) -> Self {
        Self::Success { summary }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Single-line JSON.
    pub fn to_json_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"status":"error","message":"cannot encode report: {e}"}}"#)
        })
    }
}
