//! Monitoring task model.

use chrono::{Duration, NaiveDate};
use landwatch_cloud::DateWindow;
use landwatch_core::AoiPolygon;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{MonitorError, Result};

/// First-check baseline window: `[today - 37d, today - 30d]`.
pub const FIRST_BASELINE_START_DAYS: i64 = 37;
pub const FIRST_BASELINE_END_DAYS: i64 = 30;

/// Current window: `[today - 7d, today]`.
pub const CURRENT_WINDOW_DAYS: i64 = 7;

/// Longest accepted re-check interval, about a century.
pub const MAX_INTERVAL_DAYS: u32 = 36_500;

/// One AOI under watch, as stored in the task file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringTask {
    pub aoi_id: String,
    #[serde(rename = "geojson")]
    pub geometry: AoiPolygon,
    pub monitoring_interval_days: u32,
    /// Fused change fraction in `(0, 1]` above which an alert fires
    pub threshold: f64,
    #[serde(default)]
    pub last_checked_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_recipient: Option<String>,
    /// Fields written by other tools, kept verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MonitoringTask {
    pub fn new(
        aoi_id: impl Into<String>,
        geometry: AoiPolygon,
        monitoring_interval_days: u32,
        threshold: f64,
    ) -> Self {
        Self {
            aoi_id: aoi_id.into(),
            geometry,
            monitoring_interval_days,
            threshold,
            last_checked_date: None,
            email_recipient: None,
            extra: Map::new(),
        }
    }

    /// A task is due when it was never checked, or when strictly more than
    /// `monitoring_interval_days` have passed since the last check.
    ///
    /// A next-check date beyond the calendar range is never reached, so such
    /// a task is not due.
    pub fn is_due(&self, today: NaiveDate) -> bool {
        match self.last_checked_date {
            None => true,
            Some(last) => last
                .checked_add_signed(Duration::days(i64::from(self.monitoring_interval_days)))
                .is_some_and(|next| today > next),
        }
    }

    /// Window of the reference image: the last check day, or a week a month
    /// back for a task never checked.
    pub fn baseline_window(&self, today: NaiveDate) -> DateWindow {
        match self.last_checked_date {
            Some(last) => DateWindow::single(last),
            None => DateWindow {
                start: today - Duration::days(FIRST_BASELINE_START_DAYS),
                end: today - Duration::days(FIRST_BASELINE_END_DAYS),
            },
        }
    }

    pub fn current_window(&self, today: NaiveDate) -> DateWindow {
        DateWindow::ending_at(today, CURRENT_WINDOW_DAYS)
    }

    /// Threshold as a percentage, the unit of fused change estimates.
    pub fn threshold_percentage(&self) -> f64 {
        self.threshold * 100.0
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| MonitorError::InvalidTask {
            aoi_id: self.aoi_id.clone(),
            reason,
        };

        if self.aoi_id.trim().is_empty() {
            return Err(invalid("aoi_id is empty".into()));
        }
        if self.monitoring_interval_days == 0 || self.monitoring_interval_days > MAX_INTERVAL_DAYS {
            return Err(invalid(format!(
                "monitoring_interval_days {} is outside 1..={MAX_INTERVAL_DAYS}",
                self.monitoring_interval_days
            )));
        }
        if !(self.threshold > 0.0 && self.threshold <= 1.0) {
            return Err(invalid(format!(
                "threshold {} is outside (0, 1]",
                self.threshold
            )));
        }
        self.geometry
            .validate()
            .map_err(|e| invalid(e.to_string()))?;
        Ok(())
    }
}
