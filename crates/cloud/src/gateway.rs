//! The acquisition boundary driven by the monitor.

use crate::error::Result;
use crate::window::DateWindow;
use async_trait::async_trait;
use landwatch_core::AoiPolygon;
use sha2::{Digest, Sha256};
use std::path::PathBuf;

/// Outcome of one acquisition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acquisition {
    /// Path to a multi-band GeoTIFF (bands B4, B3, B2, B8).
    Image(PathBuf),
    /// Every candidate scene is masked out over the AOI in this window.
    NoValidPixels,
}

/// What to acquire: one AOI, one date window.
#[derive(Debug, Clone)]
pub struct AcquisitionRequest {
    pub aoi_id: String,
    pub geometry: AoiPolygon,
    pub window: DateWindow,
    /// Short tag distinguishing the image, e.g. `"t1"` or `"t2"`
    pub label: String,
}

impl AcquisitionRequest {
    pub fn new(
        aoi_id: impl Into<String>,
        geometry: AoiPolygon,
        window: DateWindow,
        label: impl Into<String>,
    ) -> Self {
        Self {
            aoi_id: aoi_id.into(),
            geometry,
            window,
            label: label.into(),
        }
    }

    /// File name for the acquired image: `<aoi_id>_<digest>_<label>.tif`.
    ///
    /// Characters outside `[A-Za-z0-9_-]` in the AOI id are replaced so the
    /// id cannot escape the work directory; the digest of the raw id keeps
    /// ids that sanitize alike apart.
    pub fn file_name(&self) -> String {
        let safe: String = self
            .aoi_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        let digest = Sha256::digest(self.aoi_id.as_bytes());
        format!("{safe}_{}_{}.tif", hex::encode(&digest[..4]), self.label)
    }
}

/// Source of cloud-masked images for an AOI and date window.
#[async_trait]
pub trait AcquisitionGateway: Send + Sync {
    /// Acquire the best image in `request.window`.
    ///
    /// A fully occluded window is `Ok(Acquisition::NoValidPixels)`, not an
    /// error.
    async fn acquire(&self, request: &AcquisitionRequest) -> Result<Acquisition>;
}
