//! Change detection between two dates
//!
//! - Change Vector Analysis (CVA): Euclidean distance between per-pixel band
//!   vectors, thresholded to a binary mask
//! - NDVI difference: `ndvi(t2) - ndvi(t1)` split into gain and loss masks
//!
//! Both detectors reject images whose band count, height or width differ,
//! and never count a NaN pixel as changed.

use super::area::{percentage, PixelArea};
use super::indices::{ndvi, NdviBands};
use crate::maybe_rayon::*;
use landwatch_core::raster::{BandImage, Raster};
use landwatch_core::{Error, Result};
use ndarray::{Array2, Zip};
use tracing::debug;

/// Magnitude threshold in native sample units (surface reflectance x 10000).
pub const DEFAULT_CVA_THRESHOLD: f64 = 30.0;

/// Parameters for change vector analysis
#[derive(Debug, Clone, Copy)]
pub struct CvaParams {
    /// Magnitude above which a pixel is changed (strictly greater)
    pub threshold: f64,
    pub pixel_area: PixelArea,
}

impl Default for CvaParams {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_CVA_THRESHOLD,
            pixel_area: PixelArea::default(),
        }
    }
}

/// Aggregate figures of a CVA run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CvaSummary {
    pub changed_pixels: usize,
    pub changed_area_ha: f64,
    pub total_area_ha: f64,
    pub percentage_change: f64,
}

#[derive(Debug, Clone)]
pub struct CvaResult {
    /// Per-pixel change magnitude, NaN where either input is NaN
    pub magnitude: Raster<f64>,
    /// 1 = changed, 0 = unchanged
    pub mask: Raster<u8>,
    pub summary: CvaSummary,
}

/// Per-pixel Euclidean norm of `after - before` over the band axis.
pub fn cva_magnitude(before: &BandImage, after: &BandImage) -> Result<Raster<f64>> {
    before.ensure_same_layout(after)?;
    ensure_not_empty(before)?;

    let (bands, rows, cols) = before.shape();
    let b = before.data();
    let a = after.data();

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = Vec::with_capacity(cols);
            for col in 0..cols {
                let sum_sq: f64 = (0..bands)
                    .map(|band| {
                        let d = a[[band, row, col]] - b[[band, row, col]];
                        d * d
                    })
                    .sum();
                row_data.push(sum_sq.sqrt());
            }
            row_data
        })
        .collect();

    let array =
        Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?;
    let mut magnitude = before.raster_like(array)?;
    magnitude.set_nodata(Some(f64::NAN));
    Ok(magnitude)
}

/// Change Vector Analysis over every band of two co-registered images.
///
/// A pixel is changed iff its magnitude strictly exceeds `params.threshold`.
/// Areas use `params.pixel_area`; the percentage is relative to the whole
/// image extent, including NaN pixels.
pub fn change_vector_analysis(
    before: &BandImage,
    after: &BandImage,
    params: &CvaParams,
) -> Result<CvaResult> {
    if !params.threshold.is_finite() || params.threshold < 0.0 {
        return Err(Error::InvalidParameter {
            name: "threshold",
            value: params.threshold.to_string(),
            reason: "CVA threshold must be a finite, non-negative magnitude".into(),
        });
    }

    let magnitude = cva_magnitude(before, after)?;
    let threshold = params.threshold;
    let mask_data = magnitude.data().mapv(|m| u8::from(m > threshold));
    let changed_pixels = mask_data.iter().filter(|&&v| v == 1).count();
    let mask = magnitude.with_same_meta(mask_data);

    let total_area_ha = params.pixel_area.hectares(magnitude.len());
    let changed_area_ha = params.pixel_area.hectares(changed_pixels);
    let summary = CvaSummary {
        changed_pixels,
        changed_area_ha,
        total_area_ha,
        percentage_change: percentage(changed_area_ha, total_area_ha),
    };
    debug!(
        changed_pixels,
        percentage = summary.percentage_change,
        threshold,
        "CVA complete"
    );

    Ok(CvaResult {
        magnitude,
        mask,
        summary,
    })
}

/// Parameters for the NDVI difference detector
#[derive(Debug, Clone, Copy)]
pub struct NdviChangeParams {
    /// Symmetric NDVI threshold; gain is `d > threshold`, loss `d < -threshold`
    pub threshold: f64,
    pub bands: NdviBands,
    pub pixel_area: PixelArea,
}

impl NdviChangeParams {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            bands: NdviBands::default(),
            pixel_area: PixelArea::default(),
        }
    }
}

/// Aggregate figures of an NDVI difference run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NdviChangeSummary {
    pub gain_pixels: usize,
    pub loss_pixels: usize,
    pub gain_area_ha: f64,
    pub loss_area_ha: f64,
    pub total_change_area_ha: f64,
    pub total_area_ha: f64,
    pub percentage_change: f64,
}

#[derive(Debug, Clone)]
pub struct NdviChangeResult {
    /// `ndvi(after) - ndvi(before)`, NaN where either index is undefined
    pub difference: Raster<f64>,
    pub gain_mask: Raster<u8>,
    pub loss_mask: Raster<u8>,
    pub summary: NdviChangeSummary,
}

impl NdviChangeResult {
    /// Single mask with 1 = gain, 2 = loss, 0 = no change.
    pub fn change_mask(&self) -> Raster<u8> {
        let mut combined = self.gain_mask.data().clone();
        Zip::from(&mut combined)
            .and(self.loss_mask.data())
            .for_each(|c, &l| {
                if l == 1 {
                    *c = 2;
                }
            });
        self.gain_mask.with_same_meta(combined)
    }
}

/// NDVI difference between two dates with symmetric gain/loss thresholds.
///
/// `threshold` must be positive and finite, which keeps gain and loss
/// disjoint. Pixels with an undefined index on either date count as neither.
pub fn ndvi_difference(
    before: &BandImage,
    after: &BandImage,
    params: &NdviChangeParams,
) -> Result<NdviChangeResult> {
    if !params.threshold.is_finite() || params.threshold <= 0.0 {
        return Err(Error::InvalidParameter {
            name: "threshold",
            value: params.threshold.to_string(),
            reason: "NDVI threshold must be positive and finite".into(),
        });
    }
    before.ensure_same_layout(after)?;
    ensure_not_empty(before)?;

    let ndvi_before = ndvi(before, params.bands)?;
    let ndvi_after = ndvi(after, params.bands)?;

    let diff_data = ndvi_after.data() - ndvi_before.data();
    let t = params.threshold;
    let gain_data = diff_data.mapv(|d| u8::from(d > t));
    let loss_data = diff_data.mapv(|d| u8::from(d < -t));
    let gain_pixels = gain_data.iter().filter(|&&v| v == 1).count();
    let loss_pixels = loss_data.iter().filter(|&&v| v == 1).count();

    let mut difference = ndvi_before.with_same_meta(diff_data);
    difference.set_nodata(Some(f64::NAN));
    let gain_mask = difference.with_same_meta(gain_data);
    let loss_mask = difference.with_same_meta(loss_data);

    let area = params.pixel_area;
    let gain_area_ha = area.hectares(gain_pixels);
    let loss_area_ha = area.hectares(loss_pixels);
    let total_change_area_ha = gain_area_ha + loss_area_ha;
    let total_area_ha = area.hectares(difference.len());
    let summary = NdviChangeSummary {
        gain_pixels,
        loss_pixels,
        gain_area_ha,
        loss_area_ha,
        total_change_area_ha,
        total_area_ha,
        percentage_change: percentage(total_change_area_ha, total_area_ha),
    };
    debug!(
        gain_pixels,
        loss_pixels,
        percentage = summary.percentage_change,
        threshold = t,
        "NDVI difference complete"
    );

    Ok(NdviChangeResult {
        difference,
        gain_mask,
        loss_mask,
        summary,
    })
}

fn ensure_not_empty(image: &BandImage) -> Result<()> {
    if image.is_empty() {
        return Err(Error::InvalidDimensions {
            width: image.width(),
            height: image.height(),
        });
    }
    Ok(())
}
