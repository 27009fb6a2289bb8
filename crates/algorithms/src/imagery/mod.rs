//! Imagery change detection
//!
//! - Spectral indices: generic normalized difference, NDVI
//! - Change detection: CVA magnitude and NDVI difference
//! - Area: pixel counts to hectares

mod area;
mod change_detection;
mod indices;

pub use area::{percentage, PixelArea, DEFAULT_PIXEL_AREA_SQM, SQM_PER_HECTARE};
pub use change_detection::{
    change_vector_analysis, cva_magnitude, ndvi_difference, CvaParams, CvaResult, CvaSummary,
    NdviChangeParams, NdviChangeResult, NdviChangeSummary, DEFAULT_CVA_THRESHOLD,
};
pub use indices::{ndvi, normalized_difference, NdviBands};

/// Band names of an acquired image, in file order.
///
/// The acquisition layer exports red, green, blue and near-infrared; band
/// positions used by the detectors refer to this layout.
pub const EXPORT_BANDS: [&str; 4] = ["B4", "B3", "B2", "B8"];
