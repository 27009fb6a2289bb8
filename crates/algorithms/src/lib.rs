//! # LandWatch Algorithms
//!
//! Deterministic band-algebra change detectors.
//!
//! - **imagery::indices**: normalized difference and NDVI over a [`BandImage`]
//! - **imagery::change_detection**: change vector analysis (CVA) and NDVI
//!   difference with gain/loss masks
//! - **imagery::area**: pixel-area aggregation to hectares and percentages
//!
//! [`BandImage`]: landwatch_core::BandImage

pub mod imagery;
mod maybe_rayon;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::imagery::{
        change_vector_analysis, cva_magnitude, ndvi, ndvi_difference, normalized_difference,
        CvaParams, CvaResult, CvaSummary, NdviBands, NdviChangeParams, NdviChangeResult,
        NdviChangeSummary, PixelArea, EXPORT_BANDS,
    };
    pub use landwatch_core::prelude::*;
}
