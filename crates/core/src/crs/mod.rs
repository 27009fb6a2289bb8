//! Coordinate Reference System handling

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coordinate Reference System representation
///
/// Exported imagery is tagged with an EPSG code through the GeoTIFF key
/// directory, so the code is the only identity carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CRS {
    epsg: u32,
}

impl CRS {
    /// Create a CRS from an EPSG code
    pub fn from_epsg(code: u32) -> Self {
        Self { epsg: code }
    }

    /// EPSG code
    pub fn epsg(&self) -> u32 {
        self.epsg
    }

    /// Whether the EPSG code denotes a geographic (lon/lat) system.
    ///
    /// Geographic 2D codes live in the 4000-4999 block; everything else is
    /// treated as projected.
    pub fn is_geographic(&self) -> bool {
        (4000..5000).contains(&self.epsg)
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg)
    }
}
