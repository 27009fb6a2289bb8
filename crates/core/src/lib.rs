//! # LandWatch Core
//!
//! Core types and I/O shared by the LandWatch change-detection engine.
//!
//! This crate provides:
//! - `Raster<T>`: single-band georeferenced grid (index rasters, change masks)
//! - `BandImage`: stacked multi-band image `(band, row, col)` as read from disk
//! - `GeoTransform` / `CRS`: georeferencing metadata
//! - `AoiPolygon`: the GeoJSON polygon of an area of interest
//! - GeoTIFF reading and writing without GDAL

pub mod crs;
pub mod error;
pub mod io;
pub mod raster;
pub mod vector;

pub use crs::CRS;
pub use error::{Error, Result};
pub use raster::{BandImage, GeoTransform, Raster, RasterElement};
pub use vector::{AoiPolygon, BBox};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::CRS;
    pub use crate::error::{Error, Result};
    pub use crate::raster::{BandImage, GeoTransform, Raster, RasterElement};
    pub use crate::vector::{AoiPolygon, BBox};
}
