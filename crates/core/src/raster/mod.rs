//! Raster data structures

mod band_image;
mod element;
mod geotransform;
mod grid;

pub use band_image::BandImage;
pub use element::RasterElement;
pub use geotransform::GeoTransform;
pub use grid::Raster;
