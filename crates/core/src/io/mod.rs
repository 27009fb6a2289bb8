//! GeoTIFF reading and writing
//!
//! Acquired AOI images are multi-band GeoTIFFs; change masks are written back
//! as single-band `u8` GeoTIFFs with the georeferencing of their source.

mod native;

pub use native::{
    read_band_image, read_band_image_from_buffer, read_bands, write_band_image,
    write_band_image_to_buffer, write_mask,
};
