//! Spectral indices
//!
//! Normalized difference indices computed per pixel in `f64`.

use crate::maybe_rayon::*;
use landwatch_core::raster::{BandImage, Raster};
use landwatch_core::{Error, Result};
use ndarray::Array2;

/// Sums with a magnitude below this are treated as a zero denominator.
const ZERO_SUM: f64 = 1e-10;

/// Zero-based positions of the red and near-infrared bands in an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NdviBands {
    pub red: usize,
    pub nir: usize,
}

impl NdviBands {
    /// Layout of acquired images: B4 (red) first, B8 (nir) fourth.
    pub const EXPORT_LAYOUT: Self = Self { red: 0, nir: 3 };
}

impl Default for NdviBands {
    fn default() -> Self {
        Self::EXPORT_LAYOUT
    }
}

/// Compute the normalized difference between two bands:
///
/// `(band_a - band_b) / (band_a + band_b)`
///
/// Pixels where the sum is zero, or either input is NaN, are NaN in the
/// output. No error is raised for a zero denominator.
pub fn normalized_difference(band_a: &Raster<f64>, band_b: &Raster<f64>) -> Result<Raster<f64>> {
    if band_a.shape() != band_b.shape() {
        return Err(Error::DimensionMismatch {
            eb: 1,
            eh: band_a.rows(),
            ew: band_a.cols(),
            ab: 1,
            ah: band_b.rows(),
            aw: band_b.cols(),
        });
    }

    let (rows, cols) = band_a.shape();
    let a_view = band_a.view();
    let b_view = band_b.view();

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            for (col, out) in row_data.iter_mut().enumerate() {
                let a = a_view[[row, col]];
                let b = b_view[[row, col]];
                let sum = a + b;
                if sum.is_nan() || sum.abs() < ZERO_SUM {
                    continue;
                }
                *out = (a - b) / sum;
            }
            row_data
        })
        .collect();

    let array =
        Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?;
    let mut output = band_a.with_same_meta(array);
    output.set_nodata(Some(f64::NAN));
    Ok(output)
}

/// Normalized Difference Vegetation Index of one image.
///
/// `NDVI = (NIR - Red) / (NIR + Red)`
pub fn ndvi(image: &BandImage, bands: NdviBands) -> Result<Raster<f64>> {
    let nir = image.band_raster(bands.nir)?;
    let red = image.band_raster(bands.red)?;
    normalized_difference(&nir, &red)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_ndvi_export_layout() {
        // red=100, green, blue, nir=300
        let img = BandImage::constant(3, 3, &[100.0, 60.0, 40.0, 300.0]);
        let index = ndvi(&img, NdviBands::default()).unwrap();
        assert_relative_eq!(index.get(1, 1).unwrap(), 0.5);
    }

    #[test]
    fn test_zero_denominator_is_nan() {
        let img = BandImage::constant(2, 2, &[0.0, 0.0, 0.0, 0.0]);
        let index = ndvi(&img, NdviBands::default()).unwrap();
        assert!(index.data().iter().all(|v| v.is_nan()));
        assert_eq!(index.statistics().valid_count, 0);
    }

    #[test]
    fn test_missing_band() {
        let img = BandImage::constant(2, 2, &[1.0, 2.0]);
        let err = ndvi(&img, NdviBands::EXPORT_LAYOUT).unwrap_err();
        assert!(matches!(err, Error::BandOutOfRange { band: 3, count: 2 }));
    }

    #[test]
    fn test_normalized_difference_size_mismatch() {
        let a = Raster::filled(3, 3, 1.0);
        let b = Raster::filled(3, 4, 1.0);
        assert!(matches!(
            normalized_difference(&a, &b),
            Err(Error::DimensionMismatch { .. })
        ));
    }
}
