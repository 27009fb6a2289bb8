//! Stacked multi-band image

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use ndarray::{Array2, Array3, ArrayView2, Axis};

/// A decoded multi-band image: samples stored as `(band, row, col)` in `f64`
/// plus the georeferencing of the file it came from.
///
/// Two images of the same AOI taken at different times are only comparable
/// when [`BandImage::ensure_same_layout`] holds; detectors never truncate or
/// broadcast a mismatched pair.
#[derive(Debug, Clone)]
pub struct BandImage {
    data: Array3<f64>,
    transform: GeoTransform,
    crs: Option<CRS>,
}

impl BandImage {
    /// Wrap a `(band, row, col)` array with default georeferencing.
    pub fn new(data: Array3<f64>) -> Self {
        Self {
            data,
            transform: GeoTransform::default(),
            crs: None,
        }
    }

    /// Stack single-band arrays; every band must have the same shape.
    pub fn from_bands(bands: &[ArrayView2<'_, f64>]) -> Result<Self> {
        let first = bands.first().ok_or(Error::InvalidDimensions {
            width: 0,
            height: 0,
        })?;
        let (rows, cols) = first.dim();

        for band in bands.iter().skip(1) {
            if band.dim() != (rows, cols) {
                let (ah, aw) = band.dim();
                return Err(Error::DimensionMismatch {
                    eb: bands.len(),
                    eh: rows,
                    ew: cols,
                    ab: bands.len(),
                    ah,
                    aw,
                });
            }
        }

        let stacked = ndarray::stack(Axis(0), bands).map_err(|e| Error::Other(e.to_string()))?;
        Ok(Self::new(stacked))
    }

    /// Image where band `b` holds `values[b]` at every pixel.
    pub fn constant(rows: usize, cols: usize, values: &[f64]) -> Self {
        let mut data = Array3::zeros((values.len(), rows, cols));
        for (b, &v) in values.iter().enumerate() {
            data.index_axis_mut(Axis(0), b).fill(v);
        }
        Self::new(data)
    }

    /// Number of bands
    pub fn band_count(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    /// Image height in pixels
    pub fn height(&self) -> usize {
        self.data.len_of(Axis(1))
    }

    /// Image width in pixels
    pub fn width(&self) -> usize {
        self.data.len_of(Axis(2))
    }

    /// `(bands, rows, cols)`
    pub fn shape(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    /// Number of pixels per band
    pub fn pixel_count(&self) -> usize {
        self.height() * self.width()
    }

    /// Whether the image holds no pixels or no bands
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Zero-based view of one band
    pub fn band(&self, index: usize) -> Result<ArrayView2<'_, f64>> {
        if index >= self.band_count() {
            return Err(Error::BandOutOfRange {
                band: index,
                count: self.band_count(),
            });
        }
        Ok(self.data.index_axis(Axis(0), index))
    }

    /// New image with only the given zero-based bands, in the given order.
    pub fn select(&self, indices: &[usize]) -> Result<BandImage> {
        let views = indices
            .iter()
            .map(|&i| self.band(i))
            .collect::<Result<Vec<_>>>()?;
        let mut selected = BandImage::from_bands(&views)?;
        selected.transform = self.transform;
        selected.crs = self.crs.clone();
        Ok(selected)
    }

    /// Raw `(band, row, col)` samples
    pub fn data(&self) -> &Array3<f64> {
        &self.data
    }

    /// Get the geotransform
    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    /// Set the geotransform
    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.transform = transform;
    }

    /// Get the CRS
    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    /// Set the CRS
    pub fn set_crs(&mut self, crs: Option<CRS>) {
        self.crs = crs;
    }

    /// Fail with [`Error::DimensionMismatch`] unless `other` has the same
    /// band count, height and width.
    pub fn ensure_same_layout(&self, other: &BandImage) -> Result<()> {
        if self.shape() != other.shape() {
            let (eb, eh, ew) = self.shape();
            let (ab, ah, aw) = other.shape();
            return Err(Error::DimensionMismatch { eb, eh, ew, ab, ah, aw });
        }
        Ok(())
    }

    /// Wrap a per-pixel array with this image's georeferencing.
    pub fn raster_like<T: RasterElement>(&self, data: Array2<T>) -> Result<Raster<T>> {
        if data.dim() != (self.height(), self.width()) {
            let (ah, aw) = data.dim();
            return Err(Error::DimensionMismatch {
                eb: 1,
                eh: self.height(),
                ew: self.width(),
                ab: 1,
                ah,
                aw,
            });
        }
        let mut raster = Raster::from_array(data);
        raster.set_transform(self.transform);
        raster.set_crs(self.crs.clone());
        Ok(raster)
    }

    /// One band as a georeferenced raster
    pub fn band_raster(&self, index: usize) -> Result<Raster<f64>> {
        let band = self.band(index)?.to_owned();
        self.raster_like(band)
    }
}
