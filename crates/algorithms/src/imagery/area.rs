//! Pixel-area aggregation

use landwatch_core::{Error, GeoTransform, Result};

/// Ground area of one pixel of a 10 m export, in square meters.
pub const DEFAULT_PIXEL_AREA_SQM: f64 = 100.0;

pub const SQM_PER_HECTARE: f64 = 10_000.0;

/// Ground area represented by one pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelArea {
    square_meters: f64,
}

impl PixelArea {
    pub fn new(square_meters: f64) -> Result<Self> {
        if !square_meters.is_finite() || square_meters <= 0.0 {
            return Err(Error::InvalidParameter {
                name: "pixel_area",
                value: square_meters.to_string(),
                reason: "must be a positive, finite area in square meters".into(),
            });
        }
        Ok(Self { square_meters })
    }

    /// Pixel area from a projected geotransform.
    ///
    /// Geographic transforms have cell sizes in degrees, so callers should
    /// only use this for projected images.
    pub fn from_transform(transform: &GeoTransform) -> Result<Self> {
        Self::new(transform.pixel_area())
    }

    pub fn square_meters(&self) -> f64 {
        self.square_meters
    }

    /// Area of `pixels` pixels in hectares.
    pub fn hectares(&self, pixels: usize) -> f64 {
        pixels as f64 * self.square_meters / SQM_PER_HECTARE
    }
}

impl Default for PixelArea {
    fn default() -> Self {
        Self {
            square_meters: DEFAULT_PIXEL_AREA_SQM,
        }
    }
}

/// `part / total * 100`, or 0 for an empty total.
pub fn percentage(part: f64, total: f64) -> f64 {
    if total > 0.0 {
        part / total * 100.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_is_ten_meter_pixel() {
        let area = PixelArea::default();
        assert_relative_eq!(area.hectares(100), 1.0);
        assert_relative_eq!(area.hectares(1024 * 1024), 10_485.76);
    }

    #[test]
    fn test_rejects_non_positive() {
        assert!(PixelArea::new(0.0).is_err());
        assert!(PixelArea::new(-4.0).is_err());
        assert!(PixelArea::new(f64::NAN).is_err());
    }

    #[test]
    fn test_from_transform() {
        let t = GeoTransform::new(0.0, 0.0, 20.0, -20.0);
        assert_relative_eq!(PixelArea::from_transform(&t).unwrap().square_meters(), 400.0);
    }

    #[test]
    fn test_percentage_of_empty_total() {
        assert_eq!(percentage(3.0, 0.0), 0.0);
        assert_relative_eq!(percentage(1.0, 4.0), 25.0);
    }
}
