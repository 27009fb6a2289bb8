//! Error types for LandWatch core

use thiserror::Error;

/// Main error type for raster, geometry and I/O operations
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    /// Two images that must be comparable have a different layout.
    #[error(
        "Dimension mismatch: expected {eb} band(s) of {eh}x{ew}, got {ab} band(s) of {ah}x{aw}"
    )]
    DimensionMismatch {
        eb: usize,
        eh: usize,
        ew: usize,
        ab: usize,
        ah: usize,
        aw: usize,
    },

    #[error("Band {band} not available (image has {count} band(s))")]
    BandOutOfRange { band: usize, count: usize },

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("TIFF error: {0}")]
    Tiff(String),

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error is a violated precondition on the caller's input
    /// (shapes, bands, parameters, missing files) rather than a failure of the
    /// machinery itself.
    pub fn is_precondition(&self) -> bool {
        match self {
            Error::InvalidDimensions { .. }
            | Error::DimensionMismatch { .. }
            | Error::BandOutOfRange { .. }
            | Error::InvalidParameter { .. }
            | Error::InvalidGeometry(_) => true,
            Error::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Result type alias for LandWatch core operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precondition_classification() {
        let mismatch = Error::DimensionMismatch { eb: 4, eh: 5, ew: 5, ab: 4, ah: 6, aw: 5 };
        assert!(mismatch.is_precondition());

        let missing = Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert!(missing.is_precondition());

        assert!(!Error::Tiff("bad strip".into()).is_precondition());
    }
}
