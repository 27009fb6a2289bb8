//! # LandWatch Cloud
//!
//! Acquisition of cloud-masked, fixed-band images for an AOI and date window.
//!
//! The [`AcquisitionGateway`] trait is the seam the monitor drives; this
//! crate ships [`HttpExportGateway`], which talks to a remote export service:
//! submit an export job, poll it with capped exponential back-off under a
//! watchdog deadline, then download the resulting GeoTIFF.

pub mod auth;
pub mod error;
pub mod export;
pub mod gateway;
pub mod http;
pub mod window;

pub use auth::{BearerToken, CloudAuth, NoAuth};
pub use error::{CloudError, Result};
pub use export::{ExportJob, ExportOptions, ExportRequest, ExportState, HttpExportGateway, PollBackoff};
pub use gateway::{Acquisition, AcquisitionGateway, AcquisitionRequest};
pub use http::HttpClient;
pub use window::DateWindow;
