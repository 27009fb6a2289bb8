//! # LandWatch Monitor
//!
//! Periodic land-cover change monitoring of areas of interest.
//!
//! Each pass of the [`Scheduler`] loads the [`TaskStore`], decides which
//! [`MonitoringTask`]s are due, and for each one runs the [`ChangeWorkflow`]:
//! acquire a baseline and a current image, run CVA and NDVI difference on the
//! blocking pool while the inference step runs concurrently, fuse the change
//! percentages and raise an alert above the task's threshold. The store is
//! rewritten atomically at the end of every pass.
//!
//! Failures are classified by [`policy::classify`]: a fully occluded window is
//! transient and leaves the task's `last_checked_date` untouched, exactly like
//! any other failure; nothing a single task does stops the pass.

pub mod acquire;
pub mod alert;
pub mod clock;
pub mod config;
pub mod email;
pub mod error;
pub mod fusion;
pub mod inference;
pub mod policy;
pub mod process;
pub mod report;
pub mod scheduler;
pub mod store;
pub mod task;
pub mod workflow;

pub use alert::{notify_all, Alert, AlertSink, JsonlAlertSink, LogAlertSink};
pub use email::{render_email, EmailAlertSink, EmailSettings, SmtpSecurity};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::MonitorConfig;
pub use error::{MonitorError, Result};
pub use fusion::{fuse, ChangeSignals, FusedDecision, FusionPolicy, Signal};
pub use inference::{ChangeInference, CommandInference, DisabledInference, InferenceOutput};
pub use policy::{classify, FailureClass};
pub use scheduler::{PassReport, Scheduler, TaskOutcome, TaskResult};
pub use store::TaskStore;
pub use task::MonitoringTask;
pub use workflow::{ChangeWorkflow, CheckReport, DetectionSettings};
