//! Job module.
//!
//! This module submits pipelines to the processing service and tracks the
//! resulting job until it finishes or fails.

pub mod controller;
pub mod progress;
pub mod service;
pub mod status;

pub use controller::{
    JobController, JobControllerBuilder, PROCESSING_FAILED, STATUS_CHECK_FAILED, UPLOAD_FAILED,
};
pub use progress::{ClosureProgressReporter, JobUpdate, ProgressReporter};
pub use service::{DOWNLOAD_FAILED, HttpProcessingService, ProcessingService, RemoteStatus};
pub use status::{JobId, JobSnapshot, JobStatus};
