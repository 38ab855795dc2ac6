//! Error types for preview parsing, pipeline validation and job tracking.
//!
//! Parse and configuration errors are returned to the caller directly.
//! Submission and polling failures are terminal for the current job and are
//! surfaced through [`JobStatus::Failed`](crate::job::JobStatus::Failed)
//! rather than as `Err` values; the variants below still exist so the
//! service layer can describe what went wrong.
//!
//! Errors are serializable so they can be handed to a frontend as
//! `{ "code": ..., "message": ... }`.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for the pipeline client.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The uploaded payload had no non-blank lines.
    #[error("No usable rows found in uploaded data")]
    EmptyInput,

    /// The uploaded file is not a CSV file.
    #[error("Unsupported file '{0}': please select a valid CSV file")]
    UnsupportedFile(String),

    /// The pipeline configuration cannot be serialized for submission.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Transport failure or non-success response while submitting a job.
    #[error("Submission failed: {0}")]
    Submission(String),

    /// Transport failure or non-success response while polling job status.
    #[error("Status check failed: {0}")]
    Poll(String),

    /// The job failed. Carries the detail shown to the user, verbatim from the
    /// service when it reported one.
    #[error("Processing failed: {0}")]
    RemoteFailure(String),

    /// The job result was requested before the job finished.
    #[error("Job '{0}' has not finished")]
    JobNotFinished(String),

    /// The job result could not be retrieved.
    #[error("Download failed: {0}")]
    Download(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error.
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        PipelineError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Get error code for frontend handling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::EmptyInput => "EMPTY_INPUT",
            Self::UnsupportedFile(_) => "UNSUPPORTED_FILE",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::Submission(_) => "SUBMISSION_FAILED",
            Self::Poll(_) => "POLL_FAILED",
            Self::RemoteFailure(_) => "REMOTE_FAILURE",
            Self::JobNotFinished(_) => "JOB_NOT_FINISHED",
            Self::Download(_) => "DOWNLOAD_FAILED",
            Self::Io(_) => "IO_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::Http(_) => "HTTP_REQUEST_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Check if this error was raised before any job state changed.
    ///
    /// Upload and configuration problems are shown inline and can be fixed
    /// and retried; everything else ends the current job.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::EmptyInput | Self::UnsupportedFile(_) | Self::InvalidConfig(_) => true,
            Self::WithContext { source, .. } => source.is_recoverable(),
            _ => false,
        }
    }
}

impl Serialize for PipelineError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("PipelineError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| PipelineError::Polars(e).with_context(context))
    }
}
