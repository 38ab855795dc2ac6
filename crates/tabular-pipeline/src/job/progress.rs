//! Progress reporting for tracked jobs.
//!
//! Every observed status change is delivered to an optional
//! [`ProgressReporter`] as a [`JobUpdate`], in addition to the snapshot
//! channel exposed by [`JobController::subscribe`](super::JobController::subscribe).
//!
//! # Example
//!
//! ```rust,ignore
//! use tabular_pipeline::JobController;
//!
//! let controller = JobController::builder()
//!     .service(service)
//!     .on_progress(|update| {
//!         println!("[{}] {}", update.status, update.message);
//!     })
//!     .build()?;
//! ```

use super::status::{JobId, JobSnapshot, JobStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single observed job transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobUpdate {
    pub status: JobStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,

    /// Failure detail, present only for `failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Human-readable message describing the transition
    pub message: String,

    /// When the transition was observed
    pub timestamp: DateTime<Utc>,
}

impl JobUpdate {
    /// Build an update from a snapshot.
    ///
    /// The message is the failure detail for failed jobs and the status
    /// description otherwise.
    pub fn from_snapshot(snapshot: &JobSnapshot) -> Self {
        let message = match (&snapshot.status, &snapshot.error) {
            (JobStatus::Failed, Some(error)) => error.clone(),
            (status, _) => status.display_message().to_string(),
        };

        Self {
            status: snapshot.status,
            job_id: snapshot.job_id.clone(),
            error: snapshot.error.clone(),
            message,
            timestamp: Utc::now(),
        }
    }
}

/// Trait for receiving job updates.
///
/// Implementations must be `Send + Sync`: updates are delivered from the
/// controller's polling task as well as from the owning task. Updates are
/// delivered after the controller's internal lock is released, so a
/// reporter may call back into the controller.
pub trait ProgressReporter: Send + Sync {
    /// Called once per observed transition.
    fn report(&self, update: JobUpdate);
}

/// Wrapper that implements [`ProgressReporter`] using a closure.
pub struct ClosureProgressReporter<F>
where
    F: Fn(JobUpdate) + Send + Sync,
{
    callback: F,
}

impl<F> ClosureProgressReporter<F>
where
    F: Fn(JobUpdate) + Send + Sync,
{
    /// Creates a new closure-based progress reporter.
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for ClosureProgressReporter<F>
where
    F: Fn(JobUpdate) + Send + Sync,
{
    fn report(&self, update: JobUpdate) {
        (self.callback)(update);
    }
}

// Updates cross from the polling task to the owner's reporter
static_assertions::assert_impl_all!(JobUpdate: Send, Sync);
static_assertions::assert_impl_all!(JobSnapshot: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_update_message_follows_status() {
        let snapshot = JobSnapshot::queued(JobId::new("j1"));
        let update = JobUpdate::from_snapshot(&snapshot);
        assert_eq!(update.status, JobStatus::Queued);
        assert_eq!(update.job_id, Some(JobId::new("j1")));
        assert_eq!(update.message, "Job queued, waiting to process...");
    }

    #[test]
    fn test_update_message_uses_failure_detail() {
        let mut snapshot = JobSnapshot::uploading();
        snapshot.fail("Failed to upload file");
        let update = JobUpdate::from_snapshot(&snapshot);
        assert_eq!(update.message, "Failed to upload file");
        assert_eq!(update.error.as_deref(), Some("Failed to upload file"));
        assert!(update.job_id.is_none());
    }

    #[test]
    fn test_closure_progress_reporter() {
        let call_count = Arc::new(AtomicUsize::new(0));
        let call_count_clone = call_count.clone();

        let reporter = ClosureProgressReporter::new(move |_update| {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
        });

        reporter.report(JobUpdate::from_snapshot(&JobSnapshot::uploading()));
        reporter.report(JobUpdate::from_snapshot(&JobSnapshot::default()));

        assert_eq!(call_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_progress_reporter_across_threads() {
        let call_count = Arc::new(AtomicUsize::new(0));
        let call_count_clone = call_count.clone();

        let reporter = Arc::new(ClosureProgressReporter::new(move |_update| {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
        }));

        let reporter_clone = reporter.clone();
        let handle = std::thread::spawn(move || {
            reporter_clone.report(JobUpdate::from_snapshot(&JobSnapshot::uploading()));
        });

        handle.join().expect("Thread should not panic");
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_update_json_serialization() {
        let update = JobUpdate::from_snapshot(&JobSnapshot::queued(JobId::new("j9")));
        let json = serde_json::to_string(&update).expect("Should serialize");

        assert!(json.contains("\"status\":\"queued\""));
        assert!(json.contains("\"job_id\":\"j9\""));
        assert!(!json.contains("\"error\""));

        let deserialized: JobUpdate = serde_json::from_str(&json).expect("Should deserialize");
        assert_eq!(deserialized.status, JobStatus::Queued);
    }
}
