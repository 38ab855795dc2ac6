//! Job identifiers, statuses and observable snapshots.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a processing job.
///
/// Every status has a wire name. The processing service normally reports
/// `Queued` through `Failed`; earlier statuses are accepted and discarded by
/// [`JobStatus::can_advance_to`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// No job submitted
    #[default]
    Idle,
    /// Dataset and configuration are being sent
    Uploading,
    /// Accepted by the service, waiting for a worker
    Queued,
    /// A worker is running the pipeline
    Processing,
    /// The transformed dataset is available
    Finished,
    /// Submission, polling or processing failed
    Failed,
}

impl JobStatus {
    /// Wire name, as used by the processing service.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Uploading => "uploading",
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Finished => "finished",
            Self::Failed => "failed",
        }
    }

    /// Parse a status reported by the processing service.
    pub fn parse_remote(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "idle" => Some(Self::Idle),
            "uploading" => Some(Self::Uploading),
            "queued" => Some(Self::Queued),
            "processing" => Some(Self::Processing),
            "finished" => Some(Self::Finished),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Position in the lifecycle. Both terminal statuses share the top rank.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Uploading => 1,
            Self::Queued => 2,
            Self::Processing => 3,
            Self::Finished | Self::Failed => 4,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Failed)
    }

    /// Whether a job in this status may move to `next`.
    ///
    /// Terminal statuses never change, and no status moves to a lower rank.
    pub fn can_advance_to(&self, next: JobStatus) -> bool {
        !self.is_terminal() && next.rank() >= self.rank()
    }

    /// Human-readable description of the status.
    pub fn display_message(&self) -> &'static str {
        match self {
            Self::Idle => "Waiting for a dataset",
            Self::Uploading => "Uploading file...",
            Self::Queued => "Job queued, waiting to process...",
            Self::Processing => "Processing CSV...",
            Self::Finished => "Processing complete!",
            Self::Failed => "Processing failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque job identifier assigned by the processing service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Point-in-time view of the tracked job.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JobSnapshot {
    /// Present once the service accepted the submission.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,

    pub status: JobStatus,

    /// Failure detail; present only when `status` is `Failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobSnapshot {
    pub(crate) fn uploading() -> Self {
        Self {
            job_id: None,
            status: JobStatus::Uploading,
            error: None,
        }
    }

    pub(crate) fn queued(job_id: JobId) -> Self {
        Self {
            job_id: Some(job_id),
            status: JobStatus::Queued,
            error: None,
        }
    }

    /// Mark as failed, keeping the job id if one was assigned.
    pub(crate) fn fail(&mut self, detail: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.error = Some(detail.into());
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [JobStatus; 6] = [
        JobStatus::Idle,
        JobStatus::Uploading,
        JobStatus::Queued,
        JobStatus::Processing,
        JobStatus::Finished,
        JobStatus::Failed,
    ];

    #[test]
    fn test_status_json_values() {
        for status in ALL {
            let json = serde_json::to_string(&status).expect("Should serialize");
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }

    #[test]
    fn test_parse_remote_accepts_every_status_name() {
        assert_eq!(JobStatus::parse_remote("queued"), Some(JobStatus::Queued));
        assert_eq!(JobStatus::parse_remote("Processing"), Some(JobStatus::Processing));
        assert_eq!(JobStatus::parse_remote(" finished "), Some(JobStatus::Finished));
        assert_eq!(JobStatus::parse_remote("failed"), Some(JobStatus::Failed));
        assert_eq!(JobStatus::parse_remote("idle"), Some(JobStatus::Idle));
        assert_eq!(JobStatus::parse_remote("UPLOADING"), Some(JobStatus::Uploading));
        assert_eq!(JobStatus::parse_remote("done"), None);
    }

    #[test]
    fn test_transitions_are_monotonic() {
        assert!(JobStatus::Queued.can_advance_to(JobStatus::Processing));
        assert!(JobStatus::Queued.can_advance_to(JobStatus::Finished));
        assert!(JobStatus::Processing.can_advance_to(JobStatus::Processing));
        assert!(JobStatus::Processing.can_advance_to(JobStatus::Failed));
        assert!(!JobStatus::Processing.can_advance_to(JobStatus::Queued));

        for status in ALL {
            assert!(!JobStatus::Finished.can_advance_to(status));
            assert!(!JobStatus::Failed.can_advance_to(status));
        }
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(JobStatus::Uploading.display_message(), "Uploading file...");
        assert_eq!(
            JobStatus::Queued.display_message(),
            "Job queued, waiting to process..."
        );
        assert_eq!(JobStatus::Processing.display_message(), "Processing CSV...");
        assert_eq!(JobStatus::Finished.display_message(), "Processing complete!");
    }

    #[test]
    fn test_snapshot_serialization_omits_absent_fields() {
        let json = serde_json::to_value(JobSnapshot::default()).unwrap();
        assert_eq!(json, serde_json::json!({ "status": "idle" }));

        let mut snapshot = JobSnapshot::queued(JobId::new("abc"));
        snapshot.fail("boom");
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "job_id": "abc", "status": "failed", "error": "boom" })
        );
    }
}
