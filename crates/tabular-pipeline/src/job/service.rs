//! Boundary to the external processing service.
//!
//! The [`ProcessingService`] trait abstracts the service so the controller
//! can be driven by an HTTP backend in production and by an in-process
//! implementation in tests. [`HttpProcessingService`] talks to the service
//! over its REST interface:
//!
//! | Operation | Request                          | Response                               |
//! |-----------|----------------------------------|----------------------------------------|
//! | submit    | `POST {base}/upload` (multipart) | `{"job_id": ...}` or `{"error": ...}`  |
//! | status    | `GET {base}/jobs/{id}`           | `{"status": ..., "error"?: ...}`       |
//! | download  | `GET {base}/download_csv/{id}`   | CSV text, or `{"error": ...}`          |

use super::status::{JobId, JobStatus};
use crate::config::ClientConfig;
use crate::error::{PipelineError, Result};
use crate::pipeline::WireConfig;
use crate::preview::Dataset;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::debug;

/// Detail used when the service reports a failed download without one.
pub const DOWNLOAD_FAILED: &str = "Download failed";

/// Status of a job as reported by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteStatus {
    pub status: JobStatus,
    pub error: Option<String>,
}

impl RemoteStatus {
    /// Parse a status response body.
    ///
    /// Unknown status names are rejected with [`PipelineError::Poll`].
    pub fn from_body(body: &str) -> Result<Self> {
        #[derive(Deserialize)]
        struct Body {
            status: String,
            #[serde(default)]
            error: Option<String>,
        }

        let body: Body = serde_json::from_str(body)
            .map_err(|e| PipelineError::Poll(format!("malformed status response: {}", e)))?;

        let status = JobStatus::parse_remote(&body.status)
            .ok_or_else(|| PipelineError::Poll(format!("unknown job status '{}'", body.status)))?;

        Ok(Self {
            status,
            error: body.error.filter(|e| !e.trim().is_empty()),
        })
    }
}

/// Response to a submission: either a job id or an error detail.
#[derive(Debug, Deserialize)]
struct SubmitResponse {
    #[serde(default)]
    job_id: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    error: Option<String>,
}

/// Trait for services that execute pipelines asynchronously.
///
/// Implementations must be `Send + Sync`; the controller shares one instance
/// between its owner and its polling task.
#[async_trait]
pub trait ProcessingService: Send + Sync {
    /// Submit a dataset with its pipeline configuration. Returns the job id.
    async fn submit(&self, dataset: &Dataset, config: &WireConfig) -> Result<JobId>;

    /// Fetch the current status of a job.
    async fn status(&self, job_id: &JobId) -> Result<RemoteStatus>;

    /// Fetch the transformed dataset of a finished job as CSV text.
    async fn download(&self, job_id: &JobId) -> Result<String>;

    /// Service name for logging.
    fn name(&self) -> &str;
}

/// [`ProcessingService`] backed by the service's HTTP interface.
///
/// # Example
///
/// ```rust,ignore
/// use tabular_pipeline::{ClientConfig, HttpProcessingService};
///
/// let config = ClientConfig::from_env()?;
/// let service = HttpProcessingService::new(&config)?;
/// ```
#[derive(Debug, Clone)]
pub struct HttpProcessingService {
    client: Client,
    base_url: Url,
}

impl HttpProcessingService {
    /// Create a client for the service at `config.base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL cannot be parsed or the HTTP client
    /// cannot be created.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            PipelineError::InvalidConfig(format!("invalid base URL '{}': {}", config.base_url, e))
        })?;

        if base_url.cannot_be_a_base() {
            return Err(PipelineError::InvalidConfig(format!(
                "base URL '{}' cannot carry a path",
                config.base_url
            )));
        }

        let client = Client::builder().timeout(config.request_timeout()).build()?;

        Ok(Self { client, base_url })
    }

    /// Base URL with `segments` appended, each percent-encoded.
    pub fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    pub fn upload_url(&self) -> Url {
        self.endpoint(&["upload"])
    }

    pub fn status_url(&self, job_id: &JobId) -> Url {
        self.endpoint(&["jobs", job_id.as_str()])
    }

    pub fn download_url(&self, job_id: &JobId) -> Url {
        self.endpoint(&["download_csv", job_id.as_str()])
    }
}

#[async_trait]
impl ProcessingService for HttpProcessingService {
    async fn submit(&self, dataset: &Dataset, config: &WireConfig) -> Result<JobId> {
        let file = Part::text(dataset.contents.clone())
            .file_name(dataset.file_name.clone())
            .mime_str("text/csv")?;
        let form = Form::new()
            .part("file", file)
            .text("config", config.to_json()?);

        let url = self.upload_url();
        debug!("POST {}", url);

        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| PipelineError::Submission(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| PipelineError::Submission(e.to_string()))?;

        let body: SubmitResponse = serde_json::from_str(&text).map_err(|e| {
            PipelineError::Submission(format!("unexpected response ({}): {}", status, e))
        })?;

        match (status.is_success(), body.job_id, body.error) {
            (true, Some(job_id), _) if !job_id.is_empty() => Ok(JobId::from(job_id)),
            (_, _, Some(error)) => Err(PipelineError::Submission(error)),
            _ => Err(PipelineError::Submission(format!(
                "service responded {} without a job id",
                status
            ))),
        }
    }

    async fn status(&self, job_id: &JobId) -> Result<RemoteStatus> {
        let url = self.status_url(job_id);
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PipelineError::Poll(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| PipelineError::Poll(e.to_string()))?;

        if !status.is_success() {
            let detail = error_detail(&text).unwrap_or_else(|| status.to_string());
            return Err(PipelineError::Poll(detail));
        }

        RemoteStatus::from_body(&text)
    }

    async fn download(&self, job_id: &JobId) -> Result<String> {
        let url = self.download_url(job_id);
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PipelineError::Download(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| PipelineError::Download(e.to_string()))?;

        if !status.is_success() {
            let detail = error_detail(&text).unwrap_or_else(|| DOWNLOAD_FAILED.to_string());
            return Err(PipelineError::Download(detail));
        }

        Ok(text)
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// `error` field of a JSON error body, if there is one.
fn error_detail(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .and_then(|r| r.error)
        .filter(|e| !e.trim().is_empty())
}

// Shared between the controller's owner and its polling task
static_assertions::assert_impl_all!(HttpProcessingService: Send, Sync);
