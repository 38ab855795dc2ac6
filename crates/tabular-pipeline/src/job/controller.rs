//! Job lifecycle controller.
//!
//! Drives one job at a time through
//! `idle → uploading → queued → processing → finished | failed`:
//! submission, periodic status polling and teardown.
//!
//! Job state lives behind a mutex shared with the single polling task. The
//! polling task applies a result only while holding that lock and only if
//! its cancellation token is still live. Stopping cancels the token under
//! the same lock, so once [`JobController::stop_polling`],
//! [`JobController::reset`] or [`JobController::teardown`] returns, no
//! further poll result can change the state.

use super::progress::{ClosureProgressReporter, JobUpdate, ProgressReporter};
use super::service::{ProcessingService, RemoteStatus};
use super::status::{JobId, JobSnapshot, JobStatus};
use crate::config::{ClientConfig, DEFAULT_POLL_INTERVAL_MS};
use crate::error::{PipelineError, Result};
use crate::pipeline::WireConfig;
use crate::preview::Dataset;
use crate::result::JobResult;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Failure detail when the submission is rejected or cannot be sent.
pub const UPLOAD_FAILED: &str = "Failed to upload file";

/// Failure detail when a status check cannot be completed.
pub const STATUS_CHECK_FAILED: &str = "Failed to check job status";

/// Failure detail when the service reports a failure without one.
pub const PROCESSING_FAILED: &str = "Processing failed";

struct PollTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

struct JobState {
    snapshot: JobSnapshot,
    poll: Option<PollTask>,
    /// Bumped by every submit, reset and teardown; an in-flight submission
    /// whose epoch no longer matches is discarded.
    epoch: u64,
}

impl JobState {
    /// Cancel and detach the polling task, if any.
    fn stop_poll(&mut self) -> bool {
        match self.poll.take() {
            Some(poll) => {
                poll.token.cancel();
                poll.handle.abort();
                true
            }
            None => false,
        }
    }
}

struct Shared {
    state: Mutex<JobState>,
    updates: watch::Sender<JobSnapshot>,
    reporter: Option<Arc<dyn ProgressReporter>>,
}

impl Shared {
    /// Publish the current snapshot to watchers. Must hold the state lock.
    fn publish(&self, state: &JobState) -> JobUpdate {
        self.updates.send_replace(state.snapshot.clone());
        JobUpdate::from_snapshot(&state.snapshot)
    }

    /// Deliver an update to the reporter. Must not hold the state lock.
    fn report(&self, update: Option<JobUpdate>) {
        if let (Some(reporter), Some(update)) = (&self.reporter, update) {
            reporter.report(update);
        }
    }

    /// Apply one poll outcome. Returns whether polling should continue.
    fn apply_poll(
        &self,
        token: &CancellationToken,
        job_id: &JobId,
        outcome: Result<RemoteStatus>,
    ) -> bool {
        let (update, keep_polling) = {
            let mut state = self.state.lock();
            if token.is_cancelled() {
                debug!("Discarding stale status for job {}", job_id);
                return false;
            }

            let current = state.snapshot.status;
            match outcome {
                Ok(remote) if remote.status == current => {
                    debug!("Job {} still {}", job_id, current);
                    (None, true)
                }
                Ok(remote) if !current.can_advance_to(remote.status) => {
                    debug!(
                        "Ignoring status {} for job {} (currently {})",
                        remote.status, job_id, current
                    );
                    (None, true)
                }
                Ok(remote) => {
                    if remote.status == JobStatus::Failed {
                        let detail = remote.error.unwrap_or_else(|| PROCESSING_FAILED.to_string());
                        warn!("Job {} failed: {}", job_id, detail);
                        state.snapshot.fail(detail);
                    } else {
                        state.snapshot.status = remote.status;
                        state.snapshot.error = None;
                        if remote.status == JobStatus::Finished {
                            info!("Job {} finished", job_id);
                        } else {
                            debug!("Job {} is now {}", job_id, remote.status);
                        }
                    }

                    let terminal = remote.status.is_terminal();
                    if terminal {
                        state.stop_poll();
                    }
                    (Some(self.publish(&state)), !terminal)
                }
                Err(e) => {
                    warn!("Status check for job {} failed: {}", job_id, e);
                    state.snapshot.fail(STATUS_CHECK_FAILED);
                    state.stop_poll();
                    (Some(self.publish(&state)), false)
                }
            }
        };

        self.report(update);
        keep_polling
    }
}

/// Submits pipelines to a [`ProcessingService`] and tracks the job.
///
/// One controller tracks at most one job and owns at most one polling task.
/// Submitting again stops the previous poller first, so the most recent
/// submission always wins. Dropping the controller stops polling.
///
/// Must be used from within a tokio runtime.
///
/// # Example
///
/// ```rust,ignore
/// use tabular_pipeline::{ClientConfig, HttpProcessingService, JobController};
/// use std::sync::Arc;
///
/// let config = ClientConfig::from_env()?;
/// let controller = JobController::builder()
///     .service(Arc::new(HttpProcessingService::new(&config)?))
///     .poll_interval(config.poll_interval())
///     .on_progress(|update| println!("{}", update.message))
///     .build()?;
///
/// let snapshot = controller.submit(&dataset, &model.to_wire_config()?).await;
/// let mut updates = controller.subscribe();
/// while !updates.borrow().is_terminal() {
///     updates.changed().await?;
/// }
/// ```
pub struct JobController {
    service: Arc<dyn ProcessingService>,
    poll_interval: Duration,
    shared: Arc<Shared>,
}

static_assertions::assert_impl_all!(JobController: Send, Sync);

impl JobController {
    /// Create a new controller builder.
    pub fn builder() -> JobControllerBuilder {
        JobControllerBuilder::default()
    }

    /// Controller for `service` polling at the configured interval.
    pub fn new(service: Arc<dyn ProcessingService>, config: &ClientConfig) -> Self {
        Self::with_parts(service, config.poll_interval(), None)
    }

    fn with_parts(
        service: Arc<dyn ProcessingService>,
        poll_interval: Duration,
        reporter: Option<Arc<dyn ProgressReporter>>,
    ) -> Self {
        let (updates, _) = watch::channel(JobSnapshot::default());
        Self {
            service,
            poll_interval,
            shared: Arc::new(Shared {
                state: Mutex::new(JobState {
                    snapshot: JobSnapshot::default(),
                    poll: None,
                    epoch: 0,
                }),
                updates,
                reporter,
            }),
        }
    }

    /// Submit a dataset with its pipeline configuration.
    ///
    /// Any previous poller is stopped first. On success the job is `queued`
    /// and polling starts; the first status check happens one poll interval
    /// later. On failure the job is `failed` with detail
    /// [`UPLOAD_FAILED`] and no job id.
    ///
    /// Returns the snapshot after the submission was handled. If the
    /// controller was reset, torn down or resubmitted while the upload was
    /// in flight, its outcome is discarded and the current snapshot is
    /// returned instead.
    pub async fn submit(&self, dataset: &Dataset, config: &WireConfig) -> JobSnapshot {
        let (epoch, update) = {
            let mut state = self.shared.state.lock();
            state.stop_poll();
            state.epoch += 1;
            state.snapshot = JobSnapshot::uploading();
            (state.epoch, self.shared.publish(&state))
        };
        self.shared.report(Some(update));

        info!(
            "Submitting '{}' to {} service",
            dataset.file_name,
            self.service.name()
        );
        let outcome = self.service.submit(dataset, config).await;

        let (snapshot, update) = {
            let mut state = self.shared.state.lock();
            if state.epoch != epoch {
                debug!("Discarding outcome of superseded submission");
                return state.snapshot.clone();
            }

            match outcome {
                Ok(job_id) => {
                    info!("Job {} queued", job_id);
                    state.snapshot = JobSnapshot::queued(job_id.clone());
                    state.poll = Some(self.spawn_poll(job_id));
                }
                Err(e) => {
                    warn!("Submission failed: {}", e);
                    state.snapshot.fail(UPLOAD_FAILED);
                }
            }
            (state.snapshot.clone(), self.shared.publish(&state))
        };
        self.shared.report(Some(update));

        snapshot
    }

    fn spawn_poll(&self, job_id: JobId) -> PollTask {
        let token = CancellationToken::new();
        let handle = tokio::spawn(poll_loop(
            self.shared.clone(),
            self.service.clone(),
            job_id,
            self.poll_interval,
            token.clone(),
        ));
        PollTask { token, handle }
    }

    /// Stop periodic polling without changing the job state.
    ///
    /// No-op when no poller is running.
    pub fn stop_polling(&self) {
        if self.shared.state.lock().stop_poll() {
            debug!("Polling stopped");
        }
    }

    /// Return to `idle`, discarding the job id and error, from any state.
    pub fn reset(&self) {
        let update = {
            let mut state = self.shared.state.lock();
            state.stop_poll();
            state.epoch += 1;
            state.snapshot = JobSnapshot::default();
            self.shared.publish(&state)
        };
        self.shared.report(Some(update));
    }

    /// Stop polling and discard any in-flight submission outcome.
    ///
    /// The job state is left as it is. Called automatically on drop.
    pub fn teardown(&self) {
        let mut state = self.shared.state.lock();
        state.stop_poll();
        state.epoch += 1;
    }

    /// Current job state.
    pub fn snapshot(&self) -> JobSnapshot {
        self.shared.state.lock().snapshot.clone()
    }

    /// Receiver that observes every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<JobSnapshot> {
        self.shared.updates.subscribe()
    }

    pub fn is_polling(&self) -> bool {
        self.shared
            .state
            .lock()
            .poll
            .as_ref()
            .is_some_and(|p| !p.token.is_cancelled())
    }

    /// Fetch the transformed dataset of the finished job.
    ///
    /// # Errors
    ///
    /// [`PipelineError::RemoteFailure`] with the failure detail when the job
    /// failed; [`PipelineError::JobNotFinished`] while it is still running or
    /// was never submitted; [`PipelineError::Download`] when the service
    /// cannot provide it.
    pub async fn download_result(&self) -> Result<JobResult> {
        let snapshot = self.snapshot();
        let job_id = match (snapshot.status, snapshot.job_id) {
            (JobStatus::Finished, Some(job_id)) => job_id,
            (JobStatus::Failed, _) => {
                return Err(PipelineError::RemoteFailure(
                    snapshot
                        .error
                        .unwrap_or_else(|| PROCESSING_FAILED.to_string()),
                ));
            }
            (_, job_id) => {
                return Err(PipelineError::JobNotFinished(
                    job_id.map(|id| id.to_string()).unwrap_or_default(),
                ));
            }
        };

        let csv = self.service.download(&job_id).await?;
        info!("Downloaded result of job {} ({} bytes)", job_id, csv.len());
        Ok(JobResult::new(job_id, csv))
    }
}

impl Drop for JobController {
    fn drop(&mut self) {
        self.teardown();
    }
}

async fn poll_loop(
    shared: Arc<Shared>,
    service: Arc<dyn ProcessingService>,
    job_id: JobId,
    interval: Duration,
    token: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let outcome = tokio::select! {
            _ = token.cancelled() => break,
            outcome = service.status(&job_id) => outcome,
        };

        if !shared.apply_poll(&token, &job_id, outcome) {
            break;
        }
    }

    debug!("Polling for job {} ended", job_id);
}

/// Builder for [`JobController`].
#[derive(Default)]
pub struct JobControllerBuilder {
    service: Option<Arc<dyn ProcessingService>>,
    poll_interval: Option<Duration>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

impl JobControllerBuilder {
    /// Set the processing service. Required.
    pub fn service(mut self, service: Arc<dyn ProcessingService>) -> Self {
        self.service = Some(service);
        self
    }

    /// Set the interval between status checks. Default: 2 seconds.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Set a progress reporter for receiving job updates.
    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Set a progress callback closure.
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(JobUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    /// Build the controller.
    ///
    /// # Errors
    ///
    /// [`PipelineError::InvalidConfig`] when no service was set or the poll
    /// interval is zero.
    pub fn build(self) -> Result<JobController> {
        let service = self.service.ok_or_else(|| {
            PipelineError::InvalidConfig("job controller requires a processing service".to_string())
        })?;

        let poll_interval = self
            .poll_interval
            .unwrap_or(Duration::from_millis(DEFAULT_POLL_INTERVAL_MS));
        if poll_interval.is_zero() {
            return Err(PipelineError::InvalidConfig(
                "poll interval must be greater than zero".to_string(),
            ));
        }

        Ok(JobController::with_parts(
            service,
            poll_interval,
            self.progress_reporter,
        ))
    }
}
