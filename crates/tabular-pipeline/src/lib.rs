//! Tabular Pipeline Client Library
//!
//! Compose CSV preprocessing pipelines, validate them and run them on a
//! remote processing service.
//!
//! # Overview
//!
//! This library covers the client side of remote preprocessing:
//!
//! - **Dataset Preview**: Bounded previews of uploaded CSV text
//! - **Pipeline Model**: Typed configuration for the cleaner, type caster,
//!   encoder and scaler steps, plus their execution order
//! - **Wire Format**: Validation and conversion into the JSON configuration
//!   the processing service consumes
//! - **Job Tracking**: Submission and status polling until the job
//!   finishes or fails, with progress reporting
//! - **Results**: Download of the transformed dataset into a Polars
//!   `DataFrame`
//!
//! The transformations themselves run on the service.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use tabular_pipeline::{
//!     ClientConfig, Dataset, HttpProcessingService, JobController, PipelineModel, StepKind,
//! };
//! use tabular_pipeline::pipeline::{CleanerPatch, CleanerStrategy};
//! use std::sync::Arc;
//!
//! let dataset = Dataset::from_path("people.csv")?;
//! let mut model = PipelineModel::new();
//! model.load_preview(&dataset.preview()?);
//! model.set_step_config(CleanerPatch::default().strategy(CleanerStrategy::Median));
//! model.move_step(StepKind::Scaler, StepKind::Cleaner);
//!
//! let config = ClientConfig::from_env()?;
//! let controller = JobController::builder()
//!     .service(Arc::new(HttpProcessingService::new(&config)?))
//!     .poll_interval(config.poll_interval())
//!     .on_progress(|update| println!("[{}] {}", update.status, update.message))
//!     .build()?;
//!
//! controller.submit(&dataset, &model.to_wire_config()?).await;
//! let mut updates = controller.subscribe();
//! while !updates.borrow_and_update().is_terminal() {
//!     updates.changed().await?;
//! }
//!
//! let result = controller.download_result().await?;
//! println!("{}", result.to_dataframe()?);
//! ```
//!
//! # Wire Format
//!
//! A column selection that covers every header is sent as `null`, meaning
//! "every column at execution time". See [`pipeline::wire`].

pub mod config;
pub mod error;
pub mod job;
pub mod pipeline;
pub mod preview;
pub mod result;

// Re-exports for convenient access
pub use config::{ClientConfig, ClientConfigBuilder, ConfigValidationError};
pub use error::{PipelineError, Result as PipelineResult, ResultExt};
pub use job::{
    ClosureProgressReporter, HttpProcessingService, JobController, JobControllerBuilder, JobId,
    JobSnapshot, JobStatus, JobUpdate, ProcessingService, ProgressReporter, RemoteStatus,
};
pub use pipeline::{PipelineModel, StepConfig, StepKind, WireConfig};
pub use preview::{Dataset, DatasetPreview, split_row};
pub use result::JobResult;
