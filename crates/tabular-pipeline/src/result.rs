//! Transformed datasets of finished jobs.

use crate::error::{Result, ResultExt};
use crate::job::JobId;
use polars::io::csv::read::{CsvParseOptions, CsvReadOptions};
use polars::prelude::*;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// CSV payload downloaded for a finished job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobResult {
    job_id: JobId,
    csv: String,
}

impl JobResult {
    pub fn new(job_id: JobId, csv: impl Into<String>) -> Self {
        Self {
            job_id,
            csv: csv.into(),
        }
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Raw CSV text as returned by the service.
    pub fn csv(&self) -> &str {
        &self.csv
    }

    /// File name the result is saved under: `output_{job_id}.csv`.
    pub fn file_name(&self) -> String {
        format!("output_{}.csv", self.job_id)
    }

    /// Load the CSV payload into a DataFrame.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let df = CsvReadOptions::default()
            .with_infer_schema_length(Some(100))
            .with_has_header(true)
            .with_parse_options(CsvParseOptions::default().with_quote_char(Some(b'"')))
            .into_reader_with_file_handle(Cursor::new(self.csv.clone()))
            .finish()
            .context(format!("Failed to parse result of job {}", self.job_id))?;

        debug!(
            "Loaded result of job {}: {} rows x {} columns",
            self.job_id,
            df.height(),
            df.width()
        );
        Ok(df)
    }

    /// Write the payload verbatim into `dir`. Returns the written path.
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        let path = dir.join(self.file_name());
        std::fs::write(&path, &self.csv)?;
        info!("Saved result of job {} to {}", self.job_id, path.display());
        Ok(path)
    }
}
