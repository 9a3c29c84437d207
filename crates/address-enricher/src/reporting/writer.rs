use super::summary::{EnrichmentSummary, summarize};
use crate::csv;
use crate::error::{Result, ResultExt};
use crate::pipeline::RunOutcome;
use crate::types::{BatchStatus, ColumnMapping, Dataset};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// `<prefix>_YYYY-MM-DD.csv`
pub fn output_file_name(prefix: &str, date: NaiveDate) -> String {
    format!("{}_{}.csv", prefix, date.format("%Y-%m-%d"))
}

/// Per-batch line of a [`RunReport`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub index: usize,
    pub status: BatchStatus,
    pub size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Machine-readable account of a run, for `--json` and `--emit-report`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Timestamp when the report was generated
    pub generated_at: String,
    pub input_file: Option<String>,
    pub output_file: Option<String>,
    /// Extraction model, when the provider exposes one
    pub model: Option<String>,
    pub mapping: ColumnMapping,
    pub summary: EnrichmentSummary,
    pub duration_ms: u64,
    pub cancelled: bool,
    pub total_batches: usize,
    pub completed_batches: usize,
    pub failed_batches: usize,
    pub pending_batches: usize,
    pub batches: Vec<BatchReport>,
}

impl RunReport {
    /// Build a report from a finished run.
    pub fn from_outcome(outcome: &RunOutcome, mapping: &ColumnMapping) -> Self {
        let batches = outcome
            .batches
            .iter()
            .map(|b| BatchReport {
                index: b.index,
                status: b.status,
                size: b.len(),
                error: b.error.clone(),
            })
            .collect();

        Self {
            generated_at: Local::now().to_rfc3339(),
            input_file: None,
            output_file: None,
            model: None,
            mapping: mapping.clone(),
            summary: summarize(&outcome.dataset, mapping),
            duration_ms: outcome.duration_ms,
            cancelled: outcome.cancelled,
            total_batches: outcome.batches.len(),
            completed_batches: outcome.completed_batches(),
            failed_batches: outcome.failed_batches(),
            pending_batches: outcome.pending_batches(),
            batches,
        }
    }

    pub fn with_input_file(mut self, path: impl Into<String>) -> Self {
        self.input_file = Some(path.into());
        self
    }

    pub fn with_output_file(mut self, path: impl Into<String>) -> Self {
        self.output_file = Some(path.into());
        self
    }

    pub fn with_model(mut self, model: Option<&str>) -> Self {
        self.model = model.map(str::to_string);
        self
    }

    /// Error messages of failed batches, prefixed with the batch index.
    pub fn batch_errors(&self) -> Vec<String> {
        self.batches
            .iter()
            .filter_map(|b| b.error.as_ref().map(|e| format!("Batch {}: {}", b.index, e)))
            .collect()
    }
}

/// Writes the enriched CSV and the JSON report to an output directory.
#[derive(Debug, Clone)]
pub struct ResultWriter {
    output_dir: PathBuf,
    prefix: String,
}

impl ResultWriter {
    pub fn new(output_dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            prefix: prefix.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Path the CSV for `date` is written to.
    pub fn csv_path(&self, date: NaiveDate) -> PathBuf {
        self.output_dir.join(output_file_name(&self.prefix, date))
    }

    /// Write the dataset as `<prefix>_<today>.csv`.
    pub fn write_csv(&self, dataset: &Dataset) -> Result<PathBuf> {
        self.write_csv_dated(dataset, Local::now().date_naive())
    }

    /// Write the dataset as `<prefix>_<date>.csv`.
    pub fn write_csv_dated(&self, dataset: &Dataset, date: NaiveDate) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir).context("Failed to create output directory")?;

        let path = self.csv_path(date);
        let text = csv::serialize(&dataset.headers, &dataset.rows);
        let mut file = File::create(&path)
            .context(format!("Failed to create {}", path.display()))?;
        file.write_all(text.as_bytes())
            .context(format!("Failed to write {}", path.display()))?;

        info!("Dataset saved: {}", path.display());
        Ok(path)
    }

    /// Write the report as `<prefix>_<date>_report.json`.
    pub fn write_report(&self, report: &RunReport) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir).context("Failed to create output directory")?;

        let date = Local::now().date_naive();
        let path = self.output_dir.join(format!(
            "{}_{}_report.json",
            self.prefix,
            date.format("%Y-%m-%d")
        ));
        let mut file = File::create(&path)
            .context(format!("Failed to create {}", path.display()))?;
        file.write_all(serde_json::to_string_pretty(report)?.as_bytes())
            .context(format!("Failed to write {}", path.display()))?;

        info!("Report saved: {}", path.display());
        Ok(path)
    }
}
