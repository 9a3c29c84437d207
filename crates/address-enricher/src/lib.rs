//! Address Enrichment Library
//!
//! Fills in the district (kecamatan) and sub-district (kelurahan/desa)
//! columns of an address CSV by sending the addresses, in small batches, to
//! an LLM chat endpoint and merging the answers back by identifier.
//!
//! # Overview
//!
//! - **CSV Codec**: naive comma splitting and quoting, see [`csv`]
//! - **Column Mapping**: keyword detection with manual override, see [`mapper`]
//! - **Batch Planning**: fixed-size batches of rows with an address, see [`planner`]
//! - **Extraction**: the [`ai::AddressExtractor`] trait and an OpenAI client
//! - **Orchestration**: a sequential run with per-batch status, delay,
//!   retries, progress reporting and cancellation, see [`Orchestrator`]
//! - **Reporting**: success rate, dated CSV output and JSON reports
//! - **Credentials**: keychain, file, memory or environment secret stores
//! - **Session**: the upload-to-download wizard in [`Session`]
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use address_enricher::{Orchestrator, Session, CancellationToken};
//! use address_enricher::ai::OpenAiExtractor;
//! use address_enricher::credentials::KeyringSecretStore;
//! use address_enricher::mapper::PartialMapping;
//! use std::sync::Arc;
//!
//! let mut session = Session::new(Arc::new(KeyringSecretStore::default()))?;
//! if session.credential().is_none() {
//!     session.submit_credential(&api_key)?;
//! }
//!
//! session.upload("customers.csv", &text)?;
//! session.confirm_mapping(&PartialMapping::default())?;
//! println!("{:?}", session.preview()?);
//!
//! let extractor = Arc::new(OpenAiExtractor::new(session.credential().unwrap_or_default())?);
//! let token = CancellationToken::new();
//! let orchestrator = Orchestrator::builder()
//!     .extractor(extractor)
//!     .cancellation_token(token.clone())
//!     .on_progress(|update| println!("[{:.0}%] {}", update.percent(), update.message))
//!     .build()?;
//!
//! session.process(&orchestrator)?;
//! let summary = session.summary()?;
//! println!("{} of {} rows enriched ({}%)", summary.enriched_count, summary.total, summary.success_rate);
//! std::fs::write("enriched.csv", session.export_csv()?)?;
//! ```
//!
//! # Failure Model
//!
//! A failed batch is recorded on the batch and the run continues; a run
//! always finishes with the (possibly partially) enriched dataset. Only
//! precondition failures such as a bad upload or an incomplete mapping are
//! returned as errors. See [`EnrichmentError`].

pub mod ai;
pub mod config;
pub mod credentials;
pub mod csv;
pub mod error;
pub mod mapper;
pub mod pipeline;
pub mod planner;
pub mod reporting;
pub mod session;
pub mod types;

// Re-exports for convenient access
pub use config::{ConfigValidationError, EnrichmentConfig, EnrichmentConfigBuilder, RetryPolicy};
pub use error::{EnrichmentError, Result as EnrichmentResult, ResultExt};
pub use pipeline::{
    CancellationToken, ClosureProgressReporter, NoopSleeper, Orchestrator, OrchestratorBuilder,
    ProgressReporter, ProgressUpdate, RunMonitor, RunOutcome, RunSnapshot, RunState, Sleeper,
    ThreadSleeper,
};
pub use reporting::{EnrichmentSummary, ResultWriter, RunReport, summarize};
pub use session::{PreviewStats, Session, WizardStep};
pub use types::{
    AddressRecord, Batch, BatchStatus, ColumnMapping, Dataset, EnrichmentItem, Row, SemanticField,
};
