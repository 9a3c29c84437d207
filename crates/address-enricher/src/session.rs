//! Wizard session.
//!
//! Holds everything one user works on between "enter API key" and
//! "download results", and enforces the step order:
//!
//! ```text
//! ApiKey -> Upload -> Mapping -> Preview -> Processing -> Results
//!             ^                                            |
//!             +------------------- reset ------------------+
//! ```
//!
//! Every operation checks the current step first and fails with
//! [`EnrichmentError::InvalidStep`] when called out of order. A failed
//! operation leaves the session exactly as it was.

use crate::config::EnrichmentConfig;
use crate::credentials::{CREDENTIAL_KEY, SecretStore};
use crate::csv;
use crate::error::{EnrichmentError, Result};
use crate::mapper::{self, PartialMapping};
use crate::pipeline::{Orchestrator, RunOutcome};
use crate::planner;
use crate::reporting::{EnrichmentSummary, summarize};
use crate::types::{ColumnMapping, Dataset};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

// ============================================================================
// STEPS & STATS
// ============================================================================

/// Position in the wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    ApiKey,
    Upload,
    Mapping,
    Preview,
    Processing,
    Results,
}

impl WizardStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApiKey => "api_key",
            Self::Upload => "upload",
            Self::Mapping => "mapping",
            Self::Preview => "preview",
            Self::Processing => "processing",
            Self::Results => "results",
        }
    }
}

/// Figures shown before the user starts a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewStats {
    pub total_rows: usize,
    /// Rows with a non-blank address.
    pub valid_addresses: usize,
    pub total_batches: usize,
}

// ============================================================================
// SESSION
// ============================================================================

pub struct Session {
    store: Arc<dyn SecretStore>,
    config: EnrichmentConfig,
    step: WizardStep,
    credential: Option<String>,
    file_name: Option<String>,
    dataset: Option<Dataset>,
    detected: PartialMapping,
    mapping: Option<ColumnMapping>,
    outcome: Option<RunOutcome>,
}

impl Session {
    /// Start a session with the default configuration.
    ///
    /// Begins at `Upload` when the store already holds a credential,
    /// otherwise at `ApiKey`.
    pub fn new(store: Arc<dyn SecretStore>) -> Result<Self> {
        Self::with_config(store, EnrichmentConfig::default())
    }

    pub fn with_config(store: Arc<dyn SecretStore>, config: EnrichmentConfig) -> Result<Self> {
        config.validate()?;
        let credential = store.get(CREDENTIAL_KEY)?;
        let step = if credential.is_some() {
            WizardStep::Upload
        } else {
            WizardStep::ApiKey
        };

        Ok(Self {
            store,
            config,
            step,
            credential,
            file_name: None,
            dataset: None,
            detected: PartialMapping::default(),
            mapping: None,
            outcome: None,
        })
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn config(&self) -> &EnrichmentConfig {
        &self.config
    }

    pub fn credential(&self) -> Option<&str> {
        self.credential.as_deref()
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// The uploaded dataset, as parsed.
    pub fn dataset(&self) -> Option<&Dataset> {
        self.dataset.as_ref()
    }

    /// Mapping suggested by header detection.
    pub fn detected_mapping(&self) -> &PartialMapping {
        &self.detected
    }

    /// Mapping confirmed by the user.
    pub fn mapping(&self) -> Option<&ColumnMapping> {
        self.mapping.as_ref()
    }

    pub fn outcome(&self) -> Option<&RunOutcome> {
        self.outcome.as_ref()
    }

    fn expect_step(&self, expected: WizardStep) -> Result<()> {
        if self.step == expected {
            Ok(())
        } else {
            Err(EnrichmentError::InvalidStep {
                expected: expected.as_str(),
                actual: self.step.as_str(),
            })
        }
    }

    fn internal(what: &str) -> EnrichmentError {
        EnrichmentError::Internal(format!("session has no {}", what))
    }

    /// Persist the API key and move on to `Upload`.
    pub fn submit_credential(&mut self, key: &str) -> Result<()> {
        self.expect_step(WizardStep::ApiKey)?;

        let key = key.trim();
        self.store.set(CREDENTIAL_KEY, key)?;
        self.credential = Some(key.to_string());
        self.step = WizardStep::Upload;
        info!("API key saved to {} store", self.store.name());
        Ok(())
    }

    /// Delete the stored API key and return to `ApiKey`, discarding all work.
    pub fn clear_credential(&mut self) -> Result<()> {
        self.store.delete(CREDENTIAL_KEY)?;
        self.credential = None;
        self.discard_work();
        self.step = WizardStep::ApiKey;
        Ok(())
    }

    /// Accept an uploaded file and detect its column mapping.
    ///
    /// # Errors
    ///
    /// Input format errors (wrong extension, empty text, no identifier
    /// column). Nothing is stored on failure.
    pub fn upload(&mut self, file_name: &str, text: &str) -> Result<&PartialMapping> {
        self.expect_step(WizardStep::Upload)?;

        let dataset = csv::load_upload(file_name, text, &self.config.identifier_column)
            .inspect_err(|e| warn!("Upload of '{}' rejected: {}", file_name, e))?;

        info!(
            "Loaded '{}': {} rows, {} columns",
            file_name,
            dataset.len(),
            dataset.headers.len()
        );
        self.detected = mapper::detect(&dataset.headers);
        self.file_name = Some(file_name.to_string());
        self.dataset = Some(dataset);
        self.step = WizardStep::Mapping;
        Ok(&self.detected)
    }

    /// Freeze the column mapping. Overrides beat detected columns.
    ///
    /// # Errors
    ///
    /// `MappingIncomplete` when a field has no column, `ColumnNotFound` when
    /// a chosen column is not a header.
    pub fn confirm_mapping(&mut self, overrides: &PartialMapping) -> Result<&ColumnMapping> {
        self.expect_step(WizardStep::Mapping)?;
        let dataset = self.dataset.as_ref().ok_or_else(|| Self::internal("dataset"))?;

        let mapping = mapper::resolve(&dataset.headers, &self.detected, overrides)?;
        info!(
            "Mapping confirmed: address='{}', district='{}', subdistrict='{}'",
            mapping.address, mapping.district, mapping.subdistrict
        );
        self.step = WizardStep::Preview;
        Ok(&*self.mapping.insert(mapping))
    }

    /// Go back from `Preview` to `Mapping`.
    pub fn edit_mapping(&mut self) -> Result<()> {
        self.expect_step(WizardStep::Preview)?;
        self.mapping = None;
        self.step = WizardStep::Mapping;
        Ok(())
    }

    pub fn preview(&self) -> Result<PreviewStats> {
        self.expect_step(WizardStep::Preview)?;
        let dataset = self.dataset.as_ref().ok_or_else(|| Self::internal("dataset"))?;
        let mapping = self.mapping.as_ref().ok_or_else(|| Self::internal("mapping"))?;

        let valid_addresses = dataset
            .rows
            .iter()
            .filter(|row| planner::has_address(row, mapping))
            .count();

        Ok(PreviewStats {
            total_rows: dataset.len(),
            valid_addresses,
            total_batches: planner::batch_count(valid_addresses, self.config.batch_size),
        })
    }

    /// Run enrichment to completion and move to `Results`.
    ///
    /// Batch failures do not fail this call; only precondition errors do,
    /// in which case the session stays at `Preview`.
    pub fn process(&mut self, orchestrator: &Orchestrator) -> Result<&RunOutcome> {
        self.expect_step(WizardStep::Preview)?;
        let dataset = self.dataset.clone().ok_or_else(|| Self::internal("dataset"))?;
        let mapping = self.mapping.clone().ok_or_else(|| Self::internal("mapping"))?;

        self.step = WizardStep::Processing;
        match orchestrator.run(dataset, &mapping) {
            Ok(outcome) => {
                self.step = WizardStep::Results;
                Ok(&*self.outcome.insert(outcome))
            }
            Err(e) => {
                self.step = WizardStep::Preview;
                Err(e)
            }
        }
    }

    fn results(&self) -> Result<(&RunOutcome, &ColumnMapping)> {
        self.expect_step(WizardStep::Results)?;
        let outcome = self.outcome.as_ref().ok_or_else(|| Self::internal("outcome"))?;
        let mapping = self.mapping.as_ref().ok_or_else(|| Self::internal("mapping"))?;
        Ok((outcome, mapping))
    }

    pub fn summary(&self) -> Result<EnrichmentSummary> {
        let (outcome, mapping) = self.results()?;
        Ok(summarize(&outcome.dataset, mapping))
    }

    /// The enriched dataset as CSV text, in the original column order.
    pub fn export_csv(&self) -> Result<String> {
        let (outcome, _) = self.results()?;
        Ok(csv::serialize(&outcome.dataset.headers, &outcome.dataset.rows))
    }

    /// Discard the dataset, mapping and outcome; keep the credential.
    pub fn reset(&mut self) {
        self.discard_work();
        self.step = if self.credential.is_some() {
            WizardStep::Upload
        } else {
            WizardStep::ApiKey
        };
    }

    fn discard_work(&mut self) {
        self.file_name = None;
        self.dataset = None;
        self.detected = PartialMapping::default();
        self.mapping = None;
        self.outcome = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::AddressExtractor;
    use crate::credentials::MemorySecretStore;
    use crate::pipeline::NoopSleeper;
    use crate::types::{AddressRecord, EnrichmentItem};
    use pretty_assertions::assert_eq;

    const CSV: &str = "conversation_id,Alamat Lengkap,Kecamatan,Kelurahan\n\
                       c1,Jl. Dago No. 1,,\n\
                       c2,,,\n\
                       c3,Jl. Riau No. 9,,";

    struct FixedExtractor;

    impl AddressExtractor for FixedExtractor {
        fn extract(&self, records: &[AddressRecord]) -> Result<Vec<EnrichmentItem>> {
            Ok(records
                .iter()
                .map(|r| EnrichmentItem::new(&r.id, "Coblong", "Dago"))
                .collect())
        }

        fn name(&self) -> &str {
            "Fixed"
        }
    }

    fn session_with_key() -> Session {
        Session::new(Arc::new(MemorySecretStore::with_value(CREDENTIAL_KEY, "sk-test"))).unwrap()
    }

    fn orchestrator() -> Orchestrator {
        Orchestrator::builder()
            .extractor(Arc::new(FixedExtractor))
            .sleeper(Arc::new(NoopSleeper))
            .build()
            .unwrap()
    }

    #[test]
    fn test_starts_at_api_key_without_credential() {
        let store = Arc::new(MemorySecretStore::new());
        let mut session = Session::new(store.clone()).unwrap();
        assert_eq!(session.step(), WizardStep::ApiKey);

        assert!(session.submit_credential("   ").is_err());
        assert_eq!(session.step(), WizardStep::ApiKey);

        session.submit_credential(" sk-new ").unwrap();
        assert_eq!(session.step(), WizardStep::Upload);
        assert_eq!(session.credential(), Some("sk-new"));
        assert_eq!(store.get(CREDENTIAL_KEY).unwrap().as_deref(), Some("sk-new"));
    }

    #[test]
    fn test_starts_at_upload_with_stored_credential() {
        assert_eq!(session_with_key().step(), WizardStep::Upload);
    }

    #[test]
    fn test_rejected_upload_stores_nothing() {
        let mut session = session_with_key();
        let result = session.upload("data.csv", "id,alamat\n1,Jl. A");
        assert!(matches!(result, Err(EnrichmentError::MissingIdentifierColumn(_))));
        assert_eq!(session.step(), WizardStep::Upload);
        assert!(session.dataset().is_none());

        assert!(matches!(
            session.upload("data.xlsx", CSV),
            Err(EnrichmentError::InvalidFileType(_))
        ));
    }

    #[test]
    fn test_full_flow() {
        let mut session = session_with_key();

        let detected = session.upload("data.csv", CSV).unwrap().clone();
        assert_eq!(detected.address.as_deref(), Some("Alamat Lengkap"));
        assert_eq!(session.step(), WizardStep::Mapping);

        session.confirm_mapping(&PartialMapping::default()).unwrap();
        assert_eq!(
            session.preview().unwrap(),
            PreviewStats {
                total_rows: 3,
                valid_addresses: 2,
                total_batches: 1,
            }
        );

        session.process(&orchestrator()).unwrap();
        assert_eq!(session.step(), WizardStep::Results);

        let summary = session.summary().unwrap();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.enriched_count, 2);
        assert_eq!(summary.success_rate, 67);

        let csv = session.export_csv().unwrap();
        assert_eq!(
            csv.lines().next(),
            Some("conversation_id,Alamat Lengkap,Kecamatan,Kelurahan")
        );
        assert!(csv.contains("\"c2\",\"\",\"\",\"\""));
        assert!(csv.contains("\"c3\",\"Jl. Riau No. 9\",\"Coblong\",\"Dago\""));

        session.reset();
        assert_eq!(session.step(), WizardStep::Upload);
        assert!(session.outcome().is_none());
        assert_eq!(session.credential(), Some("sk-test"));
    }

    #[test]
    fn test_incomplete_mapping_blocks_preview() {
        let mut session = session_with_key();
        session
            .upload("data.csv", "conversation_id,alamat,kecamatan,catatan\nc1,Jl. A,,")
            .unwrap();

        let result = session.confirm_mapping(&PartialMapping::default());
        assert!(matches!(result, Err(EnrichmentError::MappingIncomplete(_))));
        assert_eq!(session.step(), WizardStep::Mapping);

        let overrides = PartialMapping {
            subdistrict: Some("catatan".to_string()),
            ..Default::default()
        };
        session.confirm_mapping(&overrides).unwrap();
        assert_eq!(session.mapping().unwrap().subdistrict, "catatan");
    }

    #[test]
    fn test_out_of_order_calls_fail() {
        let mut session = session_with_key();
        assert!(matches!(
            session.preview(),
            Err(EnrichmentError::InvalidStep {
                expected: "preview",
                actual: "upload"
            })
        ));
        assert!(session.export_csv().is_err());
        assert!(session.process(&orchestrator()).is_err());
        assert!(session.submit_credential("sk-other").is_err());
    }

    #[test]
    fn test_edit_mapping_returns_to_mapping() {
        let mut session = session_with_key();
        session.upload("data.csv", CSV).unwrap();
        session.confirm_mapping(&PartialMapping::default()).unwrap();

        session.edit_mapping().unwrap();
        assert_eq!(session.step(), WizardStep::Mapping);
        assert!(session.mapping().is_none());
    }

    #[test]
    fn test_clear_credential() {
        let mut session = session_with_key();
        session.upload("data.csv", CSV).unwrap();

        session.clear_credential().unwrap();
        assert_eq!(session.step(), WizardStep::ApiKey);
        assert!(session.dataset().is_none());

        session.reset();
        assert_eq!(session.step(), WizardStep::ApiKey);
    }
}
