//! Custom error types for the address enrichment pipeline.
//!
//! This module provides the error hierarchy using `thiserror`. Errors fall
//! into three families:
//!
//! - **Input format** errors reject an upload before any state is stored.
//! - **Precondition** errors (mapping, wizard step) block advancing a step.
//! - **Batch** errors are recorded on a single batch; the run carries on.
//!
//! Errors are serializable as `{code, message}` so a UI can display them.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for the enrichment pipeline.
#[derive(Error, Debug)]
pub enum EnrichmentError {
    /// The uploaded text contained no non-blank lines.
    #[error("CSV input is empty")]
    EmptyInput,

    /// The uploaded file does not carry a `.csv` name.
    #[error("File '{0}' is not a CSV file (.csv)")]
    InvalidFileType(String),

    /// The header set lacks the required identifier column.
    #[error("Required identifier column '{0}' not found in CSV header")]
    MissingIdentifierColumn(String),

    /// Not every semantic field has a column assigned.
    #[error("Column mapping incomplete, missing: {}", .0.join(", "))]
    MappingIncomplete(Vec<&'static str>),

    /// A mapped column does not exist in the header set.
    #[error("Column '{0}' not found in dataset")]
    ColumnNotFound(String),

    /// The extraction endpoint answered with a non-success status.
    #[error("Upstream API error {status}: {message}")]
    Upstream { status: u16, message: String },

    /// The extraction endpoint answered with content that is not the expected array.
    #[error("Malformed response from extraction service: {0}")]
    MalformedResponse(String),

    /// No credential has been configured.
    #[error("No API key configured")]
    MissingCredential,

    /// The credential store failed or rejected a value.
    #[error("Credential store error: {0}")]
    Credential(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A wizard operation was called out of order.
    #[error("Operation requires step '{expected}', session is at '{actual}'")]
    InvalidStep {
        expected: &'static str,
        actual: &'static str,
    },

    /// Internal error (e.g., a missing collaborator).
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP transport error (only with "ai" feature).
    #[cfg(feature = "ai")]
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<EnrichmentError>,
    },
}

impl EnrichmentError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        EnrichmentError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Get error code for frontend handling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::EmptyInput => "EMPTY_INPUT",
            Self::InvalidFileType(_) => "INVALID_FILE_TYPE",
            Self::MissingIdentifierColumn(_) => "MISSING_IDENTIFIER_COLUMN",
            Self::MappingIncomplete(_) => "MAPPING_INCOMPLETE",
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::Upstream { .. } => "UPSTREAM_ERROR",
            Self::MalformedResponse(_) => "MALFORMED_RESPONSE",
            Self::MissingCredential => "MISSING_CREDENTIAL",
            Self::Credential(_) => "CREDENTIAL_ERROR",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::InvalidStep { .. } => "INVALID_STEP",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Json(_) => "JSON_ERROR",
            #[cfg(feature = "ai")]
            Self::HttpRequest(_) => "HTTP_REQUEST_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// True for errors that reject an upload (nothing is stored).
    pub fn is_input_format(&self) -> bool {
        match self {
            Self::EmptyInput | Self::InvalidFileType(_) | Self::MissingIdentifierColumn(_) => true,
            Self::WithContext { source, .. } => source.is_input_format(),
            _ => false,
        }
    }

    /// True for errors that are recorded against a single batch.
    pub fn is_batch_failure(&self) -> bool {
        match self {
            Self::Upstream { .. } | Self::MalformedResponse(_) => true,
            #[cfg(feature = "ai")]
            Self::HttpRequest(_) => true,
            Self::WithContext { source, .. } => source.is_batch_failure(),
            _ => false,
        }
    }
}

impl Serialize for EnrichmentError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("EnrichmentError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for enrichment operations.
pub type Result<T> = std::result::Result<T, EnrichmentError>;

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

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| EnrichmentError::Io(e).with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        assert_eq!(EnrichmentError::EmptyInput.error_code(), "EMPTY_INPUT");
        assert_eq!(
            EnrichmentError::Upstream {
                status: 429,
                message: "Too Many Requests".to_string()
            }
            .error_code(),
            "UPSTREAM_ERROR"
        );
    }

    #[test]
    fn test_input_format_family() {
        assert!(EnrichmentError::EmptyInput.is_input_format());
        assert!(
            EnrichmentError::MissingIdentifierColumn("conversation_id".to_string())
                .is_input_format()
        );
        assert!(!EnrichmentError::MappingIncomplete(vec!["address"]).is_input_format());
    }

    #[test]
    fn test_batch_failure_family() {
        assert!(EnrichmentError::MalformedResponse("not json".to_string()).is_batch_failure());
        assert!(!EnrichmentError::MissingCredential.is_batch_failure());
        let wrapped = EnrichmentError::MalformedResponse("x".to_string()).with_context("Batch 2");
        assert!(wrapped.is_batch_failure());
    }

    #[test]
    fn test_mapping_incomplete_message() {
        let error = EnrichmentError::MappingIncomplete(vec!["district", "subdistrict"]);
        assert_eq!(
            error.to_string(),
            "Column mapping incomplete, missing: district, subdistrict"
        );
    }

    #[test]
    fn test_error_serialization() {
        let error = EnrichmentError::ColumnNotFound("Alamat".to_string());
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("COLUMN_NOT_FOUND"));
        assert!(json.contains("Alamat"));
    }

    #[test]
    fn test_with_context() {
        let error = EnrichmentError::EmptyInput.with_context("While loading data.csv");
        assert!(error.to_string().contains("While loading data.csv"));
        assert_eq!(error.error_code(), "EMPTY_INPUT");
    }
}
