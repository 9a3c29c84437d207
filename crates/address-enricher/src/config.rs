//! Configuration types for the enrichment pipeline.
//!
//! This module provides configuration options using the builder pattern
//! for flexible and ergonomic run setup.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Number of addresses sent to the extraction service per request.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Pause between two consecutive batches, in milliseconds.
pub const DEFAULT_INTER_BATCH_DELAY_MS: u64 = 1000;

/// Upper bound on a single retry delay, in milliseconds.
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 60_000;

/// Column every uploaded CSV must carry; rows are merged back by its value.
pub const DEFAULT_IDENTIFIER_COLUMN: &str = "conversation_id";

/// File name prefix of the downloadable result.
pub const DEFAULT_OUTPUT_PREFIX: &str = "enriched_addresses";

/// Retry policy for failed extraction calls.
///
/// The default performs no retries: a failed batch is marked as an error
/// immediately and the run moves on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Additional attempts after the first failure.
    pub max_retries: u32,
    /// Delay before the first retry, in milliseconds.
    pub backoff_ms: u64,
    /// Factor applied to the delay after every retry.
    pub backoff_multiplier: f64,
    /// Cap on any single retry delay, in milliseconds.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_max_backoff_ms() -> u64 {
    DEFAULT_MAX_BACKOFF_MS
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            backoff_ms: 1000,
            backoff_multiplier: 2.0,
            max_backoff_ms: DEFAULT_MAX_BACKOFF_MS,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self::default()
    }

    /// Delay to wait before retry number `attempt` (1-based), never more
    /// than `max_backoff_ms`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if self.backoff_ms == 0 {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let millis = self.backoff_ms as f64 * self.backoff_multiplier.powi(exponent);
        let cap = self.max_backoff_ms as f64;
        let millis = if millis.is_finite() { millis.min(cap) } else { cap };
        Duration::from_millis(millis.round() as u64)
    }
}

/// Configuration for an enrichment run.
///
/// Use [`EnrichmentConfig::builder()`] to create a new configuration
/// with fluent API.
///
/// # Example
///
/// ```rust,ignore
/// use address_enricher::config::EnrichmentConfig;
///
/// let config = EnrichmentConfig::builder()
///     .batch_size(10)
///     .inter_batch_delay_ms(0)
///     .build()?;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    /// Maximum number of rows per batch.
    /// Default: 10
    pub batch_size: usize,

    /// Pause between batches (never after the last one), in milliseconds.
    /// Default: 1000
    pub inter_batch_delay_ms: u64,

    /// Name of the required identifier column.
    /// Default: "conversation_id"
    pub identifier_column: String,

    /// Retry behaviour for failed batches.
    /// Default: no retries
    pub retry: RetryPolicy,

    /// Directory the result CSV and report are written to.
    /// Default: "output"
    pub output_dir: PathBuf,

    /// Prefix of the result file name (`<prefix>_YYYY-MM-DD.csv`).
    /// Default: "enriched_addresses"
    pub output_prefix: String,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            inter_batch_delay_ms: DEFAULT_INTER_BATCH_DELAY_MS,
            identifier_column: DEFAULT_IDENTIFIER_COLUMN.to_string(),
            retry: RetryPolicy::default(),
            output_dir: PathBuf::from("output"),
            output_prefix: DEFAULT_OUTPUT_PREFIX.to_string(),
        }
    }
}

impl EnrichmentConfig {
    /// Create a new configuration builder.
    pub fn builder() -> EnrichmentConfigBuilder {
        EnrichmentConfigBuilder::default()
    }

    /// The inter-batch delay as a [`Duration`].
    pub fn inter_batch_delay(&self) -> Duration {
        Duration::from_millis(self.inter_batch_delay_ms)
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.batch_size == 0 {
            return Err(ConfigValidationError::InvalidBatchSize(self.batch_size));
        }

        if self.identifier_column.trim().is_empty() {
            return Err(ConfigValidationError::EmptyField(
                "identifier_column".to_string(),
            ));
        }

        if self.output_prefix.trim().is_empty() {
            return Err(ConfigValidationError::EmptyField("output_prefix".to_string()));
        }

        if !self.retry.backoff_multiplier.is_finite() || self.retry.backoff_multiplier < 1.0 {
            return Err(ConfigValidationError::InvalidBackoffMultiplier(
                self.retry.backoff_multiplier,
            ));
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid batch size: {0} (must be at least 1)")]
    InvalidBatchSize(usize),

    #[error("Configuration field '{0}' must not be empty")]
    EmptyField(String),

    #[error("Invalid backoff multiplier: {0} (must be a finite value >= 1.0)")]
    InvalidBackoffMultiplier(f64),
}

impl From<ConfigValidationError> for crate::error::EnrichmentError {
    fn from(e: ConfigValidationError) -> Self {
        crate::error::EnrichmentError::InvalidConfig(e.to_string())
    }
}

/// Builder for [`EnrichmentConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct EnrichmentConfigBuilder {
    batch_size: Option<usize>,
    inter_batch_delay_ms: Option<u64>,
    identifier_column: Option<String>,
    retry: Option<RetryPolicy>,
    output_dir: Option<PathBuf>,
    output_prefix: Option<String>,
}

impl EnrichmentConfigBuilder {
    /// Set the number of rows per batch.
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = Some(size);
        self
    }

    /// Set the pause between batches in milliseconds.
    pub fn inter_batch_delay_ms(mut self, delay_ms: u64) -> Self {
        self.inter_batch_delay_ms = Some(delay_ms);
        self
    }

    /// Set the name of the required identifier column.
    pub fn identifier_column(mut self, column: impl Into<String>) -> Self {
        self.identifier_column = Some(column.into());
        self
    }

    /// Set the retry policy for failed batches.
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    /// Shorthand for a retry policy with `max_retries` and default backoff.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        let mut policy = self.retry.unwrap_or_default();
        policy.max_retries = max_retries;
        self.retry = Some(policy);
        self
    }

    /// Set the output directory for the result CSV and report.
    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(path.into());
        self
    }

    /// Set the result file name prefix.
    pub fn output_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.output_prefix = Some(prefix.into());
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `EnrichmentConfig` or an error if validation fails.
    pub fn build(self) -> Result<EnrichmentConfig, ConfigValidationError> {
        let config = EnrichmentConfig {
            batch_size: self.batch_size.unwrap_or(DEFAULT_BATCH_SIZE),
            inter_batch_delay_ms: self
                .inter_batch_delay_ms
                .unwrap_or(DEFAULT_INTER_BATCH_DELAY_MS),
            identifier_column: self
                .identifier_column
                .unwrap_or_else(|| DEFAULT_IDENTIFIER_COLUMN.to_string()),
            retry: self.retry.unwrap_or_default(),
            output_dir: self.output_dir.unwrap_or_else(|| PathBuf::from("output")),
            output_prefix: self
                .output_prefix
                .unwrap_or_else(|| DEFAULT_OUTPUT_PREFIX.to_string()),
        };

        config.validate()?;
        Ok(config)
    }
}
