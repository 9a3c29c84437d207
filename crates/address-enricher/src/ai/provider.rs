//! Extraction provider trait for abstracting LLM interactions.
//!
//! This module defines the [`AddressExtractor`] trait so the orchestrator can
//! drive any extraction backend (the bundled OpenAI-compatible client, a
//! different vendor, or a scripted fake in tests) without changing its loop.
//!
//! # Implementing a New Provider
//!
//! 1. Create a new file in `src/ai/`
//! 2. Implement [`AddressExtractor`] for your provider struct
//! 3. Export the provider in `src/ai/mod.rs`

use crate::error::Result;
use crate::types::{AddressRecord, EnrichmentItem};

/// Trait for services that extract district and sub-district from addresses.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` so a run can execute on a
/// background thread while the caller observes progress.
///
/// # Error Handling
///
/// Implementations must not retry internally. A failed call returns
/// [`EnrichmentError::Upstream`](crate::error::EnrichmentError::Upstream) for
/// non-success responses and
/// [`EnrichmentError::MalformedResponse`](crate::error::EnrichmentError::MalformedResponse)
/// for unparseable content; the orchestrator decides what happens next.
pub trait AddressExtractor: Send + Sync {
    /// Extract fields for one batch of addresses.
    ///
    /// Returns the parsed items verbatim. Items may reference identifiers
    /// that were not in the batch and may carry empty fields.
    fn extract(&self, records: &[AddressRecord]) -> Result<Vec<EnrichmentItem>>;

    /// Get the provider name for logging and debugging.
    fn name(&self) -> &str;

    /// Get the model being used by this provider.
    ///
    /// Returns `None` if the provider doesn't expose model information.
    fn model(&self) -> Option<&str> {
        None
    }
}
