//! AI module for LLM-powered address extraction.
//!
//! This module provides a trait-based abstraction for extraction providers,
//! so the enrichment run can work with multiple LLM backends.
//!
//! # Feature Flag
//!
//! The concrete HTTPS provider requires the `ai` feature flag (enabled by
//! default). The [`AddressExtractor`] trait and the prompt/parse helpers in
//! [`prompt`] are always available.
//!
//! ```toml
//! # Enable AI support (default)
//! address-enricher = { version = "0.1", features = ["ai"] }
//!
//! # Disable AI support, bring your own extractor
//! address-enricher = { version = "0.1", default-features = false }
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use address_enricher::ai::OpenAiExtractor;
//! use address_enricher::Orchestrator;
//! use std::sync::Arc;
//!
//! let extractor = Arc::new(OpenAiExtractor::new("your-api-key")?);
//!
//! let outcome = Orchestrator::builder()
//!     .extractor(extractor)
//!     .build()?
//!     .run(dataset, &mapping)?;
//! ```

// Provider trait is always available (for custom implementations)
mod provider;
pub mod prompt;

pub use provider::AddressExtractor;

// Concrete providers require the "ai" feature
#[cfg(feature = "ai")]
mod openai;

#[cfg(feature = "ai")]
pub use openai::{OpenAiConfig, OpenAiConfigBuilder, OpenAiExtractor};
