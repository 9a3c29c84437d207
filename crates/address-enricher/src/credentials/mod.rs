//! Secure credential storage.
//!
//! The API key is a single string persisted under [`CREDENTIAL_KEY`] in a
//! pluggable [`SecretStore`]:
//!
//! - [`KeyringSecretStore`]: the operating system's keychain (`keyring` feature)
//! - [`FileSecretStore`]: a JSON object file
//! - [`MemorySecretStore`]: process-local, for tests
//! - [`EnvSecretStore`]: read-only view of environment variables
//!
//! [`LayeredSecretStore`] combines two of them, reading through to a fallback.

mod env;
mod file;
#[cfg(feature = "keyring")]
mod keychain;
mod layered;
mod memory;

pub use env::EnvSecretStore;
pub use file::FileSecretStore;
#[cfg(feature = "keyring")]
pub use keychain::KeyringSecretStore;
pub use layered::LayeredSecretStore;
pub use memory::MemorySecretStore;

use crate::error::{EnrichmentError, Result};

/// Name under which the extraction API key is stored.
pub const CREDENTIAL_KEY: &str = "openai-api-key";

/// A string-valued key-value store for secrets.
pub trait SecretStore: Send + Sync {
    /// Stored value, or `None` if the key is absent.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// Blank values are rejected; values are stored trimmed.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`. Removing an absent key succeeds.
    fn delete(&self, key: &str) -> Result<()>;

    /// Short name for logs and CLI output.
    fn name(&self) -> &str;
}

/// Trim a secret and reject it if nothing remains.
pub(crate) fn normalize_secret(value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EnrichmentError::Credential(
            "API key cannot be empty".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_secret() {
        assert_eq!(normalize_secret("  sk-abc \n").unwrap(), "sk-abc");
        assert!(matches!(
            normalize_secret(" \t"),
            Err(EnrichmentError::Credential(_))
        ));
    }
}
