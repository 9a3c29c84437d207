//! OS keychain store.
//!
//! - **macOS**: Keychain
//! - **Windows**: Credential Manager
//! - **Linux**: Secret Service (GNOME Keyring, KWallet)
//!
//! Each key is stored as a separate entry under the service name.

use super::{SecretStore, normalize_secret};
use crate::error::{EnrichmentError, Result};
use keyring::Entry;
use keyring::credential::CredentialPersistence;
use tracing::{error, info};

/// The service name used for all keyring entries.
pub const KEYRING_SERVICE: &str = "address-enricher";

#[derive(Debug, Clone)]
pub struct KeyringSecretStore {
    service: String,
}

impl Default for KeyringSecretStore {
    fn default() -> Self {
        Self::new(KEYRING_SERVICE)
    }
}

impl KeyringSecretStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    /// Whether the platform backend keeps secrets until they are deleted,
    /// rather than only until reboot or process exit.
    pub fn persists_until_deleted() -> bool {
        matches!(
            keyring::default::default_credential_builder().persistence(),
            CredentialPersistence::UntilDelete
        )
    }

    fn entry(&self, key: &str) -> Result<Entry> {
        Entry::new(&self.service, key).map_err(|e| {
            error!("Failed to create keyring entry: {}", e);
            EnrichmentError::Credential(format!("Failed to access secure storage: {}", e))
        })
    }
}

impl SecretStore for KeyringSecretStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match self.entry(key)?.get_password() {
            Ok(password) => Ok(Some(password)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => {
                error!("Failed to retrieve secret '{}': {}", key, e);
                Err(EnrichmentError::Credential(format!(
                    "Failed to retrieve API key: {}",
                    e
                )))
            }
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let value = normalize_secret(value)?;
        self.entry(key)?.set_password(&value).map_err(|e| {
            error!("Failed to store secret '{}': {}", key, e);
            EnrichmentError::Credential(format!("Failed to store API key securely: {}", e))
        })?;

        info!("Stored secret '{}' in keychain", key);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => {
                info!("Deleted secret '{}' from keychain", key);
                Ok(())
            }
            Err(e) => {
                error!("Failed to delete secret '{}': {}", key, e);
                Err(EnrichmentError::Credential(format!(
                    "Failed to delete API key: {}",
                    e
                )))
            }
        }
    }

    fn name(&self) -> &str {
        "keyring"
    }
}
