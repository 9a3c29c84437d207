use super::SecretStore;
use crate::error::{EnrichmentError, Result};

/// Read-only store backed by environment variables.
///
/// `openai-api-key` is looked up as `OPENAI_API_KEY` (uppercased, `-` and
/// `.` become `_`), optionally behind a prefix.
#[derive(Debug, Clone, Default)]
pub struct EnvSecretStore {
    prefix: Option<String>,
}

impl EnvSecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }

    /// Environment variable consulted for `key`.
    pub fn var_name(&self, key: &str) -> String {
        let name: String = key
            .chars()
            .map(|c| match c {
                '-' | '.' => '_',
                c => c.to_ascii_uppercase(),
            })
            .collect();
        match &self.prefix {
            Some(prefix) => format!("{}{}", prefix, name),
            None => name,
        }
    }
}

impl SecretStore for EnvSecretStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(std::env::var(self.var_name(key))
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty()))
    }

    fn set(&self, key: &str, _value: &str) -> Result<()> {
        Err(EnrichmentError::Credential(format!(
            "environment store is read-only, export {} instead",
            self.var_name(key)
        )))
    }

    fn delete(&self, key: &str) -> Result<()> {
        Err(EnrichmentError::Credential(format!(
            "environment store is read-only, unset {} instead",
            self.var_name(key)
        )))
    }

    fn name(&self) -> &str {
        "environment"
    }
}
