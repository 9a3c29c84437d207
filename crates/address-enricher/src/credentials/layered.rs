use super::SecretStore;
use crate::error::Result;
use std::sync::Arc;
use tracing::debug;

/// Reads from `primary`, then `fallback`; writes go to `primary` only.
///
/// Used to let an exported `OPENAI_API_KEY` stand in when nothing has been
/// saved yet.
pub struct LayeredSecretStore {
    primary: Arc<dyn SecretStore>,
    fallback: Arc<dyn SecretStore>,
}

impl LayeredSecretStore {
    pub fn new(primary: Arc<dyn SecretStore>, fallback: Arc<dyn SecretStore>) -> Self {
        Self { primary, fallback }
    }
}

impl SecretStore for LayeredSecretStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        if let Some(value) = self.primary.get(key)? {
            return Ok(Some(value));
        }
        let value = self.fallback.get(key)?;
        if value.is_some() {
            debug!("Secret '{}' resolved from {} store", key, self.fallback.name());
        }
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.primary.set(key, value)
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.primary.delete(key)
    }

    fn name(&self) -> &str {
        self.primary.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{CREDENTIAL_KEY, MemorySecretStore};

    #[test]
    fn test_primary_wins_then_fallback() {
        let primary = Arc::new(MemorySecretStore::new());
        let fallback = Arc::new(MemorySecretStore::with_value(CREDENTIAL_KEY, "sk-env"));
        let store = LayeredSecretStore::new(primary.clone(), fallback.clone());

        assert_eq!(store.get(CREDENTIAL_KEY).unwrap().as_deref(), Some("sk-env"));

        store.set(CREDENTIAL_KEY, "sk-saved").unwrap();
        assert_eq!(store.get(CREDENTIAL_KEY).unwrap().as_deref(), Some("sk-saved"));
        assert_eq!(fallback.get(CREDENTIAL_KEY).unwrap().as_deref(), Some("sk-env"));

        store.delete(CREDENTIAL_KEY).unwrap();
        assert_eq!(primary.get(CREDENTIAL_KEY).unwrap(), None);
        assert_eq!(store.name(), "memory");
    }
}
