use super::{SecretStore, normalize_secret};
use crate::error::{EnrichmentError, Result, ResultExt};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Secret store backed by a JSON object file (`{"key": "value"}`).
///
/// A missing file is an empty store. On Unix the file is created with
/// owner-only permissions.
#[derive(Debug)]
pub struct FileSecretStore {
    path: PathBuf,
    // serializes read-modify-write cycles within the process
    lock: Mutex<()>,
}

impl FileSecretStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let text = fs::read_to_string(&self.path)
            .context(format!("Failed to read {}", self.path.display()))?;
        if text.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&text).map_err(|e| {
            EnrichmentError::Credential(format!(
                "{} is not a JSON object of strings: {}",
                self.path.display(),
                e
            ))
        })
    }

    fn save(&self, values: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .context(format!("Failed to create {}", parent.display()))?;
        }

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options
            .open(&self.path)
            .context(format!("Failed to open {}", self.path.display()))?;

        // mode() only applies on creation; tighten a pre-existing file before writing
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(0o600))
                .context(format!("Failed to restrict {}", self.path.display()))?;
        }

        file.write_all(serde_json::to_string_pretty(values)?.as_bytes())
            .context(format!("Failed to write {}", self.path.display()))?;
        Ok(())
    }
}

impl SecretStore for FileSecretStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock();
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let value = normalize_secret(value)?;
        let _guard = self.lock.lock();
        let mut values = self.load()?;
        values.insert(key.to_string(), value);
        self.save(&values)?;
        info!("Stored secret '{}' in {}", key, self.path.display());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let _guard = self.lock.lock();
        let mut values = self.load()?;
        if values.remove(key).is_none() {
            debug!("No secret '{}' to delete", key);
            return Ok(());
        }
        self.save(&values)
    }

    fn name(&self) -> &str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::CREDENTIAL_KEY;

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSecretStore::new(dir.path().join("secrets.json"));
        assert_eq!(store.get(CREDENTIAL_KEY).unwrap(), None);
        store.delete(CREDENTIAL_KEY).unwrap();
        assert!(!store.path().exists());
    }

    #[test]
    fn test_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("secrets.json");

        FileSecretStore::new(&path).set(CREDENTIAL_KEY, "sk-live\n").unwrap();
        FileSecretStore::new(&path).set("other", "x").unwrap();

        let store = FileSecretStore::new(&path);
        assert_eq!(store.get(CREDENTIAL_KEY).unwrap().as_deref(), Some("sk-live"));

        store.delete(CREDENTIAL_KEY).unwrap();
        assert_eq!(store.get(CREDENTIAL_KEY).unwrap(), None);
        assert_eq!(store.get("other").unwrap().as_deref(), Some("x"));
    }

    #[test]
    fn test_corrupt_file_is_credential_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secrets.json");
        fs::write(&path, "not json").unwrap();

        let result = FileSecretStore::new(&path).get(CREDENTIAL_KEY);
        assert!(matches!(result, Err(EnrichmentError::Credential(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = FileSecretStore::new(dir.path().join("secrets.json"));
        store.set(CREDENTIAL_KEY, "sk-x").unwrap();

        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn test_loose_existing_file_is_restricted() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secrets.json");
        fs::write(&path, "{}").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        let store = FileSecretStore::new(&path);
        store.set(CREDENTIAL_KEY, "sk-x").unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(store.get(CREDENTIAL_KEY).unwrap().as_deref(), Some("sk-x"));
    }
}
