use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use crate::{settings::Settings, source::ApiKey};

pub const API_KEY_ENTRY: &str = "TrueRNG.ApiKey";

#[derive(Debug, thiserror::Error)]
pub enum CredentialStoreError {
    #[error("credential store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("credential store is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub trait CredentialStore {
    fn get(&self, key: &str) -> Result<Option<String>, CredentialStoreError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), CredentialStoreError>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryCredentialStore {
    entries: BTreeMap<String, String>,
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self, key: &str) -> Result<Option<String>, CredentialStoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), CredentialStoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// A JSON object of string entries, rewritten on every `set`.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, CredentialStoreError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let text = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self, key: &str) -> Result<Option<String>, CredentialStoreError> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), CredentialStoreError> {
        let mut entries = self.read_all()?;
        entries.insert(key.to_string(), value.to_string());
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&entries)?)?;
        Ok(())
    }
}

/// Picks the key to use at startup and brings both stores in line.
///
/// A key in `settings` wins and is mirrored into `store`. Otherwise a key found
/// in `store` is written back into `settings`.
pub fn reconcile_credential(
    settings: &mut Settings,
    store: &mut dyn CredentialStore,
) -> Result<Option<ApiKey>, CredentialStoreError> {
    if settings.api_key.is_usable() {
        store.set(API_KEY_ENTRY, settings.api_key.as_str())?;
        return Ok(Some(settings.api_key.clone()));
    }

    match store.get(API_KEY_ENTRY)? {
        Some(saved) if !saved.trim().is_empty() => {
            log::debug!("Restoring API key from local storage");
            let key = ApiKey::new(saved);
            settings.api_key = key.clone();
            Ok(Some(key))
        }
        _ => Ok(None),
    }
}
