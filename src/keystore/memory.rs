//! Process-local secret store

use super::{KeystoreError, KeystoreResult, SecretStore};
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory keystore; contents vanish with the process
#[derive(Default)]
pub struct MemoryKeystore {
    storage: RwLock<HashMap<String, String>>,
}

impl MemoryKeystore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.storage.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> KeystoreError {
    KeystoreError::Unavailable("memory keystore lock poisoned".to_string())
}

impl SecretStore for MemoryKeystore {
    fn set_secret(&self, key: &str, value: &str) -> KeystoreResult<()> {
        let mut storage = self.storage.write().map_err(|_| poisoned())?;
        storage.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get_secret(&self, key: &str) -> KeystoreResult<Option<String>> {
        let storage = self.storage.read().map_err(|_| poisoned())?;
        Ok(storage.get(key).cloned())
    }

    fn delete_secret(&self, key: &str) -> KeystoreResult<()> {
        let mut storage = self.storage.write().map_err(|_| poisoned())?;
        storage.remove(key);
        Ok(())
    }

    fn keystore_type(&self) -> &'static str {
        "memory"
    }
}
