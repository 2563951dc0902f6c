//! OS-style secret store integration.
//!
//! [`SecretStore`] is the narrow, blocking interface the credential layer
//! writes through. Two backends are provided:
//! - [`FileKeystore`]: one encrypted, owner-only file per entry
//! - [`MemoryKeystore`]: process-local map, for tests and ephemeral runs

pub mod file;
pub mod memory;

pub use file::FileKeystore;
pub use memory::MemoryKeystore;

use crate::config::{KeystoreBackend, KeystoreConfig};
use crate::crypto::CryptoError;
use blake3::Hasher;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by secret store backends
#[derive(Debug, Error)]
pub enum KeystoreError {
    #[error("Keystore unavailable: {0}")]
    Unavailable(String),

    #[error("Keystore IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Keystore entry corrupted: {0}")]
    Corrupted(String),

    #[error("Keystore crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

pub type KeystoreResult<T> = Result<T, KeystoreError>;

/// Blocking secret store operations
pub trait SecretStore: Send + Sync {
    /// Store `value` under `key`, replacing any previous value
    fn set_secret(&self, key: &str, value: &str) -> KeystoreResult<()>;

    /// Retrieve the value under `key`, if any
    fn get_secret(&self, key: &str) -> KeystoreResult<Option<String>>;

    /// Remove the value under `key`; absent keys are not an error
    fn delete_secret(&self, key: &str) -> KeystoreResult<()>;

    /// Backend identifier for logs
    fn keystore_type(&self) -> &'static str;
}

/// Create the backend selected in configuration
pub fn create_keystore(config: &KeystoreConfig) -> KeystoreResult<Arc<dyn SecretStore>> {
    let store: Arc<dyn SecretStore> = match config.backend {
        KeystoreBackend::File => Arc::new(FileKeystore::open(&config.service_name, &config.dir)?),
        KeystoreBackend::Memory => Arc::new(MemoryKeystore::new()),
    };
    log::info!(
        "Using {} keystore for service '{}'",
        store.keystore_type(),
        config.service_name
    );
    Ok(store)
}

/// Opaque storage name for an entry, so entry names never reach the disk
pub fn storage_key(service: &str, key: &str) -> String {
    let mut hasher = Hasher::new();
    hasher.update(service.as_bytes());
    hasher.update(b"::");
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_key_is_stable_and_namespaced() {
        assert_eq!(storage_key("svc", "alice_key"), storage_key("svc", "alice_key"));
        assert_ne!(storage_key("svc", "alice_key"), storage_key("other", "alice_key"));
        assert_ne!(storage_key("svc", "alice_key"), storage_key("svc", "alice_tokens"));
        assert_eq!(storage_key("svc", "x").len(), 64);
    }

    #[test]
    fn test_create_memory_keystore() {
        let config = KeystoreConfig {
            backend: KeystoreBackend::Memory,
            ..KeystoreConfig::default()
        };
        let store = create_keystore(&config).unwrap();
        assert_eq!(store.keystore_type(), "memory");
    }
}
