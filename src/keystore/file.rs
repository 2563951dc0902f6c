//! File-backed secret store.
//!
//! Each entry lives in its own file named after [`storage_key`], readable
//! by the owner only. Contents are sealed with AES-256-GCM under a key
//! derived from an installation master key and the entry name.

use super::{storage_key, KeystoreError, KeystoreResult, SecretStore};
use crate::crypto::{aead, SymmetricKey, KEY_LENGTH};
use log::{debug, warn};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

const MASTER_KEY_FILE: &str = "master.key";
const ENTRY_EXTENSION: &str = "secret";
const ENTRY_KEY_CONTEXT: &str = "epic_crm 2024 keystore entry key v1";

pub struct FileKeystore {
    service_name: String,
    dir: PathBuf,
    master_key: SymmetricKey,
}

impl FileKeystore {
    /// Open (creating if needed) the keystore directory and its master key
    pub fn open(service_name: &str, dir: &Path) -> KeystoreResult<Self> {
        fs::create_dir_all(dir).map_err(|e| {
            KeystoreError::Unavailable(format!(
                "Failed to create keystore directory '{}': {}",
                dir.display(),
                e
            ))
        })?;
        restrict_permissions(dir, 0o700)?;

        let master_key = load_or_create_master_key(&dir.join(MASTER_KEY_FILE))?;
        debug!("Opened file keystore at {}", dir.display());

        Ok(Self {
            service_name: service_name.to_string(),
            dir: dir.to_path_buf(),
            master_key,
        })
    }

    fn entry_path(&self, storage_key: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", storage_key, ENTRY_EXTENSION))
    }

    fn entry_key(&self, storage_key: &str) -> [u8; KEY_LENGTH] {
        let mut material = Vec::with_capacity(KEY_LENGTH + storage_key.len());
        material.extend_from_slice(self.master_key.as_bytes());
        material.extend_from_slice(storage_key.as_bytes());
        let key = blake3::derive_key(ENTRY_KEY_CONTEXT, &material);
        zeroize::Zeroize::zeroize(&mut material);
        key
    }
}

impl SecretStore for FileKeystore {
    fn set_secret(&self, key: &str, value: &str) -> KeystoreResult<()> {
        let storage_key = storage_key(&self.service_name, key);
        let mut entry_key = self.entry_key(&storage_key);
        let sealed = aead::seal(value.as_bytes(), &entry_key, storage_key.as_bytes());
        zeroize::Zeroize::zeroize(&mut entry_key);
        let sealed = sealed?;

        let path = self.entry_path(&storage_key);
        let staging = path.with_extension("tmp");
        remove_if_present(&staging)?;
        write_private(&staging, &sealed)?;
        fs::rename(&staging, &path)?;
        Ok(())
    }

    fn get_secret(&self, key: &str) -> KeystoreResult<Option<String>> {
        let storage_key = storage_key(&self.service_name, key);
        let sealed = match fs::read(self.entry_path(&storage_key)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut entry_key = self.entry_key(&storage_key);
        let opened = aead::open(&sealed, &entry_key, storage_key.as_bytes());
        zeroize::Zeroize::zeroize(&mut entry_key);

        let plaintext = opened.map_err(|e| {
            warn!("Keystore entry for '{}' failed to open: {}", key, e);
            KeystoreError::Corrupted(format!("entry '{}' cannot be decrypted", key))
        })?;
        String::from_utf8(plaintext)
            .map(Some)
            .map_err(|_| KeystoreError::Corrupted(format!("entry '{}' is not UTF-8", key)))
    }

    fn delete_secret(&self, key: &str) -> KeystoreResult<()> {
        let storage_key = storage_key(&self.service_name, key);
        remove_if_present(&self.entry_path(&storage_key))
    }

    fn keystore_type(&self) -> &'static str {
        "file"
    }
}

fn load_or_create_master_key(path: &Path) -> KeystoreResult<SymmetricKey> {
    match fs::read_to_string(path) {
        Ok(encoded) => SymmetricKey::from_encoded(&encoded).map_err(|e| {
            KeystoreError::Corrupted(format!("master key '{}': {}", path.display(), e))
        }),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            let key = SymmetricKey::generate();
            write_private(path, key.to_encoded().as_bytes())?;
            debug!("Created keystore master key {}", key.fingerprint());
            Ok(key)
        }
        Err(e) => Err(e.into()),
    }
}

/// Create `path` (which must not exist) readable by the owner only, then
/// write `bytes`. The mode is set at creation, never widened by the umask.
fn write_private(path: &Path, bytes: &[u8]) -> KeystoreResult<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}

fn remove_if_present(path: &Path) -> KeystoreResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path, mode: u32) -> KeystoreResult<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode)).map_err(|e| {
        KeystoreError::Unavailable(format!(
            "Failed to set permissions on '{}': {}",
            path.display(),
            e
        ))
    })
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path, _mode: u32) -> KeystoreResult<()> {
    Ok(())
}
