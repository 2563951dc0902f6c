//! Encrypted at-rest storage of the local operator's token bundle.
//!
//! Three secret store entries make up a stored session:
//! - `{username}_tokens`: the sealed, serialized [`TokenBundle`]
//! - `{username}_key`: the at-rest key material (see [`KeyProtection`])
//! - `current_user`: the process-wide pointer to the active identity

use crate::crypto::{aead, kdf, KdfParams, SymmetricKey};
use crate::error::{AuthError, AuthResult};
use crate::keystore::{KeystoreResult, SecretStore};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use zeroize::Zeroizing;

const TOKENS_SUFFIX: &str = "_tokens";
const KEY_SUFFIX: &str = "_key";
pub const CURRENT_USER_KEY: &str = "current_user";

const PASSPHRASE_PREFIX: &str = "argon2id:";

pub fn tokens_entry(username: &str) -> String {
    format!("{}{}", username, TOKENS_SUFFIX)
}

pub fn key_entry(username: &str) -> String {
    format!("{}{}", username, KEY_SUFFIX)
}

/// Token pair plus the key that signed it
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenBundle {
    pub access_token: String,
    pub refresh_token: String,
    pub symmetric_key: SymmetricKey,
    pub issued_at: DateTime<Utc>,
}

impl TokenBundle {
    pub fn new(access_token: String, refresh_token: String, symmetric_key: SymmetricKey) -> Self {
        Self {
            access_token,
            refresh_token,
            symmetric_key,
            issued_at: Utc::now(),
        }
    }
}

impl fmt::Debug for TokenBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenBundle")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("symmetric_key", &self.symmetric_key)
            .field("issued_at", &self.issued_at)
            .finish()
    }
}

/// How the at-rest key for a bundle is obtained.
#[derive(Clone, Default)]
pub enum KeyProtection {
    /// The bundle's own key is written next to the ciphertext. Relies
    /// entirely on the secret store's protection.
    #[default]
    Adjacent,
    /// The at-rest key is derived from an operator passphrase that is never
    /// persisted; `{username}_key` holds only the KDF salt.
    Passphrase {
        passphrase: Zeroizing<String>,
        params: KdfParams,
    },
}

impl KeyProtection {
    pub fn passphrase<S: Into<String>>(passphrase: S, params: KdfParams) -> Self {
        KeyProtection::Passphrase {
            passphrase: Zeroizing::new(passphrase.into()),
            params,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            KeyProtection::Adjacent => "adjacent",
            KeyProtection::Passphrase { .. } => "passphrase",
        }
    }
}

impl fmt::Debug for KeyProtection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyProtection::Adjacent => f.write_str("Adjacent"),
            KeyProtection::Passphrase { params, .. } => f
                .debug_struct("Passphrase")
                .field("passphrase", &"<redacted>")
                .field("params", params)
                .finish(),
        }
    }
}

/// Identity an operation runs as
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionContext {
    username: String,
}

impl SessionContext {
    pub fn new<S: Into<String>>(username: S) -> Self {
        Self {
            username: username.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

/// Persists token bundles through a [`SecretStore`]
#[derive(Clone)]
pub struct CredentialStore {
    store: Arc<dyn SecretStore>,
    protection: KeyProtection,
}

impl CredentialStore {
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self::with_protection(store, KeyProtection::Adjacent)
    }

    pub fn with_protection(store: Arc<dyn SecretStore>, protection: KeyProtection) -> Self {
        Self { store, protection }
    }

    pub fn protection(&self) -> &KeyProtection {
        &self.protection
    }

    /// Seal and store `bundle` for `username` and make it the current
    /// identity. Either all three entries are written or none change.
    pub fn save(&self, username: &str, bundle: &TokenBundle) -> AuthResult<()> {
        let (key_material, at_rest_key) = self.at_rest_key_for_save(bundle)?;
        let plaintext = Zeroizing::new(serde_json::to_vec(bundle)?);
        let sealed = aead::seal(&plaintext, at_rest_key.as_bytes(), username.as_bytes())?;

        let writes = [
            (tokens_entry(username), STANDARD.encode(sealed)),
            (key_entry(username), key_material.to_string()),
            (CURRENT_USER_KEY.to_string(), username.to_string()),
        ];

        let mut previous = Vec::with_capacity(writes.len());
        for (entry, _) in &writes {
            previous.push((entry.as_str(), self.store.get_secret(entry)?));
        }

        for (written, (entry, value)) in writes.iter().enumerate() {
            if let Err(e) = self.store.set_secret(entry, value) {
                warn!(
                    "Failed to save credentials for {} ({}); restoring previous entries",
                    username, e
                );
                self.restore(&previous[..=written]);
                return Err(e.into());
            }
        }

        info!(
            "Saved token bundle for {} ({} key protection)",
            username,
            self.protection.name()
        );
        Ok(())
    }

    /// Read and decrypt the bundle stored for `username`
    pub fn load(&self, username: &str) -> AuthResult<TokenBundle> {
        let sealed = self.store.get_secret(&tokens_entry(username))?;
        let key_material = self.store.get_secret(&key_entry(username))?;
        let pointer = self.store.get_secret(CURRENT_USER_KEY)?;

        let (sealed, key_material) = match (sealed, key_material, pointer) {
            (Some(sealed), Some(key_material), Some(_)) => (sealed, Zeroizing::new(key_material)),
            _ => {
                debug!("No stored session for {}", username);
                return Err(AuthError::NoActiveSession);
            }
        };

        let at_rest_key = self.at_rest_key_for_load(&key_material)?;
        let sealed = STANDARD
            .decode(sealed.as_bytes())
            .map_err(|e| AuthError::persistence(format!("stored bundle is not base64: {}", e)))?;
        let plaintext = Zeroizing::new(aead::open(&sealed, at_rest_key.as_bytes(), username.as_bytes())?);

        let bundle = serde_json::from_slice(&plaintext)?;
        debug!("Loaded token bundle for {}", username);
        Ok(bundle)
    }

    /// Remove everything stored for `username`. The `current_user` pointer
    /// is cleared only when it names `username`. Idempotent.
    pub fn delete(&self, username: &str) -> AuthResult<()> {
        self.store.delete_secret(&tokens_entry(username))?;
        self.store.delete_secret(&key_entry(username))?;
        if self.store.get_secret(CURRENT_USER_KEY)?.as_deref() == Some(username) {
            self.store.delete_secret(CURRENT_USER_KEY)?;
        }
        info!("Deleted stored credentials for {}", username);
        Ok(())
    }

    /// Whether any per-user entry exists for `username`, readable or not
    pub fn has_entries(&self, username: &str) -> AuthResult<bool> {
        Ok(self.store.get_secret(&tokens_entry(username))?.is_some()
            || self.store.get_secret(&key_entry(username))?.is_some())
    }

    /// Username held by the `current_user` pointer
    pub fn current_user(&self) -> AuthResult<Option<String>> {
        Ok(self.store.get_secret(CURRENT_USER_KEY)?)
    }

    /// [`current_user`](Self::current_user) as a context, or `NoActiveSession`
    pub fn current_context(&self) -> AuthResult<SessionContext> {
        self.current_user()?
            .map(SessionContext::new)
            .ok_or(AuthError::NoActiveSession)
    }

    fn at_rest_key_for_save(&self, bundle: &TokenBundle) -> AuthResult<(Zeroizing<String>, SymmetricKey)> {
        match &self.protection {
            KeyProtection::Adjacent => Ok((
                Zeroizing::new(bundle.symmetric_key.to_encoded()),
                bundle.symmetric_key.clone(),
            )),
            KeyProtection::Passphrase { passphrase, params } => {
                let salt = kdf::generate_salt();
                let key = kdf::derive_key(passphrase, &salt, params)?;
                let material = format!("{}{}", PASSPHRASE_PREFIX, STANDARD.encode(salt));
                Ok((Zeroizing::new(material), key))
            }
        }
    }

    fn at_rest_key_for_load(&self, key_material: &str) -> AuthResult<SymmetricKey> {
        match (&self.protection, key_material.strip_prefix(PASSPHRASE_PREFIX)) {
            (KeyProtection::Adjacent, None) => Ok(SymmetricKey::from_encoded(key_material)?),
            (KeyProtection::Passphrase { passphrase, params }, Some(salt)) => {
                let salt = STANDARD
                    .decode(salt.as_bytes())
                    .map_err(|e| AuthError::persistence(format!("stored salt is not base64: {}", e)))?;
                Ok(kdf::derive_key(passphrase, &salt, params)?)
            }
            (KeyProtection::Adjacent, Some(_)) => Err(AuthError::persistence(
                "bundle was saved with passphrase protection",
            )),
            (KeyProtection::Passphrase { .. }, None) => Err(AuthError::persistence(
                "bundle was saved without passphrase protection",
            )),
        }
    }

    fn restore(&self, previous: &[(&str, Option<String>)]) {
        for (entry, value) in previous {
            let result: KeystoreResult<()> = match value {
                Some(value) => self.store.set_secret(entry, value),
                None => self.store.delete_secret(entry),
            };
            if let Err(e) = result {
                warn!("Failed to restore secret store entry during rollback: {}", e);
            }
        }
    }
}
