//! Per-login symmetric keys

use crate::crypto::error::{CryptoError, CryptoResult};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length of a symmetric key in bytes (256 bits)
pub const KEY_LENGTH: usize = 32;

/// Key used both to sign a token pair and, by default, to seal the bundle
/// holding it. Generated fresh for every login, never derived from the
/// user's password, and wiped from memory on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey {
    bytes: [u8; KEY_LENGTH],
}

impl SymmetricKey {
    /// Generate a new key from the operating system RNG
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LENGTH];
        OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    pub fn from_bytes(bytes: [u8; KEY_LENGTH]) -> Self {
        Self { bytes }
    }

    /// Get the key bytes (use with caution)
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.bytes
    }

    /// URL-safe base64 form used in the secret store
    pub fn to_encoded(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.bytes)
    }

    pub fn from_encoded(encoded: &str) -> CryptoResult<Self> {
        let mut decoded = URL_SAFE_NO_PAD
            .decode(encoded.trim())
            .map_err(|e| CryptoError::InvalidKey {
                message: format!("Key is not valid base64: {}", e),
            })?;
        if decoded.len() != KEY_LENGTH {
            let length = decoded.len();
            decoded.zeroize();
            return Err(CryptoError::InvalidKey {
                message: format!("Expected {} key bytes, found {}", KEY_LENGTH, length),
            });
        }
        let mut bytes = [0u8; KEY_LENGTH];
        bytes.copy_from_slice(&decoded);
        decoded.zeroize();
        Ok(Self { bytes })
    }

    /// Short non-secret identifier, safe to log
    pub fn fingerprint(&self) -> String {
        let digest = blake3::hash(&self.bytes);
        hex::encode(&digest.as_bytes()[..8])
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SymmetricKey({})", self.fingerprint())
    }
}

impl Serialize for SymmetricKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_encoded())
    }
}

impl<'de> Deserialize<'de> for SymmetricKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        SymmetricKey::from_encoded(&encoded).map_err(de::Error::custom)
    }
}
