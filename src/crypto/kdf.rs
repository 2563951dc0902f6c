//! Argon2id passphrase-based key derivation

use crate::crypto::error::{CryptoError, CryptoResult};
use crate::crypto::keys::{SymmetricKey, KEY_LENGTH};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::rngs::OsRng;
use rand::RngCore;

/// Length of salt for Argon2 key derivation (32 bytes)
pub const SALT_LENGTH: usize = 32;

/// Default memory cost for Argon2 (64 MB)
pub const DEFAULT_MEMORY_COST: u32 = 65536;

/// Default time cost for Argon2 (3 iterations)
pub const DEFAULT_TIME_COST: u32 = 3;

/// Default parallelism for Argon2 (4 lanes)
pub const DEFAULT_PARALLELISM: u32 = 4;

/// Argon2 parameters for key derivation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KdfParams {
    /// Memory cost in KB
    pub memory_cost: u32,
    /// Time cost (iterations)
    pub time_cost: u32,
    /// Parallelism degree
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_cost: DEFAULT_MEMORY_COST,
            time_cost: DEFAULT_TIME_COST,
            parallelism: DEFAULT_PARALLELISM,
        }
    }
}

impl KdfParams {
    pub fn new(memory_cost: u32, time_cost: u32, parallelism: u32) -> CryptoResult<Self> {
        if !(1..=16_777_215).contains(&parallelism) {
            return Err(CryptoError::KeyDerivation {
                message: "Parallelism must be between 1 and 16777215".to_string(),
            });
        }
        if memory_cost < 8 * parallelism {
            return Err(CryptoError::KeyDerivation {
                message: "Memory cost must be at least 8 KB per lane".to_string(),
            });
        }
        if time_cost < 1 {
            return Err(CryptoError::KeyDerivation {
                message: "Time cost must be at least 1".to_string(),
            });
        }

        Ok(Self {
            memory_cost,
            time_cost,
            parallelism,
        })
    }

    fn to_argon2_params(&self) -> CryptoResult<Params> {
        Params::new(
            self.memory_cost,
            self.time_cost,
            self.parallelism,
            Some(KEY_LENGTH),
        )
        .map_err(|e| CryptoError::KeyDerivation {
            message: format!("Invalid Argon2 parameters: {}", e),
        })
    }
}

/// Generate a cryptographically secure salt
pub fn generate_salt() -> [u8; SALT_LENGTH] {
    let mut salt = [0u8; SALT_LENGTH];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Derive a symmetric key from a passphrase using Argon2id
pub fn derive_key(passphrase: &str, salt: &[u8], params: &KdfParams) -> CryptoResult<SymmetricKey> {
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params.to_argon2_params()?);

    let mut output = [0u8; KEY_LENGTH];
    argon2.hash_password_into(passphrase.as_bytes(), salt, &mut output)?;

    let key = SymmetricKey::from_bytes(output);
    zeroize::Zeroize::zeroize(&mut output);
    Ok(key)
}
