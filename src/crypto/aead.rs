//! AES-256-GCM sealing for data at rest
//!
//! Sealed layout: `nonce (12) || ciphertext || tag (16)`.

use crate::crypto::error::{CryptoError, CryptoResult};
use crate::crypto::keys::KEY_LENGTH;
use aes_gcm::{AeadInPlace, Aes256Gcm, KeyInit, Nonce, Tag};
use rand::rngs::OsRng;
use rand::RngCore;

const NONCE_LENGTH: usize = 12;
const TAG_LENGTH: usize = 16;

/// Encrypt `data` under `key`, binding `associated_data` into the tag
pub fn seal(data: &[u8], key: &[u8; KEY_LENGTH], associated_data: &[u8]) -> CryptoResult<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|e| CryptoError::InvalidKey {
        message: format!("Invalid encryption key: {}", e),
    })?;

    let mut nonce_bytes = [0u8; NONCE_LENGTH];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let mut buffer = data.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(nonce, associated_data, &mut buffer)
        .map_err(|e| CryptoError::Encryption {
            message: e.to_string(),
        })?;

    let mut sealed = Vec::with_capacity(NONCE_LENGTH + buffer.len() + TAG_LENGTH);
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&buffer);
    sealed.extend_from_slice(&tag);
    Ok(sealed)
}

/// Decrypt data produced by [`seal`] with the same key and associated data
pub fn open(sealed: &[u8], key: &[u8; KEY_LENGTH], associated_data: &[u8]) -> CryptoResult<Vec<u8>> {
    if sealed.len() < NONCE_LENGTH + TAG_LENGTH {
        return Err(CryptoError::Decryption {
            message: "sealed data is truncated".to_string(),
        });
    }

    let cipher = Aes256Gcm::new_from_slice(key).map_err(|e| CryptoError::InvalidKey {
        message: format!("Invalid decryption key: {}", e),
    })?;

    let nonce = Nonce::from_slice(&sealed[..NONCE_LENGTH]);
    let tag = Tag::from_slice(&sealed[sealed.len() - TAG_LENGTH..]);
    let mut plaintext = sealed[NONCE_LENGTH..sealed.len() - TAG_LENGTH].to_vec();

    cipher
        .decrypt_in_place_detached(nonce, associated_data, &mut plaintext, tag)
        .map_err(|_| CryptoError::Decryption {
            message: "authentication tag mismatch".to_string(),
        })?;

    Ok(plaintext)
}
