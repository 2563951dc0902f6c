//! Error types for cryptographic operations

use thiserror::Error;

/// Result type alias for crypto operations
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur during cryptographic operations
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Invalid key material provided
    #[error("Invalid key material: {message}")]
    InvalidKey { message: String },

    /// Error while sealing data
    #[error("Encryption failed: {message}")]
    Encryption { message: String },

    /// Authentication tag mismatch or truncated ciphertext
    #[error("Decryption failed: {message}")]
    Decryption { message: String },

    /// Error during key derivation
    #[error("Key derivation failed: {message}")]
    KeyDerivation { message: String },

    /// Error while hashing or parsing a password hash
    #[error("Password hashing failed: {message}")]
    PasswordHash { message: String },
}

impl From<argon2::Error> for CryptoError {
    fn from(err: argon2::Error) -> Self {
        CryptoError::KeyDerivation {
            message: err.to_string(),
        }
    }
}

impl From<argon2::password_hash::Error> for CryptoError {
    fn from(err: argon2::password_hash::Error) -> Self {
        CryptoError::PasswordHash {
            message: err.to_string(),
        }
    }
}
