//! Cryptographic primitives used by the token and credential layers.
//!
//! - [`keys`]: per-login symmetric keys
//! - [`aead`]: AES-256-GCM sealing of data at rest
//! - [`kdf`]: Argon2id passphrase key derivation
//! - [`password`]: Argon2id password hashing for login

pub mod aead;
pub mod error;
pub mod kdf;
pub mod keys;
pub mod password;

pub use error::{CryptoError, CryptoResult};
pub use kdf::KdfParams;
pub use keys::{SymmetricKey, KEY_LENGTH};
