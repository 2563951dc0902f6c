use crate::config::ConfigError;
use crate::crypto::CryptoError;
use crate::keystore::KeystoreError;
use thiserror::Error;

/// Unified error type for the authentication subsystem and the business
/// operations built on it.
///
/// The first six variants are the domain taxonomy callers branch on. The
/// remaining ones carry failures of the ambient machinery (crypto, config,
/// input validation).
#[derive(Error, Debug)]
pub enum AuthError {
    /// The token's `exp` claim has passed
    #[error("Token has expired")]
    TokenExpired,

    /// Bad signature, malformed structure or wrong token kind
    #[error("Token is invalid: {message}")]
    TokenInvalid { message: String },

    /// Nothing usable in the secret store for the requested identity
    #[error("No active session")]
    NoActiveSession,

    /// Valid session, but the department lacks the coarse permission
    #[error("Not authorized to perform '{action}'")]
    AuthorizationDenied { action: String },

    /// Coarse permission granted, but the caller does not own the record
    #[error("Not the owner of {resource}")]
    OwnershipDenied { resource: String },

    /// The targeted record does not exist
    #[error("{resource} not found")]
    NotFound { resource: String },

    /// Store unreachable, constraint violated or privilege tier too low
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Field value rejected before it reached the store
    #[error("Validation error: {0}")]
    Validation(String),
}

impl AuthError {
    pub fn token_invalid<S: Into<String>>(message: S) -> Self {
        Self::TokenInvalid {
            message: message.into(),
        }
    }

    pub fn persistence<S: Into<String>>(message: S) -> Self {
        Self::Persistence(message.into())
    }

    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found<S: Into<String>>(resource: S) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn ownership_denied<S: Into<String>>(resource: S) -> Self {
        Self::OwnershipDenied {
            resource: resource.into(),
        }
    }

    /// Outcomes that are part of normal operation and are not reported to
    /// the error telemetry sink.
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            AuthError::TokenExpired
                | AuthError::TokenInvalid { .. }
                | AuthError::NoActiveSession
                | AuthError::AuthorizationDenied { .. }
                | AuthError::OwnershipDenied { .. }
                | AuthError::NotFound { .. }
                | AuthError::Validation(_)
        )
    }
}

impl From<sled::Error> for AuthError {
    fn from(error: sled::Error) -> Self {
        AuthError::Persistence(error.to_string())
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(error: serde_json::Error) -> Self {
        AuthError::Persistence(format!("Serialization failed: {}", error))
    }
}

impl From<KeystoreError> for AuthError {
    fn from(error: KeystoreError) -> Self {
        AuthError::Persistence(error.to_string())
    }
}

/// Result type alias for operations that can fail with an [`AuthError`]
pub type AuthResult<T> = Result<T, AuthError>;
