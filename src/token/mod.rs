//! Signed identity tokens.
//!
//! Tokens are HS256 JSON Web Tokens keyed by the per-login
//! [`SymmetricKey`]. Access tokens carry a department snapshot taken at mint
//! time; refresh tokens carry identity only and are exchanged for a new
//! access token minted from the *current* user row.

use crate::config::TokenConfig;
use crate::crypto::SymmetricKey;
use crate::db::{AuthenticatedUser, Department};
use crate::error::{AuthError, AuthResult};
use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

/// Default access token lifetime
pub const ACCESS_TOKEN_TTL_MINUTES: i64 = 30;

/// Default refresh token lifetime
pub const REFRESH_TOKEN_TTL_DAYS: i64 = 7;

/// Token payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub user_id: u64,
    pub username: String,
    /// Present in access tokens only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<Department>,
    /// Expiry, unix seconds
    pub exp: i64,
}

impl TokenClaims {
    pub fn is_access(&self) -> bool {
        self.department.is_some()
    }
}

/// Source of live user rows for [`TokenService::refresh`]
pub trait UserDirectory {
    fn find_user(&self, user_id: u64) -> AuthResult<Option<AuthenticatedUser>>;
}

/// Mints, verifies and refreshes tokens. Holds no state besides lifetimes.
#[derive(Debug, Clone)]
pub struct TokenService {
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl Default for TokenService {
    fn default() -> Self {
        Self {
            access_ttl: Duration::minutes(ACCESS_TOKEN_TTL_MINUTES),
            refresh_ttl: Duration::days(REFRESH_TOKEN_TTL_DAYS),
        }
    }
}

impl TokenService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Custom lifetimes; the refresh lifetime must exceed the access lifetime
    pub fn with_lifetimes(access_ttl: Duration, refresh_ttl: Duration) -> AuthResult<Self> {
        if access_ttl <= Duration::zero() {
            return Err(AuthError::validation("access token lifetime must be positive"));
        }
        if refresh_ttl <= access_ttl {
            return Err(AuthError::validation(
                "refresh token lifetime must exceed access token lifetime",
            ));
        }
        expires_at(refresh_ttl)?;
        Ok(Self {
            access_ttl,
            refresh_ttl,
        })
    }

    pub fn from_config(config: &TokenConfig) -> AuthResult<Self> {
        Self::with_lifetimes(config.access_ttl()?, config.refresh_ttl()?)
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Mint an access token carrying the user's department snapshot
    pub fn generate_access(&self, user: &AuthenticatedUser, key: &SymmetricKey) -> AuthResult<String> {
        let claims = TokenClaims {
            user_id: user.id,
            username: user.username.clone(),
            department: Some(user.department),
            exp: expires_at(self.access_ttl)?,
        };
        self.sign(&claims, key)
    }

    /// Mint a refresh token (no department claim)
    pub fn generate_refresh(&self, user: &AuthenticatedUser, key: &SymmetricKey) -> AuthResult<String> {
        let claims = TokenClaims {
            user_id: user.id,
            username: user.username.clone(),
            department: None,
            exp: expires_at(self.refresh_ttl)?,
        };
        self.sign(&claims, key)
    }

    /// Sign arbitrary claims with `key`
    pub fn sign(&self, claims: &TokenClaims, key: &SymmetricKey) -> AuthResult<String> {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(key.as_bytes()),
        )
        .map_err(|e| AuthError::token_invalid(format!("failed to sign token: {}", e)))
    }

    /// Check signature, structure and expiry
    pub fn verify(&self, token: &str, key: &SymmetricKey) -> AuthResult<TokenClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        decode::<TokenClaims>(token, &DecodingKey::from_secret(key.as_bytes()), &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => {
                    debug!("Token has expired");
                    AuthError::TokenExpired
                }
                _ => {
                    debug!("Token is invalid: {}", e);
                    AuthError::token_invalid(e.to_string())
                }
            })
    }

    /// [`verify`](Self::verify), additionally requiring an access token
    pub fn verify_access(&self, token: &str, key: &SymmetricKey) -> AuthResult<TokenClaims> {
        let claims = self.verify(token, key)?;
        if !claims.is_access() {
            return Err(AuthError::token_invalid("refresh token presented as access token"));
        }
        Ok(claims)
    }

    /// `true` unless the token verifies; an invalid token counts as expired
    pub fn is_expired(&self, token: &str, key: &SymmetricKey) -> bool {
        self.verify(token, key).is_err()
    }

    /// Exchange a refresh token for a new access token minted from the
    /// user's current row, so department changes since login are honored.
    pub fn refresh(
        &self,
        refresh_token: &str,
        key: &SymmetricKey,
        directory: &dyn UserDirectory,
    ) -> AuthResult<String> {
        let claims = self.verify(refresh_token, key)?;
        if claims.is_access() {
            return Err(AuthError::token_invalid("access token presented as refresh token"));
        }

        let user = directory.find_user(claims.user_id)?.ok_or_else(|| {
            warn!("Refresh for unknown user id {}", claims.user_id);
            AuthError::token_invalid("user not found")
        })?;
        if user.username != claims.username {
            return Err(AuthError::token_invalid("token subject no longer matches user"));
        }

        let token = self.generate_access(&user, key)?;
        info!(
            "Refreshed access token for {} (department {})",
            user.username, user.department
        );
        Ok(token)
    }
}

/// Unix expiry of a token minted now with lifetime `ttl`
fn expires_at(ttl: Duration) -> AuthResult<i64> {
    Utc::now()
        .checked_add_signed(ttl)
        .map(|at| at.timestamp())
        .ok_or_else(|| AuthError::validation("token lifetime overflows the clock"))
}
