//! Epic Events CRM: credential, token and session-routing core.
//!
//! The crate is organised leaves first:
//!
//! - [`token`] mints and verifies signed identity tokens
//! - [`credentials`] keeps the encrypted token bundle of the local operator
//!   in a [`keystore::SecretStore`]
//! - [`permissions`] maps departments to the coarse actions they may perform
//! - [`db`] routes units of work between privilege tiers and environments
//! - [`gateway`] composes all of the above behind `verify_and_authorize`
//!
//! [`crm`] holds the business operations that consume the gateway.

pub mod bootstrap;
pub mod config;
pub mod credentials;
pub mod crm;
pub mod crypto;
pub mod db;
pub mod error;
pub mod gateway;
pub mod keystore;
pub mod logging;
pub mod permissions;
pub mod telemetry;
pub mod token;
pub mod validation;

#[cfg(test)]
pub(crate) mod testing_utils;

pub use config::CrmConfig;
pub use credentials::{CredentialStore, KeyProtection, SessionContext, TokenBundle};
pub use crm::{CrmService, Outcome};
pub use db::{AuthenticatedUser, ConnectionManager, Department, Environment, Privilege, Session};
pub use error::{AuthError, AuthResult};
pub use gateway::{AuthGateway, Authorization, LogoutStatus, TokenStatus};
pub use permissions::{Action, PermissionEngine};
pub use token::{TokenClaims, TokenService};
