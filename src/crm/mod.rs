//! Business operations on clients, contracts, events and collaborators.
//!
//! Every operation takes an explicit [`SessionContext`], passes through the
//! gateway, applies any ownership rule and then does its work in one fresh
//! session that is committed on success and discarded otherwise.

pub mod clients;
pub mod collaborators;
pub mod contracts;
pub mod events;
pub mod outcome;


pub use clients::{ClientChanges, NewClient};
pub use collaborators::CollaboratorChanges;
pub use contracts::{ContractChanges, ContractFilter, NewContract};
pub use events::{EventChanges, EventFilter, NewEvent};
pub use outcome::{Denied, Outcome, DENIED_MESSAGE};

use crate::credentials::SessionContext;
use crate::db::{AuthenticatedUser, Session};
use crate::error::{AuthError, AuthResult};
use crate::gateway::{AuthGateway, Authorization, TokenStatus};
use crate::permissions::Action;
use log::info;
use outcome::DenialReason;
use std::sync::Arc;

pub struct CrmService {
    gateway: Arc<AuthGateway>,
}

impl CrmService {
    pub fn new(gateway: Arc<AuthGateway>) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &AuthGateway {
        &self.gateway
    }

    /// Gated operation on a restricted session
    fn run<T, F>(&self, ctx: &SessionContext, action: Action, op: F) -> AuthResult<Outcome<T>>
    where
        F: FnOnce(&AuthenticatedUser, &mut Session) -> AuthResult<T>,
    {
        self.execute(ctx, Some(action), false, action.as_str(), op)
    }

    /// Gated operation on a privileged session
    fn run_privileged<T, F>(&self, ctx: &SessionContext, action: Action, op: F) -> AuthResult<Outcome<T>>
    where
        F: FnOnce(&AuthenticatedUser, &mut Session) -> AuthResult<T>,
    {
        self.execute(ctx, Some(action), true, action.as_str(), op)
    }

    /// Read open to any active session
    fn read<T, F>(&self, ctx: &SessionContext, name: &str, op: F) -> AuthResult<Outcome<T>>
    where
        F: FnOnce(&AuthenticatedUser, &mut Session) -> AuthResult<T>,
    {
        self.execute(ctx, None, false, name, op)
    }

    fn execute<T, F>(
        &self,
        ctx: &SessionContext,
        action: Option<Action>,
        privileged: bool,
        name: &str,
        op: F,
    ) -> AuthResult<Outcome<T>>
    where
        F: FnOnce(&AuthenticatedUser, &mut Session) -> AuthResult<T>,
    {
        let result = self.authorize(ctx, action).and_then(|user| {
            let mut session = self.gateway.connections().get_session(privileged)?;
            let value = op(&user, &mut session)?;
            session.commit()?;
            Ok(value)
        });
        self.settle(ctx, name, result)
    }

    fn authorize(&self, ctx: &SessionContext, action: Option<Action>) -> AuthResult<AuthenticatedUser> {
        let action = match action {
            Some(action) => action,
            None => return self.gateway.verify_session_as(ctx).map(|(_, user)| user),
        };

        match self.gateway.verify_and_authorize_as(ctx, action) {
            Authorization {
                user: Some(user),
                authorized: true,
                ..
            } => Ok(user),
            Authorization {
                status: TokenStatus::Active,
                ..
            } => Err(AuthError::AuthorizationDenied {
                action: action.to_string(),
            }),
            Authorization {
                status: TokenStatus::Expired,
                ..
            } => Err(AuthError::TokenExpired),
            Authorization { .. } => Err(AuthError::NoActiveSession),
        }
    }

    /// Turn expected failures into outcomes; anything else stays an error
    fn settle<T>(&self, ctx: &SessionContext, name: &str, result: AuthResult<T>) -> AuthResult<Outcome<T>> {
        let reason = match result {
            Ok(value) => return Ok(Outcome::Completed(value)),
            Err(AuthError::AuthorizationDenied { .. }) => DenialReason::Authorization,
            Err(AuthError::OwnershipDenied { .. }) => DenialReason::Ownership,
            Err(AuthError::NotFound { .. }) => DenialReason::NotFound,
            Err(AuthError::TokenExpired) | Err(AuthError::TokenInvalid { .. }) => {
                return Ok(Outcome::SessionRequired(TokenStatus::Expired))
            }
            Err(AuthError::NoActiveSession) => return Ok(Outcome::SessionRequired(TokenStatus::NoToken)),
            Err(AuthError::Validation(message)) => return Ok(Outcome::Rejected(message)),
            Err(e) => return Err(self.gateway.report(e, name)),
        };
        info!("{} denied to {} ({:?})", name, ctx.username(), reason);
        Ok(Outcome::Denied(Denied::new(reason)))
    }
}

/// Fetch a row or fail with `NotFound`
pub(crate) fn fetch<R: crate::db::Record>(session: &Session, id: u64) -> AuthResult<R> {
    session
        .get::<R>(id)?
        .ok_or_else(|| AuthError::not_found(format!("{} {}", R::TABLE, id)))
}
