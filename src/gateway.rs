//! The single choke-point every business operation passes through.
//!
//! [`AuthGateway`] ties the credential store, token service, connection
//! manager and permission engine together. A local identity moves through
//! `NoSession -> Active -> Active(access expired) -> NoSession`: login creates
//! the session, expiry is only noticed at verification time, a refresh
//! re-activates it and logout (or a failed refresh) ends it.

use crate::config::CrmConfig;
use crate::credentials::{CredentialStore, SessionContext, TokenBundle};
use crate::crypto::password::verify_password;
use crate::crypto::SymmetricKey;
use crate::db::{directory, AuthenticatedUser, ConnectionManager};
use crate::error::{AuthError, AuthResult};
use crate::keystore::create_keystore;
use crate::permissions::{Action, PermissionEngine};
use crate::telemetry::{ErrorSink, LogSink};
use crate::token::TokenService;
use log::{debug, info, warn};
use std::fmt;
use std::sync::Arc;

/// Observed state of a stored access token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStatus {
    Active,
    /// Expired or otherwise unusable; a refresh may revive the session
    Expired,
    NoToken,
}

impl TokenStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenStatus::Active => "active",
            TokenStatus::Expired => "expired",
            TokenStatus::NoToken => "no_token",
        }
    }
}

impl fmt::Display for TokenStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutStatus {
    LoggedOut,
    NoSession,
}

impl LogoutStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogoutStatus::LoggedOut => "logged_out",
            LogoutStatus::NoSession => "no_session",
        }
    }
}

/// Result of [`AuthGateway::verify_and_authorize`]
#[derive(Debug, Clone)]
pub struct Authorization {
    /// Verified access token, if the session is active
    pub token: Option<String>,
    /// Live user row, if the session is active
    pub user: Option<AuthenticatedUser>,
    pub authorized: bool,
    pub status: TokenStatus,
}

impl Authorization {
    fn closed(status: TokenStatus) -> Self {
        Self {
            token: None,
            user: None,
            authorized: false,
            status,
        }
    }

    pub fn is_authorized(&self) -> bool {
        self.authorized
    }

    pub fn into_parts(self) -> (Option<String>, Option<AuthenticatedUser>, bool) {
        (self.token, self.user, self.authorized)
    }
}

pub struct AuthGateway {
    credentials: CredentialStore,
    tokens: TokenService,
    connections: ConnectionManager,
    permissions: PermissionEngine,
    telemetry: Arc<dyn ErrorSink>,
}

impl AuthGateway {
    pub fn new(credentials: CredentialStore, tokens: TokenService, connections: ConnectionManager) -> Self {
        Self {
            credentials,
            tokens,
            connections,
            permissions: PermissionEngine::new(),
            telemetry: Arc::new(LogSink::default()),
        }
    }

    /// Validate `config` and build every component from it
    pub fn from_config(config: CrmConfig) -> AuthResult<Self> {
        config.validate()?;
        let store = create_keystore(&config.keystore)?;
        let tokens = TokenService::from_config(&config.tokens)?;
        let telemetry = Arc::new(LogSink::new(config.telemetry.dsn.clone()));
        let connections = ConnectionManager::new(config);
        Ok(Self::new(CredentialStore::new(store), tokens, connections).with_telemetry(telemetry))
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn ErrorSink>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    pub fn permissions(&self) -> &PermissionEngine {
        &self.permissions
    }

    /// Check `password` against the stored hash and, on success, mint a
    /// token pair under a fresh key and persist it as the current identity.
    ///
    /// Unknown usernames and wrong passwords both yield `Ok(None)`.
    pub fn login(&self, username: &str, password: &str) -> AuthResult<Option<TokenBundle>> {
        self.login_inner(username, password)
            .map_err(|e| self.report(e, "login"))
    }

    fn login_inner(&self, username: &str, password: &str) -> AuthResult<Option<TokenBundle>> {
        let session = self.connections.get_session(true)?;
        let user = match directory::find_user_by_username(&session, username)? {
            Some(user) => user,
            None => {
                warn!("Login failed for {}: unknown user", username);
                return Ok(None);
            }
        };
        if !verify_password(password, &user.password_hash)? {
            warn!("Login failed for {}: wrong password", username);
            return Ok(None);
        }
        let identity = directory::identity_for(&session, &user)?;
        session.rollback();

        let key = SymmetricKey::generate();
        let access_token = self.tokens.generate_access(&identity, &key)?;
        let refresh_token = self.tokens.generate_refresh(&identity, &key)?;
        let bundle = TokenBundle::new(access_token, refresh_token, key);
        self.credentials.save(username, &bundle)?;

        info!("{} logged in ({})", username, identity.department);
        Ok(Some(bundle))
    }

    /// End the session named by the `current_user` pointer
    pub fn logout(&self) -> AuthResult<LogoutStatus> {
        match self.credentials.current_user().map_err(|e| self.report(e, "logout"))? {
            Some(username) => self.logout_as(&SessionContext::new(username)),
            None => Ok(LogoutStatus::NoSession),
        }
    }

    /// Remove everything stored for `ctx`, including a bundle left behind
    /// after the `current_user` pointer moved away or was cleared
    pub fn logout_as(&self, ctx: &SessionContext) -> AuthResult<LogoutStatus> {
        let username = ctx.username();
        match self.credentials.load(username) {
            Ok(_) => {}
            Err(AuthError::NoActiveSession) => {
                let stranded = self
                    .credentials
                    .has_entries(username)
                    .map_err(|e| self.report(e, "logout"))?;
                if !stranded {
                    return Ok(LogoutStatus::NoSession);
                }
                debug!("Removing inactive stored entries for {}", username);
            }
            Err(e) => warn!("Stored bundle for {} is unreadable ({}); removing it", username, e),
        }
        self.credentials
            .delete(username)
            .map_err(|e| self.report(e, "logout"))?;
        info!("{} logged out", username);
        Ok(LogoutStatus::LoggedOut)
    }

    /// Exchange the stored refresh token for a new access token and store
    /// it. If the refresh token is no longer usable the stored bundle is
    /// removed and the session ends.
    pub fn refresh_session(&self, username: &str) -> AuthResult<String> {
        let mut bundle = self
            .credentials
            .load(username)
            .map_err(|e| self.report(e, "refresh_session"))?;

        match self
            .tokens
            .refresh(&bundle.refresh_token, &bundle.symmetric_key, &self.connections)
        {
            Ok(access_token) => {
                bundle.access_token = access_token.clone();
                self.credentials
                    .save(username, &bundle)
                    .map_err(|e| self.report(e, "refresh_session"))?;
                Ok(access_token)
            }
            Err(e @ (AuthError::TokenExpired | AuthError::TokenInvalid { .. })) => {
                warn!("Refresh failed for {} ({}); ending session", username, e);
                self.credentials
                    .delete(username)
                    .map_err(|e| self.report(e, "refresh_session"))?;
                Err(e)
            }
            Err(e) => Err(self.report(e, "refresh_session")),
        }
    }

    pub fn check_token_status(&self, username: &str) -> TokenStatus {
        match self.credentials.load(username) {
            Ok(bundle) => {
                if self.tokens.is_expired(&bundle.access_token, &bundle.symmetric_key) {
                    TokenStatus::Expired
                } else {
                    TokenStatus::Active
                }
            }
            Err(e) => {
                self.report(e, "check_token_status");
                TokenStatus::NoToken
            }
        }
    }

    /// Context named by the `current_user` pointer
    pub fn current_context(&self) -> AuthResult<SessionContext> {
        self.credentials.current_context()
    }

    /// [`verify_and_authorize_as`](Self::verify_and_authorize_as) for the
    /// identity named by the `current_user` pointer
    pub fn verify_and_authorize(&self, action: Action) -> Authorization {
        match self.current_context() {
            Ok(ctx) => self.verify_and_authorize_as(&ctx, action),
            Err(e) => {
                self.report(e, "verify_and_authorize");
                Authorization::closed(TokenStatus::NoToken)
            }
        }
    }

    /// Load the bundle for `ctx`, verify its access token, read the live
    /// user row and check `action` against the user's current department.
    /// Fails closed: any failure yields an unauthorized result.
    pub fn verify_and_authorize_as(&self, ctx: &SessionContext, action: Action) -> Authorization {
        match self.verify_session_as(ctx) {
            Ok((token, user)) => {
                let authorized = self.permissions.authorize(action, &user);
                info!(
                    "{} {} to {}",
                    user.username,
                    if authorized { "authorized" } else { "not authorized" },
                    action
                );
                Authorization {
                    token: Some(token),
                    user: Some(user),
                    authorized,
                    status: TokenStatus::Active,
                }
            }
            Err(e) => Authorization::closed(status_of(&e)),
        }
    }

    /// Like [`verify_and_authorize_as`](Self::verify_and_authorize_as) but
    /// reports why access was refused
    pub fn require_as(&self, ctx: &SessionContext, action: Action) -> AuthResult<AuthenticatedUser> {
        let (_, user) = self.verify_session_as(ctx)?;
        self.permissions.require(action, &user)?;
        Ok(user)
    }

    /// Verify the session of `ctx` without any permission check. Returns the
    /// access token and the live user row.
    pub fn verify_session_as(&self, ctx: &SessionContext) -> AuthResult<(String, AuthenticatedUser)> {
        self.verify_session_inner(ctx)
            .map_err(|e| self.report(e, "verify_session"))
    }

    fn verify_session_inner(&self, ctx: &SessionContext) -> AuthResult<(String, AuthenticatedUser)> {
        let bundle = self.credentials.load(ctx.username())?;
        let claims = self
            .tokens
            .verify_access(&bundle.access_token, &bundle.symmetric_key)?;

        let session = self.connections.get_session(false)?;
        let user = directory::load_identity(&session, claims.user_id)?;
        session.rollback();

        match user {
            Some(user) if user.username == claims.username => {
                if Some(user.department) != claims.department {
                    debug!(
                        "{} changed department since token was minted ({:?} -> {})",
                        user.username, claims.department, user.department
                    );
                }
                Ok((bundle.access_token, user))
            }
            _ => Err(AuthError::token_invalid("token subject no longer exists")),
        }
    }

    /// Forward unexpected errors to telemetry; returns the error unchanged
    pub(crate) fn report(&self, error: AuthError, context: &str) -> AuthError {
        if !error.is_expected() {
            self.telemetry.capture(&error, context);
        }
        error
    }
}

/// Session state implied by a verification failure
fn status_of(error: &AuthError) -> TokenStatus {
    match error {
        AuthError::TokenExpired | AuthError::TokenInvalid { .. } => TokenStatus::Expired,
        _ => TokenStatus::NoToken,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Department;
    use crate::telemetry::recording::RecordingSink;
    use crate::testing_utils::{TestHarness, PASSWORD};

    #[test]
    fn test_login_persists_bundle_for_current_user() {
        let harness = TestHarness::new();
        let gateway = harness.gateway();

        let bundle = gateway.login("alice", PASSWORD).unwrap().unwrap();
        assert_eq!(gateway.credentials().load("alice").unwrap(), bundle);
        assert_eq!(gateway.current_context().unwrap().username(), "alice");

        let claims = gateway
            .tokens()
            .verify(&bundle.access_token, &bundle.symmetric_key)
            .unwrap();
        assert_eq!(claims.department, Some(Department::Commercial));
    }

    #[test]
    fn test_bad_credentials_yield_none() {
        let harness = TestHarness::new();
        let gateway = harness.gateway();
        assert!(gateway.login("alice", "wrong").unwrap().is_none());
        assert!(gateway.login("mallory", PASSWORD).unwrap().is_none());
        assert_eq!(gateway.credentials().current_user().unwrap(), None);
    }

    #[test]
    fn test_each_login_uses_fresh_key() {
        let harness = TestHarness::new();
        let gateway = harness.gateway();
        let first = gateway.login("alice", PASSWORD).unwrap().unwrap();
        let second = gateway.login("alice", PASSWORD).unwrap().unwrap();
        assert_ne!(first.symmetric_key, second.symmetric_key);
    }

    #[test]
    fn test_verify_and_authorize_without_session_fails_closed() {
        let harness = TestHarness::new();
        let auth = harness.gateway().verify_and_authorize(Action::CreateClient);
        assert_eq!(auth.clone().into_parts(), (None, None, false));
        assert_eq!(auth.status, TokenStatus::NoToken);
    }

    #[test]
    fn test_verify_and_authorize_uses_live_department() {
        let harness = TestHarness::new();
        let gateway = harness.gateway();
        gateway.login("alice", PASSWORD).unwrap();

        let auth = gateway.verify_and_authorize(Action::CreateClient);
        assert!(auth.authorized);
        assert_eq!(auth.user.as_ref().unwrap().username, "alice");

        harness.move_to_department("alice", Department::Gestion);
        let auth = gateway.verify_and_authorize(Action::CreateClient);
        assert!(!auth.authorized);
        assert_eq!(auth.status, TokenStatus::Active);
        assert!(gateway.verify_and_authorize(Action::CreateContract).authorized);
    }

    #[test]
    fn test_expired_access_token_is_reported_not_refreshed() {
        let harness = TestHarness::new();
        let gateway = harness.gateway();
        gateway.login("bob", PASSWORD).unwrap();
        harness.expire_access_token("bob");

        assert_eq!(gateway.check_token_status("bob"), TokenStatus::Expired);
        let auth = gateway.verify_and_authorize(Action::UpdateEvent);
        assert!(!auth.authorized);
        assert_eq!(auth.status, TokenStatus::Expired);

        gateway.refresh_session("bob").unwrap();
        assert_eq!(gateway.check_token_status("bob"), TokenStatus::Active);
        assert!(gateway.verify_and_authorize(Action::UpdateEvent).authorized);
    }

    #[test]
    fn test_failed_refresh_ends_session() {
        let harness = TestHarness::new();
        let gateway = harness.gateway();
        gateway.login("bob", PASSWORD).unwrap();
        harness.expire_access_token("bob");
        harness.expire_refresh_token("bob");

        assert!(matches!(gateway.refresh_session("bob"), Err(AuthError::TokenExpired)));
        assert_eq!(gateway.check_token_status("bob"), TokenStatus::NoToken);
        assert!(matches!(
            gateway.refresh_session("bob"),
            Err(AuthError::NoActiveSession)
        ));
    }

    #[test]
    fn test_refresh_honors_department_change() {
        let harness = TestHarness::new();
        let gateway = harness.gateway();
        gateway.login("dave", PASSWORD).unwrap();
        harness.move_to_department("dave", Department::Support);

        let token = gateway.refresh_session("dave").unwrap();
        let bundle = gateway.credentials().load("dave").unwrap();
        let claims = gateway.tokens().verify(&token, &bundle.symmetric_key).unwrap();
        assert_eq!(claims.department, Some(Department::Support));
        assert_eq!(bundle.access_token, token);
    }

    #[test]
    fn test_logout_statuses() {
        let harness = TestHarness::new();
        let gateway = harness.gateway();
        assert_eq!(gateway.logout().unwrap(), LogoutStatus::NoSession);

        gateway.login("carol", PASSWORD).unwrap();
        assert_eq!(gateway.logout().unwrap(), LogoutStatus::LoggedOut);
        assert_eq!(gateway.logout().unwrap(), LogoutStatus::NoSession);
        assert_eq!(gateway.check_token_status("carol"), TokenStatus::NoToken);
        assert_eq!(LogoutStatus::LoggedOut.as_str(), "logged_out");
    }

    #[test]
    fn test_explicit_contexts_are_independent() {
        let harness = TestHarness::new();
        let gateway = harness.gateway();
        gateway.login("alice", PASSWORD).unwrap();
        gateway.login("carol", PASSWORD).unwrap();

        let alice = SessionContext::new("alice");
        let carol = SessionContext::new("carol");
        assert!(gateway.verify_and_authorize_as(&alice, Action::CreateClient).authorized);
        assert!(gateway.verify_and_authorize_as(&carol, Action::ManageUsers).authorized);
        assert!(matches!(
            gateway.require_as(&alice, Action::ManageUsers),
            Err(AuthError::AuthorizationDenied { .. })
        ));

        // the pointer names the most recent login
        assert_eq!(gateway.current_context().unwrap(), carol);
    }

    #[test]
    fn test_logout_as_cleans_up_after_pointer_cleared() {
        let harness = TestHarness::new();
        let gateway = harness.gateway();
        gateway.login("alice", PASSWORD).unwrap();
        gateway.login("carol", PASSWORD).unwrap();

        assert_eq!(gateway.logout().unwrap(), LogoutStatus::LoggedOut);
        let alice = SessionContext::new("alice");
        let auth = gateway.verify_and_authorize_as(&alice, Action::CreateClient);
        assert!(!auth.authorized);
        assert_eq!(auth.status, TokenStatus::NoToken);
        assert!(gateway.credentials().has_entries("alice").unwrap());

        assert_eq!(gateway.logout_as(&alice).unwrap(), LogoutStatus::LoggedOut);
        assert!(!gateway.credentials().has_entries("alice").unwrap());
        assert_eq!(gateway.logout_as(&alice).unwrap(), LogoutStatus::NoSession);
    }

    #[test]
    fn test_deleted_user_loses_access() {
        let harness = TestHarness::new();
        let gateway = harness.gateway();
        gateway.login("dave", PASSWORD).unwrap();
        harness.delete_user("dave");

        let auth = gateway.verify_and_authorize(Action::CreateClient);
        assert!(!auth.authorized);
        assert!(auth.user.is_none());
        assert!(gateway.refresh_session("dave").is_err());
        assert_eq!(gateway.check_token_status("dave"), TokenStatus::NoToken);
    }

    #[test]
    fn test_expected_failures_are_not_sent_to_telemetry() {
        let harness = TestHarness::new();
        let sink = Arc::new(RecordingSink::default());
        let gateway = harness.build_gateway().with_telemetry(sink.clone());

        gateway.verify_and_authorize(Action::CreateClient);
        gateway.check_token_status("nobody");
        assert!(sink.captured.lock().unwrap().is_empty());
    }
}
