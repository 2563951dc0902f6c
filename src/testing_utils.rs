//! Shared fixtures for in-crate tests
//!
//! A [`TestHarness`] owns a throwaway test database with the three
//! departments and four accounts already seeded, and an in-memory secret
//! store. Every account uses [`PASSWORD`].

use crate::bootstrap::{self, NewUser};
use crate::config::{CrmConfig, KeystoreBackend};
use crate::credentials::{CredentialStore, SessionContext};
use crate::crm::CrmService;
use crate::db::{directory, ConnectionManager, Department, Environment, User};
use crate::gateway::AuthGateway;
use crate::keystore::MemoryKeystore;
use crate::token::{TokenClaims, TokenService};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tempfile::TempDir;

pub(crate) const PASSWORD: &str = "Epic-Events-2024";

/// alice and dave are Commercial, bob is Support, carol is Gestion
pub(crate) const SEEDED: [(&str, Department); 4] = [
    ("alice", Department::Commercial),
    ("bob", Department::Support),
    ("carol", Department::Gestion),
    ("dave", Department::Commercial),
];

pub(crate) fn test_config(dir: &TempDir) -> CrmConfig {
    let mut config = CrmConfig::default();
    config.environment = Environment::Test;
    config.database.data_dir = dir.path().join("data");
    config.keystore.backend = KeystoreBackend::Memory;
    config.keystore.dir = dir.path().join("keystore");
    config
}

pub(crate) struct TestHarness {
    _dir: TempDir,
    gateway: Arc<AuthGateway>,
}

impl TestHarness {
    pub fn new() -> Self {
        crate::logging::init_test_logging();
        let dir = tempfile::tempdir().expect("Failed to create test directory");
        let connections = ConnectionManager::new(test_config(&dir));

        let seeds: Vec<NewUser> = SEEDED
            .iter()
            .map(|(username, department)| NewUser {
                username: username.to_string(),
                password: PASSWORD.to_string(),
                email: format!("{}@epicevents.com", username),
                name: format!("{} Example", username),
                department: *department,
            })
            .collect();
        bootstrap::initialize(&connections, &seeds).expect("Failed to seed test database");

        let credentials = CredentialStore::new(Arc::new(MemoryKeystore::new()));
        let gateway = AuthGateway::new(credentials, TokenService::new(), connections);
        Self {
            _dir: dir,
            gateway: Arc::new(gateway),
        }
    }

    pub fn gateway(&self) -> &AuthGateway {
        &self.gateway
    }

    /// A second gateway over the same store and database
    pub fn build_gateway(&self) -> AuthGateway {
        AuthGateway::new(
            self.gateway.credentials().clone(),
            self.gateway.tokens().clone(),
            self.gateway.connections().clone(),
        )
    }

    pub fn crm(&self) -> CrmService {
        CrmService::new(Arc::clone(&self.gateway))
    }

    /// Log in as a seeded account and return its context
    pub fn login(&self, username: &str) -> SessionContext {
        self.gateway
            .login(username, PASSWORD)
            .expect("login failed")
            .expect("seeded credentials rejected");
        SessionContext::new(username)
    }

    pub fn user(&self, username: &str) -> User {
        let session = self.gateway.connections().get_session(true).unwrap();
        directory::find_user_by_username(&session, username)
            .unwrap()
            .unwrap_or_else(|| panic!("no seeded user {}", username))
    }

    pub fn user_id(&self, username: &str) -> u64 {
        self.user(username).id
    }

    pub fn move_to_department(&self, username: &str, department: Department) {
        let mut session = self.gateway.connections().get_session(true).unwrap();
        let mut user = directory::find_user_by_username(&session, username)
            .unwrap()
            .unwrap();
        user.department_id = directory::find_department(&session, department)
            .unwrap()
            .unwrap()
            .id;
        session.update(&user).unwrap();
        session.commit().unwrap();
    }

    pub fn delete_user(&self, username: &str) {
        let id = self.user_id(username);
        let mut session = self.gateway.connections().get_session(true).unwrap();
        session.delete::<User>(id).unwrap();
        session.commit().unwrap();
    }

    pub fn expire_access_token(&self, username: &str) {
        self.rewrite_token(username, true);
    }

    pub fn expire_refresh_token(&self, username: &str) {
        self.rewrite_token(username, false);
    }

    fn rewrite_token(&self, username: &str, access: bool) {
        let credentials = self.gateway.credentials();
        let tokens = self.gateway.tokens();
        let mut bundle = credentials.load(username).unwrap();
        let user = self.gateway.connections().get_session(true).unwrap();
        let identity = directory::find_user_by_username(&user, username)
            .unwrap()
            .map(|u| directory::identity_for(&user, &u).unwrap())
            .unwrap();

        let claims = TokenClaims {
            user_id: identity.id,
            username: identity.username.clone(),
            department: if access { Some(identity.department) } else { None },
            exp: (Utc::now() - Duration::seconds(60)).timestamp(),
        };
        let token = tokens.sign(&claims, &bundle.symmetric_key).unwrap();
        if access {
            bundle.access_token = token;
        } else {
            bundle.refresh_token = token;
        }
        credentials.save(username, &bundle).unwrap();
    }
}
