//! Shared fixtures for the integration tests

#![allow(dead_code)]

use epic_crm::bootstrap::{self, NewUser};
use epic_crm::config::KeystoreBackend;
use epic_crm::keystore::{FileKeystore, SecretStore};
use epic_crm::{
    AuthGateway, ConnectionManager, CredentialStore, CrmConfig, Department, Environment,
    TokenService,
};
use std::sync::{Arc, Once};
use tempfile::TempDir;

pub const PASSWORD: &str = "correct-horse-battery";

static INIT: Once = Once::new();

pub fn init_test_env() {
    INIT.call_once(|| {
        epic_crm::logging::init_test_logging();
    });
}

/// Config rooted in `dir`, routed to `environment`, with a file keystore
pub fn config_in(dir: &TempDir, environment: Environment) -> CrmConfig {
    let mut config = CrmConfig::default();
    config.environment = environment;
    config.database.data_dir = dir.path().join("data");
    config.keystore.backend = KeystoreBackend::File;
    config.keystore.dir = dir.path().join("keystore");
    config
}

pub fn seed(username: &str, department: Department) -> NewUser {
    NewUser {
        username: username.to_string(),
        password: PASSWORD.to_string(),
        email: format!("{}@epicevents.com", username),
        name: format!("{} Tester", username),
        department,
    }
}

/// A gateway over a seeded test database and an on-disk keystore
pub struct Fixture {
    pub dir: TempDir,
    pub config: CrmConfig,
    pub gateway: Arc<AuthGateway>,
}

impl Fixture {
    pub fn new() -> Self {
        init_test_env();
        let dir = tempfile::tempdir().expect("Failed to create temp directory");
        let config = config_in(&dir, Environment::Test);

        let gateway = AuthGateway::from_config(config.clone()).expect("Failed to build gateway");
        bootstrap::initialize(
            gateway.connections(),
            &[
                seed("sam", Department::Commercial),
                seed("sue", Department::Support),
                seed("gus", Department::Gestion),
            ],
        )
        .expect("Failed to seed database");

        Self {
            dir,
            config,
            gateway: Arc::new(gateway),
        }
    }

    /// A fresh gateway over the same keystore directory and database engines,
    /// as a second command invocation would see them
    pub fn reopen(&self) -> AuthGateway {
        let store: Arc<dyn SecretStore> = Arc::new(
            FileKeystore::open(&self.config.keystore.service_name, &self.config.keystore.dir)
                .expect("Failed to reopen keystore"),
        );
        AuthGateway::new(
            CredentialStore::new(store),
            TokenService::new(),
            self.gateway.connections().clone(),
        )
    }

    pub fn connections(&self) -> &ConnectionManager {
        self.gateway.connections()
    }
}
