use crate::config::CrmConfig;
use crate::db::directory;
use crate::db::engine::Engine;
use crate::db::models::AuthenticatedUser;
use crate::db::profile::{ConnectionProfile, Environment, Privilege};
use crate::db::session::Session;
use crate::error::AuthResult;
use crate::token::UserDirectory;
use log::info;
use once_cell::sync::OnceCell;
use std::sync::Arc;

/// Lazily-initialized profiles, cached for the lifetime of the process.
///
/// Both production profiles address the same database and share its engine;
/// the test database is a single profile usable under either tier.
#[derive(Default)]
struct ProfileCache {
    production_engine: OnceCell<Arc<Engine>>,
    privileged_production: OnceCell<Arc<Engine>>,
    restricted_production: OnceCell<Arc<Engine>>,
    test: OnceCell<Arc<Engine>>,
}

/// Routes sessions to the engine selected by (privilege, environment).
///
/// The environment is fixed when the manager is built. Use
/// [`for_environment`](Self::for_environment) to obtain a sibling manager
/// for the other environment; siblings share the same opened engines.
#[derive(Clone)]
pub struct ConnectionManager {
    config: Arc<CrmConfig>,
    environment: Environment,
    cache: Arc<ProfileCache>,
}

impl ConnectionManager {
    /// Build a manager routed to `config.environment`
    pub fn new(config: CrmConfig) -> Self {
        let environment = config.environment;
        Self {
            config: Arc::new(config),
            environment,
            cache: Arc::new(ProfileCache::default()),
        }
    }

    pub fn config(&self) -> &CrmConfig {
        &self.config
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// A manager routed to `environment`, sharing this manager's engines
    pub fn for_environment(&self, environment: Environment) -> Self {
        Self {
            config: Arc::clone(&self.config),
            environment,
            cache: Arc::clone(&self.cache),
        }
    }

    /// Open a new unit of work on the current environment
    pub fn get_session(&self, privileged: bool) -> AuthResult<Session> {
        self.session_for(ConnectionProfile::new(
            Privilege::from_flag(privileged),
            self.environment,
        ))
    }

    /// Open a new unit of work on an explicit profile
    pub fn session_for(&self, profile: ConnectionProfile) -> AuthResult<Session> {
        let engine = self.engine_for(profile)?;
        Ok(Session::begin(profile, engine))
    }

    /// Number of profiles initialized so far
    pub fn initialized_profiles(&self) -> usize {
        [
            self.cache.privileged_production.get().is_some(),
            self.cache.restricted_production.get().is_some(),
            self.cache.test.get().is_some(),
        ]
        .iter()
        .filter(|initialized| **initialized)
        .count()
    }

    fn engine_for(&self, profile: ConnectionProfile) -> AuthResult<Arc<Engine>> {
        let slot = match (profile.environment, profile.privilege) {
            (Environment::Production, Privilege::Privileged) => &self.cache.privileged_production,
            (Environment::Production, Privilege::Restricted) => &self.cache.restricted_production,
            (Environment::Test, _) => &self.cache.test,
        };

        slot.get_or_try_init(|| {
            let engine = match profile.environment {
                Environment::Production => self
                    .cache
                    .production_engine
                    .get_or_try_init(|| self.open_engine(Environment::Production))?
                    .clone(),
                Environment::Test => self.open_engine(Environment::Test)?,
            };
            info!(
                "Initialized connection profile {} -> {}",
                profile,
                self.config.redacted_uri(profile.privilege, profile.environment)
            );
            Ok(engine)
        })
        .map(Arc::clone)
    }

    fn open_engine(&self, environment: Environment) -> AuthResult<Arc<Engine>> {
        let path = self.config.database_path(environment);
        let engine = Engine::open(&path, environment, self.config.database_name(environment))?;
        Ok(Arc::new(engine))
    }
}

impl UserDirectory for ConnectionManager {
    /// Reads the live user row through a privileged session
    fn find_user(&self, user_id: u64) -> AuthResult<Option<AuthenticatedUser>> {
        let session = self.get_session(true)?;
        let user = directory::load_identity(&session, user_id)?;
        session.rollback();
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{Client, Record};
    use chrono::NaiveDate;

    fn manager(dir: &tempfile::TempDir, environment: Environment) -> ConnectionManager {
        let mut config = CrmConfig::default();
        config.database.data_dir = dir.path().to_path_buf();
        config.environment = environment;
        ConnectionManager::new(config)
    }

    fn client() -> Client {
        Client {
            id: 0,
            full_name: "Kevin Casey".to_string(),
            email: "kevin@startup.io".to_string(),
            phone: "+678 123 456 78".to_string(),
            company_name: Some("Cool Startup LLC".to_string()),
            date_created: NaiveDate::from_ymd_opt(2021, 4, 18).unwrap(),
            last_contact_date: None,
            commercial_contact_id: None,
        }
    }

    #[test]
    fn test_profiles_initialize_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(&dir, Environment::Production);
        assert_eq!(manager.initialized_profiles(), 0);

        manager.get_session(false).unwrap().rollback();
        assert_eq!(manager.initialized_profiles(), 1);

        manager.get_session(false).unwrap().rollback();
        manager.get_session(true).unwrap().rollback();
        assert_eq!(manager.initialized_profiles(), 2);
    }

    #[test]
    fn test_sessions_follow_manager_environment() {
        let dir = tempfile::tempdir().unwrap();
        let production = manager(&dir, Environment::Production);
        let test = production.for_environment(Environment::Test);

        let session = test.get_session(true).unwrap();
        assert_eq!(session.profile().environment, Environment::Test);
        assert!(session.profile().privilege.is_privileged());
        session.rollback();

        let session = production.get_session(false).unwrap();
        assert_eq!(
            session.profile(),
            ConnectionProfile::new(Privilege::Restricted, Environment::Production)
        );
    }

    #[test]
    fn test_test_database_is_disjoint_from_production() {
        let dir = tempfile::tempdir().unwrap();
        let production = manager(&dir, Environment::Production);
        let test = production.for_environment(Environment::Test);

        let mut session = test.get_session(false).unwrap();
        let mut record = client();
        let id = session.insert(&mut record).unwrap();
        session.commit().unwrap();

        let test_reader = test.get_session(false).unwrap();
        assert!(test_reader.get::<Client>(id).unwrap().is_some());

        let production_reader = production.get_session(false).unwrap();
        assert!(production_reader.get::<Client>(record.id()).unwrap().is_none());
        assert!(production_reader.all::<Client>().unwrap().is_empty());
    }

    #[test]
    fn test_privilege_tiers_share_production_data() {
        let dir = tempfile::tempdir().unwrap();
        let production = manager(&dir, Environment::Production);

        let mut writer = production.get_session(false).unwrap();
        let id = writer.insert(&mut client()).unwrap();
        writer.commit().unwrap();

        let admin = production.get_session(true).unwrap();
        assert!(admin.get::<Client>(id).unwrap().is_some());
    }
}
