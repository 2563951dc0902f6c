//! Reference data and initial accounts.
//!
//! Everything here runs on a privileged session: departments and users are
//! out of reach of the restricted tier.

use crate::crypto::password::hash_password;
use crate::db::{ConnectionManager, Department, DepartmentRecord, Session, User};
use crate::error::{AuthError, AuthResult};
use crate::validation::{validate_email, validate_not_empty};
use log::{debug, info};
use serde::Deserialize;
use std::fmt;

pub use crate::db::directory::{find_department, find_user_by_username};

/// Account to create
#[derive(Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub email: String,
    pub name: String,
    pub department: Department,
}

impl fmt::Debug for NewUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewUser")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("email", &self.email)
            .field("name", &self.name)
            .field("department", &self.department)
            .finish()
    }
}

/// Create the fixed departments that do not exist yet. Returns all three.
pub fn seed_departments(manager: &ConnectionManager) -> AuthResult<Vec<DepartmentRecord>> {
    let mut session = manager.get_session(true)?;
    let mut records = Vec::with_capacity(Department::ALL.len());

    for department in Department::ALL {
        match find_department(&session, department)? {
            Some(existing) => records.push(existing),
            None => {
                let mut record = DepartmentRecord {
                    id: 0,
                    name: department,
                };
                session.insert(&mut record)?;
                debug!("Created department {} with id {}", department, record.id);
                records.push(record);
            }
        }
    }

    session.commit()?;
    info!("Departments ready on {} database", manager.environment());
    Ok(records)
}

/// Stage a new user. Username and email are unique; the password is stored
/// only as an Argon2id hash.
pub fn create_user(session: &mut Session, new_user: &NewUser) -> AuthResult<User> {
    validate_not_empty("username", &new_user.username)?;
    validate_not_empty("name", &new_user.name)?;
    validate_not_empty("password", &new_user.password)?;
    validate_email(&new_user.email)?;

    let taken = session.find::<User, _>(|u| u.username == new_user.username || u.email == new_user.email)?;
    if let Some(existing) = taken {
        let field = if existing.username == new_user.username {
            "username"
        } else {
            "email"
        };
        return Err(AuthError::persistence(format!(
            "unique constraint violated: {} already in use",
            field
        )));
    }

    let department = find_department(session, new_user.department)?.ok_or_else(|| {
        AuthError::persistence(format!("department {} has not been seeded", new_user.department))
    })?;

    let mut user = User {
        id: 0,
        username: new_user.username.clone(),
        password_hash: hash_password(&new_user.password)?,
        email: new_user.email.clone(),
        name: new_user.name.clone(),
        department_id: department.id,
    };
    session.insert(&mut user)?;
    info!("Created user {} in {}", user.username, new_user.department);
    Ok(user)
}

/// Seed departments, then create each account whose username is not taken.
/// Returns the number of accounts created.
pub fn initialize(manager: &ConnectionManager, seeds: &[NewUser]) -> AuthResult<usize> {
    seed_departments(manager)?;

    let mut session = manager.get_session(true)?;
    let mut created = 0;
    for seed in seeds {
        if find_user_by_username(&session, &seed.username)?.is_some() {
            debug!("User {} already exists; skipping", seed.username);
            continue;
        }
        create_user(&mut session, seed)?;
        created += 1;
    }
    session.commit()?;

    info!(
        "Bootstrap complete on {} database: {} user(s) created",
        manager.environment(),
        created
    );
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CrmConfig;
    use crate::crypto::password::verify_password;
    use crate::db::Environment;

    fn manager(dir: &tempfile::TempDir) -> ConnectionManager {
        let mut config = CrmConfig::default();
        config.database.data_dir = dir.path().to_path_buf();
        config.environment = Environment::Test;
        ConnectionManager::new(config)
    }

    fn seed(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            password: "s3cret-pass".to_string(),
            email: email.to_string(),
            name: "Jane Doe".to_string(),
            department: Department::Support,
        }
    }

    #[test]
    fn test_seed_departments_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(&dir);

        let first = seed_departments(&manager).unwrap();
        let second = seed_departments(&manager).unwrap();
        assert_eq!(first, second);

        let session = manager.get_session(false).unwrap();
        assert_eq!(session.all::<DepartmentRecord>().unwrap().len(), 3);
    }

    #[test]
    fn test_initialize_hashes_passwords_and_skips_existing() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(&dir);
        let seeds = vec![seed("jane", "jane@epicevents.com")];

        assert_eq!(initialize(&manager, &seeds).unwrap(), 1);
        assert_eq!(initialize(&manager, &seeds).unwrap(), 0);

        let session = manager.get_session(true).unwrap();
        let user = find_user_by_username(&session, "jane").unwrap().unwrap();
        assert_ne!(user.password_hash, "s3cret-pass");
        assert!(verify_password("s3cret-pass", &user.password_hash).unwrap());
    }

    #[test]
    fn test_duplicate_email_violates_constraint() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(&dir);
        initialize(&manager, &[seed("jane", "jane@epicevents.com")]).unwrap();

        let mut session = manager.get_session(true).unwrap();
        let err = create_user(&mut session, &seed("janet", "jane@epicevents.com")).unwrap_err();
        assert!(matches!(err, AuthError::Persistence(_)));
    }

    #[test]
    fn test_restricted_session_cannot_create_users() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(&dir);
        seed_departments(&manager).unwrap();

        let mut session = manager.get_session(false).unwrap();
        let err = create_user(&mut session, &seed("eve", "eve@epicevents.com")).unwrap_err();
        assert!(matches!(err, AuthError::Persistence(_)));
    }
}
