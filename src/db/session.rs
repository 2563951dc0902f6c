use crate::db::engine::Engine;
use crate::db::models::{Record, Table};
use crate::db::profile::ConnectionProfile;
use crate::error::{AuthError, AuthResult};
use log::debug;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

/// A short-lived unit of work bound to one connection profile.
///
/// Writes are staged in memory and become visible to other sessions only on
/// [`commit`](Session::commit), which applies them as a single atomic batch.
/// Reads see the session's own staged writes. Dropping a session without
/// committing discards everything it staged.
pub struct Session {
    id: Uuid,
    profile: ConnectionProfile,
    engine: Arc<Engine>,
    staged: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

fn row_key(table: Table, id: u64) -> Vec<u8> {
    format!("{}:{:020}", table.name(), id).into_bytes()
}

fn table_prefix(table: Table) -> Vec<u8> {
    format!("{}:", table.name()).into_bytes()
}

impl Session {
    pub(crate) fn begin(profile: ConnectionProfile, engine: Arc<Engine>) -> Self {
        let id = Uuid::new_v4();
        debug!("Session {} opened on {}", id, profile);
        Self {
            id,
            profile,
            engine,
            staged: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn profile(&self) -> ConnectionProfile {
        self.profile
    }

    /// Number of staged, uncommitted writes
    pub fn pending_writes(&self) -> usize {
        self.staged.len()
    }

    pub fn get<R: Record>(&self, id: u64) -> AuthResult<Option<R>> {
        let key = row_key(R::TABLE, id);
        let bytes = match self.staged.get(&key) {
            Some(staged) => staged.clone(),
            None => self.engine.get(&key)?,
        };
        bytes
            .map(|b| serde_json::from_slice(&b).map_err(AuthError::from))
            .transpose()
    }

    /// All rows of `R`'s table in id order
    pub fn all<R: Record>(&self) -> AuthResult<Vec<R>> {
        let prefix = table_prefix(R::TABLE);
        let mut rows: BTreeMap<Vec<u8>, Vec<u8>> =
            self.engine.scan_prefix(&prefix)?.into_iter().collect();

        for (key, staged) in self.staged.range(prefix.clone()..) {
            if !key.starts_with(&prefix) {
                break;
            }
            match staged {
                Some(value) => {
                    rows.insert(key.clone(), value.clone());
                }
                None => {
                    rows.remove(key);
                }
            }
        }

        rows.values()
            .map(|b| serde_json::from_slice(b).map_err(AuthError::from))
            .collect()
    }

    pub fn filter<R, F>(&self, predicate: F) -> AuthResult<Vec<R>>
    where
        R: Record,
        F: Fn(&R) -> bool,
    {
        Ok(self.all::<R>()?.into_iter().filter(|r| predicate(r)).collect())
    }

    pub fn find<R, F>(&self, predicate: F) -> AuthResult<Option<R>>
    where
        R: Record,
        F: Fn(&R) -> bool,
    {
        Ok(self.all::<R>()?.into_iter().find(|r| predicate(r)))
    }

    /// Stage a new row; assigns and returns its id
    pub fn insert<R: Record>(&mut self, record: &mut R) -> AuthResult<u64> {
        self.ensure_writable(R::TABLE)?;
        let id = self.engine.next_id()?;
        record.set_id(id);
        self.stage(R::TABLE, id, record)?;
        Ok(id)
    }

    /// Stage a replacement of an existing row
    pub fn update<R: Record>(&mut self, record: &R) -> AuthResult<()> {
        self.ensure_writable(R::TABLE)?;
        if self.get::<R>(record.id())?.is_none() {
            return Err(AuthError::not_found(format!(
                "{} {}",
                R::TABLE,
                record.id()
            )));
        }
        self.stage(R::TABLE, record.id(), record)
    }

    /// Stage removal of a row; removing an absent row is a no-op
    pub fn delete<R: Record>(&mut self, id: u64) -> AuthResult<()> {
        self.ensure_writable(R::TABLE)?;
        self.staged.insert(row_key(R::TABLE, id), None);
        Ok(())
    }

    /// Apply all staged writes atomically
    pub fn commit(mut self) -> AuthResult<()> {
        let staged = std::mem::take(&mut self.staged);
        if staged.is_empty() {
            debug!("Session {} committed with no writes", self.id);
            return Ok(());
        }

        let count = staged.len();
        let mut batch = sled::Batch::default();
        for (key, value) in staged {
            match value {
                Some(value) => batch.insert(key, value),
                None => batch.remove(key),
            }
        }
        self.engine.apply(batch)?;
        debug!("Session {} committed {} write(s) on {}", self.id, count, self.profile);
        Ok(())
    }

    /// Discard all staged writes
    pub fn rollback(mut self) {
        let discarded = std::mem::take(&mut self.staged).len();
        debug!("Session {} rolled back {} write(s)", self.id, discarded);
    }

    fn stage<R: Record>(&mut self, table: Table, id: u64, record: &R) -> AuthResult<()> {
        let bytes = serde_json::to_vec(record)?;
        self.staged.insert(row_key(table, id), Some(bytes));
        Ok(())
    }

    fn ensure_writable(&self, table: Table) -> AuthResult<()> {
        if table.requires_privilege() && !self.profile.privilege.is_privileged() {
            return Err(AuthError::persistence(format!(
                "{} connection may not modify table '{}'",
                self.profile.privilege, table
            )));
        }
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.staged.is_empty() {
            debug!(
                "Session {} dropped without commit; discarding {} write(s)",
                self.id,
                self.staged.len()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{DepartmentRecord, Department, Client};
    use crate::db::profile::{Environment, Privilege};
    use chrono::NaiveDate;

    fn engine(dir: &tempfile::TempDir) -> Arc<Engine> {
        Arc::new(Engine::open(&dir.path().join("db"), Environment::Test, "db").unwrap())
    }

    fn session(engine: &Arc<Engine>, privilege: Privilege) -> Session {
        Session::begin(
            ConnectionProfile::new(privilege, Environment::Test),
            Arc::clone(engine),
        )
    }

    fn client(name: &str) -> Client {
        Client {
            id: 0,
            full_name: name.to_string(),
            email: format!("{}@example.com", name),
            phone: "0102030405".to_string(),
            company_name: None,
            date_created: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            last_contact_date: None,
            commercial_contact_id: Some(1),
        }
    }

    #[test]
    fn test_staged_writes_visible_only_after_commit() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(&dir);

        let mut writer = session(&engine, Privilege::Restricted);
        let mut record = client("acme");
        let id = writer.insert(&mut record).unwrap();
        assert_eq!(record.id, id);
        assert!(writer.get::<Client>(id).unwrap().is_some());

        let reader = session(&engine, Privilege::Restricted);
        assert!(reader.get::<Client>(id).unwrap().is_none());

        writer.commit().unwrap();
        assert_eq!(reader.get::<Client>(id).unwrap(), Some(record));
    }

    #[test]
    fn test_rollback_and_drop_discard_writes() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(&dir);

        let mut first = session(&engine, Privilege::Restricted);
        let id = first.insert(&mut client("a")).unwrap();
        first.rollback();

        {
            let mut second = session(&engine, Privilege::Restricted);
            second.insert(&mut client("b")).unwrap();
        }

        let reader = session(&engine, Privilege::Restricted);
        assert!(reader.get::<Client>(id).unwrap().is_none());
        assert!(reader.all::<Client>().unwrap().is_empty());
    }

    #[test]
    fn test_restricted_tier_cannot_modify_reference_tables() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(&dir);

        let mut restricted = session(&engine, Privilege::Restricted);
        let mut department = DepartmentRecord {
            id: 0,
            name: Department::Gestion,
        };
        let err = restricted.insert(&mut department).unwrap_err();
        assert!(matches!(err, AuthError::Persistence(_)));

        let mut privileged = session(&engine, Privilege::Privileged);
        privileged.insert(&mut department).unwrap();
        privileged.commit().unwrap();

        // reads stay open to the restricted tier
        let restricted = session(&engine, Privilege::Restricted);
        assert_eq!(restricted.all::<DepartmentRecord>().unwrap().len(), 1);
    }

    #[test]
    fn test_all_merges_staged_updates_and_deletes() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(&dir);

        let mut setup = session(&engine, Privilege::Restricted);
        let mut a = client("a");
        let mut b = client("b");
        setup.insert(&mut a).unwrap();
        setup.insert(&mut b).unwrap();
        setup.commit().unwrap();

        let mut work = session(&engine, Privilege::Restricted);
        a.full_name = "renamed".to_string();
        work.update(&a).unwrap();
        work.delete::<Client>(b.id).unwrap();
        let mut c = client("c");
        work.insert(&mut c).unwrap();

        let names: Vec<String> = work
            .all::<Client>()
            .unwrap()
            .into_iter()
            .map(|c| c.full_name)
            .collect();
        assert_eq!(names, vec!["renamed".to_string(), "c".to_string()]);
        assert_eq!(work.pending_writes(), 3);
    }

    #[test]
    fn test_update_of_missing_row_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(&dir);
        let mut work = session(&engine, Privilege::Restricted);
        let mut ghost = client("ghost");
        ghost.id = 42;
        assert!(matches!(work.update(&ghost), Err(AuthError::NotFound { .. })));
    }
}
