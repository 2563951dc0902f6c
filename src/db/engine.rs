use crate::db::profile::Environment;
use crate::error::{AuthError, AuthResult};
use log::info;
use std::path::Path;

/// An opened embedded database, shared by every profile addressing it
pub struct Engine {
    db: sled::Db,
}

impl Engine {
    pub fn open(path: &Path, environment: Environment, database_name: &str) -> AuthResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AuthError::persistence(format!(
                    "Failed to create data directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }
        let db = sled::Config::new().path(path).open()?;
        info!(
            "Opened {} database '{}' at {}",
            environment,
            database_name,
            path.display()
        );
        Ok(Self { db })
    }

    /// Next row id; monotonic, starts at 1, never reused
    pub(crate) fn next_id(&self) -> AuthResult<u64> {
        Ok(self.db.generate_id()? + 1)
    }

    pub(crate) fn get(&self, key: &[u8]) -> AuthResult<Option<Vec<u8>>> {
        Ok(self.db.get(key)?.map(|v| v.to_vec()))
    }

    pub(crate) fn scan_prefix(&self, prefix: &[u8]) -> AuthResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut rows = Vec::new();
        for entry in self.db.scan_prefix(prefix) {
            let (key, value) = entry?;
            rows.push((key.to_vec(), value.to_vec()));
        }
        Ok(rows)
    }

    /// Apply all writes atomically and make them durable
    pub(crate) fn apply(&self, batch: sled::Batch) -> AuthResult<()> {
        self.db.apply_batch(batch)?;
        self.db.flush()?;
        Ok(())
    }
}
