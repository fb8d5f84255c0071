use std::{
    path::PathBuf,
    sync::{Arc, Mutex, MutexGuard},
};

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use log::{info, warn};
use rusqlite::{params, Connection, OptionalExtension};

use super::{migrations::run_migrations, validate_key, ReminderStorage};

/// SQLite-backed key/value store. Every call is a single statement, so one
/// shared connection behind a mutex is enough.
#[derive(Clone)]
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStorage {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let mut conn = Connection::open(&db_path)
            .with_context(|| format!("failed to open SQLite database {}", db_path.display()))?;

        if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
            warn!("Failed to enable WAL mode: {err}");
        }
        run_migrations(&mut conn).context("failed to run database migrations")?;

        info!("Reminder database initialized at {}", db_path.display());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("reminder database lock poisoned"))
    }
}

impl ReminderStorage for SqliteStorage {
    fn load(&self, key: &str) -> Result<Option<String>> {
        validate_key(key)?;
        self.connection()?
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .with_context(|| format!("failed to load key '{key}'"))
    }

    fn save(&self, key: &str, blob: &str) -> Result<()> {
        validate_key(key)?;
        self.connection()?
            .execute(
                "INSERT INTO kv_store (key, value, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET
                     value = excluded.value,
                     updated_at = excluded.updated_at",
                params![key, blob, Utc::now().to_rfc3339()],
            )
            .with_context(|| format!("failed to save key '{key}'"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upserts_by_key() {
        let dir = tempfile::tempdir().unwrap();
        let storage = SqliteStorage::new(dir.path().join("reminders.sqlite3")).unwrap();

        assert!(storage.load("reminders").unwrap().is_none());
        storage.save("reminders", "first").unwrap();
        storage.save("reminders", "second").unwrap();
        storage.save("other", "x").unwrap();

        assert_eq!(storage.load("reminders").unwrap().as_deref(), Some("second"));
        assert_eq!(storage.load("other").unwrap().as_deref(), Some("x"));
    }

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reminders.sqlite3");
        {
            let storage = SqliteStorage::new(path.clone()).unwrap();
            storage.save("reminders", "kept").unwrap();
        }
        let reopened = SqliteStorage::new(path).unwrap();
        assert_eq!(reopened.load("reminders").unwrap().as_deref(), Some("kept"));
    }

    #[test]
    fn clones_share_the_connection() {
        let dir = tempfile::tempdir().unwrap();
        let storage = SqliteStorage::new(dir.path().join("reminders.sqlite3")).unwrap();
        let handle = storage.clone();

        std::thread::spawn(move || handle.save("reminders", "from another thread").unwrap())
            .join()
            .unwrap();
        assert_eq!(
            storage.load("reminders").unwrap().as_deref(),
            Some("from another thread")
        );
    }
}
