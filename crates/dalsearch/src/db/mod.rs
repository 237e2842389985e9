/// SQLite-backed storage for the schedule slot
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

use crate::schedule::{ScheduleStorage, StorageError};

const SCHEMA_SQL: &str = include_str!("../../../../sql/init_schedules.sql");

pub struct ScheduleDbManager {
    db: Mutex<Connection>,
}

impl ScheduleDbManager {
    /// Opens (or creates) the database file and initializes the schema
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let db_path = db_path.as_ref();
        let conn = Connection::open(db_path)?;
        info!(path = %db_path.display(), "Opened schedule database");
        Self::with_connection(conn)
    }

    /// In-memory database, gone when dropped
    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }
}

impl ScheduleStorage for ScheduleDbManager {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        let db = self.db.lock().map_err(|_| StorageError::Poisoned)?;
        let value = db
            .query_row(
                "SELECT value FROM schedule_slots WHERE storage_key = ?",
                [key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let db = self.db.lock().map_err(|_| StorageError::Poisoned)?;
        db.execute(
            "INSERT INTO schedule_slots (storage_key, value, updated_at)
             VALUES (?1, ?2, datetime('now'))
             ON CONFLICT(storage_key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at",
            (key, value),
        )?;
        debug!(key = %key, bytes = value.len(), "Saved schedule slot");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::{ScheduleStore, STORAGE_KEY};

    #[test]
    fn test_missing_slot_is_none() {
        let db = ScheduleDbManager::open_in_memory().unwrap();
        assert_eq!(db.load(STORAGE_KEY).unwrap(), None);
    }

    #[test]
    fn test_save_overwrites_slot() {
        let db = ScheduleDbManager::open_in_memory().unwrap();
        db.save(STORAGE_KEY, "[]").unwrap();
        db.save(STORAGE_KEY, r#"[{"x":1}]"#).unwrap();
        assert_eq!(db.load(STORAGE_KEY).unwrap().as_deref(), Some(r#"[{"x":1}]"#));
        assert_eq!(db.load("other").unwrap(), None);
    }

    #[test]
    fn test_file_database_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schedules.db");
        {
            let db = ScheduleDbManager::open(&path).unwrap();
            db.save(STORAGE_KEY, "[]").unwrap();
        }
        let db = ScheduleDbManager::open(&path).unwrap();
        assert_eq!(db.load(STORAGE_KEY).unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn test_store_over_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schedules.db");
        let session: crate::schedule::ClassSession = serde_json::from_str(
            r#"{"term": "202520", "section": "01", "type": "Lec", "days": ["M", "W"],
                "time": {"start": "1305", "end": "1425"}, "location": "Dunn 135",
                "crn": "30200", "course": "CSCI2110"}"#,
        )
        .unwrap();

        {
            let storage = ScheduleDbManager::open(&path).unwrap();
            let mut store = ScheduleStore::open(Box::new(storage), "202520");
            assert!(store.add(session.clone()).unwrap());
        }

        let storage = ScheduleDbManager::open(&path).unwrap();
        let store = ScheduleStore::open(Box::new(storage), "202520");
        assert_eq!(store.len(), 1);
        assert!(store.contains("30200"));
        assert_eq!(store.list()[0].session, session);
    }
}
