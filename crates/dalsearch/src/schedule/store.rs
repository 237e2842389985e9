//! The user's selected sessions, keyed by CRN, with stable display colours.
//!
//! The store owns the canonical list and writes it through a
//! [`ScheduleStorage`] port after every mutation. Storage is a single
//! key-value slot holding `[{ "class": ClassSession, "color": "#rrggbb" }]`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::types::ClassSession;

/// Slot the selected sessions are persisted under.
pub const STORAGE_KEY: &str = "timeSlots";

/// Colours handed out by insertion order.
pub const PALETTE: [&str; 22] = [
    "#3498db", "#2ecc71", "#e74c3c", "#f39c12", "#9b59b6", "#1abc9c", "#e67e22", "#34495e",
    "#16a085", "#8e44ad", "#d35400", "#27ae60", "#2980b9", "#c0392b", "#f1c40f", "#2c3e50",
    "#7f8c8d", "#27ae60", "#2874a6", "#a04000", "#117864", "#6c3483",
];

fn palette_color(position: usize) -> String {
    PALETTE[position % PALETTE.len()].to_string()
}

/// Errors from a persistence backend.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage lock poisoned")]
    Poisoned,
}

/// A durable key-value slot for serialized state.
pub trait ScheduleStorage: Send {
    /// Returns the stored value, or `None` if nothing was ever saved under `key`.
    fn load(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn save(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// In-process storage, mainly for tests.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    slots: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ScheduleStorage for MemoryStorage {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        let slots = self.slots.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(slots.get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut slots = self.slots.lock().map_err(|_| StorageError::Poisoned)?;
        slots.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// One `<key>.json` file per slot inside a directory.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    dir: PathBuf,
}

impl JsonFileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl ScheduleStorage for JsonFileStorage {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir)?;
        // write-then-rename so a crash never leaves a half-written slot
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(tmp, path)?;
        Ok(())
    }
}

/// A selected session together with its display colour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    #[serde(rename = "class")]
    pub session: ClassSession,
    pub color: String,
}

pub struct ScheduleStore {
    storage: Box<dyn ScheduleStorage>,
    entries: Vec<ScheduleEntry>,
    active_term: String,
}

impl ScheduleStore {
    /// Opens the store, restoring whatever the storage slot holds.
    ///
    /// Unreadable or corrupt slots are logged and treated as empty.
    pub fn open(storage: Box<dyn ScheduleStorage>, active_term: impl Into<String>) -> Self {
        let entries = match storage.load(STORAGE_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<ScheduleEntry>>(&raw) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(error = %e, "Stored schedule is corrupt, starting empty");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "Failed to read stored schedule, starting empty");
                Vec::new()
            }
        };

        info!(entries = entries.len(), "Schedule store opened");

        Self {
            storage,
            entries,
            active_term: active_term.into(),
        }
    }

    /// All entries in insertion order.
    pub fn list(&self) -> &[ScheduleEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, crn: &str) -> bool {
        self.entries.iter().any(|e| e.session.crn == crn)
    }

    /// Adds a session unless its CRN is already present.
    ///
    /// Returns whether the session was inserted. If saving fails the
    /// selection is left unchanged.
    pub fn add(&mut self, session: ClassSession) -> Result<bool, StorageError> {
        if self.contains(&session.crn) {
            debug!(crn = %session.crn, "Session already selected");
            return Ok(false);
        }
        let color = palette_color(self.entries.len());
        debug!(crn = %session.crn, color = %color, "Adding session");
        let mut entries = self.entries.clone();
        entries.push(ScheduleEntry { session, color });
        self.commit(entries)?;
        Ok(true)
    }

    /// Removes the session with `crn`. Returns whether anything was removed.
    pub fn remove(&mut self, crn: &str) -> Result<bool, StorageError> {
        if !self.contains(crn) {
            return Ok(false);
        }
        let entries = self
            .entries
            .iter()
            .filter(|e| e.session.crn != crn)
            .cloned()
            .collect();
        self.commit(entries)?;
        debug!(crn = %crn, "Removed session");
        Ok(true)
    }

    /// Discards every entry and rebuilds from `sessions`, recolouring by new order.
    pub fn replace_all(&mut self, sessions: Vec<ClassSession>) -> Result<(), StorageError> {
        let entries = sessions
            .into_iter()
            .enumerate()
            .map(|(i, session)| ScheduleEntry {
                session,
                color: palette_color(i),
            })
            .collect();
        self.commit(entries)?;
        info!(entries = self.entries.len(), "Replaced schedule");
        Ok(())
    }

    pub fn active_term(&self) -> &str {
        &self.active_term
    }

    pub fn set_active_term(&mut self, term: impl Into<String>) {
        self.active_term = term.into();
    }

    /// Entries belonging to `term`, in insertion order.
    pub fn entries_in_term(&self, term: &str) -> Vec<ScheduleEntry> {
        self.entries
            .iter()
            .filter(|e| e.session.term == term)
            .cloned()
            .collect()
    }

    /// Saves `entries` and only then makes them the current selection.
    fn commit(&mut self, entries: Vec<ScheduleEntry>) -> Result<(), StorageError> {
        let raw = serde_json::to_string(&entries)?;
        self.storage.save(STORAGE_KEY, &raw)?;
        self.entries = entries;
        Ok(())
    }
}
