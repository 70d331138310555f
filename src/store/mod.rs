//! Swappable persistence for the reminder collection.
//!
//! `ReminderBackend` is the only seam between `ReminderService` and
//! storage. The service always reads and writes the collection whole, so
//! adapters only need snapshot load/save.

pub mod json;
pub mod memory;
pub mod sqlite;

pub use json::JsonFileBackend;
pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;

use std::path::Path;

use thiserror::Error;

use crate::db::DatabaseError;
use crate::models::{BackendKind, CleanedCourse, Prescription, Reminder};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

pub trait ReminderBackend: Send + Sync {
    /// Short adapter name for logs.
    fn name(&self) -> &'static str;

    /// Load the full reminder collection. Unreadable records are skipped.
    fn load_reminders(&self) -> Result<Vec<Reminder>, StoreError>;

    /// Persist the full reminder collection, replacing what was stored.
    fn save_reminders(&self, reminders: &[Reminder]) -> Result<(), StoreError>;

    /// Last prescription list successfully fetched from the source.
    fn load_prescriptions(&self) -> Result<Vec<Prescription>, StoreError>;

    fn save_prescriptions(&self, prescriptions: &[Prescription]) -> Result<(), StoreError>;

    /// Medicines whose finished doses the cleanup sweep already removed.
    fn load_cleaned_courses(&self) -> Result<Vec<CleanedCourse>, StoreError>;

    fn save_cleaned_courses(&self, courses: &[CleanedCourse]) -> Result<(), StoreError>;
}

/// Open the configured backend, creating `data_dir` when needed.
pub fn open_backend(
    kind: BackendKind,
    data_dir: &Path,
) -> Result<Box<dyn ReminderBackend>, StoreError> {
    let backend: Box<dyn ReminderBackend> = match kind {
        BackendKind::Memory => Box::new(MemoryBackend::new()),
        BackendKind::Json => {
            std::fs::create_dir_all(data_dir)?;
            Box::new(JsonFileBackend::new(data_dir))
        }
        BackendKind::Sqlite => {
            std::fs::create_dir_all(data_dir)?;
            Box::new(SqliteBackend::open(&data_dir.join("medisync.db"))?)
        }
    };
    tracing::info!(backend = backend.name(), dir = %data_dir.display(), "Storage backend ready");
    Ok(backend)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_is_object_safe() {
        fn _assert_backend(_: &dyn ReminderBackend) {}
    }

    #[test]
    fn open_each_kind() {
        let dir = tempfile::tempdir().unwrap();
        for (kind, name) in [
            (BackendKind::Memory, "memory"),
            (BackendKind::Json, "json"),
            (BackendKind::Sqlite, "sqlite"),
        ] {
            let backend = open_backend(kind, &dir.path().join("data")).unwrap();
            assert_eq!(backend.name(), name);
            assert!(backend.load_reminders().unwrap().is_empty());
            assert!(backend.load_cleaned_courses().unwrap().is_empty());
        }
    }
}
