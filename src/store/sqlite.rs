use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;

use super::{ReminderBackend, StoreError};
use crate::db;
use crate::models::{CleanedCourse, Prescription, Reminder};

/// SQLite-backed storage. The connection is not `Sync`, so it sits
/// behind a mutex.
pub struct SqliteBackend {
    conn: Mutex<Connection>,
}

impl SqliteBackend {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Ok(Self { conn: Mutex::new(db::open_database(path)?) })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self { conn: Mutex::new(db::open_memory_database()?) })
    }
}

impl ReminderBackend for SqliteBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn load_reminders(&self) -> Result<Vec<Reminder>, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(db::load_reminders(&conn)?)
    }

    fn save_reminders(&self, reminders: &[Reminder]) -> Result<(), StoreError> {
        let mut conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        db::replace_all_reminders(&mut conn, reminders)?;
        Ok(())
    }

    fn load_prescriptions(&self) -> Result<Vec<Prescription>, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(db::load_prescription_snapshot(&conn)?)
    }

    fn save_prescriptions(&self, prescriptions: &[Prescription]) -> Result<(), StoreError> {
        let mut conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        db::save_prescription_snapshot(&mut conn, prescriptions)?;
        Ok(())
    }

    fn load_cleaned_courses(&self) -> Result<Vec<CleanedCourse>, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(db::load_cleaned_courses(&conn)?)
    }

    fn save_cleaned_courses(&self, courses: &[CleanedCourse]) -> Result<(), StoreError> {
        let mut conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        db::replace_cleaned_courses(&mut conn, courses)?;
        Ok(())
    }
}
