use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{ReminderBackend, StoreError};
use crate::models::{CleanedCourse, Prescription, Reminder};

const REMINDERS_FILE: &str = "reminders.json";
const PRESCRIPTIONS_FILE: &str = "prescriptions.json";
const CLEANED_FILE: &str = "cleaned_courses.json";

/// Snapshot files in a data directory, one JSON array per collection.
pub struct JsonFileBackend {
    dir: PathBuf,
}

impl JsonFileBackend {
    pub fn new(dir: &Path) -> Self {
        Self { dir: dir.to_path_buf() }
    }

    pub fn reminders_path(&self) -> PathBuf {
        self.dir.join(REMINDERS_FILE)
    }

    pub fn prescriptions_path(&self) -> PathBuf {
        self.dir.join(PRESCRIPTIONS_FILE)
    }

    pub fn cleaned_path(&self) -> PathBuf {
        self.dir.join(CLEANED_FILE)
    }
}

/// Read a JSON array, decoding each element on its own so one bad record
/// does not take the rest down with it. A missing file is an empty list.
fn load_array<T: DeserializeOwned>(path: &Path, what: &str) -> Result<Vec<T>, StoreError> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let content = fs::read_to_string(path)?;
    let values: Vec<serde_json::Value> = serde_json::from_str(&content)?;

    let mut items = Vec::with_capacity(values.len());
    for (index, value) in values.into_iter().enumerate() {
        match serde_json::from_value::<T>(value) {
            Ok(item) => items.push(item),
            Err(e) => tracing::warn!(index, error = %e, "Skipping malformed {what} record"),
        }
    }
    Ok(items)
}

/// Write through a sibling temp file and rename, so readers never see a
/// half-written snapshot.
fn save_array<T: Serialize>(path: &Path, items: &[T]) -> Result<(), StoreError> {
    let content = serde_json::to_string_pretty(items)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, content)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

impl ReminderBackend for JsonFileBackend {
    fn name(&self) -> &'static str {
        "json"
    }

    fn load_reminders(&self) -> Result<Vec<Reminder>, StoreError> {
        load_array(&self.reminders_path(), "reminder")
    }

    fn save_reminders(&self, reminders: &[Reminder]) -> Result<(), StoreError> {
        save_array(&self.reminders_path(), reminders)
    }

    fn load_prescriptions(&self) -> Result<Vec<Prescription>, StoreError> {
        load_array(&self.prescriptions_path(), "prescription")
    }

    fn save_prescriptions(&self, prescriptions: &[Prescription]) -> Result<(), StoreError> {
        save_array(&self.prescriptions_path(), prescriptions)
    }

    fn load_cleaned_courses(&self) -> Result<Vec<CleanedCourse>, StoreError> {
        load_array(&self.cleaned_path(), "cleaned course")
    }

    fn save_cleaned_courses(&self, courses: &[CleanedCourse]) -> Result<(), StoreError> {
        save_array(&self.cleaned_path(), courses)
    }
}
