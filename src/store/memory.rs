use std::sync::Mutex;

use super::{ReminderBackend, StoreError};
use crate::models::{CleanedCourse, Prescription, Reminder};

/// Volatile backend. Used for tests and for running without persistence.
#[derive(Default)]
pub struct MemoryBackend {
    reminders: Mutex<Vec<Reminder>>,
    prescriptions: Mutex<Vec<Prescription>>,
    cleaned: Mutex<Vec<CleanedCourse>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reminders(reminders: Vec<Reminder>) -> Self {
        Self {
            reminders: Mutex::new(reminders),
            ..Self::default()
        }
    }
}

impl ReminderBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn load_reminders(&self) -> Result<Vec<Reminder>, StoreError> {
        Ok(self.reminders.lock().map_err(|_| StoreError::LockPoisoned)?.clone())
    }

    fn save_reminders(&self, reminders: &[Reminder]) -> Result<(), StoreError> {
        *self.reminders.lock().map_err(|_| StoreError::LockPoisoned)? = reminders.to_vec();
        Ok(())
    }

    fn load_prescriptions(&self) -> Result<Vec<Prescription>, StoreError> {
        Ok(self.prescriptions.lock().map_err(|_| StoreError::LockPoisoned)?.clone())
    }

    fn save_prescriptions(&self, prescriptions: &[Prescription]) -> Result<(), StoreError> {
        *self.prescriptions.lock().map_err(|_| StoreError::LockPoisoned)? = prescriptions.to_vec();
        Ok(())
    }

    fn load_cleaned_courses(&self) -> Result<Vec<CleanedCourse>, StoreError> {
        Ok(self.cleaned.lock().map_err(|_| StoreError::LockPoisoned)?.clone())
    }

    fn save_cleaned_courses(&self, courses: &[CleanedCourse]) -> Result<(), StoreError> {
        *self.cleaned.lock().map_err(|_| StoreError::LockPoisoned)? = courses.to_vec();
        Ok(())
    }
}
