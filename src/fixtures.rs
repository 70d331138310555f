//! Seed data and fakes for tests. Compiled only under `cfg(test)`.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use uuid::Uuid;

use crate::config::MediSyncConfig;
use crate::models::{CleanedCourse, DoseSlot, Prescription, Reminder, SlotTimes};
use crate::service::ReminderService;
use crate::source::{PrescriptionSource, SourceError};
use crate::store::{MemoryBackend, ReminderBackend, StoreError};

/// January 2024, the month every fixture lives in.
pub fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, d).expect("valid fixture day")
}

pub fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
    day(d).and_time(NaiveTime::from_hms_opt(h, m, 0).expect("valid fixture time"))
}

/// A course starting 2024-01-01 that relies on the default slot times.
pub fn prescription(medicine: &str, frequency: &str, duration_days: u32) -> Prescription {
    Prescription {
        id: Uuid::new_v4(),
        medicine_name: medicine.into(),
        dosage: Some("500mg".into()),
        frequency: frequency.into(),
        duration_days,
        start_date: day(1),
        end_date: None,
        times: SlotTimes::default(),
    }
}

/// One pending 08:00 dose per day from `first` to `last` inclusive.
pub fn reminders_for(medicine: &str, first: u32, last: u32) -> Vec<Reminder> {
    (first..=last)
        .map(|d| Reminder::new(medicine, DoseSlot::Morning, at(d, 8, 0), None, day(28)))
        .collect()
}

pub fn memory_service() -> ReminderService {
    ReminderService::new(Box::new(MemoryBackend::new()), &MediSyncConfig::default())
        .expect("memory backend never fails to load")
}

/// Always returns the same list.
pub struct StaticSource(pub Vec<Prescription>);

impl PrescriptionSource for StaticSource {
    fn fetch(&self) -> Result<Vec<Prescription>, SourceError> {
        Ok(self.0.clone())
    }
}

/// Simulates the clinic backend being unreachable.
pub struct FailingSource;

impl PrescriptionSource for FailingSource {
    fn fetch(&self) -> Result<Vec<Prescription>, SourceError> {
        Err(SourceError::Connection("http://clinic.invalid".into()))
    }
}

/// Loads empty, refuses every write.
pub struct FailingBackend;

impl ReminderBackend for FailingBackend {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn load_reminders(&self) -> Result<Vec<Reminder>, StoreError> {
        Ok(Vec::new())
    }

    fn save_reminders(&self, _: &[Reminder]) -> Result<(), StoreError> {
        Err(StoreError::Io(std::io::Error::other("disk full")))
    }

    fn load_prescriptions(&self) -> Result<Vec<Prescription>, StoreError> {
        Ok(Vec::new())
    }

    fn save_prescriptions(&self, _: &[Prescription]) -> Result<(), StoreError> {
        Err(StoreError::Io(std::io::Error::other("disk full")))
    }

    fn load_cleaned_courses(&self) -> Result<Vec<CleanedCourse>, StoreError> {
        Ok(Vec::new())
    }

    fn save_cleaned_courses(&self, _: &[CleanedCourse]) -> Result<(), StoreError> {
        Err(StoreError::Io(std::io::Error::other("disk full")))
    }
}
