use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::DoseSlot;
use crate::db::DatabaseError;

/// Namespace for deterministic reminder ids (UUID v5).
const REMINDER_NAMESPACE: Uuid = Uuid::from_u128(0x6d65_6469_7379_6e63_8000_0000_7265_6d64);

/// Derive the id of the reminder for `medicine` on `day` in `slot`.
///
/// The same key always yields the same id, so materializing a day twice
/// cannot produce two reminders for one dose.
pub fn reminder_id(medicine_name: &str, day: NaiveDate, slot: DoseSlot) -> Uuid {
    let key = format!("{}|{}|{}", medicine_name.trim(), day, slot.as_str());
    Uuid::new_v5(&REMINDER_NAMESPACE, key.as_bytes())
}

/// One scheduled dose of a medicine.
///
/// Fields are read-only from outside the crate. The single permitted
/// mutation is `mark_completed`, which is one-way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ReminderRecord")]
pub struct Reminder {
    id: Uuid,
    medicine_name: String,
    slot: DoseSlot,
    scheduled_at: NaiveDateTime,
    dosage: Option<String>,
    completed: bool,
    completed_at: Option<NaiveDateTime>,
    end_date: NaiveDate,
}

impl Reminder {
    pub fn new(
        medicine_name: &str,
        slot: DoseSlot,
        scheduled_at: NaiveDateTime,
        dosage: Option<String>,
        end_date: NaiveDate,
    ) -> Self {
        Self {
            id: reminder_id(medicine_name, scheduled_at.date(), slot),
            medicine_name: medicine_name.trim().to_string(),
            slot,
            scheduled_at,
            dosage,
            completed: false,
            completed_at: None,
            end_date,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn medicine_name(&self) -> &str {
        &self.medicine_name
    }

    pub fn slot(&self) -> DoseSlot {
        self.slot
    }

    pub fn scheduled_at(&self) -> NaiveDateTime {
        self.scheduled_at
    }

    pub fn scheduled_day(&self) -> NaiveDate {
        self.scheduled_at.date()
    }

    pub fn dosage(&self) -> Option<&str> {
        self.dosage.as_deref()
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn completed_at(&self) -> Option<NaiveDateTime> {
        self.completed_at
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end_date
    }

    /// Doses scheduled on or after the course end date are inert.
    pub fn is_inert(&self) -> bool {
        self.scheduled_at.date() >= self.end_date
    }

    /// Transition to completed. Returns `false` (and changes nothing) if the
    /// reminder was already completed.
    pub(crate) fn mark_completed(&mut self, at: NaiveDateTime) -> bool {
        if self.completed {
            return false;
        }
        self.completed = true;
        self.completed_at = Some(at);
        true
    }
}

/// Doses of a medicine already removed by the cleanup sweep.
///
/// Reminder ids are deterministic, so without this record the next sync
/// would materialize the same doses again as pending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanedCourse {
    pub medicine_name: String,
    /// Latest scheduled time among the removed doses.
    pub cleaned_through: NaiveDateTime,
}

impl CleanedCourse {
    pub fn covers(&self, reminder: &Reminder) -> bool {
        reminder.medicine_name == self.medicine_name && reminder.scheduled_at <= self.cleaned_through
    }
}

/// Unvalidated storage shape of a reminder.
///
/// Every path that reads reminders back from storage goes through
/// `Reminder::try_from`, which enforces `completed_at <=> completed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderRecord {
    pub id: Uuid,
    pub medicine_name: String,
    pub slot: DoseSlot,
    pub scheduled_at: NaiveDateTime,
    pub dosage: Option<String>,
    #[serde(default)]
    pub completed: bool,
    pub completed_at: Option<NaiveDateTime>,
    pub end_date: NaiveDate,
}

impl TryFrom<ReminderRecord> for Reminder {
    type Error = DatabaseError;

    fn try_from(record: ReminderRecord) -> Result<Self, Self::Error> {
        if record.medicine_name.trim().is_empty() {
            return Err(DatabaseError::ConstraintViolation(format!(
                "reminder {} has no medicine name",
                record.id
            )));
        }
        if record.completed != record.completed_at.is_some() {
            return Err(DatabaseError::ConstraintViolation(format!(
                "reminder {}: completed={} but completed_at={:?}",
                record.id, record.completed, record.completed_at
            )));
        }
        Ok(Self {
            id: record.id,
            medicine_name: record.medicine_name,
            slot: record.slot,
            scheduled_at: record.scheduled_at,
            dosage: record.dosage,
            completed: record.completed,
            completed_at: record.completed_at,
            end_date: record.end_date,
        })
    }
}

impl From<&Reminder> for ReminderRecord {
    fn from(reminder: &Reminder) -> Self {
        Self {
            id: reminder.id,
            medicine_name: reminder.medicine_name.clone(),
            slot: reminder.slot,
            scheduled_at: reminder.scheduled_at,
            dosage: reminder.dosage.clone(),
            completed: reminder.completed,
            completed_at: reminder.completed_at,
            end_date: reminder.end_date,
        }
    }
}
