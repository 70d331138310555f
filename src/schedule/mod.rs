//! Dose scheduling: recurrence expansion, eligibility windows and
//! adherence aggregation.
//!
//! Everything in here is a pure function over reminders and clock values.
//! State, persistence and events live in `crate::service`.

pub mod adherence;
pub mod eligibility;
pub mod recurrence;

pub use adherence::{aggregate, aggregate_until, day_statuses, month_calendar, per_medicine};
pub use adherence::{AdherenceSummary, CalendarDay, MedicineAdherence};
pub use eligibility::{can_complete, time_until_eligible, Eligibility, EligibilityPolicy};
pub use recurrence::{expand, expand_prescription, ExpansionRequest};

use chrono::NaiveDate;
use thiserror::Error;

use crate::models::DoseSlot;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("No dose times configured for {medicine}")]
    NoDoseTimes { medicine: String },

    #[error("No time configured for the {slot} dose of {medicine}")]
    MissingSlotTime { medicine: String, slot: DoseSlot },

    #[error("Invalid range: {end} is before {start}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("Unrecognised frequency '{0}'")]
    UnknownFrequency(String),

    #[error("Medicine name is empty")]
    EmptyMedicine,
}
