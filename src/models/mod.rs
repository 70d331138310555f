pub mod enums;
pub mod prescription;
pub mod reminder;

pub use enums::{BackendKind, DayStatus, DoseSlot, EligibilityMode, Frequency};
pub use prescription::{Prescription, SlotTimes};
pub use reminder::{CleanedCourse, Reminder, ReminderRecord};
