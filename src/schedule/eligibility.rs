use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_ELIGIBILITY_WINDOW_MINUTES;
use crate::models::{EligibilityMode, Reminder};

/// How the window is measured and how long it stays open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityPolicy {
    pub mode: EligibilityMode,
    pub window_minutes: u32,
}

impl Default for EligibilityPolicy {
    fn default() -> Self {
        Self {
            mode: EligibilityMode::TimeOfDay,
            window_minutes: DEFAULT_ELIGIBILITY_WINDOW_MINUTES,
        }
    }
}

/// Where `now` falls relative to a reminder's window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Eligibility {
    /// Inside the window; the dose may be marked taken.
    Eligible,
    /// Window not open yet; minutes until it opens, rounded up.
    Wait { minutes: i64 },
    /// Window closed without the dose being taken.
    Expired,
    /// Already taken.
    Completed,
}

/// Signed seconds from the scheduled time to `now`.
///
/// `TimeOfDay` drops the date: a dose scheduled 08:00 on any day is
/// measured against today's 08:00. There is no wrap at midnight, so a
/// 23:55 dose checked at 00:05 is almost a day early, not ten minutes late.
fn offset_seconds(reminder: &Reminder, now: NaiveDateTime, mode: EligibilityMode) -> i64 {
    match mode {
        EligibilityMode::TimeOfDay => (now.time() - reminder.scheduled_at().time()).num_seconds(),
        EligibilityMode::DateInclusive => (now - reminder.scheduled_at()).num_seconds(),
    }
}

pub fn time_until_eligible(
    reminder: &Reminder,
    now: NaiveDateTime,
    policy: &EligibilityPolicy,
) -> Eligibility {
    if reminder.is_completed() {
        return Eligibility::Completed;
    }

    let offset = offset_seconds(reminder, now, policy.mode);
    let window = i64::from(policy.window_minutes) * 60;

    if offset < 0 {
        let remaining = -offset;
        Eligibility::Wait { minutes: (remaining + 59) / 60 }
    } else if offset <= window {
        Eligibility::Eligible
    } else {
        Eligibility::Expired
    }
}

pub fn can_complete(reminder: &Reminder, now: NaiveDateTime, policy: &EligibilityPolicy) -> bool {
    time_until_eligible(reminder, now, policy) == Eligibility::Eligible
}
