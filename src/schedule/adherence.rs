use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::models::{DayStatus, Reminder};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdherenceSummary {
    pub current_streak: u32,
    pub longest_streak: u32,
    pub total_completed: usize,
}

/// One cell of the monthly adherence calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarDay {
    pub date: NaiveDate,
    /// `None` when nothing was scheduled that day.
    pub status: Option<DayStatus>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicineAdherence {
    pub scheduled: usize,
    pub completed: usize,
}

impl MedicineAdherence {
    /// Fraction of scheduled doses taken, 0.0 when nothing was scheduled.
    pub fn rate(&self) -> f64 {
        if self.scheduled == 0 {
            0.0
        } else {
            self.completed as f64 / self.scheduled as f64
        }
    }
}

/// Completion status of every calendar day that has at least one reminder.
pub fn day_statuses(reminders: &[Reminder]) -> BTreeMap<NaiveDate, DayStatus> {
    let mut counts: BTreeMap<NaiveDate, (usize, usize)> = BTreeMap::new();
    for r in reminders {
        let entry = counts.entry(r.scheduled_day()).or_default();
        entry.0 += 1;
        if r.is_completed() {
            entry.1 += 1;
        }
    }

    counts
        .into_iter()
        .map(|(day, (total, done))| {
            let status = if done == total {
                DayStatus::Completed
            } else if done > 0 {
                DayStatus::Partial
            } else {
                DayStatus::Missed
            };
            (day, status)
        })
        .collect()
}

/// Walk days with data in order: a completed day extends the run, any
/// other status resets it. Days without reminders are not visited.
fn streaks<'a>(statuses: impl Iterator<Item = &'a DayStatus>) -> (u32, u32) {
    let mut current = 0u32;
    let mut longest = 0u32;
    for status in statuses {
        if *status == DayStatus::Completed {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    (current, longest)
}

pub fn aggregate(reminders: &[Reminder]) -> AdherenceSummary {
    let statuses = day_statuses(reminders);
    let (current_streak, longest_streak) = streaks(statuses.values());
    AdherenceSummary {
        current_streak,
        longest_streak,
        total_completed: reminders.iter().filter(|r| r.is_completed()).count(),
    }
}

/// `aggregate` restricted to days up to and including `today`, so doses
/// that are still in the future do not count as missed.
pub fn aggregate_until(reminders: &[Reminder], today: NaiveDate) -> AdherenceSummary {
    let past: Vec<Reminder> = reminders
        .iter()
        .filter(|r| r.scheduled_day() <= today)
        .cloned()
        .collect();
    aggregate(&past)
}

/// One entry per day of `month`, in order. Empty for an invalid month.
pub fn month_calendar(reminders: &[Reminder], year: i32, month: u32) -> Vec<CalendarDay> {
    let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
        tracing::warn!(year, month, "Calendar requested for invalid month");
        return Vec::new();
    };

    let in_month: Vec<Reminder> = reminders
        .iter()
        .filter(|r| {
            let d = r.scheduled_day();
            d.year() == year && d.month() == month
        })
        .cloned()
        .collect();
    let statuses = day_statuses(&in_month);

    first
        .iter_days()
        .take_while(|d| d.month() == month)
        .map(|date| CalendarDay { date, status: statuses.get(&date).copied() })
        .collect()
}

/// Scheduled and completed dose counts per medicine.
pub fn per_medicine(reminders: &[Reminder]) -> BTreeMap<String, MedicineAdherence> {
    let mut out: BTreeMap<String, MedicineAdherence> = BTreeMap::new();
    for r in reminders {
        let entry = out.entry(r.medicine_name().to_string()).or_default();
        entry.scheduled += 1;
        if r.is_completed() {
            entry.completed += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DoseSlot;
    use chrono::{NaiveDateTime, NaiveTime};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn at(d: u32, h: u32) -> NaiveDateTime {
        day(d).and_time(NaiveTime::from_hms_opt(h, 0, 0).unwrap())
    }

    fn dose(medicine: &str, d: u32, slot: DoseSlot, hour: u32, taken: bool) -> Reminder {
        let mut r = Reminder::new(medicine, slot, at(d, hour), None, day(28));
        if taken {
            r.mark_completed(at(d, hour));
        }
        r
    }

    /// Two doses per day; `pattern` gives how many were taken each day.
    fn days_with(pattern: &[usize]) -> Vec<Reminder> {
        pattern
            .iter()
            .enumerate()
            .flat_map(|(i, taken)| {
                let d = i as u32 + 1;
                vec![
                    dose("Metformin", d, DoseSlot::Morning, 8, *taken >= 1),
                    dose("Metformin", d, DoseSlot::Evening, 20, *taken >= 2),
                ]
            })
            .collect()
    }

    #[test]
    fn day_status_classification() {
        let statuses = day_statuses(&days_with(&[2, 1, 0]));
        assert_eq!(statuses[&day(1)], DayStatus::Completed);
        assert_eq!(statuses[&day(2)], DayStatus::Partial);
        assert_eq!(statuses[&day(3)], DayStatus::Missed);
        assert_eq!(statuses.len(), 3);
    }

    #[test]
    fn three_completed_then_missed() {
        let summary = aggregate(&days_with(&[2, 2, 2, 0]));
        assert_eq!(summary.current_streak, 0);
        assert_eq!(summary.longest_streak, 3);
        assert_eq!(summary.total_completed, 6);
    }

    #[test]
    fn partial_day_resets_streak() {
        let summary = aggregate(&days_with(&[2, 2, 1, 2]));
        assert_eq!(summary.current_streak, 1);
        assert_eq!(summary.longest_streak, 2);
        assert_eq!(summary.total_completed, 7);
    }

    #[test]
    fn trailing_days_without_data_keep_streak() {
        let mut reminders = days_with(&[0, 2, 2]);
        // Nothing scheduled on days 4..9, then a completed day 10
        reminders.push(dose("Metformin", 10, DoseSlot::Morning, 8, true));
        let summary = aggregate(&reminders);
        assert_eq!(summary.current_streak, 3);
        assert_eq!(summary.longest_streak, 3);
    }

    #[test]
    fn empty_collection() {
        assert_eq!(aggregate(&[]), AdherenceSummary::default());
        assert!(day_statuses(&[]).is_empty());
    }

    #[test]
    fn days_group_across_medicines() {
        let reminders = vec![
            dose("Metformin", 1, DoseSlot::Morning, 8, true),
            dose("Lisinopril", 1, DoseSlot::Morning, 9, false),
        ];
        assert_eq!(day_statuses(&reminders)[&day(1)], DayStatus::Partial);
    }

    #[test]
    fn future_days_excluded_until_today() {
        let reminders = days_with(&[2, 2, 0, 0]);
        assert_eq!(aggregate(&reminders).current_streak, 0);
        let summary = aggregate_until(&reminders, day(2));
        assert_eq!(summary.current_streak, 2);
        assert_eq!(summary.total_completed, 4);
    }

    #[test]
    fn calendar_covers_whole_month() {
        let calendar = month_calendar(&days_with(&[2, 1]), 2024, 1);
        assert_eq!(calendar.len(), 31);
        assert_eq!(calendar[0].status, Some(DayStatus::Completed));
        assert_eq!(calendar[1].status, Some(DayStatus::Partial));
        assert_eq!(calendar[2].status, None);

        assert_eq!(month_calendar(&[], 2024, 2).len(), 29);
        assert!(month_calendar(&[], 2024, 13).is_empty());
    }

    #[test]
    fn per_medicine_counts() {
        let reminders = vec![
            dose("Metformin", 1, DoseSlot::Morning, 8, true),
            dose("Metformin", 1, DoseSlot::Evening, 20, false),
            dose("Lisinopril", 1, DoseSlot::Morning, 9, true),
        ];
        let stats = per_medicine(&reminders);
        assert_eq!(stats["Metformin"], MedicineAdherence { scheduled: 2, completed: 1 });
        assert!((stats["Metformin"].rate() - 0.5).abs() < f64::EPSILON);
        assert!((stats["Lisinopril"].rate() - 1.0).abs() < f64::EPSILON);
        assert_eq!(MedicineAdherence::default().rate(), 0.0);
    }
}
