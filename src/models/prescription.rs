use chrono::{Days, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{parse_slot_pattern, DoseSlot, Frequency};

/// Clock time per dose slot. A `None` slot is not configured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotTimes {
    pub morning: Option<NaiveTime>,
    pub afternoon: Option<NaiveTime>,
    pub evening: Option<NaiveTime>,
}

impl SlotTimes {
    pub fn new(
        morning: Option<NaiveTime>,
        afternoon: Option<NaiveTime>,
        evening: Option<NaiveTime>,
    ) -> Self {
        Self { morning, afternoon, evening }
    }

    pub fn get(&self, slot: DoseSlot) -> Option<NaiveTime> {
        match slot {
            DoseSlot::Morning => self.morning,
            DoseSlot::Afternoon => self.afternoon,
            DoseSlot::Evening => self.evening,
        }
    }

    pub fn set(&mut self, slot: DoseSlot, time: Option<NaiveTime>) {
        match slot {
            DoseSlot::Morning => self.morning = time,
            DoseSlot::Afternoon => self.afternoon = time,
            DoseSlot::Evening => self.evening = time,
        }
    }

    /// Slots that have a time, in chronological slot order.
    pub fn configured(&self) -> Vec<(DoseSlot, NaiveTime)> {
        DoseSlot::ALL
            .iter()
            .filter_map(|slot| self.get(*slot).map(|t| (*slot, t)))
            .collect()
    }

    /// Fill every unset slot from `defaults`.
    pub fn or(self, defaults: &SlotTimes) -> SlotTimes {
        SlotTimes {
            morning: self.morning.or(defaults.morning),
            afternoon: self.afternoon.or(defaults.afternoon),
            evening: self.evening.or(defaults.evening),
        }
    }

    /// Keep only the given slots.
    pub fn restricted_to(&self, slots: &[DoseSlot]) -> SlotTimes {
        let mut out = SlotTimes::default();
        for slot in slots {
            out.set(*slot, self.get(*slot));
        }
        out
    }
}

/// A clinician-authored course of medication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prescription {
    pub id: Uuid,
    pub medicine_name: String,
    pub dosage: Option<String>,
    /// Free-text frequency as written on the prescription ("BD", "1-0-1", ...).
    pub frequency: String,
    pub duration_days: u32,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub times: SlotTimes,
}

impl Prescription {
    /// Parsed frequency class, if the descriptor is recognised.
    pub fn frequency_class(&self) -> Option<Frequency> {
        Frequency::from_descriptor(&self.frequency)
    }

    /// Explicit end date when set, otherwise `start_date + duration_days`.
    pub fn end_date(&self) -> NaiveDate {
        self.end_date.unwrap_or_else(|| course_end(self.start_date, self.duration_days))
    }

    /// Slot times this prescription asks for, before defaults are applied.
    ///
    /// A "1-0-1" descriptor enables exactly its slots; explicit times on
    /// other slots are ignored.
    pub fn requested_times(&self, defaults: &SlotTimes) -> SlotTimes {
        match parse_slot_pattern(&self.frequency) {
            Some(slots) => self.times.or(defaults).restricted_to(&slots),
            None => self.times.or(defaults),
        }
    }

    /// Whether the course is still running on `day`.
    pub fn is_active_on(&self, day: NaiveDate) -> bool {
        day >= self.start_date && day < self.end_date()
    }
}

/// End of a course that starts on `start` and lasts `duration_days`.
pub fn course_end(start: NaiveDate, duration_days: u32) -> NaiveDate {
    start
        .checked_add_days(Days::new(u64::from(duration_days)))
        .unwrap_or(NaiveDate::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn prescription(frequency: &str) -> Prescription {
        Prescription {
            id: Uuid::new_v4(),
            medicine_name: "Amoxicillin".into(),
            dosage: Some("250mg".into()),
            frequency: frequency.into(),
            duration_days: 5,
            start_date: day(1),
            end_date: None,
            times: SlotTimes::default(),
        }
    }

    fn defaults() -> SlotTimes {
        SlotTimes::new(Some(hm(8, 0)), Some(hm(14, 0)), Some(hm(20, 0)))
    }

    #[test]
    fn end_date_from_duration() {
        assert_eq!(prescription("BD").end_date(), day(6));
    }

    #[test]
    fn explicit_end_date_wins() {
        let mut p = prescription("BD");
        p.end_date = Some(day(3));
        assert_eq!(p.end_date(), day(3));
        assert!(p.is_active_on(day(2)));
        assert!(!p.is_active_on(day(3)));
    }

    #[test]
    fn pattern_restricts_slots() {
        let p = prescription("1-0-1");
        let times = p.requested_times(&defaults());
        assert_eq!(times.morning, Some(hm(8, 0)));
        assert_eq!(times.afternoon, None);
        assert_eq!(times.evening, Some(hm(20, 0)));
    }

    #[test]
    fn explicit_times_override_defaults() {
        let mut p = prescription("twice");
        p.times.morning = Some(hm(7, 30));
        let times = p.requested_times(&defaults());
        assert_eq!(times.morning, Some(hm(7, 30)));
        assert_eq!(times.evening, Some(hm(20, 0)));
    }

    #[test]
    fn configured_slots_are_ordered() {
        let times = SlotTimes::new(None, Some(hm(13, 0)), Some(hm(21, 0)));
        let slots: Vec<DoseSlot> = times.configured().into_iter().map(|(s, _)| s).collect();
        assert_eq!(slots, vec![DoseSlot::Afternoon, DoseSlot::Evening]);
    }

    #[test]
    fn deserializes_without_times() {
        let json = serde_json::json!({
            "id": "7f9c2ba4-e88f-11e0-a00b-0123456789ab",
            "medicine_name": "Metformin",
            "dosage": null,
            "frequency": "once",
            "duration_days": 30,
            "start_date": "2024-02-01",
            "end_date": null
        });
        let p: Prescription = serde_json::from_value(json).unwrap();
        assert_eq!(p.frequency_class(), Some(Frequency::Once));
        assert_eq!(p.times, SlotTimes::default());
    }
}
