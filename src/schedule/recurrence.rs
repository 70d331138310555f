use chrono::{Days, NaiveDate, NaiveTime};

use super::ScheduleError;
use crate::models::prescription::course_end;
use crate::models::{DoseSlot, Frequency, Prescription, Reminder, SlotTimes};

/// Input to `expand`.
///
/// The window decides which days get materialized; the course
/// (`course_start` + `duration_days`) decides each reminder's `end_date`.
#[derive(Debug, Clone)]
pub struct ExpansionRequest<'a> {
    pub medicine_name: &'a str,
    pub dosage: Option<&'a str>,
    pub frequency: Frequency,
    pub times: SlotTimes,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub course_start: NaiveDate,
    pub duration_days: u32,
}

/// Resolve the (slot, time) pairs a frequency schedules each day.
fn resolve_slots(
    medicine: &str,
    frequency: Frequency,
    times: &SlotTimes,
) -> Result<Vec<(DoseSlot, NaiveTime)>, ScheduleError> {
    if frequency == Frequency::Custom {
        let configured = times.configured();
        if configured.is_empty() {
            return Err(ScheduleError::NoDoseTimes { medicine: medicine.into() });
        }
        return Ok(configured);
    }

    let slots = frequency.fixed_slots();
    if slots.iter().all(|slot| times.get(*slot).is_none()) {
        return Err(ScheduleError::NoDoseTimes { medicine: medicine.into() });
    }
    slots
        .iter()
        .map(|slot| {
            times
                .get(*slot)
                .map(|t| (*slot, t))
                .ok_or_else(|| ScheduleError::MissingSlotTime {
                    medicine: medicine.into(),
                    slot: *slot,
                })
        })
        .collect()
}

/// Materialize one reminder per dose slot per day of the inclusive window.
pub fn expand(request: &ExpansionRequest<'_>) -> Result<Vec<Reminder>, ScheduleError> {
    let medicine = request.medicine_name.trim();
    if medicine.is_empty() {
        return Err(ScheduleError::EmptyMedicine);
    }
    if request.window_end < request.window_start {
        return Err(ScheduleError::InvalidRange {
            start: request.window_start,
            end: request.window_end,
        });
    }

    let slots = resolve_slots(medicine, request.frequency, &request.times)?;
    let end_date = course_end(request.course_start, request.duration_days);
    let dosage = request.dosage.map(str::to_string);

    let reminders = request
        .window_start
        .iter_days()
        .take_while(|day| *day <= request.window_end)
        .flat_map(|day| {
            let dosage = dosage.clone();
            slots.iter().map(move |(slot, time)| {
                Reminder::new(medicine, *slot, day.and_time(*time), dosage.clone(), end_date)
            })
        })
        .collect();

    Ok(reminders)
}

/// Expand a prescription over `[window_start, window_end]`, clamped to its
/// course. Slots without an explicit time take the configured defaults.
///
/// Returns an empty list when the course does not overlap the window.
pub fn expand_prescription(
    prescription: &Prescription,
    window_start: NaiveDate,
    window_end: NaiveDate,
    defaults: &SlotTimes,
) -> Result<Vec<Reminder>, ScheduleError> {
    let frequency = prescription
        .frequency_class()
        .ok_or_else(|| ScheduleError::UnknownFrequency(prescription.frequency.clone()))?;

    let course_end = prescription.end_date();
    let Some(last_day) = course_end.checked_sub_days(Days::new(1)) else {
        return Ok(Vec::new());
    };
    let start = window_start.max(prescription.start_date);
    let end = window_end.min(last_day);
    if end < start {
        return Ok(Vec::new());
    }

    let duration_days = (course_end - prescription.start_date).num_days().max(0) as u32;

    expand(&ExpansionRequest {
        medicine_name: &prescription.medicine_name,
        dosage: prescription.dosage.as_deref(),
        frequency,
        times: prescription.requested_times(defaults),
        window_start: start,
        window_end: end,
        course_start: prescription.start_date,
        duration_days,
    })
}
