//! Reminder repository: the single owner of the reminder collection.
//!
//! Every mutation is a read-modify-write under one mutex, followed by a
//! whole-collection save through the backend and a `ReminderEvent` on the
//! broadcast channel. Views subscribe instead of polling storage.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use chrono::{Days, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::config::MediSyncConfig;
use crate::models::{CleanedCourse, Prescription, Reminder, SlotTimes};
use crate::schedule::{
    self, AdherenceSummary, CalendarDay, Eligibility, EligibilityPolicy, MedicineAdherence,
};
use crate::source::PrescriptionSource;
use crate::store::{ReminderBackend, StoreError};

#[derive(Error, Debug)]
pub enum ReminderError {
    #[error("Reminder {0} not found")]
    NotFound(Uuid),

    #[error("This dose can be marked as taken in {minutes} minute(s)")]
    NotYetEligible { minutes: i64 },

    #[error("The window to take this dose of {medicine} has passed")]
    Expired { medicine: String },

    #[error("This dose of {medicine} was already taken")]
    AlreadyCompleted { medicine: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Reminder state lock poisoned")]
    LockPoisoned,
}

impl ReminderError {
    /// User mistakes that leave the collection untouched.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::NotYetEligible { .. } | Self::Expired { .. } | Self::AlreadyCompleted { .. }
        )
    }
}

/// Published after every change to the collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReminderEvent {
    Added { count: usize },
    Completed { id: Uuid, medicine_name: String, at: NaiveDateTime },
    /// Medicines dropped from the active prescription list.
    Pruned { medicines: Vec<String>, count: usize },
    /// Medicines whose every dose was taken.
    Cleaned { medicines: Vec<String>, count: usize },
    DoseDue { id: Uuid, medicine_name: String, scheduled_at: NaiveDateTime },
    /// The window closed with the dose still pending.
    DoseMissed { id: Uuid, medicine_name: String, scheduled_at: NaiveDateTime },
    Reloaded { count: usize },
}

/// Outcome of one prescription sync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// `false` when the source failed and the stored snapshot was used.
    pub fetched: bool,
    pub prescriptions: usize,
    pub added: usize,
    pub pruned: usize,
}

/// A pending dose whose scheduled time has passed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DueDose {
    pub reminder: Reminder,
    /// `Expired` marks a missed dose.
    pub eligibility: Eligibility,
}

struct ServiceState {
    reminders: HashMap<Uuid, Reminder>,
    prescriptions: Vec<Prescription>,
    cleaned: Vec<CleanedCourse>,
    /// Ids already announced with `DoseDue`, so each dose is announced once.
    announced_due: HashSet<Uuid>,
    /// Same for `DoseMissed`.
    announced_missed: HashSet<Uuid>,
}

impl ServiceState {
    fn load(backend: &dyn ReminderBackend) -> Result<Self, StoreError> {
        let reminders = backend.load_reminders()?;
        Ok(Self {
            reminders: reminders.into_iter().map(|r| (r.id(), r)).collect(),
            prescriptions: backend.load_prescriptions()?,
            cleaned: backend.load_cleaned_courses()?,
            announced_due: HashSet::new(),
            announced_missed: HashSet::new(),
        })
    }

    fn is_cleaned(&self, reminder: &Reminder) -> bool {
        self.cleaned.iter().any(|c| c.covers(reminder))
    }

    /// Record that doses of `medicine` up to `through` were removed.
    fn mark_cleaned(&mut self, medicine: &str, through: NaiveDateTime) {
        match self.cleaned.iter_mut().find(|c| c.medicine_name == medicine) {
            Some(course) => course.cleaned_through = course.cleaned_through.max(through),
            None => self.cleaned.push(CleanedCourse {
                medicine_name: medicine.to_string(),
                cleaned_through: through,
            }),
        }
    }

    fn sorted(&self) -> Vec<Reminder> {
        let mut out: Vec<Reminder> = self.reminders.values().cloned().collect();
        sort_reminders(&mut out);
        out
    }
}

fn sort_reminders(reminders: &mut [Reminder]) {
    reminders.sort_by(|a, b| {
        a.scheduled_at()
            .cmp(&b.scheduled_at())
            .then_with(|| a.medicine_name().cmp(b.medicine_name()))
    });
}

/// Keep the last prescription per medicine name.
fn latest_by_medicine(prescriptions: Vec<Prescription>) -> Vec<Prescription> {
    let mut seen = HashSet::new();
    let mut out: Vec<Prescription> = prescriptions
        .into_iter()
        .rev()
        .filter(|p| seen.insert(p.medicine_name.trim().to_string()))
        .collect();
    out.reverse();
    out
}

pub struct ReminderService {
    state: Mutex<ServiceState>,
    backend: Box<dyn ReminderBackend>,
    events: broadcast::Sender<ReminderEvent>,
    policy: EligibilityPolicy,
    slot_defaults: SlotTimes,
    horizon_days: u32,
}

impl ReminderService {
    /// Build the service from whatever the backend currently holds.
    pub fn new(
        backend: Box<dyn ReminderBackend>,
        config: &MediSyncConfig,
    ) -> Result<Self, ReminderError> {
        let state = ServiceState::load(backend.as_ref())?;
        let (events, _) = broadcast::channel(config.event_capacity.max(1));

        tracing::info!(
            backend = backend.name(),
            reminders = state.reminders.len(),
            prescriptions = state.prescriptions.len(),
            "Reminder service loaded"
        );

        Ok(Self {
            state: Mutex::new(state),
            backend,
            events,
            policy: config.eligibility(),
            slot_defaults: config.slot_times,
            horizon_days: config.horizon_days.max(1),
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReminderEvent> {
        self.events.subscribe()
    }

    pub fn policy(&self) -> EligibilityPolicy {
        self.policy
    }

    fn lock(&self) -> Result<MutexGuard<'_, ServiceState>, ReminderError> {
        self.state.lock().map_err(|_| ReminderError::LockPoisoned)
    }

    fn persist(&self, state: &ServiceState) -> Result<(), ReminderError> {
        self.backend.save_reminders(&state.sorted())?;
        Ok(())
    }

    fn publish(&self, event: ReminderEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    // ── Queries ─────────────────────────────────────────────

    /// All reminders ordered by scheduled time, then medicine.
    pub fn reminders(&self) -> Result<Vec<Reminder>, ReminderError> {
        Ok(self.lock()?.sorted())
    }

    pub fn get(&self, id: &Uuid) -> Result<Reminder, ReminderError> {
        self.lock()?
            .reminders
            .get(id)
            .cloned()
            .ok_or(ReminderError::NotFound(*id))
    }

    /// The day's schedule, in dose order.
    pub fn reminders_on(&self, day: NaiveDate) -> Result<Vec<Reminder>, ReminderError> {
        let state = self.lock()?;
        let mut out: Vec<Reminder> = state
            .reminders
            .values()
            .filter(|r| r.scheduled_day() == day)
            .cloned()
            .collect();
        sort_reminders(&mut out);
        Ok(out)
    }

    pub fn prescriptions(&self) -> Result<Vec<Prescription>, ReminderError> {
        Ok(self.lock()?.prescriptions.clone())
    }

    pub fn eligibility(&self, id: &Uuid, now: NaiveDateTime) -> Result<Eligibility, ReminderError> {
        let state = self.lock()?;
        let reminder = state.reminders.get(id).ok_or(ReminderError::NotFound(*id))?;
        Ok(schedule::time_until_eligible(reminder, now, &self.policy))
    }

    pub fn adherence(&self, today: NaiveDate) -> Result<AdherenceSummary, ReminderError> {
        let reminders = self.reminders()?;
        Ok(schedule::aggregate_until(&reminders, today))
    }

    pub fn calendar(&self, year: i32, month: u32) -> Result<Vec<CalendarDay>, ReminderError> {
        let reminders = self.reminders()?;
        Ok(schedule::month_calendar(&reminders, year, month))
    }

    pub fn medicine_stats(&self) -> Result<BTreeMap<String, MedicineAdherence>, ReminderError> {
        let reminders = self.reminders()?;
        Ok(schedule::per_medicine(&reminders))
    }

    // ── Mutations ───────────────────────────────────────────

    /// Expand `prescriptions` over `[from, to]` and insert the reminders not
    /// already held. Prescriptions that fail to expand are logged and skipped.
    pub fn materialize(
        &self,
        prescriptions: &[Prescription],
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<usize, ReminderError> {
        let mut state = self.lock()?;
        let added = self.materialize_locked(&mut state, prescriptions, from, to);
        if added == 0 {
            return Ok(0);
        }
        let saved = self.persist(&state);
        self.publish(ReminderEvent::Added { count: added });
        saved.map(|_| added)
    }

    fn materialize_locked(
        &self,
        state: &mut ServiceState,
        prescriptions: &[Prescription],
        from: NaiveDate,
        to: NaiveDate,
    ) -> usize {
        let mut added = 0;
        for prescription in prescriptions {
            let expanded = match schedule::expand_prescription(
                prescription,
                from,
                to,
                &self.slot_defaults,
            ) {
                Ok(reminders) => reminders,
                Err(e) => {
                    tracing::warn!(
                        medicine = %prescription.medicine_name,
                        error = %e,
                        "Skipping prescription that cannot be scheduled"
                    );
                    continue;
                }
            };
            for reminder in expanded {
                if state.is_cleaned(&reminder) {
                    continue;
                }
                if let Entry::Vacant(slot) = state.reminders.entry(reminder.id()) {
                    slot.insert(reminder);
                    added += 1;
                }
            }
        }
        added
    }

    /// Make `prescriptions` the active list: store the snapshot, prune
    /// reminders of medicines no longer prescribed, and materialize the
    /// horizon starting at `today`.
    pub fn apply_prescriptions(
        &self,
        prescriptions: Vec<Prescription>,
        today: NaiveDate,
    ) -> Result<SyncReport, ReminderError> {
        let prescriptions = latest_by_medicine(prescriptions);
        self.backend.save_prescriptions(&prescriptions)?;

        let mut state = self.lock()?;
        state.prescriptions = prescriptions.clone();

        let active: HashSet<&str> =
            prescriptions.iter().map(|p| p.medicine_name.trim()).collect();
        let before = state.reminders.len();
        let mut pruned_medicines = BTreeSet::new();
        state.reminders.retain(|_, r| {
            let keep = active.contains(r.medicine_name());
            if !keep {
                pruned_medicines.insert(r.medicine_name().to_string());
            }
            keep
        });
        let pruned = before - state.reminders.len();

        let added = self.materialize_locked(&mut state, &prescriptions, today, self.horizon_end(today));

        let saved = if pruned > 0 || added > 0 { self.persist(&state) } else { Ok(()) };
        drop(state);

        if pruned > 0 {
            tracing::info!(count = pruned, "Pruned reminders for discontinued medicines");
            self.publish(ReminderEvent::Pruned {
                medicines: pruned_medicines.into_iter().collect(),
                count: pruned,
            });
        }
        if added > 0 {
            self.publish(ReminderEvent::Added { count: added });
        }
        saved?;

        Ok(SyncReport { fetched: true, prescriptions: prescriptions.len(), added, pruned })
    }

    /// Pull prescriptions from `source` and apply them.
    ///
    /// On fetch failure the stored snapshot is only used to top up the
    /// horizon; nothing is pruned and existing reminders stay as they are.
    pub fn sync(
        &self,
        source: &dyn PrescriptionSource,
        today: NaiveDate,
    ) -> Result<SyncReport, ReminderError> {
        match source.fetch() {
            Ok(prescriptions) => self.apply_prescriptions(prescriptions, today),
            Err(e) => {
                tracing::warn!(error = %e, "Prescription fetch failed, using last snapshot");
                let snapshot = self.prescriptions()?;
                let added = self.materialize(&snapshot, today, self.horizon_end(today))?;
                Ok(SyncReport {
                    fetched: false,
                    prescriptions: snapshot.len(),
                    added,
                    pruned: 0,
                })
            }
        }
    }

    fn horizon_end(&self, today: NaiveDate) -> NaiveDate {
        today
            .checked_add_days(Days::new(u64::from(self.horizon_days - 1)))
            .unwrap_or(today)
    }

    /// Mark a dose taken. Rejected outside the eligibility window, in which
    /// case nothing changes.
    pub fn complete(&self, id: &Uuid, now: NaiveDateTime) -> Result<Reminder, ReminderError> {
        let mut state = self.lock()?;
        let reminder = state.reminders.get_mut(id).ok_or(ReminderError::NotFound(*id))?;

        match schedule::time_until_eligible(reminder, now, &self.policy) {
            Eligibility::Eligible => {}
            Eligibility::Wait { minutes } => {
                return Err(ReminderError::NotYetEligible { minutes });
            }
            Eligibility::Expired => {
                return Err(ReminderError::Expired {
                    medicine: reminder.medicine_name().to_string(),
                });
            }
            Eligibility::Completed => {
                return Err(ReminderError::AlreadyCompleted {
                    medicine: reminder.medicine_name().to_string(),
                });
            }
        }

        reminder.mark_completed(now);
        let completed = reminder.clone();
        state.announced_due.remove(id);
        state.announced_missed.remove(id);

        let saved = self.persist(&state);
        drop(state);

        tracing::info!(medicine = %completed.medicine_name(), id = %completed.id(), "Dose taken");
        self.publish(ReminderEvent::Completed {
            id: completed.id(),
            medicine_name: completed.medicine_name().to_string(),
            at: now,
        });
        saved?;
        Ok(completed)
    }

    /// Remove every reminder of each medicine whose doses are all taken.
    /// Returns how many reminders were removed. Removed doses are recorded
    /// so later syncs do not bring them back as pending.
    pub fn cleanup_sweep(&self) -> Result<usize, ReminderError> {
        let mut state = self.lock()?;

        let mut all_done: HashMap<String, bool> = HashMap::new();
        for r in state.reminders.values() {
            *all_done.entry(r.medicine_name().to_string()).or_insert(true) &= r.is_completed();
        }
        let finished: BTreeSet<String> = all_done
            .into_iter()
            .filter_map(|(name, done)| done.then_some(name))
            .collect();
        if finished.is_empty() {
            return Ok(0);
        }

        let mut through: BTreeMap<String, NaiveDateTime> = BTreeMap::new();
        let before = state.reminders.len();
        state.reminders.retain(|_, r| {
            if !finished.contains(r.medicine_name()) {
                return true;
            }
            through
                .entry(r.medicine_name().to_string())
                .and_modify(|t| *t = (*t).max(r.scheduled_at()))
                .or_insert(r.scheduled_at());
            false
        });
        let removed = before - state.reminders.len();
        for (medicine, last) in &through {
            state.mark_cleaned(medicine, *last);
        }

        // Courses before reminders, so a partial write loses nothing
        let saved = self
            .backend
            .save_cleaned_courses(&state.cleaned)
            .map_err(ReminderError::from)
            .and_then(|_| self.persist(&state));
        drop(state);

        tracing::info!(count = removed, medicines = finished.len(), "Cleaned up finished courses");
        self.publish(ReminderEvent::Cleaned { medicines: finished.into_iter().collect(), count: removed });
        saved?;
        Ok(removed)
    }

    /// Every pending, non-inert dose whose scheduled time has passed, tagged
    /// with its eligibility. Each dose is announced once with `DoseDue`
    /// while it can be taken and once with `DoseMissed` after its window.
    pub fn due_sweep(&self, now: NaiveDateTime) -> Result<Vec<DueDose>, ReminderError> {
        let mut state = self.lock()?;

        let mut overdue: Vec<Reminder> = state
            .reminders
            .values()
            .filter(|r| !r.is_completed() && !r.is_inert() && r.scheduled_at() <= now)
            .cloned()
            .collect();
        sort_reminders(&mut overdue);

        let ids: HashSet<Uuid> = overdue.iter().map(|r| r.id()).collect();
        state.announced_due.retain(|id| ids.contains(id));
        state.announced_missed.retain(|id| ids.contains(id));

        let mut due = Vec::with_capacity(overdue.len());
        let mut fresh = Vec::new();
        for reminder in overdue {
            let eligibility = schedule::time_until_eligible(&reminder, now, &self.policy);
            let event = match eligibility {
                Eligibility::Eligible if state.announced_due.insert(reminder.id()) => {
                    Some(ReminderEvent::DoseDue {
                        id: reminder.id(),
                        medicine_name: reminder.medicine_name().to_string(),
                        scheduled_at: reminder.scheduled_at(),
                    })
                }
                Eligibility::Expired if state.announced_missed.insert(reminder.id()) => {
                    Some(ReminderEvent::DoseMissed {
                        id: reminder.id(),
                        medicine_name: reminder.medicine_name().to_string(),
                        scheduled_at: reminder.scheduled_at(),
                    })
                }
                _ => None,
            };
            fresh.extend(event);
            due.push(DueDose { reminder, eligibility });
        }
        drop(state);

        for event in fresh {
            tracing::debug!(?event, "Dose status announced");
            self.publish(event);
        }
        Ok(due)
    }

    /// Replace in-memory state with what the backend holds.
    pub fn reload(&self) -> Result<usize, ReminderError> {
        let loaded = ServiceState::load(self.backend.as_ref())?;
        let count = loaded.reminders.len();

        *self.lock()? = loaded;

        self.publish(ReminderEvent::Reloaded { count });
        Ok(count)
    }
}
