//! Background sweeps: periodic cleanup, due-dose checks and prescription sync.
//!
//! One tokio task drives all timers. Service calls touch storage (and the
//! sync may do blocking HTTP), so each one runs on the blocking pool.
//! The task stops when `SweepHandle::shutdown` is called or the handle is
//! dropped, so no timer outlives the view that started it.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};

use crate::config::MediSyncConfig;
use crate::service::{ReminderError, ReminderService};
use crate::source::PrescriptionSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepIntervals {
    pub cleanup: Duration,
    pub due_check: Duration,
    pub sync: Option<Duration>,
}

impl From<&MediSyncConfig> for SweepIntervals {
    fn from(config: &MediSyncConfig) -> Self {
        Self {
            cleanup: config.cleanup_interval(),
            due_check: config.due_check_interval(),
            sync: config.sync_interval(),
        }
    }
}

/// Handle for the sweep task.
///
/// Supports graceful shutdown via `shutdown()` or automatic cleanup on `Drop`.
pub struct SweepHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl SweepHandle {
    /// Ask the task to stop. A sweep already in flight finishes first.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }

    /// Shut down and wait for the task to exit.
    pub async fn stop(mut self) {
        self.shutdown();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Sweep task ended abnormally");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for SweepHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Start the sweeps. Must be called from inside a tokio runtime.
pub fn start_sweeps(
    service: Arc<ReminderService>,
    source: Option<Arc<dyn PrescriptionSource>>,
    intervals: SweepIntervals,
) -> SweepHandle {
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let task = tokio::spawn(async move {
        tracing::info!(
            cleanup_secs = intervals.cleanup.as_secs_f64(),
            due_secs = intervals.due_check.as_secs_f64(),
            sync_enabled = intervals.sync.is_some() && source.is_some(),
            "Reminder sweeps started"
        );
        sweep_loop(service, source, intervals, shutdown_rx).await;
        tracing::info!("Reminder sweeps stopped");
    });

    SweepHandle { shutdown_tx: Some(shutdown_tx), task: Some(task) }
}

fn interval(period: Duration) -> Interval {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Tick if there is an interval, otherwise never complete.
async fn tick_optional(interval: &mut Option<Interval>) {
    match interval {
        Some(i) => {
            i.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

async fn sweep_loop(
    service: Arc<ReminderService>,
    source: Option<Arc<dyn PrescriptionSource>>,
    intervals: SweepIntervals,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let mut cleanup = interval(intervals.cleanup);
    let mut due = interval(intervals.due_check);
    let mut sync = match (&source, intervals.sync) {
        (Some(_), Some(period)) => Some(interval(period)),
        _ => None,
    };

    loop {
        tokio::select! {
            _ = &mut shutdown_rx => break,
            _ = tick_optional(&mut sync) => {
                if let Some(source) = source.clone() {
                    run_blocking("sync", &service, move |s| {
                        let report = s.sync(source.as_ref(), local_now().date())?;
                        tracing::debug!(?report, "Prescription sync finished");
                        Ok(())
                    })
                    .await;
                }
            }
            _ = cleanup.tick() => {
                run_blocking("cleanup", &service, |s| {
                    let removed = s.cleanup_sweep()?;
                    tracing::debug!(removed, "Cleanup sweep finished");
                    Ok(())
                })
                .await;
            }
            _ = due.tick() => {
                run_blocking("due-check", &service, |s| {
                    let due = s.due_sweep(local_now())?;
                    tracing::debug!(due = due.len(), "Due-dose sweep finished");
                    Ok(())
                })
                .await;
            }
        }
    }
}

/// Run one sweep on the blocking pool. Failures are logged, never fatal.
async fn run_blocking<F>(name: &'static str, service: &Arc<ReminderService>, f: F)
where
    F: FnOnce(&ReminderService) -> Result<(), ReminderError> + Send + 'static,
{
    let service = Arc::clone(service);
    match tokio::task::spawn_blocking(move || f(&service)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!(sweep = name, error = %e, "Sweep failed"),
        Err(e) => tracing::error!(sweep = name, error = %e, "Sweep task panicked"),
    }
}
