use std::process::ExitCode;
use std::sync::Arc;

use chrono::{Days, Local};
use tokio::sync::broadcast::error::RecvError;

use medisync_lib::config::{self, MediSyncConfig};
use medisync_lib::service::{ReminderEvent, ReminderService};
use medisync_lib::source::{PrescriptionSource, RestPrescriptionSource};
use medisync_lib::{store, sweeps};

fn main() -> ExitCode {
    medisync_lib::init_tracing();
    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "MediSync stopped with an error");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = MediSyncConfig::load(&config::config_path())?;
    let backend = store::open_backend(config.backend, &config.data_dir())?;
    let service = Arc::new(ReminderService::new(backend, &config)?);

    // The blocking HTTP client must be built and dropped outside the runtime
    let source: Option<Arc<dyn PrescriptionSource>> = match &config.api_base_url {
        Some(url) => {
            let source = RestPrescriptionSource::new(url, config.api_timeout_secs)?;
            tracing::info!(endpoint = %source.endpoint(), "Prescription sync enabled");
            Some(Arc::new(source))
        }
        None => {
            tracing::info!("No prescription service configured, using stored snapshot");
            let today = Local::now().date_naive();
            let horizon_end = today
                .checked_add_days(Days::new(u64::from(config.horizon_days.max(1) - 1)))
                .unwrap_or(today);
            service.materialize(&service.prescriptions()?, today, horizon_end)?;
            None
        }
    };

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let mut events = service.subscribe();
        let logger = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => log_event(&event),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Event listener fell behind");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        let handle = sweeps::start_sweeps(
            Arc::clone(&service),
            source.clone(),
            sweeps::SweepIntervals::from(&config),
        );

        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
        }
        tracing::info!("Shutting down");
        handle.stop().await;
        logger.abort();
    });
    drop(runtime);

    Ok(())
}

fn log_event(event: &ReminderEvent) {
    match event {
        ReminderEvent::DoseDue { medicine_name, scheduled_at, .. } => {
            tracing::info!(medicine = %medicine_name, at = %scheduled_at, "Time to take your medicine");
        }
        ReminderEvent::DoseMissed { medicine_name, scheduled_at, .. } => {
            tracing::warn!(medicine = %medicine_name, at = %scheduled_at, "Dose missed");
        }
        ReminderEvent::Completed { medicine_name, at, .. } => {
            tracing::info!(medicine = %medicine_name, %at, "Dose recorded");
        }
        other => tracing::debug!(event = ?other, "Reminder event"),
    }
}
