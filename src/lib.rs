pub mod config;
pub mod db;
pub mod models;
pub mod schedule; // Recurrence, eligibility and adherence rules
pub mod service;
pub mod source; // Clinic prescription feed
pub mod store; // Reminder persistence backends
pub mod sweeps; // Background cleanup, due-dose and sync timers

#[cfg(test)]
pub mod fixtures;

use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter()));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
