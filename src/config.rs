use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::models::{BackendKind, EligibilityMode, SlotTimes};
use crate::schedule::EligibilityPolicy;

/// Application-level constants
pub const APP_NAME: &str = "MediSync";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Minutes after the scheduled time during which a dose may be marked taken.
pub const DEFAULT_ELIGIBILITY_WINDOW_MINUTES: u32 = 15;

/// Cleanup and due-dose sweeps run once a minute by default.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

/// How many days ahead reminders are materialized.
pub const DEFAULT_HORIZON_DAYS: u32 = 7;

/// Default clock times for the morning, afternoon and evening slots.
pub const DEFAULT_SLOT_TIMES: [(u32, u32); 3] = [(8, 0), (14, 0), (20, 0)];

pub fn default_log_filter() -> &'static str {
    "medisync=info,medisync_lib=info"
}

/// Get the application data directory (~/MediSync/).
///
/// Falls back to the working directory when no home directory is known.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

pub fn config_path() -> PathBuf {
    app_data_dir().join("config.json")
}

pub fn default_slot_times() -> SlotTimes {
    let [m, a, e] = DEFAULT_SLOT_TIMES.map(|(h, min)| NaiveTime::from_hms_opt(h, min, 0));
    SlotTimes::new(m, a, e)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Runtime configuration, read from `config.json` in the data directory.
/// Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediSyncConfig {
    pub eligibility_mode: EligibilityMode,
    pub eligibility_window_minutes: u32,
    pub cleanup_interval_secs: u64,
    pub due_check_interval_secs: u64,
    /// Prescription re-sync interval; `None` disables periodic sync.
    pub sync_interval_secs: Option<u64>,
    pub horizon_days: u32,
    pub slot_times: SlotTimes,
    pub backend: BackendKind,
    /// Storage location; defaults to the app data directory.
    pub data_dir: Option<PathBuf>,
    pub api_base_url: Option<String>,
    pub api_timeout_secs: u64,
    pub event_capacity: usize,
}

impl Default for MediSyncConfig {
    fn default() -> Self {
        Self {
            eligibility_mode: EligibilityMode::TimeOfDay,
            eligibility_window_minutes: DEFAULT_ELIGIBILITY_WINDOW_MINUTES,
            cleanup_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            due_check_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            sync_interval_secs: Some(15 * 60),
            horizon_days: DEFAULT_HORIZON_DAYS,
            slot_times: default_slot_times(),
            backend: BackendKind::Json,
            data_dir: None,
            api_base_url: None,
            api_timeout_secs: 30,
            event_capacity: 64,
        }
    }
}

impl MediSyncConfig {
    /// Load from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No config file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => return Err(ConfigError::Io { path: path.to_path_buf(), source }),
        };
        serde_json::from_str(&content)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }

    pub fn eligibility(&self) -> EligibilityPolicy {
        EligibilityPolicy {
            mode: self.eligibility_mode,
            window_minutes: self.eligibility_window_minutes,
        }
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(app_data_dir)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs.max(1))
    }

    pub fn due_check_interval(&self) -> Duration {
        Duration::from_secs(self.due_check_interval_secs.max(1))
    }

    pub fn sync_interval(&self) -> Option<Duration> {
        self.sync_interval_secs.map(|s| Duration::from_secs(s.max(1)))
    }
}
