//! `~/.config/gleaner/config.toml`: database location, tick cadence, fan-out.
//!
//! The file is optional. Unknown keys are warned about and otherwise ignored.

use serde::Deserialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::ingest::{ScheduleError, SchedulerConfig};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config file is not valid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large (limit {limit} bytes)")]
    TooLarge { limit: u64 },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<ScheduleError> for ConfigError {
    fn from(err: ScheduleError) -> Self {
        ConfigError::Invalid(err.to_string())
    }
}

/// Process-wide settings, fixed once the scheduler starts.
///
/// Every key is optional; absent keys take the [`Default`] value.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database file. Empty means `<config dir>/gleaner.db`.
    pub database_path: String,

    /// Seconds between scheduler ticks.
    pub fetch_interval_secs: u64,

    /// Feeds selected per tick; also the cap on concurrent fetches.
    pub concurrency: usize,

    /// Per-feed HTTP timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: String::new(),
            fetch_interval_secs: 60,
            concurrency: 10,
            request_timeout_secs: 10,
        }
    }
}

const MAX_CONFIG_BYTES: u64 = 1024 * 1024;

const KNOWN_KEYS: &[&str] = &[
    "database_path",
    "fetch_interval_secs",
    "concurrency",
    "request_timeout_secs",
];

impl Config {
    /// Read `path`, falling back to defaults when the file is absent or blank.
    ///
    /// Values are not range-checked here; call [`Config::validate`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let file = match std::fs::File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        // One byte past the limit is enough to know the file is too big
        let mut content = String::new();
        file.take(MAX_CONFIG_BYTES + 1).read_to_string(&mut content)?;
        if content.len() as u64 > MAX_CONFIG_BYTES {
            return Err(ConfigError::TooLarge {
                limit: MAX_CONFIG_BYTES,
            });
        }

        let table: toml::Table = content.parse()?;
        for key in table.keys().filter(|k| !KNOWN_KEYS.contains(&k.as_str())) {
            tracing::warn!(key = %key, path = %path.display(), "Ignoring unknown config key");
        }

        let config: Config = toml::Value::Table(table).try_into()?;
        tracing::info!(
            path = %path.display(),
            interval_secs = config.fetch_interval_secs,
            concurrency = config.concurrency,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Reject values the pipeline cannot run with. Failure here is fatal at startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        self.scheduler_config()?;
        Ok(())
    }

    pub fn scheduler_config(&self) -> Result<SchedulerConfig, ScheduleError> {
        SchedulerConfig::new(
            Duration::from_secs(self.fetch_interval_secs),
            self.concurrency,
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Database path, falling back to `gleaner.db` inside `config_dir`.
    pub fn database_path_in(&self, config_dir: &Path) -> PathBuf {
        if self.database_path.is_empty() {
            config_dir.join("gleaner.db")
        } else {
            PathBuf::from(&self.database_path)
        }
    }
}
