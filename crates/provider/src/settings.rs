//! Store Settings
//!
//! Loaded from an optional TOML file plus `ALERTCORE__SECTION__KEY`
//! environment overrides. Every field has a default.

use crate::ProviderError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "ALERTCORE";

/// Upper bound for every duration setting: 100 years
pub const MAX_DURATION_SECS: u64 = 100 * 365 * 24 * 3600;

/// Clamped to [`MAX_DURATION_SECS`] so the conversion cannot overflow
fn bounded_seconds(secs: u64) -> chrono::Duration {
    chrono::Duration::seconds(secs.min(MAX_DURATION_SECS) as i64)
}

/// Alert store settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertSettings {
    /// Queue capacity of each subscriber
    pub subscriber_buffer: usize,
    /// How long resolved alerts are kept (seconds)
    pub retention_secs: u64,
    /// Interval between garbage collection runs (seconds)
    pub gc_interval_secs: u64,
    /// End time given to alerts received without one (seconds)
    pub resolve_timeout_secs: u64,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            subscriber_buffer: 200,
            retention_secs: 5 * 24 * 3600,
            gc_interval_secs: 30 * 60,
            resolve_timeout_secs: 5 * 60,
        }
    }
}

impl AlertSettings {
    pub fn retention(&self) -> chrono::Duration {
        bounded_seconds(self.retention_secs)
    }

    pub fn gc_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.gc_interval_secs)
    }

    pub fn resolve_timeout(&self) -> chrono::Duration {
        bounded_seconds(self.resolve_timeout_secs)
    }
}

/// Silence store settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SilenceSettings {
    /// How long expired silences are kept (seconds)
    pub retention_secs: u64,
}

impl Default for SilenceSettings {
    fn default() -> Self {
        Self {
            retention_secs: 5 * 24 * 3600,
        }
    }
}

impl SilenceSettings {
    pub fn retention(&self) -> chrono::Duration {
        bounded_seconds(self.retention_secs)
    }
}

/// Notification ledger settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifySettings {
    /// Maximum records accepted by one `set` call
    pub max_batch: usize,
}

impl Default for NotifySettings {
    fn default() -> Self {
        Self { max_batch: 1000 }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Filter directive, e.g. `info` or `alert_mem_provider=debug`
    pub level: String,
    /// Emit JSON lines instead of human readable output
    pub json: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Complete settings tree
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub alerts: AlertSettings,
    pub silences: SilenceSettings,
    pub notifies: NotifySettings,
    pub log: LogSettings,
    /// Address of the Prometheus scrape endpoint, disabled when unset
    pub metrics_addr: Option<String>,
}

impl Settings {
    /// Load settings from `path` (if given) and the environment
    pub fn load(path: Option<&Path>) -> Result<Self, ProviderError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        let settings: Settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values the stores cannot operate with
    pub fn validate(&self) -> Result<(), ProviderError> {
        if self.alerts.subscriber_buffer == 0 {
            return Err(invalid("alerts.subscriber_buffer must be positive"));
        }
        if self.alerts.gc_interval_secs == 0 {
            return Err(invalid("alerts.gc_interval_secs must be positive"));
        }
        if self.notifies.max_batch == 0 {
            return Err(invalid("notifies.max_batch must be positive"));
        }
        let durations = [
            ("alerts.retention_secs", self.alerts.retention_secs),
            ("alerts.gc_interval_secs", self.alerts.gc_interval_secs),
            ("alerts.resolve_timeout_secs", self.alerts.resolve_timeout_secs),
            ("silences.retention_secs", self.silences.retention_secs),
        ];
        for (name, secs) in durations {
            if secs > MAX_DURATION_SECS {
                return Err(invalid(&format!(
                    "{name} must not exceed {MAX_DURATION_SECS} seconds"
                )));
            }
        }
        Ok(())
    }
}

fn invalid(message: &str) -> ProviderError {
    ProviderError::Settings(config::ConfigError::Message(message.to_string()))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::path::PathBuf;

    /// Write `contents` to a unique TOML file in the temp directory
    pub(crate) fn write_settings(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "alertcore-{}-{}.toml",
            name,
            std::process::id()
        ));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.alerts.subscriber_buffer, 200);
        assert_eq!(settings.alerts.retention(), chrono::Duration::days(5));
        assert_eq!(settings.alerts.gc_interval(), std::time::Duration::from_secs(1800));
    }

    #[test]
    fn test_load_from_file_keeps_unset_defaults() {
        let path = write_settings(
            "partial",
            "[alerts]\nsubscriber_buffer = 16\n\n[log]\njson = true\n",
        );
        let settings = Settings::load(Some(&path)).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(settings.alerts.subscriber_buffer, 16);
        assert_eq!(settings.alerts.resolve_timeout_secs, 300);
        assert!(settings.log.json);
        assert_eq!(settings.notifies.max_batch, 1000);
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let path = write_settings("invalid", "[notifies]\nmax_batch = 0\n");
        let result = Settings::load(Some(&path));
        std::fs::remove_file(&path).ok();
        assert!(matches!(result, Err(ProviderError::Settings(_))));
    }

    #[test]
    fn test_out_of_range_durations_are_rejected() {
        let mut settings = Settings::default();
        settings.alerts.retention_secs = 1 << 62;
        assert!(matches!(settings.validate(), Err(ProviderError::Settings(_))));
        assert_eq!(
            settings.alerts.retention(),
            chrono::Duration::seconds(MAX_DURATION_SECS as i64)
        );

        let mut settings = Settings::default();
        settings.silences.retention_secs = u64::MAX;
        assert!(matches!(settings.validate(), Err(ProviderError::Settings(_))));
        assert_eq!(
            settings.silences.retention(),
            chrono::Duration::seconds(MAX_DURATION_SECS as i64)
        );

        let path = write_settings("huge-timeout", "[alerts]\nresolve_timeout_secs = 4611686018427387904\n");
        let result = Settings::load(Some(&path));
        std::fs::remove_file(&path).ok();
        assert!(matches!(result, Err(ProviderError::Settings(_))));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let path = std::env::temp_dir().join("alertcore-does-not-exist.toml");
        assert!(matches!(
            Settings::load(Some(&path)),
            Err(ProviderError::Settings(_))
        ));
    }
}
