//! Provider Error Types

use alert_model::ModelError;
use std::fmt;
use thiserror::Error;

/// Errors returned by store operations
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Lookup or delete on an absent key
    #[error("{kind} {key} not found")]
    NotFound { kind: &'static str, key: String },

    /// Malformed input; the whole batch was rejected
    #[error("invalid argument: {0}")]
    InvalidArgument(#[from] ModelError),

    /// A concurrent writer won and this mutation lost
    #[error("conflict: {0}")]
    Conflict(String),

    /// Operation attempted on a closed iterator
    #[error("iterator is closed")]
    IteratorClosed,

    /// Subscriber queue overflowed and the subscriber was dropped
    #[error("subscriber fell behind and was dropped from the fan-out")]
    Lagged,

    /// Settings could not be loaded or are invalid
    #[error("settings error: {0}")]
    Settings(#[from] config::ConfigError),

    /// One or more reload hooks failed
    #[error(transparent)]
    Reload(#[from] AggregateReloadError),
}

impl ProviderError {
    pub fn not_found(kind: &'static str, key: impl fmt::Display) -> Self {
        ProviderError::NotFound {
            kind,
            key: key.to_string(),
        }
    }
}

/// A single failed reload hook
#[derive(Debug)]
pub struct ReloadFailure {
    pub component: String,
    pub error: anyhow::Error,
}

impl fmt::Display for ReloadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:#}", self.component, self.error)
    }
}

/// Every failure of one reload round
#[derive(Debug)]
pub struct AggregateReloadError {
    /// Number of hooks invoked in the round
    pub attempted: usize,
    pub failures: Vec<ReloadFailure>,
}

impl AggregateReloadError {
    /// Names of the components that failed
    pub fn components(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.component.as_str()).collect()
    }
}

impl fmt::Display for AggregateReloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} reload hooks failed",
            self.failures.len(),
            self.attempted
        )?;
        for failure in &self.failures {
            write!(f, "; {}", failure)?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateReloadError {}
