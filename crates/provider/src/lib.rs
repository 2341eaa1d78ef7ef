//! Store Contracts
//!
//! Defines the capability surfaces consumed by the API layer and the
//! notification pipeline:
//! - [`Alerts`]: insert, lookup, live subscription and pending snapshot
//! - [`Silences`]: CRUD plus the [`Muter`] capability
//! - [`Notifies`]: per-destination delivery ledger
//! - [`Config`]: reload of registered components
//!
//! Implementations may keep their data in memory or in a persistent
//! backend; callers only depend on these traits.

mod error;
mod iterator;
mod reload;
mod settings;

pub use error::{AggregateReloadError, ProviderError, ReloadFailure};
pub use iterator::{AlertIterator, Subscription, Unsubscribe};
pub use reload::{ReloadCoordinator, Reloadable};
pub use settings::{
    AlertSettings, LogSettings, NotifySettings, Settings, SilenceSettings, ENV_PREFIX,
    MAX_DURATION_SECS,
};

pub use alert_model::Muter;

use alert_model::{Alert, Fingerprint, NotifyInfo, Silence};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Access to the set of known alerts
pub trait Alerts: Send + Sync {
    /// Iterator over alerts as they become active and not yet notified.
    /// No ordering is guaranteed across fingerprints.
    fn subscribe(&self) -> AlertIterator;

    /// Point-in-time iterator over all alerts with pending notifications
    fn get_pending(&self) -> AlertIterator;

    /// Alert for a fingerprint
    fn get(&self, fingerprint: Fingerprint) -> Result<Alert, ProviderError>;

    /// Insert or merge a batch of alerts. Nothing is written if any alert
    /// in the batch is invalid.
    fn put(&self, alerts: Vec<Alert>) -> Result<(), ProviderError>;

    /// Record a successful notification about the alert's current state
    fn mark_notified(&self, fingerprint: Fingerprint, at: DateTime<Utc>) -> Result<(), ProviderError>;
}

/// Access to silences. Mute evaluation covers every silence in the store.
pub trait Silences: Muter {
    /// Snapshot of all silences
    fn all(&self) -> Result<Vec<Silence>, ProviderError>;

    /// Create (no id) or replace (existing id) a silence, returning its id
    fn set(&self, silence: Silence) -> Result<u64, ProviderError>;

    /// Remove a silence
    fn del(&self, id: u64) -> Result<(), ProviderError>;

    fn get(&self, id: u64) -> Result<Silence, ProviderError>;
}

/// Pending and successful notification records
pub trait Notifies: Send + Sync {
    /// One entry per requested fingerprint, in request order.
    /// `None` means the alert was never notified to `destination`.
    fn get(
        &self,
        destination: &str,
        fingerprints: &[Fingerprint],
    ) -> Result<Vec<Option<NotifyInfo>>, ProviderError>;

    /// Record several notifications at once. All or none are written.
    fn set(&self, records: Vec<NotifyInfo>) -> Result<(), ProviderError>;
}

/// Configuration reload entry point
pub trait Config: Send + Sync {
    /// Reload the given components. Every component is attempted; failures
    /// are reported together.
    fn reload(&self, reloadables: &[Arc<dyn Reloadable>]) -> Result<(), ProviderError>;
}
