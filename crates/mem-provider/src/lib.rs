//! In-Memory Stores
//!
//! Implements the store contracts of `alert-provider` on concurrent
//! in-memory maps:
//! - [`MemAlerts`]: alerts keyed by fingerprint, with subscriber fan-out
//! - [`MemSilences`]: compiled silences keyed by id
//! - [`MemNotifies`]: per-destination delivery ledger

mod alerts;
mod broadcast;
mod notifies;
mod silences;

pub use alerts::MemAlerts;
pub use notifies::MemNotifies;
pub use silences::MemSilences;

use alert_model::Clock;
use alert_provider::{ReloadCoordinator, Reloadable, Settings};
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// The three stores built from one settings tree
pub struct MemProvider {
    pub alerts: Arc<MemAlerts>,
    pub silences: Arc<MemSilences>,
    pub notifies: Arc<MemNotifies>,
}

impl MemProvider {
    pub fn new(settings: &Settings, clock: Arc<dyn Clock>) -> Self {
        Self {
            alerts: Arc::new(MemAlerts::new(settings.alerts.clone(), clock.clone())),
            silences: Arc::new(MemSilences::new(settings.silences.clone(), clock)),
            notifies: Arc::new(MemNotifies::new(settings.notifies.clone())),
        }
    }

    /// Every store as a reload target
    pub fn reloadables(&self) -> Vec<Arc<dyn Reloadable>> {
        vec![
            self.alerts.clone() as Arc<dyn Reloadable>,
            self.silences.clone() as Arc<dyn Reloadable>,
            self.notifies.clone() as Arc<dyn Reloadable>,
        ]
    }

    pub fn register_with(&self, coordinator: &ReloadCoordinator) {
        for component in self.reloadables() {
            coordinator.register(component);
        }
    }

    /// Run garbage collection of both stores on the configured interval.
    ///
    /// The task holds weak references only and ends once the stores are
    /// dropped. The interval is re-read each round so reloads apply.
    pub fn spawn_gc(&self) -> JoinHandle<()> {
        let alerts: Weak<MemAlerts> = Arc::downgrade(&self.alerts);
        let silences: Weak<MemSilences> = Arc::downgrade(&self.silences);

        tokio::spawn(async move {
            loop {
                let interval = match alerts.upgrade() {
                    Some(alerts) => alerts.gc_interval(),
                    None => break,
                };
                tokio::time::sleep(interval).await;

                let (Some(alerts), Some(silences)) = (alerts.upgrade(), silences.upgrade()) else {
                    break;
                };
                let removed_alerts = alerts.gc();
                let removed_silences = silences.gc();
                debug!(removed_alerts, removed_silences, "garbage collection finished");
            }
            info!("garbage collection stopped");
        })
    }
}
