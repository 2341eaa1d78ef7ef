//! In-Memory Alert Store

use crate::broadcast::Broadcaster;
use alert_model::{Alert, Clock, Fingerprint};
use alert_provider::{AlertIterator, AlertSettings, Alerts, ProviderError, Reloadable, Settings};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use metrics::{counter, gauge};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info};

/// Alert store keyed by fingerprint.
///
/// Each fingerprint's entry is locked independently, so puts on unrelated
/// alerts do not serialize. Publications for one fingerprint happen under its
/// entry lock and therefore follow the order of the puts that caused them.
pub struct MemAlerts {
    alerts: DashMap<Fingerprint, Alert>,
    broadcaster: Arc<Broadcaster>,
    clock: Arc<dyn Clock>,
    settings: RwLock<AlertSettings>,
}

impl MemAlerts {
    pub fn new(settings: AlertSettings, clock: Arc<dyn Clock>) -> Self {
        info!(
            subscriber_buffer = settings.subscriber_buffer,
            retention_secs = settings.retention_secs,
            "creating in-memory alert store"
        );
        Self {
            alerts: DashMap::new(),
            broadcaster: Broadcaster::new(),
            clock,
            settings: RwLock::new(settings),
        }
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    /// Number of live subscriptions
    pub fn subscribers(&self) -> usize {
        self.broadcaster.len()
    }

    pub fn gc_interval(&self) -> std::time::Duration {
        self.settings.read().gc_interval()
    }

    /// Remove alerts resolved for longer than the retention period
    pub fn gc(&self) -> usize {
        let retention = self.settings.read().retention();
        // Nothing can be older than the earliest representable instant
        let Some(cutoff) = self.clock.now().checked_sub_signed(retention) else {
            return 0;
        };
        let mut removed = 0;

        self.alerts.retain(|_, alert| {
            let expired = alert.ends_at.map_or(false, |ends_at| ends_at < cutoff);
            if expired {
                removed += 1;
            }
            !expired
        });

        if removed > 0 {
            debug!(removed, "garbage collected resolved alerts");
            counter!("alertcore_alerts_collected_total").increment(removed as u64);
        }
        gauge!("alertcore_alerts").set(self.alerts.len() as f64);
        removed
    }

    /// Merge `incoming` into the stored state of its fingerprint and publish
    /// it if the alert just became active and pending
    fn upsert(&self, incoming: Alert, now: DateTime<Utc>) {
        let fingerprint = incoming.fingerprint();

        match self.alerts.entry(fingerprint) {
            Entry::Occupied(mut entry) => {
                let previous = entry.get();
                let was_pending = previous.is_pending_at(now);

                let next = if previous.overlaps(&incoming) {
                    let mut merged = previous.merge(&incoming);
                    if !changes_state(previous, &merged, now) {
                        merged.updated_at = previous.updated_at;
                    }
                    merged
                } else {
                    incoming
                };

                let publish = !was_pending && next.is_pending_at(now);
                entry.insert(next);
                if publish {
                    self.broadcaster.publish(entry.get());
                }
            }
            Entry::Vacant(entry) => {
                let publish = incoming.is_pending_at(now);
                let stored = entry.insert(incoming);
                if publish {
                    self.broadcaster.publish(stored.value());
                }
            }
        }
    }
}

/// A merge changes state when the alert starts or stops being active, or its
/// annotations change. Extending the end of a firing alert does not.
fn changes_state(previous: &Alert, merged: &Alert, now: DateTime<Utc>) -> bool {
    previous.is_active_at(now) != merged.is_active_at(now) || previous.annotations != merged.annotations
}

impl Alerts for MemAlerts {
    fn subscribe(&self) -> AlertIterator {
        let capacity = self.settings.read().subscriber_buffer;
        self.broadcaster.subscribe(capacity)
    }

    fn get_pending(&self) -> AlertIterator {
        let now = self.clock.now();
        let mut pending: Vec<Alert> = self
            .alerts
            .iter()
            .filter(|entry| entry.value().is_pending_at(now))
            .map(|entry| entry.value().clone())
            .collect();
        pending.sort_by_key(|alert| alert.starts_at);
        debug!(count = pending.len(), "pending alert snapshot taken");
        AlertIterator::snapshot(pending)
    }

    fn get(&self, fingerprint: Fingerprint) -> Result<Alert, ProviderError> {
        self.alerts
            .get(&fingerprint)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ProviderError::not_found("alert", fingerprint))
    }

    fn put(&self, alerts: Vec<Alert>) -> Result<(), ProviderError> {
        for alert in &alerts {
            alert.validate()?;
        }

        let now = self.clock.now();
        let resolve_timeout = self.settings.read().resolve_timeout();
        counter!("alertcore_alerts_received_total").increment(alerts.len() as u64);

        for alert in alerts {
            let mut incoming = alert.with_resolve_timeout(now, resolve_timeout);
            incoming.updated_at = now;
            // Only mark_notified records deliveries
            incoming.last_notified = None;
            self.upsert(incoming, now);
        }

        gauge!("alertcore_alerts").set(self.alerts.len() as f64);
        Ok(())
    }

    fn mark_notified(&self, fingerprint: Fingerprint, at: DateTime<Utc>) -> Result<(), ProviderError> {
        let mut entry = self
            .alerts
            .get_mut(&fingerprint)
            .ok_or_else(|| ProviderError::not_found("alert", fingerprint))?;
        let alert = entry.value_mut();
        alert.last_notified = alert.last_notified.max(Some(at));
        Ok(())
    }
}

impl Reloadable for MemAlerts {
    fn name(&self) -> &str {
        "alerts"
    }

    fn reload(&self, settings: &Settings) -> anyhow::Result<()> {
        anyhow::ensure!(
            settings.alerts.subscriber_buffer > 0,
            "subscriber buffer must be positive"
        );
        *self.settings.write() = settings.alerts.clone();
        Ok(())
    }
}
