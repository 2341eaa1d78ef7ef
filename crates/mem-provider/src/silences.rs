//! In-Memory Silence Store

use alert_model::{Clock, CompiledSilence, LabelSet, Muter, Silence};
use alert_provider::{ProviderError, Reloadable, SilenceSettings, Settings, Silences};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use metrics::{counter, gauge};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Silence store keyed by id. Matchers are compiled when a silence is set,
/// mute evaluation only runs the compiled form.
pub struct MemSilences {
    silences: DashMap<u64, CompiledSilence>,
    next_id: AtomicU64,
    clock: Arc<dyn Clock>,
    settings: RwLock<SilenceSettings>,
}

impl MemSilences {
    pub fn new(settings: SilenceSettings, clock: Arc<dyn Clock>) -> Self {
        info!(retention_secs = settings.retention_secs, "creating in-memory silence store");
        Self {
            silences: DashMap::new(),
            next_id: AtomicU64::new(1),
            clock,
            settings: RwLock::new(settings),
        }
    }

    pub fn len(&self) -> usize {
        self.silences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.silences.is_empty()
    }

    /// Evaluate the label set against every silence at an explicit instant
    pub fn mutes_at(&self, labels: &LabelSet, now: DateTime<Utc>) -> bool {
        self.silences
            .iter()
            .any(|entry| entry.value().mutes_at(labels, now))
    }

    /// Remove silences that ended longer than the retention period ago
    pub fn gc(&self) -> usize {
        let retention = self.settings.read().retention();
        let Some(cutoff) = self.clock.now().checked_sub_signed(retention) else {
            return 0;
        };
        let before = self.silences.len();

        self.silences
            .retain(|_, compiled| compiled.silence().ends_at >= cutoff);

        let removed = before.saturating_sub(self.silences.len());
        if removed > 0 {
            debug!(removed, "garbage collected expired silences");
        }
        gauge!("alertcore_silences").set(self.silences.len() as f64);
        removed
    }

    fn replace(&self, id: u64, compiled: CompiledSilence) -> Result<(), ProviderError> {
        let mut entry = self
            .silences
            .get_mut(&id)
            .ok_or_else(|| ProviderError::not_found("silence", id))?;
        let created_at = entry
            .silence()
            .created_at
            .unwrap_or_else(|| self.clock.now());
        *entry = compiled.assign(id, created_at);
        Ok(())
    }
}

impl Muter for MemSilences {
    fn mutes(&self, labels: &LabelSet) -> bool {
        let muted = self.mutes_at(labels, self.clock.now());
        if muted {
            counter!("alertcore_alerts_muted_total").increment(1);
        }
        muted
    }
}

impl Silences for MemSilences {
    fn all(&self) -> Result<Vec<Silence>, ProviderError> {
        let mut silences: Vec<Silence> = self
            .silences
            .iter()
            .map(|entry| entry.value().silence().clone())
            .collect();
        silences.sort_by_key(|silence| silence.id);
        Ok(silences)
    }

    fn set(&self, silence: Silence) -> Result<u64, ProviderError> {
        let existing = silence.id;
        let compiled = silence.compile()?;

        let id = match existing {
            Some(id) => {
                self.replace(id, compiled)?;
                debug!(silence = id, "silence updated");
                id
            }
            None => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let now = self.clock.now();
                self.silences.insert(id, compiled.assign(id, now));
                debug!(silence = id, "silence created");
                id
            }
        };

        gauge!("alertcore_silences").set(self.silences.len() as f64);
        Ok(id)
    }

    fn del(&self, id: u64) -> Result<(), ProviderError> {
        self.silences
            .remove(&id)
            .ok_or_else(|| ProviderError::not_found("silence", id))?;
        debug!(silence = id, "silence deleted");
        gauge!("alertcore_silences").set(self.silences.len() as f64);
        Ok(())
    }

    fn get(&self, id: u64) -> Result<Silence, ProviderError> {
        self.silences
            .get(&id)
            .map(|entry| entry.value().silence().clone())
            .ok_or_else(|| ProviderError::not_found("silence", id))
    }
}

impl Reloadable for MemSilences {
    fn name(&self) -> &str {
        "silences"
    }

    fn reload(&self, settings: &Settings) -> anyhow::Result<()> {
        *self.settings.write() = settings.silences.clone();
        Ok(())
    }
}
