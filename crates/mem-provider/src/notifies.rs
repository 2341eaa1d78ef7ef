//! In-Memory Notification Ledger

use alert_model::{Fingerprint, ModelError, NotifyInfo};
use alert_provider::{NotifySettings, Notifies, ProviderError, Reloadable, Settings};
use metrics::counter;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

type Ledger = HashMap<String, HashMap<Fingerprint, NotifyInfo>>;

/// Delivery records per destination and fingerprint.
///
/// A single lock covers all destinations so that a batch spanning several
/// of them is checked and applied as one unit.
pub struct MemNotifies {
    ledger: RwLock<Ledger>,
    max_batch: AtomicUsize,
}

impl MemNotifies {
    pub fn new(settings: NotifySettings) -> Self {
        Self {
            ledger: RwLock::new(HashMap::new()),
            max_batch: AtomicUsize::new(settings.max_batch),
        }
    }

    /// Number of stored records across all destinations
    pub fn len(&self) -> usize {
        self.ledger.read().values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reject malformed batches before the ledger is touched
    fn validate_batch(&self, records: &[NotifyInfo]) -> Result<(), ModelError> {
        let max = self.max_batch.load(Ordering::Relaxed);
        if records.len() > max {
            return Err(ModelError::BatchTooLarge {
                len: records.len(),
                max,
            });
        }

        let mut seen = HashSet::with_capacity(records.len());
        for record in records {
            record.validate()?;
            if !seen.insert((record.destination.as_str(), record.fingerprint)) {
                return Err(ModelError::DuplicateNotify {
                    destination: record.destination.clone(),
                    fingerprint: record.fingerprint.to_string(),
                });
            }
        }
        Ok(())
    }
}

impl Notifies for MemNotifies {
    fn get(
        &self,
        destination: &str,
        fingerprints: &[Fingerprint],
    ) -> Result<Vec<Option<NotifyInfo>>, ProviderError> {
        let ledger = self.ledger.read();
        let records = ledger.get(destination);
        Ok(fingerprints
            .iter()
            .map(|fp| records.and_then(|records| records.get(fp)).cloned())
            .collect())
    }

    fn set(&self, records: Vec<NotifyInfo>) -> Result<(), ProviderError> {
        self.validate_batch(&records)?;

        let mut ledger = self.ledger.write();

        for record in &records {
            let stored = ledger
                .get(&record.destination)
                .and_then(|by_fp| by_fp.get(&record.fingerprint));
            if let Some(stored) = stored {
                if record.timestamp < stored.timestamp {
                    return Err(ProviderError::Conflict(format!(
                        "record for {} at {} is older than stored delivery at {}",
                        record.fingerprint, record.destination, stored.timestamp
                    )));
                }
            }
        }

        let count = records.len();
        for record in records {
            ledger
                .entry(record.destination.clone())
                .or_default()
                .insert(record.fingerprint, record);
        }

        debug!(records = count, "notification records stored");
        counter!("alertcore_notifies_written_total").increment(count as u64);
        Ok(())
    }
}

impl Reloadable for MemNotifies {
    fn name(&self) -> &str {
        "notifies"
    }

    fn reload(&self, settings: &Settings) -> anyhow::Result<()> {
        anyhow::ensure!(settings.notifies.max_batch > 0, "notify batch size must be positive");
        self.max_batch.store(settings.notifies.max_batch, Ordering::Relaxed);
        Ok(())
    }
}
