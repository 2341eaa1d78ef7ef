//! Alert Entity

use crate::{Fingerprint, LabelSet, ModelError};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// One occurrence of a firing condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    /// Identifying labels, source of the fingerprint
    pub labels: LabelSet,
    /// Informational labels
    #[serde(default)]
    pub annotations: LabelSet,
    /// Start of the firing episode
    pub starts_at: DateTime<Utc>,
    /// Resolution time, `None` while firing
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
    /// `ends_at` was derived from the resolve timeout
    #[serde(default)]
    pub timeout: bool,
    /// Last time the store observed a state change
    pub updated_at: DateTime<Utc>,
    /// Last successful notification
    #[serde(default)]
    pub last_notified: Option<DateTime<Utc>>,
    /// Link back to the producer of the alert
    #[serde(default, rename = "generatorURL")]
    pub generator_url: Option<String>,
}

impl Alert {
    /// Create a firing alert starting at `starts_at`
    pub fn new(labels: LabelSet, starts_at: DateTime<Utc>) -> Self {
        Self {
            labels,
            annotations: LabelSet::new(),
            starts_at,
            ends_at: None,
            timeout: false,
            updated_at: starts_at,
            last_notified: None,
            generator_url: None,
        }
    }

    pub fn with_annotations(mut self, annotations: LabelSet) -> Self {
        self.annotations = annotations;
        self
    }

    pub fn with_ends_at(mut self, ends_at: DateTime<Utc>) -> Self {
        self.ends_at = Some(ends_at);
        self.timeout = false;
        self
    }

    /// Give a firing alert an end time `timeout` after now, or after its
    /// start if that lies in the future.
    ///
    /// Alerts that already carry an end time are returned unchanged. The end
    /// time saturates at the latest representable instant.
    pub fn with_resolve_timeout(mut self, now: DateTime<Utc>, timeout: Duration) -> Self {
        if self.ends_at.is_none() {
            let ends_at = now
                .max(self.starts_at)
                .checked_add_signed(timeout)
                .unwrap_or(DateTime::<Utc>::MAX_UTC);
            self.ends_at = Some(ends_at);
            self.timeout = true;
        }
        self
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.labels.fingerprint()
    }

    /// Resolved once the end time has passed
    pub fn is_resolved_at(&self, now: DateTime<Utc>) -> bool {
        self.ends_at.map_or(false, |ends_at| ends_at < now)
    }

    /// Started and not yet resolved
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.starts_at <= now && !self.is_resolved_at(now)
    }

    /// Active and not notified about its latest state
    pub fn is_pending_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active_at(now)
            && self
                .last_notified
                .map_or(true, |notified| notified < self.updated_at)
    }

    /// Check the alert is well formed
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.labels.is_empty() {
            return Err(ModelError::EmptyLabelSet);
        }
        self.labels.validate_names()?;
        self.annotations.validate_names()?;
        if let Some(ends_at) = self.ends_at {
            if ends_at < self.starts_at {
                return Err(ModelError::InvalidTimeRange {
                    start: self.starts_at.to_rfc3339(),
                    end: ends_at.to_rfc3339(),
                });
            }
        }
        Ok(())
    }

    /// Merge two observations of the same alert.
    ///
    /// The younger alert (by `updated_at`) is the base of the result. The
    /// earliest start time is kept, and an explicit resolution of the older
    /// alert that lies after the younger one's end time still rules.
    pub fn merge(&self, other: &Alert) -> Alert {
        if other.updated_at < self.updated_at {
            return other.merge(self);
        }

        let mut merged = other.clone();

        if self.starts_at < other.starts_at {
            merged.starts_at = self.starts_at;
        }

        if let Some(older_end) = self.ends_at {
            let later_than_younger = other.ends_at.map_or(false, |end| older_end > end);
            if !self.timeout && later_than_younger {
                merged.ends_at = Some(older_end);
                merged.timeout = false;
            }
        }

        merged.annotations = self.annotations.clone();
        merged.annotations.extend_from(&other.annotations);

        merged.last_notified = self.last_notified.max(other.last_notified);

        if merged.generator_url.is_none() {
            merged.generator_url = self.generator_url.clone();
        }

        merged
    }

    /// Activity ranges of the two observations intersect.
    ///
    /// Observations that do not overlap belong to different firing episodes
    /// and are not merged.
    pub fn overlaps(&self, other: &Alert) -> bool {
        let other_starts_in_time = self.ends_at.map_or(true, |end| other.starts_at <= end);
        let self_starts_in_time = other.ends_at.map_or(true, |end| self.starts_at <= end);
        other_starts_in_time && self_starts_in_time
    }
}
