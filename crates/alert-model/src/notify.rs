//! Notification Delivery Records

use crate::{Fingerprint, ModelError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Delivery state of one (destination, fingerprint) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifyInfo {
    pub fingerprint: Fingerprint,
    /// Receiver the notification was sent to
    pub destination: String,
    /// The notification announced the resolution of the alert
    pub resolved: bool,
    /// Delivery succeeded
    pub delivered: bool,
    /// Time of the last send
    pub timestamp: DateTime<Utc>,
}

impl NotifyInfo {
    pub fn delivered(
        destination: impl Into<String>,
        fingerprint: Fingerprint,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            fingerprint,
            destination: destination.into(),
            resolved: false,
            delivered: true,
            timestamp,
        }
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.destination.trim().is_empty() {
            return Err(ModelError::EmptyDestination);
        }
        Ok(())
    }
}
