//! Alert Data Model
//!
//! Provides the entities shared by every store:
//! - Label sets and content-derived fingerprints
//! - Alerts with merge and pending/resolved evaluation
//! - Silences with precompiled label matchers
//! - Notification delivery records
//! - A clock abstraction for evaluating time windows

mod alert;
mod clock;
mod error;
mod fingerprint;
mod labels;
mod notify;
mod silence;

pub use alert::Alert;
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::ModelError;
pub use fingerprint::Fingerprint;
pub use labels::LabelSet;
pub use notify::NotifyInfo;
pub use silence::{CompiledMatcher, CompiledSilence, Matcher, Silence};

/// Capability to decide whether a label set is currently muted.
pub trait Muter: Send + Sync {
    /// Returns true if any active rule suppresses the given label set.
    fn mutes(&self, labels: &LabelSet) -> bool;
}
