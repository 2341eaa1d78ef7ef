//! Model Validation Errors

use thiserror::Error;

/// Errors raised while validating model entities
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// Alert carries no identifying labels
    #[error("label set is empty")]
    EmptyLabelSet,

    /// Label name does not match `[a-zA-Z_][a-zA-Z0-9_]*`
    #[error("invalid label name: {0:?}")]
    InvalidLabelName(String),

    /// Fingerprint string is not 1-16 hex digits
    #[error("invalid fingerprint: {0:?}")]
    InvalidFingerprint(String),

    /// End of a time window lies before its start
    #[error("end time {end} is before start time {start}")]
    InvalidTimeRange { start: String, end: String },

    /// Silence without matchers would mute everything
    #[error("silence has no matchers")]
    EmptyMatchers,

    /// Matcher regex failed to compile
    #[error("invalid matcher for label {name}: {reason}")]
    InvalidMatcher { name: String, reason: String },

    /// Notify record without a destination
    #[error("notify record has an empty destination")]
    EmptyDestination,

    /// Same (destination, fingerprint) twice in one batch
    #[error("duplicate notify record for {destination}/{fingerprint}")]
    DuplicateNotify {
        destination: String,
        fingerprint: String,
    },

    /// Batch exceeds the configured limit
    #[error("batch of {len} records exceeds the limit of {max}")]
    BatchTooLarge { len: usize, max: usize },
}
