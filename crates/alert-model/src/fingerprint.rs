//! Label Set Fingerprinting
//!
//! FNV-1a 64 over the sorted label pairs, each name and value terminated by
//! a `0xff` separator byte. The hash is stable across processes and releases,
//! so fingerprints can be stored and compared between restarts.

use crate::{LabelSet, ModelError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const FNV_OFFSET: u64 = 14_695_981_039_346_656_037;
const FNV_PRIME: u64 = 1_099_511_628_211;
const SEPARATOR: u8 = 0xff;

/// Deterministic identity of an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(u64);

impl Fingerprint {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Hash a label set
    pub fn from_labels(labels: &LabelSet) -> Self {
        let mut hash = FNV_OFFSET;
        for (name, value) in labels.iter() {
            hash = fnv_write(hash, name.as_bytes());
            hash = fnv_write(hash, &[SEPARATOR]);
            hash = fnv_write(hash, value.as_bytes());
            hash = fnv_write(hash, &[SEPARATOR]);
        }
        Self(hash)
    }
}

fn fnv_write(mut hash: u64, bytes: &[u8]) -> u64 {
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl FromStr for Fingerprint {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s.len() > 16 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ModelError::InvalidFingerprint(s.to_string()));
        }
        u64::from_str_radix(s, 16)
            .map(Self)
            .map_err(|_| ModelError::InvalidFingerprint(s.to_string()))
    }
}
