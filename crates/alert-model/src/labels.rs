//! Label Sets

use crate::{Fingerprint, ModelError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Ordered set of label name/value pairs
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelSet(BTreeMap<String, String>);

impl LabelSet {
    /// Create an empty label set
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Insert a label, returning the previous value
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(name.into(), value.into())
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// Look up a label value
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate labels sorted by name
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Copy every label of `other` into this set, overriding existing values
    pub fn extend_from(&mut self, other: &LabelSet) {
        for (name, value) in other.iter() {
            self.0.insert(name.to_string(), value.to_string());
        }
    }

    /// Content-derived identity of this label set
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::from_labels(self)
    }

    /// Check every label name is well formed
    pub fn validate_names(&self) -> Result<(), ModelError> {
        for name in self.0.keys() {
            if !is_valid_label_name(name) {
                return Err(ModelError::InvalidLabelName(name.clone()));
            }
        }
        Ok(())
    }
}

/// Check a name against `[a-zA-Z_][a-zA-Z0-9_]*`
pub(crate) fn is_valid_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl<K, V> FromIterator<(K, V)> for LabelSet
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl fmt::Display for LabelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, value)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={:?}", name, value)?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_name_validation() {
        assert!(is_valid_label_name("alertname"));
        assert!(is_valid_label_name("_private"));
        assert!(is_valid_label_name("job_2"));
        assert!(!is_valid_label_name(""));
        assert!(!is_valid_label_name("2xx"));
        assert!(!is_valid_label_name("with-dash"));
    }

    #[test]
    fn test_validate_names_reports_offender() {
        let labels = LabelSet::new().with("ok", "1").with("bad name", "2");
        assert_eq!(
            labels.validate_names(),
            Err(ModelError::InvalidLabelName("bad name".to_string()))
        );
    }

    #[test]
    fn test_display_is_sorted() {
        let labels: LabelSet = [("severity", "critical"), ("alertname", "Down")]
            .into_iter()
            .collect();
        assert_eq!(labels.to_string(), r#"{alertname="Down", severity="critical"}"#);
    }
}
