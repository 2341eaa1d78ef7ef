//! Silences and Label Matchers

use crate::labels::is_valid_label_name;
use crate::{LabelSet, ModelError};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Label matcher as authored by an administrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Matcher {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub is_regex: bool,
}

impl Matcher {
    /// Match a label value exactly
    pub fn equal(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            is_regex: false,
        }
    }

    /// Match a label value against an anchored regular expression
    pub fn regex(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: pattern.into(),
            is_regex: true,
        }
    }

    /// Validate the name and compile the pattern
    pub fn compile(&self) -> Result<CompiledMatcher, ModelError> {
        if !is_valid_label_name(&self.name) {
            return Err(ModelError::InvalidLabelName(self.name.clone()));
        }
        if !self.is_regex {
            return Ok(CompiledMatcher::Equal {
                name: self.name.clone(),
                value: self.value.clone(),
            });
        }
        let anchored = format!("^(?:{})$", self.value);
        let regex = Regex::new(&anchored).map_err(|e| ModelError::InvalidMatcher {
            name: self.name.clone(),
            reason: e.to_string(),
        })?;
        Ok(CompiledMatcher::Regex {
            name: self.name.clone(),
            regex,
        })
    }
}

/// Matcher ready for evaluation
#[derive(Debug, Clone)]
pub enum CompiledMatcher {
    Equal { name: String, value: String },
    Regex { name: String, regex: Regex },
}

impl CompiledMatcher {
    /// A missing label matches as the empty string
    pub fn matches(&self, labels: &LabelSet) -> bool {
        match self {
            CompiledMatcher::Equal { name, value } => labels.get(name).unwrap_or("") == value,
            CompiledMatcher::Regex { name, regex } => regex.is_match(labels.get(name).unwrap_or("")),
        }
    }
}

/// Administrator-authored mute rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Silence {
    /// Assigned by the store on creation
    #[serde(default)]
    pub id: Option<u64>,
    pub matchers: Vec<Matcher>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_by: String,
    #[serde(default)]
    pub comment: String,
}

impl Silence {
    pub fn new(matchers: Vec<Matcher>, starts_at: DateTime<Utc>, ends_at: DateTime<Utc>) -> Self {
        Self {
            id: None,
            matchers,
            starts_at,
            ends_at,
            created_at: None,
            created_by: String::new(),
            comment: String::new(),
        }
    }

    pub fn with_author(mut self, created_by: impl Into<String>, comment: impl Into<String>) -> Self {
        self.created_by = created_by.into();
        self.comment = comment.into();
        self
    }

    /// Active within the inclusive `[starts_at, ends_at]` window
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.starts_at <= now && now <= self.ends_at
    }

    /// Validate and compile all matchers
    pub fn compile(self) -> Result<CompiledSilence, ModelError> {
        if self.matchers.is_empty() {
            return Err(ModelError::EmptyMatchers);
        }
        if self.ends_at < self.starts_at {
            return Err(ModelError::InvalidTimeRange {
                start: self.starts_at.to_rfc3339(),
                end: self.ends_at.to_rfc3339(),
            });
        }
        let matchers = self
            .matchers
            .iter()
            .map(Matcher::compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CompiledSilence {
            silence: self,
            matchers,
        })
    }
}

/// Silence with its matchers compiled once
#[derive(Debug, Clone)]
pub struct CompiledSilence {
    silence: Silence,
    matchers: Vec<CompiledMatcher>,
}

impl CompiledSilence {
    pub fn silence(&self) -> &Silence {
        &self.silence
    }

    pub fn into_silence(self) -> Silence {
        self.silence
    }

    /// Stamp the store-assigned identity
    pub fn assign(mut self, id: u64, created_at: DateTime<Utc>) -> Self {
        self.silence.id = Some(id);
        self.silence.created_at = Some(created_at);
        self
    }

    /// Active at `now` and every matcher matches
    pub fn mutes_at(&self, labels: &LabelSet, now: DateTime<Utc>) -> bool {
        self.silence.is_active_at(now) && self.matchers.iter().all(|m| m.matches(labels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()
    }

    fn critical() -> LabelSet {
        LabelSet::new().with("alertname", "DiskFull").with("severity", "critical")
    }

    #[test]
    fn test_equal_matcher_window() {
        let t1 = t0() + Duration::hours(2);
        let silence = Silence::new(vec![Matcher::equal("severity", "critical")], t0(), t1)
            .compile()
            .unwrap();

        assert!(!silence.mutes_at(&critical(), t0() - Duration::seconds(1)));
        assert!(silence.mutes_at(&critical(), t0()));
        assert!(silence.mutes_at(&critical(), t1));
        assert!(!silence.mutes_at(&critical(), t1 + Duration::seconds(1)));
    }

    #[test]
    fn test_all_matchers_must_match() {
        let silence = Silence::new(
            vec![
                Matcher::equal("severity", "critical"),
                Matcher::equal("alertname", "CpuHigh"),
            ],
            t0(),
            t0() + Duration::hours(1),
        )
        .compile()
        .unwrap();
        assert!(!silence.mutes_at(&critical(), t0()));
    }

    #[test]
    fn test_regex_matcher_is_anchored() {
        let matcher = Matcher::regex("alertname", "Disk.*").compile().unwrap();
        assert!(matcher.matches(&critical()));

        let partial = Matcher::regex("alertname", "Full").compile().unwrap();
        assert!(!partial.matches(&critical()));
    }

    #[test]
    fn test_missing_label_matches_empty_value() {
        let matcher = Matcher::equal("team", "").compile().unwrap();
        assert!(matcher.matches(&critical()));
        let matcher = Matcher::regex("team", "ops|").compile().unwrap();
        assert!(matcher.matches(&critical()));
    }

    #[test]
    fn test_compile_rejects_invalid_silences() {
        let end = t0() + Duration::hours(1);
        assert!(matches!(
            Silence::new(vec![], t0(), end).compile(),
            Err(ModelError::EmptyMatchers)
        ));
        assert!(matches!(
            Silence::new(vec![Matcher::equal("a", "b")], end, t0()).compile(),
            Err(ModelError::InvalidTimeRange { .. })
        ));
        assert!(matches!(
            Silence::new(vec![Matcher::regex("a", "(")], t0(), end).compile(),
            Err(ModelError::InvalidMatcher { .. })
        ));
        assert!(matches!(
            Silence::new(vec![Matcher::equal("0a", "b")], t0(), end).compile(),
            Err(ModelError::InvalidLabelName(_))
        ));
    }
}
