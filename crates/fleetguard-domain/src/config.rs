use crate::types::Severity;
use serde::{Deserialize, Serialize};

/// Per-tenant pipeline settings, persisted as the tenant's Config envelope.
///
/// The feed cursor lives here so that a process restart resumes from the
/// last fully-processed batch instead of replaying the whole feed history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantSettings {
    /// Rule-name filters; an incident qualifies when any filter is a
    /// case-insensitive substring of its rule name.
    pub rule_filters: Vec<String>,

    /// Reports below this severity are not persisted
    pub min_severity: Severity,

    /// Opaque feed version marker; advanced only after a batch fully succeeds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feed_cursor: Option<String>,
}

impl Default for TenantSettings {
    fn default() -> Self {
        Self {
            rule_filters: vec!["collision".to_string(), "rollover".to_string()],
            min_severity: Severity::Low,
            feed_cursor: None,
        }
    }
}

impl TenantSettings {
    /// Case-insensitive substring match against the configured rule filters
    pub fn matches_rule(&self, rule_name: &str) -> bool {
        let rule = rule_name.to_lowercase();
        self.rule_filters
            .iter()
            .any(|filter| rule.contains(&filter.to_lowercase()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substring_match_is_case_insensitive() {
        let settings = TenantSettings {
            rule_filters: vec!["Collision".to_string()],
            ..Default::default()
        };
        assert!(settings.matches_rule("Minor Collision Detected"));
        assert!(settings.matches_rule("COLLISION"));
        assert!(!settings.matches_rule("Harsh Braking"));
    }

    #[test]
    fn test_any_filter_qualifies() {
        let settings = TenantSettings {
            rule_filters: vec!["collision".to_string(), "rollover".to_string()],
            ..Default::default()
        };
        assert!(settings.matches_rule("Vehicle Rollover"));
        assert!(!settings.matches_rule("Idle Too Long"));
    }

    #[test]
    fn test_no_filters_matches_nothing() {
        let settings = TenantSettings {
            rule_filters: vec![],
            ..Default::default()
        };
        assert!(!settings.matches_rule("Collision"));
    }
}
