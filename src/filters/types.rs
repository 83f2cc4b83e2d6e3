use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// What a rule does when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterAction {
    Skip,
    MarkRead,
    MarkLiked,
}

impl FilterAction {
    pub const ALL: [FilterAction; 3] = [
        FilterAction::Skip,
        FilterAction::MarkRead,
        FilterAction::MarkLiked,
    ];

    /// Accepts the canonical names as well as the legacy display names.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "skip" | "skipped" => Some(FilterAction::Skip),
            "mark-read" | "mark as read" => Some(FilterAction::MarkRead),
            "mark-liked" | "mark as favorite" => Some(FilterAction::MarkLiked),
            _ => None,
        }
    }
}

impl fmt::Display for FilterAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterAction::Skip => write!(f, "skip"),
            FilterAction::MarkRead => write!(f, "mark-read"),
            FilterAction::MarkLiked => write!(f, "mark-liked"),
        }
    }
}

/// Whether a rule fires on a match or on the absence of one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterTrigger {
    OnMatch,
    OnNoMatch,
}

impl FilterTrigger {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "on-match" | "match" => Some(FilterTrigger::OnMatch),
            "on-no-match" | "no match" => Some(FilterTrigger::OnNoMatch),
            _ => None,
        }
    }

    pub fn fires(self, matched: bool) -> bool {
        match self {
            FilterTrigger::OnMatch => matched,
            FilterTrigger::OnNoMatch => !matched,
        }
    }
}

impl fmt::Display for FilterTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterTrigger::OnMatch => write!(f, "on-match"),
            FilterTrigger::OnNoMatch => write!(f, "on-no-match"),
        }
    }
}

/// How the pattern is compared against the candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterKind {
    Regex,
    SubstringMatch,
    ExactMatch,
    TagExactMatch,
    TagSubstringMatch,
}

impl FilterKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "regex" => Some(FilterKind::Regex),
            "substring-match" | "simple match" => Some(FilterKind::SubstringMatch),
            "exact-match" | "exact match" => Some(FilterKind::ExactMatch),
            "tag-exact-match" | "tag match" => Some(FilterKind::TagExactMatch),
            "tag-substring-match" | "tag contains" => Some(FilterKind::TagSubstringMatch),
            _ => None,
        }
    }

    pub fn needs_title(self) -> bool {
        matches!(
            self,
            FilterKind::Regex | FilterKind::SubstringMatch | FilterKind::ExactMatch
        )
    }

    pub fn needs_tags(self) -> bool {
        matches!(self, FilterKind::TagExactMatch | FilterKind::TagSubstringMatch)
    }
}

/// A malformed rule. Fatal to that rule only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("filter rule #{index}: unknown action {value:?}")]
    UnknownAction { index: usize, value: String },
    #[error("filter rule #{index}: unknown trigger {value:?}")]
    UnknownTrigger { index: usize, value: String },
    #[error("filter rule #{index}: unknown kind {value:?}")]
    UnknownKind { index: usize, value: String },
    #[error("filter rule #{index}: invalid regex {pattern:?}: {message}")]
    InvalidRegex {
        index: usize,
        pattern: String,
        message: String,
    },
}

/// A rule as stored in the feed configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFilterRule {
    pub action: String,
    #[serde(rename = "action on", alias = "trigger")]
    pub trigger: String,
    #[serde(rename = "type", alias = "kind")]
    pub kind: String,
    #[serde(default)]
    pub pattern: String,
}

impl RawFilterRule {
    pub fn new(action: FilterAction, trigger: FilterTrigger, kind: FilterKind, pattern: &str) -> Self {
        let kind = match kind {
            FilterKind::Regex => "regex",
            FilterKind::SubstringMatch => "substring-match",
            FilterKind::ExactMatch => "exact-match",
            FilterKind::TagExactMatch => "tag-exact-match",
            FilterKind::TagSubstringMatch => "tag-substring-match",
        };
        RawFilterRule {
            action: action.to_string(),
            trigger: trigger.to_string(),
            kind: kind.to_string(),
            pattern: pattern.to_string(),
        }
    }
}

/// The compiled comparison of a rule, one variant per kind.
#[derive(Debug, Clone)]
pub enum FilterMatcher {
    /// Anchored at the start, case-sensitive, against the lower-cased title.
    Regex(Regex),
    Substring(String),
    Exact(String),
    TagExact(String),
    TagSubstring(String),
}

impl FilterMatcher {
    pub fn kind(&self) -> FilterKind {
        match self {
            FilterMatcher::Regex(_) => FilterKind::Regex,
            FilterMatcher::Substring(_) => FilterKind::SubstringMatch,
            FilterMatcher::Exact(_) => FilterKind::ExactMatch,
            FilterMatcher::TagExact(_) => FilterKind::TagExactMatch,
            FilterMatcher::TagSubstring(_) => FilterKind::TagSubstringMatch,
        }
    }
}

/// A validated rule.
#[derive(Debug, Clone)]
pub struct FilterRule {
    pub action: FilterAction,
    pub trigger: FilterTrigger,
    pub matcher: FilterMatcher,
}

impl FilterRule {
    /// Validates a stored rule; `index` is its position in the feed's list.
    pub fn parse(raw: &RawFilterRule, index: usize) -> Result<Self, FilterError> {
        let action = FilterAction::from_name(&raw.action).ok_or_else(|| FilterError::UnknownAction {
            index,
            value: raw.action.clone(),
        })?;
        let trigger =
            FilterTrigger::from_name(&raw.trigger).ok_or_else(|| FilterError::UnknownTrigger {
                index,
                value: raw.trigger.clone(),
            })?;
        let kind = FilterKind::from_name(&raw.kind).ok_or_else(|| FilterError::UnknownKind {
            index,
            value: raw.kind.clone(),
        })?;

        let pattern = raw.pattern.to_lowercase();
        let matcher = match kind {
            FilterKind::Regex => {
                let anchored = format!("^(?:{})", raw.pattern);
                let regex = Regex::new(&anchored).map_err(|err| FilterError::InvalidRegex {
                    index,
                    pattern: raw.pattern.clone(),
                    message: err.to_string(),
                })?;
                FilterMatcher::Regex(regex)
            }
            FilterKind::SubstringMatch => FilterMatcher::Substring(pattern),
            FilterKind::ExactMatch => FilterMatcher::Exact(pattern),
            FilterKind::TagExactMatch => FilterMatcher::TagExact(pattern),
            FilterKind::TagSubstringMatch => FilterMatcher::TagSubstring(pattern),
        };

        Ok(FilterRule {
            action,
            trigger,
            matcher,
        })
    }

    pub fn kind(&self) -> FilterKind {
        self.matcher.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_names_accepted() {
        assert_eq!(FilterAction::from_name("mark as favorite"), Some(FilterAction::MarkLiked));
        assert_eq!(FilterAction::from_name("skipped"), Some(FilterAction::Skip));
        assert_eq!(FilterTrigger::from_name("no match"), Some(FilterTrigger::OnNoMatch));
        assert_eq!(FilterKind::from_name("tag contains"), Some(FilterKind::TagSubstringMatch));
        assert_eq!(FilterKind::from_name("simple match"), Some(FilterKind::SubstringMatch));
    }

    #[test]
    fn test_raw_rule_deserializes_stored_shape() {
        let raw: RawFilterRule = serde_json::from_str(
            r#"{"action": "mark as read", "action on": "match", "type": "regex", "pattern": "^ad"}"#,
        )
        .unwrap();
        let rule = FilterRule::parse(&raw, 0).unwrap();
        assert_eq!(rule.action, FilterAction::MarkRead);
        assert_eq!(rule.trigger, FilterTrigger::OnMatch);
        assert_eq!(rule.kind(), FilterKind::Regex);
    }

    #[test]
    fn test_raw_rule_round_trips_canonical_names() {
        let raw = RawFilterRule::new(
            FilterAction::MarkLiked,
            FilterTrigger::OnNoMatch,
            FilterKind::TagExactMatch,
            "Rust",
        );
        let rule = FilterRule::parse(&raw, 3).unwrap();
        assert_eq!(rule.action, FilterAction::MarkLiked);
        assert_eq!(rule.trigger, FilterTrigger::OnNoMatch);
        match rule.matcher {
            FilterMatcher::TagExact(pattern) => assert_eq!(pattern, "rust"),
            other => panic!("unexpected matcher {:?}", other),
        }
    }

    #[test]
    fn test_unknown_values_are_configuration_errors() {
        let mut raw = RawFilterRule::new(
            FilterAction::Skip,
            FilterTrigger::OnMatch,
            FilterKind::ExactMatch,
            "foo",
        );
        raw.kind = "fuzzy".to_string();
        assert_eq!(
            FilterRule::parse(&raw, 2).unwrap_err(),
            FilterError::UnknownKind {
                index: 2,
                value: "fuzzy".to_string()
            }
        );

        raw.trigger = "sometimes".to_string();
        assert!(matches!(
            FilterRule::parse(&raw, 0),
            Err(FilterError::UnknownTrigger { .. })
        ));

        raw.action = "explode".to_string();
        assert!(matches!(
            FilterRule::parse(&raw, 0),
            Err(FilterError::UnknownAction { .. })
        ));
    }

    #[test]
    fn test_invalid_regex_is_configuration_error() {
        let raw = RawFilterRule::new(FilterAction::Skip, FilterTrigger::OnMatch, FilterKind::Regex, "(");
        assert!(matches!(
            FilterRule::parse(&raw, 1),
            Err(FilterError::InvalidRegex { index: 1, .. })
        ));
    }
}
