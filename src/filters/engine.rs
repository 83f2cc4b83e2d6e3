use tracing::{debug, info, warn};

use super::types::{FilterAction, FilterError, FilterMatcher, FilterRule, RawFilterRule};
use crate::TARGET_FILTER;

/// The fields of an incoming entry that rules can look at.
///
/// `None` means the field is absent, which makes the rules needing it
/// inapplicable rather than non-matching.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterCandidate<'a> {
    pub title: Option<&'a str>,
    pub tags: Option<&'a [String]>,
    /// Only used to label log lines.
    pub link: Option<&'a str>,
}

/// Accumulated effect of a rule list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterOutcome {
    pub skipped: bool,
    pub read: Option<bool>,
    pub liked: bool,
    pub errors: Vec<FilterError>,
}

impl FilterOutcome {
    fn apply(&mut self, action: FilterAction) {
        match action {
            FilterAction::Skip => self.skipped = true,
            FilterAction::MarkRead => self.read = Some(true),
            FilterAction::MarkLiked => self.liked = true,
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

impl FilterMatcher {
    /// Lower-casing of the pattern happened at parse time, except for regexes.
    pub fn is_match(&self, candidate: &FilterCandidate<'_>) -> bool {
        let title = candidate.title.unwrap_or_default().to_lowercase();
        let tags = candidate.tags.unwrap_or_default();
        match self {
            FilterMatcher::Regex(regex) => regex.is_match(&title),
            FilterMatcher::Substring(pattern) => title.contains(pattern.as_str()),
            FilterMatcher::Exact(pattern) => title == *pattern,
            FilterMatcher::TagExact(pattern) => tags.iter().any(|tag| tag.to_lowercase() == *pattern),
            FilterMatcher::TagSubstring(pattern) => tags
                .iter()
                .any(|tag| tag.to_lowercase().contains(pattern.as_str())),
        }
    }
}

impl FilterRule {
    /// Structural skip: the candidate lacks the field this rule inspects.
    pub fn is_applicable(&self, candidate: &FilterCandidate<'_>) -> bool {
        let kind = self.kind();
        let missing_title = kind.needs_title() && candidate.title.is_none();
        let missing_tags = kind.needs_tags() && candidate.tags.is_none();
        !(missing_title || missing_tags)
    }

    pub fn fires(&self, candidate: &FilterCandidate<'_>) -> bool {
        self.trigger.fires(self.matcher.is_match(candidate))
    }
}

/// A feed's rule list, parsed once and reusable across entries.
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    rules: Vec<FilterRule>,
    errors: Vec<FilterError>,
}

impl FilterSet {
    /// Malformed rules are kept aside as errors; the others stay in order.
    pub fn parse(raws: &[RawFilterRule]) -> Self {
        let mut set = FilterSet::default();
        for (index, raw) in raws.iter().enumerate() {
            match FilterRule::parse(raw, index) {
                Ok(rule) => set.rules.push(rule),
                Err(err) => {
                    warn!(target: TARGET_FILTER, "Rejecting malformed filter: {}", err);
                    set.errors.push(err);
                }
            }
        }
        set
    }

    pub fn errors(&self) -> &[FilterError] {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Runs the valid rules, in order, against one candidate. Rules whose
    /// action is not in `allowed` are ignored. Flags only ever accumulate.
    pub fn evaluate(&self, candidate: &FilterCandidate<'_>, allowed: &[FilterAction]) -> FilterOutcome {
        let mut outcome = FilterOutcome {
            errors: self.errors.clone(),
            ..Default::default()
        };

        for rule in &self.rules {
            if !allowed.contains(&rule.action) || !rule.is_applicable(candidate) {
                debug!(target: TARGET_FILTER, "Ignoring filter {:?}", rule);
                continue;
            }

            if rule.fires(candidate) {
                info!(
                    target: TARGET_FILTER,
                    "{} applied on {}",
                    rule.action,
                    candidate.link.or(candidate.title).unwrap_or("<untitled entry>")
                );
                outcome.apply(rule.action);
            }
        }

        outcome
    }
}

/// Parses and runs a feed's rules against one candidate.
///
/// Malformed rules are reported in `errors` and do not stop the remaining
/// rules.
pub fn evaluate(
    rules: &[RawFilterRule],
    candidate: &FilterCandidate<'_>,
    allowed: &[FilterAction],
) -> FilterOutcome {
    FilterSet::parse(rules).evaluate(candidate, allowed)
}
