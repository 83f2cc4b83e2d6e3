//! Per-feed filter rules.
//!
//! A feed carries an ordered list of rules that can skip an incoming entry
//! or pre-mark it as read or liked before it is ever clustered.

mod engine;
mod types;

pub use self::engine::{evaluate, FilterCandidate, FilterOutcome, FilterSet};
pub use self::types::{
    FilterAction, FilterError, FilterKind, FilterMatcher, FilterRule, FilterTrigger, RawFilterRule,
};
