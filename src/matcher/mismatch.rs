//! Matcher Mismatch Reasons
//!
//! Why an object failed a matcher set, rendered as English text for
//! diagnostics.

use std::fmt;

use crate::model::Values;
use crate::rules::{CollectionOp, ContainsMatcher, MatcherSet, Quantifier, StringCheck};

#[derive(Debug, Clone)]
pub enum Mismatch {
    /// A contains check failed against the key's actual values.
    Contains { matcher: ContainsMatcher, actual: Values },
    /// No alternative of an OR matched.
    AnyOf(Vec<Mismatch>),
    /// The negated set matched.
    Not(MatcherSet),
}

/// Result of a diagnostic evaluation.
#[derive(Debug, Clone, Default)]
pub struct MatchOutcome {
    pub matched: bool,
    pub mismatches: Vec<Mismatch>,
}

impl MatchOutcome {
    pub fn matched() -> Self {
        Self {
            matched: true,
            mismatches: Vec::new(),
        }
    }

    pub fn failed(mismatches: Vec<Mismatch>) -> Self {
        Self {
            matched: false,
            mismatches,
        }
    }

    /// All mismatch reasons joined into one line.
    pub fn describe(&self) -> String {
        self.mismatches
            .iter()
            .map(|m| m.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

fn quantifier_text(q: Quantifier) -> &'static str {
    match q {
        Quantifier::All => "contains all",
        Quantifier::Some => "contains some",
        Quantifier::Only => "contains only",
        Quantifier::Exactly => "contains exactly",
    }
}

pub(crate) fn describe_contains(c: &ContainsMatcher) -> String {
    let mut ret = c.key.clone();
    if c.distinct {
        ret = format!("distinct {}", ret);
    }
    if c.count {
        ret = format!("count of {}", ret);
    }
    let mut checks: Vec<String> = c
        .checks
        .numeric
        .iter()
        .map(|b| format!("range [{}, {}]", b.min, b.max))
        .collect();
    for t in &c.checks.text {
        checks.push(match t {
            StringCheck::Equals(v) => format!("'{}'", v),
            StringCheck::Pattern(r) => format!("/{}/", r.as_str()),
        });
    }
    format!("{} {} {}", ret, quantifier_text(c.quantifier), checks.join(", "))
}

pub(crate) fn describe_set(set: &MatcherSet, op: CollectionOp) -> String {
    if op == CollectionOp::Not {
        return format!("NOT {}", describe_set(set, CollectionOp::And));
    }
    let join = if op == CollectionOp::Or { " OR " } else { " AND " };
    let mut parts: Vec<String> = set
        .collections
        .iter()
        .map(|c| describe_set(&c.matchers, c.op))
        .collect();
    parts.extend(set.contains.iter().map(describe_contains));
    format!("({})", parts.join(join))
}

fn describe_values(values: &Values) -> String {
    let mut parts: Vec<String> = values.numbers.iter().map(|n| format!("{:.4}", n)).collect();
    parts.extend(values.text.iter().map(|t| format!("'{}'", t)));
    parts.join(", ")
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mismatch::Contains { matcher, actual } => {
                write!(f, "{} but has ({})", describe_contains(matcher), describe_values(actual))
            }
            Mismatch::AnyOf(children) => {
                let parts: Vec<String> = children.iter().map(|c| c.to_string()).collect();
                write!(f, "none of ({})", parts.join(" OR "))
            }
            Mismatch::Not(set) => write!(f, "{} matched", describe_set(set, CollectionOp::Not)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_display() {
        let m = Mismatch::Contains {
            matcher: ContainsMatcher::new(Quantifier::All, "size").with_range(1.0, 2.0).counted(),
            actual: Values::numbers([2.5]),
        };
        assert_eq!(m.to_string(), "count of size contains all range [1, 2] but has (2.5000)");
    }

    #[test]
    fn test_not_display() {
        let set = MatcherSet::new().with_contains(ContainsMatcher::new(Quantifier::Some, "kind").with_equals("tmp"));
        let m = Mismatch::Not(set);
        assert_eq!(m.to_string(), "NOT (kind contains some 'tmp') matched");
    }
}
