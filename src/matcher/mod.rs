//! Matcher Engine
//!
//! Evaluates a matcher tree against one object. `is_match` is the fast
//! boolean path used for grouping; `evaluate` visits every branch of an AND
//! and collects the reasons for failure.

pub mod mismatch;
pub mod quantifier;

use std::collections::HashSet;

use crate::model::EngineObject;
use crate::rules::{CollectionMatcher, CollectionOp, ContainsMatcher, MatcherSet, StringCheck};

pub use mismatch::{MatchOutcome, Mismatch};
pub use quantifier::quantify;

/// True when the object satisfies every matcher in the set.
pub fn is_match(object: &EngineObject, set: &MatcherSet) -> bool {
    set.collections.iter().all(|c| collection_matches(object, c))
        && set.contains.iter().all(|c| contains_matches(object, c))
}

fn collection_matches(object: &EngineObject, c: &CollectionMatcher) -> bool {
    match c.op {
        CollectionOp::And => is_match(object, &c.matchers),
        CollectionOp::Or => {
            c.matchers.collections.iter().any(|m| collection_matches(object, m))
                || c.matchers.contains.iter().any(|m| contains_matches(object, m))
        }
        CollectionOp::Not => !is_match(object, &c.matchers),
    }
}

/// Diagnostic evaluation of the set as an AND.
pub fn evaluate(object: &EngineObject, set: &MatcherSet) -> MatchOutcome {
    let mismatches = and_mismatches(object, set);
    if mismatches.is_empty() {
        MatchOutcome::matched()
    } else {
        MatchOutcome::failed(mismatches)
    }
}

fn and_mismatches(object: &EngineObject, set: &MatcherSet) -> Vec<Mismatch> {
    let mut ret = Vec::new();
    for c in &set.collections {
        ret.extend(collection_mismatches(object, c));
    }
    for c in &set.contains {
        ret.extend(contains_mismatch(object, c));
    }
    ret
}

fn collection_mismatches(object: &EngineObject, c: &CollectionMatcher) -> Vec<Mismatch> {
    match c.op {
        CollectionOp::And => and_mismatches(object, &c.matchers),
        CollectionOp::Or => {
            let mut reasons = Vec::new();
            for m in &c.matchers.collections {
                let r = collection_mismatches(object, m);
                if r.is_empty() {
                    return Vec::new();
                }
                reasons.extend(r);
            }
            for m in &c.matchers.contains {
                match contains_mismatch(object, m) {
                    None => return Vec::new(),
                    Some(r) => reasons.push(r),
                }
            }
            vec![Mismatch::AnyOf(reasons)]
        }
        CollectionOp::Not => {
            if is_match(object, &c.matchers) {
                vec![Mismatch::Not(c.matchers.clone())]
            } else {
                Vec::new()
            }
        }
    }
}

fn contains_mismatch(object: &EngineObject, c: &ContainsMatcher) -> Option<Mismatch> {
    if contains_matches(object, c) {
        return None;
    }
    Some(Mismatch::Contains {
        matcher: c.clone(),
        actual: object.values(&c.key),
    })
}

/// Evaluates one contains matcher.
pub fn contains_matches(object: &EngineObject, c: &ContainsMatcher) -> bool {
    let stored = object.get(&c.key);
    let folded = stored.map(|s| s.is_folded()).unwrap_or(false);
    let already_distinct = stored.map(|s| s.is_distinct()).unwrap_or(false);

    let mut values = object.values(&c.key);
    if c.distinct && !already_distinct {
        // Folded stores are already lower-cased, so exact dedupe is enough.
        let mut seen_text = HashSet::new();
        values.text.retain(|t| seen_text.insert(t.clone()));
        let mut seen_numbers: Vec<f64> = Vec::new();
        values.numbers.retain(|n| {
            if seen_numbers.contains(n) {
                false
            } else {
                seen_numbers.push(*n);
                true
            }
        });
    }
    if c.count {
        let count = values.len() as f64;
        values.text.clear();
        values.numbers = vec![count];
    }

    quantify(c.quantifier, &values.numbers, &c.checks.numeric, |v, b| b.contains(*v))
        || quantify(c.quantifier, &values.text, &c.checks.text, |v, check| {
            string_matches(check, v, folded)
        })
}

fn string_matches(check: &StringCheck, value: &str, folded: bool) -> bool {
    match check {
        StringCheck::Equals(expected) if folded => value == expected.to_lowercase(),
        StringCheck::Equals(expected) => value == expected,
        StringCheck::Pattern(re) => re.is_match(value),
    }
}
