//! Quantified List Matching
//!
//! Decides whether a list of values satisfies a list of comparisons under a
//! quantifier. Claiming is greedy in comparison order and is not a maximum
//! bipartite matching, so some satisfiable ALL/EXACTLY assignments are
//! rejected depending on order.

use crate::rules::Quantifier;

pub fn quantify<V, C>(
    quantifier: Quantifier,
    values: &[V],
    checks: &[C],
    matches: impl Fn(&V, &C) -> bool,
) -> bool {
    if checks.is_empty() || values.is_empty() {
        return false;
    }
    if quantifier == Quantifier::Exactly && values.len() != checks.len() {
        return false;
    }
    if quantifier == Quantifier::Some || (quantifier == Quantifier::All && checks.len() == 1) {
        return checks.iter().any(|c| values.iter().any(|v| matches(v, c)));
    }

    let mut claimed = vec![false; values.len()];
    let mut claims = 0;
    let mut satisfied = 0;
    for c in checks {
        let mut hit = false;
        for (i, v) in values.iter().enumerate() {
            if claimed[i] || !matches(v, c) {
                continue;
            }
            claimed[i] = true;
            claims += 1;
            hit = true;
            // ONLY lets one comparison cover every value it matches.
            if quantifier != Quantifier::Only {
                break;
            }
        }
        if hit {
            satisfied += 1;
        }
    }

    match quantifier {
        Quantifier::All => satisfied == checks.len(),
        Quantifier::Exactly => claims == checks.len(),
        Quantifier::Only => claimed.iter().all(|c| *c),
        Quantifier::Some => claims > 0,
    }
}
