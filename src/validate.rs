//! Structural Validation
//!
//! Checks documents, rule sets and the ontology itself against the ontology
//! definitions before the engine runs. Every finding is a problem; nothing
//! here stops processing.

use regex::Regex;
use std::collections::HashMap;
use tracing::debug;

use crate::document::DocumentObject;
use crate::model::Values;
use crate::ontology::{Descriptor, DescriptorKind, Ontology, TextConstraint};
use crate::problem::ProblemReporter;
use crate::rules::{ContainsMatcher, MatcherSet, RuleSet};
use crate::source::{join_sources, SourceRef};

/// Validates the values given for `key`. `context` names the owner in the
/// messages ("descriptor", "alteration").
pub fn validate_values(
    context: &str,
    key: &str,
    values: &Values,
    ontology: &Ontology,
    sources: &[SourceRef],
    problems: &mut impl ProblemReporter,
) {
    let Some(descriptor) = check_key(context, key, ontology, sources, problems) else {
        return;
    };
    let src = join_sources(sources, &descriptor.sources);
    let max_count = descriptor.max_count;

    match &descriptor.kind {
        DescriptorKind::Enum { allowed } => {
            if !values.numbers.is_empty() {
                problems.add_error(src.clone(), format!("{}: enum {} cannot have numeric values", key, context));
            }
            check_count(context, key, values.text.len(), max_count, &src, problems);
            for t in &values.text {
                if !allowed.contains(t) {
                    problems.add_error(src.clone(), format!("{}: enum {} invalid value ({})", key, context, t));
                }
            }
        }
        DescriptorKind::Free {
            max_length,
            constraints,
            ..
        } => {
            if !values.numbers.is_empty() {
                problems.add_error(src.clone(), format!("{}: free {} cannot have numeric values", key, context));
            }
            check_count(context, key, values.text.len(), max_count, &src, problems);
            let patterns = compile_constraints(key, constraints, &src, problems);
            for t in &values.text {
                if let Some(max) = max_length {
                    let len = t.chars().count();
                    if len > *max {
                        problems.add_error(
                            src.clone(),
                            format!(
                                "{}: free {} value length ({}) exceeds maximum ({}) ({})",
                                key, context, len, max, t
                            ),
                        );
                    }
                }
                for (pattern, re) in &patterns {
                    if !re.is_match(t) {
                        problems.add_error(
                            src.clone(),
                            format!("{}: value ({}) does not match constraint pattern ({})", key, t, pattern),
                        );
                    }
                }
            }
        }
        DescriptorKind::Numeric { minimum, maximum } => {
            if !values.text.is_empty() {
                problems.add_error(src.clone(), format!("{}: numeric {} cannot have text values", key, context));
            }
            check_count(context, key, values.numbers.len(), max_count, &src, problems);
            for n in &values.numbers {
                if n < minimum || n > maximum {
                    problems.add_error(
                        src.clone(),
                        format!(
                            "{}: numeric {} value ({}) outside bounds [{}, {}]",
                            key, context, n, minimum, maximum
                        ),
                    );
                }
            }
        }
    }

    if descriptor.distinct && descriptor.is_text() {
        find_duplicates(context, descriptor, &values.text, &src, problems);
    }
}

pub fn validate_documents(
    documents: &[DocumentObject],
    ontology: &Ontology,
    problems: &mut impl ProblemReporter,
) {
    for doc in documents {
        for d in &doc.descriptors {
            validate_values("descriptor", &d.key, &d.split(), ontology, &doc.sources, problems);
        }
    }
    debug!(documents = documents.len(), "validated documents");
}

pub fn validate_rule_set(rules: &RuleSet, ontology: &Ontology, problems: &mut impl ProblemReporter) {
    for rule in &rules.rules {
        validate_matchers(&rule.matchers, ontology, &rule.sources, problems);
        for conformity in &rule.conformities {
            validate_matchers(&conformity.matchers, ontology, &conformity.sources, problems);
        }
    }
    for group in &rules.groups {
        validate_matchers(&group.matchers, ontology, &group.sources, problems);
        for key in &group.shared_keys {
            check_key("shared", key, ontology, &group.sources, problems);
        }
        for alteration in &group.alterations {
            validate_values(
                "alteration",
                &alteration.key,
                &alteration.values,
                ontology,
                &alteration.sources,
                problems,
            );
        }
        for convergence in &group.convergences {
            check_key("convergence", &convergence.key, ontology, &convergence.sources, problems);
        }
    }
}

/// Checks the descriptors for internal contradictions.
pub fn validate_ontology(ontology: &Ontology, problems: &mut impl ProblemReporter) {
    let mut descriptors: Vec<&Descriptor> = ontology.iter().collect();
    descriptors.sort_by(|a, b| a.key.cmp(&b.key));
    for d in descriptors {
        match &d.kind {
            DescriptorKind::Enum { allowed } if allowed.is_empty() => {
                problems.add_error(d.sources.clone(), format!("{}: enum has no allowed values", d.key));
            }
            DescriptorKind::Numeric { minimum, maximum } if minimum > maximum => {
                problems.add_error(
                    d.sources.clone(),
                    format!("{}: numeric minimum ({}) > maximum ({})", d.key, minimum, maximum),
                );
            }
            DescriptorKind::Free { constraints, .. } => {
                for c in constraints {
                    if let TextConstraint::Pattern { pattern, sources } = c {
                        if let Err(e) = Regex::new(pattern) {
                            problems.add_error(
                                join_sources(&d.sources, sources),
                                format!("{}: invalid value constraint pattern '{}' ({})", d.key, pattern, e),
                            );
                        }
                    }
                }
            }
            _ => {}
        }
    }
}

fn validate_matchers(
    set: &MatcherSet,
    ontology: &Ontology,
    sources: &[SourceRef],
    problems: &mut impl ProblemReporter,
) {
    for c in &set.collections {
        validate_matchers(&c.matchers, ontology, sources, problems);
    }
    for c in &set.contains {
        validate_contains(c, ontology, sources, problems);
    }
}

fn validate_contains(
    c: &ContainsMatcher,
    ontology: &Ontology,
    sources: &[SourceRef],
    problems: &mut impl ProblemReporter,
) {
    let Some(descriptor) = check_key("contains", &c.key, ontology, sources, problems) else {
        return;
    };
    let kind = descriptor.kind.name();
    let src = sources.to_vec();

    if descriptor.is_text() {
        // Counts compare numerically.
        if !c.checks.numeric.is_empty() && !c.count {
            problems.add_error(
                src.clone(),
                format!("{}: {}-based contains matcher cannot have numeric values", c.key, kind),
            );
        }
        if !c.checks.text.is_empty() && c.count {
            problems.add_error(
                src.clone(),
                format!("{}: {}-based contains matcher on 'count' cannot have text values", c.key, kind),
            );
        }
    } else if !c.checks.text.is_empty() {
        problems.add_error(
            src.clone(),
            format!("{}: numeric-based contains matcher cannot have text values", c.key),
        );
    }

    for b in &c.checks.numeric {
        if b.min > b.max {
            problems.add_error(
                src.clone(),
                format!("{}: contains matcher has minimum ({}) > maximum ({})", c.key, b.min, b.max),
            );
        }
    }
}

fn check_key<'a>(
    context: &str,
    key: &str,
    ontology: &'a Ontology,
    sources: &[SourceRef],
    problems: &mut impl ProblemReporter,
) -> Option<&'a Descriptor> {
    let found = ontology.get(key);
    if found.is_none() {
        problems.add_error(sources.to_vec(), format!("undefined {} key ({})", context, key));
    }
    found
}

fn check_count(
    context: &str,
    key: &str,
    count: usize,
    max: Option<usize>,
    sources: &[SourceRef],
    problems: &mut impl ProblemReporter,
) {
    if let Some(max) = max {
        if count > max {
            problems.add_error(
                sources.to_vec(),
                format!("{}: {} can have a maximum of {} values (found {})", key, context, max, count),
            );
        }
    }
}

/// Reports each duplicated value once.
fn find_duplicates(
    context: &str,
    descriptor: &Descriptor,
    values: &[String],
    sources: &[SourceRef],
    problems: &mut impl ProblemReporter,
) {
    let mut seen: HashMap<String, bool> = HashMap::new();
    for v in values {
        match seen.get_mut(&descriptor.fold(v)) {
            Some(reported) if !*reported => {
                problems.add_error(
                    sources.to_vec(),
                    format!("{}: {} does not allow duplicate values ({})", descriptor.key, context, v),
                );
                *reported = true;
            }
            Some(_) => {}
            None => {
                seen.insert(descriptor.fold(v), false);
            }
        }
    }
}

fn compile_constraints(
    key: &str,
    constraints: &[TextConstraint],
    sources: &[SourceRef],
    problems: &mut impl ProblemReporter,
) -> Vec<(String, Regex)> {
    let mut ret = Vec::new();
    for c in constraints {
        match c {
            TextConstraint::Format { .. } => {
                problems.add_warning(
                    sources.to_vec(),
                    format!("{}: value constraint type 'format' not supported.", key),
                );
            }
            TextConstraint::Pattern { pattern, .. } => {
                // Bad patterns are reported once by validate_ontology.
                if let Ok(re) = Regex::new(pattern) {
                    ret.push((pattern.clone(), re));
                }
            }
        }
    }
    ret
}
