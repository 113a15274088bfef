//! Conformity Checks
//!
//! Every object matching a rule must also satisfy each of the rule's
//! conformity matchers. Objects are checked concurrently, one task each.

use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, trace};

use super::problems::{rule_problem, RuleViolation};
use crate::concurrent::CancelToken;
use crate::config::EngineConfig;
use crate::matcher::{evaluate, is_match};
use crate::model::{EngineObject, Provenance};
use crate::problem::ProblemAdder;
use crate::rules::Rule;

const STAGE: &str = "conformity";

/// Checks one object against every rule, reporting each failed conformity.
pub fn check_object(
    object: &EngineObject,
    rules: &[Rule],
    config: &EngineConfig,
    provenance: &Provenance,
    problems: &ProblemAdder,
) -> usize {
    let mut found = 0;
    for rule in rules {
        if !is_match(object, &rule.matchers) {
            continue;
        }
        for conformity in &rule.conformities {
            let outcome = evaluate(object, &conformity.matchers);
            if outcome.matched {
                continue;
            }
            trace!(rule = %rule.id, object = %object.source(), "conformity failed");
            let violation = RuleViolation {
                object,
                rule,
                conformity,
                outcome,
            };
            problems.add(rule_problem(config, provenance, &violation));
            found += 1;
        }
    }
    found
}

/// Runs the checks for all `objects`. Panicking checks are reported under
/// the conformity stage; cancellation abandons the remaining checks.
pub async fn check_all(
    objects: &[Arc<EngineObject>],
    rules: Arc<Vec<Rule>>,
    config: Arc<EngineConfig>,
    provenance: Provenance,
    problems: &ProblemAdder,
    cancel: &CancelToken,
) -> usize {
    if rules.is_empty() {
        return 0;
    }

    let mut tasks = JoinSet::new();
    for object in objects {
        let object = object.clone();
        let rules = rules.clone();
        let config = config.clone();
        let provenance = provenance.clone();
        let problems = problems.clone();
        tasks.spawn(async move { check_object(&object, &rules, &config, &provenance, &problems) });
    }

    let mut total = 0;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(pending = tasks.len(), "conformity checks cancelled");
                tasks.abort_all();
                break;
            }
            joined = tasks.join_next() => match joined {
                Some(Ok(found)) => total += found,
                Some(Err(e)) if e.is_panic() => problems.recover(STAGE, e.into_panic()),
                Some(Err(_)) => {}
                None => break,
            },
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ObjectFactory, ObjectSource, Values};
    use crate::ontology::{Descriptor, Ontology};
    use crate::problem::{async_sink, ProblemLevel};
    use crate::rules::{ContainsMatcher, MatcherSet, Quantifier};

    fn factory() -> ObjectFactory {
        ObjectFactory::new(Arc::new(
            Ontology::new()
                .with_descriptor(Descriptor::enumeration("kind", ["item", "group"]))
                .with_descriptor(Descriptor::numeric("size", 0.0, 100.0)),
        ))
    }

    fn item(f: &ObjectFactory, size: f64) -> Arc<EngineObject> {
        let mut b = f.empty(ObjectSource::Primary { refs: vec![] });
        b.add("kind", &Values::text(["item"]));
        b.add("size", &Values::numbers([size]));
        Arc::new(b.seal())
    }

    fn small_items() -> Rule {
        Rule::new(
            "small-items",
            MatcherSet::new().with_contains(ContainsMatcher::new(Quantifier::Some, "kind").with_equals("item")),
        )
        .with_conformity(
            "should",
            MatcherSet::new().with_contains(ContainsMatcher::new(Quantifier::All, "size").with_range(0.0, 10.0)),
        )
    }

    #[tokio::test]
    async fn test_reports_only_failed_conformities() {
        let f = factory();
        let objects = vec![item(&f, 5.0), item(&f, 50.0), item(&f, 7.0)];
        let config = Arc::new(EngineConfig::default().with_level("should", 20));
        let cancel = CancelToken::new();
        let (adder, mut consumer) = async_sink(&cancel);

        let found = check_all(
            &objects,
            Arc::new(vec![small_items()]),
            config,
            f.provenance().clone(),
            &adder,
            &cancel,
        )
        .await;
        adder.complete();

        assert_eq!(found, 1);
        let set = consumer.read().await;
        assert_eq!(set.len(), 1);
        let p = &set.problems()[0];
        assert_eq!(p.level, ProblemLevel::Warn);
        assert!(p.message.starts_with("Rule small-items violation (should) for object #1"));
        assert!(p.message.contains("but has (50.0000)"));
    }

    #[tokio::test]
    async fn test_unmatched_objects_skip_conformity() {
        let f = factory();
        let mut b = f.empty(ObjectSource::Primary { refs: vec![] });
        b.add("kind", &Values::text(["group"]));
        b.add("size", &Values::numbers([99.0]));
        let group = b.seal();

        let cancel = CancelToken::new();
        let (adder, _consumer) = async_sink(&cancel);
        let found = check_object(&group, &[small_items()], &EngineConfig::default(), f.provenance(), &adder);
        assert_eq!(found, 0);
    }
}
