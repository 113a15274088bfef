//! Rule and convergence violations rendered as problems.

use crate::config::EngineConfig;
use crate::matcher::MatchOutcome;
use crate::model::{EngineObject, ProvenanceArena};
use crate::problem::Problem;
use crate::rules::{LeveledMatcher, Rule};
use crate::source::SourceRef;

use super::convergence::{ConvergenceViolation, MemberCluster};

/// An object matched a rule but failed one of its conformities.
pub struct RuleViolation<'a> {
    pub object: &'a EngineObject,
    pub rule: &'a Rule,
    pub conformity: &'a LeveledMatcher,
    pub outcome: MatchOutcome,
}

pub fn rule_problem(config: &EngineConfig, provenance: &ProvenanceArena, violation: &RuleViolation<'_>) -> Problem {
    let mut sources = provenance.primary_sources(violation.object.source());
    extend_unique(&mut sources, &violation.rule.sources);
    extend_unique(&mut sources, &violation.conformity.sources);

    let message = format!(
        "Rule {} violation ({}) for {}: {}",
        violation.rule.id,
        violation.conformity.level,
        provenance.describe(violation.object.source()),
        violation.outcome.describe(),
    );
    Problem::new(config.level(&violation.conformity.level), message, sources)
}

pub fn convergence_problem(
    config: &EngineConfig,
    provenance: &ProvenanceArena,
    violation: &ConvergenceViolation,
) -> Problem {
    let mut sources = Vec::new();
    for cluster in &violation.clusters {
        for member in &cluster.members {
            extend_unique(&mut sources, &provenance.primary_sources(member.source()));
        }
    }
    extend_unique(&mut sources, &violation.convergence.sources);

    let clusters: Vec<String> = violation
        .clusters
        .iter()
        .map(|c| describe_cluster(provenance, c))
        .collect();
    let message = format!(
        "Group {}: Convergence {} violation ({}); {}",
        violation.group_id,
        violation.convergence.key,
        violation.convergence.level,
        clusters.join(", "),
    );
    Problem::new(config.level(&violation.convergence.level), message, sources)
}

fn describe_cluster(provenance: &ProvenanceArena, cluster: &MemberCluster) -> String {
    let members: Vec<String> = cluster
        .members
        .iter()
        .map(|m| provenance.describe(m.source()))
        .collect();
    let mut values: Vec<String> = cluster.values.numbers.iter().map(|n| format!("{:.4}", n)).collect();
    values.extend(cluster.values.text.iter().cloned());
    format!("{} (contain {})", members.join(", "), values.join(", "))
}

fn extend_unique(into: &mut Vec<SourceRef>, from: &[SourceRef]) {
    for s in from {
        if !into.contains(s) {
            into.push(s.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ObjectFactory, ObjectSource, Values};
    use crate::ontology::{Descriptor, Ontology};
    use crate::problem::ProblemLevel;
    use crate::rules::{Convergence, ConvergenceRequirement};
    use std::sync::Arc;

    #[test]
    fn test_convergence_message_and_sources() {
        let f = ObjectFactory::new(Arc::new(Ontology::new().with_descriptor(Descriptor::numeric("size", 0.0, 9.0))));
        let src = SourceRef::new("a.json", "git");
        let mut b = f.empty(ObjectSource::Primary { refs: vec![src.clone()] });
        b.add("size", &Values::numbers([1.0]));
        let a = Arc::new(b.seal());

        let mut conv = Convergence::new("size", "should", ConvergenceRequirement::AllMatch);
        conv.sources = vec![SourceRef::new("rules.yaml", "git")];
        let violation = ConvergenceViolation {
            group_id: "g1".into(),
            convergence: conv,
            clusters: vec![MemberCluster {
                members: vec![a.clone(), a],
                values: Values::numbers([1.0]),
            }],
        };
        let config = EngineConfig::default().with_level("should", 25);
        let p = convergence_problem(&config, f.provenance(), &violation);

        assert_eq!(p.level, ProblemLevel::Warn);
        assert_eq!(
            p.message,
            "Group g1: Convergence size violation (should); object #0 [git:a.json], object #0 [git:a.json] (contain 1.0000)"
        );
        assert_eq!(p.sources.len(), 2);
        assert_eq!(p.sources[0], src);
    }
}
