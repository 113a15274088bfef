//! Rule File Definitions
//!
//! Serde form of rule files and its conversion into the engine's rule model.
//! Conversion never fails: unsupported values become configuration problems
//! and fall back to a safe default, or drop the offending check.

use serde::{Deserialize, Serialize};

use super::{
    Alteration, AlterationAction, CollectionOp, ContainsMatcher, Convergence,
    ConvergenceRequirement, Group, LeveledMatcher, MatcherSet, NumericBounds, Quantifier, Rule,
    RuleSet, StringCheck, ValueChecks,
};
use crate::document::DescriptorValue;
use crate::model::Values;
use crate::problem::ProblemReporter;
use crate::source::SourceRef;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CheckDefinition {
    Equal { value: String },
    Pattern { pattern: String },
    Range {
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainsDefinition {
    pub key: String,
    #[serde(default)]
    pub count: bool,
    #[serde(default)]
    pub distinct: bool,
    #[serde(default)]
    pub checks: Vec<CheckDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatcherDefinition {
    And { collection: Vec<MatcherDefinition> },
    Or { collection: Vec<MatcherDefinition> },
    Not { matcher: Box<MatcherDefinition> },
    ContainsAll(ContainsDefinition),
    ContainsSome(ContainsDefinition),
    ContainsOnly(ContainsDefinition),
    ContainsExactly(ContainsDefinition),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConformityDefinition {
    pub level: String,
    pub matcher: MatcherDefinition,
    #[serde(default)]
    pub sources: Vec<SourceRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlterationDefinition {
    pub key: String,
    pub action: String,
    #[serde(default)]
    pub values: Vec<DescriptorValue>,
    #[serde(default)]
    pub sources: Vec<SourceRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceDefinition {
    pub key: String,
    pub level: String,
    #[serde(default)]
    pub distinct: bool,
    pub requires: String,
    #[serde(default)]
    pub sources: Vec<SourceRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDefinition {
    pub id: String,
    #[serde(default)]
    pub matchers: Vec<MatcherDefinition>,
    #[serde(default)]
    pub conformities: Vec<ConformityDefinition>,
    #[serde(default)]
    pub sources: Vec<SourceRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupDefinition {
    pub id: String,
    #[serde(default)]
    pub matchers: Vec<MatcherDefinition>,
    #[serde(default)]
    pub shared_values: Vec<String>,
    #[serde(default)]
    pub alterations: Vec<AlterationDefinition>,
    #[serde(default)]
    pub convergences: Vec<ConvergenceDefinition>,
    #[serde(default)]
    pub sources: Vec<SourceRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleSetDefinition {
    #[serde(default)]
    pub rules: Vec<RuleDefinition>,
    #[serde(default)]
    pub groups: Vec<GroupDefinition>,
}

impl RuleSetDefinition {
    /// Converts into the engine model, reporting configuration problems.
    pub fn convert(self, problems: &mut impl ProblemReporter) -> RuleSet {
        let mut ret = RuleSet::new();
        for rule in self.rules {
            ret.rules.push(convert_rule(rule, problems));
        }
        for group in self.groups {
            ret.groups.push(convert_group(group, problems));
        }
        ret
    }
}

fn convert_rule(def: RuleDefinition, problems: &mut impl ProblemReporter) -> Rule {
    let matchers = convert_matchers(&def.matchers, &def.sources, problems);

    // One matcher set per level, in first-seen order.
    let mut conformities: Vec<LeveledMatcher> = Vec::new();
    for c in def.conformities {
        let idx = match conformities.iter().position(|m| m.level == c.level) {
            Some(idx) => idx,
            None => {
                conformities.push(LeveledMatcher {
                    level: c.level.clone(),
                    matchers: MatcherSet::new(),
                    sources: Vec::new(),
                });
                conformities.len() - 1
            }
        };
        let entry = &mut conformities[idx];
        add_matcher(&mut entry.matchers, &c.matcher, &c.sources, problems);
        entry.sources.extend(c.sources);
    }

    Rule {
        id: def.id,
        matchers,
        conformities,
        sources: def.sources,
    }
}

fn convert_group(def: GroupDefinition, problems: &mut impl ProblemReporter) -> Group {
    let matchers = convert_matchers(&def.matchers, &def.sources, problems);
    let alterations = def
        .alterations
        .into_iter()
        .map(|a| {
            let action = alteration_action(&a.action, &a.sources, problems);
            Alteration {
                key: a.key,
                action,
                values: split_values(&a.values),
                sources: a.sources,
            }
        })
        .collect();
    let convergences = def
        .convergences
        .into_iter()
        .map(|c| {
            let requires = convergence_requirement(&c.requires, &c.sources, problems);
            Convergence {
                key: c.key,
                level: c.level,
                distinct: c.distinct,
                requires,
                sources: c.sources,
            }
        })
        .collect();

    Group {
        id: def.id,
        matchers,
        shared_keys: def.shared_values,
        alterations,
        convergences,
        sources: def.sources,
    }
}

fn split_values(values: &[DescriptorValue]) -> Values {
    let mut ret = Values::new();
    for v in values {
        match v {
            DescriptorValue::Number(n) => ret.numbers.push(*n),
            DescriptorValue::Text(t) => ret.text.push(t.clone()),
        }
    }
    ret
}

pub fn alteration_action(
    action: &str,
    sources: &[SourceRef],
    problems: &mut impl ProblemReporter,
) -> AlterationAction {
    match action {
        "add" => AlterationAction::Add,
        "add-distinct" | "add_distinct" => AlterationAction::AddDistinct,
        "remove" => AlterationAction::Remove,
        "remove-distinct" | "remove_distinct" => AlterationAction::RemoveDistinct,
        "set" => AlterationAction::Set,
        other => {
            problems.add_error(
                sources.to_vec(),
                format!("unsupported alteration action ({})", other),
            );
            AlterationAction::Set
        }
    }
}

pub fn convergence_requirement(
    requires: &str,
    sources: &[SourceRef],
    problems: &mut impl ProblemReporter,
) -> ConvergenceRequirement {
    match requires {
        "all-match" | "all_match" => ConvergenceRequirement::AllMatch,
        "disjoint" => ConvergenceRequirement::Disjoint,
        other => {
            problems.add_error(
                sources.to_vec(),
                format!("unsupported convergence type ({})", other),
            );
            ConvergenceRequirement::AllMatch
        }
    }
}

fn convert_matchers(
    defs: &[MatcherDefinition],
    sources: &[SourceRef],
    problems: &mut impl ProblemReporter,
) -> MatcherSet {
    let mut ret = MatcherSet::new();
    for d in defs {
        add_matcher(&mut ret, d, sources, problems);
    }
    ret
}

fn add_matcher(
    set: &mut MatcherSet,
    def: &MatcherDefinition,
    sources: &[SourceRef],
    problems: &mut impl ProblemReporter,
) {
    match def {
        MatcherDefinition::And { collection } => {
            let matchers = convert_matchers(collection, sources, problems);
            set.collections.push(super::CollectionMatcher { op: CollectionOp::And, matchers });
        }
        MatcherDefinition::Or { collection } => {
            let matchers = convert_matchers(collection, sources, problems);
            set.collections.push(super::CollectionMatcher { op: CollectionOp::Or, matchers });
        }
        MatcherDefinition::Not { matcher } => {
            let matchers = convert_matchers(std::slice::from_ref(matcher.as_ref()), sources, problems);
            set.collections.push(super::CollectionMatcher { op: CollectionOp::Not, matchers });
        }
        MatcherDefinition::ContainsAll(c) => set.contains.push(convert_contains(Quantifier::All, c, sources, problems)),
        MatcherDefinition::ContainsSome(c) => set.contains.push(convert_contains(Quantifier::Some, c, sources, problems)),
        MatcherDefinition::ContainsOnly(c) => set.contains.push(convert_contains(Quantifier::Only, c, sources, problems)),
        MatcherDefinition::ContainsExactly(c) => {
            set.contains.push(convert_contains(Quantifier::Exactly, c, sources, problems))
        }
    }
}

fn convert_contains(
    quantifier: Quantifier,
    def: &ContainsDefinition,
    sources: &[SourceRef],
    problems: &mut impl ProblemReporter,
) -> ContainsMatcher {
    let mut checks = ValueChecks::default();
    for c in &def.checks {
        match c {
            CheckDefinition::Equal { value } => checks.text.push(StringCheck::Equals(value.clone())),
            CheckDefinition::Pattern { pattern } => match StringCheck::pattern(pattern) {
                Ok(check) => checks.text.push(check),
                Err(e) => problems.add_error(
                    sources.to_vec(),
                    format!("{}: invalid pattern '{}' ({})", def.key, pattern, e),
                ),
            },
            CheckDefinition::Range { min, max } => checks.numeric.push(NumericBounds::new(
                min.unwrap_or(f64::MIN),
                max.unwrap_or(f64::MAX),
            )),
        }
    }
    ContainsMatcher {
        quantifier,
        count: def.count,
        distinct: def.distinct,
        key: def.key.clone(),
        checks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::{ProblemLevel, ProblemSet};

    const RULES: &str = r#"
rules:
  - id: r1
    matchers:
      - type: contains_some
        key: kind
        checks:
          - type: equal
            value: item
    conformities:
      - level: warn
        matcher:
          type: contains_all
          key: size
          checks:
            - type: range
              min: 0
              max: 10
      - level: warn
        matcher:
          type: not
          matcher:
            type: contains_some
            key: name
            checks:
              - type: pattern
                pattern: "^tmp"
groups:
  - id: g1
    matchers:
      - type: or
        collection:
          - type: contains_some
            key: kind
            checks: [{type: equal, value: item}]
    shared_values: [size]
    alterations:
      - key: kind
        action: set
        values: [group]
      - key: kind
        action: explode
    convergences:
      - key: color
        level: error
        requires: disjoint
      - key: color
        level: error
        requires: sometimes
"#;

    #[test]
    fn test_convert_rule_file() {
        let def: RuleSetDefinition = serde_yaml::from_str(RULES).unwrap();
        let mut problems = ProblemSet::new();
        let set = def.convert(&mut problems);

        let rule = &set.rules[0];
        assert_eq!(rule.matchers.contains.len(), 1);
        assert_eq!(rule.conformities.len(), 1);
        assert_eq!(rule.conformities[0].matchers.contains.len(), 1);
        assert_eq!(rule.conformities[0].matchers.collections[0].op, CollectionOp::Not);

        let group = &set.groups[0];
        assert_eq!(group.shared_keys, vec!["size"]);
        assert_eq!(group.alterations[0].action, AlterationAction::Set);
        assert_eq!(group.alterations[0].values.text, vec!["group"]);
        assert_eq!(group.alterations[1].action, AlterationAction::Set);
        assert_eq!(group.convergences[0].requires, ConvergenceRequirement::Disjoint);
        assert_eq!(group.convergences[1].requires, ConvergenceRequirement::AllMatch);

        let messages: Vec<_> = problems.errors().iter().map(|p| p.message.clone()).collect();
        assert_eq!(
            messages,
            vec![
                "unsupported alteration action (explode)",
                "unsupported convergence type (sometimes)",
            ]
        );
    }

    #[test]
    fn test_invalid_pattern_dropped() {
        let def = ContainsDefinition {
            key: "name".into(),
            count: false,
            distinct: false,
            checks: vec![
                CheckDefinition::Pattern { pattern: "(".into() },
                CheckDefinition::Equal { value: "ok".into() },
            ],
        };
        let mut problems = ProblemSet::new();
        let m = convert_contains(Quantifier::Some, &def, &[], &mut problems);
        assert_eq!(m.checks.text.len(), 1);
        assert_eq!(problems.count_at_least(ProblemLevel::Error), 1);
    }
}
