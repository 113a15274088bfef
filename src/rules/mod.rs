//! Rule and Group Definitions
//!
//! The validated, read-only rule model the engine evaluates. Raw file
//! definitions are converted into this model by [`definition`].

pub mod definition;

use regex::Regex;

use crate::model::Values;
use crate::source::SourceRef;

pub use definition::RuleSetDefinition;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionOp {
    And,
    Or,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantifier {
    /// Every comparison matches a distinct value.
    All,
    /// At least one comparison matches one value.
    Some,
    /// Every value is matched by some comparison.
    Only,
    /// One-to-one between comparisons and values.
    Exactly,
}

#[derive(Debug, Clone)]
pub enum StringCheck {
    Equals(String),
    Pattern(Regex),
}

impl StringCheck {
    pub fn pattern(pattern: &str) -> Result<Self, regex::Error> {
        Ok(StringCheck::Pattern(Regex::new(pattern)?))
    }
}

/// Inclusive numeric range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumericBounds {
    pub min: f64,
    pub max: f64,
}

impl NumericBounds {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

#[derive(Debug, Clone, Default)]
pub struct ValueChecks {
    pub text: Vec<StringCheck>,
    pub numeric: Vec<NumericBounds>,
}

impl ValueChecks {
    pub fn len(&self) -> usize {
        self.text.len() + self.numeric.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.numeric.is_empty()
    }
}

/// Tests the values of one key.
#[derive(Debug, Clone)]
pub struct ContainsMatcher {
    pub quantifier: Quantifier,
    /// Compare the number of values instead of the values.
    pub count: bool,
    /// Drop duplicate values before comparing.
    pub distinct: bool,
    pub key: String,
    pub checks: ValueChecks,
}

impl ContainsMatcher {
    pub fn new(quantifier: Quantifier, key: impl Into<String>) -> Self {
        Self {
            quantifier,
            count: false,
            distinct: false,
            key: key.into(),
            checks: ValueChecks::default(),
        }
    }

    pub fn counted(mut self) -> Self {
        self.count = true;
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.checks.numeric.push(NumericBounds::new(min, max));
        self
    }

    pub fn with_equals(mut self, value: impl Into<String>) -> Self {
        self.checks.text.push(StringCheck::Equals(value.into()));
        self
    }

    pub fn with_pattern(mut self, pattern: Regex) -> Self {
        self.checks.text.push(StringCheck::Pattern(pattern));
        self
    }
}

#[derive(Debug, Clone)]
pub struct CollectionMatcher {
    pub op: CollectionOp,
    pub matchers: MatcherSet,
}

/// Implicit AND of its collection and contains matchers.
#[derive(Debug, Clone, Default)]
pub struct MatcherSet {
    pub collections: Vec<CollectionMatcher>,
    pub contains: Vec<ContainsMatcher>,
}

impl MatcherSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contains(mut self, contains: ContainsMatcher) -> Self {
        self.contains.push(contains);
        self
    }

    pub fn with_collection(mut self, op: CollectionOp, matchers: MatcherSet) -> Self {
        self.collections.push(CollectionMatcher { op, matchers });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty() && self.contains.is_empty()
    }
}

/// A matcher whose failure is reported at `level`.
#[derive(Debug, Clone)]
pub struct LeveledMatcher {
    pub level: String,
    pub matchers: MatcherSet,
    pub sources: Vec<SourceRef>,
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub id: String,
    pub matchers: MatcherSet,
    pub conformities: Vec<LeveledMatcher>,
    pub sources: Vec<SourceRef>,
}

impl Rule {
    pub fn new(id: impl Into<String>, matchers: MatcherSet) -> Self {
        Self {
            id: id.into(),
            matchers,
            conformities: Vec::new(),
            sources: Vec::new(),
        }
    }

    pub fn with_conformity(mut self, level: impl Into<String>, matchers: MatcherSet) -> Self {
        self.conformities.push(LeveledMatcher {
            level: level.into(),
            matchers,
            sources: Vec::new(),
        });
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlterationAction {
    Add,
    AddDistinct,
    Remove,
    RemoveDistinct,
    Set,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Alteration {
    pub key: String,
    pub action: AlterationAction,
    pub values: Values,
    pub sources: Vec<SourceRef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergenceRequirement {
    /// All members hold the same values.
    AllMatch,
    /// No two members hold the same values.
    Disjoint,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Convergence {
    pub key: String,
    pub level: String,
    pub distinct: bool,
    pub requires: ConvergenceRequirement,
    pub sources: Vec<SourceRef>,
}

impl Convergence {
    pub fn new(key: impl Into<String>, level: impl Into<String>, requires: ConvergenceRequirement) -> Self {
        Self {
            key: key.into(),
            level: level.into(),
            distinct: false,
            requires,
            sources: Vec::new(),
        }
    }
}

/// A self-organizing group: objects matching `matchers` and sharing the
/// values of `shared_keys` are merged into one synthetic object.
#[derive(Debug, Clone)]
pub struct Group {
    pub id: String,
    pub matchers: MatcherSet,
    pub shared_keys: Vec<String>,
    pub alterations: Vec<Alteration>,
    pub convergences: Vec<Convergence>,
    pub sources: Vec<SourceRef>,
}

impl Group {
    pub fn new(id: impl Into<String>, matchers: MatcherSet) -> Self {
        Self {
            id: id.into(),
            matchers,
            shared_keys: Vec::new(),
            alterations: Vec::new(),
            convergences: Vec::new(),
            sources: Vec::new(),
        }
    }

    pub fn with_shared_key(mut self, key: impl Into<String>) -> Self {
        self.shared_keys.push(key.into());
        self
    }

    pub fn with_alteration(mut self, key: impl Into<String>, action: AlterationAction, values: Values) -> Self {
        self.alterations.push(Alteration {
            key: key.into(),
            action,
            values,
            sources: Vec::new(),
        });
        self
    }

    pub fn with_convergence(mut self, convergence: Convergence) -> Self {
        self.convergences.push(convergence);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    pub rules: Vec<Rule>,
    pub groups: Vec<Group>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn with_group(mut self, group: Group) -> Self {
        self.groups.push(group);
        self
    }
}
