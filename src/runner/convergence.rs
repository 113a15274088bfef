//! Convergence Checker
//!
//! Clusters the members of a sealed group instance by their values for one
//! key, then decides whether the clustering violates the group's requirement.

use std::sync::Arc;

use crate::error::{EngineError, EngineResult};
use crate::model::{EngineObject, Values};
use crate::ontology::{Descriptor, Ontology};
use crate::rules::{Convergence, ConvergenceRequirement};

/// Members that share the same values for the checked key.
#[derive(Debug, Clone)]
pub struct MemberCluster {
    pub members: Vec<Arc<EngineObject>>,
    /// Values of the first member, as stored.
    pub values: Values,
}

#[derive(Debug, Clone)]
pub struct ConvergenceViolation {
    pub group_id: String,
    pub convergence: Convergence,
    pub clusters: Vec<MemberCluster>,
}

/// Comparable form of a member's values.
#[derive(PartialEq)]
struct ClusterKey {
    numbers: Vec<f64>,
    text: Vec<String>,
}

impl ClusterKey {
    fn new(values: &Values, descriptor: &Descriptor, distinct: bool) -> Self {
        let mut numbers = values.numbers.clone();
        numbers.sort_by(|a, b| a.total_cmp(b));
        let mut text: Vec<String> = values.text.iter().map(|t| descriptor.fold(t)).collect();
        text.sort();
        if distinct {
            numbers.dedup();
            text.dedup();
        }
        Self { numbers, text }
    }
}

pub fn check_convergence(
    group_id: &str,
    members: &[Arc<EngineObject>],
    convergence: &Convergence,
    ontology: &Ontology,
) -> EngineResult<Option<ConvergenceViolation>> {
    let descriptor = ontology
        .get(&convergence.key)
        .ok_or_else(|| EngineError::UnknownDescriptor(convergence.key.clone()))?;
    if members.is_empty() {
        return Ok(None);
    }

    let distinct = convergence.distinct || descriptor.distinct;
    let mut keys: Vec<ClusterKey> = Vec::new();
    let mut clusters: Vec<MemberCluster> = Vec::new();
    for member in members {
        let values = member.values(&convergence.key);
        let key = ClusterKey::new(&values, descriptor, distinct);
        match keys.iter().position(|k| *k == key) {
            Some(idx) => clusters[idx].members.push(member.clone()),
            None => {
                keys.push(key);
                clusters.push(MemberCluster {
                    members: vec![member.clone()],
                    values,
                });
            }
        }
    }

    let offending = match convergence.requires {
        ConvergenceRequirement::AllMatch if clusters.len() > 1 => clusters,
        ConvergenceRequirement::AllMatch => Vec::new(),
        ConvergenceRequirement::Disjoint => clusters.into_iter().filter(|c| c.members.len() > 1).collect(),
    };
    if offending.is_empty() {
        return Ok(None);
    }
    Ok(Some(ConvergenceViolation {
        group_id: group_id.to_string(),
        convergence: convergence.clone(),
        clusters: offending,
    }))
}
