//! Provenance Recursion Detection
//!
//! Adding an object to a group instance must not make the object one of its
//! own ancestors. The check walks parent edges from the instance members
//! looking for the candidate, in parallel, expanding each node once.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::concurrent::{run_early_exit, CancelToken, EarlyExitWorker, Emitter, SearchOutcome, Verdict};
use crate::error::{EngineError, EngineResult};
use crate::model::{EngineObject, Provenance, SourceId};

struct ProvenanceSearch {
    target: SourceId,
    provenance: Provenance,
    visited: Mutex<HashSet<SourceId>>,
}

#[async_trait]
impl EarlyExitWorker<SourceId, ()> for ProvenanceSearch {
    async fn perform(&self, item: SourceId, emit: &Emitter<SourceId>) -> Verdict<()> {
        if item == self.target {
            return Verdict::Final(());
        }
        let first_visit = {
            let mut visited = self.visited.lock().unwrap_or_else(|e| e.into_inner());
            visited.insert(item)
        };
        if !first_visit {
            return Verdict::Continue;
        }
        for parent in self.provenance.parents(item) {
            if !emit.emit(parent).await {
                break;
            }
        }
        Verdict::Continue
    }
}

/// True when `object` is a member or an ancestor of any member.
pub async fn is_recursion(
    members: &[Arc<EngineObject>],
    object: &EngineObject,
    provenance: &Provenance,
    cancel: &CancelToken,
) -> EngineResult<bool> {
    let target = object.source();
    if members.iter().any(|m| m.source() == target) {
        return Ok(true);
    }
    let initial: Vec<SourceId> = members.iter().map(|m| m.source()).collect();
    if initial.iter().all(|id| provenance.parents(*id).is_empty()) {
        // Only primary members: nothing above them to reach.
        return Ok(false);
    }

    let search = Arc::new(ProvenanceSearch {
        target,
        provenance: provenance.clone(),
        visited: Mutex::new(HashSet::new()),
    });
    match run_early_exit(search, cancel, initial).await {
        SearchOutcome::Found(()) => {
            debug!(object = %target, "object is an ancestor of the instance");
            Ok(true)
        }
        SearchOutcome::NotFound => Ok(false),
        SearchOutcome::Cancelled(reason) => Err(EngineError::Cancelled(reason)),
        SearchOutcome::Failed(message) => Err(EngineError::SearchFailed(message)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ObjectFactory, ObjectSource};
    use crate::ontology::Ontology;

    fn primary(f: &ObjectFactory) -> Arc<EngineObject> {
        Arc::new(f.empty(ObjectSource::Primary { refs: vec![] }).seal())
    }

    #[tokio::test]
    async fn test_member_is_recursion() {
        let f = ObjectFactory::new(Arc::new(Ontology::new()));
        let a = primary(&f);
        let found = is_recursion(&[a.clone()], &a, f.provenance(), &CancelToken::new()).await;
        assert_eq!(found, Ok(true));
    }

    #[tokio::test]
    async fn test_ancestor_detected() {
        let f = ObjectFactory::new(Arc::new(Ontology::new()));
        let a = primary(&f);
        let b = primary(&f);
        let g1 = Arc::new(f.from_group(&[a.clone(), b.clone()], "g1").unwrap().seal());
        let c = primary(&f);
        let g2 = Arc::new(f.from_group(&[g1.clone(), c.clone()], "g2").unwrap().seal());

        let token = CancelToken::new();
        // `a` sits two levels above g2.
        assert_eq!(is_recursion(&[g2.clone()], &a, f.provenance(), &token).await, Ok(true));
        // g2 is below, not above, its members.
        assert_eq!(is_recursion(&[g1.clone(), c.clone()], &g2, f.provenance(), &token).await, Ok(false));

        let unrelated = primary(&f);
        assert_eq!(is_recursion(&[g2], &unrelated, f.provenance(), &token).await, Ok(false));
    }

    #[tokio::test]
    async fn test_cancelled_search() {
        let f = ObjectFactory::new(Arc::new(Ontology::new()));
        let a = primary(&f);
        let g = Arc::new(f.from_group(&[a.clone()], "g").unwrap().seal());
        let other = primary(&f);
        let token = CancelToken::new();
        token.cancel("stop");
        let result = is_recursion(&[g], &other, f.provenance(), &token).await;
        assert_eq!(result, Err(EngineError::Cancelled("stop".into())));
    }
}
