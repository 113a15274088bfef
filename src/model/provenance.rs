//! Object Provenance
//!
//! Every object records where it came from: document locations for primary
//! objects, or the producing group and its member objects for synthetic ones.
//! Nodes live in one shared arena and refer to their parents by id.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard};

use crate::source::SourceRef;

/// Index of a node in the provenance arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(usize);

impl SourceId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ObjectSource {
    /// Read straight from documents.
    Primary { refs: Vec<SourceRef> },
    /// Built by a group from its members.
    Synthetic {
        construct: String,
        parents: Vec<SourceId>,
    },
}

/// Shared handle to the arena.
pub type Provenance = Arc<ProvenanceArena>;

/// Append-only store of provenance nodes.
#[derive(Debug, Default)]
pub struct ProvenanceArena {
    nodes: RwLock<Vec<ObjectSource>>,
}

impl ProvenanceArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Provenance {
        Arc::new(Self::new())
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<ObjectSource>> {
        self.nodes.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Adds a node and returns its id. Parents must already be registered.
    pub fn register(&self, source: ObjectSource) -> SourceId {
        let mut nodes = self.nodes.write().unwrap_or_else(|e| e.into_inner());
        nodes.push(source);
        SourceId(nodes.len() - 1)
    }

    pub fn get(&self, id: SourceId) -> Option<ObjectSource> {
        self.read().get(id.0).cloned()
    }

    /// Direct parents of a node. Primary nodes have none.
    pub fn parents(&self, id: SourceId) -> Vec<SourceId> {
        match self.read().get(id.0) {
            Some(ObjectSource::Synthetic { parents, .. }) => parents.clone(),
            _ => Vec::new(),
        }
    }

    pub fn construct(&self, id: SourceId) -> Option<String> {
        match self.read().get(id.0) {
            Some(ObjectSource::Synthetic { construct, .. }) => Some(construct.clone()),
            _ => None,
        }
    }

    /// Every document location reachable from the node, in discovery order.
    pub fn primary_sources(&self, id: SourceId) -> Vec<SourceRef> {
        let nodes = self.read();
        let mut ret: Vec<SourceRef> = Vec::new();
        let mut visited = HashSet::new();
        let mut pending = vec![id];
        while let Some(next) = pending.pop() {
            if !visited.insert(next) {
                continue;
            }
            match nodes.get(next.0) {
                Some(ObjectSource::Primary { refs }) => {
                    for r in refs {
                        if !ret.contains(r) {
                            ret.push(r.clone());
                        }
                    }
                }
                Some(ObjectSource::Synthetic { parents, .. }) => {
                    pending.extend(parents.iter().rev());
                }
                None => {}
            }
        }
        ret
    }

    /// Short human-readable label for diagnostics.
    pub fn describe(&self, id: SourceId) -> String {
        match self.read().get(id.0) {
            Some(ObjectSource::Primary { refs }) => {
                let refs: Vec<String> = refs.iter().map(|r| r.to_string()).collect();
                format!("object {} [{}]", id, refs.join(", "))
            }
            Some(ObjectSource::Synthetic { construct, parents }) => {
                let parents: Vec<String> = parents.iter().map(|p| p.to_string()).collect();
                format!("group {} {} of [{}]", construct, id, parents.join(", "))
            }
            None => format!("unknown object {}", id),
        }
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_sources_through_synthetic() {
        let arena = ProvenanceArena::new();
        let a = arena.register(ObjectSource::Primary { refs: vec![SourceRef::new("a.json", "git")] });
        let b = arena.register(ObjectSource::Primary { refs: vec![SourceRef::new("b.json", "git")] });
        let g = arena.register(ObjectSource::Synthetic {
            construct: "g1".into(),
            parents: vec![a, b],
        });
        let top = arena.register(ObjectSource::Synthetic {
            construct: "g2".into(),
            parents: vec![g, a],
        });

        assert_eq!(arena.parents(top), vec![g, a]);
        assert_eq!(arena.construct(g).as_deref(), Some("g1"));
        let locs: Vec<_> = arena
            .primary_sources(top)
            .into_iter()
            .map(|s| s.location)
            .collect();
        assert_eq!(locs, vec!["a.json", "b.json"]);
    }

    #[test]
    fn test_describe() {
        let arena = ProvenanceArena::new();
        let a = arena.register(ObjectSource::Primary { refs: vec![SourceRef::new("a.json", "git")] });
        let g = arena.register(ObjectSource::Synthetic { construct: "g".into(), parents: vec![a] });
        assert_eq!(arena.describe(a), "object #0 [git:a.json]");
        assert_eq!(arena.describe(g), "group g #1 of [#0]");
    }
}
