//! Engine Objects
//!
//! `EngineObject` is the sealed, immutable attribute bundle that the matcher,
//! the group builder and the runner read. `ObjectBuilder` is its mutable
//! counterpart.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

use super::provenance::SourceId;
use super::values::{DescriptorValues, SealedValues, Values};
use crate::ontology::Ontology;

pub struct EngineObject {
    source: SourceId,
    values: HashMap<String, SealedValues>,
    ontology: Arc<Ontology>,
}

impl EngineObject {
    pub fn source(&self) -> SourceId {
        self.source
    }

    pub fn ontology(&self) -> &Arc<Ontology> {
        &self.ontology
    }

    pub fn get(&self, key: &str) -> Option<&SealedValues> {
        self.values.get(key)
    }

    /// Snapshot of a key's values. Absent keys give an empty snapshot.
    pub fn values(&self, key: &str) -> Values {
        self.values.get(key).map(|v| v.list()).unwrap_or_default()
    }

    pub fn count(&self, key: &str) -> usize {
        self.values.get(key).map(|v| v.count()).unwrap_or(0)
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }

    /// Deep copy into a builder that keeps this object's provenance.
    pub fn alter(&self) -> ObjectBuilder {
        ObjectBuilder {
            source: self.source,
            values: self
                .values
                .iter()
                .map(|(k, v)| (k.clone(), v.to_builder()))
                .collect(),
            ontology: self.ontology.clone(),
        }
    }
}

impl fmt::Debug for EngineObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&String> = self.values.keys().collect();
        keys.sort();
        let mut map = f.debug_map();
        for k in keys {
            map.entry(k, &self.values[k].list());
        }
        map.finish()?;
        write!(f, " ({})", self.source)
    }
}

/// Mutable object under construction.
pub struct ObjectBuilder {
    source: SourceId,
    values: HashMap<String, DescriptorValues>,
    ontology: Arc<Ontology>,
}

impl ObjectBuilder {
    pub fn new(source: SourceId, ontology: Arc<Ontology>) -> Self {
        Self {
            source,
            values: HashMap::new(),
            ontology,
        }
    }

    pub fn source(&self) -> SourceId {
        self.source
    }

    /// Re-points the builder at another provenance node.
    pub(crate) fn with_source(mut self, source: SourceId) -> Self {
        self.source = source;
        self
    }

    /// Storage for `key`. Missing keys are created only when `create` is set
    /// and the ontology knows the key.
    fn slot(&mut self, key: &str, create: bool) -> Option<&mut DescriptorValues> {
        if !self.values.contains_key(key) {
            if !create {
                return None;
            }
            let Some(descriptor) = self.ontology.get(key) else {
                trace!(key = key, "dropping value for undefined descriptor");
                return None;
            };
            self.values
                .insert(key.to_string(), DescriptorValues::for_descriptor(descriptor));
        }
        self.values.get_mut(key)
    }

    pub fn add(&mut self, key: &str, values: &Values) -> &mut Self {
        if let Some(slot) = self.slot(key, true) {
            slot.add_values(values);
        }
        self
    }

    /// Adds only values the key does not already hold.
    pub fn add_distinct(&mut self, key: &str, values: &Values) -> &mut Self {
        if let Some(slot) = self.slot(key, true) {
            slot.add_missing(values);
        }
        self
    }

    /// Merges another store into the key.
    pub fn add_from(&mut self, key: &str, other: &DescriptorValues) -> &mut Self {
        if let Some(slot) = self.slot(key, true) {
            slot.add_from(other);
        }
        self
    }

    /// Removes one occurrence of each value.
    pub fn remove(&mut self, key: &str, values: &Values) -> &mut Self {
        if let Some(slot) = self.slot(key, false) {
            slot.remove_once(values);
        }
        self
    }

    /// Removes every occurrence of each value.
    pub fn remove_distinct(&mut self, key: &str, values: &Values) -> &mut Self {
        if let Some(slot) = self.slot(key, false) {
            slot.remove_all(values);
        }
        self
    }

    pub fn set(&mut self, key: &str, values: &Values) -> &mut Self {
        if let Some(slot) = self.slot(key, true) {
            slot.clear();
            slot.add_values(values);
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&DescriptorValues> {
        self.values.get(key)
    }

    pub fn seal(self) -> EngineObject {
        EngineObject {
            source: self.source,
            values: self
                .values
                .into_iter()
                .map(|(k, v)| (k, v.seal()))
                .collect(),
            ontology: self.ontology,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::provenance::{ObjectSource, ProvenanceArena};
    use crate::ontology::Descriptor;

    fn ontology() -> Arc<Ontology> {
        Arc::new(
            Ontology::new()
                .with_descriptor(Descriptor::numeric("size", 0.0, 100.0))
                .with_descriptor(Descriptor::free("name").case_insensitive().distinct()),
        )
    }

    fn builder() -> ObjectBuilder {
        let arena = ProvenanceArena::new();
        let id = arena.register(ObjectSource::Primary { refs: vec![] });
        ObjectBuilder::new(id, ontology())
    }

    #[test]
    fn test_remove_never_creates_key() {
        let mut b = builder();
        b.remove("size", &Values::numbers([1.0]));
        b.remove_distinct("name", &Values::text(["a"]));
        let obj = b.seal();
        assert!(!obj.has_key("size"));
        assert!(!obj.has_key("name"));
    }

    #[test]
    fn test_unknown_key_dropped() {
        let mut b = builder();
        b.add("nope", &Values::text(["x"]));
        let obj = b.seal();
        assert_eq!(obj.keys().count(), 0);
    }

    #[test]
    fn test_set_replaces_and_folds() {
        let mut b = builder();
        b.add("name", &Values::text(["Alpha", "beta"]));
        b.set("name", &Values::text(["GAMMA"]));
        let obj = b.seal();
        assert_eq!(obj.values("name").text, vec!["gamma"]);
    }

    #[test]
    fn test_alter_keeps_source_and_copies() {
        let mut b = builder();
        b.add("size", &Values::numbers([1.0, 2.0]));
        let obj = b.seal();

        let mut altered = obj.alter();
        altered.add("size", &Values::numbers([3.0]));
        let copy = altered.seal();

        assert_eq!(copy.source(), obj.source());
        assert_eq!(obj.count("size"), 2);
        assert_eq!(copy.count("size"), 3);
    }

    #[test]
    fn test_add_distinct_on_duplicate_store() {
        let mut b = builder();
        b.add("size", &Values::numbers([1.0]));
        b.add_distinct("size", &Values::numbers([1.0, 2.0]));
        assert_eq!(b.seal().values("size").numbers, vec![1.0, 2.0]);
    }
}
