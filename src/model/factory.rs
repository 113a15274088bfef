//! Object Factory
//!
//! Builds engine objects from documents and synthetic objects from group
//! members, registering each one's provenance.

use std::sync::Arc;

use super::object::{EngineObject, ObjectBuilder};
use super::provenance::{ObjectSource, Provenance, ProvenanceArena};
use crate::document::DocumentObject;
use crate::ontology::Ontology;

#[derive(Clone)]
pub struct ObjectFactory {
    ontology: Arc<Ontology>,
    provenance: Provenance,
}

impl ObjectFactory {
    pub fn new(ontology: Arc<Ontology>) -> Self {
        Self::with_provenance(ontology, ProvenanceArena::shared())
    }

    pub fn with_provenance(ontology: Arc<Ontology>, provenance: Provenance) -> Self {
        Self { ontology, provenance }
    }

    pub fn ontology(&self) -> &Arc<Ontology> {
        &self.ontology
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    /// Empty builder with a freshly registered provenance node.
    pub fn empty(&self, source: ObjectSource) -> ObjectBuilder {
        let id = self.provenance.register(source);
        ObjectBuilder::new(id, self.ontology.clone())
    }

    pub fn from_document(&self, doc: &DocumentObject) -> EngineObject {
        let mut builder = self.empty(ObjectSource::Primary {
            refs: doc.sources.clone(),
        });
        for d in &doc.descriptors {
            builder.add(&d.key, &d.split());
        }
        builder.seal()
    }

    /// Unsealed merge of every member's values, tagged with the group id.
    ///
    /// Returns `None` for an empty member list.
    pub fn from_group(&self, members: &[Arc<EngineObject>], group_id: &str) -> Option<ObjectBuilder> {
        let (first, rest) = members.split_first()?;
        let mut builder = first.alter();
        for member in rest {
            for key in member.keys() {
                if let Some(values) = member.get(key) {
                    builder.add_from(key, values.as_values());
                }
            }
        }

        let id = self.provenance.register(ObjectSource::Synthetic {
            construct: group_id.to_string(),
            parents: members.iter().map(|m| m.source()).collect(),
        });
        Some(builder.with_source(id))
    }
}
