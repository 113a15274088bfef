//! Object & Descriptor Value Model

pub mod factory;
pub mod object;
pub mod provenance;
pub mod values;

pub use factory::ObjectFactory;
pub use object::{EngineObject, ObjectBuilder};
pub use provenance::{ObjectSource, Provenance, ProvenanceArena, SourceId};
pub use values::{DescriptorValues, SealedValues, Values};
