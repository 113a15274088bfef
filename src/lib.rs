//! Rule Engine
//!
//! Validates structured documents against an ontology and a rule set, then
//! iteratively derives self-organizing groups of objects until no new ones
//! appear:
//! - Typed multi-valued objects with provenance
//! - Boolean matchers with quantified value checks
//! - Self-organizing group building with recursion detection
//! - Convergence checks over group members
//! - Concurrent, cancellable fixpoint rounds

pub mod concurrent;
pub mod config;
pub mod document;
pub mod error;
pub mod matcher;
pub mod model;
pub mod ontology;
pub mod problem;
pub mod rules;
pub mod runner;
pub mod sog;
pub mod source;
pub mod utils;
pub mod validate;

// Re-exports for convenience
pub use concurrent::CancelToken;
pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
pub use ontology::Ontology;
pub use problem::{Problem, ProblemLevel, ProblemSet};
pub use rules::RuleSet;
pub use runner::{Engine, EngineInputs, EngineState};
