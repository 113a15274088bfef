//! Engine Error Types
//!
//! Failures that cross component boundaries inside the engine. Anything that
//! only concerns a single record is reported as a `Problem` instead, so a bad
//! object never aborts a run.

use thiserror::Error;

pub type EngineResult<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum EngineError {
    /// The key is not defined in the ontology.
    #[error("undefined descriptor key ({0})")]
    UnknownDescriptor(String),

    /// The pipeline cancellation token fired.
    #[error("operation cancelled: {0}")]
    Cancelled(String),

    /// A concurrent search task failed unexpectedly.
    #[error("search failed: {0}")]
    SearchFailed(String),

    /// A task panicked; carries the stage label and panic message.
    #[error("{stage}: runtime error ({message})")]
    TaskPanic { stage: String, message: String },
}
