//! Self-Organizing Groups

pub mod builder;
pub mod instance;
pub mod recursion;

pub use builder::{AddResult, Origin, SogBuilder};
pub use instance::SogInstance;
pub use recursion::is_recursion;
