//! Engine Runner
//!
//! Conformity checking of the base objects, then fixpoint rounds of group
//! building and convergence checking.

pub mod conformity;
pub mod convergence;
pub mod engine;
pub mod problems;
pub mod state;

pub use convergence::{check_convergence, ConvergenceViolation, MemberCluster};
pub use engine::{Engine, EngineInputs, EngineState};
pub use problems::{convergence_problem, rule_problem, RuleViolation};
pub use state::EnginePhase;
