//! Engine lifecycle phases.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnginePhase {
    /// Started, no round run yet.
    Idle,
    Running,
    /// Terminal. The problem sink has been completed.
    Stopped,
}

impl EnginePhase {
    pub fn is_stopped(&self) -> bool {
        *self == EnginePhase::Stopped
    }
}

impl fmt::Display for EnginePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnginePhase::Idle => write!(f, "idle"),
            EnginePhase::Running => write!(f, "running"),
            EnginePhase::Stopped => write!(f, "stopped"),
        }
    }
}
