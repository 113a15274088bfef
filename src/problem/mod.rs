//! Problem (Diagnostic) Model
//!
//! Every component reports through a `ProblemReporter`. The in-memory
//! `ProblemSet` is used where reporting is single-threaded; the async sink in
//! [`sink`] fans in reports from concurrent tasks.

pub mod sink;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::source::SourceRef;

pub use sink::{async_sink, panic_message, ProblemAdder, ProblemConsumer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemLevel {
    Quiet,
    Info,
    Warn,
    Error,
}

impl fmt::Display for ProblemLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProblemLevel::Quiet => write!(f, "quiet"),
            ProblemLevel::Info => write!(f, "info"),
            ProblemLevel::Warn => write!(f, "warn"),
            ProblemLevel::Error => write!(f, "error"),
        }
    }
}

/// A single diagnostic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    pub level: ProblemLevel,
    pub message: String,
    #[serde(default)]
    pub sources: Vec<SourceRef>,
}

impl Problem {
    pub fn new(level: ProblemLevel, message: impl Into<String>, sources: Vec<SourceRef>) -> Self {
        Self {
            level,
            message: message.into(),
            sources,
        }
    }

    pub fn error(message: impl Into<String>, sources: Vec<SourceRef>) -> Self {
        Self::new(ProblemLevel::Error, message, sources)
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Anything that accepts diagnostics.
pub trait ProblemReporter {
    fn report(&mut self, problem: Problem);

    fn add_error(&mut self, sources: Vec<SourceRef>, message: impl Into<String>)
    where
        Self: Sized,
    {
        self.report(Problem::new(ProblemLevel::Error, message, sources));
    }

    fn add_warning(&mut self, sources: Vec<SourceRef>, message: impl Into<String>)
    where
        Self: Sized,
    {
        self.report(Problem::new(ProblemLevel::Warn, message, sources));
    }

    fn add_info(&mut self, sources: Vec<SourceRef>, message: impl Into<String>)
    where
        Self: Sized,
    {
        self.report(Problem::new(ProblemLevel::Info, message, sources));
    }
}

/// Ordered, append-only collection of problems.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProblemSet {
    problems: Vec<Problem>,
}

impl ProblemSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, problem: Problem) {
        self.problems.push(problem);
    }

    pub fn merge(&mut self, other: ProblemSet) {
        self.problems.extend(other.problems);
    }

    pub fn has_problems(&self) -> bool {
        !self.problems.is_empty()
    }

    pub fn problems(&self) -> &[Problem] {
        &self.problems
    }

    pub fn into_problems(self) -> Vec<Problem> {
        self.problems
    }

    pub fn errors(&self) -> Vec<&Problem> {
        self.problems
            .iter()
            .filter(|p| p.level == ProblemLevel::Error)
            .collect()
    }

    /// Counts the problems at or above the given level.
    pub fn count_at_least(&self, level: ProblemLevel) -> usize {
        self.problems.iter().filter(|p| p.level >= level).count()
    }

    pub fn len(&self) -> usize {
        self.problems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }
}

impl ProblemReporter for ProblemSet {
    fn report(&mut self, problem: Problem) {
        self.add(problem);
    }
}
