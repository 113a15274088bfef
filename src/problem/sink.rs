//! Async Problem Sink
//!
//! A single collector task owns the `ProblemSet`. Any number of cloned
//! `ProblemAdder`s feed it through an unbounded channel, and the
//! `ProblemConsumer` reads the final set once the adder side completes or the
//! pipeline is cancelled.

use std::any::Any;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use super::{Problem, ProblemLevel, ProblemReporter, ProblemSet};
use crate::concurrent::CancelToken;
use crate::error::EngineError;
use crate::source::SourceRef;

enum SinkMessage {
    Problem(Problem),
    Complete,
}

/// Starts the collector task.
pub fn async_sink(cancel: &CancelToken) -> (ProblemAdder, ProblemConsumer) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let cancel = cancel.clone();

    let handle = tokio::spawn(async move {
        let mut set = ProblemSet::new();
        loop {
            tokio::select! {
                // A cancellation always wins over a completion sent after it.
                biased;
                _ = cancel.cancelled() => break,
                msg = rx.recv() => match msg {
                    Some(SinkMessage::Problem(p)) => set.add(p),
                    Some(SinkMessage::Complete) | None => return set,
                },
            }
        }

        // Keep whatever was sent before the cancellation.
        while let Ok(msg) = rx.try_recv() {
            if let SinkMessage::Problem(p) = msg {
                set.add(p);
            }
        }
        let reason = cancel.reason().unwrap_or_else(|| "cancelled".to_string());
        debug!(reason = %reason, "problem sink cancelled");
        set.add(Problem::error(format!("internal error: {}", reason), vec![]));
        set
    });

    (
        ProblemAdder { tx },
        ProblemConsumer {
            handle: Some(handle),
            complete: None,
        },
    )
}

/// Cloneable write side of the sink.
#[derive(Clone)]
pub struct ProblemAdder {
    tx: mpsc::UnboundedSender<SinkMessage>,
}

impl ProblemAdder {
    pub fn add(&self, problem: Problem) {
        // The collector is gone once the sink completed; late reports are dropped.
        if self.tx.send(SinkMessage::Problem(problem)).is_err() {
            debug!("problem reported after sink completion");
        }
    }

    pub fn add_problem(&self, sources: Vec<SourceRef>, level: ProblemLevel, message: impl Into<String>) {
        self.add(Problem::new(level, message, sources));
    }

    /// Reports a failure raised while running `stage`.
    pub fn error(&self, stage: &str, err: impl std::fmt::Display) {
        self.add(Problem::error(format!("{}: {}", stage, err), vec![]));
    }

    /// Reports a panic payload caught while running `stage`.
    pub fn recover(&self, stage: &str, payload: Box<dyn Any + Send>) {
        let message = panic_message(payload);
        error!(stage = stage, error = %message, "task panicked");
        let err = EngineError::TaskPanic {
            stage: stage.to_string(),
            message,
        };
        self.add(Problem::error(err.to_string(), vec![]));
    }

    /// Signals that nothing else will be reported.
    pub fn complete(&self) {
        let _ = self.tx.send(SinkMessage::Complete);
    }
}

impl ProblemReporter for ProblemAdder {
    fn report(&mut self, problem: Problem) {
        self.add(problem);
    }
}

/// Read side of the sink.
pub struct ProblemConsumer {
    handle: Option<JoinHandle<ProblemSet>>,
    complete: Option<ProblemSet>,
}

impl ProblemConsumer {
    /// Waits for the collector to finish. Later calls return the cached set.
    pub async fn read(&mut self) -> ProblemSet {
        if let Some(set) = &self.complete {
            return set.clone();
        }
        let set = match self.handle.take() {
            Some(handle) => match handle.await {
                Ok(set) => set,
                Err(e) => {
                    let mut set = ProblemSet::new();
                    set.add(Problem::error(format!("problem sink: runtime error ({})", e), vec![]));
                    set
                }
            },
            None => ProblemSet::new(),
        };
        self.complete = Some(set.clone());
        set
    }
}

/// Extracts a readable message from a panic payload.
pub fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        return s.to_string();
    }
    match payload.downcast::<String>() {
        Ok(s) => *s,
        Err(_) => "unknown panic".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sink_collects_in_order() {
        let token = CancelToken::new();
        let (adder, mut consumer) = async_sink(&token);
        let mut reporter = adder.clone();
        adder.add_problem(vec![], ProblemLevel::Info, "one");
        reporter.add_warning(vec![], "two");
        adder.error("convergence", "bad key");
        adder.complete();

        let set = consumer.read().await;
        let messages: Vec<_> = set.problems().iter().map(|p| p.message.clone()).collect();
        assert_eq!(messages, vec!["one", "two", "convergence: bad key"]);

        // Cached on the second read.
        assert_eq!(consumer.read().await, set);
    }

    #[tokio::test]
    async fn test_cancel_adds_single_internal_error() {
        let token = CancelToken::new();
        let (adder, mut consumer) = async_sink(&token);
        adder.add_problem(vec![], ProblemLevel::Warn, "before");
        token.cancel("shutting down");
        token.cancel("again");

        let set = consumer.read().await;
        let internal: Vec<_> = set
            .problems()
            .iter()
            .filter(|p| p.message.starts_with("internal error"))
            .collect();
        assert_eq!(internal.len(), 1);
        assert_eq!(internal[0].message, "internal error: shutting down");
        assert_eq!(internal[0].level, ProblemLevel::Error);
    }

    #[tokio::test]
    async fn test_recover_reports_stage() {
        let token = CancelToken::new();
        let (adder, mut consumer) = async_sink(&token);
        let payload = std::panic::catch_unwind(|| panic!("boom")).unwrap_err();
        adder.recover("group g1", payload);
        adder.complete();

        let set = consumer.read().await;
        assert_eq!(set.errors().len(), 1);
        assert_eq!(set.problems()[0].message, "group g1: runtime error (boom)");
    }

    #[test]
    fn test_panic_message_formats() {
        assert_eq!(panic_message(Box::new("static")), "static");
        assert_eq!(panic_message(Box::new(String::from("owned"))), "owned");
        assert_eq!(panic_message(Box::new(5u8)), "unknown panic");
    }
}
