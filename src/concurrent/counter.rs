//! Countdown Latch with Early Exit
//!
//! Works like a wait group that can also be ended early with a result. The
//! completion signal fires once, either when the count drains to zero or on
//! the first `end`. Closers only run when the count drains.

use std::sync::{Mutex, MutexGuard};
use tokio::sync::oneshot;

pub type Closer = Box<dyn FnOnce() + Send>;

/// How a counter completed.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion<R> {
    /// The count reached zero.
    Drained,
    /// `end` was called with a result.
    Ended(R),
}

pub struct Counter<R> {
    state: Mutex<CounterState<R>>,
}

struct CounterState<R> {
    /// Not drained and not ended.
    ready: bool,
    /// Drained; does not care about early end.
    reached_zero: bool,
    count: i64,
    total: i64,
    signal: Option<oneshot::Sender<Completion<R>>>,
    waiter: Option<oneshot::Receiver<Completion<R>>>,
    closers: Vec<Closer>,
}

impl<R> CounterState<R> {
    fn finish(&mut self, completion: Completion<R>) {
        if self.ready {
            self.ready = false;
            if let Some(tx) = self.signal.take() {
                let _ = tx.send(completion);
            }
        }
    }
}

impl<R: Send> Counter<R> {
    pub fn new() -> Self {
        let (tx, rx) = oneshot::channel();
        Self {
            state: Mutex::new(CounterState {
                ready: true,
                reached_zero: false,
                count: 0,
                total: 0,
                signal: Some(tx),
                waiter: Some(rx),
                closers: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CounterState<R>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Registers a closer. Runs it right away if the count already drained.
    pub fn add_closer(&self, closer: impl FnOnce() + Send + 'static) {
        let mut state = self.lock();
        if state.reached_zero {
            drop(state);
            closer();
            return;
        }
        state.closers.push(Box::new(closer));
    }

    /// True once the counter drained or ended.
    pub fn is_finished(&self) -> bool {
        !self.lock().ready
    }

    /// Hands out the completion receiver. Only the first call gets it.
    pub fn wait(&self) -> Option<oneshot::Receiver<Completion<R>>> {
        self.lock().waiter.take()
    }

    /// Total amount ever added.
    pub fn total(&self) -> i64 {
        self.lock().total
    }

    pub fn count(&self) -> i64 {
        self.lock().count
    }

    pub fn increment(&self) {
        self.add(1);
    }

    pub fn add(&self, by: i64) {
        let mut state = self.lock();
        state.total += by;
        state.count += by;
    }

    pub fn decrement(&self) {
        let closers = {
            let mut state = self.lock();
            state.count -= 1;
            if !state.reached_zero && state.count <= 0 {
                state.reached_zero = true;
                state.finish(Completion::Drained);
                std::mem::take(&mut state.closers)
            } else {
                Vec::new()
            }
        };
        for closer in closers {
            closer();
        }
    }

    /// Completes the counter early. Ignored when already completed.
    pub fn end(&self, value: R) {
        self.lock().finish(Completion::Ended(value));
    }
}

impl<R: Send> Default for Counter<R> {
    fn default() -> Self {
        Self::new()
    }
}
