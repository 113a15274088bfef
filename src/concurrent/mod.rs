//! Concurrency Primitives
//!
//! Building blocks for cancellable fan-out: a countdown latch, a close-once
//! queue, hierarchical cancellation and an early-exit search driver.

pub mod cancel;
pub mod counter;
pub mod early_exit;
pub mod queue;

pub use cancel::CancelToken;
pub use counter::{Completion, Counter};
pub use early_exit::{run_early_exit, EarlyExitWorker, Emitter, SearchOutcome, Verdict};
pub use queue::{bounded, EnqueueAll, QueueClosed, QueueReader, QueueWriter};
