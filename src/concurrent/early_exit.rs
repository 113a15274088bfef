//! Early-Exit Parallel Search
//!
//! Runs one task per work item. Workers may emit more items, each of which
//! gets its own task. The first worker to return a final answer ends the
//! search and aborts the rest; if every worker continues and nothing is left
//! to process the search reports `NotFound`.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use super::cancel::CancelToken;
use super::counter::Counter;
use super::queue::{self, QueueReader, QueueWriter};
use crate::problem::panic_message;

/// Pending items held between emission and dispatch.
const QUEUE_CAPACITY: usize = 64;

/// What a worker decided about one item.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict<R> {
    /// Keep searching.
    Continue,
    /// Stop the whole search with this answer.
    Final(R),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome<R> {
    Found(R),
    NotFound,
    /// The cancellation token fired, with its reason.
    Cancelled(String),
    /// A worker panicked.
    Failed(String),
}

impl<R> SearchOutcome<R> {
    pub fn found(self) -> Option<R> {
        match self {
            SearchOutcome::Found(r) => Some(r),
            _ => None,
        }
    }
}

#[async_trait]
pub trait EarlyExitWorker<T: Send + 'static, R: Send + 'static>: Send + Sync {
    async fn perform(&self, item: T, emit: &Emitter<T>) -> Verdict<R>;
}

/// Hands newly discovered items back to the search.
pub struct Emitter<T> {
    writer: QueueWriter<T>,
    live: Arc<Counter<()>>,
}

impl<T> Clone for Emitter<T> {
    fn clone(&self) -> Self {
        Self {
            writer: self.writer.clone(),
            live: self.live.clone(),
        }
    }
}

impl<T: Send> Emitter<T> {
    /// Queues an item for processing. Returns false once the search is over.
    pub async fn emit(&self, item: T) -> bool {
        // Counted before the write so the search cannot drain in between.
        self.live.increment();
        if self.writer.enqueue(item).await.is_err() {
            self.live.decrement();
            return false;
        }
        true
    }

    pub fn is_stopped(&self) -> bool {
        self.writer.is_stopped()
    }
}

/// Searches from `initial` until a worker returns `Verdict::Final`.
pub async fn run_early_exit<T, R, W>(
    worker: Arc<W>,
    cancel: &CancelToken,
    initial: Vec<T>,
) -> SearchOutcome<R>
where
    T: Send + 'static,
    R: Send + 'static,
    W: EarlyExitWorker<T, R> + 'static,
{
    if initial.is_empty() {
        return SearchOutcome::NotFound;
    }
    if let Some(reason) = cancel.reason() {
        return SearchOutcome::Cancelled(reason);
    }

    let (writer, reader) = queue::bounded(QUEUE_CAPACITY);
    let live = Arc::new(Counter::<()>::new());
    {
        let reader = reader.clone();
        live.add_closer(move || reader.stop());
    }
    live.add(initial.len() as i64);

    let emitter = Emitter { writer, live };
    let mut tasks = JoinSet::new();
    for item in initial {
        spawn_item(&mut tasks, &worker, &emitter, item);
    }

    let mut queue_open = true;
    loop {
        if !queue_open && tasks.is_empty() {
            debug!(total = emitter.live.total(), "search drained without result");
            return SearchOutcome::NotFound;
        }
        tokio::select! {
            _ = cancel.cancelled() => {
                shutdown(&mut tasks, &reader);
                let reason = cancel.reason().unwrap_or_default();
                return SearchOutcome::Cancelled(reason);
            }
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                match joined {
                    Ok(Verdict::Continue) => {}
                    Ok(Verdict::Final(r)) => {
                        shutdown(&mut tasks, &reader);
                        return SearchOutcome::Found(r);
                    }
                    Err(e) => {
                        shutdown(&mut tasks, &reader);
                        let message = if e.is_panic() {
                            panic_message(e.into_panic())
                        } else {
                            e.to_string()
                        };
                        warn!(error = %message, "search task failed");
                        return SearchOutcome::Failed(message);
                    }
                }
            }
            next = reader.next(), if queue_open => {
                match next {
                    Some(item) => spawn_item(&mut tasks, &worker, &emitter, item),
                    None => queue_open = false,
                }
            }
        }
    }
}

fn spawn_item<T, R, W>(tasks: &mut JoinSet<Verdict<R>>, worker: &Arc<W>, emitter: &Emitter<T>, item: T)
where
    T: Send + 'static,
    R: Send + 'static,
    W: EarlyExitWorker<T, R> + 'static,
{
    let worker = worker.clone();
    let emitter = emitter.clone();
    tasks.spawn(async move {
        if emitter.is_stopped() {
            emitter.live.decrement();
            return Verdict::Continue;
        }
        let verdict = worker.perform(item, &emitter).await;
        emitter.live.decrement();
        verdict
    });
}

fn shutdown<T, R: 'static>(tasks: &mut JoinSet<Verdict<R>>, reader: &QueueReader<T>) {
    reader.stop();
    tasks.abort_all();
}
