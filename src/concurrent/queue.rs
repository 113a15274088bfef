//! Close-Once Bounded Queue
//!
//! A producer/consumer queue that can be stopped from either side exactly
//! once. Writers never panic on a closed queue: they get `QueueClosed` back.
//! A capacity of zero makes every write a rendezvous with a reader.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tokio::sync::Notify;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("queue closed")]
pub struct QueueClosed;

/// Result of writing several items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnqueueAll {
    /// Items accepted before the queue closed.
    pub written: usize,
    /// True when the queue closed before every item was written.
    pub rejected: bool,
}

struct Shared<T> {
    state: Mutex<QueueState<T>>,
    readable: Notify,
    writable: Notify,
    capacity: usize,
    // Moves from false to true only.
    stopped: AtomicBool,
}

struct QueueState<T> {
    items: VecDeque<T>,
    closed: bool,
    pushed: u64,
    taken: u64,
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn slots(&self) -> usize {
        self.capacity.max(1)
    }

    fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        {
            let mut state = self.lock();
            state.closed = true;
            if self.capacity == 0 {
                // An item waiting on a rendezvous was never handed over.
                state.items.clear();
            }
        }
        self.readable.notify_waiters();
        self.writable.notify_waiters();
    }
}

/// Creates a queue holding up to `capacity` unread items.
pub fn bounded<T>(capacity: usize) -> (QueueWriter<T>, QueueReader<T>) {
    let shared = Arc::new(Shared {
        state: Mutex::new(QueueState {
            items: VecDeque::new(),
            closed: false,
            pushed: 0,
            taken: 0,
        }),
        readable: Notify::new(),
        writable: Notify::new(),
        capacity,
        stopped: AtomicBool::new(false),
    });
    (
        QueueWriter {
            shared: shared.clone(),
        },
        QueueReader { shared },
    )
}

pub struct QueueWriter<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for QueueWriter<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> QueueWriter<T> {
    /// Adds one item, waiting for space. Fails if the queue is closed.
    pub async fn enqueue(&self, value: T) -> Result<(), QueueClosed> {
        let shared = &self.shared;
        let mut value = Some(value);
        loop {
            let space = shared.writable.notified();
            let ticket = {
                let mut state = shared.lock();
                if state.closed {
                    return Err(QueueClosed);
                }
                if state.items.len() < shared.slots() {
                    state.items.extend(value.take());
                    state.pushed += 1;
                    Some(state.pushed)
                } else {
                    None
                }
            };
            let Some(ticket) = ticket else {
                space.await;
                continue;
            };
            shared.readable.notify_waiters();
            if shared.capacity > 0 {
                return Ok(());
            }
            return self.handed_over(ticket).await;
        }
    }

    async fn handed_over(&self, ticket: u64) -> Result<(), QueueClosed> {
        let shared = &self.shared;
        loop {
            let taken = shared.writable.notified();
            {
                let state = shared.lock();
                if state.taken >= ticket {
                    return Ok(());
                }
                if state.closed {
                    return Err(QueueClosed);
                }
            }
            taken.await;
        }
    }

    /// Adds every item in order, stopping at the first rejection.
    pub async fn enqueue_all(&self, values: impl IntoIterator<Item = T>) -> EnqueueAll {
        let mut written = 0;
        for v in values {
            if self.enqueue(v).await.is_err() {
                return EnqueueAll {
                    written,
                    rejected: true,
                };
            }
            written += 1;
        }
        EnqueueAll {
            written,
            rejected: false,
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.stopped.load(Ordering::SeqCst)
    }

    /// Marks the producing side as complete. Safe to call repeatedly.
    pub fn finished(&self) {
        self.shared.stop();
    }
}

pub struct QueueReader<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for QueueReader<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> QueueReader<T> {
    /// Next item, or `None` once the queue is closed and drained.
    pub async fn next(&self) -> Option<T> {
        let shared = &self.shared;
        loop {
            let ready = shared.readable.notified();
            match self.try_next() {
                Ok(Some(v)) => return Some(v),
                Ok(None) => {}
                Err(QueueClosed) => return None,
            }
            ready.await;
        }
    }

    /// Non-blocking read: `Ok(None)` when open but empty.
    pub fn try_next(&self) -> Result<Option<T>, QueueClosed> {
        let shared = &self.shared;
        let mut state = shared.lock();
        if let Some(v) = state.items.pop_front() {
            state.taken += 1;
            drop(state);
            shared.writable.notify_waiters();
            return Ok(Some(v));
        }
        if state.closed {
            return Err(QueueClosed);
        }
        Ok(None)
    }

    /// Prohibits further writes. Safe to call repeatedly.
    pub fn stop(&self) {
        self.shared.stop();
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.stopped.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_queue_read_then_stop() {
        let (writer, reader) = bounded::<String>(0);
        let w = writer.clone();
        let producer = tokio::spawn(async move { w.enqueue("a".to_string()).await });

        assert_eq!(reader.next().await.as_deref(), Some("a"));
        assert!(producer.await.unwrap().is_ok());

        assert!(!writer.is_stopped());
        reader.stop();
        assert!(writer.is_stopped());
        reader.stop();
        assert!(writer.is_stopped());
    }

    #[tokio::test]
    async fn test_stop_then_enqueue_is_rejected() {
        let (writer, reader) = bounded::<&str>(0);
        reader.stop();
        assert!(writer.is_stopped());
        assert_eq!(writer.enqueue("a").await, Err(QueueClosed));
        assert_eq!(reader.try_next(), Err(QueueClosed));
        assert!(reader.next().await.is_none());
    }

    #[tokio::test]
    async fn test_partial_enqueue_all() {
        let (writer, reader) = bounded::<i32>(0);
        let producer = tokio::spawn(async move { writer.enqueue_all(1..=8).await });

        while let Some(v) = reader.next().await {
            assert!(v <= 4, "read a value past the stop point ({})", v);
            if v == 4 {
                reader.stop();
            }
        }

        let result = tokio::time::timeout(Duration::from_secs(2), producer)
            .await
            .expect("producer did not finish")
            .unwrap();
        assert!(result.rejected);
        assert_eq!(result.written, 4);
    }

    #[tokio::test]
    async fn test_spawned_writer_waits_for_space() {
        let (writer, reader) = bounded::<u32>(1);
        writer.enqueue(1).await.unwrap();

        let w = writer.clone();
        let blocked = tokio::spawn(async move { w.enqueue(2).await });
        tokio::task::yield_now().await;
        assert!(!blocked.is_finished());

        assert_eq!(reader.next().await, Some(1));
        assert_eq!(blocked.await.unwrap(), Ok(()));
        assert_eq!(reader.next().await, Some(2));

        // Writers parked on a full queue see the stop.
        writer.enqueue(3).await.unwrap();
        let w = writer.clone();
        let rejected = tokio::spawn(async move { w.enqueue(4).await });
        tokio::task::yield_now().await;
        reader.stop();
        assert_eq!(rejected.await.unwrap(), Err(QueueClosed));
    }

    #[tokio::test]
    async fn test_buffered_items_drain_after_stop() {
        let (writer, reader) = bounded::<u8>(4);
        let result = writer.enqueue_all([1, 2, 3]).await;
        assert_eq!(result, EnqueueAll { written: 3, rejected: false });
        writer.finished();

        let mut seen = Vec::new();
        while let Some(v) = reader.next().await {
            seen.push(v);
        }
        assert_eq!(seen, vec![1, 2, 3]);
    }
}
