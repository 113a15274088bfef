//! Cancellation Tokens
//!
//! A pipeline-wide cancellation signal carrying the reason for the first
//! cancellation. Child tokens observe their parent but can be cancelled on
//! their own without affecting it.

use futures::future::BoxFuture;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

struct CancelInner {
    state: watch::Sender<Option<String>>,
    parent: Option<CancelToken>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::with_parent(None)
    }

    fn with_parent(parent: Option<CancelToken>) -> Self {
        let (state, _) = watch::channel(None);
        Self {
            inner: Arc::new(CancelInner { state, parent }),
        }
    }

    /// Creates a token that is cancelled whenever this one is.
    pub fn child(&self) -> Self {
        Self::with_parent(Some(self.clone()))
    }

    /// Cancels this token. Only the first reason is kept.
    pub fn cancel(&self, reason: impl Into<String>) {
        let reason = reason.into();
        self.inner.state.send_if_modified(|state| {
            if state.is_some() {
                return false;
            }
            *state = Some(reason);
            true
        });
    }

    pub fn is_cancelled(&self) -> bool {
        if self.inner.state.borrow().is_some() {
            return true;
        }
        match &self.inner.parent {
            Some(parent) => parent.is_cancelled(),
            None => false,
        }
    }

    /// The reason for the cancellation, looking up through the parents.
    pub fn reason(&self) -> Option<String> {
        if let Some(reason) = self.inner.state.borrow().clone() {
            return Some(reason);
        }
        self.inner.parent.as_ref().and_then(|p| p.reason())
    }

    /// Resolves once this token or any ancestor is cancelled.
    pub fn cancelled(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let mut rx = self.inner.state.subscribe();
            match &self.inner.parent {
                Some(parent) => {
                    tokio::select! {
                        _ = rx.wait_for(|s| s.is_some()) => {}
                        _ = parent.cancelled() => {}
                    }
                }
                None => {
                    let _ = rx.wait_for(|s| s.is_some()).await;
                }
            }
        })
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .field("reason", &self.reason())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_first_reason_wins() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        token.cancel("first");
        token.cancel("second");
        assert!(token.is_cancelled());
        assert_eq!(token.reason().as_deref(), Some("first"));
    }

    #[test]
    fn test_child_sees_parent_but_not_reverse() {
        let parent = CancelToken::new();
        let child = parent.child();
        child.cancel("child only");
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());

        let other = parent.child();
        parent.cancel("parent");
        assert!(other.is_cancelled());
        assert_eq!(other.reason().as_deref(), Some("parent"));
    }

    #[tokio::test]
    async fn test_cancelled_future_resolves() {
        let parent = CancelToken::new();
        let child = parent.child();
        let waiter = tokio::spawn(async move {
            child.cancelled().await;
            child.reason()
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        parent.cancel("shutdown");
        let reason = tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .expect("child did not observe cancellation")
            .unwrap();
        assert_eq!(reason.as_deref(), Some("shutdown"));
    }
}
