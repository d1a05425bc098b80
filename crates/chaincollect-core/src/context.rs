//! Cancellation context shared by every blocking step of a collection call.
//!
//! A `Context` carries a cancel flag (a `watch` channel) and an optional
//! deadline. Clones observe the same flag. Any future can be raced against the
//! context with [`Context::run`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::CollectError;

#[derive(Debug, Clone)]
pub struct Context {
    cancel: Arc<watch::Sender<bool>>,
    deadline: Option<Instant>,
}

/// Cancels the context it was created with, and every clone of it.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    cancel: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }
}

impl Context {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            cancel: Arc::new(tx),
            deadline: None,
        }
    }

    /// A cancellable context and the handle that cancels it.
    pub fn with_cancel() -> (Self, CancelHandle) {
        let ctx = Self::background();
        let handle = CancelHandle {
            cancel: Arc::clone(&ctx.cancel),
        };
        (ctx, handle)
    }

    /// Derive a context that also expires after `timeout`.
    ///
    /// An earlier deadline already set on `self` is kept.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        Self {
            cancel: Arc::clone(&self.cancel),
            deadline: Some(self.deadline.map_or(deadline, |d| d.min(deadline))),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// `Some` once the context is cancelled or past its deadline.
    pub fn err(&self) -> Option<CollectError> {
        if *self.cancel.borrow() {
            return Some(CollectError::Canceled);
        }
        match self.deadline {
            Some(d) if Instant::now() >= d => Some(CollectError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves when the context is cancelled or its deadline passes.
    pub async fn done(&self) -> CollectError {
        let mut rx = self.cancel.subscribe();
        let cancelled = async move {
            loop {
                let cancelled = *rx.borrow_and_update();
                if cancelled {
                    return;
                }
                if rx.changed().await.is_err() {
                    // Sender gone: nobody can cancel any more.
                    std::future::pending::<()>().await;
                }
            }
        };
        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                _ = cancelled => CollectError::Canceled,
                _ = tokio::time::sleep_until(deadline) => CollectError::DeadlineExceeded,
            },
            None => {
                cancelled.await;
                CollectError::Canceled
            }
        }
    }

    /// Run `fut` unless the context ends first.
    ///
    /// If both are ready at the same time, cancellation wins.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, CollectError>
    where
        F: Future<Output = Result<T, CollectError>>,
    {
        tokio::select! {
            biased;
            err = self.done() => Err(err),
            res = fut => res,
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn background_is_never_done() {
        assert!(Context::background().err().is_none());
    }

    #[test]
    fn cancel_reaches_clones() {
        let (ctx, cancel) = Context::with_cancel();
        let child = ctx.with_timeout(Duration::from_secs(60));
        cancel.cancel();
        assert!(matches!(ctx.err(), Some(CollectError::Canceled)));
        assert!(matches!(child.err(), Some(CollectError::Canceled)));
    }

    #[test]
    fn earlier_deadline_is_kept() {
        let ctx = Context::background().with_timeout(Duration::from_secs(1));
        let longer = ctx.with_timeout(Duration::from_secs(60));
        assert_eq!(ctx.deadline(), longer.deadline());
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_expires() {
        let ctx = Context::background().with_timeout(Duration::from_millis(50));
        let err = ctx.done().await;
        assert!(matches!(err, CollectError::DeadlineExceeded));
        assert!(matches!(ctx.err(), Some(CollectError::DeadlineExceeded)));
    }

    #[tokio::test]
    async fn run_aborts_pending_future_on_cancel() {
        let (ctx, cancel) = Context::with_cancel();
        let task = tokio::spawn({
            let ctx = ctx.clone();
            async move {
                ctx.run(std::future::pending::<Result<(), CollectError>>())
                    .await
            }
        });
        tokio::task::yield_now().await;
        cancel.cancel();
        let res = task.await.unwrap();
        assert!(matches!(res, Err(CollectError::Canceled)));
    }

    #[tokio::test]
    async fn run_prefers_cancellation_over_ready_future() {
        let (ctx, cancel) = Context::with_cancel();
        cancel.cancel();
        let res = ctx.run(async { Ok::<_, CollectError>(1) }).await;
        assert!(matches!(res, Err(CollectError::Canceled)));
    }
}
