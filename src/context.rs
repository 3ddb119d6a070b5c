// Author: Jacques Murray

//! Caller-owned cancellation, independent of [`Options::timeout`].
//!
//! A [`Context`] is either cancelled explicitly (through its
//! [`CancellationToken`]) or expires when its optional deadline passes.
//! Either way the engine reports [`ErrorKind::ContextCancelled`].
//!
//! [`Options::timeout`]: crate::Options::timeout
//! [`ErrorKind::ContextCancelled`]: crate::ErrorKind::ContextCancelled

use std::time::{Duration, Instant};

use futures::future;
use futures::pin_mut;
use tokio_util::sync::CancellationToken;

use crate::sleep::sleep;

/// A cloneable cancellation signal with an optional deadline.
///
/// Clones share the same token: cancelling one cancels all of them.
#[derive(Debug, Clone, Default)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that is never done until [`cancel`](Self::cancel) is called.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an existing token, e.g. one shared with a shutdown handler.
    pub fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Expires `timeout` from now, or keeps an earlier existing deadline.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self,
        }
    }

    /// Expires at `deadline`, or keeps an earlier existing deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
        self
    }

    /// A context cancelled whenever `self` is, but which can also be
    /// cancelled on its own without affecting `self`.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// True once cancelled or past the deadline.
    pub fn is_done(&self) -> bool {
        self.token.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Resolves once the context is cancelled or its deadline passes.
    pub async fn done(&self) {
        let Some(deadline) = self.deadline else {
            self.token.cancelled().await;
            return;
        };

        let expiry = sleep(deadline.saturating_duration_since(Instant::now()));
        let cancelled = self.token.cancelled();
        pin_mut!(expiry);
        pin_mut!(cancelled);
        future::select(expiry, cancelled).await;
    }
}

#[cfg(all(test, feature = "tokio-timer"))]
mod tests {
    use super::*;

    #[test]
    fn fresh_context_is_not_done() {
        assert!(!Context::new().is_done());
    }

    #[test]
    fn cancelling_a_clone_cancels_the_original() {
        let ctx = Context::new();
        ctx.clone().cancel();
        assert!(ctx.is_done());
    }

    #[test]
    fn child_cancellation_does_not_propagate_upwards() {
        let parent = Context::new();
        let child = parent.child();
        child.cancel();
        assert!(child.is_done());
        assert!(!parent.is_done());

        let other = parent.child();
        parent.cancel();
        assert!(other.is_done());
    }

    #[test]
    fn earlier_deadline_wins() {
        let early = Instant::now() + Duration::from_secs(1);
        let ctx = Context::new()
            .with_deadline(early)
            .with_timeout(Duration::from_secs(60));
        assert_eq!(ctx.deadline(), Some(early));
    }

    #[test]
    fn past_deadline_is_done() {
        let ctx = Context::new().with_timeout(Duration::ZERO);
        assert!(ctx.is_done());
    }

    #[tokio::test]
    async fn done_resolves_on_deadline() {
        let ctx = Context::new().with_timeout(Duration::from_millis(10));
        ctx.done().await;
        assert!(ctx.is_done());
    }
}
