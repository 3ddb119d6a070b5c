// Author: Jacques Murray

//! Runtime-agnostic timers.
//!
//! This module uses feature flags (`tokio-timer`, `async-std-timer`)
//! to determine which runtime's sleep function to use. The engine never
//! sleeps directly; it goes through [`interruptible`] so that cancellation
//! is observed mid-delay.

use std::time::Duration;

use futures::future::{self, Either};
use futures::pin_mut;

use crate::context::Context;

/// Sleeps for the specified duration, using the async runtime
/// selected by the crate's feature flags.
///
/// Will produce a compile error if no timer feature is enabled.
pub(crate) async fn sleep(duration: Duration) {
    cfg_if::cfg_if! {
        if #[cfg(feature = "tokio-timer")] {
            tokio::time::sleep(duration).await;
        } else if #[cfg(feature = "async-std-timer")] {
            async_std::task::sleep(duration).await;
        } else {
            // Compile error if no runtime is selected.
            compile_error!("No async timer feature enabled. Please enable 'tokio-timer' or 'async-std-timer'.");
        }
    }
}

/// How an [`interruptible`] wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Wakeup {
    Elapsed,
    Cancelled,
}

/// Waits for `duration` unless `ctx` is done first.
pub(crate) async fn interruptible(duration: Duration, ctx: &Context) -> Wakeup {
    let timer = sleep(duration);
    let done = ctx.done();
    pin_mut!(timer);
    pin_mut!(done);

    match future::select(timer, done).await {
        Either::Left(_) => Wakeup::Elapsed,
        Either::Right(_) => Wakeup::Cancelled,
    }
}

#[cfg(all(test, feature = "tokio-timer"))]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn elapses_when_context_stays_live() {
        let ctx = Context::new();
        let wakeup = interruptible(Duration::from_millis(5), &ctx).await;
        assert_eq!(wakeup, Wakeup::Elapsed);
    }

    #[tokio::test]
    async fn cancellation_cuts_the_wait_short() {
        let ctx = Context::new();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let start = Instant::now();
        let wakeup = interruptible(Duration::from_secs(5), &ctx).await;

        assert_eq!(wakeup, Wakeup::Cancelled);
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
