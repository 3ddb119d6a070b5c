// Author: Jacques Murray

//! The poll/retry engine.
//!
//! [`run`] drives an attempt function until it reports [`Outcome::Done`],
//! or until one of the budgets runs out: the local
//! [`Options::timeout`], the [`Options::max_retries`] count, or the
//! caller's [`Context`]. Attempts are strictly sequential; the only
//! suspension point is the delay between them, which is always raced
//! against the context.

use std::fmt;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::time::{Duration, Instant};

use crate::context::Context;
use crate::error::{ErrorKind, RetryError};
use crate::options::Options;
use crate::sleep::{self, Wakeup};

/// What a single attempt observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<E> {
    /// The awaited condition holds; stop with success.
    Done,
    /// Not there yet; try again after the delay.
    Pending,
    /// The attempt itself failed. Retried unless
    /// [`Options::early_exit_on_error`] is set.
    Failed(E),
    /// The remote side reported a terminal failure. Never retried.
    Fatal(E),
}

impl<E> Outcome<E> {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Outcome::Done | Outcome::Fatal(_))
    }

    pub fn map_err<F>(self, f: impl FnOnce(E) -> F) -> Outcome<F> {
        match self {
            Outcome::Done => Outcome::Done,
            Outcome::Pending => Outcome::Pending,
            Outcome::Failed(e) => Outcome::Failed(f(e)),
            Outcome::Fatal(e) => Outcome::Fatal(f(e)),
        }
    }
}

/// The classic `(done, error)` pair: `Ok(true)` is done, `Ok(false)` is
/// pending, and an error is an ordinary attempt failure.
impl<E> From<Result<bool, E>> for Outcome<E> {
    fn from(result: Result<bool, E>) -> Self {
        match result {
            Ok(true) => Outcome::Done,
            Ok(false) => Outcome::Pending,
            Err(e) => Outcome::Failed(e),
        }
    }
}

/// Anything an attempt may resolve to.
///
/// Implemented for [`Outcome`] itself and for the `Result<bool, E>` pair.
/// The error type is an associated type so it is always determined by
/// what the attempt returns.
pub trait IntoOutcome {
    type Error;

    fn into_outcome(self) -> Outcome<Self::Error>;
}

impl<E> IntoOutcome for Outcome<E> {
    type Error = E;

    fn into_outcome(self) -> Outcome<E> {
        self
    }
}

impl<E> IntoOutcome for Result<bool, E> {
    type Error = E;

    fn into_outcome(self) -> Outcome<E> {
        self.into()
    }
}

/// Runs `attempt` until it is done or a budget is exhausted.
///
/// The first attempt is always made unless `ctx` is already done or the
/// timeout has already elapsed. Before each later attempt the engine
/// checks that the delay fits inside the remaining timeout; if it does
/// not, it returns [`ErrorKind::Timeout`] straight away rather than
/// sleeping past the budget.
///
/// ```rust,no_run
/// use cdo_retry::{run, Context, Options};
/// use std::time::Duration;
///
/// # async fn device_is_active() -> Result<bool, std::io::Error> { Ok(true) }
/// # async fn example() {
/// let opts = Options::default()
///     .with_timeout(Duration::from_secs(60))
///     .with_delay(Duration::from_secs(2));
///
/// let result = run(&Context::new(), || device_is_active(), &opts).await;
///
/// match result {
///     Ok(()) => println!("device is active"),
///     Err(e) if e.is_engine_error() => println!("gave up waiting: {}", e),
///     Err(e) => println!("device failed: {}", e),
/// }
/// # }
/// ```
pub async fn run<A, Fut, O, E>(
    ctx: &Context,
    mut attempt: A,
    opts: &Options,
) -> Result<(), RetryError<E>>
where
    A: FnMut() -> Fut,
    Fut: Future<Output = O>,
    O: IntoOutcome<Error = E>,
    E: fmt::Display,
{
    let deadline = Instant::now().checked_add(opts.timeout());
    let logger = opts.logger();
    let mut attempts: u32 = 0;
    let mut errors: Vec<E> = Vec::new();
    let mut retries: u32 = 0;

    loop {
        if attempts == 0 {
            if let Some(kind) = stop_reason(ctx, deadline, Duration::ZERO) {
                #[cfg(feature = "logging")]
                log::error!("Poll failed before the first attempt: {}", kind);
                logger.log(format_args!("not attempting: {}", kind));
                return Err(RetryError::new(kind, attempts, errors));
            }
        } else {
            let delay = opts.next_delay();
            if let Some(kind) = stop_reason(ctx, deadline, delay) {
                #[cfg(feature = "logging")]
                log::error!("Poll failed after {} attempt(s): {}", attempts, kind);
                logger.log(format_args!("giving up after {} attempt(s): {}", attempts, kind));
                return Err(RetryError::new(kind, attempts, errors));
            }

            #[cfg(feature = "logging")]
            log::trace!("Retrying after delay of {:?}", delay);

            if sleep::interruptible(delay, ctx).await == Wakeup::Cancelled {
                #[cfg(feature = "logging")]
                log::error!("Poll cancelled while waiting {:?} to retry", delay);
                logger.log(format_args!("cancelled while waiting to retry"));
                return Err(RetryError::new(ErrorKind::ContextCancelled, attempts, errors));
            }
        }

        attempts += 1;
        let outcome = attempt().await.into_outcome();
        match outcome {
            Outcome::Done => {
                #[cfg(feature = "logging")]
                log::debug!("Poll completed on attempt {}", attempts);
                logger.log(format_args!("done after {} attempt(s)", attempts));
                return Ok(());
            }
            Outcome::Pending => {
                #[cfg(feature = "logging")]
                log::trace!("Attempt {} is not done yet", attempts);
                logger.log(format_args!("attempt {}: not done yet", attempts));
            }
            Outcome::Failed(e) if opts.early_exit_on_error() => {
                #[cfg(feature = "logging")]
                log::error!(
                    "Poll failed: attempt {} failed and early exit is set: {}",
                    attempts,
                    e
                );
                logger.log(format_args!("attempt {} failed, exiting early: {}", attempts, e));
                return Err(RetryError::Aborted { attempts, error: e });
            }
            Outcome::Failed(e) => {
                #[cfg(feature = "logging")]
                log::warn!("Attempt {} failed with error: {}", attempts, e);
                logger.log(format_args!("attempt {} failed: {}", attempts, e));
                errors.push(e);
            }
            Outcome::Fatal(e) => {
                #[cfg(feature = "logging")]
                log::error!("Poll failed: attempt {} hit a terminal failure: {}", attempts, e);
                logger.log(format_args!("attempt {} hit a terminal failure: {}", attempts, e));
                return Err(RetryError::Aborted { attempts, error: e });
            }
        }

        if opts.max_retries_reached(retries) {
            #[cfg(feature = "logging")]
            log::error!("Poll failed: max retries reached after {} attempt(s)", attempts);
            logger.log(format_args!("max retries reached after {} attempt(s)", attempts));
            return Err(RetryError::new(ErrorKind::RetriesExceeded, attempts, errors));
        }
        retries += 1;
    }
}

/// Decides whether the engine must stop before waiting `delay` and
/// attempting again. Cancellation wins over the local timeout.
fn stop_reason(ctx: &Context, deadline: Option<Instant>, delay: Duration) -> Option<ErrorKind> {
    if ctx.is_done() {
        return Some(ErrorKind::ContextCancelled);
    }

    let deadline = deadline?;
    let now = Instant::now();
    let resume_at = now.checked_add(delay);
    if now > deadline || resume_at.map_or(true, |at| at > deadline) {
        #[cfg(feature = "logging")]
        log::trace!("Next attempt at +{:?} would pass the local deadline", delay);
        return Some(ErrorKind::Timeout);
    }
    None
}

/// A builder for an engine run that can be `.await`ed directly.
///
/// Equivalent to calling [`run`], but owns its context and options so the
/// resulting future is `'static` and can be spawned.
///
/// ```rust,no_run
/// use cdo_retry::{Context, Options, Retry};
/// use std::time::Duration;
///
/// # async fn tenant_ready() -> Result<bool, std::io::Error> { Ok(true) }
/// # async fn example() {
/// let result = Retry::new(|| tenant_ready())
///     .with_options(Options::default().with_retries(20))
///     .with_context(Context::new().with_timeout(Duration::from_secs(120)))
///     .await;
/// # }
/// ```
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Retry<A> {
    operation: A,
    options: Options,
    context: Context,
}

impl<A> Retry<A> {
    /// Uses [`Options::default()`] and a context that is never cancelled.
    pub fn new(operation: A) -> Self {
        Self {
            operation,
            options: Options::default(),
            context: Context::new(),
        }
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }
}

impl<A, Fut, O, E> IntoFuture for Retry<A>
where
    A: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = O> + Send + 'static,
    O: IntoOutcome<Error = E> + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    type Output = Result<(), RetryError<E>>;

    // We box the future to avoid complex type signatures in the return.
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send + 'static>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move { run(&self.context, self.operation, &self.options).await })
    }
}

#[cfg(all(test, feature = "tokio-timer"))]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq)]
    struct TestError(String);

    impl fmt::Display for TestError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.0)
        }
    }

    impl std::error::Error for TestError {}

    fn quick() -> Options {
        Options::default()
            .with_timeout(Duration::from_secs(5))
            .with_delay(Duration::from_millis(1))
    }

    #[test]
    fn result_pairs_convert_to_outcomes() {
        assert_eq!(Outcome::<()>::from(Ok(true)), Outcome::Done);
        assert_eq!(Outcome::<()>::from(Ok(false)), Outcome::Pending);
        assert_eq!(Outcome::from(Err::<bool, _>(7)), Outcome::Failed(7));
        assert!(Outcome::<()>::Done.is_terminal());
        assert!(Outcome::Fatal(1).is_terminal());
        assert!(!Outcome::Failed(1).is_terminal());
    }

    #[test]
    fn outcomes_and_result_pairs_share_one_error_type() {
        assert_eq!(Ok::<bool, u8>(false).into_outcome(), Outcome::Pending);
        assert_eq!(Err::<bool, u8>(3).into_outcome(), Outcome::Failed(3));
        assert_eq!(Outcome::Fatal(4u8).into_outcome(), Outcome::Fatal(4));
    }

    #[test]
    fn stop_reason_prefers_cancellation() {
        let ctx = Context::new();
        ctx.cancel();
        let past = Instant::now();
        assert_eq!(
            stop_reason(&ctx, Some(past), Duration::ZERO),
            Some(ErrorKind::ContextCancelled)
        );
    }

    #[test]
    fn stop_reason_rejects_delays_that_overrun_the_deadline() {
        let ctx = Context::new();
        let deadline = Instant::now() + Duration::from_secs(1);
        assert_eq!(stop_reason(&ctx, Some(deadline), Duration::ZERO), None);
        assert_eq!(
            stop_reason(&ctx, Some(deadline), Duration::from_secs(10)),
            Some(ErrorKind::Timeout)
        );
        assert_eq!(stop_reason(&ctx, None, Duration::from_secs(10)), None);
    }

    #[tokio::test]
    async fn succeeds_on_first_try() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let result = run(
            &Context::new(),
            || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok::<bool, TestError>(true) }
            },
            &quick(),
        )
        .await;

        assert_eq!(result, Ok(()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fatal_outcome_ignores_remaining_budget() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let result = run(
            &Context::new(),
            || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Outcome::Fatal(TestError("remote failed".into())) }
            },
            &quick().with_retries(10),
        )
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Aborted);
        assert_eq!(err.into_attempt_error(), Some(TestError("remote failed".into())));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn builder_can_be_awaited() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let result = Retry::new(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Ok::<bool, TestError>(n == 2) }
        })
        .with_options(quick())
        .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
