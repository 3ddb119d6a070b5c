// Author: Jacques Murray

//! Per-invocation engine settings and the injected logging sink.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default wall-clock budget for a single [`run`](crate::run).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3 * 60);

/// Default fixed pause between attempts.
pub const DEFAULT_DELAY: Duration = Duration::from_secs(3);

/// A logging sink handed to the engine for one invocation.
///
/// Implemented for [`LogFacade`], [`NoopLogger`], and any
/// `Fn(fmt::Arguments<'_>)` closure, which makes it easy to capture
/// engine output in tests.
pub trait Logger: Send + Sync {
    fn log(&self, args: fmt::Arguments<'_>);
}

impl<F> Logger for F
where
    F: Fn(fmt::Arguments<'_>) + Send + Sync,
{
    fn log(&self, args: fmt::Arguments<'_>) {
        self(args)
    }
}

/// Forwards to the `log` crate at debug level.
///
/// Without the `logging` feature this discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogFacade;

impl Logger for LogFacade {
    #[allow(unused_variables)]
    fn log(&self, args: fmt::Arguments<'_>) {
        #[cfg(feature = "logging")]
        log::debug!(target: "cdo_retry", "{}", args);
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn log(&self, _: fmt::Arguments<'_>) {}
}

/// Settings for one engine invocation.
///
/// Built with the `with_*` methods, starting from [`Options::default()`]:
///
/// ```rust
/// use cdo_retry::Options;
/// use std::time::Duration;
///
/// let opts = Options::default()
///     .with_timeout(Duration::from_secs(30))
///     .with_delay(Duration::from_secs(1))
///     .with_retries(10)
///     .with_early_exit_on_error(true);
///
/// assert_eq!(opts.max_retries(), Some(10));
/// ```
#[derive(Clone)]
pub struct Options {
    timeout: Duration,
    delay: Duration,
    max_retries: Option<u32>,
    early_exit_on_error: bool,
    #[cfg(feature = "jitter")]
    jitter: bool,
    logger: Arc<dyn Logger>,
}

impl Default for Options {
    /// Three minute timeout, three second delay, unlimited retries, and
    /// attempt errors accumulated rather than returned early.
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            delay: DEFAULT_DELAY,
            max_retries: None,
            early_exit_on_error: false,
            #[cfg(feature = "jitter")]
            jitter: false,
            logger: Arc::new(LogFacade),
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Options");
        s.field("timeout", &self.timeout)
            .field("delay", &self.delay)
            .field("max_retries", &self.max_retries)
            .field("early_exit_on_error", &self.early_exit_on_error);
        #[cfg(feature = "jitter")]
        {
            s.field("jitter", &self.jitter);
        }
        s.finish_non_exhaustive()
    }
}

impl Options {
    /// Builds options in one go. `max_retries` of `None` means unlimited,
    /// in which case `timeout` is the only thing that stops the engine.
    pub fn new(
        timeout: Duration,
        delay: Duration,
        max_retries: Option<u32>,
        early_exit_on_error: bool,
    ) -> Self {
        Self {
            timeout,
            delay,
            max_retries,
            early_exit_on_error,
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Caps retries after the initial attempt. `0` means exactly one
    /// attempt is ever made.
    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn with_unlimited_retries(mut self) -> Self {
        self.max_retries = None;
        self
    }

    /// When set, the first attempt error is returned as-is instead of
    /// being accumulated and retried.
    pub fn with_early_exit_on_error(mut self, early_exit: bool) -> Self {
        self.early_exit_on_error = early_exit;
        self
    }

    pub fn with_logger(mut self, logger: impl Logger + 'static) -> Self {
        self.logger = Arc::new(logger);
        self
    }

    /// Shares one sink between several option sets.
    pub fn with_shared_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    /// Randomizes each delay within `[delay / 2, delay]`.
    ///
    /// Useful when many resources are polled at once. The randomized delay
    /// never exceeds the configured one, so deadline checks still hold.
    #[cfg(feature = "jitter")]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn max_retries(&self) -> Option<u32> {
        self.max_retries
    }

    pub fn early_exit_on_error(&self) -> bool {
        self.early_exit_on_error
    }

    pub fn logger(&self) -> &dyn Logger {
        self.logger.as_ref()
    }

    /// True once `retries` retries (not counting the initial attempt)
    /// have been spent.
    pub(crate) fn max_retries_reached(&self, retries: u32) -> bool {
        self.max_retries.is_some_and(|max| retries >= max)
    }

    /// The pause before the next attempt.
    pub(crate) fn next_delay(&self) -> Duration {
        #[cfg(feature = "jitter")]
        {
            if self.jitter && !self.delay.is_zero() {
                use rand::Rng;
                let max = self.delay.as_millis() as u64;
                let millis = rand::thread_rng().gen_range(max / 2..=max);
                return Duration::from_millis(millis);
            }
        }
        self.delay
    }
}
