// Author: Jacques Murray

//! The engine's error taxonomy.
//!
//! [`RetryError`] tells "we stopped waiting" ([`ErrorKind::Timeout`],
//! [`ErrorKind::RetriesExceeded`], [`ErrorKind::ContextCancelled`]) apart
//! from "an attempt failed and we gave up on it" ([`ErrorKind::Aborted`]).
//! Attempt errors are never reclassified: they are carried inside the
//! variant, in the order they happened, and can be inspected with
//! [`RetryError::attempt_errors`]. Only an abort has a
//! [`source`](std::error::Error::source): the error that ended the run.

use std::fmt::{self, Write as _};

use thiserror::Error;

/// Which condition ended a [`run`](crate::run).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The local [`Options::timeout`](crate::Options::timeout) budget ran out,
    /// or the next delay would have overrun it.
    Timeout,
    /// The retry budget was spent.
    RetriesExceeded,
    /// The caller's [`Context`](crate::Context) was cancelled or expired.
    ContextCancelled,
    /// An attempt returned an error the engine was told not to retry.
    Aborted,
}

impl ErrorKind {
    /// True for the kinds produced by the engine itself rather than by an
    /// attempt.
    pub fn is_engine_error(self) -> bool {
        !matches!(self, ErrorKind::Aborted)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorKind::Timeout => "timeout",
            ErrorKind::RetriesExceeded => "retries exceeded",
            ErrorKind::ContextCancelled => "context cancelled",
            ErrorKind::Aborted => "aborted",
        })
    }
}

/// Why a [`run`](crate::run) did not succeed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RetryError<E> {
    #[error(
        "operation did not complete within the expected time: timed out after {attempts} attempt(s){}",
        render_errors(.errors)
    )]
    Timeout { attempts: u32, errors: Vec<E> },

    #[error(
        "operation did not complete within the expected time: gave up after {attempts} attempt(s){}",
        render_errors(.errors)
    )]
    RetriesExceeded { attempts: u32, errors: Vec<E> },

    #[error("operation cancelled after {attempts} attempt(s){}", render_errors(.errors))]
    ContextCancelled { attempts: u32, errors: Vec<E> },

    #[error("attempt {attempts} failed: {error}")]
    Aborted {
        attempts: u32,
        #[source]
        error: E,
    },
}

/// Renders accumulated attempt errors as `"; attempt errors: [1] a, [2] b"`.
fn render_errors<E: fmt::Display>(errors: &[E]) -> String {
    let mut out = String::new();
    for (i, error) in errors.iter().enumerate() {
        out.push_str(if i == 0 { "; attempt errors: " } else { ", " });
        // Writing into a String cannot fail.
        let _ = write!(out, "[{}] {}", i + 1, error);
    }
    out
}

impl<E> RetryError<E> {
    pub(crate) fn new(kind: ErrorKind, attempts: u32, mut errors: Vec<E>) -> Self {
        match kind {
            ErrorKind::Timeout => RetryError::Timeout { attempts, errors },
            ErrorKind::RetriesExceeded => RetryError::RetriesExceeded { attempts, errors },
            ErrorKind::ContextCancelled => RetryError::ContextCancelled { attempts, errors },
            ErrorKind::Aborted => match errors.pop() {
                Some(error) => RetryError::Aborted { attempts, error },
                // Aborts are only built from an attempt error.
                None => RetryError::RetriesExceeded { attempts, errors },
            },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            RetryError::Timeout { .. } => ErrorKind::Timeout,
            RetryError::RetriesExceeded { .. } => ErrorKind::RetriesExceeded,
            RetryError::ContextCancelled { .. } => ErrorKind::ContextCancelled,
            RetryError::Aborted { .. } => ErrorKind::Aborted,
        }
    }

    /// True when the engine stopped waiting, as opposed to an attempt
    /// failing outright.
    pub fn is_engine_error(&self) -> bool {
        self.kind().is_engine_error()
    }

    pub fn is_timeout(&self) -> bool {
        self.kind() == ErrorKind::Timeout
    }

    pub fn is_retries_exceeded(&self) -> bool {
        self.kind() == ErrorKind::RetriesExceeded
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind() == ErrorKind::ContextCancelled
    }

    /// Number of times the attempt function was invoked.
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Timeout { attempts, .. }
            | RetryError::RetriesExceeded { attempts, .. }
            | RetryError::ContextCancelled { attempts, .. }
            | RetryError::Aborted { attempts, .. } => *attempts,
        }
    }

    /// Every attempt error carried by this error, oldest first.
    pub fn attempt_errors(&self) -> &[E] {
        match self {
            RetryError::Timeout { errors, .. }
            | RetryError::RetriesExceeded { errors, .. }
            | RetryError::ContextCancelled { errors, .. } => errors,
            RetryError::Aborted { error, .. } => std::slice::from_ref(error),
        }
    }

    pub fn last_attempt_error(&self) -> Option<&E> {
        self.attempt_errors().last()
    }

    /// The error that aborted the run, if one did.
    pub fn into_attempt_error(self) -> Option<E> {
        match self {
            RetryError::Aborted { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn into_attempt_errors(self) -> Vec<E> {
        match self {
            RetryError::Timeout { errors, .. }
            | RetryError::RetriesExceeded { errors, .. }
            | RetryError::ContextCancelled { errors, .. } => errors,
            RetryError::Aborted { error, .. } => vec![error],
        }
    }

    /// Converts the carried attempt errors, keeping kind and count.
    pub fn map_err<F>(self, f: impl FnMut(E) -> F) -> RetryError<F> {
        let kind = self.kind();
        let attempts = self.attempts();
        let errors = self.into_attempt_errors().into_iter().map(f).collect();
        RetryError::new(kind, attempts, errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as StdError;

    #[derive(Debug, Clone, PartialEq)]
    struct TestError(&'static str);

    impl fmt::Display for TestError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.0)
        }
    }

    impl StdError for TestError {}

    #[test]
    fn engine_kinds_are_distinguished_from_aborts() {
        assert!(ErrorKind::Timeout.is_engine_error());
        assert!(ErrorKind::RetriesExceeded.is_engine_error());
        assert!(ErrorKind::ContextCancelled.is_engine_error());
        assert!(!ErrorKind::Aborted.is_engine_error());
    }

    #[test]
    fn accumulated_errors_keep_insertion_order() {
        let err = RetryError::new(
            ErrorKind::RetriesExceeded,
            2,
            vec![TestError("first"), TestError("second")],
        );
        assert!(err.is_retries_exceeded());
        assert_eq!(err.attempt_errors(), &[TestError("first"), TestError("second")]);
        assert_eq!(err.last_attempt_error(), Some(&TestError("second")));
        assert_eq!(
            err.to_string(),
            "operation did not complete within the expected time: gave up after 2 attempt(s); \
             attempt errors: [1] first, [2] second"
        );
    }

    #[test]
    fn only_aborts_have_a_source() {
        let timed_out = RetryError::new(ErrorKind::Timeout, 1, vec![TestError("boom")]);
        assert!(timed_out.source().is_none());
        assert_eq!(
            timed_out.to_string(),
            "operation did not complete within the expected time: timed out after 1 attempt(s); \
             attempt errors: [1] boom"
        );

        let aborted = RetryError::new(ErrorKind::Aborted, 2, vec![TestError("denied")]);
        let source = aborted.source().map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("denied"));

        let bare: RetryError<TestError> = RetryError::new(ErrorKind::ContextCancelled, 0, vec![]);
        assert!(bare.source().is_none());
        assert_eq!(bare.to_string(), "operation cancelled after 0 attempt(s)");
    }

    #[test]
    fn aborted_error_is_returned_verbatim() {
        let err = RetryError::new(ErrorKind::Aborted, 1, vec![TestError("denied")]);
        assert!(!err.is_engine_error());
        assert_eq!(err.to_string(), "attempt 1 failed: denied");
        assert_eq!(err.into_attempt_error(), Some(TestError("denied")));
    }

    #[test]
    fn map_err_preserves_kind() {
        let err = RetryError::new(ErrorKind::Timeout, 3, vec![TestError("a")]);
        let mapped = err.map_err(|e| e.0.len());
        assert!(mapped.is_timeout());
        assert_eq!(mapped.attempts(), 3);
        assert_eq!(mapped.attempt_errors(), &[1]);
    }
}
