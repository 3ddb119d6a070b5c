// Author: Jacques Murray

//! Trigger an operation, then poll its transaction to a terminal status.

use std::fmt;
use std::future::Future;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use thiserror::Error;

use super::{Transaction, TransactionFailure};
use crate::context::Context;
use crate::error::RetryError;
use crate::options::Options;
use crate::retry::{run, Outcome};
use crate::status::{classify_transaction, StatusError};
use crate::wait::{observe, PollError};

/// Reads a transaction from its polling URL.
///
/// Whatever the implementation returns as an error is treated as an
/// ordinary attempt failure. Request timeouts belong to the implementation:
/// the engine cannot interrupt a read that never returns.
#[async_trait]
pub trait TransactionTransport: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn fetch(&self, polling_url: &str) -> Result<Transaction, Self::Error>;
}

/// Why a triggered operation did not complete.
#[derive(Debug, Error)]
pub enum TransactionError<E> {
    /// Submitting the operation failed; nothing was polled.
    #[error("failed to submit operation: {0}")]
    Trigger(#[source] E),

    #[error("transaction {transaction_uid} has no polling url")]
    MissingPollingUrl { transaction_uid: String },

    /// The remote system reported `ERROR`.
    #[error(transparent)]
    Failed(TransactionFailure),

    /// The remote system reported something this crate does not recognise.
    #[error(transparent)]
    Status(StatusError),

    /// A poll failed and the options said not to retry it.
    #[error("failed to read transaction status: {0}")]
    Transport(#[source] E),

    /// We stopped waiting: timeout, retry budget, or cancellation.
    #[error("transaction {transaction_uid} did not finish: {source}")]
    Incomplete {
        transaction_uid: String,
        source: RetryError<PollError<E>>,
    },
}

impl<E> TransactionError<E> {
    /// True when the remote system said the operation failed, as opposed to
    /// us giving up on it.
    pub fn is_remote_failure(&self) -> bool {
        matches!(self, TransactionError::Failed(_))
    }

    /// True when polling stopped without a terminal status.
    pub fn is_incomplete(&self) -> bool {
        matches!(self, TransactionError::Incomplete { .. })
    }

    pub fn remote_failure(&self) -> Option<&TransactionFailure> {
        match self {
            TransactionError::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    fn from_status(status: StatusError) -> Self {
        match status {
            StatusError::TransactionFailed(failure) => TransactionError::Failed(failure),
            other => TransactionError::Status(other),
        }
    }

    fn from_poll(transaction_uid: &str, err: RetryError<PollError<E>>) -> Self {
        match err {
            RetryError::Aborted {
                error: PollError::Status(status),
                ..
            } => Self::from_status(status),
            RetryError::Aborted {
                error: PollError::Read(e),
                ..
            } => TransactionError::Transport(e),
            engine => TransactionError::Incomplete {
                transaction_uid: transaction_uid.to_owned(),
                source: engine,
            },
        }
    }
}

/// Triggers operations and polls their transactions.
///
/// ```rust,no_run
/// use cdo_retry::transaction::{Transaction, TransactionPoller, TransactionTransport};
/// use cdo_retry::{Context, Options};
/// use std::time::Duration;
///
/// # async fn example<T: TransactionTransport>(transport: T, submit: impl std::future::Future<Output = Result<Transaction, T::Error>>) {
/// let poller = TransactionPoller::new(transport);
/// let opts = Options::default().with_delay(Duration::from_secs(1));
///
/// match poller.trigger_and_wait(&Context::new(), submit, &opts).await {
///     Ok(tx) => println!("entity {} is ready", tx.entity_uid),
///     Err(e) if e.is_remote_failure() => println!("platform rejected it: {}", e),
///     Err(e) => println!("try again later: {}", e),
/// }
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct TransactionPoller<T> {
    transport: T,
}

impl<T: TransactionTransport> TransactionPoller<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Awaits the submitting call and checks the transaction it returns.
    ///
    /// Submission errors are returned immediately; retrying a submission
    /// is the transport's business. A transaction that already reports
    /// `ERROR` fails here without being polled. One that is already `DONE`
    /// needs no polling URL.
    pub async fn trigger<F>(&self, submit: F) -> Result<Transaction, TransactionError<T::Error>>
    where
        F: Future<Output = Result<Transaction, T::Error>>,
    {
        let transaction = submit.await.map_err(TransactionError::Trigger)?;

        if transaction.is_error() {
            return Err(TransactionError::Failed(TransactionFailure::from_transaction(
                &transaction,
            )));
        }
        if !transaction.is_done() && transaction.polling_url.is_empty() {
            return Err(TransactionError::MissingPollingUrl {
                transaction_uid: transaction.uid,
            });
        }
        Ok(transaction)
    }

    /// Polls `transaction` until it is `DONE` and returns the last read.
    ///
    /// A transaction that is already terminal is not polled.
    pub async fn poll_until_terminal(
        &self,
        ctx: &Context,
        transaction: Transaction,
        opts: &Options,
    ) -> Result<Transaction, TransactionError<T::Error>> {
        match classify_transaction(&transaction) {
            Outcome::Done => return Ok(transaction),
            Outcome::Fatal(status) => return Err(TransactionError::from_status(status)),
            Outcome::Pending | Outcome::Failed(_) => {}
        }
        if transaction.polling_url.is_empty() {
            return Err(TransactionError::MissingPollingUrl {
                transaction_uid: transaction.uid,
            });
        }

        let uid = transaction.uid.clone();
        let polling_url = transaction.polling_url.clone();
        opts.logger()
            .log(format_args!("polling transaction {} at {}", uid, polling_url));

        let latest = Mutex::new(transaction);
        let result = {
            let transport = &self.transport;
            let url = polling_url.as_str();
            let latest = &latest;
            run(
                ctx,
                move || async move {
                    let read = transport.fetch(url).await;
                    if let Ok(tx) = &read {
                        *latest.lock().unwrap_or_else(PoisonError::into_inner) = tx.clone();
                    }
                    observe(read, classify_transaction)
                },
                opts,
            )
            .await
        };

        let latest = latest.into_inner().unwrap_or_else(PoisonError::into_inner);
        match result {
            Ok(()) => Ok(latest),
            Err(err) => Err(TransactionError::from_poll(&uid, err)),
        }
    }

    /// [`trigger`](Self::trigger) followed by
    /// [`poll_until_terminal`](Self::poll_until_terminal).
    pub async fn trigger_and_wait<F>(
        &self,
        ctx: &Context,
        submit: F,
        opts: &Options,
    ) -> Result<Transaction, TransactionError<T::Error>>
    where
        F: Future<Output = Result<Transaction, T::Error>>,
    {
        let transaction = self.trigger(submit).await?;
        opts.logger().log(format_args!(
            "transaction {} submitted ({})",
            transaction.uid,
            transaction.transaction_type.as_deref().unwrap_or("unknown type")
        ));
        self.poll_until_terminal(ctx, transaction, opts).await
    }
}

impl<E: fmt::Display> TransactionError<E> {
    /// A one-line message suitable for showing to a user.
    pub fn user_message(&self) -> String {
        match self {
            TransactionError::Incomplete { .. } => format!(
                "{}; the operation may still complete, retry the command later",
                self
            ),
            _ => self.to_string(),
        }
    }
}
