// Author: Jacques Murray

//! # cdo-retry
//!
//! Waits for asynchronous remote operations to converge.
//!
//! Many platform operations (device onboarding, tenant creation, user
//! provisioning) are "submit now, converge later": the call returns at once
//! and the real outcome has to be polled for. This crate provides the
//! polling engine and the pieces built on it.
//!
//! ## Goals
//!
//! * One engine, [`run`], that reconciles two independent time authorities
//!   (the caller's [`Context`] and the local [`Options::timeout`]), bounds
//!   the number of attempts, and never sleeps past either deadline.
//! * A small error taxonomy ([`RetryError`], [`ErrorKind`]) that separates
//!   "we stopped waiting" from "the remote side failed".
//! * Classifiers for each remote status vocabulary ([`status`]) that fail
//!   closed on values they do not recognise.
//! * A [`TransactionPoller`](transaction::TransactionPoller) for the
//!   platform's generic transaction pattern.
//! * Runtime-agnostic (supports Tokio and async-std via feature flags).
//!
//! ## Quick Start
//!
//! **Note:** You *must* enable a timer feature for this crate:
//! `features = ["tokio-timer"]` (the default) or
//! `features = ["async-std-timer"]`.
//!
//! ### Example: wait for a flag to flip
//!
//! ```rust,no_run
//! use cdo_retry::{run, Context, Options};
//! use std::time::Duration;
//!
//! // A mock read that reports whether the tenant is ready.
//! async fn tenant_ready() -> Result<bool, std::io::Error> {
//!     Ok(true)
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let opts = Options::default()
//!         .with_timeout(Duration::from_secs(60))
//!         .with_delay(Duration::from_secs(2))
//!         .with_retries(20);
//!
//!     match run(&Context::new(), || tenant_ready(), &opts).await {
//!         Ok(()) => println!("tenant is ready"),
//!         Err(e) if e.is_engine_error() => println!("gave up waiting: {}", e),
//!         Err(e) => println!("read failed: {}", e),
//!     }
//! }
//! ```
//!
//! ### Example: classify a remote status
//!
//! ```rust,no_run
//! use cdo_retry::status::{classify_task, Task};
//! use cdo_retry::{run, Context, Options};
//!
//! # async fn read_task() -> Task { unimplemented!() }
//! # async fn example() {
//! let result = run(
//!     &Context::new(),
//!     || async { classify_task(&read_task().await) },
//!     &Options::default(),
//! )
//! .await;
//!
//! if let Err(e) = result {
//!     if e.is_engine_error() {
//!         println!("task did not finish in time");
//!     } else {
//!         println!("task failed: {}", e);
//!     }
//! }
//! # }
//! ```

pub mod context;
pub mod error;
pub mod options;
pub mod retry;
mod sleep;
pub mod status;
pub mod transaction;
pub mod wait;

// Public re-exports for easier use
pub use context::Context;
pub use error::{ErrorKind, RetryError};
pub use options::{LogFacade, Logger, NoopLogger, Options};
pub use retry::{run, IntoOutcome, Outcome, Retry};
pub use status::StatusError;
pub use transaction::{Transaction, TransactionError, TransactionPoller, TransactionStatus};
pub use wait::PollError;

/// Re-exported so callers can share a token with other shutdown logic.
pub use tokio_util::sync::CancellationToken;
