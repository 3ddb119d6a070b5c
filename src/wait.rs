// Author: Jacques Murray

//! "Wait until the remote resource reaches a terminal status."
//!
//! Each helper here pairs a caller-supplied read with one classifier from
//! [`status`](crate::status) and hands the pair to [`run`]. The read is
//! whatever the caller's transport does; its errors are ordinary attempt
//! failures, retried or returned per [`Options::early_exit_on_error`],
//! while classifier failures always stop the run.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use crate::context::Context;
use crate::error::RetryError;
use crate::options::Options;
use crate::retry::{run, Outcome};
use crate::status::{
    classify_onboarding, classify_state_machine, classify_task, select_current_instance,
    NotFoundGrace, OnboardingStatus, StateMachineInstance, StatusError, Task,
};

/// Why a single poll did not produce a usable observation.
#[derive(Debug, Error)]
pub enum PollError<E> {
    /// The read itself failed.
    #[error("failed to read remote status: {0}")]
    Read(#[source] E),

    /// The remote system reported a terminal failure.
    #[error(transparent)]
    Status(#[from] StatusError),
}

impl<E> PollError<E> {
    pub fn status(&self) -> Option<&StatusError> {
        match self {
            PollError::Status(status) => Some(status),
            PollError::Read(_) => None,
        }
    }
}

/// Turns one read into an engine outcome.
pub(crate) fn observe<T, E>(
    read: Result<T, E>,
    classify: impl FnOnce(&T) -> Outcome<StatusError>,
) -> Outcome<PollError<E>> {
    match read {
        Ok(observed) => classify(&observed).map_err(PollError::Status),
        Err(e) => Outcome::Failed(PollError::Read(e)),
    }
}

/// Waits until a device or secure connector reports `ACTIVE`.
///
/// `read` returns `Ok(None)` when the resource is not found. That is
/// tolerated for `not_found_grace` from the start of the call, since a
/// just-created resource can take a moment to show up. Pass
/// [`DEFAULT_NOT_FOUND_GRACE`](crate::status::onboarding::DEFAULT_NOT_FOUND_GRACE)
/// when in doubt.
pub async fn until_onboarded<R, Fut, E>(
    ctx: &Context,
    resource: &str,
    mut read: R,
    not_found_grace: Duration,
    opts: &Options,
) -> Result<(), RetryError<PollError<E>>>
where
    R: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<OnboardingStatus>, E>>,
    E: std::fmt::Display,
{
    let grace = NotFoundGrace::new(not_found_grace);
    let grace = &grace;
    run(
        ctx,
        move || {
            let pending = read();
            async move {
                observe(pending.await, |status| {
                    classify_onboarding(resource, status.as_ref(), grace)
                })
            }
        },
        opts,
    )
    .await
}

/// Waits until a device's current state machine reaches `DONE`.
///
/// `read` returns the instances the platform reports as current. An empty
/// read means the state machine has not started yet and is polled again.
pub async fn until_state_machine_done<R, Fut, E>(
    ctx: &Context,
    mut read: R,
    opts: &Options,
) -> Result<(), RetryError<PollError<E>>>
where
    R: FnMut() -> Fut,
    Fut: Future<Output = Result<Vec<StateMachineInstance>, E>>,
    E: std::fmt::Display,
{
    let logger = opts.logger();
    run(
        ctx,
        move || {
            let pending = read();
            async move {
                match pending.await {
                    Ok(instances) => match select_current_instance(instances, logger) {
                        Some(current) => classify_state_machine(&current).map_err(PollError::Status),
                        None => Outcome::Pending,
                    },
                    Err(e) => Outcome::Failed(PollError::Read(e)),
                }
            }
        },
        opts,
    )
    .await
}

/// Waits until an FMC task reports `SUCCESS`.
pub async fn until_task_succeeded<R, Fut, E>(
    ctx: &Context,
    mut read: R,
    opts: &Options,
) -> Result<(), RetryError<PollError<E>>>
where
    R: FnMut() -> Fut,
    Fut: Future<Output = Result<Task, E>>,
    E: std::fmt::Display,
{
    run(
        ctx,
        move || {
            let pending = read();
            async move { observe(pending.await, classify_task) }
        },
        opts,
    )
    .await
}
