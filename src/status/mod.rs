// Author: Jacques Murray

//! Remote status vocabularies and their classifiers.
//!
//! Each remote resource family reports progress in its own words. Every
//! vocabulary here is a closed enum with a catch-all for values this crate
//! does not recognise, and every classifier maps an observation to an
//! [`Outcome`](crate::Outcome):
//!
//! | Vocabulary | Done | Pending | Fatal |
//! |---|---|---|---|
//! | [`OnboardingStatus`] | `ACTIVE` | `NEW`, `ONBOARDING`, not found (within grace) | anything else |
//! | [`StateMachineState`] | `DONE` | any other state | `ERROR`, `BAD_CREDENTIALS` |
//! | [`TransactionStatus`] | `DONE` | `PENDING`, `IN_PROGRESS` | `ERROR`, anything else |
//! | [`TaskStatus`] | `SUCCESS` | `PENDING`, `RUNNING` | `FAILED`, anything else |
//!
//! Unrecognised values fail closed so that a new platform status cannot
//! cause silent, endless polling. State machines are the exception: their
//! intermediate state names are open-ended, so only the named failure
//! states are fatal.
//!
//! [`TransactionStatus`]: crate::transaction::TransactionStatus

use std::time::Duration;

use thiserror::Error;

use crate::transaction::TransactionFailure;

/// Declares a status vocabulary: wire strings map to variants, and any
/// other string lands in the fallback variant.
macro_rules! vocabulary {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($(#[$vmeta:meta])* $variant:ident => $wire:literal,)+
        }
        else $(#[$fmeta:meta])* $fallback:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, ::serde::Serialize, ::serde::Deserialize)]
        #[serde(from = "String", into = "String")]
        pub enum $name {
            $($(#[$vmeta])* $variant,)+
            $(#[$fmeta])*
            $fallback(String),
        }

        impl $name {
            /// The value as the platform spells it.
            pub fn as_str(&self) -> &str {
                match self {
                    $($name::$variant => $wire,)+
                    $name::$fallback(other) => other,
                }
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                match value {
                    $($wire => $name::$variant,)+
                    other => $name::$fallback(other.to_owned()),
                }
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                $name::from(value.as_str())
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.as_str().to_owned()
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

pub(crate) use vocabulary;

pub mod onboarding;
pub mod state_machine;
pub mod task;
pub mod transaction;

pub use onboarding::{classify_onboarding, NotFoundGrace, OnboardingStatus};
pub use state_machine::{
    classify_state_machine, select_current_instance, StateMachineInstance, StateMachineState,
};
pub use task::{classify_task, Task, TaskStatus};
pub use transaction::classify_transaction;

/// A terminal failure reported (or implied) by the remote system.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatusError {
    #[error("{resource} was still not visible after {waited:?}")]
    NotFound { resource: String, waited: Duration },

    #[error("{resource} has unexpected onboarding status {status}")]
    OnboardingFailed {
        resource: String,
        status: OnboardingStatus,
    },

    #[error("state machine {identifier} ended in state {state}: {message}")]
    StateMachineFailed {
        identifier: String,
        state: StateMachineState,
        message: String,
    },

    #[error(transparent)]
    TransactionFailed(#[from] TransactionFailure),

    #[error("task {task_id} failed: {message}")]
    TaskFailed { task_id: String, message: String },

    #[error("task {task_id} has unknown status {status:?}")]
    UnknownTaskStatus { task_id: String, status: String },

    #[error("unknown {vocabulary} status {status:?}")]
    UnknownStatus {
        vocabulary: &'static str,
        status: String,
    },
}
