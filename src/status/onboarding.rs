// Author: Jacques Murray

//! Device and secure-connector onboarding status.

use std::time::{Duration, Instant};

use super::StatusError;
use crate::retry::Outcome;

/// How long a freshly created resource may be missing from reads before
/// the absence is treated as a failure.
pub const DEFAULT_NOT_FOUND_GRACE: Duration = Duration::from_secs(30);

vocabulary! {
    /// Lifecycle of a device or secure connector being brought under
    /// management.
    OnboardingStatus {
        New => "NEW",
        Onboarding => "ONBOARDING",
        Active => "ACTIVE",
    }
    else Unknown
}

/// The window during which "not found" means "not visible yet".
///
/// Reads against the platform are eventually consistent: a resource that
/// was just created can be missing from the first few reads.
#[derive(Debug, Clone, Copy)]
pub struct NotFoundGrace {
    started: Instant,
    window: Duration,
}

impl NotFoundGrace {
    /// Starts the window now.
    pub fn new(window: Duration) -> Self {
        Self {
            started: Instant::now(),
            window,
        }
    }

    pub fn is_open(&self) -> bool {
        self.started.elapsed() < self.window
    }

    pub fn waited(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Default for NotFoundGrace {
    fn default() -> Self {
        Self::new(DEFAULT_NOT_FOUND_GRACE)
    }
}

/// Classifies one read of `resource`. `None` means the read found nothing.
pub fn classify_onboarding(
    resource: &str,
    observed: Option<&OnboardingStatus>,
    grace: &NotFoundGrace,
) -> Outcome<StatusError> {
    match observed {
        Some(OnboardingStatus::Active) => Outcome::Done,
        Some(OnboardingStatus::New | OnboardingStatus::Onboarding) => Outcome::Pending,
        Some(status @ OnboardingStatus::Unknown(_)) => {
            Outcome::Fatal(StatusError::OnboardingFailed {
                resource: resource.to_owned(),
                status: status.clone(),
            })
        }
        None if grace.is_open() => Outcome::Pending,
        None => Outcome::Fatal(StatusError::NotFound {
            resource: resource.to_owned(),
            waited: grace.waited(),
        }),
    }
}
