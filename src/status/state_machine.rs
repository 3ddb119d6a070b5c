// Author: Jacques Murray

//! State-machine instances, the older device-onboarding status object.

use serde::{Deserialize, Serialize};

use super::StatusError;
use crate::options::Logger;
use crate::retry::Outcome;

vocabulary! {
    /// The `currentState` of a state-machine instance.
    StateMachineState {
        Done => "DONE",
        Error => "ERROR",
        BadCredentials => "BAD_CREDENTIALS",
    }
    else
    /// Any intermediate state. The platform has many and adds more, so
    /// these are treated as still running.
    InProgress
}

impl StateMachineState {
    pub fn is_failure(&self) -> bool {
        matches!(self, StateMachineState::Error | StateMachineState::BadCredentials)
    }
}

/// The error the platform attached to a state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateMachineError {
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub error_message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateMachineDetails {
    #[serde(default)]
    pub current_data_requirements: Option<String>,
    #[serde(default)]
    pub last_error: Option<StateMachineError>,
}

/// One instance of a device's state machine, as read from the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateMachineInstance {
    #[serde(default)]
    pub object_reference: Option<String>,
    pub state_machine_identifier: String,
    #[serde(default)]
    pub state_machine_type: Option<String>,
    pub current_state: StateMachineState,
    /// Milliseconds since the epoch.
    #[serde(default)]
    pub last_active_date: Option<i64>,
    #[serde(default)]
    pub last_error: Option<StateMachineError>,
    #[serde(default)]
    pub state_machine_details: Option<StateMachineDetails>,
}

impl StateMachineInstance {
    /// The most specific error message available, if any.
    pub fn error_message(&self) -> Option<&str> {
        self.last_error
            .as_ref()
            .or_else(|| {
                self.state_machine_details
                    .as_ref()
                    .and_then(|details| details.last_error.as_ref())
            })
            .map(|error| error.error_message.as_str())
            .filter(|message| !message.is_empty())
    }
}

/// Classifies one read of a state-machine instance.
pub fn classify_state_machine(instance: &StateMachineInstance) -> Outcome<StatusError> {
    match &instance.current_state {
        StateMachineState::Done => Outcome::Done,
        state if state.is_failure() => Outcome::Fatal(StatusError::StateMachineFailed {
            identifier: instance.state_machine_identifier.clone(),
            state: state.clone(),
            message: instance
                .error_message()
                .unwrap_or("no error message reported")
                .to_owned(),
        }),
        _ => Outcome::Pending,
    }
}

/// Picks the instance to classify from a "current instance" read.
///
/// The platform can report more than one current instance even when asked
/// for one. When that happens the most recently active instance wins,
/// ties going to the earliest in the response, and the choice is logged.
/// Instances without a `lastActiveDate` rank below any that have one.
pub fn select_current_instance(
    instances: Vec<StateMachineInstance>,
    logger: &dyn Logger,
) -> Option<StateMachineInstance> {
    let count = instances.len();
    let chosen = instances.into_iter().reduce(|best, next| {
        if next.last_active_date > best.last_active_date {
            next
        } else {
            best
        }
    })?;

    if count > 1 {
        logger.log(format_args!(
            "{} current state machine instances reported; using {} (state {}, last active {:?})",
            count, chosen.state_machine_identifier, chosen.current_state, chosen.last_active_date
        ));
    }
    Some(chosen)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::NoopLogger;
    use std::fmt;
    use std::sync::{Arc, Mutex};

    fn instance(id: &str, state: &str, last_active: Option<i64>) -> StateMachineInstance {
        StateMachineInstance {
            object_reference: None,
            state_machine_identifier: id.to_owned(),
            state_machine_type: None,
            current_state: StateMachineState::from(state),
            last_active_date: last_active,
            last_error: None,
            state_machine_details: None,
        }
    }

    #[test]
    fn done_is_done() {
        assert_eq!(classify_state_machine(&instance("sm", "DONE", None)), Outcome::Done);
    }

    #[test]
    fn intermediate_states_keep_polling() {
        let outcome = classify_state_machine(&instance("sm", "PENDING_READ_CONFIG", None));
        assert_eq!(outcome, Outcome::Pending);
    }

    #[test]
    fn bad_credentials_is_fatal() {
        let outcome = classify_state_machine(&instance("sm", "BAD_CREDENTIALS", None));
        match outcome {
            Outcome::Fatal(StatusError::StateMachineFailed { state, message, .. }) => {
                assert_eq!(state, StateMachineState::BadCredentials);
                assert_eq!(message, "no error message reported");
            }
            other => panic!("expected fatal, got {:?}", other),
        }
    }

    #[test]
    fn error_message_falls_back_to_details() {
        let mut failed = instance("sm", "ERROR", None);
        failed.state_machine_details = Some(StateMachineDetails {
            current_data_requirements: None,
            last_error: Some(StateMachineError {
                error_code: Some("E42".into()),
                error_message: "unreachable host".into(),
            }),
        });

        let err = match classify_state_machine(&failed) {
            Outcome::Fatal(err) => err,
            other => panic!("expected fatal, got {:?}", other),
        };
        assert_eq!(err.to_string(), "state machine sm ended in state ERROR: unreachable host");
    }

    #[test]
    fn empty_read_selects_nothing() {
        assert_eq!(select_current_instance(Vec::new(), &NoopLogger), None);
    }

    #[test]
    fn most_recent_instance_wins_and_is_logged() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&lines);
        let logger = move |args: fmt::Arguments<'_>| sink.lock().unwrap().push(args.to_string());

        let chosen = select_current_instance(
            vec![
                instance("old", "DONE", Some(100)),
                instance("new", "ERROR", Some(200)),
                instance("undated", "DONE", None),
            ],
            &logger,
        )
        .unwrap();

        assert_eq!(chosen.state_machine_identifier, "new");
        assert_eq!(lines.lock().unwrap().len(), 1);
    }

    #[test]
    fn ties_go_to_the_first_instance() {
        let chosen = select_current_instance(
            vec![instance("a", "DONE", Some(5)), instance("b", "DONE", Some(5))],
            &NoopLogger,
        )
        .unwrap();
        assert_eq!(chosen.state_machine_identifier, "a");
    }

    #[test]
    fn deserializes_platform_json() {
        let json = r#"{
            "stateMachineIdentifier": "fmceDeviceOnboardingStateMachine",
            "currentState": "BAD_CREDENTIALS",
            "lastActiveDate": 1700000000000,
            "lastError": { "errorMessage": "login failed" }
        }"#;
        let parsed: StateMachineInstance = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.current_state, StateMachineState::BadCredentials);
        assert_eq!(parsed.error_message(), Some("login failed"));
    }
}
