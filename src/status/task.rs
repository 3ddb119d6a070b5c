// Author: Jacques Murray

//! Long-running FMC tasks.

use serde::{Deserialize, Serialize};

use super::StatusError;
use crate::retry::Outcome;

vocabulary! {
    TaskStatus {
        Pending => "PENDING",
        Running => "RUNNING",
        Success => "SUCCESS",
        Failed => "FAILED",
    }
    else Unknown
}

/// A task as reported by the FMC task-status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    #[serde(default)]
    pub task_type: Option<String>,
    pub status: TaskStatus,
    #[serde(default)]
    pub message: Option<String>,
}

pub fn classify_task(task: &Task) -> Outcome<StatusError> {
    match &task.status {
        TaskStatus::Success => Outcome::Done,
        TaskStatus::Pending | TaskStatus::Running => Outcome::Pending,
        TaskStatus::Failed => Outcome::Fatal(StatusError::TaskFailed {
            task_id: task.id.clone(),
            message: task.message.clone().unwrap_or_default(),
        }),
        TaskStatus::Unknown(status) => Outcome::Fatal(StatusError::UnknownTaskStatus {
            task_id: task.id.clone(),
            status: status.clone(),
        }),
    }
}
