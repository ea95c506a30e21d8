//! Append-only audit records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Kind of journal record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalEvent {
    RunStarted,
    StepSucceeded,
    StepFailed,
    RollbackSucceeded,
    RollbackFailed,
    RunFailed,
    RunCompleted,
}

impl JournalEvent {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RunStarted => "run_started",
            Self::StepSucceeded => "step_succeeded",
            Self::StepFailed => "step_failed",
            Self::RollbackSucceeded => "rollback_succeeded",
            Self::RollbackFailed => "rollback_failed",
            Self::RunFailed => "run_failed",
            Self::RunCompleted => "run_completed",
        }
    }
}

impl fmt::Display for JournalEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One fact about a run. Written once, never changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    pub run_id: Uuid,
    pub timestamp_utc: DateTime<Utc>,
    pub event_type: JournalEvent,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
}

impl JournalEntry {
    /// Run-level entry stamped with the current time.
    pub fn new(run_id: Uuid, event_type: JournalEvent, message: impl Into<String>) -> Self {
        Self {
            run_id,
            timestamp_utc: Utc::now(),
            event_type,
            message: message.into(),
            step_id: None,
        }
    }

    /// Attach the step the entry is about.
    pub fn for_step(mut self, step_id: impl Into<String>) -> Self {
        self.step_id = Some(step_id.into());
        self
    }
}
