use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Lifecycle of a conversation thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ThreadStatus {
    /// No turn has been processed yet
    #[default]
    Intake,
    /// The latest turn left mandatory fields unanswered
    InfoRequested,
    /// An outcome is persisted for the thread
    Decided,
}

impl ThreadStatus {
    /// Status after a successfully committed turn
    ///
    /// Any turn that still has missing fields moves the thread (back) to
    /// `InfoRequested`; a turn without missing fields always ends `Decided`.
    pub fn after_turn(self, has_missing_fields: bool) -> ThreadStatus {
        if has_missing_fields {
            ThreadStatus::InfoRequested
        } else {
            ThreadStatus::Decided
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ThreadStatus::Intake => "intake",
            ThreadStatus::InfoRequested => "info_requested",
            ThreadStatus::Decided => "decided",
        }
    }
}

impl fmt::Display for ThreadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThreadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "intake" => Ok(ThreadStatus::Intake),
            "info_requested" => Ok(ThreadStatus::InfoRequested),
            "decided" => Ok(ThreadStatus::Decided),
            other => Err(format!("Unknown thread status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "system" => Ok(Role::System),
            other => Err(format!("Unknown message role: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Thread {
    pub thread_id: String,
    pub status: ThreadStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Thread {
    pub fn new(thread_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            thread_id: thread_id.into(),
            status: ThreadStatus::Intake,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Message {
    pub thread_id: String,
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn user(thread_id: &str, text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            thread_id: thread_id.to_string(),
            role: Role::User,
            text: text.into(),
            timestamp,
        }
    }

    pub fn system(thread_id: &str, text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            thread_id: thread_id.to_string(),
            role: Role::System,
            text: text.into(),
            timestamp,
        }
    }
}

/// Render messages as the model-facing transcript, one `role: text` per line
///
/// Callers pass messages in timestamp order.
pub fn build_transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role, m.text))
        .collect::<Vec<_>>()
        .join("\n")
}
