use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::thread::{Message, ThreadStatus};

/// Reserved key under which the requested permission/resource is stored
pub const REQUESTED_ACCESS_KEY: &str = "Requested Access";

/// Audit action recorded for every processed inbound message
pub const PROCESS_MESSAGE_ACTION: &str = "process_message";

/// Final verdict on an access request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Outcome {
    Approved,
    Rejected,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Approved => "Approved",
            Outcome::Rejected => "Rejected",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Outcome {
    type Err = String;

    /// Exact, case-sensitive match; no coercion of near misses
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Approved" => Ok(Outcome::Approved),
            "Rejected" => Ok(Outcome::Rejected),
            other => Err(format!("Unknown outcome: {}", other)),
        }
    }
}

/// The single decision record kept per conversation thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Decision {
    pub thread_id: String,
    pub request_type: String,
    pub extracted_fields: BTreeMap<String, String>,
    pub missing_fields: Vec<String>,
    /// Snapshot of the schema the extraction ran against
    pub mandatory_fields: Vec<String>,
    pub outcome: Option<Outcome>,
    pub rationale: Option<String>,
    pub risk_score: Option<u8>,
    pub confidence_score: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Values written by one turn into the thread's decision record
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionUpdate {
    pub request_type: String,
    pub extracted_fields: BTreeMap<String, String>,
    pub missing_fields: Vec<String>,
    pub mandatory_fields: Vec<String>,
    pub outcome: Option<Outcome>,
    pub rationale: Option<String>,
    pub risk_score: Option<u8>,
    pub confidence_score: Option<f64>,
}

impl Decision {
    /// Find-or-create: merge a turn's update into the existing record, if any
    ///
    /// Every storage backend goes through this so the per-thread record keeps
    /// its original `created_at` and the first `resolved_at`.
    pub fn apply_update(
        thread_id: &str,
        existing: Option<Decision>,
        update: DecisionUpdate,
        now: DateTime<Utc>,
    ) -> Decision {
        let (created_at, previous_resolved_at) = match existing {
            Some(d) => (d.created_at, d.resolved_at),
            None => (now, None),
        };

        let resolved_at = match (previous_resolved_at, update.outcome) {
            (Some(first), _) => Some(first),
            (None, Some(_)) => Some(now),
            (None, None) => None,
        };

        Decision {
            thread_id: thread_id.to_string(),
            request_type: update.request_type,
            extracted_fields: update.extracted_fields,
            missing_fields: update.missing_fields,
            mandatory_fields: update.mandatory_fields,
            outcome: update.outcome,
            rationale: update.rationale,
            risk_score: update.risk_score,
            confidence_score: update.confidence_score,
            created_at,
            resolved_at,
        }
    }
}

/// Append-only trace of one processed message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AuditLogEntry {
    pub thread_id: String,
    pub action: String,
    pub input_data: serde_json::Value,
    pub output_data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

/// Everything a successful turn persists, committed atomically
#[derive(Debug, Clone)]
pub struct TurnCommit {
    pub thread_id: String,
    /// New messages in order: the inbound user message, then any follow-up
    pub messages: Vec<Message>,
    pub decision: DecisionUpdate,
    pub audit: AuditLogEntry,
    pub status: ThreadStatus,
    pub committed_at: DateTime<Utc>,
}

/// Result of processing one inbound message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TurnOutcome {
    pub request_type: String,
    pub risk_score: Option<u8>,
    pub confidence_score: Option<f64>,
    pub missing_fields: Vec<String>,
    pub next_question: Option<String>,
    pub final_decision: Option<Outcome>,
    pub rationale: Option<String>,
}
