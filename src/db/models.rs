//! Database row models and their conversion to domain types

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::model::{
    AuditLogEntry, Decision, HistoricalTicket, Message, Thread, TicketMetadata,
};

/// Database representation of a historical ticket
#[derive(Debug, Clone, FromRow)]
pub struct HistoricalTicketRow {
    pub ticket_id: String,
    pub request_type: String,
    pub request_summary: String,
    pub details: String,
    pub mandatory_fields: serde_json::Value,
    pub fields_provided: serde_json::Value,
    pub outcome: String,
    pub security_risk_score: i32,
    pub embedding: serde_json::Value,
    pub created_at: Option<DateTime<Utc>>,
    pub requester_department: Option<String>,
    pub requester_title: Option<String>,
}

impl HistoricalTicketRow {
    /// Convert database row to domain model
    pub fn into_domain(self) -> Result<HistoricalTicket, String> {
        let mandatory_fields: Vec<String> = serde_json::from_value(self.mandatory_fields)
            .map_err(|e| format!("Invalid mandatory_fields on {}: {}", self.ticket_id, e))?;
        let fields_provided: Vec<String> = serde_json::from_value(self.fields_provided)
            .map_err(|e| format!("Invalid fields_provided on {}: {}", self.ticket_id, e))?;
        let embedding: Vec<f64> = serde_json::from_value(self.embedding)
            .map_err(|e| format!("Malformed embedding on {}: {}", self.ticket_id, e))?;

        Ok(HistoricalTicket {
            ticket_id: self.ticket_id,
            request_type: self.request_type,
            request_summary: self.request_summary,
            details: self.details,
            mandatory_fields,
            fields_provided,
            outcome: self.outcome,
            security_risk_score: self.security_risk_score,
            embedding,
            metadata: TicketMetadata {
                department: self.requester_department,
                title: self.requester_title,
                created_at: self.created_at,
            },
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct ThreadRow {
    pub thread_id: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ThreadRow {
    pub fn into_domain(self) -> Result<Thread, String> {
        Ok(Thread {
            status: self.status.parse()?,
            thread_id: self.thread_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct MessageRow {
    pub thread_id: String,
    pub role: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl MessageRow {
    pub fn into_domain(self) -> Result<Message, String> {
        Ok(Message {
            role: self.role.parse()?,
            thread_id: self.thread_id,
            text: self.text,
            timestamp: self.timestamp,
        })
    }
}

/// Database representation of the per-thread decision
#[derive(Debug, Clone, FromRow)]
pub struct DecisionRow {
    pub thread_id: String,
    pub request_type: String,
    pub extracted_fields: serde_json::Value,
    pub missing_fields: serde_json::Value,
    pub mandatory_fields: serde_json::Value,
    pub outcome: Option<String>,
    pub rationale: Option<String>,
    pub risk_score: Option<i32>,
    pub confidence_score: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl DecisionRow {
    pub fn into_domain(self) -> Result<Decision, String> {
        let extracted_fields: BTreeMap<String, String> =
            serde_json::from_value(self.extracted_fields)
                .map_err(|e| format!("Invalid extracted_fields: {}", e))?;
        let missing_fields: Vec<String> = serde_json::from_value(self.missing_fields)
            .map_err(|e| format!("Invalid missing_fields: {}", e))?;
        let mandatory_fields: Vec<String> = serde_json::from_value(self.mandatory_fields)
            .map_err(|e| format!("Invalid mandatory_fields: {}", e))?;
        let outcome = self
            .outcome
            .as_deref()
            .map(|s| s.parse::<crate::model::Outcome>())
            .transpose()?;
        let risk_score = self
            .risk_score
            .map(u8::try_from)
            .transpose()
            .map_err(|e| format!("Invalid risk_score: {}", e))?;

        Ok(Decision {
            thread_id: self.thread_id,
            request_type: self.request_type,
            extracted_fields,
            missing_fields,
            mandatory_fields,
            outcome,
            rationale: self.rationale,
            risk_score,
            confidence_score: self.confidence_score,
            created_at: self.created_at,
            resolved_at: self.resolved_at,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct AuditLogRow {
    pub thread_id: String,
    pub action: String,
    pub input_data: serde_json::Value,
    pub output_data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl AuditLogRow {
    pub fn into_domain(self) -> AuditLogEntry {
        AuditLogEntry {
            thread_id: self.thread_id,
            action: self.action,
            input_data: self.input_data,
            output_data: self.output_data,
            timestamp: self.timestamp,
        }
    }
}
