use std::collections::HashSet;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Separator used by the historical corpus for field lists
pub const FIELD_LIST_SEPARATOR: char = ';';

/// Timestamp format of `created_at` in corpus records
pub const CORPUS_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Requester metadata attached to a historical ticket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketMetadata {
    pub department: Option<String>,
    pub title: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Immutable reference record from the historical ticket corpus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalTicket {
    pub ticket_id: String,
    pub request_type: String,
    pub request_summary: String,
    pub details: String,
    /// Ordered, type-specific list of fields required before a decision
    pub mandatory_fields: Vec<String>,
    pub fields_provided: Vec<String>,
    /// Outcome label as recorded historically (e.g. "Approved")
    pub outcome: String,
    pub security_risk_score: i32,
    pub embedding: Vec<f64>,
    pub metadata: TicketMetadata,
}

impl HistoricalTicket {
    /// Text that gets embedded for similarity retrieval
    pub fn embedding_text(&self) -> String {
        format!(
            "{}: {}\n{}",
            self.request_type, self.request_summary, self.details
        )
    }
}

/// Raw corpus record as delivered by the bulk export
#[derive(Debug, Clone, Deserialize)]
pub struct CorpusRecord {
    pub ticket_id: String,
    pub request_type: String,
    pub request_summary: String,
    #[serde(default)]
    pub details: String,
    #[serde(default)]
    pub mandatory_fields: String,
    #[serde(default)]
    pub fields_provided: String,
    pub outcome: String,
    pub security_risk_score: i32,
    pub created_at: Option<String>,
    pub requester_department: Option<String>,
    pub requester_title: Option<String>,
}

impl CorpusRecord {
    /// Same text layout as [`HistoricalTicket::embedding_text`]
    pub fn embedding_text(&self) -> String {
        format!(
            "{}: {}\n{}",
            self.request_type, self.request_summary, self.details
        )
    }

    /// Attach a computed embedding and normalize list fields
    pub fn into_ticket(self, embedding: Vec<f64>) -> Result<HistoricalTicket, String> {
        let created_at = match self.created_at.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => Some(
                NaiveDateTime::parse_from_str(raw, CORPUS_TIMESTAMP_FORMAT)
                    .map_err(|e| {
                        format!("Invalid created_at '{}' on {}: {}", raw, self.ticket_id, e)
                    })?
                    .and_utc(),
            ),
            _ => None,
        };

        Ok(HistoricalTicket {
            ticket_id: self.ticket_id,
            request_type: self.request_type.trim().to_string(),
            request_summary: self.request_summary,
            details: self.details,
            mandatory_fields: split_field_list(&self.mandatory_fields),
            fields_provided: split_field_list(&self.fields_provided),
            outcome: self.outcome,
            security_risk_score: self.security_risk_score,
            embedding,
            metadata: TicketMetadata {
                department: self.requester_department,
                title: self.requester_title,
                created_at,
            },
        })
    }
}

/// Split a `"; "`-separated field list, dropping empty entries
///
/// A name listed twice is kept once, at its first position.
pub fn split_field_list(raw: &str) -> Vec<String> {
    dedup_fields(
        raw.split(FIELD_LIST_SEPARATOR)
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(str::to_string),
    )
}

/// Drop repeated field names, keeping first-seen order
pub fn dedup_fields(fields: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    fields
        .into_iter()
        .filter(|f| seen.insert(f.clone()))
        .collect()
}
