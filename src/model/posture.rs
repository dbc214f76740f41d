use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::decision::Outcome;
use crate::model::extracted::ExtractedPostureAnalysis;

/// One of the riskiest recent decisions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RiskyRequest {
    pub thread_id: String,
    pub request_type: String,
    pub risk_score: u8,
    pub outcome: Option<Outcome>,
    /// Start of the requester's own messages
    pub request_summary: String,
    pub extracted_fields: BTreeMap<String, String>,
    pub rationale: Option<String>,
}

/// Recent risk posture across all threads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RiskPostureReport {
    /// e.g. "last_30_days"
    pub period: String,
    pub window_days: i64,
    pub total_requests: usize,
    /// Highest risk first
    pub riskiest: Vec<RiskyRequest>,
    pub analysis: Option<ExtractedPostureAnalysis>,
    /// Set when the pattern analysis could not be produced
    pub analysis_error: Option<String>,
}
