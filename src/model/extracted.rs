use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Sentinel the model uses for a field it could not find
pub const MISSING_SENTINEL: &str = "MISSING";

/// Field report returned by the extraction completion
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedFields {
    /// One entry per required field: the value found, or "MISSING"/null
    #[schemars(
        description = "Map of every required field name to the value found in the request, or \"MISSING\" when the request does not contain it"
    )]
    pub fields: BTreeMap<String, Option<String>>,

    /// The specific permission, resource, or access being requested
    #[schemars(
        description = "Specific permission, resource, or access requested (e.g. \"VPN access to production network\"), or \"MISSING\""
    )]
    pub requested_access: Option<String>,
}

/// Structured judgment returned by the decision completion
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedDecision {
    #[schemars(description = "Exactly \"Approved\" or \"Rejected\"")]
    pub decision: String,

    #[schemars(description = "Brief explanation grounded in the historical cases")]
    pub rationale: String,

    #[schemars(description = "Integer security risk from 0 (none) to 100 (critical)")]
    pub risk_score: i64,

    #[schemars(
        description = "Confidence from 0.0 to 1.0, based on similarity to historical cases"
    )]
    pub confidence_score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ExtractedAlertLevel {
    Low,
    Medium,
    High,
}

/// Pattern analysis over the riskiest recent decisions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, ToSchema)]
pub struct ExtractedPostureAnalysis {
    pub patterns_detected: Vec<String>,
    pub common_risk_factors: Vec<String>,
    pub recommendations: Vec<String>,
    pub alert_level: ExtractedAlertLevel,
}

/// JSON schema of `T`, handed to the completion capability as a shape hint
pub fn schema_hint<T: JsonSchema>() -> serde_json::Value {
    serde_json::to_value(schemars::schema_for!(T)).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracted_fields_accepts_null_and_sentinel() {
        let raw = serde_json::json!({
            "fields": {"Justification": "remote work", "Manager Approval": null, "Duration": "MISSING"},
            "requested_access": "VPN access"
        });
        let parsed: ExtractedFields = serde_json::from_value(raw).unwrap();

        assert_eq!(parsed.fields.len(), 3);
        assert_eq!(parsed.fields["Manager Approval"], None);
        assert_eq!(
            parsed.fields["Duration"].as_deref(),
            Some(MISSING_SENTINEL)
        );
    }

    #[test]
    fn test_schema_hint_mentions_fields() {
        let hint = schema_hint::<ExtractedDecision>().to_string();
        assert!(hint.contains("risk_score"));
        assert!(hint.contains("confidence_score"));
    }
}
