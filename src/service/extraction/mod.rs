//! Mandatory-field extraction
//!
//! Splits a request type's mandatory fields into those the transcript
//! provides and those still missing.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::db::TicketRepository;
use crate::model::{REQUESTED_ACCESS_KEY, dedup_fields};
use crate::model::extracted::{ExtractedFields, MISSING_SENTINEL, schema_hint};
use crate::service::error::PipelineError;
use crate::service::extraction::prompts::{EXTRACTION_PREAMBLE, build_extraction_prompt};
use crate::service::extraction::validation::validate_extracted_fields;
use crate::service::llm::CompletionCapability;
use crate::service::schema_registry::SchemaRegistry;

pub mod prompts;
pub mod validation;

const STAGE: &str = "extract";

/// Outcome of one extraction
///
/// `provided` and `missing` partition `schema`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractionResult {
    pub provided: BTreeMap<String, String>,
    /// Missing fields in schema order
    pub missing: Vec<String>,
    pub schema: Vec<String>,
    pub requested_access: Option<String>,
}

impl ExtractionResult {
    /// Provided fields plus the requested access under its reserved key
    ///
    /// The reserved key is not added when the schema itself declares it.
    pub fn extracted_fields(&self) -> BTreeMap<String, String> {
        let mut fields = self.provided.clone();
        if let Some(access) = &self.requested_access
            && !self.schema.iter().any(|f| f == REQUESTED_ACCESS_KEY)
        {
            fields.insert(REQUESTED_ACCESS_KEY.to_string(), access.clone());
        }
        fields
    }
}

pub struct FieldExtractor {
    completion: Arc<dyn CompletionCapability>,
    registry: Arc<SchemaRegistry>,
    tickets: Arc<dyn TicketRepository>,
}

impl FieldExtractor {
    pub fn new(
        completion: Arc<dyn CompletionCapability>,
        registry: Arc<SchemaRegistry>,
        tickets: Arc<dyn TicketRepository>,
    ) -> Self {
        Self {
            completion,
            registry,
            tickets,
        }
    }

    pub async fn extract(
        &self,
        transcript: &str,
        request_type: &str,
    ) -> Result<ExtractionResult, PipelineError> {
        let schema = self.resolve_schema(request_type).await?;
        if schema.is_empty() {
            tracing::warn!(
                request_type = %request_type,
                "No mandatory fields known for request type; skipping extraction"
            );
            return Ok(ExtractionResult::default());
        }

        let prompt = build_extraction_prompt(transcript, &schema);
        let raw = self
            .completion
            .complete_structured(
                EXTRACTION_PREAMBLE,
                &prompt,
                &schema_hint::<ExtractedFields>(),
            )
            .await?;

        let extracted: ExtractedFields = serde_json::from_value(raw.clone()).map_err(|e| {
            PipelineError::contract_violation(STAGE, e.to_string(), raw.to_string())
        })?;

        let validation = validate_extracted_fields(&extracted, &schema);
        for warning in &validation.warnings {
            tracing::warn!(request_type = %request_type, "{}", warning);
        }
        if !validation.is_valid {
            return Err(PipelineError::contract_violation(
                STAGE,
                validation.errors.join("; "),
                raw.to_string(),
            ));
        }

        let result = partition(extracted, schema);

        tracing::info!(
            request_type = %request_type,
            provided = result.provided.len(),
            missing = result.missing.len(),
            has_requested_access = result.requested_access.is_some(),
            "Fields extracted"
        );

        Ok(result)
    }

    /// Registry entry, else the first stored ticket of the type, else empty
    ///
    /// Repeated names are collapsed so `provided` and `missing` stay disjoint.
    async fn resolve_schema(&self, request_type: &str) -> Result<Vec<String>, PipelineError> {
        if let Some(schema) = self.registry.schema_for(request_type) {
            return Ok(dedup_fields(schema.iter().cloned()));
        }

        let fallback = self.tickets.get_one_ticket_by_type(request_type).await?;
        if fallback.is_some() {
            tracing::debug!(
                request_type = %request_type,
                "Schema registry miss; using stored ticket"
            );
        }
        Ok(fallback
            .map(|t| dedup_fields(t.mandatory_fields))
            .unwrap_or_default())
    }
}

fn is_reported_missing(value: Option<&str>) -> bool {
    value.is_none_or(|v| v.trim() == MISSING_SENTINEL)
}

/// Split a validated response over the schema
fn partition(mut extracted: ExtractedFields, schema: Vec<String>) -> ExtractionResult {
    let mut provided = BTreeMap::new();
    let mut missing = Vec::new();

    for field in &schema {
        let value = extracted.fields.remove(field).flatten();
        if is_reported_missing(value.as_deref()) {
            missing.push(field.clone());
        } else if let Some(value) = value {
            provided.insert(field.clone(), value);
        }
    }

    let requested_access = extracted
        .requested_access
        .filter(|a| !is_reported_missing(Some(a)));

    ExtractionResult {
        provided,
        missing,
        schema,
        requested_access,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::model::{SchemaPolicy, split_field_list};
    use crate::service::testing::{ScriptedCompletion, ticket_with};
    use serde_json::json;

    fn extractor(completion: Arc<ScriptedCompletion>) -> FieldExtractor {
        let tickets = vec![ticket_with(
            "1",
            "VPN Access",
            &["Justification", "Manager Approval"],
            "Approved",
            10,
            vec![1.0],
        )];
        let registry = Arc::new(SchemaRegistry::build(&tickets, SchemaPolicy::default()));
        FieldExtractor::new(completion, registry, Arc::new(MemoryStore::with_tickets(tickets)))
    }

    #[tokio::test]
    async fn test_partial_request_reports_missing_field() {
        let completion = Arc::new(ScriptedCompletion::new().structured(
            EXTRACTION_PREAMBLE,
            json!({
                "fields": {"Justification": "remote work", "Manager Approval": "MISSING"},
                "requested_access": "VPN access"
            }),
        ));

        let result = extractor(completion)
            .extract("user: vpn for remote work", "VPN Access")
            .await
            .unwrap();

        assert_eq!(result.missing, vec!["Manager Approval".to_string()]);
        assert_eq!(result.provided["Justification"], "remote work");
        assert_eq!(result.requested_access.as_deref(), Some("VPN access"));
        assert_eq!(result.extracted_fields()[REQUESTED_ACCESS_KEY], "VPN access");
    }

    #[tokio::test]
    async fn test_provided_and_missing_partition_schema() {
        let completion = Arc::new(ScriptedCompletion::new().structured(
            EXTRACTION_PREAMBLE,
            json!({
                "fields": {"Justification": null, "Manager Approval": "Dana", "Extra": "x"},
                "requested_access": "MISSING"
            }),
        ));

        let result = extractor(completion)
            .extract("user: vpn", "VPN Access")
            .await
            .unwrap();

        let mut union: Vec<String> = result.provided.keys().cloned().collect();
        union.extend(result.missing.iter().cloned());
        union.sort();
        let mut schema = result.schema.clone();
        schema.sort();
        assert_eq!(union, schema);
        assert!(result.missing.iter().all(|m| !result.provided.contains_key(m)));
        assert!(result.requested_access.is_none());
        assert!(!result.extracted_fields().contains_key(REQUESTED_ACCESS_KEY));
    }

    #[tokio::test]
    async fn test_absent_schema_field_is_contract_violation() {
        let completion = Arc::new(ScriptedCompletion::new().structured(
            EXTRACTION_PREAMBLE,
            json!({"fields": {"Justification": "x"}, "requested_access": null}),
        ));

        let err = extractor(completion)
            .extract("user: vpn", "VPN Access")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::ContractViolation { stage: "extract", .. }
        ));
    }

    #[tokio::test]
    async fn test_wrong_shape_is_contract_violation() {
        let completion = Arc::new(
            ScriptedCompletion::new()
                .structured(EXTRACTION_PREAMBLE, json!({"Justification": "x"})),
        );

        assert!(matches!(
            extractor(completion).extract("user: vpn", "VPN Access").await,
            Err(PipelineError::ContractViolation { .. })
        ));
    }

    #[tokio::test]
    async fn test_unknown_type_with_no_tickets_extracts_nothing() {
        let completion = Arc::new(ScriptedCompletion::new());

        let result = extractor(completion.clone())
            .extract("user: badge", "Badge")
            .await
            .unwrap();

        assert_eq!(result, ExtractionResult::default());
        assert!(completion.calls().is_empty());
    }

    #[tokio::test]
    async fn test_registry_miss_falls_back_to_stored_ticket() {
        let completion = Arc::new(ScriptedCompletion::new().structured(
            EXTRACTION_PREAMBLE,
            json!({"fields": {"Floor": "3"}, "requested_access": "badge"}),
        ));
        let store = MemoryStore::with_tickets(vec![ticket_with(
            "9",
            "Badge",
            &["Floor"],
            "Approved",
            5,
            vec![1.0],
        )]);
        let extractor = FieldExtractor::new(
            completion,
            Arc::new(SchemaRegistry::default()),
            Arc::new(store),
        );

        let result = extractor.extract("user: badge", "Badge").await.unwrap();

        assert_eq!(result.schema, vec!["Floor".to_string()]);
        assert!(result.missing.is_empty());
    }

    #[tokio::test]
    async fn test_repeated_schema_field_is_never_both_provided_and_missing() {
        let completion = Arc::new(ScriptedCompletion::new().structured(
            EXTRACTION_PREAMBLE,
            json!({
                "fields": {"Justification": "remote", "Manager Approval": "Dana"},
                "requested_access": "VPN"
            }),
        ));
        let mut repeated = ticket_with("7", "VPN Access", &[], "Approved", 10, vec![1.0]);
        repeated.mandatory_fields = split_field_list("Justification; Manager Approval; Justification");
        repeated.mandatory_fields.push("Justification".to_string());
        let extractor = FieldExtractor::new(
            completion,
            Arc::new(SchemaRegistry::default()),
            Arc::new(MemoryStore::with_tickets(vec![repeated])),
        );

        let result = extractor.extract("user: vpn", "VPN Access").await.unwrap();

        assert!(result.missing.is_empty());
        assert_eq!(
            result.schema,
            vec!["Justification".to_string(), "Manager Approval".to_string()]
        );
        assert_eq!(result.provided["Justification"], "remote");
    }

    #[test]
    fn test_schema_declared_requested_access_is_not_overwritten() {
        let result = ExtractionResult {
            provided: BTreeMap::new(),
            missing: vec![REQUESTED_ACCESS_KEY.to_string()],
            schema: vec![REQUESTED_ACCESS_KEY.to_string()],
            requested_access: Some("vpn".to_string()),
        };
        assert!(result.extracted_fields().is_empty());
    }
}
