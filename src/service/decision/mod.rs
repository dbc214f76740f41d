//! Retrieval-augmented approve/reject decisions
//!
//! A request with missing fields is never judged; otherwise the nearest
//! historical tickets are summarised as precedents and the completion
//! capability renders a structured verdict.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::model::Outcome;
use crate::model::extracted::{ExtractedDecision, schema_hint};
use crate::service::decision::prompts::{DECISION_PREAMBLE, build_decision_prompt};
use crate::service::decision::validation::validate_decision;
use crate::service::embedding_store::{EmbeddingStore, ScoredTicket};
use crate::service::error::PipelineError;
use crate::service::llm::CompletionCapability;

pub mod prompts;
pub mod validation;

const STAGE: &str = "decide";

pub const PENDING_RATIONALE: &str = "missing required fields";

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Information is still missing; no outcome or scores
    Pending { rationale: String },
    Final {
        outcome: Outcome,
        rationale: String,
        risk_score: u8,
        confidence_score: f64,
    },
}

impl Verdict {
    pub fn outcome(&self) -> Option<Outcome> {
        match self {
            Verdict::Pending { .. } => None,
            Verdict::Final { outcome, .. } => Some(*outcome),
        }
    }

    pub fn rationale(&self) -> &str {
        match self {
            Verdict::Pending { rationale } | Verdict::Final { rationale, .. } => rationale,
        }
    }

    pub fn risk_score(&self) -> Option<u8> {
        match self {
            Verdict::Pending { .. } => None,
            Verdict::Final { risk_score, .. } => Some(*risk_score),
        }
    }

    pub fn confidence_score(&self) -> Option<f64> {
        match self {
            Verdict::Pending { .. } => None,
            Verdict::Final {
                confidence_score, ..
            } => Some(*confidence_score),
        }
    }
}

pub struct DecisionEngine {
    completion: Arc<dyn CompletionCapability>,
    store: Arc<EmbeddingStore>,
    neighbor_count: usize,
}

impl DecisionEngine {
    pub fn new(
        completion: Arc<dyn CompletionCapability>,
        store: Arc<EmbeddingStore>,
        neighbor_count: usize,
    ) -> Self {
        Self {
            completion,
            store,
            neighbor_count,
        }
    }

    /// Render a verdict for an extracted request
    ///
    /// `neighbors` are used as precedents when supplied; otherwise the store
    /// is queried with the transcript. At most `neighbor_count` are used.
    pub async fn decide(
        &self,
        transcript: &str,
        request_type: &str,
        provided: &BTreeMap<String, String>,
        missing: &[String],
        neighbors: Option<&[ScoredTicket]>,
    ) -> Result<Verdict, PipelineError> {
        if !missing.is_empty() {
            tracing::debug!(
                request_type = %request_type,
                missing = missing.len(),
                "Decision pending on missing fields"
            );
            return Ok(Verdict::Pending {
                rationale: PENDING_RATIONALE.to_string(),
            });
        }

        let queried;
        let precedents = match neighbors {
            Some(n) => &n[..n.len().min(self.neighbor_count)],
            None => {
                queried = self.store.query(transcript, self.neighbor_count).await?;
                queried.as_slice()
            }
        };

        let prompt = build_decision_prompt(transcript, request_type, provided, precedents);
        let raw = self
            .completion
            .complete_structured(
                DECISION_PREAMBLE,
                &prompt,
                &schema_hint::<ExtractedDecision>(),
            )
            .await?;

        let extracted: ExtractedDecision = serde_json::from_value(raw.clone()).map_err(|e| {
            PipelineError::contract_violation(STAGE, e.to_string(), raw.to_string())
        })?;

        let validation = validate_decision(&extracted);
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

        let outcome = extracted
            .decision
            .parse::<Outcome>()
            .map_err(|e| PipelineError::contract_violation(STAGE, e, raw.to_string()))?;
        let risk_score = u8::try_from(extracted.risk_score).map_err(|e| {
            PipelineError::contract_violation(STAGE, e.to_string(), raw.to_string())
        })?;

        tracing::info!(
            request_type = %request_type,
            outcome = %outcome,
            risk_score = risk_score,
            confidence_score = extracted.confidence_score,
            precedents = precedents.len(),
            "Decision rendered"
        );

        Ok(Verdict::Final {
            outcome,
            rationale: extracted.rationale,
            risk_score,
            confidence_score: extracted.confidence_score,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::embedding_store::BruteForceIndex;
    use crate::service::testing::{KeywordEmbedder, ScriptedCompletion, ticket_with};
    use serde_json::json;

    fn precedents() -> Vec<ScoredTicket> {
        ["Approved", "Approved", "Rejected", "Approved", "Approved", "Rejected"]
            .iter()
            .enumerate()
            .map(|(i, outcome)| ScoredTicket {
                ticket: Arc::new(ticket_with(
                    &format!("P{}", i),
                    "VPN Access",
                    &["Justification"],
                    outcome,
                    20,
                    vec![1.0, 0.0],
                )),
                similarity: 0.9,
            })
            .collect()
    }

    fn engine(completion: Arc<ScriptedCompletion>, embedder: Arc<KeywordEmbedder>) -> DecisionEngine {
        let index = BruteForceIndex::build(
            vec![ticket_with("H1", "VPN Access", &["Justification"], "Approved", 15, vec![1.0, 0.0])],
            None,
        );
        let store = Arc::new(EmbeddingStore::new(embedder, Arc::new(index)));
        DecisionEngine::new(completion, store, 5)
    }

    fn provided() -> BTreeMap<String, String> {
        BTreeMap::from([("Justification".to_string(), "oncall".to_string())])
    }

    #[tokio::test]
    async fn test_missing_fields_yield_pending_without_calls() {
        let completion = Arc::new(ScriptedCompletion::new());
        let embedder = Arc::new(KeywordEmbedder::new(&["vpn", "aws"]));
        let engine = engine(completion.clone(), embedder.clone());

        let verdict = engine
            .decide(
                "user: vpn",
                "VPN Access",
                &BTreeMap::new(),
                &["Manager Approval".to_string()],
                None,
            )
            .await
            .unwrap();

        assert_eq!(verdict.outcome(), None);
        assert_eq!(verdict.rationale(), PENDING_RATIONALE);
        assert_eq!(verdict.risk_score(), None);
        assert!(completion.calls().is_empty());
        assert_eq!(embedder.call_count(), 0);
    }

    #[tokio::test]
    async fn test_final_verdict_uses_at_most_five_supplied_precedents() {
        let completion = Arc::new(ScriptedCompletion::new().structured(
            DECISION_PREAMBLE,
            json!({"decision": "Approved", "rationale": "Matches precedents", "risk_score": 20, "confidence_score": 0.9}),
        ));
        let embedder = Arc::new(KeywordEmbedder::new(&["vpn", "aws"]));
        let engine = engine(completion.clone(), embedder.clone());

        let verdict = engine
            .decide("user: vpn", "VPN Access", &provided(), &[], Some(&precedents()))
            .await
            .unwrap();

        assert_eq!(
            verdict,
            Verdict::Final {
                outcome: Outcome::Approved,
                rationale: "Matches precedents".to_string(),
                risk_score: 20,
                confidence_score: 0.9,
            }
        );
        assert_eq!(embedder.call_count(), 0);
        let prompt = completion.last_prompt_for(DECISION_PREAMBLE).unwrap();
        assert_eq!(prompt.matches("Similar case:").count(), 5);
    }

    #[tokio::test]
    async fn test_queries_store_when_no_neighbors_supplied() {
        let completion = Arc::new(ScriptedCompletion::new().structured(
            DECISION_PREAMBLE,
            json!({"decision": "Rejected", "rationale": "Too broad", "risk_score": 80, "confidence_score": 0.6}),
        ));
        let embedder = Arc::new(KeywordEmbedder::new(&["vpn", "aws"]));
        let engine = engine(completion.clone(), embedder.clone());

        let verdict = engine
            .decide("user: vpn", "VPN Access", &provided(), &[], None)
            .await
            .unwrap();

        assert_eq!(verdict.outcome(), Some(Outcome::Rejected));
        assert_eq!(embedder.call_count(), 1);
        assert!(
            completion
                .last_prompt_for(DECISION_PREAMBLE)
                .unwrap()
                .contains("VPN Access request H1")
        );
    }

    #[tokio::test]
    async fn test_out_of_range_score_is_not_clamped() {
        let completion = Arc::new(ScriptedCompletion::new().structured(
            DECISION_PREAMBLE,
            json!({"decision": "Approved", "rationale": "ok", "risk_score": 150, "confidence_score": 0.9}),
        ));
        let engine = engine(completion, Arc::new(KeywordEmbedder::new(&["vpn"])));

        let err = engine
            .decide("user: vpn", "VPN Access", &provided(), &[], Some(&precedents()))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::ContractViolation { stage: "decide", .. }
        ));
    }

    #[tokio::test]
    async fn test_shape_error_is_contract_violation() {
        let completion = Arc::new(
            ScriptedCompletion::new()
                .structured(DECISION_PREAMBLE, json!({"decision": "Approved"})),
        );
        let engine = engine(completion, Arc::new(KeywordEmbedder::new(&["vpn"])));

        assert!(matches!(
            engine
                .decide("user: vpn", "VPN Access", &provided(), &[], Some(&precedents()))
                .await,
            Err(PipelineError::ContractViolation { .. })
        ));
    }
}
