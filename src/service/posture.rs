//! Risk posture report over recent decisions
//!
//! Lists the riskiest decisions of the reporting window and asks the
//! completion capability for a pattern analysis over them. A failed analysis
//! never fails the report.

use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::db::ConversationRepository;
use crate::model::extracted::{ExtractedPostureAnalysis, schema_hint};
use crate::model::{Decision, RiskPostureConfig, RiskPostureReport, RiskyRequest, Role};
use crate::service::error::PipelineError;
use crate::service::llm::CompletionCapability;

/// Characters of the requester's messages kept per risky request
pub const REQUEST_SUMMARY_CHARS: usize = 200;

pub const POSTURE_PREAMBLE: &str = r#"You are a security analyst reviewing the riskiest access requests a corporate security team handled recently. Identify recurring patterns and concerns across them.

## Output

- "patterns_detected": recurring patterns across the requests
- "common_risk_factors": factors that made these requests risky
- "recommendations": concrete actions for the security team
- "alert_level": "low", "medium" or "high"
"#;

pub fn build_posture_prompt(window_days: i64, requests: &[RiskyRequest]) -> String {
    let formatted = requests
        .iter()
        .enumerate()
        .map(|(i, r)| {
            format!(
                "{}. [{}] Risk: {}/100 - {}\nSummary: {}\nRationale: {}",
                i + 1,
                r.request_type,
                r.risk_score,
                r.outcome.map(|o| o.as_str()).unwrap_or("Pending"),
                r.request_summary,
                r.rationale.as_deref().unwrap_or("")
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Analyze these {} riskiest security requests from the last {} days. Identify patterns and concerns.\n\nRiskiest Requests:\n{}",
        requests.len(),
        window_days,
        formatted
    )
}

pub struct RiskPostureService {
    conversations: Arc<dyn ConversationRepository>,
    completion: Arc<dyn CompletionCapability>,
    config: RiskPostureConfig,
}

impl RiskPostureService {
    pub fn new(
        conversations: Arc<dyn ConversationRepository>,
        completion: Arc<dyn CompletionCapability>,
        config: RiskPostureConfig,
    ) -> Self {
        Self {
            conversations,
            completion,
            config,
        }
    }

    pub async fn summarize(&self) -> Result<RiskPostureReport, PipelineError> {
        let since = Utc::now() - Duration::days(self.config.window_days);
        let decisions = self.conversations.list_decisions_since(since).await?;
        let total_requests = decisions.len();

        let mut scored: Vec<Decision> = decisions
            .into_iter()
            .filter(|d| d.risk_score.is_some())
            .collect();
        // stable: equal risk keeps creation order
        scored.sort_by(|a, b| b.risk_score.cmp(&a.risk_score));
        scored.truncate(self.config.top_n);

        let mut riskiest = Vec::with_capacity(scored.len());
        for decision in scored {
            riskiest.push(self.risky_request(decision).await?);
        }

        let (analysis, analysis_error) = if riskiest.is_empty() {
            tracing::debug!("No risk-scored decisions in window; skipping pattern analysis");
            (None, None)
        } else {
            match self.analyze(&riskiest).await {
                Ok(analysis) => (Some(analysis), None),
                Err(e) => {
                    tracing::warn!(error = %e, "Risk posture analysis unavailable");
                    (None, Some(e.to_string()))
                }
            }
        };

        tracing::info!(
            window_days = self.config.window_days,
            total_requests = total_requests,
            riskiest = riskiest.len(),
            alert_level = ?analysis.as_ref().map(|a| a.alert_level),
            "Risk posture summarized"
        );

        Ok(RiskPostureReport {
            period: format!("last_{}_days", self.config.window_days),
            window_days: self.config.window_days,
            total_requests,
            riskiest,
            analysis,
            analysis_error,
        })
    }

    async fn risky_request(&self, decision: Decision) -> Result<RiskyRequest, PipelineError> {
        let user_messages = self
            .conversations
            .list_messages(&decision.thread_id, Some(Role::User))
            .await?;
        let joined = user_messages
            .iter()
            .map(|m| m.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        Ok(RiskyRequest {
            request_summary: joined.chars().take(REQUEST_SUMMARY_CHARS).collect(),
            thread_id: decision.thread_id,
            request_type: decision.request_type,
            risk_score: decision.risk_score.unwrap_or_default(),
            outcome: decision.outcome,
            extracted_fields: decision.extracted_fields,
            rationale: decision.rationale,
        })
    }

    async fn analyze(
        &self,
        riskiest: &[RiskyRequest],
    ) -> Result<ExtractedPostureAnalysis, PipelineError> {
        let prompt = build_posture_prompt(self.config.window_days, riskiest);
        let raw = self
            .completion
            .complete_structured(
                POSTURE_PREAMBLE,
                &prompt,
                &schema_hint::<ExtractedPostureAnalysis>(),
            )
            .await?;

        serde_json::from_value(raw.clone()).map_err(|e| {
            PipelineError::contract_violation("risk_posture", e.to_string(), raw.to_string())
        })
    }
}
