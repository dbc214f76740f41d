//! Prompts for the approve/reject judgment

use std::collections::BTreeMap;

use crate::service::embedding_store::ScoredTicket;

pub const DECISION_PREAMBLE: &str = r#"You are the security decision engine of a corporate security team. You decide whether an employee access request should be Approved or Rejected, following the organisation's historical practice on similar requests.

## Rules

- Base the decision on how the historical similar cases were resolved and on the risk they carried.
- "decision" must be exactly "Approved" or "Rejected".
- "rationale" is a brief, factual explanation that refers to the precedents.
- "risk_score" is an integer from 0 (no risk) to 100 (critical risk).
- "confidence_score" is a number from 0.0 to 1.0 expressing how closely the request matches the historical cases.
"#;

/// One paragraph per precedent: summary, fields, risk and outcome
pub fn build_precedent_summary(neighbors: &[ScoredTicket]) -> String {
    if neighbors.is_empty() {
        return "(no historical similar cases)".to_string();
    }

    neighbors
        .iter()
        .map(|n| {
            format!(
                "Similar case: {}\nFields: {}\nRisk: {}\nOutcome: {}\n",
                n.ticket.request_summary,
                n.ticket.fields_provided.join(", "),
                n.ticket.security_risk_score,
                n.ticket.outcome
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn build_decision_prompt(
    transcript: &str,
    request_type: &str,
    provided: &BTreeMap<String, String>,
    neighbors: &[ScoredTicket],
) -> String {
    let fields = provided
        .iter()
        .map(|(name, value)| format!("- {}: {}", name, value))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"## Historical similar cases

{}

## Current request

Type: {request_type}
Fields provided:
{fields}

Conversation:
{transcript}

Based on historical practice, should this request be Approved or Rejected?

Reply in JSON:
{{
  "decision": "Approved or Rejected",
  "rationale": "brief explanation",
  "risk_score": 0-100,
  "confidence_score": 0.0-1.0
}}"#,
        build_precedent_summary(neighbors)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::testing::ticket_with;
    use std::sync::Arc;

    #[test]
    fn test_precedent_summary_includes_risk_and_outcome() {
        let neighbors = vec![ScoredTicket {
            ticket: Arc::new(ticket_with(
                "T1",
                "VPN Access",
                &["Justification", "Manager Approval"],
                "Rejected",
                75,
                vec![1.0],
            )),
            similarity: 0.8,
        }];

        let summary = build_precedent_summary(&neighbors);

        assert!(summary.contains("Similar case: VPN Access request T1"));
        assert!(summary.contains("Fields: Justification, Manager Approval"));
        assert!(summary.contains("Risk: 75"));
        assert!(summary.contains("Outcome: Rejected"));
    }

    #[test]
    fn test_decision_prompt_lists_provided_fields() {
        let mut provided = BTreeMap::new();
        provided.insert("Justification".to_string(), "oncall".to_string());

        let prompt = build_decision_prompt("user: vpn", "VPN Access", &provided, &[]);

        assert!(prompt.contains("Type: VPN Access"));
        assert!(prompt.contains("- Justification: oncall"));
        assert!(prompt.contains("no historical similar cases"));
    }
}
