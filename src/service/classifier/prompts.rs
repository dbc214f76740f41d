//! Prompts for request-type classification

use crate::service::embedding_store::ScoredTicket;

pub const CLASSIFICATION_PREAMBLE: &str = r#"You are the intake classifier of a corporate security team. You read a conversation in which an employee asks for access to a system, resource, or permission, and you decide which kind of request it is.

## Rules

- Answer with exactly one request type, copied verbatim from the list you are given.
- Do not explain, quote, or add punctuation around the answer.
- Use the labelled examples as guidance on how similar requests were classified in the past.
"#;

/// Build the classification prompt from the transcript, examples and labels
pub fn build_classification_prompt(
    transcript: &str,
    examples: &[ScoredTicket],
    labels: &[String],
) -> String {
    let formatted_examples = if examples.is_empty() {
        "(no similar historical requests)".to_string()
    } else {
        examples
            .iter()
            .map(|n| {
                format!(
                    "- '{}' : {}",
                    n.ticket.request_summary, n.ticket.request_type
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        r#"Based on these examples:
{formatted_examples}

Classify this request into one of: {}

Request:
{transcript}

Reply with just the request type."#,
        labels.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::testing::ticket;
    use std::sync::Arc;

    #[test]
    fn test_prompt_lists_labels_and_examples() {
        let examples = vec![ScoredTicket {
            ticket: Arc::new(ticket("T1", "VPN Access", vec![1.0])),
            similarity: 0.9,
        }];
        let labels = vec!["AWS Admin".to_string(), "VPN Access".to_string()];

        let prompt = build_classification_prompt("user: need vpn", &examples, &labels);

        assert!(prompt.contains("one of: AWS Admin, VPN Access"));
        assert!(prompt.contains("- 'VPN Access request T1' : VPN Access"));
        assert!(prompt.contains("user: need vpn"));
    }

    #[test]
    fn test_prompt_without_examples() {
        let prompt = build_classification_prompt("user: hi", &[], &["Badge".to_string()]);
        assert!(prompt.contains("no similar historical requests"));
    }
}
