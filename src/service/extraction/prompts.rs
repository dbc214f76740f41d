//! Prompts for mandatory-field extraction

pub const EXTRACTION_PREAMBLE: &str = r#"You extract structured information from employee access requests for a corporate security team.

## Rules

- Only report values the requester actually stated in the conversation. Never guess or invent a value.
- Report every required field you are given, using the exact field name as the key.
- When a required field is not present in the conversation, report "MISSING" for it.
- Also report the specific permission, resource, or access being requested (e.g. "AWS admin access", "GitHub repository access", "VPN access to production network"), or "MISSING" when it is unclear.
"#;

pub fn build_extraction_prompt(transcript: &str, schema: &[String]) -> String {
    let required_fields = schema
        .iter()
        .map(|f| format!("- {}", f))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Extract information from this security request.

## Conversation

{transcript}

## Required fields

{required_fields}

For each required field, return either the value found or "MISSING".

Reply in JSON format:
{{
  "fields": {{"<field name>": "value or MISSING"}},
  "requested_access": "specific access requested or MISSING"
}}"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_lists_every_field() {
        let schema = vec!["Justification".to_string(), "Manager Approval".to_string()];
        let prompt = build_extraction_prompt("user: vpn please", &schema);

        assert!(prompt.contains("- Justification\n- Manager Approval"));
        assert!(prompt.contains("user: vpn please"));
        assert!(prompt.contains("\"requested_access\""));
    }
}
