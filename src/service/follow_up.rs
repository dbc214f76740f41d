//! Follow-up questions for missing mandatory fields

use std::sync::Arc;

use regex::Regex;

use crate::service::error::PipelineError;
use crate::service::llm::CompletionCapability;

pub const FOLLOW_UP_PREAMBLE: &str = r#"You write short, friendly chat messages on behalf of a corporate security team. The messages ask an employee for information that is still missing from their access request.

## Rules

- Be brief and conversational.
- Use the person's name if they gave it.
- Never ask for anything other than the fields you are given.
"#;

pub fn build_single_field_prompt(field: &str, context: &str) -> String {
    format!(
        r#"Generate a natural, friendly message asking for: {field}

Context:
{context}

Keep it brief and conversational. One sentence."#
    )
}

pub fn build_multi_field_prompt(fields: &[String], context: &str) -> String {
    format!(
        r#"Generate a natural, friendly message asking for these missing fields: {}

Context:
{context}

Ask for all fields in one message and mention each field by name. No line breaks. No emojis or symbols."#,
        fields.join(", ")
    )
}

/// Deterministic question naming every field
pub fn template_question(fields: &[String]) -> String {
    format!(
        "To continue with your request, could you please provide the following: {}?",
        fields.join(", ")
    )
}

/// Normalizes generated questions to a single line of plain text
#[derive(Debug, Clone)]
pub struct QuestionSanitizer {
    line_breaks: Regex,
    symbols: Regex,
    spaces: Regex,
}

impl QuestionSanitizer {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            line_breaks: Regex::new(r"[\r\n\x{2028}\x{2029}]+")?,
            // symbol categories plus the joiners/selectors emoji sequences use
            symbols: Regex::new(r"[\p{S}\x{200D}\x{FE0F}]")?,
            spaces: Regex::new(r"[ \t]{2,}")?,
        })
    }

    pub fn sanitize(&self, text: &str) -> String {
        let single_line = self.line_breaks.replace_all(text, " ");
        let plain = self.symbols.replace_all(&single_line, "");
        self.spaces.replace_all(&plain, " ").trim().to_string()
    }
}

/// Case-insensitive check that every field label appears in the question
pub fn mentions_all(question: &str, fields: &[String]) -> bool {
    let lower = question.to_lowercase();
    fields.iter().all(|f| lower.contains(&f.to_lowercase()))
}

pub struct FollowUpGenerator {
    completion: Arc<dyn CompletionCapability>,
    sanitizer: QuestionSanitizer,
}

impl FollowUpGenerator {
    pub fn new(completion: Arc<dyn CompletionCapability>) -> Result<Self, regex::Error> {
        Ok(Self {
            completion,
            sanitizer: QuestionSanitizer::new()?,
        })
    }

    /// Ask about exactly one field
    pub async fn ask_for_field(&self, field: &str, context: &str) -> Result<String, PipelineError> {
        let fields = [field.to_string()];
        let raw = self
            .completion
            .complete_text(FOLLOW_UP_PREAMBLE, &build_single_field_prompt(field, context))
            .await?;
        Ok(self.finalize(&raw, &fields))
    }

    /// Ask for every missing field in one single-line message
    pub async fn ask_for_fields(
        &self,
        fields: &[String],
        context: &str,
    ) -> Result<String, PipelineError> {
        if fields.is_empty() {
            return Ok(String::new());
        }
        let raw = self
            .completion
            .complete_text(FOLLOW_UP_PREAMBLE, &build_multi_field_prompt(fields, context))
            .await?;
        Ok(self.finalize(&raw, fields))
    }

    fn finalize(&self, raw: &str, fields: &[String]) -> String {
        let question = self.sanitizer.sanitize(raw);
        if question.is_empty() || !mentions_all(&question, fields) {
            tracing::warn!(
                fields = ?fields,
                generated = %question,
                "Generated follow-up does not name every missing field; using template"
            );
            return template_question(fields);
        }
        question
    }
}
