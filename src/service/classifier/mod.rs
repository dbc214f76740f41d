//! Request-type classification
//!
//! Maps a transcript to one of the request types present in the historical
//! corpus, using the nearest historical tickets as few-shot examples.

use std::sync::Arc;

use crate::db::TicketRepository;
use crate::service::classifier::prompts::{CLASSIFICATION_PREAMBLE, build_classification_prompt};
use crate::service::embedding_store::ScoredTicket;
use crate::service::error::PipelineError;
use crate::service::llm::CompletionCapability;

pub mod prompts;

const STAGE: &str = "classify";

pub struct Classifier {
    completion: Arc<dyn CompletionCapability>,
    tickets: Arc<dyn TicketRepository>,
    examples: usize,
}

impl Classifier {
    /// `examples` caps how many neighbors are shown to the model
    pub fn new(
        completion: Arc<dyn CompletionCapability>,
        tickets: Arc<dyn TicketRepository>,
        examples: usize,
    ) -> Self {
        Self {
            completion,
            tickets,
            examples,
        }
    }

    /// Classify the transcript into a known request type
    ///
    /// The label set is read from storage on every call. The trimmed
    /// completion must equal one label exactly.
    pub async fn classify(
        &self,
        transcript: &str,
        neighbors: &[ScoredTicket],
    ) -> Result<String, PipelineError> {
        let labels = self.tickets.distinct_request_types().await?;
        if labels.is_empty() {
            tracing::warn!("Cannot classify: no request types in historical corpus");
            return Err(PipelineError::EmptyCorpus);
        }

        let examples = &neighbors[..neighbors.len().min(self.examples)];
        let prompt = build_classification_prompt(transcript, examples, &labels);

        tracing::debug!(
            labels = labels.len(),
            examples = examples.len(),
            "Classifying request"
        );

        let raw = self
            .completion
            .complete_text(CLASSIFICATION_PREAMBLE, &prompt)
            .await?;
        let candidate = raw.trim();

        match labels.iter().find(|label| label.as_str() == candidate) {
            Some(label) => {
                tracing::info!(request_type = %label, "Request classified");
                Ok(label.clone())
            }
            None => Err(PipelineError::contract_violation(
                STAGE,
                format!(
                    "'{}' is not one of the {} known request types",
                    candidate,
                    labels.len()
                ),
                raw,
            )),
        }
    }
}
