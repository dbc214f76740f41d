//! One conversational turn, end to end
//!
//! Retrieval, classification, extraction and the verdict all run against the
//! thread's transcript with the inbound message appended in memory. Nothing
//! is written until the turn has fully succeeded, and then everything is
//! committed at once.

use std::sync::Arc;

use chrono::Utc;

use crate::db::{ConversationRepository, TicketRepository};
use crate::model::{
    AuditLogEntry, DecisionUpdate, Message, PROCESS_MESSAGE_ACTION, PipelineConfig, TurnCommit,
    TurnOutcome, build_transcript,
};
use crate::service::classifier::Classifier;
use crate::service::decision::DecisionEngine;
use crate::service::embedding_store::EmbeddingStore;
use crate::service::error::PipelineError;
use crate::service::extraction::FieldExtractor;
use crate::service::follow_up::FollowUpGenerator;
use crate::service::llm::CompletionCapability;
use crate::service::locks::ThreadLocks;
use crate::service::schema_registry::SchemaRegistry;

pub struct IntakePipeline {
    conversations: Arc<dyn ConversationRepository>,
    embeddings: Arc<EmbeddingStore>,
    classifier: Classifier,
    extractor: FieldExtractor,
    follow_up: FollowUpGenerator,
    decision_engine: DecisionEngine,
    locks: ThreadLocks,
    neighbor_count: usize,
}

impl IntakePipeline {
    pub fn new(
        conversations: Arc<dyn ConversationRepository>,
        tickets: Arc<dyn TicketRepository>,
        embeddings: Arc<EmbeddingStore>,
        completion: Arc<dyn CompletionCapability>,
        registry: Arc<SchemaRegistry>,
        config: &PipelineConfig,
    ) -> Result<Self, regex::Error> {
        tracing::info!(
            schemas = registry.len(),
            schema_policy = ?registry.policy(),
            neighbor_count = config.neighbor_count,
            classifier_examples = config.classifier_examples,
            corpus_size = embeddings.len(),
            "Intake pipeline initialized"
        );

        Ok(Self {
            classifier: Classifier::new(
                completion.clone(),
                tickets.clone(),
                config.classifier_examples,
            ),
            extractor: FieldExtractor::new(completion.clone(), registry, tickets),
            follow_up: FollowUpGenerator::new(completion.clone())?,
            decision_engine: DecisionEngine::new(
                completion,
                embeddings.clone(),
                config.neighbor_count,
            ),
            conversations,
            embeddings,
            locks: ThreadLocks::new(),
            neighbor_count: config.neighbor_count,
        })
    }

    /// Process one inbound message on a thread
    ///
    /// The thread is created if it does not exist yet. Turns on the same
    /// thread are serialized.
    pub async fn process_turn(
        &self,
        thread_id: &str,
        message_text: &str,
    ) -> Result<TurnOutcome, PipelineError> {
        if message_text.trim().is_empty() {
            return Err(PipelineError::EmptyMessage);
        }

        let _guard = self.locks.acquire(thread_id).await;
        let start_time = std::time::Instant::now();
        tracing::debug!(
            thread_id = %thread_id,
            active_threads = self.locks.active(),
            "Turn started"
        );

        let result = self.run_turn(thread_id, message_text).await;

        match &result {
            Ok(outcome) => tracing::info!(
                thread_id = %thread_id,
                request_type = %outcome.request_type,
                missing = outcome.missing_fields.len(),
                decision = ?outcome.final_decision,
                elapsed_ms = start_time.elapsed().as_millis(),
                "Turn processed"
            ),
            Err(e) => tracing::error!(
                thread_id = %thread_id,
                elapsed_ms = start_time.elapsed().as_millis(),
                error = %e,
                "Turn failed; nothing persisted"
            ),
        }

        result
    }

    async fn run_turn(
        &self,
        thread_id: &str,
        message_text: &str,
    ) -> Result<TurnOutcome, PipelineError> {
        let previous_status = self
            .conversations
            .get_thread(thread_id)
            .await?
            .map(|t| t.status)
            .unwrap_or_default();

        let mut messages = self.conversations.list_messages(thread_id, None).await?;
        let inbound = Message::user(thread_id, message_text, Utc::now());
        messages.push(inbound.clone());
        let transcript = build_transcript(&messages);

        let neighbors = self
            .embeddings
            .query(&transcript, self.neighbor_count)
            .await?;

        let request_type = self.classifier.classify(&transcript, &neighbors).await?;
        let extraction = self.extractor.extract(&transcript, &request_type).await?;

        let verdict = self
            .decision_engine
            .decide(
                &transcript,
                &request_type,
                &extraction.provided,
                &extraction.missing,
                Some(&neighbors),
            )
            .await?;

        let next_question = match extraction.missing.as_slice() {
            [] => None,
            [field] => Some(self.follow_up.ask_for_field(field, &transcript).await?),
            fields => Some(self.follow_up.ask_for_fields(fields, &transcript).await?),
        };

        let committed_at = Utc::now();
        let mut new_messages = vec![inbound];
        if let Some(question) = &next_question {
            new_messages.push(Message::system(thread_id, question.clone(), committed_at));
        }

        let status = previous_status.after_turn(!extraction.missing.is_empty());
        if status != previous_status {
            tracing::debug!(
                thread_id = %thread_id,
                from = %previous_status,
                to = %status,
                "Thread status transition"
            );
        }

        let audit = AuditLogEntry {
            thread_id: thread_id.to_string(),
            action: PROCESS_MESSAGE_ACTION.to_string(),
            input_data: serde_json::json!({ "text": message_text }),
            output_data: serde_json::json!({
                "request_type": request_type,
                "missing_fields": extraction.missing,
                "decision": verdict.outcome().map(|o| o.as_str()),
                "risk_score": verdict.risk_score(),
                "confidence_score": verdict.confidence_score(),
            }),
            timestamp: committed_at,
        };

        let decision = self
            .conversations
            .commit_turn(TurnCommit {
                thread_id: thread_id.to_string(),
                messages: new_messages,
                decision: DecisionUpdate {
                    request_type: request_type.clone(),
                    extracted_fields: extraction.extracted_fields(),
                    missing_fields: extraction.missing.clone(),
                    mandatory_fields: extraction.schema.clone(),
                    outcome: verdict.outcome(),
                    rationale: Some(verdict.rationale().to_string()),
                    risk_score: verdict.risk_score(),
                    confidence_score: verdict.confidence_score(),
                },
                audit,
                status,
                committed_at,
            })
            .await?;

        Ok(TurnOutcome {
            request_type: decision.request_type,
            risk_score: decision.risk_score,
            confidence_score: decision.confidence_score,
            missing_fields: decision.missing_fields,
            next_question,
            final_decision: decision.outcome,
            rationale: decision.rationale,
        })
    }
}
