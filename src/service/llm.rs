//! Language-model capabilities and the shared OpenAI client
//!
//! Pipeline components receive the capabilities as trait objects so tests can
//! substitute deterministic fakes.

use async_trait::async_trait;
use rig::completion::Prompt;
use rig::embeddings::EmbeddingModel;
use rig::prelude::*;
use rig::providers::openai;

/// Environment variable for the completion model (defaults to gpt-4o)
const ENV_COMPLETION_MODEL: &str = "COMPLETION_MODEL";

/// Environment variable for the embedding model
const ENV_EMBEDDING_MODEL: &str = "EMBEDDING_MODEL";

const DEFAULT_COMPLETION_MODEL: &str = openai::GPT_4O;
const DEFAULT_EMBEDDING_MODEL: &str = openai::TEXT_EMBEDDING_3_SMALL;

/// Texts per embedding request during bulk loads
pub const EMBEDDING_BATCH_SIZE: usize = 100;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CapabilityError {
    #[error("Completion request failed: {0}")]
    Completion(String),

    #[error("Embedding request failed: {0}")]
    Embedding(String),

    #[error("Completion returned unparseable output: {0}")]
    MalformedOutput(String),
}

/// "Generate a vector for text"
#[async_trait]
pub trait EmbeddingCapability: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f64>, CapabilityError>;

    /// One vector per input, in input order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f64>>, CapabilityError>;
}

/// "Generate an unstructured or structured completion for a prompt"
#[async_trait]
pub trait CompletionCapability: Send + Sync {
    async fn complete_text(&self, preamble: &str, prompt: &str) -> Result<String, CapabilityError>;

    /// Returns a JSON object. Conformance to `schema_hint` is NOT guaranteed;
    /// callers validate the shape.
    async fn complete_structured(
        &self,
        preamble: &str,
        prompt: &str,
        schema_hint: &serde_json::Value,
    ) -> Result<serde_json::Value, CapabilityError>;
}

/// Shared LLM client wrapper
#[derive(Clone)]
pub struct LlmClient {
    client: openai::Client,
}

impl LlmClient {
    /// Create a new LLM client with the provided API key
    pub fn new(api_key: &str) -> Result<Self, String> {
        let client = openai::Client::new(api_key);

        Ok(Self { client })
    }

    /// Get a reference to the underlying OpenAI client
    pub fn openai_client(&self) -> &openai::Client {
        &self.client
    }
}

/// OpenAI-backed implementation of both capabilities
#[derive(Clone)]
pub struct OpenAiCapability {
    llm_client: LlmClient,
    completion_model: String,
    embedding_model: String,
}

impl OpenAiCapability {
    /// Uses COMPLETION_MODEL / EMBEDDING_MODEL env vars when set
    pub fn new(llm_client: LlmClient) -> Self {
        let completion_model = std::env::var(ENV_COMPLETION_MODEL)
            .unwrap_or_else(|_| DEFAULT_COMPLETION_MODEL.to_string());
        let embedding_model = std::env::var(ENV_EMBEDDING_MODEL)
            .unwrap_or_else(|_| DEFAULT_EMBEDDING_MODEL.to_string());

        tracing::info!(
            completion_model = %completion_model,
            embedding_model = %embedding_model,
            "OpenAI capability initialized"
        );

        Self {
            llm_client,
            completion_model,
            embedding_model,
        }
    }
}

#[async_trait]
impl CompletionCapability for OpenAiCapability {
    async fn complete_text(&self, preamble: &str, prompt: &str) -> Result<String, CapabilityError> {
        let start_time = std::time::Instant::now();

        tracing::debug!(
            model = %self.completion_model,
            prompt_length = prompt.len(),
            "Initiating OpenAI API call for text completion"
        );

        let agent = self
            .llm_client
            .openai_client()
            .agent(&self.completion_model)
            .preamble(preamble)
            .build();

        match agent.prompt(prompt).await {
            Ok(text) => {
                tracing::info!(
                    model = %self.completion_model,
                    elapsed_ms = start_time.elapsed().as_millis(),
                    "OpenAI API call for text completion completed successfully"
                );
                Ok(text.trim().to_string())
            }
            Err(e) => {
                tracing::error!(
                    model = %self.completion_model,
                    elapsed_ms = start_time.elapsed().as_millis(),
                    error = %e,
                    "OpenAI API call for text completion failed"
                );
                Err(CapabilityError::Completion(e.to_string()))
            }
        }
    }

    async fn complete_structured(
        &self,
        preamble: &str,
        prompt: &str,
        schema_hint: &serde_json::Value,
    ) -> Result<serde_json::Value, CapabilityError> {
        let start_time = std::time::Instant::now();

        tracing::debug!(
            model = %self.completion_model,
            prompt_length = prompt.len(),
            "Initiating OpenAI API call for structured completion"
        );

        let preamble = format!(
            "{}\n\nRespond with a single JSON object conforming to this JSON schema:\n{}",
            preamble, schema_hint
        );

        // Use temperature=0.0 and seed for reproducible outputs
        let agent = self
            .llm_client
            .openai_client()
            .agent(&self.completion_model)
            .preamble(&preamble)
            .additional_params(serde_json::json!({
                "temperature": 0.0,
                "seed": 42,
                "response_format": {"type": "json_object"}
            }))
            .build();

        let raw = match agent.prompt(prompt).await {
            Ok(text) => {
                tracing::info!(
                    model = %self.completion_model,
                    elapsed_ms = start_time.elapsed().as_millis(),
                    "OpenAI API call for structured completion completed successfully"
                );
                text
            }
            Err(e) => {
                tracing::error!(
                    model = %self.completion_model,
                    elapsed_ms = start_time.elapsed().as_millis(),
                    error = %e,
                    "OpenAI API call for structured completion failed"
                );
                return Err(CapabilityError::Completion(e.to_string()));
            }
        };

        serde_json::from_str(raw.trim()).map_err(|e| {
            tracing::error!(error = %e, raw = %raw, "Structured completion is not valid JSON");
            CapabilityError::MalformedOutput(format!("{}: {}", e, raw))
        })
    }
}

#[async_trait]
impl EmbeddingCapability for OpenAiCapability {
    async fn embed(&self, text: &str) -> Result<Vec<f64>, CapabilityError> {
        let start_time = std::time::Instant::now();
        let model = self
            .llm_client
            .openai_client()
            .embedding_model(&self.embedding_model);

        let embedding = model.embed_text(text).await.map_err(|e| {
            tracing::error!(
                model = %self.embedding_model,
                elapsed_ms = start_time.elapsed().as_millis(),
                error = %e,
                "OpenAI embedding call failed"
            );
            CapabilityError::Embedding(e.to_string())
        })?;

        tracing::debug!(
            model = %self.embedding_model,
            elapsed_ms = start_time.elapsed().as_millis(),
            dimension = embedding.vec.len(),
            "OpenAI embedding call completed"
        );

        Ok(embedding.vec)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f64>>, CapabilityError> {
        let model = self
            .llm_client
            .openai_client()
            .embedding_model(&self.embedding_model);

        let mut vectors = Vec::with_capacity(texts.len());
        for (batch_index, batch) in texts.chunks(EMBEDDING_BATCH_SIZE).enumerate() {
            let start_time = std::time::Instant::now();
            let embeddings = model
                .embed_texts(batch.to_vec())
                .await
                .map_err(|e| CapabilityError::Embedding(e.to_string()))?;

            tracing::info!(
                batch = batch_index,
                size = batch.len(),
                elapsed_ms = start_time.elapsed().as_millis(),
                "Embedded batch"
            );

            vectors.extend(embeddings.into_iter().map(|e| e.vec));
        }

        Ok(vectors)
    }
}
