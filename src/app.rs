//! Application state and service initialization
//!
//! This module centralizes storage selection, corpus indexing and the
//! service dependency graph so `main` only wires handlers.

use std::path::Path;
use std::sync::Arc;

use sqlx::PgPool;

use crate::db::{ConversationRepository, MemoryStore, PgStore, TicketRepository};
use crate::model::Config;
use crate::service::{
    BruteForceIndex, CompletionCapability, EmbeddingCapability, EmbeddingStore, IntakePipeline,
    LlmClient, NeighborIndex, OpenAiCapability, RiskPostureService, SchemaRegistry, load_corpus,
};

/// Application state containing all services and shared resources
pub struct AppState {
    /// Database connection pool, absent when running in memory
    pub db_pool: Option<PgPool>,
    pub conversations: Arc<dyn ConversationRepository>,
    pub embeddings: Arc<EmbeddingStore>,
    pub pipeline: Arc<IntakePipeline>,
    pub risk_posture: Arc<RiskPostureService>,
}

impl AppState {
    /// Initialize all services and build application state
    ///
    /// This performs:
    /// 1. LLM client initialization (requires OPENAI_API_KEY)
    /// 2. Storage selection (PostgreSQL or in-memory) and schema initialization;
    ///    an in-memory store is seeded from `corpus_path` when given
    /// 3. Corpus load into the neighbor index and schema registry
    /// 4. Service dependency graph construction
    pub async fn new(
        config: Config,
        in_memory: bool,
        corpus_path: Option<&Path>,
    ) -> Result<Self, AppError> {
        let capability = Arc::new(Self::build_capability()?);
        let embedder: Arc<dyn EmbeddingCapability> = capability.clone();
        let completion: Arc<dyn CompletionCapability> = capability;

        let (db_pool, conversations, tickets) =
            Self::build_storage(in_memory, corpus_path, embedder.as_ref()).await?;

        let corpus = tickets.load_all_historical_tickets().await?;
        let registry = Arc::new(SchemaRegistry::build(&corpus, config.pipeline.schema_policy));
        if registry.is_empty() {
            tracing::warn!("Historical corpus is empty, every turn will fail until a corpus is loaded");
        }

        let index: Arc<dyn NeighborIndex> = Arc::new(BruteForceIndex::build(
            corpus,
            config.pipeline.embedding_dimension,
        ));
        let embeddings = Arc::new(EmbeddingStore::new(embedder, index));

        let pipeline = Arc::new(IntakePipeline::new(
            conversations.clone(),
            tickets,
            embeddings.clone(),
            completion.clone(),
            registry,
            &config.pipeline,
        )?);

        let risk_posture = Arc::new(RiskPostureService::new(
            conversations.clone(),
            completion,
            config.risk_posture,
        ));

        Ok(Self {
            db_pool,
            conversations,
            embeddings,
            pipeline,
            risk_posture,
        })
    }

    /// Pick the backing store; one instance serves both repository traits
    async fn build_storage(
        in_memory: bool,
        corpus_path: Option<&Path>,
        embedder: &dyn EmbeddingCapability,
    ) -> Result<
        (
            Option<PgPool>,
            Arc<dyn ConversationRepository>,
            Arc<dyn TicketRepository>,
        ),
        AppError,
    > {
        if in_memory {
            tracing::info!("Using in-memory storage");
            let store = Arc::new(Self::seed_memory_store(corpus_path, embedder).await?);
            let conversations: Arc<dyn ConversationRepository> = store.clone();
            let tickets: Arc<dyn TicketRepository> = store;
            return Ok((None, conversations, tickets));
        }

        let pool = Self::connect_database().await?;
        let store = Arc::new(PgStore::new(pool.clone()));
        let conversations: Arc<dyn ConversationRepository> = store.clone();
        let tickets: Arc<dyn TicketRepository> = store;
        Ok((Some(pool), conversations, tickets))
    }

    /// In-memory store, loaded from a corpus file when one is given
    async fn seed_memory_store(
        corpus_path: Option<&Path>,
        embedder: &dyn EmbeddingCapability,
    ) -> Result<MemoryStore, AppError> {
        let store = MemoryStore::new();
        match corpus_path {
            Some(path) => {
                let loaded = load_corpus(path, embedder, &store).await?;
                tracing::info!(path = %path.display(), loaded, "Seeded in-memory corpus");
            }
            None => tracing::warn!("No --corpus given for in-memory storage"),
        }
        Ok(store)
    }

    /// Connect to PostgreSQL and make sure the schema exists
    pub async fn connect_database() -> Result<PgPool, AppError> {
        let pool = crate::db::create_pool()
            .await
            .map_err(|e| AppError::DatabaseInit(e.to_string()))?;

        crate::db::init_schema(&pool)
            .await
            .map_err(|e| AppError::DatabaseInit(e.to_string()))?;

        Ok(pool)
    }

    /// Build the OpenAI-backed capability from OPENAI_API_KEY
    pub fn build_capability() -> Result<OpenAiCapability, AppError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| AppError::MissingConfig("OPENAI_API_KEY"))?;

        let llm_client = LlmClient::new(&api_key)
            .map_err(|_| AppError::InvalidConfig("Invalid OPENAI_API_KEY"))?;

        Ok(OpenAiCapability::new(llm_client))
    }
}

/// Application-level errors
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum AppError {
    /// Database initialization failed
    #[error("Database initialization failed: {0}")]
    DatabaseInit(String),

    /// Missing required configuration
    #[error("Missing required configuration: {0}")]
    MissingConfig(&'static str),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(&'static str),

    #[error("Storage error: {0}")]
    Storage(#[from] crate::db::DbError),

    #[error("Invalid sanitizer pattern: {0}")]
    Regex(#[from] regex::Error),

    #[error("Corpus load failed: {0}")]
    Corpus(#[from] crate::service::CorpusError),

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}
