pub mod classifier;
pub mod corpus;
pub mod decision;
pub mod embedding_store;
pub mod error;
pub mod extraction;
pub mod follow_up;
pub mod llm;
pub mod locks;
pub mod pipeline;
pub mod posture;
pub mod schema_registry;

#[cfg(test)]
pub(crate) mod testing;

pub use corpus::{CorpusError, load_corpus};
pub use embedding_store::{BruteForceIndex, EmbeddingStore, NeighborIndex};
pub use error::PipelineError;
pub use llm::{CompletionCapability, EmbeddingCapability, LlmClient, OpenAiCapability};
pub use pipeline::IntakePipeline;
pub use posture::RiskPostureService;
pub use schema_registry::SchemaRegistry;
