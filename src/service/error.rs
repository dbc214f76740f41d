//! Error taxonomy of the decision pipeline

use thiserror::Error;

use crate::db::DbError;
use crate::service::llm::CapabilityError;

/// Error type for one pipeline turn
///
/// A failed turn persists nothing.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PipelineError {
    /// Embedding or completion call failed; never retried by the pipeline
    #[error("Upstream capability failed: {0}")]
    Upstream(#[from] CapabilityError),

    /// The model answered, but not within the agreed shape or ranges
    #[error("Contract violation in {stage}: {reason}")]
    ContractViolation {
        stage: &'static str,
        reason: String,
        raw: String,
    },

    #[error("Data integrity error: {0}")]
    DataIntegrity(String),

    #[error("Historical corpus has no request types to classify into")]
    EmptyCorpus,

    #[error("Message text is empty")]
    EmptyMessage,

    #[error("Storage error: {0}")]
    Storage(#[from] DbError),
}

impl PipelineError {
    /// Build a contract violation and log the offending raw output
    pub fn contract_violation(
        stage: &'static str,
        reason: impl Into<String>,
        raw: impl Into<String>,
    ) -> Self {
        let reason = reason.into();
        let raw = raw.into();
        tracing::error!(
            stage = stage,
            reason = %reason,
            raw = %raw,
            "Model response violated its contract"
        );
        PipelineError::ContractViolation { stage, reason, raw }
    }
}
