//! Unified API error handling
//!
//! Every endpoint answers failures with the same JSON body.

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::DbError;
use crate::service::PipelineError;

/// Standard error response format
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Error type/code
    pub error: String,
    /// Human-readable error message
    pub message: String,
    /// Unique request ID for tracing
    pub request_id: String,
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Bad request / validation error (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Nothing to classify against (409)
    #[error("Historical corpus is empty")]
    EmptyCorpus,

    /// The model answered outside its contract (502)
    #[error("Model contract violation in {0}")]
    ModelContractViolation(String),

    /// Embedding or completion backend failed (502)
    #[error("External service error: {0}")]
    ExternalService(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// Database error (500)
    #[error("Database error: {0}")]
    Database(String),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::EmptyCorpus => StatusCode::CONFLICT,
            ApiError::ModelContractViolation(_) | ApiError::ExternalService(_) => {
                StatusCode::BAD_GATEWAY
            }
            ApiError::Internal(_) | ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let error_type = match self {
            ApiError::NotFound(_) => "not_found",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::EmptyCorpus => "empty_corpus",
            ApiError::ModelContractViolation(_) => "model_contract_violation",
            ApiError::ExternalService(_) => "external_service_error",
            ApiError::Internal(_) => "internal_error",
            ApiError::Database(_) => "database_error",
        };

        tracing::error!(
            error_type = error_type,
            status = status.as_u16(),
            message = %self,
            "API error"
        );

        HttpResponse::build(status).json(ErrorResponse {
            error: error_type.to_string(),
            message: self.to_string(),
            request_id: Uuid::new_v4().to_string(),
        })
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::EmptyMessage => ApiError::BadRequest(err.to_string()),
            PipelineError::EmptyCorpus => ApiError::EmptyCorpus,
            // raw model output stays in the logs, not in the response
            PipelineError::ContractViolation { stage, .. } => {
                ApiError::ModelContractViolation(stage.to_string())
            }
            PipelineError::Upstream(e) => ApiError::ExternalService(e.to_string()),
            PipelineError::DataIntegrity(msg) => ApiError::Internal(msg),
            PipelineError::Storage(e) => e.into(),
        }
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        ApiError::Database(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::llm::CapabilityError;

    #[test]
    fn test_pipeline_errors_map_to_status_codes() {
        let cases = [
            (PipelineError::EmptyMessage, StatusCode::BAD_REQUEST),
            (PipelineError::EmptyCorpus, StatusCode::CONFLICT),
            (
                PipelineError::ContractViolation {
                    stage: "classify",
                    reason: "bad label".to_string(),
                    raw: "secret raw output".to_string(),
                },
                StatusCode::BAD_GATEWAY,
            ),
            (
                PipelineError::Upstream(CapabilityError::Completion("timeout".to_string())),
                StatusCode::BAD_GATEWAY,
            ),
            (
                PipelineError::Storage(DbError::Serialization("bad row".to_string())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status_code(), status);
        }
    }

    #[test]
    fn test_contract_violation_hides_raw_output() {
        let api: ApiError = PipelineError::ContractViolation {
            stage: "decide",
            reason: "risk_score 150 outside [0, 100]".to_string(),
            raw: "{\"risk_score\":150}".to_string(),
        }
        .into();

        assert!(!api.to_string().contains("150"));
        assert_eq!(api.error_response().status(), StatusCode::BAD_GATEWAY);
    }
}
