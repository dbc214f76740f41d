//! OpenAPI specification endpoints

use actix_web::{HttpResponse, Responder, get};
use utoipa::OpenApi;

use crate::api::{error, health, posture, threads};
use crate::model;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Access Intake API",
        description = "Conversational intake of access requests with precedent-based approve/reject decisions"
    ),
    paths(
        threads::create_thread,
        threads::post_message,
        threads::get_decision,
        posture::risk_posture,
        health::liveness,
        health::readiness,
    ),
    components(schemas(
        threads::MessageInput,
        threads::CreateThreadResponse,
        model::TurnOutcome,
        model::Decision,
        model::Outcome,
        model::ThreadStatus,
        model::RiskPostureReport,
        model::RiskyRequest,
        model::extracted::ExtractedPostureAnalysis,
        model::extracted::ExtractedAlertLevel,
        error::ErrorResponse,
        health::HealthStatus,
        health::ReadinessStatus,
        health::DependencyHealth,
    )),
    tags(
        (name = "threads", description = "Conversation threads and turns"),
        (name = "risk-posture", description = "Risk posture reporting"),
        (name = "health", description = "Liveness and readiness probes")
    )
)]
pub struct ApiDoc;

/// Serve OpenAPI JSON specification
#[get("/openapi.json")]
pub async fn openapi_json() -> impl Responder {
    HttpResponse::Ok().json(ApiDoc::openapi())
}

/// Serve OpenAPI YAML specification
#[get("/openapi.yaml")]
pub async fn openapi_yaml() -> impl Responder {
    match ApiDoc::openapi().to_yaml() {
        Ok(yaml) => HttpResponse::Ok().content_type("text/yaml").body(yaml),
        Err(e) => {
            tracing::error!(error = %e, "Failed to render OpenAPI YAML");
            HttpResponse::InternalServerError().finish()
        }
    }
}

/// Configure OpenAPI routes
pub fn configure(cfg: &mut actix_web::web::ServiceConfig) {
    cfg.service(openapi_json).service(openapi_yaml);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_every_route() {
        let doc = serde_json::to_value(ApiDoc::openapi()).unwrap();
        let paths = doc["paths"].as_object().unwrap();

        for path in [
            "/v1/threads",
            "/v1/threads/{thread_id}/messages",
            "/v1/threads/{thread_id}/decision",
            "/v1/risk-posture",
            "/health/live",
            "/health/ready",
        ] {
            assert!(paths.contains_key(path), "missing {path}");
        }
    }
}
