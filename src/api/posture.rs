//! Risk posture endpoint

use actix_web::{HttpResponse, get, web};

use crate::api::error::ApiError;
use crate::service::RiskPostureService;

/// Summarize the riskiest recent decisions
///
/// The pattern analysis is best-effort: when it fails the report is still
/// returned with `analysis` null and `analysis_error` set.
#[utoipa::path(
    get,
    path = "/v1/risk-posture",
    responses(
        (status = 200, description = "Risk posture report", body = crate::model::RiskPostureReport),
        (status = 500, description = "Internal server error", body = crate::api::error::ErrorResponse)
    ),
    tag = "risk-posture"
)]
#[get("/v1/risk-posture")]
pub async fn risk_posture(
    service: web::Data<RiskPostureService>,
) -> Result<HttpResponse, ApiError> {
    let report = service.summarize().await?;
    Ok(HttpResponse::Ok().json(report))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(risk_posture);
}
