//! REST API endpoints for conversation threads

use std::sync::Arc;

use actix_web::{HttpResponse, get, post, web};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::db::{ConversationRepository, MAX_THREAD_ID_LEN};
use crate::model::ThreadStatus;
use crate::service::IntakePipeline;

/// Inbound chat message
#[derive(Debug, Deserialize, ToSchema)]
pub struct MessageInput {
    pub text: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateThreadResponse {
    pub thread_id: String,
    pub status: ThreadStatus,
}

/// Open a new conversation thread
#[utoipa::path(
    post,
    path = "/v1/threads",
    responses(
        (status = 201, description = "Thread created", body = CreateThreadResponse),
        (status = 500, description = "Internal server error", body = crate::api::error::ErrorResponse)
    ),
    tag = "threads"
)]
#[post("/v1/threads")]
pub async fn create_thread(
    conversations: web::Data<dyn ConversationRepository>,
) -> Result<HttpResponse, ApiError> {
    let thread_id = Uuid::new_v4().to_string();
    let thread = conversations.create_thread(&thread_id).await?;

    tracing::info!(thread_id = %thread.thread_id, "Thread created");

    Ok(HttpResponse::Created().json(CreateThreadResponse {
        thread_id: thread.thread_id,
        status: thread.status,
    }))
}

/// Process a message on a thread and return the turn result
#[utoipa::path(
    post,
    path = "/v1/threads/{thread_id}/messages",
    params(
        ("thread_id" = String, Path, description = "Conversation thread ID")
    ),
    request_body = MessageInput,
    responses(
        (status = 200, description = "Message processed", body = crate::model::TurnOutcome),
        (status = 400, description = "Empty message or thread ID too long", body = crate::api::error::ErrorResponse),
        (status = 409, description = "No historical corpus loaded", body = crate::api::error::ErrorResponse),
        (status = 502, description = "Language model failed or misbehaved", body = crate::api::error::ErrorResponse)
    ),
    tag = "threads"
)]
#[post("/v1/threads/{thread_id}/messages")]
pub async fn post_message(
    pipeline: web::Data<IntakePipeline>,
    path: web::Path<String>,
    body: web::Json<MessageInput>,
) -> Result<HttpResponse, ApiError> {
    let thread_id = path.into_inner();
    if thread_id.len() > MAX_THREAD_ID_LEN {
        return Err(ApiError::BadRequest(format!(
            "thread_id exceeds {} bytes",
            MAX_THREAD_ID_LEN
        )));
    }
    let outcome = pipeline.process_turn(&thread_id, &body.text).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

/// Get the decision record of a thread
#[utoipa::path(
    get,
    path = "/v1/threads/{thread_id}/decision",
    params(
        ("thread_id" = String, Path, description = "Conversation thread ID")
    ),
    responses(
        (status = 200, description = "Decision retrieved", body = crate::model::Decision),
        (status = 404, description = "No decision for thread", body = crate::api::error::ErrorResponse)
    ),
    tag = "threads"
)]
#[get("/v1/threads/{thread_id}/decision")]
pub async fn get_decision(
    conversations: web::Data<dyn ConversationRepository>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let thread_id = path.into_inner();
    match conversations.get_decision(&thread_id).await? {
        Some(decision) => Ok(HttpResponse::Ok().json(decision)),
        None => Err(ApiError::NotFound(format!("decision for thread {}", thread_id))),
    }
}

/// Configure thread routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(create_thread)
        .service(post_message)
        .service(get_decision);
}

/// Handler data for a conversation repository trait object
pub fn conversations_data(
    conversations: Arc<dyn ConversationRepository>,
) -> web::Data<dyn ConversationRepository> {
    web::Data::from(conversations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::model::{PipelineConfig, TurnOutcome};
    use crate::service::classifier::prompts::CLASSIFICATION_PREAMBLE;
    use crate::service::extraction::prompts::EXTRACTION_PREAMBLE;
    use crate::service::follow_up::FOLLOW_UP_PREAMBLE;
    use crate::service::testing::{KeywordEmbedder, ScriptedCompletion, ticket_with};
    use crate::service::{BruteForceIndex, EmbeddingStore, SchemaRegistry};
    use actix_web::{App, http::StatusCode, test};
    use serde_json::json;

    fn pipeline(store: Arc<MemoryStore>) -> IntakePipeline {
        let tickets = vec![ticket_with(
            "H1",
            "VPN Access",
            &["Justification", "Manager Approval"],
            "Approved",
            20,
            vec![1.0, 0.0],
        )];
        let completion = Arc::new(
            ScriptedCompletion::new()
                .text(CLASSIFICATION_PREAMBLE, "VPN Access")
                .structured(
                    EXTRACTION_PREAMBLE,
                    json!({
                        "fields": {"Justification": "remote work", "Manager Approval": "MISSING"},
                        "requested_access": "VPN"
                    }),
                )
                .text(FOLLOW_UP_PREAMBLE, "Who gave the Manager Approval?"),
        );
        let config = PipelineConfig::default();
        let registry = Arc::new(SchemaRegistry::build(&tickets, config.schema_policy));
        let index = Arc::new(BruteForceIndex::build(tickets, None));
        let embeddings = Arc::new(EmbeddingStore::new(
            Arc::new(KeywordEmbedder::new(&["vpn", "aws"])),
            index,
        ));
        IntakePipeline::new(store.clone(), store, embeddings, completion, registry, &config)
            .unwrap()
    }

    #[actix_web::test]
    async fn test_thread_lifecycle_over_http() {
        let store = Arc::new(MemoryStore::with_tickets(vec![ticket_with(
            "H1",
            "VPN Access",
            &["Justification", "Manager Approval"],
            "Approved",
            20,
            vec![1.0, 0.0],
        )]));
        let app = test::init_service(
            App::new()
                .app_data(conversations_data(store.clone()))
                .app_data(web::Data::new(pipeline(store.clone())))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post().uri("/v1/threads").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created: serde_json::Value = test::read_body_json(resp).await;
        let thread_id = created["thread_id"].as_str().unwrap().to_string();

        let req = test::TestRequest::get()
            .uri(&format!("/v1/threads/{}/decision", thread_id))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::post()
            .uri(&format!("/v1/threads/{}/messages", thread_id))
            .set_json(json!({"text": "I need VPN access for remote work"}))
            .to_request();
        let outcome: TurnOutcome = test::call_and_read_body_json(&app, req).await;
        assert_eq!(outcome.missing_fields, vec!["Manager Approval".to_string()]);
        assert!(outcome.next_question.is_some());

        let req = test::TestRequest::get()
            .uri(&format!("/v1/threads/{}/decision", thread_id))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_blank_message_is_bad_request() {
        let store = Arc::new(MemoryStore::new());
        let app = test::init_service(
            App::new()
                .app_data(conversations_data(store.clone()))
                .app_data(web::Data::new(pipeline(store)))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/v1/threads/t1/messages")
            .set_json(json!({"text": "   "}))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "bad_request");
    }

    #[actix_web::test]
    async fn test_oversized_thread_id_rejected_before_pipeline() {
        let store = Arc::new(MemoryStore::new());
        let app = test::init_service(
            App::new()
                .app_data(conversations_data(store.clone()))
                .app_data(web::Data::new(pipeline(store.clone())))
                .configure(configure),
        )
        .await;

        let long_id = "t".repeat(MAX_THREAD_ID_LEN + 1);
        let req = test::TestRequest::post()
            .uri(&format!("/v1/threads/{}/messages", long_id))
            .set_json(json!({"text": "I need VPN access"}))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(store.get_thread(&long_id).await.unwrap().is_none());
    }
}
