use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};

use crate::handlers;
use crate::state::AppState;

/// Maximum accepted request body (1 MiB).
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    let health_routes = Router::new()
        .route("/", get(handlers::health::root))
        .route("/health", get(handlers::health::health_check))
        .route("/health/ready", get(handlers::health::readiness_check));

    let conversation_routes = Router::new()
        .route("/chat", post(handlers::chat::chat_handler))
        .route(
            "/conversations/{id}",
            get(handlers::conversations::get_conversation_handler)
                .delete(handlers::conversations::delete_conversation_handler),
        );

    Router::new()
        .merge(health_routes)
        .merge(conversation_routes)
        .with_state(state)
        // CORS, any origin
        .layer(CorsLayer::permissive())
        // Tracing
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(true)),
        )
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GenerationProfile, Settings};
    use crate::logging::ActivityLogger;
    use crate::models::chat::ChatMessage;
    use crate::services::conversation::{ConversationManager, LlmProvider, DEGRADED_REPLY_PREFIX};
    use crate::utils::error::GenerationError;
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    /// Answers debate calls with a fixed line; classification always fails.
    struct CannedLlm;

    #[async_trait::async_trait]
    impl LlmProvider for CannedLlm {
        async fn generate(
            &self,
            _messages: &[ChatMessage],
            profile: &GenerationProfile,
        ) -> Result<String, GenerationError> {
            if profile.max_tokens == GenerationProfile::classification().max_tokens {
                return Err(GenerationError::Empty);
            }
            Ok("Here is my counterpoint.".to_string())
        }
    }

    struct DownLlm;

    #[async_trait::async_trait]
    impl LlmProvider for DownLlm {
        async fn generate(
            &self,
            _messages: &[ChatMessage],
            _profile: &GenerationProfile,
        ) -> Result<String, GenerationError> {
            Err(GenerationError::Transport("connection refused".into()))
        }
    }

    fn make_app_with(provider: Arc<dyn LlmProvider>) -> Router {
        let settings = Settings::from_toml("[llm]\nretry_backoff_ms = 0\n").unwrap();
        let (logger, _activity) = ActivityLogger::detached(64);
        let manager = Arc::new(ConversationManager::new(provider, &settings, logger));
        build_router(AppState::new(manager))
    }

    fn make_app() -> Router {
        make_app_with(Arc::new(CannedLlm))
    }

    fn post_chat(body: Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/chat")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(resp: axum::response::Response) -> Value {
        let body = axum::body::to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_root_and_health() {
        let app = make_app();

        let resp = app
            .clone()
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            json_body(resp).await,
            json!({"message": "DebateBot API is running!", "status": "healthy"})
        );

        let resp = app
            .clone()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_body(resp).await["status"], "healthy");

        let resp = app
            .oneshot(Request::get("/health/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(
            json_body(resp).await,
            json!({"status": "ready", "active_conversations": 0, "activity_queue_len": 0})
        );
    }

    #[tokio::test]
    async fn test_chat_new_then_continue() {
        let app = make_app();

        let resp = app
            .clone()
            .oneshot(post_chat(json!({
                "message": "AI will do more good than harm",
                "topic": "AI safety",
                "side": "con"
            })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        let id = body["conversation_id"].as_str().unwrap().to_string();
        assert_eq!(
            body["message"],
            json!([
                {"role": "user", "message": "AI will do more good than harm"},
                {"role": "assistant", "message": "Here is my counterpoint."}
            ])
        );
        assert!(body.get("degraded").is_none());

        let resp = app
            .clone()
            .oneshot(post_chat(json!({"conversation_id": id, "message": "Why?"})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        assert_eq!(body["conversation_id"], id.as_str());
        assert_eq!(body["message"].as_array().unwrap().len(), 4);

        let resp = app
            .oneshot(
                Request::get(format!("/conversations/{}", id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        assert_eq!(body["topic"], "AI safety");
        assert_eq!(body["side"], "con");
        assert_eq!(body["messages"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_chat_unknown_conversation_is_404() {
        let resp = make_app()
            .oneshot(post_chat(json!({"conversation_id": "nope", "message": "hi"})))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body = json_body(resp).await;
        assert_eq!(body["error"], "NotFound");
        assert_eq!(body["message"], "Conversation not found");
    }

    #[tokio::test]
    async fn test_chat_blank_conversation_id_starts_new() {
        let app = make_app();

        for blank in ["", "   "] {
            let resp = app
                .clone()
                .oneshot(post_chat(json!({
                    "conversation_id": blank,
                    "message": "Let's debate: cats",
                    "side": "pro"
                })))
                .await
                .unwrap();

            assert_eq!(resp.status(), StatusCode::OK);
            let body = json_body(resp).await;
            assert_eq!(body["conversation_id"].as_str().unwrap().len(), 36);
            assert_eq!(body["message"].as_array().unwrap().len(), 2);
        }
    }

    #[tokio::test]
    async fn test_chat_rejects_bad_input() {
        let app = make_app();

        let resp = app.clone().oneshot(post_chat(json!({"message": "   "}))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = app
            .clone()
            .oneshot(post_chat(json!({"message": "hi", "side": "neutral"})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let resp = app.oneshot(post_chat(json!({"topic": "x"}))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_chat_degraded_reply_is_200() {
        let resp = make_app_with(Arc::new(DownLlm))
            .oneshot(post_chat(json!({"message": "hello", "side": "pro"})))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        assert_eq!(body["degraded"], true);
        let reply = body["message"][1]["message"].as_str().unwrap();
        assert!(reply.starts_with(DEGRADED_REPLY_PREFIX));
        assert!(reply.contains("connection refused"));
    }

    #[tokio::test]
    async fn test_delete_conversation() {
        let app = make_app();
        let resp = app
            .clone()
            .oneshot(post_chat(json!({"message": "Let's debate: remote work"})))
            .await
            .unwrap();
        let id = json_body(resp).await["conversation_id"].as_str().unwrap().to_string();

        let delete = || {
            Request::builder()
                .method(Method::DELETE)
                .uri(format!("/conversations/{}", id))
                .body(Body::empty())
                .unwrap()
        };

        let resp = app.clone().oneshot(delete()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            json_body(resp).await,
            json!({"message": "Conversation deleted successfully"})
        );

        let resp = app.clone().oneshot(delete()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = app
            .oneshot(
                Request::get(format!("/conversations/{}", id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let huge = "x".repeat(MAX_BODY_BYTES + 1);
        let resp = make_app()
            .oneshot(post_chat(json!({"message": huge})))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
