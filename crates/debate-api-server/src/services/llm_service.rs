use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{GenerationProfile, LlmConfig};
use crate::models::chat::ChatMessage;
use crate::services::conversation::generation::LlmProvider;
use crate::utils::error::GenerationError;

#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    pub max_tokens: usize,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    pub stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    content: Option<String>,
}

/// OpenAI-compatible chat completion client.
#[derive(Clone)]
pub struct LlmService {
    client: Client,
    config: LlmConfig,
}

impl LlmService {
    pub fn new(config: LlmConfig) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| GenerationError::Transport(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    /// Generate completion without streaming (wait for full response)
    pub async fn generate_chat(
        &self,
        messages: &[ChatMessage],
        profile: &GenerationProfile,
    ) -> Result<String, GenerationError> {
        debug!(
            "Starting chat generation with {} messages (model: {})",
            messages.len(),
            self.config.model
        );

        let request = ChatCompletionRequest {
            model: &self.config.model,
            messages,
            max_tokens: profile.max_tokens,
            temperature: profile.temperature,
            presence_penalty: profile.presence_penalty,
            frequency_penalty: profile.frequency_penalty,
            stream: false,
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Status { status, body });
        }

        let chat_response: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Malformed(e.to_string()))?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or(GenerationError::Empty)
    }
}

#[async_trait::async_trait]
impl LlmProvider for LlmService {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        profile: &GenerationProfile,
    ) -> Result<String, GenerationError> {
        self.generate_chat(messages, profile).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use axum::{
        http::{HeaderMap, StatusCode},
        routing::post,
        Json, Router,
    };
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};

    type Captured = Arc<Mutex<Option<(HeaderMap, Value)>>>;

    /// Serve `router` on an ephemeral port and return its base URL.
    async fn spawn_upstream(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn service(base_url: String) -> LlmService {
        let mut config = Settings::from_toml("").unwrap().llm;
        config.base_url = base_url;
        config.api_key = "sk-test".into();
        LlmService::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_request_shape_and_reply() {
        let captured: Captured = Arc::default();
        let sink = captured.clone();
        let router = Router::new().route(
            "/v1/chat/completions",
            post(move |headers: HeaderMap, Json(body): Json<Value>| {
                let sink = sink.clone();
                async move {
                    *sink.lock().unwrap() = Some((headers, body));
                    Json(json!({
                        "choices": [{"message": {"role": "assistant", "content": "  Consider the costs. "}}]
                    }))
                }
            }),
        );
        let llm = service(spawn_upstream(router).await);

        let messages = vec![ChatMessage::system("persona".into()), ChatMessage::user("hi".into())];
        let text = llm.generate(&messages, &GenerationProfile::debate()).await.unwrap();
        assert_eq!(text, "Consider the costs.");

        let (headers, body) = captured.lock().unwrap().take().unwrap();
        assert_eq!(headers["authorization"], "Bearer sk-test");
        assert_eq!(body["model"], "gpt-3.5-turbo");
        assert_eq!(body["max_tokens"], 500);
        assert_eq!(body["stream"], false);
        assert!(body.get("presence_penalty").is_some());
        assert_eq!(body["messages"][0], json!({"role": "system", "content": "persona"}));
        assert_eq!(body["messages"][1], json!({"role": "user", "content": "hi"}));
    }

    #[tokio::test]
    async fn test_classification_profile_omits_penalties() {
        let captured: Captured = Arc::default();
        let sink = captured.clone();
        let router = Router::new().route(
            "/v1/chat/completions",
            post(move |headers: HeaderMap, Json(body): Json<Value>| {
                let sink = sink.clone();
                async move {
                    *sink.lock().unwrap() = Some((headers, body));
                    Json(json!({"choices": [{"message": {"content": "TOPIC: x\nSIDE: pro"}}]}))
                }
            }),
        );
        let llm = service(spawn_upstream(router).await);

        llm.generate(&[], &GenerationProfile::classification()).await.unwrap();

        let (_, body) = captured.lock().unwrap().take().unwrap();
        assert_eq!(body["max_tokens"], 100);
        assert!(body.get("presence_penalty").is_none());
        assert!(body.get("frequency_penalty").is_none());
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async { (StatusCode::TOO_MANY_REQUESTS, "rate limit exceeded") }),
        );
        let llm = service(spawn_upstream(router).await);

        let err = llm.generate(&[], &GenerationProfile::debate()).await.unwrap_err();
        assert_eq!(
            err,
            GenerationError::Status { status: 429, body: "rate limit exceeded".into() }
        );
    }

    #[tokio::test]
    async fn test_malformed_and_empty_bodies() {
        let router = Router::new()
            .route("/bad/v1/chat/completions", post(|| async { "not json" }))
            .route(
                "/empty/v1/chat/completions",
                post(|| async { Json(json!({"choices": []})) }),
            );
        let base = spawn_upstream(router).await;

        let err = service(format!("{}/bad", base))
            .generate(&[], &GenerationProfile::debate())
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Malformed(_)));

        let err = service(format!("{}/empty", base))
            .generate(&[], &GenerationProfile::debate())
            .await
            .unwrap_err();
        assert_eq!(err, GenerationError::Empty);
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = service(format!("http://{}", addr))
            .generate(&[], &GenerationProfile::debate())
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Transport(_)));
    }
}
