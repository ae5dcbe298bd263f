use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::env;
use crate::error::CommonError;

#[derive(Clone, Debug)]
pub struct OpenAiClientConfig {
    pub base_url: String,
    /// `None` leaves the call unbounded.
    pub default_timeout: Option<Duration>,
    pub max_error_body_bytes: usize,
}

impl Default for OpenAiClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            default_timeout: None,
            max_error_body_bytes: 8 * 1024,
        }
    }
}

impl OpenAiClientConfig {
    /// Optional:
    /// - `OPENAI_BASE_URL`: API root, e.g. "https://api.openai.com/v1"
    /// - `OPENAI_TIMEOUT_SECS`: per-call timeout (unset = no client-side timeout)
    /// - `OPENAI_MAX_ERROR_BODY_BYTES`: cap on upstream error bodies read into memory
    pub fn from_env() -> Result<Self, CommonError> {
        let defaults = Self::default();

        let base_url = env::var_or("OPENAI_BASE_URL", &defaults.base_url);

        let default_timeout = env::parse_var::<u64>("OPENAI_TIMEOUT_SECS")?
            .filter(|&secs| secs > 0)
            .map(Duration::from_secs);

        let max_error_body_bytes = env::parse_var::<usize>("OPENAI_MAX_ERROR_BODY_BYTES")?
            .unwrap_or(defaults.max_error_body_bytes);

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            default_timeout,
            max_error_body_bytes,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OpenAiClientError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("invalid response JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("upstream returned error: status={status} message={message}")]
    Upstream { status: StatusCode, message: String },

    #[error("upstream returned non-JSON error: status={status} body={body}")]
    UpstreamBody { status: StatusCode, body: String },
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
///
/// The credential is supplied per call rather than held by the client, so one client can
/// serve requests carrying different user-provided keys.
#[derive(Clone)]
pub struct OpenAiClient {
    config: OpenAiClientConfig,
    http: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(config: OpenAiClientConfig) -> Result<Self, CommonError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("store-auditor/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { config, http })
    }

    /// Single attempt; failures are returned to the caller as-is.
    pub async fn chat_completions(
        &self,
        request: &ChatCompletionRequest,
        api_key: &str,
        timeout_override: Option<Duration>,
    ) -> Result<ChatCompletionResponse, OpenAiClientError> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let mut builder = self.http.post(&url).bearer_auth(api_key).json(request);
        if let Some(timeout) = timeout_override.or(self.config.default_timeout) {
            builder = builder.timeout(timeout);
        }
        let resp = builder.send().await?;
        Self::parse_json_response(resp, self.config.max_error_body_bytes).await
    }

    async fn parse_json_response<T: for<'de> Deserialize<'de>>(
        resp: reqwest::Response,
        max_error_body_bytes: usize,
    ) -> Result<T, OpenAiClientError> {
        if resp.status().is_success() {
            let body = resp.bytes().await?;
            return Ok(serde_json::from_slice::<T>(&body)?);
        }
        Err(Self::to_upstream_error(resp, max_error_body_bytes).await)
    }

    async fn to_upstream_error(
        resp: reqwest::Response,
        max_error_body_bytes: usize,
    ) -> OpenAiClientError {
        let status = resp.status();
        let body = read_limited_text(resp, max_error_body_bytes).await;
        if let Ok(parsed) = serde_json::from_str::<OpenAiErrorEnvelope>(&body) {
            let message = parsed
                .error
                .message
                .unwrap_or_else(|| "unknown upstream error".to_string());
            return OpenAiClientError::Upstream { status, message };
        }
        OpenAiClientError::UpstreamBody { status, body }
    }
}

async fn read_limited_text(resp: reqwest::Response, max_bytes: usize) -> String {
    match resp.bytes().await {
        Ok(mut b) => {
            if b.len() > max_bytes {
                b.truncate(max_bytes);
            }
            String::from_utf8_lossy(&b).to_string()
        }
        Err(e) => {
            warn!(error = %e, "failed to read upstream error body");
            "<failed to read error body>".to_string()
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorEnvelope {
    error: OpenAiErrorObject,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorObject {
    message: Option<String>,
    #[allow(dead_code)]
    r#type: Option<String>,
    #[allow(dead_code)]
    code: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// `{"type": "json_object"}` asks the model for a single JSON object as its reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub kind: String,
}

impl ResponseFormat {
    pub fn json_object() -> Self {
        Self {
            kind: "json_object".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: Option<String>,
    pub object: Option<String>,
    pub choices: Vec<ChatCompletionChoice>,
    pub usage: Option<ChatCompletionUsage>,
}

impl ChatCompletionResponse {
    /// Content of `choices[0].message`, if the upstream produced any.
    pub fn first_content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionChoice {
    pub index: Option<u32>,
    pub message: ChatCompletionMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionMessage {
    pub role: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionUsage {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::{http::HeaderMap, routing::post, Json, Router};

    async fn spawn(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/v1")
    }

    fn client(base_url: String) -> OpenAiClient {
        OpenAiClient::new(OpenAiClientConfig {
            base_url,
            ..OpenAiClientConfig::default()
        })
        .unwrap()
    }

    fn request() -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: "gpt-4o".to_string(),
            messages: vec![Message::system("be terse"), Message::user("hi")],
            temperature: None,
            max_tokens: None,
            response_format: Some(ResponseFormat::json_object()),
        }
    }

    #[test]
    fn request_serializes_json_object_format() {
        let value = serde_json::to_value(request()).unwrap();
        assert_eq!(value["response_format"]["type"], "json_object");
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["role"], "user");
        assert!(value.get("temperature").is_none());
    }

    #[tokio::test]
    async fn sends_bearer_and_returns_first_content() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|headers: HeaderMap, Json(body): Json<serde_json::Value>| async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                Json(serde_json::json!({
                    "id": "cmpl-1",
                    "choices": [{
                        "index": 0,
                        "message": {
                            "role": "assistant",
                            "content": format!("{auth}|{}", body["response_format"]["type"])
                        },
                        "finish_reason": "stop"
                    }]
                }))
            }),
        );
        let base = spawn(router).await;

        let resp = client(base)
            .chat_completions(&request(), "sk-test", None)
            .await
            .unwrap();
        assert_eq!(resp.first_content(), Some("Bearer sk-test|\"json_object\""));
    }

    #[tokio::test]
    async fn decodes_upstream_error_envelope() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async {
                (
                    axum::http::StatusCode::UNAUTHORIZED,
                    Json(serde_json::json!({
                        "error": { "message": "Incorrect API key provided", "type": "invalid_request_error" }
                    })),
                )
            }),
        );
        let base = spawn(router).await;

        let err = client(base)
            .chat_completions(&request(), "sk-bad", None)
            .await
            .unwrap_err();
        match err {
            OpenAiClientError::Upstream { status, message } => {
                assert_eq!(status, StatusCode::UNAUTHORIZED);
                assert_eq!(message, "Incorrect API key provided");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn truncates_non_json_error_body() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async { (axum::http::StatusCode::BAD_GATEWAY, "x".repeat(64)) }),
        );
        let base = spawn(router).await;

        let client = OpenAiClient::new(OpenAiClientConfig {
            base_url: base,
            default_timeout: None,
            max_error_body_bytes: 8,
        })
        .unwrap();
        let err = client
            .chat_completions(&request(), "sk-test", None)
            .await
            .unwrap_err();
        match err {
            OpenAiClientError::UpstreamBody { status, body } => {
                assert_eq!(status, StatusCode::BAD_GATEWAY);
                assert_eq!(body, "xxxxxxxx");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
