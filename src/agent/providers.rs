use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Failure of a model request.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error(
        "No API key configured. Run `scenegpt config set-key <key-or-file>` or set OPENAI_API_KEY."
    )]
    NoApiKey,

    #[error("Authentication failed (HTTP {status}): {message}")]
    Auth { status: u16, message: String },

    #[error("Model service unavailable: {0}")]
    Transient(String),

    #[error("Model API error: {0}")]
    Api(String),

    #[error("Rate limit reached ({max} requests per {window_secs}s); try again shortly")]
    RateLimited { max: usize, window_secs: u64 },
}

impl ModelError {
    /// Only transient failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = error_message(body);
        match status {
            401 | 403 => Self::Auth { status, message },
            429 => Self::Transient(format!("HTTP 429: {}", message)),
            500..=599 => Self::Transient(format!("HTTP {}: {}", status, message)),
            _ => Self::Api(format!("HTTP {}: {}", status, message)),
        }
    }

    pub fn from_transport(e: &reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Transient(format!("request timed out: {}", e))
        } else if e.is_connect() {
            Self::Transient(format!("connection failed: {}", e))
        } else {
            Self::Api(e.to_string())
        }
    }
}

/// Pull `error.message` out of an OpenAI-style error body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().chars().take(300).collect())
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// One chat-completion call returning the assistant text.
    async fn complete(&self, request: &ChatRequest) -> Result<String, ModelError>;
}

/// OpenAI-compatible chat-completions endpoint.
pub struct OpenAIProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAIProvider {
    pub fn new(api_key: &str, base_url: &str, timeout: Duration) -> Result<Self, ModelError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ModelError::Api(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn request_body(request: &ChatRequest) -> Value {
        json!({
            "model": request.model,
            "messages": request.messages,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
        })
    }
}

#[async_trait]
impl ModelProvider for OpenAIProvider {
    async fn complete(&self, request: &ChatRequest) -> Result<String, ModelError> {
        let body = Self::request_body(request);
        debug!(
            "OpenAI request: {}",
            serde_json::to_string_pretty(&body).unwrap_or_default()
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ModelError::from_transport(&e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ModelError::from_transport(&e))?;
        debug!("OpenAI response ({}): {}", status, text);

        if !status.is_success() {
            return Err(ModelError::from_status(status.as_u16(), &text));
        }

        extract_content(&text)
    }
}

/// First choice's message content from a chat-completions body.
fn extract_content(body: &str) -> Result<String, ModelError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| ModelError::Api(format!("unreadable response body: {}", e)))?;

    if let Some(error) = value.get("error") {
        return Err(ModelError::Api(error.to_string()));
    }

    value["choices"]
        .get(0)
        .and_then(|choice| choice["message"]["content"].as_str())
        .map(str::to_string)
        .ok_or_else(|| ModelError::Api("no choices in response".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert!(matches!(
            ModelError::from_status(401, r#"{"error": {"message": "bad key"}}"#),
            ModelError::Auth { status: 401, ref message } if message == "bad key"
        ));
        assert!(matches!(ModelError::from_status(403, ""), ModelError::Auth { .. }));
        assert!(ModelError::from_status(429, "slow down").is_retryable());
        assert!(ModelError::from_status(503, "").is_retryable());
        assert!(!ModelError::from_status(400, "bad request").is_retryable());
        assert!(!ModelError::NoApiKey.is_retryable());
        assert!(
            !ModelError::RateLimited {
                max: 1,
                window_secs: 60
            }
            .is_retryable()
        );
    }

    #[test]
    fn extracts_first_choice() {
        let body = r#"{"choices": [{"message": {"role": "assistant", "content": "hi"}}]}"#;
        assert_eq!(extract_content(body).unwrap(), "hi");

        let err = extract_content(r#"{"choices": []}"#).unwrap_err();
        assert!(matches!(err, ModelError::Api(_)));

        let err = extract_content(r#"{"error": {"message": "nope"}}"#).unwrap_err();
        assert!(matches!(err, ModelError::Api(ref m) if m.contains("nope")));
    }

    #[test]
    fn request_body_shape() {
        let request = ChatRequest {
            model: "gpt-4o-mini".into(),
            messages: vec![Message::system("s"), Message::user("u")],
            max_tokens: 100,
            temperature: 0.5,
        };
        let body = OpenAIProvider::request_body(&request);
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "u");
        assert_eq!(body["max_tokens"], 100);
    }
}
