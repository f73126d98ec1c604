use chrono::Utc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::providers::{ChatRequest, ModelError, ModelProvider, OpenAIProvider};
use super::rate_limit::RateLimiter;
use super::reply::{ModelReply, parse_reply};
use super::system_prompt::PromptPayload;
use crate::config::Config;

#[derive(Debug, Clone, PartialEq)]
pub struct ClientSettings {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_backoff: Duration,
}

impl ClientSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.agent.model.clone(),
            max_tokens: config.agent.max_tokens,
            temperature: config.agent.temperature,
            timeout: Duration::from_secs(config.agent.timeout_secs),
            max_retries: config.agent.max_retries,
            retry_backoff: Duration::from_millis(config.agent.retry_backoff_ms),
        }
    }

    /// Delay before retry number `attempt` (0-based): `base * 2^attempt`.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.retry_backoff
            .saturating_mul(2u32.saturating_pow(attempt.min(16)))
    }
}

/// Model client with rate limiting, retries and reply parsing.
///
/// `provider` is `None` until an API key is configured.
pub struct ModelClient {
    provider: Option<Box<dyn ModelProvider>>,
    limiter: RateLimiter,
    settings: ClientSettings,
}

impl ModelClient {
    pub fn new(
        provider: Option<Box<dyn ModelProvider>>,
        limiter: RateLimiter,
        settings: ClientSettings,
    ) -> Self {
        Self {
            provider,
            limiter,
            settings,
        }
    }

    /// Build the client from config; a missing key is not an error here.
    pub fn from_config(config: &Config) -> Result<Self, ModelError> {
        let settings = ClientSettings::from_config(config);
        let limiter = RateLimiter::new(
            config.rate_limit.max_requests,
            Duration::from_secs(config.rate_limit.window_secs),
        );

        let provider = match config.resolve_api_key() {
            Some(key) => Some(Box::new(OpenAIProvider::new(
                &key,
                &config.openai_base_url(),
                settings.timeout,
            )?) as Box<dyn ModelProvider>),
            None => {
                info!("No API key configured");
                None
            }
        };

        Ok(Self::new(provider, limiter, settings))
    }

    /// Seed the rate window with request times (Unix ms) from a previous
    /// run.
    pub fn restore_requests(&mut self, stamps_ms: &[i64]) {
        self.limiter
            .restore(stamps_ms, Instant::now(), Utc::now().timestamp_millis());
    }

    /// Request times (Unix ms) still counted against the rate window.
    pub fn recent_requests(&self) -> Vec<i64> {
        self.limiter
            .timestamps_ms(Instant::now(), Utc::now().timestamp_millis())
    }

    pub fn has_api_key(&self) -> bool {
        self.provider.is_some()
    }

    pub fn set_provider(&mut self, provider: Box<dyn ModelProvider>) {
        self.provider = Some(provider);
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    pub fn set_model(&mut self, model: &str) {
        self.settings.model = model.to_string();
    }

    /// Send the payload and parse the reply.
    ///
    /// Transient failures are retried with exponential backoff; every
    /// attempt counts against the rate limiter.
    pub async fn generate(&mut self, payload: &PromptPayload) -> Result<ModelReply, ModelError> {
        let Some(ref provider) = self.provider else {
            return Err(ModelError::NoApiKey);
        };

        let request = ChatRequest {
            model: self.settings.model.clone(),
            messages: payload.messages.clone(),
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        };

        let mut attempt = 0u32;
        loop {
            if !self.limiter.can_make_request() {
                warn!("Rate limit reached, refusing model request");
                return Err(ModelError::RateLimited {
                    max: self.limiter.max_requests(),
                    window_secs: self.limiter.window().as_secs(),
                });
            }
            self.limiter.record_request();

            match provider.complete(&request).await {
                Ok(text) => {
                    let reply = parse_reply(&text);
                    debug!(
                        "Model reply parsed as {:?} with {} command(s)",
                        reply.format,
                        reply.commands.len()
                    );
                    return Ok(reply);
                }
                Err(e) if e.is_retryable() && attempt < self.settings.max_retries => {
                    let delay = self.settings.backoff_for(attempt);
                    warn!(
                        "Model request failed ({}), retrying in {:?} ({}/{})",
                        e,
                        delay,
                        attempt + 1,
                        self.settings.max_retries
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!("Model request failed: {}", e);
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::providers::{Message, MockModelProvider};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn settings() -> ClientSettings {
        ClientSettings {
            model: "test-model".into(),
            max_tokens: 256,
            temperature: 0.0,
            timeout: Duration::from_secs(5),
            max_retries: 3,
            retry_backoff: Duration::from_millis(1),
        }
    }

    fn payload() -> PromptPayload {
        PromptPayload {
            messages: vec![Message::system("sys"), Message::user("add a cube")],
            snapshot_tokens: 0,
            omitted_objects: None,
            history_turns: 0,
        }
    }

    fn client(mock: MockModelProvider) -> ModelClient {
        ModelClient::new(Some(Box::new(mock)), RateLimiter::default(), settings())
    }

    #[tokio::test]
    async fn fails_fast_without_key() {
        let mut client = ModelClient::new(None, RateLimiter::default(), settings());
        assert_eq!(client.generate(&payload()).await.unwrap_err(), ModelError::NoApiKey);
    }

    #[tokio::test]
    async fn retries_transient_then_succeeds() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let mut mock = MockModelProvider::new();
        mock.expect_complete().times(3).returning(move |request| {
            assert_eq!(request.model, "test-model");
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(ModelError::Transient("HTTP 503".into()))
            } else {
                Ok(r#"{"explanation": "ok", "commands": [{"command": "create_object", "type": "CUBE"}]}"#.into())
            }
        });

        let reply = client(mock).generate(&payload()).await.unwrap();
        assert_eq!(reply.explanation, "ok");
        assert_eq!(reply.commands.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let mut mock = MockModelProvider::new();
        mock.expect_complete()
            .times(4)
            .returning(|_| Err(ModelError::Transient("timeout".into())));

        let err = client(mock).generate(&payload()).await.unwrap_err();
        assert!(matches!(err, ModelError::Transient(_)));
    }

    #[tokio::test]
    async fn auth_errors_are_not_retried() {
        let mut mock = MockModelProvider::new();
        mock.expect_complete().times(1).returning(|_| {
            Err(ModelError::Auth {
                status: 401,
                message: "invalid key".into(),
            })
        });

        let err = client(mock).generate(&payload()).await.unwrap_err();
        assert!(matches!(err, ModelError::Auth { status: 401, .. }));
    }

    #[tokio::test]
    async fn rate_limit_blocks_without_calling_provider() {
        let mut mock = MockModelProvider::new();
        mock.expect_complete()
            .times(1)
            .returning(|_| Ok("plain text".into()));

        let mut client = ModelClient::new(
            Some(Box::new(mock)),
            RateLimiter::new(1, Duration::from_secs(60)),
            settings(),
        );
        assert!(client.generate(&payload()).await.is_ok());
        assert!(matches!(
            client.generate(&payload()).await.unwrap_err(),
            ModelError::RateLimited { max: 1, .. }
        ));
    }

    #[test]
    fn backoff_doubles() {
        let s = ClientSettings {
            retry_backoff: Duration::from_millis(100),
            ..settings()
        };
        assert_eq!(s.backoff_for(0), Duration::from_millis(100));
        assert_eq!(s.backoff_for(2), Duration::from_millis(400));
    }
}
