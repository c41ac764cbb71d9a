//! Generation service
//!
//! The only asynchronous step of the pipeline: asking a generative model for
//! component code. Every path out of here yields an artifact; transport
//! failures, timeouts and malformed output all become the prompt's fallback.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::artifact::ComponentArtifact;
use crate::config::GenerationConfig;
use crate::error::ValidationError;
use crate::validate::{fallback_artifact, fallback_response, validate_response, ValidatedResponse};

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Generator returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("API key not set (expected environment variable {0})")]
    MissingApiKey(String),

    #[error("Unexpected generator response: {0}")]
    Response(String),
}

#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Raw model output for `prompt`, unvalidated.
    async fn request(&self, prompt: &str) -> Result<String, GenerationError>;

    /// Upper bound on one request made through [`GenerationService::generate`].
    fn timeout(&self) -> Duration {
        GenerationConfig::default().timeout()
    }

    /// Validated artifact for `prompt`, bounded by [`GenerationService::timeout`].
    /// Fails closed: errors and timeouts become the fallback artifact.
    async fn generate(&self, prompt: &str) -> ComponentArtifact {
        generate_with(self, prompt, &CancellationToken::new(), self.timeout())
            .await
            .map(|response| response.artifact)
            .unwrap_or_else(|| fallback_artifact(prompt))
    }
}

/// Run one generation under `cancel` and `timeout`.
///
/// Returns `None` only when cancelled; a timeout or transport failure yields
/// the fallback response.
pub async fn generate_with<S>(
    service: &S,
    prompt: &str,
    cancel: &CancellationToken,
    timeout: Duration,
) -> Option<ValidatedResponse>
where
    S: GenerationService + ?Sized,
{
    tokio::select! {
        biased;

        _ = cancel.cancelled() => {
            tracing::debug!("Generation cancelled");
            None
        }
        result = tokio::time::timeout(timeout, service.request(prompt)) => {
            let response = match result {
                Ok(Ok(raw)) => validate_response(&raw, prompt),
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "Generation failed, substituting fallback");
                    fallback_response(prompt, ValidationError::Generation(e.to_string()))
                }
                Err(_) => {
                    tracing::warn!(timeout_ms = timeout.as_millis() as u64, "Generation timed out, substituting fallback");
                    fallback_response(
                        prompt,
                        ValidationError::Generation(format!("timed out after {}ms", timeout.as_millis())),
                    )
                }
            };
            Some(response)
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CHAT COMPLETIONS CLIENT
// ═══════════════════════════════════════════════════════════════════════════════

const SYSTEM_PROMPT: &str = "You generate small interactive UI components. \
Respond with a single JSON object and nothing else: {\"code\": \"...\", \"stylesheet\": \"...\"}. \
\"code\" declares exactly one component as a capitalized arrow function or function declaration \
that returns React.createElement(...) calls. Do not use JSX, imports, exports, classes, async code, \
timers or network access. State is available through useState, useEffect, useMemo, useCallback \
and useRef. \"stylesheet\" holds plain CSS for the component's class names.";

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Client for an OpenAI-compatible chat completions endpoint.
pub struct ChatCompletionsClient {
    http_client: reqwest::Client,
    config: GenerationConfig,
    api_key: String,
}

impl ChatCompletionsClient {
    /// Build a client; the API key is read from `config.api_key_env`.
    pub fn new(config: GenerationConfig) -> Result<Self, GenerationError> {
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| GenerationError::MissingApiKey(config.api_key_env.clone()))?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: GenerationConfig, api_key: impl Into<String>) -> Result<Self, GenerationError> {
        let http_client = reqwest::Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            http_client,
            config,
            api_key: api_key.into(),
        })
    }

    fn build_request<'a>(&'a self, prompt: &str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: format!("Create a component for: {}", prompt),
                },
            ],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        }
    }
}

#[async_trait]
impl GenerationService for ChatCompletionsClient {
    fn timeout(&self) -> Duration {
        self.config.timeout()
    }

    async fn request(&self, prompt: &str) -> Result<String, GenerationError> {
        let request = self.build_request(prompt);
        tracing::debug!(model = %self.config.model, endpoint = %self.config.endpoint, "Requesting component");

        let response = self
            .http_client
            .post(&self.config.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Status { status, body });
        }

        let response: ChatResponse = response.json().await?;
        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| GenerationError::Response("no choices returned".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct Scripted {
        reply: Result<&'static str, &'static str>,
        delay: Duration,
    }

    #[async_trait]
    impl GenerationService for Scripted {
        fn timeout(&self) -> Duration {
            Duration::from_millis(100)
        }

        async fn request(&self, _prompt: &str) -> Result<String, GenerationError> {
            tokio::time::sleep(self.delay).await;
            self.reply
                .map(str::to_string)
                .map_err(|e| GenerationError::Response(e.to_string()))
        }
    }

    const GOOD: &str = r#"{"code": "const Foo = () => elem('div', {}, 'hi');", "stylesheet": ""}"#;

    #[tokio::test]
    async fn test_generate_validates_output() {
        let service = Scripted {
            reply: Ok(GOOD),
            delay: Duration::ZERO,
        };
        let artifact = service.generate("anything").await;
        assert_eq!(artifact.code, "const Foo = () => elem('div', {}, 'hi');");
    }

    #[tokio::test]
    async fn test_transport_error_falls_back() {
        let service = Scripted {
            reply: Err("connection reset"),
            delay: Duration::ZERO,
        };
        let artifact = service.generate("a modal").await;
        assert!(artifact.code.starts_with("const Modal = "));

        let response = generate_with(&service, "a modal", &CancellationToken::new(), Duration::from_secs(1))
            .await
            .unwrap();
        assert!(matches!(response.fallback, Some(ValidationError::Generation(_))));
    }

    #[tokio::test]
    async fn test_timeout_falls_back() {
        let service = Scripted {
            reply: Ok(GOOD),
            delay: Duration::from_millis(500),
        };
        let response = generate_with(&service, "a card", &CancellationToken::new(), Duration::from_millis(20))
            .await
            .unwrap();
        assert!(response.used_fallback());
        assert!(response.artifact.code.starts_with("const Card = "));
    }

    #[tokio::test]
    async fn test_generate_is_bounded_by_service_timeout() {
        let service = Scripted {
            reply: Ok(GOOD),
            delay: Duration::from_secs(30),
        };
        let started = std::time::Instant::now();
        let artifact = service.generate("a slow card").await;
        assert!(artifact.code.starts_with("const Card = "));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_cancelled_generation_yields_nothing() {
        let service = Scripted {
            reply: Ok(GOOD),
            delay: Duration::from_millis(500),
        };
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });
        let response = generate_with(&service, "a card", &cancel, Duration::from_secs(5)).await;
        assert!(response.is_none());
    }

    #[test]
    fn test_chat_request_shape() {
        let client = ChatCompletionsClient::with_api_key(GenerationConfig::default(), "key").unwrap();
        let request = serde_json::to_value(client.build_request("a button")).unwrap();
        assert_eq!(request["model"], "gpt-4");
        assert_eq!(request["max_tokens"], 3000);
        assert_eq!(request["messages"][0]["role"], "system");
        assert_eq!(request["messages"][1]["content"], "Create a component for: a button");
        assert_eq!(client.timeout(), Duration::from_secs(60));
    }
}
