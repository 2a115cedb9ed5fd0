//! Text-generation service access
//!
//! Every component that talks to the model goes through [`ModelGateway`],
//! which owns the retry policy and the call logging. Backends implement
//! [`TextGenerator`]; [`MistralClient`] is the production one and
//! [`ScriptedGenerator`] replays canned answers.

mod mistral;
pub mod mock;
pub mod response;

pub use mistral::MistralClient;
pub use mock::ScriptedGenerator;

use crate::credential::Credential;
use std::time::Duration;
use thiserror::Error;

/// Failure talking to the text-generation service
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Service returned HTTP {code}: {body}")]
    Status { code: u16, body: String },

    #[error("Service rejected the API key")]
    Unauthorized,

    #[error("Malformed service response: {0}")]
    MalformedResponse(String),
}

impl ServiceError {
    /// Worth another attempt: network trouble, timeouts, throttling, server errors
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout { .. } => true,
            Self::Status { code, .. } => *code == 429 || *code >= 500,
            Self::Unauthorized | Self::MalformedResponse(_) => false,
        }
    }
}

/// One chat-completion request
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system_prompt: Option<String>,
    pub user_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl CompletionRequest {
    pub fn new(user_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: None,
            user_prompt: user_prompt.into(),
            temperature: 0.1,
            max_tokens: 100,
        }
    }

    pub fn with_system(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// A text-generation backend
pub trait TextGenerator: Send + Sync {
    /// Return the trimmed completion text
    fn complete(&self, api_key: &Credential, request: &CompletionRequest) -> Result<String, ServiceError>;
}

/// Single entry point for model calls
pub struct ModelGateway {
    generator: Box<dyn TextGenerator>,
    max_retries: u32,
    backoff: Duration,
}

impl ModelGateway {
    pub fn new(generator: Box<dyn TextGenerator>, max_retries: u32) -> Self {
        Self {
            generator,
            max_retries,
            backoff: Duration::from_millis(500),
        }
    }

    /// Base delay between attempts, multiplied by the attempt number
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Call the backend, retrying transient failures up to `max_retries` times
    pub fn complete(&self, api_key: &Credential, request: &CompletionRequest) -> Result<String, ServiceError> {
        let mut attempt = 0;
        loop {
            match self.generator.complete(api_key, request) {
                Ok(text) => {
                    tracing::debug!(attempt, chars = text.len(), "Model call succeeded");
                    return Ok(text);
                }
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    tracing::warn!("Model call failed ({}), retry {}/{}", e, attempt, self.max_retries);
                    if !self.backoff.is_zero() {
                        std::thread::sleep(self.backoff * attempt);
                    }
                }
                Err(e) => {
                    tracing::warn!("Model call failed: {}", e);
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway(generator: ScriptedGenerator, max_retries: u32) -> ModelGateway {
        ModelGateway::new(Box::new(generator), max_retries).with_backoff(Duration::ZERO)
    }

    fn key() -> Credential {
        Credential::new("test-key")
    }

    #[test]
    fn test_transient_classification() {
        assert!(ServiceError::Transport("reset".into()).is_transient());
        assert!(ServiceError::Timeout { timeout_secs: 5 }.is_transient());
        assert!(ServiceError::Status { code: 429, body: String::new() }.is_transient());
        assert!(ServiceError::Status { code: 503, body: String::new() }.is_transient());
        assert!(!ServiceError::Status { code: 400, body: String::new() }.is_transient());
        assert!(!ServiceError::Unauthorized.is_transient());
        assert!(!ServiceError::MalformedResponse("x".into()).is_transient());
    }

    #[test]
    fn test_retries_transient_then_succeeds() {
        let generator = ScriptedGenerator::new()
            .fail(ServiceError::Status { code: 503, body: "busy".into() })
            .respond("ok");
        let gateway = gateway(generator.clone(), 1);

        let result = gateway.complete(&key(), &CompletionRequest::new("hi"));
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(generator.call_count(), 2);
    }

    #[test]
    fn test_gives_up_after_max_retries() {
        let generator = ScriptedGenerator::new()
            .fail(ServiceError::Transport("down".into()))
            .fail(ServiceError::Transport("down".into()))
            .fail(ServiceError::Transport("down".into()));
        let gateway = gateway(generator.clone(), 1);

        assert!(gateway.complete(&key(), &CompletionRequest::new("hi")).is_err());
        assert_eq!(generator.call_count(), 2);
    }

    #[test]
    fn test_no_retry_on_auth_failure() {
        let generator = ScriptedGenerator::new()
            .fail(ServiceError::Unauthorized)
            .respond("unused");
        let gateway = gateway(generator.clone(), 3);

        assert_eq!(
            gateway.complete(&key(), &CompletionRequest::new("hi")),
            Err(ServiceError::Unauthorized)
        );
        assert_eq!(generator.call_count(), 1);
    }
}
