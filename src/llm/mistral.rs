//! Mistral chat-completions client

use super::{CompletionRequest, ServiceError, TextGenerator};
use crate::config::LlmConfig;
use crate::credential::Credential;
use serde::Deserialize;
use std::time::Duration;

const MAX_ERROR_BODY_CHARS: usize = 500;

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Blocking client for the Mistral chat-completions endpoint
pub struct MistralClient {
    agent: ureq::Agent,
    endpoint: String,
    model: String,
    timeout_secs: u64,
}

impl MistralClient {
    pub fn new(config: &LlmConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build();

        Self {
            agent,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            timeout_secs: config.timeout_secs,
        }
    }

    fn request_body(&self, request: &CompletionRequest) -> serde_json::Value {
        let mut messages = Vec::new();
        if let Some(system) = &request.system_prompt {
            messages.push(serde_json::json!({"role": "system", "content": system}));
        }
        messages.push(serde_json::json!({"role": "user", "content": request.user_prompt}));

        serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        })
    }

    fn classify_transport(&self, error: ureq::Transport) -> ServiceError {
        let timed_out = std::error::Error::source(&error)
            .and_then(|source| source.downcast_ref::<std::io::Error>())
            .map(|io| {
                matches!(
                    io.kind(),
                    std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
                )
            })
            .unwrap_or(false);

        if timed_out || error.to_string().contains("timed out") {
            ServiceError::Timeout {
                timeout_secs: self.timeout_secs,
            }
        } else {
            ServiceError::Transport(error.to_string())
        }
    }
}

impl TextGenerator for MistralClient {
    fn complete(&self, api_key: &Credential, request: &CompletionRequest) -> Result<String, ServiceError> {
        let body = self.request_body(request);

        tracing::debug!(
            model = %self.model,
            temperature = request.temperature,
            max_tokens = request.max_tokens,
            "Sending chat completion request"
        );

        let response = self
            .agent
            .post(&self.endpoint)
            .set("Authorization", &format!("Bearer {}", api_key.expose()))
            .set("Content-Type", "application/json")
            .set("Accept", "application/json")
            .send_string(&body.to_string());

        match response {
            Ok(resp) => {
                let text = resp
                    .into_string()
                    .map_err(|e| ServiceError::Transport(format!("Failed to read response body: {}", e)))?;
                parse_completion(&text)
            }
            Err(ureq::Error::Status(401 | 403, _)) => Err(ServiceError::Unauthorized),
            Err(ureq::Error::Status(code, resp)) => {
                let body = resp.into_string().unwrap_or_default();
                Err(ServiceError::Status {
                    code,
                    body: crate::document::truncate_chars(&body, MAX_ERROR_BODY_CHARS).to_string(),
                })
            }
            Err(ureq::Error::Transport(transport)) => Err(self.classify_transport(transport)),
        }
    }
}

/// Pull `choices[0].message.content` out of a chat-completions response
fn parse_completion(body: &str) -> Result<String, ServiceError> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|e| ServiceError::MalformedResponse(format!("Invalid JSON: {}", e)))?;

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .ok_or_else(|| ServiceError::MalformedResponse("No message content in response".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_parse_completion() {
        let body = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"  Factures  "}}]}"#;
        assert_eq!(parse_completion(body).unwrap(), "Factures");
    }

    #[test]
    fn test_parse_completion_malformed() {
        assert!(matches!(
            parse_completion("not json"),
            Err(ServiceError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_completion(r#"{"choices":[]}"#),
            Err(ServiceError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_completion(r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#),
            Err(ServiceError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_request_body_shape() {
        let client = MistralClient::new(&Config::default().llm);
        let request = CompletionRequest::new("user text")
            .with_system("system text")
            .with_temperature(0.2)
            .with_max_tokens(50);
        let body = client.request_body(&request);

        assert_eq!(body["model"], "mistral-large-latest");
        assert_eq!(body["max_tokens"], 50);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "user text");

        let bare = client.request_body(&CompletionRequest::new("only user"));
        assert_eq!(bare["messages"].as_array().unwrap().len(), 1);
    }
}
