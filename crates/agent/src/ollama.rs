use async_trait::async_trait;
use haggle_core::config::LlmConfig;
use haggle_core::{NegotiationSession, Role, Turn};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::language::{Intent, LanguageService, LanguageServiceError};
use crate::persona;

/// Language service backed by a local Ollama instance's chat API.
pub struct OllamaLanguageService {
    client: reqwest::Client,
    base_url: String,
    model: String,
    timeout_secs: u64,
    max_retries: u32,
    api_key: Option<SecretString>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    stream: bool,
    messages: Vec<ChatMessage>,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

impl OllamaLanguageService {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LanguageServiceError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| LanguageServiceError::Transport(error.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            timeout_secs: config.timeout_secs,
            max_retries: config.max_retries,
            api_key: config.api_key.clone(),
        })
    }

    /// Checks that the configured server answers at all. Used by health and
    /// doctor checks, not by the turn path.
    pub async fn probe(&self) -> Result<(), LanguageServiceError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .request(self.client.get(&url))
            .send()
            .await
            .map_err(map_request_error(self.timeout_secs))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(LanguageServiceError::Status { status: response.status().as_u16() })
        }
    }

    async fn chat(&self, messages: Vec<ChatMessage>) -> Result<String, LanguageServiceError> {
        let url = format!("{}/api/chat", self.base_url);
        let mut attempt = 0;

        loop {
            match self.send_chat(&url, &messages).await {
                Ok(text) => return Ok(text),
                Err(error) if error.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    debug!(
                        event_name = "language.chat.retry",
                        attempt,
                        max_retries = self.max_retries,
                        error = %error,
                        "retrying language service call"
                    );
                    tokio::time::sleep(Duration::from_millis(250 * u64::from(attempt))).await;
                }
                Err(error) => return Err(error),
            }
        }
    }

    async fn send_chat(
        &self,
        url: &str,
        messages: &[ChatMessage],
    ) -> Result<String, LanguageServiceError> {
        let payload = ChatRequest {
            model: &self.model,
            stream: false,
            messages: messages
                .iter()
                .map(|message| ChatMessage {
                    role: message.role.clone(),
                    content: message.content.clone(),
                })
                .collect(),
        };

        let response = self
            .request(self.client.post(url))
            .json(&payload)
            .send()
            .await
            .map_err(map_request_error(self.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LanguageServiceError::Status { status: status.as_u16() });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|error| LanguageServiceError::MalformedResponse(error.to_string()))?;

        let text = parsed.message.content.trim().to_string();
        if text.is_empty() {
            return Err(LanguageServiceError::EmptyReply);
        }

        Ok(text)
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key.expose_secret()),
            None => builder,
        }
    }
}

fn map_request_error(timeout_secs: u64) -> impl Fn(reqwest::Error) -> LanguageServiceError {
    move |error| {
        if error.is_timeout() {
            LanguageServiceError::Timeout { timeout_secs }
        } else {
            LanguageServiceError::Transport(error.to_string())
        }
    }
}

#[async_trait]
impl LanguageService for OllamaLanguageService {
    async fn classify_intent(
        &self,
        message: &str,
        role: Role,
        _session: &NegotiationSession,
    ) -> Result<Intent, LanguageServiceError> {
        let messages = vec![
            ChatMessage { role: "system".to_string(), content: persona::classification_prompt(role) },
            ChatMessage { role: "user".to_string(), content: message.to_string() },
        ];

        let label = self.chat(messages).await?;
        Ok(Intent::from_label(&label))
    }

    async fn generate_reply(&self, history: &[Turn]) -> Result<String, LanguageServiceError> {
        let messages = history
            .iter()
            .map(|turn| ChatMessage {
                role: turn.role.as_str().to_string(),
                content: turn.text.clone(),
            })
            .collect();

        self.chat(messages).await
    }
}
