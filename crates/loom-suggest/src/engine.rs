use async_trait::async_trait;
use llm::builder::{LLMBackend, LLMBuilder};
use llm::chat::ChatMessage as LlmMessage;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::{ChatMessage, Completion, CompletionClient, Role, SuggestError, Usage};

/// Provider names accepted in configuration.
pub const PROVIDERS: [&str; 7] = ["openai", "anthropic", "google", "ollama", "groq", "mistral", "deepseek"];

pub fn map_backend(provider: &str) -> Result<LLMBackend, SuggestError> {
    match provider {
        "openai" => Ok(LLMBackend::OpenAI),
        "anthropic" => Ok(LLMBackend::Anthropic),
        "google" => Ok(LLMBackend::Google),
        "ollama" => Ok(LLMBackend::Ollama),
        "groq" => Ok(LLMBackend::Groq),
        "mistral" => Ok(LLMBackend::Mistral),
        "deepseek" => Ok(LLMBackend::DeepSeek),
        other => Err(SuggestError::UnknownProvider(other.to_string())),
    }
}

/// Completion client over the `llm` crate. A provider handle is built per
/// request because the system prompt changes with the canvas.
#[derive(Debug, Clone)]
pub struct LlmClient {
    provider: String,
    model: String,
    api_key: Option<String>,
    max_tokens: u32,
}

impl LlmClient {
    pub fn new(
        provider: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        max_tokens: u32,
    ) -> Result<Self, SuggestError> {
        let provider = provider.into();
        map_backend(&provider)?;
        Ok(Self {
            provider,
            model: model.into(),
            api_key: api_key.filter(|k| !k.is_empty()),
            max_tokens,
        })
    }
}

#[async_trait]
impl CompletionClient for LlmClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, system: &str, messages: &[ChatMessage]) -> Result<Completion, SuggestError> {
        let backend = map_backend(&self.provider)?;

        let mut builder = LLMBuilder::new()
            .backend(backend)
            .model(&self.model)
            .max_tokens(self.max_tokens)
            .system(system);

        if let Some(key) = &self.api_key {
            builder = builder.api_key(key);
        }

        let llm = builder
            .build()
            .map_err(|e| SuggestError::Build(redact_secrets(&e.to_string())))?;

        let history: Vec<LlmMessage> = messages
            .iter()
            .map(|m| match m.role {
                Role::User => LlmMessage::user().content(&m.content).build(),
                Role::Assistant => LlmMessage::assistant().content(&m.content).build(),
            })
            .collect();

        debug!("requesting completion from {} ({})", self.provider, self.model);
        let response = llm.chat(&history).await.map_err(|e| {
            let message = redact_secrets(&e.to_string());
            warn!("{} chat failed: {}", self.provider, message);
            SuggestError::Chat(message)
        })?;

        let usage = response
            .usage()
            .map(|u| Usage {
                input_tokens: u.prompt_tokens as u64,
                output_tokens: u.completion_tokens as u64,
            })
            .unwrap_or_default();

        let text = response.text().unwrap_or_default();
        if text.trim().is_empty() {
            warn!("{} returned an empty completion", self.provider);
        }
        Ok(Completion { text, usage })
    }
}

/// Strip credentials that providers sometimes echo back in error messages.
pub fn redact_secrets(msg: &str) -> String {
    static RE_API_KEY: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"([?&]key=)[A-Za-z0-9_-]+").expect("Invalid regex pattern for API key redaction")
    });
    static RE_BEARER: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(Bearer\s+)[A-Za-z0-9_.-]+").expect("Invalid regex pattern for bearer token redaction")
    });
    static RE_PROVIDER_KEY: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"\bsk-[A-Za-z0-9_-]{8,}").expect("Invalid regex pattern for provider key redaction"));

    let redacted = RE_API_KEY.replace_all(msg, "${1}[REDACTED]");
    let redacted = RE_BEARER.replace_all(&redacted, "${1}[REDACTED]");
    RE_PROVIDER_KEY.replace_all(&redacted, "[REDACTED]").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn every_listed_provider_maps() {
        for provider in PROVIDERS {
            assert!(map_backend(provider).is_ok(), "{provider}");
        }
        assert!(matches!(map_backend("claude"), Err(SuggestError::UnknownProvider(p)) if p == "claude"));
    }

    #[test]
    fn client_rejects_unknown_provider_up_front() {
        assert!(LlmClient::new("bard", "x", None, 10).is_err());
        let client = LlmClient::new("ollama", "llama3", Some(String::new()), 10).unwrap();
        assert_eq!(client.model(), "llama3");
        assert_eq!(client.api_key, None);
    }

    #[test]
    fn secrets_are_redacted() {
        assert_eq!(
            redact_secrets("GET https://api.example.com/v1?key=abc123&alt=json failed"),
            "GET https://api.example.com/v1?key=[REDACTED]&alt=json failed"
        );
        assert_eq!(
            redact_secrets("Authorization: Bearer tok.en-1 rejected"),
            "Authorization: Bearer [REDACTED] rejected"
        );
        assert_eq!(redact_secrets("invalid x-api-key sk-ant-api03-abcdefgh"), "invalid x-api-key [REDACTED]");
    }
}
