//! LLM provider factory.
//!
//! This module provides a factory for creating LLM clients based on
//! application configuration. It handles provider resolution and secret
//! injection.

use crate::client::LlmClient;
use crate::providers::openai::{GROQ_BASE_URL, OPENAI_BASE_URL};
use crate::providers::{OllamaClient, OpenAiClient};
use crate::types::ProviderType;
use std::sync::Arc;
use std::time::Duration;

/// Create an LLM client based on the provider name.
///
/// # Arguments
/// * `provider` - Provider identifier ("ollama", "openai", "groq")
/// * `endpoint` - Optional custom endpoint URL
/// * `api_key` - Optional API key (for providers that require it)
/// * `timeout` - Request timeout for non-streaming Ollama completions
///
/// # Errors
/// Returns error if:
/// - Provider is unknown or not supported
/// - Required secrets are missing
pub fn create_client(
    provider: &str,
    endpoint: Option<&str>,
    api_key: Option<&str>,
    timeout: Option<Duration>,
) -> Result<Arc<dyn LlmClient>, String> {
    let provider_type =
        ProviderType::parse(provider).ok_or_else(|| format!("Unknown provider: {}", provider))?;

    let key = match (provider_type.requires_api_key(), api_key) {
        (true, None) => {
            return Err(format!(
                "{} provider requires API key",
                provider_type.as_str()
            ))
        }
        (_, key) => key.unwrap_or_default(),
    };

    match provider_type {
        ProviderType::Ollama => {
            let base_url = endpoint.unwrap_or("http://localhost:11434");
            let client = OllamaClient::with_base_url(base_url);
            Ok(match timeout {
                Some(timeout) => Arc::new(client.with_timeout(timeout)),
                None => Arc::new(client),
            })
        }
        ProviderType::OpenAI => {
            let base_url = endpoint.unwrap_or(OPENAI_BASE_URL);
            Ok(Arc::new(OpenAiClient::new("openai", base_url, key)))
        }
        ProviderType::Groq => {
            let base_url = endpoint.unwrap_or(GROQ_BASE_URL);
            Ok(Arc::new(OpenAiClient::new("groq", base_url, key)))
        }
        // TODO: Anthropic messages API client
        ProviderType::Claude => Err("Claude provider not yet implemented".to_string()),
    }
}
