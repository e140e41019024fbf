//! Streaming answer generation.

use crate::types::{prompt_message, Message};
use futures::{Stream, StreamExt};
use lumen_core::AppResult;
use lumen_llm::{ChatMessage, LlmClient, LlmRequest, LlmStream};
use lumen_prompt::{build_prompt, PromptDefinition, NO_RELEVANT_INFORMATION};
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;

/// Answer text fragments in arrival order.
pub type AnswerStream = Pin<Box<dyn Stream<Item = AppResult<String>> + Send>>;

pub struct AnswerGenerator {
    client: Arc<dyn LlmClient>,
    model: String,
    prompt: PromptDefinition,
    temperature: Option<f32>,
}

impl AnswerGenerator {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>, prompt: PromptDefinition) -> Self {
        Self {
            client,
            model: model.into(),
            prompt,
            temperature: None,
        }
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    /// Assemble the answer request: system prompt with the context, then the
    /// history, then the question.
    pub fn build_request(&self, query: &str, history: &[Message], context: &str) -> AppResult<LlmRequest> {
        let mut variables = HashMap::new();
        variables.insert("context".to_string(), context.to_string());
        variables.insert("fallback".to_string(), NO_RELEVANT_INFORMATION.to_string());

        let prompt = build_prompt(&self.prompt, variables)?;

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(prompt_message(&prompt));
        messages.extend(history.iter().map(Message::to_chat_message));
        messages.push(ChatMessage::user(query));

        let mut request = LlmRequest::from_messages(messages, self.model.clone()).with_streaming();
        if let Some(temperature) = self.temperature {
            request = request.with_temperature(temperature);
        }

        Ok(request)
    }

    /// Start generating; the returned stream yields non-empty text fragments.
    pub async fn generate(&self, query: &str, history: &[Message], context: &str) -> AppResult<AnswerStream> {
        let request = self.build_request(query, history, context)?;
        tracing::info!(
            provider = self.client.provider_name(),
            model = %self.model,
            "Starting answer generation"
        );

        let stream = self.client.stream(&request).await?;
        Ok(Box::pin(fragments(stream)))
    }
}

/// Text of each chunk, skipping empty ones and ending after the final chunk.
fn fragments(stream: LlmStream) -> impl Stream<Item = AppResult<String>> + Send {
    futures::stream::unfold((stream, false), |(mut stream, finished)| async move {
        if finished {
            return None;
        }

        loop {
            match stream.next().await {
                None => return None,
                Some(Err(e)) => return Some((Err(e), (stream, true))),
                Some(Ok(chunk)) if chunk.done => {
                    if chunk.content.is_empty() {
                        return None;
                    }
                    return Some((Ok(chunk.content), (stream, true)));
                }
                Some(Ok(chunk)) if chunk.content.is_empty() => continue,
                Some(Ok(chunk)) => return Some((Ok(chunk.content), (stream, false))),
            }
        }
    })
}
