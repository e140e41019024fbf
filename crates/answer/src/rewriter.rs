//! Query rewriting.
//!
//! Turns the latest user question plus conversation history into a
//! standalone search query, or decides that no search is needed.

use crate::types::{prompt_message, Message, RewriteOutcome, Role};
use lumen_core::AppResult;
use lumen_llm::{LlmClient, LlmRequest};
use lumen_prompt::{build_prompt, PromptDefinition, NO_RETRIEVAL_SENTINEL};
use std::collections::HashMap;
use std::sync::Arc;

/// Labels models sometimes echo in front of the rewritten question.
const ECHOED_LABELS: &[&str] = &["rephrased question:", "rephrased:"];

pub struct QueryRewriter {
    client: Arc<dyn LlmClient>,
    model: String,
    prompt: PromptDefinition,
}

impl QueryRewriter {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>, prompt: PromptDefinition) -> Self {
        Self {
            client,
            model: model.into(),
            prompt,
        }
    }

    /// Ask the model for a standalone question.
    pub async fn rewrite(&self, history: &[Message], query: &str) -> AppResult<RewriteOutcome> {
        let mut variables = HashMap::new();
        variables.insert("chat_history".to_string(), format_history(history));
        variables.insert("query".to_string(), query.to_string());

        let prompt = build_prompt(&self.prompt, variables)?;
        let request = LlmRequest::from_messages(vec![prompt_message(&prompt)], self.model.clone());

        let response = self.client.complete(&request).await?;
        let outcome = interpret_rewrite(&response.content, query);

        match &outcome {
            RewriteOutcome::NeedsRetrieval(question) => {
                tracing::debug!("Rewritten question: {}", question)
            }
            RewriteOutcome::NoRetrievalNeeded => tracing::info!("Rewriter skipped retrieval"),
        }

        Ok(outcome)
    }
}

/// Render history as `User:` / `Assistant:` lines, oldest first.
pub fn format_history(history: &[Message]) -> String {
    history
        .iter()
        .map(|message| match message.role {
            Role::User => format!("User: {}", message.content),
            Role::Assistant => format!("Assistant: {}", message.content),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Classify raw rewriter output.
///
/// The sentinel matches case-insensitively, ignoring surrounding quotes and a
/// trailing period. Empty output falls back to the original query.
pub(crate) fn interpret_rewrite(output: &str, original_query: &str) -> RewriteOutcome {
    let mut text = output.trim();
    for label in ECHOED_LABELS {
        if text.len() >= label.len()
            && text.is_char_boundary(label.len())
            && text[..label.len()].eq_ignore_ascii_case(label)
        {
            text = text[label.len()..].trim();
            break;
        }
    }

    let unquoted = text.trim_matches(|c: char| c == '"' || c == '\'' || c == '`').trim();
    let bare = unquoted.trim_end_matches('.').trim();

    if bare.eq_ignore_ascii_case(NO_RETRIEVAL_SENTINEL) {
        return RewriteOutcome::NoRetrievalNeeded;
    }

    if unquoted.is_empty() {
        tracing::warn!("Rewriter returned nothing, searching with the original query");
        return RewriteOutcome::NeedsRetrieval(original_query.trim().to_string());
    }

    RewriteOutcome::NeedsRetrieval(unquoted.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_variants() {
        for output in ["not_needed", "  not_needed\n", "NOT_NEEDED", "\"not_needed\"", "not_needed.", "Rephrased: not_needed"] {
            assert_eq!(
                interpret_rewrite(output, "hi"),
                RewriteOutcome::NoRetrievalNeeded,
                "output {:?}",
                output
            );
        }
    }

    #[test]
    fn test_question_passes_through() {
        assert_eq!(
            interpret_rewrite(" What is the population of Paris? \n", "how many people live there"),
            RewriteOutcome::NeedsRetrieval("What is the population of Paris?".to_string())
        );
    }

    #[test]
    fn test_strips_echoed_label_and_quotes() {
        assert_eq!(
            interpret_rewrite("Rephrased question: \"What is Docker?\"", "docker?"),
            RewriteOutcome::NeedsRetrieval("What is Docker?".to_string())
        );
    }

    #[test]
    fn test_sentinel_inside_sentence_is_a_question() {
        assert_eq!(
            interpret_rewrite("Why is retrieval not_needed here?", "q"),
            RewriteOutcome::NeedsRetrieval("Why is retrieval not_needed here?".to_string())
        );
    }

    #[test]
    fn test_empty_output_uses_original_query() {
        assert_eq!(
            interpret_rewrite("   ", "  What is Rust?  "),
            RewriteOutcome::NeedsRetrieval("What is Rust?".to_string())
        );
    }

    #[test]
    fn test_format_history() {
        let history = vec![
            Message::user("What's the capital of France?"),
            Message::assistant("Paris."),
        ];
        assert_eq!(
            format_history(&history),
            "User: What's the capital of France?\nAssistant: Paris."
        );
        assert_eq!(format_history(&[]), "");
    }
}
