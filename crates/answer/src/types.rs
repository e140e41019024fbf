//! Request-scoped data carried through the answer pipeline.

use lumen_llm::ChatMessage;
use lumen_prompt::{BuiltPrompt, PromptRole};
use lumen_search::SearchHit;
use serde::{Deserialize, Serialize};

/// Author of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    /// Parse a stored role name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

/// One turn of conversation history, supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
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

    pub fn to_chat_message(&self) -> ChatMessage {
        match self.role {
            Role::User => ChatMessage::user(self.content.clone()),
            Role::Assistant => ChatMessage::assistant(self.content.clone()),
        }
    }
}

/// A retrieved passage with its relevance signals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub content: String,
    pub title: String,
    pub url: String,
    pub embed_score: f64,
    pub rerank_score: f64,
}

impl Document {
    /// Build a document from a raw hit.
    ///
    /// Returns `None` when a field is missing, the content is empty, or a
    /// score is not a finite number.
    pub fn from_hit(hit: SearchHit) -> Option<Self> {
        let content = hit.content.filter(|c| !c.is_empty())?;
        let embed_score = hit.embed_score.filter(|s| s.is_finite())?;
        let rerank_score = hit.rerank_score.filter(|s| s.is_finite())?;

        Some(Self {
            content,
            title: hit.title?,
            url: hit.url?,
            embed_score,
            rerank_score,
        })
    }
}

/// Place a rendered prompt in a chat message with the prompt's role.
pub(crate) fn prompt_message(prompt: &BuiltPrompt) -> ChatMessage {
    match prompt.role {
        PromptRole::System => ChatMessage::system(prompt.content.clone()),
        PromptRole::User => ChatMessage::user(prompt.content.clone()),
    }
}

/// What the query rewriter decided for this turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriteOutcome {
    /// Search with this standalone question
    NeedsRetrieval(String),

    /// Conversational input; answer without retrieval
    NoRetrievalNeeded,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit() -> SearchHit {
        SearchHit {
            content: Some("Paris is the capital of France.".to_string()),
            title: Some("Paris".to_string()),
            url: Some("https://example.org/paris".to_string()),
            embed_score: Some(0.8),
            rerank_score: Some(0.9),
        }
    }

    #[test]
    fn test_document_from_complete_hit() {
        let doc = Document::from_hit(hit()).unwrap();
        assert_eq!(doc.title, "Paris");
        assert_eq!(doc.embed_score, 0.8);
        assert_eq!(doc.rerank_score, 0.9);
    }

    #[test]
    fn test_incomplete_hits_are_rejected() {
        let mut no_content = hit();
        no_content.content = Some(String::new());
        assert!(Document::from_hit(no_content).is_none());

        let mut no_url = hit();
        no_url.url = None;
        assert!(Document::from_hit(no_url).is_none());

        let mut no_rerank = hit();
        no_rerank.rerank_score = None;
        assert!(Document::from_hit(no_rerank).is_none());

        let mut nan_score = hit();
        nan_score.embed_score = Some(f64::NAN);
        assert!(Document::from_hit(nan_score).is_none());
    }

    #[test]
    fn test_document_serializes_camel_case() {
        let json = serde_json::to_value(Document::from_hit(hit()).unwrap()).unwrap();
        assert!(json.get("embedScore").is_some());
        assert!(json.get("rerankScore").is_some());
    }

    #[test]
    fn test_message_to_chat_message() {
        let chat = Message::assistant("Hello").to_chat_message();
        assert_eq!(chat, ChatMessage::assistant("Hello"));
        assert_eq!(Role::parse("user"), Some(Role::User));
        assert_eq!(Role::parse("system"), None);
    }
}
