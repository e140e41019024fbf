//! Scripted LLM and search backends.

use futures::StreamExt;
use lumen_core::{AppError, AppResult};
use lumen_llm::{LlmClient, LlmRequest, LlmResponse, LlmStream, LlmStreamChunk, LlmUsage};
use lumen_search::{SearchClient, SearchHit};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

const MODEL: &str = "scripted";

/// How the answer stream behaves.
pub enum AnswerScript {
    /// Yield the fragments, then a final chunk
    Fragments(Vec<&'static str>),

    /// Yield the fragments, then a transport error
    FailAfter(Vec<&'static str>),

    /// Yield the fragments, then nothing ever again
    Hang(Vec<&'static str>),

    /// `stream()` itself fails
    Refuse,
}

/// Sets its flag when dropped.
struct ReleaseGuard(Arc<AtomicBool>);

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

pub struct ScriptedLlm {
    rewrite: Result<String, String>,
    answer: AnswerScript,
    pub completions: Mutex<Vec<LlmRequest>>,
    pub streams: Mutex<Vec<LlmRequest>>,
    released: Arc<AtomicBool>,
}

impl ScriptedLlm {
    pub fn new(rewrite: &str, answer: AnswerScript) -> Self {
        Self {
            rewrite: Ok(rewrite.to_string()),
            answer,
            completions: Mutex::new(Vec::new()),
            streams: Mutex::new(Vec::new()),
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn failing_rewrite(message: &str) -> Self {
        let mut llm = Self::new("", AnswerScript::Fragments(Vec::new()));
        llm.rewrite = Err(message.to_string());
        llm
    }

    /// Whether the answer stream has been dropped.
    pub fn stream_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    pub fn completion_requests(&self) -> Vec<LlmRequest> {
        self.completions.lock().unwrap().clone()
    }

    pub fn stream_requests(&self) -> Vec<LlmRequest> {
        self.streams.lock().unwrap().clone()
    }
}

fn deltas(fragments: &[&'static str]) -> Vec<AppResult<LlmStreamChunk>> {
    fragments
        .iter()
        .map(|f| Ok(LlmStreamChunk::delta(*f, MODEL)))
        .collect()
}

#[async_trait::async_trait]
impl LlmClient for ScriptedLlm {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.completions.lock().unwrap().push(request.clone());

        match &self.rewrite {
            Ok(content) => Ok(LlmResponse {
                content: content.clone(),
                model: MODEL.to_string(),
                usage: LlmUsage::new(10, 5),
                done: true,
            }),
            Err(message) => Err(AppError::Llm(message.clone())),
        }
    }

    async fn stream(&self, request: &LlmRequest) -> AppResult<LlmStream> {
        self.streams.lock().unwrap().push(request.clone());

        let chunks: LlmStream = match &self.answer {
            AnswerScript::Refuse => return Err(AppError::Llm("model unavailable".to_string())),
            AnswerScript::Fragments(fragments) => {
                let mut items = deltas(fragments);
                items.push(Ok(LlmStreamChunk::finished(MODEL, Some(LlmUsage::new(10, 20)))));
                Box::pin(futures::stream::iter(items))
            }
            AnswerScript::FailAfter(fragments) => {
                let mut items = deltas(fragments);
                items.push(Err(AppError::Llm("connection reset".to_string())));
                Box::pin(futures::stream::iter(items))
            }
            AnswerScript::Hang(fragments) => Box::pin(
                futures::stream::iter(deltas(fragments)).chain(futures::stream::pending()),
            ),
        };

        let guard = ReleaseGuard(Arc::clone(&self.released));
        Ok(Box::pin(chunks.map(move |chunk| {
            let _held = &guard;
            chunk
        })))
    }
}

pub struct ScriptedSearch {
    result: Result<Vec<SearchHit>, String>,
    pub queries: Mutex<Vec<String>>,
}

impl ScriptedSearch {
    pub fn returning(hits: Vec<SearchHit>) -> Self {
        Self {
            result: Ok(hits),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            result: Err(message.to_string()),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn received(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl SearchClient for ScriptedSearch {
    fn backend_name(&self) -> &str {
        "scripted"
    }

    async fn search(&self, query: &str) -> AppResult<Vec<SearchHit>> {
        self.queries.lock().unwrap().push(query.to_string());

        match &self.result {
            Ok(hits) => Ok(hits.clone()),
            Err(message) => Err(AppError::Search(message.clone())),
        }
    }
}

/// A complete hit.
pub fn hit(title: &str, embed_score: f64, rerank_score: f64) -> SearchHit {
    SearchHit {
        content: Some(format!("{} content", title)),
        title: Some(title.to_string()),
        url: Some(format!("https://example.org/{}", title)),
        embed_score: Some(embed_score),
        rerank_score: Some(rerank_score),
    }
}
