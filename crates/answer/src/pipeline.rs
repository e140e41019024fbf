//! Answer pipeline orchestration.
//!
//! A run drives rewrite, retrieval, filtering and generation in order and
//! reports progress on a bounded trace channel. The multiplexer turns the
//! trace into consumer events; both halves run concurrently inside one task.
//! When the consumer goes away the trace channel closes and the orchestrator
//! stops at its next await point, dropping the generation stream.

use crate::context::format_context;
use crate::events::{EventSink, EventStream};
use crate::filter::RelevanceFilter;
use crate::generator::{AnswerGenerator, AnswerStream};
use crate::multiplexer::{EventMultiplexer, RunOutcome};
use crate::retriever::Retriever;
use crate::rewriter::QueryRewriter;
use crate::trace::{PipelineError, PipelineState, StageEvent};
use crate::types::Message;
use futures::StreamExt;
use lumen_core::{AppConfig, AppError, AppResult};
use lumen_llm::LlmClient;
use lumen_prompt::builtin::{answer_prompt, rewrite_prompt};
use lumen_prompt::PromptDefinition;
use lumen_search::SearchClient;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::Instrument;

/// Capacity of the orchestrator → multiplexer channel.
const TRACE_BUFFER: usize = 32;

/// Capacity of the channel behind [`EventStream`].
const EVENT_BUFFER: usize = 64;

/// Tunables for a pipeline.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Model used for both the rewrite and the answer
    pub model: String,
    pub filter: RelevanceFilter,
    pub temperature: Option<f32>,

    /// Fail generation when no fragment arrives for this long
    pub idle_timeout: Option<Duration>,
}

impl PipelineSettings {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            filter: RelevanceFilter::default(),
            temperature: None,
            idle_timeout: None,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model: config.model.clone(),
            filter: RelevanceFilter::from_config(&config.retrieval),
            temperature: config.generation.temperature,
            idle_timeout: config.generation.idle_timeout_secs.map(Duration::from_secs),
        }
    }
}

/// Retrieval-augmented answer pipeline.
///
/// Holds no per-request state; one instance serves any number of runs.
pub struct Pipeline {
    rewriter: QueryRewriter,
    retriever: Retriever,
    filter: RelevanceFilter,
    generator: AnswerGenerator,
    idle_timeout: Option<Duration>,
}

impl Pipeline {
    /// Create a pipeline with the built-in prompts.
    pub fn new(llm: Arc<dyn LlmClient>, search: Arc<dyn SearchClient>, settings: PipelineSettings) -> Self {
        Self::with_prompts(llm, search, settings, rewrite_prompt(), answer_prompt())
    }

    /// Create a pipeline with custom rewrite and answer prompts.
    pub fn with_prompts(
        llm: Arc<dyn LlmClient>,
        search: Arc<dyn SearchClient>,
        settings: PipelineSettings,
        rewrite: PromptDefinition,
        answer: PromptDefinition,
    ) -> Self {
        Self {
            rewriter: QueryRewriter::new(Arc::clone(&llm), settings.model.clone(), rewrite),
            retriever: Retriever::new(search),
            filter: settings.filter,
            generator: AnswerGenerator::new(llm, settings.model, answer)
                .with_temperature(settings.temperature),
            idle_timeout: settings.idle_timeout,
        }
    }

    /// Answer `query`, writing events to `sink`.
    ///
    /// Invalid input is rejected before any event is produced. Otherwise the
    /// sink receives `Sources`, chunks and exactly one terminal event unless
    /// it closes first.
    pub async fn run<S: EventSink>(&self, query: &str, history: &[Message], sink: S) -> AppResult<RunOutcome> {
        validate_query(query)?;

        let request_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!("answer", request_id = %request_id);

        let outcome = async move {
            tracing::info!(history = history.len(), "Answering query");

            let (trace_tx, trace_rx) = mpsc::channel(TRACE_BUFFER);
            let (state, outcome) = tokio::join!(
                self.orchestrate(query, history, trace_tx),
                EventMultiplexer::new(sink).forward(trace_rx),
            );

            tracing::info!(state = %state, outcome = ?outcome, "Answer run finished");
            outcome
        }
        .instrument(span)
        .await;

        Ok(outcome)
    }

    /// Start a run on a new task and return its events.
    ///
    /// Dropping the returned stream cancels the run.
    pub fn spawn(self: Arc<Self>, query: impl Into<String>, history: Vec<Message>) -> AppResult<EventStream> {
        let query = query.into();
        validate_query(&query)?;

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        tokio::spawn(async move {
            if let Err(e) = self.run(&query, &history, tx).await {
                tracing::error!("Answer run rejected: {}", e);
            }
        });

        Ok(EventStream::new(rx))
    }

    async fn orchestrate(
        &self,
        query: &str,
        history: &[Message],
        trace: mpsc::Sender<StageEvent>,
    ) -> PipelineState {
        let mut state = PipelineState::Idle;

        match self.drive(&mut state, query, history, &trace).await {
            Ok(()) => state,
            Err(PipelineError::ConsumerDisconnected) => {
                tracing::info!(stage = %state, "Run abandoned");
                state
            }
            Err(err) => {
                tracing::warn!(stage = %state, "Stage failed: {}", err);
                // The multiplexer may already be gone
                let _ = trace.send(StageEvent::Failed(err)).await;
                PipelineState::Failed
            }
        }
    }

    async fn drive(
        &self,
        state: &mut PipelineState,
        query: &str,
        history: &[Message],
        trace: &mpsc::Sender<StageEvent>,
    ) -> Result<(), PipelineError> {
        *state = state.advance(PipelineState::Rewriting)?;
        let outcome = until_closed(trace, self.rewriter.rewrite(history, query))
            .await?
            .map_err(PipelineError::Rewrite)?;

        *state = state.advance(PipelineState::Retrieving)?;
        let documents = until_closed(trace, self.retriever.retrieve(&outcome))
            .await?
            .map_err(PipelineError::Retrieval)?;

        *state = state.advance(PipelineState::Filtering)?;
        let retrieved = documents.len();
        let context_set = self.filter.apply(documents);
        let context = format_context(&context_set);
        tracing::info!("Kept {} of {} documents", context_set.len(), retrieved);
        emit(trace, StageEvent::RetrievalCompleted(context_set)).await?;

        *state = state.advance(PipelineState::Generating)?;
        let mut answer = until_closed(trace, self.generator.generate(query, history, &context))
            .await?
            .map_err(PipelineError::Generation)?;

        while let Some(fragment) = until_closed(trace, self.next_fragment(&mut answer)).await?? {
            emit(trace, StageEvent::GenerationChunk(fragment)).await?;
        }

        *state = state.advance(PipelineState::Completed)?;
        emit(trace, StageEvent::GenerationCompleted).await
    }

    async fn next_fragment(&self, answer: &mut AnswerStream) -> Result<Option<String>, PipelineError> {
        let next = match self.idle_timeout {
            Some(limit) => tokio::time::timeout(limit, answer.next())
                .await
                .map_err(|_| PipelineError::IdleTimeout(limit))?,
            None => answer.next().await,
        };

        next.transpose().map_err(PipelineError::Generation)
    }
}

/// Reject queries that cannot start a run.
pub fn validate_query(query: &str) -> AppResult<()> {
    if query.trim().is_empty() {
        return Err(AppError::Pipeline("Query cannot be empty".to_string()));
    }
    Ok(())
}

/// Await `work` unless the multiplexer hangs up first.
async fn until_closed<F: Future>(trace: &mpsc::Sender<StageEvent>, work: F) -> Result<F::Output, PipelineError> {
    tokio::select! {
        biased;
        _ = trace.closed() => Err(PipelineError::ConsumerDisconnected),
        output = work => Ok(output),
    }
}

async fn emit(trace: &mpsc::Sender<StageEvent>, event: StageEvent) -> Result<(), PipelineError> {
    trace
        .send(event)
        .await
        .map_err(|_| PipelineError::ConsumerDisconnected)
}
