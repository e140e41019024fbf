//! Translation of the execution trace into consumer events.

use crate::events::{EventSink, PipelineEvent, SinkClosed, FAILURE_MESSAGE};
use crate::trace::StageEvent;
use tokio::sync::mpsc;

/// How a run ended from the consumer's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// `Completed` was delivered
    Completed,

    /// `Failed` was delivered
    Failed,

    /// The consumer went away before a terminal event
    Disconnected,
}

/// Reads the trace and writes protocol events to a sink.
///
/// Delivers `Sources` before any chunk and exactly one terminal event. A
/// trace that ends early or out of order is reported as a failure.
pub struct EventMultiplexer<S> {
    sink: S,
    sources_sent: bool,
}

impl<S: EventSink> EventMultiplexer<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            sources_sent: false,
        }
    }

    /// Forward the trace until a terminal event. Dropping `trace` on return
    /// tells the orchestrator to stop.
    pub async fn forward(mut self, mut trace: mpsc::Receiver<StageEvent>) -> RunOutcome {
        loop {
            let received = tokio::select! {
                biased;
                event = trace.recv() => Some(event),
                _ = self.sink.closed() => None,
            };

            let Some(event) = received else {
                tracing::info!("Consumer went away, cancelling run");
                return RunOutcome::Disconnected;
            };

            let step = match event {
                Some(StageEvent::RetrievalCompleted(documents)) if !self.sources_sent => {
                    tracing::debug!("Forwarding {} sources", documents.len());
                    self.sources_sent = true;
                    self.emit(PipelineEvent::Sources(documents)).await
                }
                Some(StageEvent::GenerationChunk(text)) if self.sources_sent => {
                    self.emit(PipelineEvent::AnswerChunk(text)).await
                }
                Some(StageEvent::GenerationCompleted) if self.sources_sent => {
                    return self.finish(PipelineEvent::Completed, RunOutcome::Completed).await;
                }
                Some(StageEvent::Failed(err)) => {
                    tracing::error!(error = %err, "Answer pipeline failed");
                    return self.fail().await;
                }
                Some(unexpected) => {
                    tracing::error!("Out-of-order trace event: {:?}", unexpected);
                    return self.fail().await;
                }
                None => {
                    tracing::error!("Trace ended without a terminal event");
                    return self.fail().await;
                }
            };

            if step.is_err() {
                return RunOutcome::Disconnected;
            }
        }
    }

    async fn emit(&mut self, event: PipelineEvent) -> Result<(), SinkClosed> {
        let result = self.sink.send(event).await;
        if result.is_err() {
            tracing::info!("Consumer went away, cancelling run");
        }
        result
    }

    async fn finish(&mut self, event: PipelineEvent, outcome: RunOutcome) -> RunOutcome {
        match self.emit(event).await {
            Ok(()) => outcome,
            Err(SinkClosed) => RunOutcome::Disconnected,
        }
    }

    async fn fail(&mut self) -> RunOutcome {
        self.finish(PipelineEvent::Failed(FAILURE_MESSAGE.to_string()), RunOutcome::Failed)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::PipelineError;
    use crate::types::Document;
    use lumen_core::AppError;

    fn document() -> Document {
        Document {
            content: "Paris is the capital.".to_string(),
            title: "Paris".to_string(),
            url: "https://example.org/paris".to_string(),
            embed_score: 0.8,
            rerank_score: 0.9,
        }
    }

    async fn run(trace_events: Vec<StageEvent>, close_trace: bool) -> (RunOutcome, Vec<PipelineEvent>) {
        let (trace_tx, trace_rx) = mpsc::channel(16);
        let (sink_tx, mut sink_rx) = mpsc::channel(16);

        for event in trace_events {
            trace_tx.send(event).await.unwrap();
        }
        let keep_open = if close_trace {
            drop(trace_tx);
            None
        } else {
            Some(trace_tx)
        };

        let outcome = EventMultiplexer::new(sink_tx).forward(trace_rx).await;
        drop(keep_open);

        let mut events = Vec::new();
        while let Some(event) = sink_rx.recv().await {
            events.push(event);
        }
        (outcome, events)
    }

    #[tokio::test]
    async fn test_forwards_happy_path() {
        let (outcome, events) = run(
            vec![
                StageEvent::RetrievalCompleted(vec![document()]),
                StageEvent::GenerationChunk("Paris".to_string()),
                StageEvent::GenerationChunk(" [1]".to_string()),
                StageEvent::GenerationCompleted,
            ],
            false,
        )
        .await;

        assert_eq!(outcome, RunOutcome::Completed);
        assert_eq!(
            events,
            vec![
                PipelineEvent::Sources(vec![document()]),
                PipelineEvent::AnswerChunk("Paris".to_string()),
                PipelineEvent::AnswerChunk(" [1]".to_string()),
                PipelineEvent::Completed,
            ]
        );
    }

    #[tokio::test]
    async fn test_failure_uses_generic_message() {
        let (outcome, events) = run(
            vec![StageEvent::Failed(PipelineError::Retrieval(AppError::Search(
                "secret internal detail".to_string(),
            )))],
            false,
        )
        .await;

        assert_eq!(outcome, RunOutcome::Failed);
        assert_eq!(events, vec![PipelineEvent::Failed(FAILURE_MESSAGE.to_string())]);
    }

    #[tokio::test]
    async fn test_trace_closed_early_becomes_failure() {
        let (outcome, events) = run(
            vec![
                StageEvent::RetrievalCompleted(Vec::new()),
                StageEvent::GenerationChunk("partial".to_string()),
            ],
            true,
        )
        .await;

        assert_eq!(outcome, RunOutcome::Failed);
        assert_eq!(events.len(), 3);
        assert_eq!(events[2], PipelineEvent::Failed(FAILURE_MESSAGE.to_string()));
    }

    #[tokio::test]
    async fn test_chunk_before_sources_is_rejected() {
        let (outcome, events) = run(vec![StageEvent::GenerationChunk("early".to_string())], false).await;

        assert_eq!(outcome, RunOutcome::Failed);
        assert_eq!(events, vec![PipelineEvent::Failed(FAILURE_MESSAGE.to_string())]);
    }

    #[tokio::test]
    async fn test_stops_at_first_terminal_event() {
        let (outcome, events) = run(
            vec![
                StageEvent::RetrievalCompleted(Vec::new()),
                StageEvent::GenerationCompleted,
                StageEvent::GenerationChunk("late".to_string()),
                StageEvent::Failed(PipelineError::ConsumerDisconnected),
            ],
            false,
        )
        .await;

        assert_eq!(outcome, RunOutcome::Completed);
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
        assert_eq!(events.last(), Some(&PipelineEvent::Completed));
    }

    #[tokio::test]
    async fn test_closed_sink_is_a_disconnect() {
        let (trace_tx, trace_rx) = mpsc::channel(4);
        let (sink_tx, sink_rx) = mpsc::channel(4);
        drop(sink_rx);

        let _trace_tx = trace_tx;
        let outcome = EventMultiplexer::new(sink_tx).forward(trace_rx).await;
        assert_eq!(outcome, RunOutcome::Disconnected);
    }
}
