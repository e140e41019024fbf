//! Consumer-facing event protocol.
//!
//! Every run produces `Sources`, then zero or more `AnswerChunk`s, then
//! exactly one terminal `Completed` or `Failed`. Serialized, each event is an
//! object with a `type` (`sources`, `response`, `end`, `error`) and, except
//! for `end`, a `data` payload.

use crate::types::Document;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// Message consumers see when a run fails; details go to the log only.
pub const FAILURE_MESSAGE: &str = "An error has occurred please try again later";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PipelineEvent {
    #[serde(rename = "sources")]
    Sources(Vec<Document>),

    #[serde(rename = "response")]
    AnswerChunk(String),

    #[serde(rename = "end")]
    Completed,

    #[serde(rename = "error")]
    Failed(String),
}

impl PipelineEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineEvent::Completed | PipelineEvent::Failed(_))
    }
}

/// The consumer went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkClosed;

/// Destination for pipeline events.
#[async_trait::async_trait]
pub trait EventSink: Send + Sync {
    async fn send(&mut self, event: PipelineEvent) -> Result<(), SinkClosed>;

    /// Resolves once the consumer has gone away. Sinks that cannot tell
    /// never resolve.
    async fn closed(&self) {
        futures::future::pending::<()>().await
    }
}

#[async_trait::async_trait]
impl EventSink for mpsc::Sender<PipelineEvent> {
    async fn send(&mut self, event: PipelineEvent) -> Result<(), SinkClosed> {
        mpsc::Sender::send(self, event).await.map_err(|_| SinkClosed)
    }

    async fn closed(&self) {
        mpsc::Sender::closed(self).await
    }
}

/// Receiving half handed to consumers by [`crate::Pipeline::spawn`].
///
/// Dropping it cancels the run.
pub struct EventStream {
    receiver: mpsc::Receiver<PipelineEvent>,
}

impl EventStream {
    pub(crate) fn new(receiver: mpsc::Receiver<PipelineEvent>) -> Self {
        Self { receiver }
    }

    pub async fn recv(&mut self) -> Option<PipelineEvent> {
        self.receiver.recv().await
    }
}

impl Stream for EventStream {
    type Item = PipelineEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_shapes() {
        let sources = PipelineEvent::Sources(vec![Document {
            content: "Paris is the capital.".to_string(),
            title: "Paris".to_string(),
            url: "https://example.org/paris".to_string(),
            embed_score: 0.5,
            rerank_score: 0.75,
        }]);

        assert_eq!(
            serde_json::to_value(&sources).unwrap(),
            json!({
                "type": "sources",
                "data": [{
                    "content": "Paris is the capital.",
                    "title": "Paris",
                    "url": "https://example.org/paris",
                    "embedScore": 0.5,
                    "rerankScore": 0.75
                }]
            })
        );
        assert_eq!(
            serde_json::to_value(PipelineEvent::AnswerChunk("Hi".to_string())).unwrap(),
            json!({ "type": "response", "data": "Hi" })
        );
        assert_eq!(
            serde_json::to_value(PipelineEvent::Completed).unwrap(),
            json!({ "type": "end" })
        );
        assert_eq!(
            serde_json::to_value(PipelineEvent::Failed(FAILURE_MESSAGE.to_string())).unwrap(),
            json!({ "type": "error", "data": FAILURE_MESSAGE })
        );
    }

    #[test]
    fn test_parse_end_event() {
        let event: PipelineEvent = serde_json::from_str(r#"{"type":"end"}"#).unwrap();
        assert_eq!(event, PipelineEvent::Completed);
        assert!(event.is_terminal());
    }

    #[tokio::test]
    async fn test_channel_sink_reports_closed() {
        let (mut tx, rx) = mpsc::channel::<PipelineEvent>(4);
        EventSink::send(&mut tx, PipelineEvent::Completed).await.unwrap();

        drop(rx);
        EventSink::closed(&tx).await;
        assert_eq!(EventSink::send(&mut tx, PipelineEvent::Completed).await, Err(SinkClosed));
    }
}
