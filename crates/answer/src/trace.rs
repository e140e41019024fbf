//! Internal execution trace of one pipeline run.
//!
//! The orchestrator reports progress as [`StageEvent`]s on a bounded channel
//! read by the multiplexer. Stage failures are typed so the multiplexer can
//! log the cause while only a generic message reaches the consumer.

use crate::types::Document;
use lumen_core::AppError;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Progress reported by the orchestrator.
#[derive(Debug)]
pub enum StageEvent {
    /// The filtered context set; sent once, before any chunk
    RetrievalCompleted(Vec<Document>),

    /// A non-empty fragment of answer text
    GenerationChunk(String),

    /// The answer stream ended normally
    GenerationCompleted,

    Failed(PipelineError),
}

/// Why a run stopped early.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("query rewrite failed: {0}")]
    Rewrite(#[source] AppError),

    #[error("retrieval failed: {0}")]
    Retrieval(#[source] AppError),

    #[error("answer generation failed: {0}")]
    Generation(#[source] AppError),

    #[error("no answer fragment within {0:?}")]
    IdleTimeout(Duration),

    #[error("consumer disconnected")]
    ConsumerDisconnected,

    #[error("illegal transition from {from} to {to}")]
    IllegalTransition {
        from: PipelineState,
        to: PipelineState,
    },
}

/// Lifecycle of a run.
///
/// `Idle → Rewriting → Retrieving → Filtering → Generating → Completed`, with
/// `Failed` reachable from every non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Rewriting,
    Retrieving,
    Filtering,
    Generating,
    Completed,
    Failed,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Completed | PipelineState::Failed)
    }

    fn successor(&self) -> Option<PipelineState> {
        match self {
            PipelineState::Idle => Some(PipelineState::Rewriting),
            PipelineState::Rewriting => Some(PipelineState::Retrieving),
            PipelineState::Retrieving => Some(PipelineState::Filtering),
            PipelineState::Filtering => Some(PipelineState::Generating),
            PipelineState::Generating => Some(PipelineState::Completed),
            PipelineState::Completed | PipelineState::Failed => None,
        }
    }

    /// Move to `to` if the lifecycle allows it.
    pub fn advance(self, to: PipelineState) -> Result<PipelineState, PipelineError> {
        let allowed = match to {
            PipelineState::Failed => !self.is_terminal(),
            _ => self.successor() == Some(to),
        };

        if allowed {
            tracing::debug!("Pipeline state {} -> {}", self, to);
            Ok(to)
        } else {
            Err(PipelineError::IllegalTransition { from: self, to })
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Idle => "idle",
            PipelineState::Rewriting => "rewriting",
            PipelineState::Retrieving => "retrieving",
            PipelineState::Filtering => "filtering",
            PipelineState::Generating => "generating",
            PipelineState::Completed => "completed",
            PipelineState::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        let mut state = PipelineState::Idle;
        for next in [
            PipelineState::Rewriting,
            PipelineState::Retrieving,
            PipelineState::Filtering,
            PipelineState::Generating,
            PipelineState::Completed,
        ] {
            state = state.advance(next).unwrap();
        }
        assert!(state.is_terminal());
    }

    #[test]
    fn test_cannot_skip_stages() {
        let err = PipelineState::Rewriting.advance(PipelineState::Generating).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::IllegalTransition {
                from: PipelineState::Rewriting,
                to: PipelineState::Generating
            }
        ));
    }

    #[test]
    fn test_failed_reachable_until_terminal() {
        assert!(PipelineState::Idle.advance(PipelineState::Failed).is_ok());
        assert!(PipelineState::Generating.advance(PipelineState::Failed).is_ok());
        assert!(PipelineState::Completed.advance(PipelineState::Failed).is_err());
        assert!(PipelineState::Failed.advance(PipelineState::Failed).is_err());
    }

    #[test]
    fn test_error_messages_name_the_stage() {
        let err = PipelineError::Retrieval(AppError::Search("gateway down".to_string()));
        assert!(err.to_string().starts_with("retrieval failed"));
        assert!(err.to_string().contains("gateway down"));
    }
}
