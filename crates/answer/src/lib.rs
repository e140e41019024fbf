//! Retrieval-augmented answering for Lumen.
//!
//! A query flows through four stages:
//! 1. **Rewrite**: the LLM turns the question and history into a standalone
//!    search query, or decides no search is needed
//! 2. **Retrieve**: the search backend returns candidate documents
//! 3. **Filter**: documents are ranked by rerank score and trimmed
//! 4. **Generate**: the LLM streams a cited answer over the context
//!
//! Consumers receive a [`PipelineEvent`] stream: `Sources`, answer chunks,
//! then one terminal event.

pub mod context;
pub mod events;
pub mod filter;
pub mod generator;
pub mod multiplexer;
pub mod pipeline;
pub mod retriever;
pub mod rewriter;
pub mod trace;
pub mod types;

#[cfg(test)]
mod tests;

pub use context::format_context;
pub use events::{EventSink, EventStream, PipelineEvent, SinkClosed, FAILURE_MESSAGE};
pub use filter::RelevanceFilter;
pub use multiplexer::RunOutcome;
pub use pipeline::{validate_query, Pipeline, PipelineSettings};
pub use trace::{PipelineError, PipelineState, StageEvent};
pub use types::{Document, Message, RewriteOutcome, Role};
