//! Document retrieval.

use crate::types::{Document, RewriteOutcome};
use lumen_core::AppResult;
use lumen_search::{sanitize_query, SearchClient};
use std::sync::Arc;

pub struct Retriever {
    search: Arc<dyn SearchClient>,
}

impl Retriever {
    pub fn new(search: Arc<dyn SearchClient>) -> Self {
        Self { search }
    }

    /// Fetch candidate documents for a rewrite outcome.
    ///
    /// No search is issued when retrieval is not needed or when nothing is
    /// left of the question after sanitization. Hits missing a field are
    /// dropped.
    pub async fn retrieve(&self, outcome: &RewriteOutcome) -> AppResult<Vec<Document>> {
        let question = match outcome {
            RewriteOutcome::NoRetrievalNeeded => return Ok(Vec::new()),
            RewriteOutcome::NeedsRetrieval(question) => question,
        };

        let query = sanitize_query(question);
        if query.is_empty() {
            tracing::warn!("Question is empty after sanitization, skipping search");
            return Ok(Vec::new());
        }

        let hits = self.search.search(&query).await?;
        let total = hits.len();
        let documents: Vec<Document> = hits.into_iter().filter_map(Document::from_hit).collect();

        if documents.len() < total {
            tracing::debug!(
                backend = self.search.backend_name(),
                "Dropped {} incomplete hits",
                total - documents.len()
            );
        }

        Ok(documents)
    }
}
