//! Search capability abstraction.

use lumen_core::AppResult;
use serde::{Deserialize, Serialize};

/// One raw hit returned by a search backend.
///
/// Fields are optional because backends may omit them; callers decide what
/// to do with incomplete hits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub content: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,

    /// Similarity score from the hybrid retrieval pass
    pub embed_score: Option<f64>,

    /// Score assigned by the reranking model
    pub rerank_score: Option<f64>,
}

/// Trait for hybrid search backends.
///
/// Implementations receive queries that have already been through
/// [`crate::sanitize_query`].
#[async_trait::async_trait]
pub trait SearchClient: Send + Sync {
    /// Get the backend name (e.g., "weaviate").
    fn backend_name(&self) -> &str;

    /// Run a hybrid search for `query`.
    async fn search(&self, query: &str) -> AppResult<Vec<SearchHit>>;
}
