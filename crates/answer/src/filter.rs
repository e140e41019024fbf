//! Relevance filtering of retrieved documents.

use crate::types::Document;
use lumen_core::config::RetrievalConfig;
use std::cmp::Ordering;

/// Embedding score a document must exceed to reach the context.
pub const DEFAULT_MIN_EMBED_SCORE: f64 = 0.3;

/// Maximum number of documents placed in the context.
pub const DEFAULT_MAX_DOCUMENTS: usize = 5;

/// Selects the context set from retrieved documents.
///
/// Documents with empty content are dropped, the rest are ordered by rerank
/// score (highest first, ties keep retrieval order), those whose embedding
/// score does not exceed the threshold are dropped, and the first
/// `max_documents` are kept.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelevanceFilter {
    pub min_embed_score: f64,
    pub max_documents: usize,
}

impl Default for RelevanceFilter {
    fn default() -> Self {
        Self {
            min_embed_score: DEFAULT_MIN_EMBED_SCORE,
            max_documents: DEFAULT_MAX_DOCUMENTS,
        }
    }
}

impl RelevanceFilter {
    pub fn new(min_embed_score: f64, max_documents: usize) -> Self {
        Self {
            min_embed_score,
            max_documents,
        }
    }

    pub fn from_config(config: &RetrievalConfig) -> Self {
        Self::new(config.min_embed_score, config.max_documents)
    }

    pub fn apply(&self, documents: Vec<Document>) -> Vec<Document> {
        let mut ranked: Vec<Document> = documents
            .into_iter()
            .filter(|doc| !doc.content.is_empty())
            .collect();

        // sort_by is stable
        ranked.sort_by(|a, b| rank_key(b).partial_cmp(&rank_key(a)).unwrap_or(Ordering::Equal));

        ranked
            .into_iter()
            .filter(|doc| doc.embed_score > self.min_embed_score)
            .take(self.max_documents)
            .collect()
    }
}

/// NaN ranks last.
fn rank_key(doc: &Document) -> f64 {
    if doc.rerank_score.is_nan() {
        f64::NEG_INFINITY
    } else {
        doc.rerank_score
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(title: &str, embed: f64, rerank: f64) -> Document {
        Document {
            content: format!("{} content", title),
            title: title.to_string(),
            url: format!("https://example.org/{}", title),
            embed_score: embed,
            rerank_score: rerank,
        }
    }

    fn titles(docs: &[Document]) -> Vec<&str> {
        docs.iter().map(|d| d.title.as_str()).collect()
    }

    #[test]
    fn test_orders_by_rerank_descending() {
        let filter = RelevanceFilter::default();
        let out = filter.apply(vec![doc("a", 0.9, 0.1), doc("b", 0.9, 0.7), doc("c", 0.9, 0.4)]);
        assert_eq!(titles(&out), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let filter = RelevanceFilter::default();
        let out = filter.apply(vec![doc("at", 0.3, 0.9), doc("above", 0.31, 0.5), doc("below", 0.1, 0.99)]);
        assert_eq!(titles(&out), vec!["above"]);
    }

    #[test]
    fn test_score_just_above_threshold_is_kept() {
        let filter = RelevanceFilter::default();
        let out = filter.apply(vec![doc("edge", 0.300000005, 0.5), doc("at", 0.3, 0.9)]);
        assert_eq!(titles(&out), vec!["edge"]);
    }

    #[test]
    fn test_caps_at_max_documents() {
        let filter = RelevanceFilter::default();
        let docs: Vec<Document> = (0..8)
            .map(|i| doc(&format!("d{}", i), 0.5, i as f64 / 10.0))
            .collect();

        let out = filter.apply(docs);
        assert_eq!(titles(&out), vec!["d7", "d6", "d5", "d4", "d3"]);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let filter = RelevanceFilter::default();
        let out = filter.apply(vec![doc("first", 0.5, 0.6), doc("second", 0.5, 0.6), doc("top", 0.5, 0.8)]);
        assert_eq!(titles(&out), vec!["top", "first", "second"]);
    }

    #[test]
    fn test_drops_empty_content() {
        let mut empty = doc("empty", 0.9, 0.9);
        empty.content.clear();

        let out = RelevanceFilter::default().apply(vec![empty, doc("kept", 0.9, 0.1)]);
        assert_eq!(titles(&out), vec!["kept"]);
    }

    #[test]
    fn test_nan_rerank_ranks_last() {
        let out = RelevanceFilter::default().apply(vec![doc("nan", 0.9, f64::NAN), doc("low", 0.9, -1.0)]);
        assert_eq!(titles(&out), vec!["low", "nan"]);
    }

    #[test]
    fn test_output_is_ordered_subset_within_bounds() {
        let filter = RelevanceFilter::new(0.3, 5);
        let input: Vec<Document> = (0..20)
            .map(|i| doc(&format!("d{}", i), (i % 7) as f64 / 10.0, ((i * 13) % 11) as f64 / 10.0))
            .collect();

        let out = filter.apply(input.clone());

        assert!(out.len() <= 5);
        for d in &out {
            assert!(d.embed_score > 0.3);
            assert!(!d.content.is_empty());
            assert!(input.contains(d));
        }
        for pair in out.windows(2) {
            assert!(pair[0].rerank_score >= pair[1].rerank_score);
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(RelevanceFilter::default().apply(Vec::new()).is_empty());
    }

    #[test]
    fn test_from_config() {
        let config = RetrievalConfig {
            min_embed_score: 0.5,
            max_documents: 2,
        };
        assert_eq!(RelevanceFilter::from_config(&config), RelevanceFilter::new(0.5, 2));
    }
}
