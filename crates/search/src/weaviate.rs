//! Weaviate hybrid search behind a Hasura GraphQL gateway.
//!
//! The gateway forwards `Get` queries to Weaviate. Each hit carries the hybrid
//! `score` and the score of Weaviate's reranker module under `_additional`.

use crate::client::{SearchClient, SearchHit};
use lumen_core::config::SearchConfig;
use lumen_core::{AppError, AppResult};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::time::Duration;

/// Client for Weaviate exposed through Hasura.
pub struct WeaviateClient {
    endpoint: String,
    admin_secret: Option<String>,
    collection: String,
    timeout: Duration,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct RawHit {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(rename = "_additional", default)]
    additional: Option<Additional>,
}

#[derive(Debug, Deserialize)]
struct Additional {
    #[serde(default, deserialize_with = "lenient_score")]
    score: Option<f64>,
    #[serde(default)]
    rerank: Option<Vec<RerankScore>>,
}

#[derive(Debug, Deserialize)]
struct RerankScore {
    #[serde(default, deserialize_with = "lenient_score")]
    score: Option<f64>,
}

/// Weaviate reports hybrid scores as strings and rerank scores as numbers.
fn lenient_score<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    })
}

impl RawHit {
    fn into_hit(self) -> SearchHit {
        let (embed_score, rerank_score) = match self.additional {
            Some(additional) => (
                additional.score,
                additional
                    .rerank
                    .and_then(|r| r.into_iter().next())
                    .and_then(|r| r.score),
            ),
            None => (None, None),
        };

        SearchHit {
            content: self.content,
            title: self.title,
            url: self.url,
            embed_score,
            rerank_score,
        }
    }
}

impl WeaviateClient {
    /// Create a client from the search configuration.
    pub fn from_config(config: &SearchConfig) -> AppResult<Self> {
        let endpoint = config
            .endpoint
            .as_deref()
            .ok_or_else(|| AppError::Config("Search endpoint is not configured".to_string()))?;

        Self::new(
            endpoint,
            config.admin_secret.clone(),
            &config.collection,
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Create a client for `collection` behind the gateway at `endpoint`.
    pub fn new(
        endpoint: impl Into<String>,
        admin_secret: Option<String>,
        collection: &str,
        timeout: Duration,
    ) -> AppResult<Self> {
        if !is_graphql_name(collection) {
            return Err(AppError::Config(format!(
                "Invalid search collection name: '{}'",
                collection
            )));
        }

        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            admin_secret,
            collection: collection.to_string(),
            timeout,
            client: reqwest::Client::new(),
        })
    }

    fn graphql_url(&self) -> String {
        format!("{}/v1/graphql", self.endpoint)
    }

    fn graphql_query(&self) -> String {
        format!(
            r#"query HybridSearch($query: String!) {{
  Get {{
    {}(hybrid: {{query: $query}}) {{
      content
      title
      url
      _additional {{
        score
        rerank(query: $query, property: "content") {{
          score
        }}
      }}
    }}
  }}
}}"#,
            self.collection
        )
    }

    /// Extract hits from a GraphQL response body.
    fn parse_response(&self, body: Value) -> AppResult<Vec<SearchHit>> {
        if let Some(errors) = body.get("errors").and_then(Value::as_array) {
            if !errors.is_empty() {
                let messages: Vec<&str> = errors
                    .iter()
                    .filter_map(|e| e.get("message").and_then(Value::as_str))
                    .collect();
                return Err(AppError::Search(format!(
                    "GraphQL errors: {}",
                    messages.join("; ")
                )));
            }
        }

        let hits = body
            .get("data")
            .and_then(|d| d.get("Get"))
            .and_then(|g| g.get(&self.collection))
            .ok_or_else(|| {
                AppError::Search(format!(
                    "Response has no data.Get.{} field",
                    self.collection
                ))
            })?;

        if hits.is_null() {
            return Ok(Vec::new());
        }

        let raw: Vec<RawHit> = serde_json::from_value(hits.clone())
            .map_err(|e| AppError::Search(format!("Malformed search hits: {}", e)))?;

        Ok(raw.into_iter().map(RawHit::into_hit).collect())
    }
}

fn is_graphql_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

#[async_trait::async_trait]
impl SearchClient for WeaviateClient {
    fn backend_name(&self) -> &str {
        "weaviate"
    }

    async fn search(&self, query: &str) -> AppResult<Vec<SearchHit>> {
        tracing::info!(collection = %self.collection, "Performing hybrid search");
        tracing::debug!("Search query: {}", query);

        let payload = serde_json::json!({
            "query": self.graphql_query(),
            "variables": { "query": query },
        });

        let mut request = self
            .client
            .post(self.graphql_url())
            .timeout(self.timeout)
            .json(&payload);

        if let Some(ref secret) = self.admin_secret {
            request = request.header("x-hasura-admin-secret", secret);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::Search(format!("Failed to reach search gateway: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Search(format!(
                "Search gateway error ({}): {}",
                status, error_text
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| AppError::Search(format!("Failed to parse search response: {}", e)))?;

        let hits = self.parse_response(body)?;
        tracing::info!("Retrieved {} hits from {}", hits.len(), self.collection);

        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client() -> WeaviateClient {
        WeaviateClient::new("http://hasura:8080/", None, "Article", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_urls_and_query() {
        let client = client();
        assert_eq!(client.graphql_url(), "http://hasura:8080/v1/graphql");

        let query = client.graphql_query();
        assert!(query.contains("Article(hybrid: {query: $query})"));
        assert!(query.contains(r#"rerank(query: $query, property: "content")"#));
    }

    #[test]
    fn test_rejects_invalid_collection() {
        let result = WeaviateClient::new("http://x", None, "Bad{Name}", Duration::from_secs(1));
        assert!(matches!(result, Err(AppError::Config(_))));
        assert!(WeaviateClient::new("http://x", None, "", Duration::from_secs(1)).is_err());
    }

    #[test]
    fn test_from_config_requires_endpoint() {
        let config = SearchConfig::default();
        assert!(WeaviateClient::from_config(&config).is_err());
    }

    #[test]
    fn test_parse_hits_with_string_and_number_scores() {
        let body = json!({
            "data": { "Get": { "Article": [
                {
                    "content": "Paris has 2.1 million inhabitants.",
                    "title": "Paris",
                    "url": "https://example.org/paris",
                    "_additional": { "score": "0.72", "rerank": [{ "score": 0.91 }] }
                },
                {
                    "content": "Lyon is in France.",
                    "title": "Lyon",
                    "url": "https://example.org/lyon",
                    "_additional": { "score": 0.4, "rerank": [] }
                }
            ]}}
        });

        let hits = client().parse_response(body).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].embed_score, Some(0.72));
        assert_eq!(hits[0].rerank_score, Some(0.91));
        assert_eq!(hits[0].title.as_deref(), Some("Paris"));
        assert_eq!(hits[1].embed_score, Some(0.4));
        assert_eq!(hits[1].rerank_score, None);
    }

    #[test]
    fn test_parse_keeps_full_score_precision() {
        let body = json!({ "data": { "Get": { "Article": [
            {
                "content": "Just above the gate.",
                "title": "Edge",
                "url": "https://example.org/edge",
                "_additional": { "score": 0.300000005, "rerank": [{ "score": "0.300000005" }] }
            }
        ]}}});

        let hits = client().parse_response(body).unwrap();
        let embed = hits[0].embed_score.unwrap();
        assert_eq!(embed, 0.300000005);
        assert!(embed > 0.3);
        assert_eq!(hits[0].rerank_score, Some(0.300000005));
    }

    #[test]
    fn test_parse_missing_fields_kept_as_none() {
        let body = json!({ "data": { "Get": { "Article": [ { "title": "No content" } ] } } });
        let hits = client().parse_response(body).unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].content.is_none());
        assert!(hits[0].embed_score.is_none());
    }

    #[test]
    fn test_parse_graphql_errors() {
        let body = json!({ "errors": [ { "message": "class Article not found" } ], "data": null });
        match client().parse_response(body) {
            Err(AppError::Search(msg)) => assert!(msg.contains("class Article not found")),
            other => panic!("Expected search error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_missing_collection_is_error() {
        let body = json!({ "data": { "Get": {} } });
        assert!(client().parse_response(body).is_err());
    }

    #[test]
    fn test_parse_null_collection_is_empty() {
        let body = json!({ "data": { "Get": { "Article": null } } });
        assert!(client().parse_response(body).unwrap().is_empty());
    }
}
