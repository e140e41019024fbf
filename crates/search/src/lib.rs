//! Hybrid search integration for Lumen.
//!
//! Provides the [`SearchClient`] capability used by the answer pipeline, the
//! query sanitizer every backend query must pass through, and a Weaviate
//! client reached through a Hasura GraphQL gateway.

pub mod client;
pub mod sanitize;
pub mod weaviate;

pub use client::{SearchClient, SearchHit};
pub use sanitize::sanitize_query;
pub use weaviate::WeaviateClient;
