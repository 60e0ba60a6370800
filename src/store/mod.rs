//! Vector store abstraction.
//!
//! The [`VectorStore`] trait covers exactly what the pipelines need from the
//! external database: list and create collections, upsert an object under a
//! caller-chosen identifier, and run a nearest-text query with a field
//! projection. [`weaviate::WeaviateStore`] talks to a Weaviate server over
//! REST/GraphQL; [`memory::InMemoryStore`] is a process-local stand-in used by
//! tests and dry runs.
//!
//! A store handle is constructed once at process start and shared as
//! `Arc<dyn VectorStore>`; implementations hold no per-request state.

pub mod memory;
pub mod weaviate;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::FieldMap;
use crate::schema::CollectionSchema;

/// Errors surfaced by store operations. None of them are retried.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached (connection refused, DNS, reset).
    #[error("store unreachable at {url}: {source}")]
    Unreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The store answered with a non-success HTTP status.
    #[error("store returned HTTP {status} for {operation}: {body}")]
    Status {
        operation: String,
        status: u16,
        body: String,
    },

    /// The query was accepted but the store reported errors for it.
    #[error("store query failed: {}", messages.join("; "))]
    Query { messages: Vec<String>, raw: String },

    /// The response did not have the expected shape.
    #[error("malformed store response: {detail}\nRaw: {raw}")]
    MalformedResponse { detail: String, raw: String },

    /// A class or property name that cannot be used in a query.
    #[error("invalid name: {0}")]
    InvalidName(String),
}

impl StoreError {
    /// Raw upstream payload, when the error carries one.
    pub fn raw_payload(&self) -> Option<&str> {
        match self {
            StoreError::Query { raw, .. } | StoreError::MalformedResponse { raw, .. } => Some(raw),
            StoreError::Status { body, .. } => Some(body),
            _ => None,
        }
    }
}

/// Result of an upsert: whether the identifier was new to the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Replaced,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Base URL (or label) of the store, for logs and health reports.
    fn endpoint(&self) -> &str;

    /// Names of all existing collections.
    async fn collection_names(&self) -> Result<Vec<String>, StoreError>;

    /// Creates a collection. Callers check existence first.
    async fn create_collection(&self, schema: &CollectionSchema) -> Result<(), StoreError>;

    /// Inserts or overwrites the object stored under `id`.
    async fn upsert(
        &self,
        collection: &str,
        id: Uuid,
        properties: &FieldMap,
    ) -> Result<UpsertOutcome, StoreError>;

    /// Nearest-text query returning at most `limit` rows projected onto `fields`.
    ///
    /// An empty vector means the query succeeded with no matches.
    async fn near_text(
        &self,
        collection: &str,
        query: &str,
        limit: usize,
        fields: &[String],
    ) -> Result<Vec<FieldMap>, StoreError>;

    /// Cheap round trip proving the store answers queries for `collection`.
    async fn ping(&self, collection: &str, fields: &[String]) -> Result<(), StoreError>;
}
