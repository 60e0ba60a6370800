//! Retrieval gateway over the document collection.

use anyhow::Result;

use crate::config::{Config, WeaviateConfig};
use crate::models::FieldMap;
use crate::store::weaviate::WeaviateStore;
use crate::store::{StoreError, VectorStore};

/// Nearest-text search in the configured collection.
///
/// Each row carries exactly `fields`; values the store omitted are `null`.
/// An empty vector means no match.
pub async fn search(
    store: &dyn VectorStore,
    weaviate: &WeaviateConfig,
    query: &str,
    limit: usize,
    fields: &[String],
) -> Result<Vec<FieldMap>, StoreError> {
    tracing::debug!(query, limit, "nearText search");
    store
        .near_text(&weaviate.class_name, query, limit, fields)
        .await
}

/// Content of the best `limit` matches, in rank order. Rows without a string
/// content value are dropped.
pub async fn retrieve_contents(
    store: &dyn VectorStore,
    weaviate: &WeaviateConfig,
    query: &str,
    limit: usize,
) -> Result<Vec<String>, StoreError> {
    let field = weaviate.content_field.clone();
    let rows = search(store, weaviate, query, limit, std::slice::from_ref(&field)).await?;
    Ok(rows
        .into_iter()
        .filter_map(|mut row| match row.remove(&field) {
            Some(serde_json::Value::String(s)) => Some(s),
            _ => None,
        })
        .collect())
}

/// CLI entry point: prints the matching rows as JSON.
pub async fn run_search(config: &Config, query: &str, limit: Option<usize>) -> Result<()> {
    let store = WeaviateStore::new(&config.weaviate.url)?;
    let limit = limit.unwrap_or(config.generation.retrieval_limit);
    let rows = search(&store, &config.weaviate, query, limit, &config.weaviate.fields).await?;
    if rows.is_empty() {
        println!("No results.");
        return Ok(());
    }
    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}
