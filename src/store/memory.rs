//! Process-local [`VectorStore`] used by tests and offline runs.
//!
//! Nearest-text queries are approximated by lowercase term overlap between
//! the query and every stored text property. Rows with no overlapping term
//! are not returned, so an unrelated query yields an empty result just like a
//! real vector search with a distance cutoff.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use super::{StoreError, UpsertOutcome, VectorStore};
use crate::models::FieldMap;
use crate::schema::CollectionSchema;

#[derive(Default)]
struct Collection {
    schema: Option<CollectionSchema>,
    // Keyed by id so iteration order is stable across runs.
    objects: BTreeMap<Uuid, FieldMap>,
}

#[derive(Default)]
pub struct InMemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of objects stored in `collection` (0 when it does not exist).
    pub fn object_count(&self, collection: &str) -> usize {
        self.read()
            .get(collection)
            .map(|c| c.objects.len())
            .unwrap_or(0)
    }

    /// Properties stored under `id`, if any.
    pub fn get_object(&self, collection: &str, id: Uuid) -> Option<FieldMap> {
        self.read()
            .get(collection)
            .and_then(|c| c.objects.get(&id).cloned())
    }

    /// Schema the collection was created with.
    pub fn schema_of(&self, collection: &str) -> Option<CollectionSchema> {
        self.read().get(collection).and_then(|c| c.schema.clone())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Collection>> {
        self.collections
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Collection>> {
        self.collections
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

fn overlap(query_terms: &HashSet<String>, properties: &FieldMap) -> usize {
    let mut doc_terms = HashSet::new();
    for value in properties.values() {
        if let Some(s) = value.as_str() {
            doc_terms.extend(terms(s));
        }
    }
    query_terms.intersection(&doc_terms).count()
}

#[async_trait]
impl VectorStore for InMemoryStore {
    fn endpoint(&self) -> &str {
        "memory://"
    }

    async fn collection_names(&self) -> Result<Vec<String>, StoreError> {
        let mut names: Vec<String> = self
            .read()
            .iter()
            .filter(|(_, c)| c.schema.is_some())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        Ok(names)
    }

    async fn create_collection(&self, schema: &CollectionSchema) -> Result<(), StoreError> {
        let mut guard = self.write();
        let entry = guard.entry(schema.name.clone()).or_default();
        if entry.schema.is_some() {
            return Err(StoreError::Status {
                operation: "class creation".to_string(),
                status: 422,
                body: format!("class name {} already exists", schema.name),
            });
        }
        entry.schema = Some(schema.clone());
        Ok(())
    }

    async fn upsert(
        &self,
        collection: &str,
        id: Uuid,
        properties: &FieldMap,
    ) -> Result<UpsertOutcome, StoreError> {
        let mut guard = self.write();
        let entry = guard.get_mut(collection).ok_or_else(|| StoreError::Status {
            operation: "object create".to_string(),
            status: 422,
            body: format!("class {} does not exist", collection),
        })?;
        match entry.objects.insert(id, properties.clone()) {
            Some(_) => Ok(UpsertOutcome::Replaced),
            None => Ok(UpsertOutcome::Created),
        }
    }

    async fn near_text(
        &self,
        collection: &str,
        query: &str,
        limit: usize,
        fields: &[String],
    ) -> Result<Vec<FieldMap>, StoreError> {
        let guard = self.read();
        let entry = guard.get(collection).ok_or_else(|| StoreError::Query {
            messages: vec![format!("Cannot query field \"{}\" on type \"GetObjectsObj\".", collection)],
            raw: String::new(),
        })?;

        let query_terms = terms(query);
        let mut scored: Vec<(usize, &FieldMap)> = entry
            .objects
            .values()
            .map(|props| (overlap(&query_terms, props), props))
            .filter(|(score, _)| *score > 0)
            .collect();
        // Stable sort keeps id order among equal scores.
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(_, props)| {
                fields
                    .iter()
                    .map(|f| (f.clone(), props.get(f).cloned().unwrap_or(serde_json::Value::Null)))
                    .collect()
            })
            .collect())
    }

    async fn ping(&self, collection: &str, fields: &[String]) -> Result<(), StoreError> {
        self.near_text(collection, "", 1, fields).await.map(|_| ())
    }
}
