//! Collection schema and the create-if-absent step that precedes ingestion.

use serde_json::{json, Value};

use crate::config::WeaviateConfig;
use crate::store::{StoreError, VectorStore};

/// One property of a collection. Only `text` properties are used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertySpec {
    pub name: String,
    pub data_type: String,
}

impl PropertySpec {
    pub fn text(name: &str) -> Self {
        Self {
            name: name.to_string(),
            data_type: "text".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSchema {
    pub name: String,
    pub properties: Vec<PropertySpec>,
    pub vectorizer: Option<String>,
    pub vectorizer_model: Option<String>,
}

impl CollectionSchema {
    /// A collection with a display-name and a content text property.
    pub fn text_pair(name: &str, title_field: &str, content_field: &str) -> Self {
        Self {
            name: name.to_string(),
            properties: vec![PropertySpec::text(title_field), PropertySpec::text(content_field)],
            vectorizer: None,
            vectorizer_model: None,
        }
    }

    /// The document collection described by the store configuration.
    pub fn documents(cfg: &WeaviateConfig) -> Self {
        let mut schema = Self::text_pair(&cfg.class_name, &cfg.title_field, &cfg.content_field);
        schema.vectorizer = cfg.vectorizer.clone();
        schema.vectorizer_model = cfg.vectorizer_model.clone();
        schema
    }

    /// Class definition body for `POST /v1/schema`.
    pub fn to_class_definition(&self) -> Value {
        let properties: Vec<Value> = self
            .properties
            .iter()
            .map(|p| json!({ "name": p.name, "dataType": [p.data_type] }))
            .collect();

        let mut class = json!({
            "class": self.name,
            "properties": properties,
        });

        if let Some(vectorizer) = &self.vectorizer {
            class["vectorizer"] = json!(vectorizer);
            if let Some(model) = &self.vectorizer_model {
                let mut module_config = serde_json::Map::new();
                module_config.insert(vectorizer.clone(), json!({ "model": model }));
                class["moduleConfig"] = Value::Object(module_config);
            }
        }
        class
    }
}

/// Creates the collection unless a class with the same name exists.
///
/// Returns `true` when the collection was created by this call. An existing
/// class is left untouched even if its properties differ.
pub async fn ensure_collection(
    store: &dyn VectorStore,
    schema: &CollectionSchema,
) -> Result<bool, StoreError> {
    let existing = store.collection_names().await?;
    if existing.iter().any(|name| name == &schema.name) {
        tracing::debug!(class = %schema.name, "collection already exists");
        return Ok(false);
    }
    store.create_collection(schema).await?;
    tracing::info!(class = %schema.name, "created collection");
    Ok(true)
}
