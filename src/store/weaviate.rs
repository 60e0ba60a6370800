//! Weaviate REST/GraphQL client.
//!
//! | Operation | Request |
//! |-----------|---------|
//! | list collections | `GET /v1/schema` |
//! | create collection | `POST /v1/schema` |
//! | upsert | `HEAD /v1/objects/{class}/{id}`, then `POST /v1/objects` or `PUT /v1/objects/{class}/{id}` |
//! | nearest-text query | `POST /v1/graphql` |
//!
//! Store calls carry no timeout and are never retried. Responses are decoded
//! into typed structures; anything that does not fit becomes
//! [`StoreError::MalformedResponse`] with the raw body attached.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use uuid::Uuid;

use super::{StoreError, UpsertOutcome, VectorStore};
use crate::config::is_graphql_name;
use crate::models::FieldMap;
use crate::schema::CollectionSchema;

/// Long-lived handle to one Weaviate server.
pub struct WeaviateStore {
    base_url: String,
    client: reqwest::Client,
}

impl WeaviateStore {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, StoreError> {
        request.send().await.map_err(|source| StoreError::Unreachable {
            url: self.base_url.clone(),
            source,
        })
    }

    async fn read_body(&self, response: reqwest::Response) -> Result<String, StoreError> {
        response.text().await.map_err(|source| StoreError::Unreachable {
            url: self.base_url.clone(),
            source,
        })
    }

    async fn expect_success(
        &self,
        operation: &str,
        response: reqwest::Response,
    ) -> Result<String, StoreError> {
        let status = response.status();
        let body = self.read_body(response).await?;
        if !status.is_success() {
            return Err(StoreError::Status {
                operation: operation.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    async fn graphql(&self, query: String) -> Result<String, StoreError> {
        tracing::debug!(%query, "weaviate graphql");
        let response = self
            .send(
                self.client
                    .post(self.url("/v1/graphql"))
                    .json(&serde_json::json!({ "query": query })),
            )
            .await?;
        self.expect_success("graphql query", response).await
    }

    async fn object_exists(&self, collection: &str, id: Uuid) -> Result<bool, StoreError> {
        let response = self
            .send(
                self.client
                    .head(self.url(&format!("/v1/objects/{}/{}", collection, id))),
            )
            .await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(StoreError::Status {
                operation: format!("object lookup {}", id),
                status: status.as_u16(),
                body: self.read_body(response).await.unwrap_or_default(),
            }),
        }
    }
}

#[async_trait]
impl VectorStore for WeaviateStore {
    fn endpoint(&self) -> &str {
        &self.base_url
    }

    async fn collection_names(&self) -> Result<Vec<String>, StoreError> {
        let response = self.send(self.client.get(self.url("/v1/schema"))).await?;
        let raw = self.expect_success("schema listing", response).await?;
        parse_schema_response(&raw)
    }

    async fn create_collection(&self, schema: &CollectionSchema) -> Result<(), StoreError> {
        let response = self
            .send(
                self.client
                    .post(self.url("/v1/schema"))
                    .json(&schema.to_class_definition()),
            )
            .await?;
        self.expect_success("class creation", response).await?;
        Ok(())
    }

    async fn upsert(
        &self,
        collection: &str,
        id: Uuid,
        properties: &FieldMap,
    ) -> Result<UpsertOutcome, StoreError> {
        if !is_graphql_name(collection) {
            return Err(StoreError::InvalidName(collection.to_string()));
        }
        let body = serde_json::json!({
            "class": collection,
            "id": id,
            "properties": properties,
        });

        if self.object_exists(collection, id).await? {
            let response = self
                .send(
                    self.client
                        .put(self.url(&format!("/v1/objects/{}/{}", collection, id)))
                        .json(&body),
                )
                .await?;
            self.expect_success("object replace", response).await?;
            Ok(UpsertOutcome::Replaced)
        } else {
            let response = self
                .send(self.client.post(self.url("/v1/objects")).json(&body))
                .await?;
            self.expect_success("object create", response).await?;
            Ok(UpsertOutcome::Created)
        }
    }

    async fn near_text(
        &self,
        collection: &str,
        query: &str,
        limit: usize,
        fields: &[String],
    ) -> Result<Vec<FieldMap>, StoreError> {
        let gql = near_text_query(collection, query, limit, fields)?;
        let raw = self.graphql(gql).await?;
        parse_get_response(&raw, collection, fields)
    }

    async fn ping(&self, collection: &str, fields: &[String]) -> Result<(), StoreError> {
        let ping_fields = &fields[..fields.len().min(1)];
        let gql = format!(
            "{{ Get {{ {}(limit: 1) {{ {} }} }} }}",
            checked_name(collection)?,
            selection_set(ping_fields)?
        );
        let raw = self.graphql(gql).await?;
        parse_get_response(&raw, collection, ping_fields).map(|_| ())
    }
}

// ============ Request building ============

fn checked_name(name: &str) -> Result<&str, StoreError> {
    if is_graphql_name(name) {
        Ok(name)
    } else {
        Err(StoreError::InvalidName(name.to_string()))
    }
}

fn selection_set(fields: &[String]) -> Result<String, StoreError> {
    if fields.is_empty() {
        return Ok("_additional { id }".to_string());
    }
    let names = fields
        .iter()
        .map(|f| checked_name(f))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names.join(" "))
}

/// Builds the GraphQL `Get` query for a nearest-text search.
pub fn near_text_query(
    collection: &str,
    query: &str,
    limit: usize,
    fields: &[String],
) -> Result<String, StoreError> {
    // A JSON string literal is also a valid GraphQL string literal.
    let concept = serde_json::to_string(query).map_err(|e| StoreError::InvalidName(e.to_string()))?;
    Ok(format!(
        "{{ Get {{ {}(nearText: {{ concepts: [{}] }}, limit: {}) {{ {} }} }} }}",
        checked_name(collection)?,
        concept,
        limit,
        selection_set(fields)?
    ))
}

// ============ Response decoding ============

#[derive(Debug, Deserialize)]
struct SchemaResponse {
    #[serde(default)]
    classes: Option<Vec<ClassEntry>>,
}

#[derive(Debug, Deserialize)]
struct ClassEntry {
    class: String,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<GraphQlData>,
    #[serde(default)]
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlData {
    #[serde(rename = "Get", default)]
    get: Option<HashMap<String, Option<Vec<FieldMap>>>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

fn parse_schema_response(raw: &str) -> Result<Vec<String>, StoreError> {
    let parsed: SchemaResponse =
        serde_json::from_str(raw).map_err(|e| StoreError::MalformedResponse {
            detail: format!("schema listing: {}", e),
            raw: raw.to_string(),
        })?;
    Ok(parsed
        .classes
        .unwrap_or_default()
        .into_iter()
        .map(|c| c.class)
        .collect())
}

/// Decodes a `Get` response and projects each row onto `fields`.
///
/// Missing fields in a row come back as `null`.
pub fn parse_get_response(
    raw: &str,
    collection: &str,
    fields: &[String],
) -> Result<Vec<FieldMap>, StoreError> {
    let malformed = |detail: String| StoreError::MalformedResponse {
        detail,
        raw: raw.to_string(),
    };

    let parsed: GraphQlResponse =
        serde_json::from_str(raw).map_err(|e| malformed(format!("graphql response: {}", e)))?;

    if let Some(errors) = parsed.errors.filter(|errs| !errs.is_empty()) {
        return Err(StoreError::Query {
            messages: errors.into_iter().map(|e| e.message).collect(),
            raw: raw.to_string(),
        });
    }

    let mut get = parsed
        .data
        .and_then(|d| d.get)
        .ok_or_else(|| malformed("missing data.Get".to_string()))?;

    let rows = get
        .remove(collection)
        .ok_or_else(|| malformed(format!("missing data.Get.{}", collection)))?
        .ok_or_else(|| malformed(format!("data.Get.{} is null", collection)))?;

    Ok(rows
        .into_iter()
        .map(|row| {
            fields
                .iter()
                .map(|f| (f.clone(), row.get(f).cloned().unwrap_or(serde_json::Value::Null)))
                .collect()
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields() -> Vec<String> {
        vec!["title".to_string(), "content".to_string()]
    }

    #[test]
    fn near_text_query_escapes_concept() {
        let q = near_text_query("Eval", "say \"hi\"\n", 3, &fields()).unwrap();
        assert_eq!(
            q,
            r#"{ Get { Eval(nearText: { concepts: ["say \"hi\"\n"] }, limit: 3) { title content } } }"#
        );
    }

    #[test]
    fn near_text_query_rejects_bad_names() {
        let err = near_text_query("Eval", "x", 1, &["a b".to_string()]).unwrap_err();
        assert!(matches!(err, StoreError::InvalidName(_)));
        let err = near_text_query("Eval{", "x", 1, &fields()).unwrap_err();
        assert!(matches!(err, StoreError::InvalidName(_)));
    }

    #[test]
    fn empty_projection_selects_ids() {
        let q = near_text_query("Eval", "x", 1, &[]).unwrap();
        assert!(q.contains("_additional { id }"));
    }

    #[test]
    fn get_response_is_projected() {
        let raw = r#"{"data":{"Get":{"Eval":[{"title":"notes.txt","content":"Alpha","extra":1},{"title":"b.md"}]}}}"#;
        let rows = parse_get_response(raw, "Eval", &fields()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["title"], "notes.txt");
        assert!(rows[0].get("extra").is_none());
        assert!(rows[1]["content"].is_null());
    }

    #[test]
    fn empty_result_is_not_an_error() {
        let raw = r#"{"data":{"Get":{"Eval":[]}}}"#;
        assert!(parse_get_response(raw, "Eval", &fields()).unwrap().is_empty());
    }

    #[test]
    fn graphql_errors_are_query_errors() {
        let raw = r#"{"data":{"Get":{"Eval":null}},"errors":[{"message":"Cannot query field"}]}"#;
        match parse_get_response(raw, "Eval", &fields()).unwrap_err() {
            StoreError::Query { messages, raw: body } => {
                assert_eq!(messages, vec!["Cannot query field".to_string()]);
                assert_eq!(body, raw);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_class_is_malformed() {
        let raw = r#"{"data":{"Get":{"Other":[]}}}"#;
        let err = parse_get_response(raw, "Eval", &fields()).unwrap_err();
        assert!(matches!(err, StoreError::MalformedResponse { .. }));
        assert_eq!(err.raw_payload(), Some(raw));
    }

    #[test]
    fn non_json_is_malformed() {
        let err = parse_get_response("<html>", "Eval", &fields()).unwrap_err();
        assert!(matches!(err, StoreError::MalformedResponse { .. }));
    }

    #[test]
    fn schema_listing_tolerates_missing_classes() {
        assert!(parse_schema_response("{}").unwrap().is_empty());
        let names = parse_schema_response(r#"{"classes":[{"class":"Eval","properties":[]}]}"#).unwrap();
        assert_eq!(names, vec!["Eval".to_string()]);
    }
}
