//! Agent-facing tools.
//!
//! Every tool implements [`Tool`]: a name, a description, a JSON Schema for
//! its parameters, and an async `execute`. The [`ToolRegistry`] is the single
//! list both the MCP bridge and the REST `/tools/*` routes read from, so the
//! two transports always expose the same set.
//!
//! # Built-in tools
//!
//! | Name | Parameters | Result |
//! |------|------------|--------|
//! | `weaviate_search` | `query_text`, `limit` (default 5) | array of field maps |
//! | `generate_evaluation_report` | `query` | proxied report response |
//! | `healthcheck` | none | `{weaviate, backend}` reachability |

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;

use crate::backend::BackendClient;
use crate::config::Config;
use crate::health;
use crate::retrieve;
use crate::store::VectorStore;

/// The caller sent parameters the tool cannot run with.
///
/// Tools return it through `anyhow`; transports downcast it to tell a bad
/// request apart from a failing backing service.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct InvalidParams(pub String);

/// Default row count for `weaviate_search`.
pub const DEFAULT_SEARCH_LIMIT: i64 = 5;

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema (`type: object`) describing the accepted parameters.
    fn parameters_schema(&self) -> Value;

    /// Runs the tool. `params` has already passed [`validate_params`], so
    /// defaults are filled in.
    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value>;
}

/// Shared handles every tool runs against.
#[derive(Clone)]
pub struct ToolContext {
    config: Arc<Config>,
    store: Arc<dyn VectorStore>,
    backend: Arc<BackendClient>,
}

impl ToolContext {
    pub fn new(
        config: Arc<Config>,
        store: Arc<dyn VectorStore>,
        backend: Arc<BackendClient>,
    ) -> Self {
        Self {
            config,
            store,
            backend,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &dyn VectorStore {
        self.store.as_ref()
    }

    pub fn backend(&self) -> &BackendClient {
        &self.backend
    }
}

pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// The three tools exposed by `rh serve mcp`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(WeaviateSearchTool));
        registry.register(Box::new(GenerateReportTool));
        registry.register(Box::new(HealthcheckTool));
        registry
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn tools(&self) -> &[Box<dyn Tool>] {
        &self.tools
    }

    pub fn find(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Checks `params` against a tool's schema and fills in defaults.
///
/// Covers what the built-in schemas use: `required`, primitive `type`
/// checks, `minimum`, and `default`. A non-object `params` is treated as
/// `{}`.
pub fn validate_params(schema: &Value, params: &Value) -> Result<Value, InvalidParams> {
    let given = params.as_object().cloned().unwrap_or_default();

    let properties = schema
        .get("properties")
        .and_then(|p| p.as_object())
        .cloned()
        .unwrap_or_default();

    let required: Vec<&str> = schema
        .get("required")
        .and_then(|r| r.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();

    for field in &required {
        if !given.contains_key(*field) {
            return Err(InvalidParams(format!("missing required parameter: {}", field)));
        }
    }

    let mut result = given.clone();
    for (name, prop) in &properties {
        let Some(value) = given.get(name) else {
            if let Some(default) = prop.get("default") {
                result.insert(name.clone(), default.clone());
            }
            continue;
        };

        if let Some(expected) = prop.get("type").and_then(|t| t.as_str()) {
            let type_ok = match expected {
                "string" => value.is_string(),
                "integer" => value.is_i64() || value.is_u64(),
                "number" => value.is_number(),
                "boolean" => value.is_boolean(),
                "array" => value.is_array(),
                "object" => value.is_object(),
                _ => true,
            };
            if !type_ok {
                return Err(InvalidParams(format!(
                    "parameter '{}' must be of type '{}', got {}",
                    name,
                    expected,
                    json_type_name(value)
                )));
            }
        }

        if let (Some(min), Some(n)) = (prop.get("minimum").and_then(|m| m.as_f64()), value.as_f64())
        {
            if n < min {
                return Err(InvalidParams(format!(
                    "parameter '{}' must be at least {}, got {}",
                    name, min, value
                )));
            }
        }
    }

    Ok(Value::Object(result))
}

/// A required string parameter that must contain more than whitespace.
fn non_blank<'a>(params: &'a Value, field: &str) -> Result<&'a str, InvalidParams> {
    let text = params[field].as_str().unwrap_or("");
    if text.trim().is_empty() {
        return Err(InvalidParams(format!("{} must not be empty", field)));
    }
    Ok(text)
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Nearest-text search over the document collection.
pub struct WeaviateSearchTool;

#[async_trait]
impl Tool for WeaviateSearchTool {
    fn name(&self) -> &str {
        "weaviate_search"
    }

    fn description(&self) -> &str {
        "Search the document collection by meaning. Returns the configured fields of the best matches."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query_text": {
                    "type": "string",
                    "description": "Free-text query"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of results",
                    "minimum": 1,
                    "default": DEFAULT_SEARCH_LIMIT
                }
            },
            "required": ["query_text"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let query = non_blank(&params, "query_text")?;
        let limit = params["limit"].as_u64().unwrap_or(DEFAULT_SEARCH_LIMIT as u64) as usize;

        let weaviate = &ctx.config().weaviate;
        let rows = retrieve::search(ctx.store(), weaviate, query, limit, &weaviate.fields).await?;
        Ok(Value::Array(rows.into_iter().map(Value::Object).collect()))
    }
}

/// Asks the HTTP composition layer for an evaluation report.
pub struct GenerateReportTool;

#[async_trait]
impl Tool for GenerateReportTool {
    fn name(&self) -> &str {
        "generate_evaluation_report"
    }

    fn description(&self) -> &str {
        "Generate an evaluation report PDF for a query through the report service. Failures are returned as {ok: false, error}."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Topic or instruction for the report"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let query = non_blank(&params, "query")?;
        let response = ctx.backend().generate_report(query).await;
        Ok(serde_json::to_value(response)?)
    }
}

/// Reports reachability of the store and the report service.
pub struct HealthcheckTool;

#[async_trait]
impl Tool for HealthcheckTool {
    fn name(&self) -> &str {
        "healthcheck"
    }

    fn description(&self) -> &str {
        "Check whether Weaviate and the report service are reachable."
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _params: Value, ctx: &ToolContext) -> Result<Value> {
        let report = health::check(ctx.store(), &ctx.config().weaviate, ctx.backend()).await;
        Ok(serde_json::to_value(report)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_registered_in_order() {
        let registry = ToolRegistry::with_builtins();
        let names: Vec<&str> = registry.tools().iter().map(|t| t.name()).collect();
        assert_eq!(
            names,
            ["weaviate_search", "generate_evaluation_report", "healthcheck"]
        );
        assert!(registry.find("healthcheck").is_some());
        assert!(registry.find("search").is_none());
    }

    #[test]
    fn search_limit_defaults_to_five() {
        let schema = WeaviateSearchTool.parameters_schema();
        let params = validate_params(&schema, &json!({"query_text": "readiness"})).unwrap();
        assert_eq!(params["limit"], json!(5));
    }

    #[test]
    fn missing_required_parameter() {
        let schema = GenerateReportTool.parameters_schema();
        let err = validate_params(&schema, &json!({})).unwrap_err();
        assert_eq!(err.to_string(), "missing required parameter: query");
    }

    #[test]
    fn wrong_type_is_rejected() {
        let schema = WeaviateSearchTool.parameters_schema();
        let err = validate_params(&schema, &json!({"query_text": "x", "limit": "ten"})).unwrap_err();
        assert_eq!(
            err.to_string(),
            "parameter 'limit' must be of type 'integer', got string"
        );
    }

    #[test]
    fn limit_below_minimum_is_rejected() {
        let schema = WeaviateSearchTool.parameters_schema();
        assert!(validate_params(&schema, &json!({"query_text": "x", "limit": 0})).is_err());
    }

    #[test]
    fn blank_strings_are_invalid_params() {
        let err = non_blank(&json!({"query": "  \n"}), "query").unwrap_err();
        assert_eq!(err.to_string(), "query must not be empty");
        assert!(non_blank(&json!({}), "query").is_err());
        assert_eq!(non_blank(&json!({"query": "ok"}), "query").unwrap(), "ok");
    }

    #[test]
    fn non_object_params_are_treated_as_empty() {
        let schema = HealthcheckTool.parameters_schema();
        assert_eq!(validate_params(&schema, &Value::Null).unwrap(), json!({}));
    }
}
