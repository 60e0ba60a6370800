//! Environment-driven configuration.
//!
//! Every external endpoint, field list, timeout and proxy override is read
//! from the process environment once at startup. [`load_config`] is the entry
//! point used by the `rh` binary; [`Config::from_lookup`] takes any key lookup
//! so tests can supply variables without touching the real environment.
//!
//! | Section | Variables |
//! |---------|-----------|
//! | [`WeaviateConfig`] | `WEAVIATE_URL`, `WEAVIATE_CLASS_NAME`, `WEAVIATE_TITLE_FIELD`, `WEAVIATE_CONTENT_FIELD`, `WEAVIATE_FIELDS`, `WEAVIATE_VECTORIZER`, `WEAVIATE_VECTORIZER_MODEL` |
//! | [`GenerationConfig`] | `OLLAMA_URL`, `OLLAMA_MODEL`, `OLLAMA_TIMEOUT_SECONDS`, `REPORT_PERSONA`, `RETRIEVAL_LIMIT` |
//! | [`IngestConfig`] | `DOCS_DIR`, `INGEST_EXCLUDE_GLOBS`, `INGEST_FOLLOW_SYMLINKS`, `INGEST_MAX_FILE_BYTES` |
//! | [`ReportConfig`] | `REPORT_OUTPUT_PATH` |
//! | [`ServerConfig`] | `BIND_ADDR` |
//! | [`BackendConfig`] | `BACKEND_URL`, `BACKEND_GENERATE_PATH`, `BACKEND_QUERY_PARAM`, `BACKEND_METHOD`, `REQUEST_TIMEOUT_SECONDS` |

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::str::FromStr;

/// Persona line placed at the top of every generation prompt.
pub const DEFAULT_PERSONA: &str =
    "You are a military supervisor and need to complete your annual evaluations on your subordinates.";

#[derive(Debug, Clone)]
pub struct Config {
    pub weaviate: WeaviateConfig,
    pub generation: GenerationConfig,
    pub ingest: IngestConfig,
    pub report: ReportConfig,
    pub server: ServerConfig,
    pub backend: BackendConfig,
}

#[derive(Debug, Clone)]
pub struct WeaviateConfig {
    pub url: String,
    pub class_name: String,
    pub title_field: String,
    pub content_field: String,
    /// Projection returned by the search tool.
    pub fields: Vec<String>,
    pub vectorizer: Option<String>,
    pub vectorizer_model: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub ollama_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub persona: String,
    /// Number of documents retrieved as prompt context.
    pub retrieval_limit: usize,
}

#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub docs_dir: PathBuf,
    pub exclude_globs: Vec<String>,
    pub follow_symlinks: bool,
    pub max_file_bytes: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub output_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub url: String,
    pub generate_path: String,
    pub query_param: String,
    pub method: BackendMethod,
    pub timeout_secs: u64,
}

/// HTTP method used to reach the report endpoint from the tool surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendMethod {
    Get,
    Post,
}

impl BackendMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendMethod::Get => "GET",
            BackendMethod::Post => "POST",
        }
    }
}

impl FromStr for BackendMethod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(BackendMethod::Get),
            "POST" => Ok(BackendMethod::Post),
            other => bail!("Unsupported BACKEND_METHOD: {}. Must be GET or POST.", other),
        }
    }
}

impl Config {
    /// Builds a config from an arbitrary variable lookup, applying defaults
    /// and validating the result.
    pub fn from_lookup<F>(lookup: F) -> Result<Config>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| -> String {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        let opt = |key: &str| -> Option<String> {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let title_field = var("WEAVIATE_TITLE_FIELD", "title");
        let content_field = var("WEAVIATE_CONTENT_FIELD", "content");
        let default_fields = format!("{},{}", title_field, content_field);

        let config = Config {
            weaviate: WeaviateConfig {
                url: var("WEAVIATE_URL", "http://weaviate:8080"),
                class_name: var("WEAVIATE_CLASS_NAME", "Eval"),
                fields: split_list(&var("WEAVIATE_FIELDS", &default_fields)),
                title_field,
                content_field,
                vectorizer: opt("WEAVIATE_VECTORIZER"),
                vectorizer_model: opt("WEAVIATE_VECTORIZER_MODEL"),
            },
            generation: GenerationConfig {
                ollama_url: var("OLLAMA_URL", "http://ollama:11434"),
                model: var("OLLAMA_MODEL", "mistral"),
                timeout_secs: parse_var(&var("OLLAMA_TIMEOUT_SECONDS", "300"), "OLLAMA_TIMEOUT_SECONDS")?,
                persona: var("REPORT_PERSONA", DEFAULT_PERSONA),
                retrieval_limit: parse_var(&var("RETRIEVAL_LIMIT", "10"), "RETRIEVAL_LIMIT")?,
            },
            ingest: IngestConfig {
                docs_dir: PathBuf::from(var("DOCS_DIR", "/app/docs")),
                exclude_globs: opt("INGEST_EXCLUDE_GLOBS")
                    .map(|v| split_list(&v))
                    .unwrap_or_default(),
                follow_symlinks: parse_bool(&var("INGEST_FOLLOW_SYMLINKS", "false"))
                    .with_context(|| "Invalid INGEST_FOLLOW_SYMLINKS")?,
                max_file_bytes: opt("INGEST_MAX_FILE_BYTES")
                    .map(|v| parse_var(&v, "INGEST_MAX_FILE_BYTES"))
                    .transpose()?,
            },
            report: ReportConfig {
                output_path: PathBuf::from(var("REPORT_OUTPUT_PATH", "/app/generated_document.pdf")),
            },
            server: ServerConfig {
                bind: var("BIND_ADDR", "0.0.0.0:8000"),
            },
            backend: BackendConfig {
                url: var("BACKEND_URL", "http://app:8000"),
                generate_path: var("BACKEND_GENERATE_PATH", "/generate-pdf"),
                query_param: var("BACKEND_QUERY_PARAM", "query"),
                method: var("BACKEND_METHOD", "GET").parse()?,
                timeout_secs: parse_var(&var("REQUEST_TIMEOUT_SECONDS", "60"), "REQUEST_TIMEOUT_SECONDS")?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let w = &self.weaviate;
        if !is_graphql_name(&w.class_name) {
            bail!("WEAVIATE_CLASS_NAME '{}' is not a valid class name", w.class_name);
        }
        if !w.class_name.starts_with(|c: char| c.is_ascii_uppercase()) {
            bail!(
                "WEAVIATE_CLASS_NAME '{}' must start with an uppercase letter",
                w.class_name
            );
        }
        for field in [&w.title_field, &w.content_field].into_iter().chain(w.fields.iter()) {
            if !is_graphql_name(field) {
                bail!("'{}' is not a valid Weaviate property name", field);
            }
        }
        if w.title_field == w.content_field {
            bail!("WEAVIATE_TITLE_FIELD and WEAVIATE_CONTENT_FIELD must differ");
        }
        if self.generation.retrieval_limit == 0 {
            bail!("RETRIEVAL_LIMIT must be >= 1");
        }
        if self.generation.timeout_secs == 0 || self.backend.timeout_secs == 0 {
            bail!("timeouts must be > 0 seconds");
        }
        if self.backend.query_param.is_empty() {
            bail!("BACKEND_QUERY_PARAM must not be empty");
        }
        Ok(())
    }

    /// Full URL of the report endpoint targeted by the tool surface.
    pub fn backend_endpoint(&self) -> String {
        let base = self.backend.url.trim_end_matches('/');
        let path = &self.backend.generate_path;
        if path.starts_with('/') {
            format!("{}{}", base, path)
        } else {
            format!("{}/{}", base, path)
        }
    }
}

/// Reads the configuration from the process environment.
///
/// A `.env` file in the working directory, when present, is loaded first
/// without overriding variables that are already set. A `.env` that exists
/// but cannot be read or parsed is logged and skipped.
pub fn load_config() -> Result<Config> {
    if let Some(e) = dotenv_problem(dotenvy::dotenv()) {
        tracing::warn!(error = %e, "ignoring unreadable .env file");
    }
    Config::from_lookup(|key| std::env::var(key).ok())
}

/// The error worth reporting from a `.env` load. A missing file is not one.
fn dotenv_problem<T>(loaded: std::result::Result<T, dotenvy::Error>) -> Option<dotenvy::Error> {
    match loaded {
        Err(e) if !e.not_found() => Some(e),
        _ => None,
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

fn parse_var<T>(value: &str, key: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse::<T>()
        .map_err(|e| anyhow::anyhow!("Invalid {} '{}': {}", key, value, e))
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("expected a boolean, got '{}'", other),
    }
}

/// GraphQL names: `[_A-Za-z][_0-9A-Za-z]*`.
pub fn is_graphql_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}
