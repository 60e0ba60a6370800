//! HTTP client for the report endpoint, as seen from the tool surface.
//!
//! The tool surface does not run the pipeline itself; it calls the HTTP
//! composition layer (`BACKEND_URL` + `BACKEND_GENERATE_PATH`) and normalizes
//! whatever comes back into a [`ProxyResponse`]. Every request uses the
//! `REQUEST_TIMEOUT_SECONDS` timeout.

use std::time::Duration;

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;

use crate::config::{BackendMethod, Config};
use crate::health::DependencyStatus;

/// Normalized result of a proxied report request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProxyResponse {
    pub ok: bool,
    pub endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_param: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProxyResponse {
    fn failed(endpoint: &str, error: String) -> Self {
        Self {
            ok: false,
            endpoint: endpoint.to_string(),
            method: None,
            request_param: None,
            response: None,
            error: Some(error),
        }
    }
}

pub struct BackendClient {
    base_url: String,
    endpoint: String,
    method: BackendMethod,
    query_param: String,
    client: reqwest::Client,
}

impl BackendClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.backend.timeout_secs))
            .build()?;
        Ok(Self {
            base_url: config.backend.url.trim_end_matches('/').to_string(),
            endpoint: config.backend_endpoint(),
            method: config.backend.method,
            query_param: config.backend.query_param.clone(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Requests a report for `query`. Never fails: errors are folded into
    /// `{ok: false, error, endpoint}`.
    pub async fn generate_report(&self, query: &str) -> ProxyResponse {
        match self.call(query).await {
            Ok(response) => ProxyResponse {
                ok: true,
                endpoint: self.endpoint.clone(),
                method: Some(self.method.as_str().to_string()),
                request_param: Some(self.query_param.clone()),
                response: Some(response),
                error: None,
            },
            Err(error) => {
                tracing::warn!(endpoint = %self.endpoint, %error, "report request failed");
                ProxyResponse::failed(&self.endpoint, error)
            }
        }
    }

    async fn call(&self, query: &str) -> Result<Value, String> {
        let request = match self.method {
            BackendMethod::Get => self
                .client
                .get(&self.endpoint)
                .query(&[(self.query_param.as_str(), query)]),
            BackendMethod::Post => {
                let mut body = serde_json::Map::new();
                body.insert(self.query_param.clone(), Value::String(query.to_string()));
                self.client.post(&self.endpoint).json(&body)
            }
        };

        let response = request.send().await.map_err(|e| e.to_string())?;
        let status = response.status();
        let is_json = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/json"));
        let body = response.text().await.map_err(|e| e.to_string())?;

        if !status.is_success() {
            return Err(format!("HTTP {}: {}", status.as_u16(), body));
        }
        if is_json {
            serde_json::from_str(&body).map_err(|e| format!("invalid JSON from backend: {}", e))
        } else {
            Ok(serde_json::json!({ "raw": body }))
        }
    }

    /// `HEAD` on the backend base URL. Any status below 500 counts as up.
    pub async fn check_reachable(&self) -> DependencyStatus {
        match self.client.head(&self.base_url).send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                DependencyStatus {
                    ok: status < 500,
                    url: self.base_url.clone(),
                    status: Some(status),
                    error: None,
                }
            }
            Err(e) => DependencyStatus {
                ok: false,
                url: self.base_url.clone(),
                status: None,
                error: Some(e.to_string()),
            },
        }
    }
}
