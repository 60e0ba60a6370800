//! HTTP composition layer.
//!
//! Exposes one retrieve → generate → render cycle per request.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/generate-pdf?query=...` | Draft a report for `query` |
//! | `POST` | `/generate-pdf` | Same, with body `{"query": "..."}` |
//! | `GET`  | `/health` | Liveness (returns version) |
//!
//! # Responses
//!
//! ```json
//! { "message": "PDF generated successfully", "file_path": "/app/data/report.pdf" }
//! { "error": "No relevant documents found." }
//! ```
//!
//! Failures use a structured body:
//!
//! ```json
//! { "error": { "code": "store_error", "message": "...", "details": { "raw": "..." } } }
//! ```
//!
//! Codes: `bad_request` (400), `not_found` (404), `store_error` (500),
//! `generation_error` (502), `report_error` (500), `tool_error` (500).

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::draft::{DraftError, DraftOutcome, ReportPipeline};
use crate::generate::{GenerateError, OllamaClient};
use crate::store::weaviate::WeaviateStore;

pub const NO_DOCUMENTS: &str = "No relevant documents found.";
pub const GENERATED: &str = "PDF generated successfully";

/// Starts the report API on `BIND_ADDR` and runs until the process exits.
pub async fn run_api_server(config: Config) -> anyhow::Result<()> {
    let bind = config.server.bind.clone();
    let store = Arc::new(WeaviateStore::new(&config.weaviate.url)?);
    let generator = Arc::new(OllamaClient::new(&config.generation)?);
    tracing::info!(
        weaviate = %config.weaviate.url,
        ollama = %config.generation.ollama_url,
        model = %generator.model(),
        "report API configured"
    );
    let pipeline = ReportPipeline::new(store, generator, Arc::new(config));

    println!("Report API listening on http://{}", bind);
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    axum::serve(listener, router(pipeline)).await?;
    Ok(())
}

pub fn router(pipeline: ReportPipeline) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            "/generate-pdf",
            get(handle_generate_get).post(handle_generate_post),
        )
        .route("/health", get(handle_health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(pipeline)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

/// Error type that converts into an Axum response.
pub struct AppError {
    status: StatusCode,
    code: String,
    message: String,
    details: Option<Value>,
}

impl AppError {
    fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
                details: self.details,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

pub fn bad_request(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::BAD_REQUEST, "bad_request", message)
}

pub fn not_found(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::NOT_FOUND, "not_found", message)
}

pub fn tool_error(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "tool_error", message)
}

impl From<DraftError> for AppError {
    fn from(err: DraftError) -> Self {
        let message = err.to_string();
        match err {
            DraftError::Store(e) => {
                let app = AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "store_error", message);
                match e.raw_payload() {
                    Some(raw) => app.with_details(json!({ "raw": raw })),
                    None => app,
                }
            }
            DraftError::Generate(GenerateError::Http { status, body }) => {
                AppError::new(StatusCode::BAD_GATEWAY, "generation_error", message)
                    .with_details(json!({ "status": status, "body": body }))
            }
            DraftError::Generate(GenerateError::MalformedResponse { body, .. }) => {
                AppError::new(StatusCode::BAD_GATEWAY, "generation_error", message)
                    .with_details(json!({ "body": body }))
            }
            DraftError::Generate(GenerateError::Transport { .. }) => {
                AppError::new(StatusCode::BAD_GATEWAY, "generation_error", message)
            }
            DraftError::Report(_) | DraftError::Task(_) => {
                AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "report_error", message)
            }
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    version: String,
}

pub async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ /generate-pdf ============

#[derive(Debug, Default, Deserialize)]
pub struct ReportRequest {
    #[serde(default)]
    query: Option<String>,
}

async fn handle_generate_get(
    State(pipeline): State<ReportPipeline>,
    Query(request): Query<ReportRequest>,
) -> Result<Json<Value>, AppError> {
    generate(&pipeline, request).await
}

async fn handle_generate_post(
    State(pipeline): State<ReportPipeline>,
    Json(request): Json<ReportRequest>,
) -> Result<Json<Value>, AppError> {
    generate(&pipeline, request).await
}

async fn generate(pipeline: &ReportPipeline, request: ReportRequest) -> Result<Json<Value>, AppError> {
    let query = request
        .query
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| bad_request("query must not be empty"))?;

    match pipeline.draft(&query).await {
        Ok(DraftOutcome::NoDocuments) => Ok(Json(json!({ "error": NO_DOCUMENTS }))),
        Ok(DraftOutcome::Rendered {
            file_path,
            documents,
        }) => {
            tracing::info!(query = %query, documents, file = %file_path.display(), "report generated");
            Ok(Json(json!({
                "message": GENERATED,
                "file_path": file_path.to_string_lossy(),
            })))
        }
        Err(e) => {
            tracing::warn!(query = %query, error = %e, "report generation failed");
            Err(e.into())
        }
    }
}
