//! Tool surface: MCP bridge plus the REST tool routes.
//!
//! [`McpBridge`] adapts the [`ToolRegistry`] to the MCP JSON-RPC protocol.
//! `rh serve mcp` runs it over stdio; with `--bind` it is mounted as a
//! Streamable HTTP endpoint at `/mcp` next to plain JSON routes:
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/mcp` | MCP Streamable HTTP endpoint |
//! | `GET`  | `/tools/list` | List tools with parameter schemas |
//! | `POST` | `/tools/{name}` | Call a tool by name |
//! | `GET`  | `/health` | Liveness (returns version) |
//!
//! Claude Desktop / Cursor configuration for the stdio transport:
//!
//! ```json
//! {
//!   "mcpServers": {
//!     "report-harness": { "command": "rh", "args": ["serve", "mcp"] }
//!   }
//! }
//! ```

use std::borrow::Cow;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use rmcp::model::*;
use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager, StreamableHttpService,
};
use rmcp::{ErrorData as McpError, ServerHandler, ServiceExt};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::backend::BackendClient;
use crate::config::Config;
use crate::server::{bad_request, handle_health, not_found, tool_error, AppError};
use crate::store::weaviate::WeaviateStore;
use crate::tools::{validate_params, InvalidParams, ToolContext, ToolRegistry};

/// Each MCP session gets a clone; everything shared sits behind `Arc`.
#[derive(Clone)]
pub struct McpBridge {
    tools: Arc<ToolRegistry>,
    ctx: ToolContext,
}

impl McpBridge {
    pub fn new(tools: Arc<ToolRegistry>, ctx: ToolContext) -> Self {
        Self { tools, ctx }
    }

    /// Builds the bridge with the built-in tools against live Weaviate and
    /// the configured report backend.
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let store = Arc::new(WeaviateStore::new(&config.weaviate.url)?);
        let backend = Arc::new(BackendClient::new(&config)?);
        let ctx = ToolContext::new(Arc::new(config), store, backend);
        Ok(Self::new(Arc::new(ToolRegistry::with_builtins()), ctx))
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.tools
    }

    fn to_mcp_tool(tool: &dyn crate::tools::Tool) -> Tool {
        let input_schema = match tool.parameters_schema() {
            serde_json::Value::Object(map) => Arc::new(map),
            _ => Arc::new(serde_json::Map::new()),
        };
        // The report tool writes a file through the backend.
        let read_only = tool.name() != "generate_evaluation_report";

        Tool {
            name: Cow::Owned(tool.name().to_string()),
            title: None,
            description: Some(Cow::Owned(tool.description().to_string())),
            input_schema,
            output_schema: None,
            annotations: Some(ToolAnnotations::new().read_only(read_only)),
            execution: None,
            icons: None,
            meta: None,
        }
    }

    /// Validates and runs one tool. Shared by MCP `call_tool` and
    /// `POST /tools/{name}`.
    async fn invoke(
        &self,
        name: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, ToolCallError> {
        let tool = self
            .tools
            .find(name)
            .ok_or_else(|| ToolCallError::NotFound(name.to_string()))?;
        let params = validate_params(&tool.parameters_schema(), &params)
            .map_err(|e| ToolCallError::InvalidParams(e.0))?;
        tracing::debug!(tool = name, "tool call");
        tool.execute(params, &self.ctx)
            .await
            .map_err(|e| match e.downcast::<InvalidParams>() {
                Ok(invalid) => ToolCallError::InvalidParams(invalid.0),
                Err(e) => ToolCallError::Failed(e.to_string()),
            })
    }
}

enum ToolCallError {
    NotFound(String),
    InvalidParams(String),
    Failed(String),
}

impl ServerHandler for McpBridge {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "report-harness".to_string(),
                title: Some("Report Harness".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                description: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Evaluation report tools. Use weaviate_search to look up ingested documents, \
                 generate_evaluation_report to produce a PDF report for a topic, and \
                 healthcheck to see whether Weaviate and the report service are up."
                    .to_string(),
            ),
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        let tools: Vec<Tool> = self
            .tools
            .tools()
            .iter()
            .map(|t| Self::to_mcp_tool(t.as_ref()))
            .collect();
        std::future::ready(Ok(ListToolsResult::with_all_items(tools)))
    }

    fn get_tool(&self, name: &str) -> Option<Tool> {
        self.tools.find(name).map(Self::to_mcp_tool)
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let params = request
            .arguments
            .map(serde_json::Value::Object)
            .unwrap_or(serde_json::Value::Object(serde_json::Map::new()));

        match self.invoke(&request.name, params).await {
            Ok(result) => {
                let text = serde_json::to_string_pretty(&result).unwrap_or_default();
                Ok(CallToolResult::success(vec![Content::text(text)]))
            }
            Err(ToolCallError::NotFound(name)) => Err(McpError::new(
                ErrorCode::METHOD_NOT_FOUND,
                format!("no tool registered with name: {}", name),
                None,
            )),
            Err(ToolCallError::InvalidParams(msg)) => {
                Err(McpError::new(ErrorCode::INVALID_PARAMS, msg, None))
            }
            Err(ToolCallError::Failed(msg)) => {
                Ok(CallToolResult::error(vec![Content::text(msg)]))
            }
        }
    }
}

/// Serves MCP over stdin/stdout until the client disconnects.
pub async fn serve_stdio(bridge: McpBridge) -> anyhow::Result<()> {
    tracing::info!(tools = bridge.registry().len(), "MCP server on stdio");
    let service = bridge.serve(rmcp::transport::stdio()).await?;
    let reason = service.waiting().await?;
    tracing::info!(?reason, "MCP session ended");
    Ok(())
}

/// Router with `/mcp`, `/tools/list`, `/tools/{name}`, and `/health`.
pub fn router(bridge: McpBridge) -> Router {
    let factory = bridge.clone();
    let mcp = StreamableHttpService::new(
        move || Ok(factory.clone()),
        LocalSessionManager::default().into(),
        Default::default(),
    );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/tools/list", get(handle_list_tools))
        .route("/tools/{name}", post(handle_tool_call))
        .route("/health", get(handle_health))
        .with_state(bridge)
        .nest_service("/mcp", mcp)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn serve_http(bridge: McpBridge, bind: &str) -> anyhow::Result<()> {
    println!("Registered {} tools:", bridge.registry().len());
    for t in bridge.registry().tools() {
        println!("  POST /tools/{} ({})", t.name(), t.description());
    }
    println!("MCP server listening on http://{}/mcp", bind);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    axum::serve(listener, router(bridge)).await?;
    Ok(())
}

#[derive(Serialize)]
struct ToolInfo {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Serialize)]
struct ToolListResponse {
    tools: Vec<ToolInfo>,
}

async fn handle_list_tools(State(bridge): State<McpBridge>) -> Json<ToolListResponse> {
    let tools = bridge
        .registry()
        .tools()
        .iter()
        .map(|t| ToolInfo {
            name: t.name().to_string(),
            description: t.description().to_string(),
            parameters: t.parameters_schema(),
        })
        .collect();
    Json(ToolListResponse { tools })
}

/// `404` for an unknown tool, `400` for parameter errors, `500` when the
/// tool itself fails. Success wraps the value as `{"result": ...}`.
async fn handle_tool_call(
    State(bridge): State<McpBridge>,
    Path(name): Path<String>,
    Json(params): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, AppError> {
    match bridge.invoke(&name, params).await {
        Ok(result) => Ok(Json(serde_json::json!({ "result": result }))),
        Err(ToolCallError::NotFound(name)) => Err(not_found(format!(
            "no tool registered with name: {}",
            name
        ))),
        Err(ToolCallError::InvalidParams(msg)) => Err(bad_request(format!("{}: {}", name, msg))),
        Err(ToolCallError::Failed(msg)) => Err(tool_error(format!("{}: {}", name, msg))),
    }
}
