//! # Report Harness
//!
//! Turns a folder of mixed-format documents into searchable records in a
//! Weaviate collection, then drafts evaluation reports from them with a
//! local Ollama model.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────────┐
//! │  DOCS_DIR   │──▶│   Extract    │──▶│   Weaviate   │
//! │ pdf/docx/.. │   │ + UUIDv5 id  │   │  collection  │
//! └─────────────┘   └──────────────┘   └──────┬───────┘
//!                                             │ nearText
//!                    ┌────────────────────────┤
//!                    ▼                        ▼
//!             ┌──────────────┐         ┌──────────────┐
//!             │ HTTP API     │◀────────│ MCP tools    │
//!             │ Ollama + PDF │  proxy  │ search/health│
//!             └──────────────┘         └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! rh ingest ./data/docs           # extract and upsert every file
//! rh search "deployment readiness"
//! rh serve api                    # GET/POST /generate-pdf
//! rh serve mcp                    # MCP tools on stdio
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | Environment configuration |
//! | [`models`] | Records and ingestion reports |
//! | [`extract`] | Per-format text extraction |
//! | [`identity`] | Deterministic record identifiers |
//! | [`store`] | Vector store trait, Weaviate and in-memory backends |
//! | [`schema`] | Collection schema and bootstrap |
//! | [`ingest`] | Directory ingestion driver |
//! | [`retrieve`] | Nearest-text retrieval |
//! | [`generate`] | Prompt assembly and Ollama client |
//! | [`report`] | PDF rendering |
//! | [`draft`] | Retrieve → generate → render pipeline |
//! | [`server`] | HTTP composition layer |
//! | [`backend`] | Client for the HTTP layer, used by tools |
//! | [`health`] | Dependency health checks |
//! | [`tools`] | Agent-facing tools |
//! | [`mcp`] | MCP bridge and REST tool routes |

pub mod backend;
pub mod config;
pub mod draft;
pub mod extract;
pub mod generate;
pub mod health;
pub mod identity;
pub mod ingest;
pub mod mcp;
pub mod models;
pub mod report;
pub mod retrieve;
pub mod schema;
pub mod server;
pub mod store;
pub mod tools;
