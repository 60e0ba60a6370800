//! # Report Harness CLI (`rh`)
//!
//! All settings come from environment variables (a `.env` file in the
//! working directory is loaded first). See the `config` module for the full
//! list.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rh ingest [DIR]` | Extract every file under `DIR` and upsert it into Weaviate |
//! | `rh extract <FILE>` | Print the text extracted from one file |
//! | `rh search "<query>"` | Nearest-text search over the collection |
//! | `rh generate "<query>"` | Draft one PDF report locally |
//! | `rh health` | Check Weaviate and the report service |
//! | `rh serve api` | Start the report HTTP API |
//! | `rh serve mcp` | Start the MCP tool server (stdio, or HTTP with `--bind`) |
//! | `rh completions <shell>` | Print shell completions |
//!
//! Logs go to stderr and are controlled with `RUST_LOG`.

use std::io;
use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tracing_subscriber::EnvFilter;

use report_harness::extract::ExtractorRegistry;
use report_harness::mcp::{self, McpBridge};
use report_harness::{config, draft, health, ingest, retrieve, server};

/// Report Harness: document ingestion into Weaviate and LLM-drafted
/// evaluation reports.
#[derive(Parser)]
#[command(
    name = "rh",
    about = "Report Harness: ingest documents into Weaviate and draft evaluation reports",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest every supported file under a directory.
    ///
    /// Each file becomes one record whose identifier is derived from its file
    /// name and content, so re-running over unchanged files rewrites the same
    /// records instead of adding new ones.
    Ingest {
        /// Directory to scan. Defaults to `DOCS_DIR`.
        dir: Option<PathBuf>,

        /// Extract and compute identifiers without touching the store.
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the text extracted from a single file.
    Extract {
        file: PathBuf,
    },

    /// Nearest-text search over the document collection.
    Search {
        query: String,

        /// Maximum number of results.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Run one retrieve → generate → render cycle and write the PDF.
    Generate {
        query: String,
    },

    /// Check that Weaviate and the report service are reachable.
    Health,

    /// Start a server.
    Serve {
        #[command(subcommand)]
        service: ServeService,
    },

    /// Print shell completions.
    Completions {
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum ServeService {
    /// HTTP API with `GET`/`POST /generate-pdf` on `BIND_ADDR`.
    Api,

    /// MCP tool server.
    ///
    /// Speaks MCP over stdio unless `--bind` is given, in which case it
    /// serves Streamable HTTP at `/mcp` plus REST `/tools/*` routes.
    Mcp {
        /// Address to bind, e.g. `127.0.0.1:7331`.
        #[arg(long)]
        bind: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("report_harness=info")),
        )
        .with_writer(io::stderr)
        .init();

    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "rh", &mut io::stdout());
        return Ok(());
    }

    let cfg = config::load_config()?;

    match cli.command {
        Commands::Ingest { dir, dry_run } => {
            ingest::run_ingest(&cfg, dir, dry_run).await?;
        }
        Commands::Extract { file } => {
            let registry =
                ExtractorRegistry::with_defaults().with_max_file_bytes(cfg.ingest.max_file_bytes);
            match registry.extract_file(&file)? {
                Some(text) => println!("{}", text),
                None => anyhow::bail!("unsupported file type: {}", file.display()),
            }
        }
        Commands::Search { query, limit } => {
            retrieve::run_search(&cfg, &query, limit).await?;
        }
        Commands::Generate { query } => {
            draft::run_generate(cfg, &query).await?;
        }
        Commands::Health => {
            health::run_health(&cfg).await?;
        }
        Commands::Serve { service } => match service {
            ServeService::Api => {
                server::run_api_server(cfg).await?;
            }
            ServeService::Mcp { bind } => {
                let bridge = McpBridge::from_config(cfg)?;
                match bind {
                    Some(addr) => mcp::serve_http(bridge, &addr).await?,
                    None => mcp::serve_stdio(bridge).await?,
                }
            }
        },
        Commands::Completions { .. } => {}
    }

    Ok(())
}
