//! Dependency health report for the tool surface.

use serde::Serialize;

use crate::backend::BackendClient;
use crate::config::{Config, WeaviateConfig};
use crate::store::weaviate::WeaviateStore;
use crate::store::VectorStore;

/// Reachability of one dependency.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DependencyStatus {
    pub ok: bool,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub weaviate: DependencyStatus,
    pub backend: DependencyStatus,
}

/// Checks the store with a one-row query and the backend with `HEAD`.
///
/// Failures are captured per dependency; this never returns an error.
pub async fn check(
    store: &dyn VectorStore,
    weaviate: &WeaviateConfig,
    backend: &BackendClient,
) -> HealthReport {
    let (store_result, backend_status) = tokio::join!(
        store.ping(&weaviate.class_name, &weaviate.fields),
        backend.check_reachable()
    );

    let weaviate_status = match store_result {
        Ok(()) => DependencyStatus {
            ok: true,
            url: weaviate.url.clone(),
            status: None,
            error: None,
        },
        Err(e) => DependencyStatus {
            ok: false,
            url: weaviate.url.clone(),
            status: None,
            error: Some(e.to_string()),
        },
    };

    HealthReport {
        weaviate: weaviate_status,
        backend: backend_status,
    }
}

/// CLI entry point for `rh health`. Prints the report as JSON and fails
/// when any dependency is down.
pub async fn run_health(config: &Config) -> anyhow::Result<()> {
    let store = WeaviateStore::new(&config.weaviate.url)?;
    let backend = BackendClient::new(config)?;
    let report = check(&store, &config.weaviate, &backend).await;
    println!("{}", serde_json::to_string_pretty(&report)?);
    if !(report.weaviate.ok && report.backend.ok) {
        anyhow::bail!("one or more dependencies are unhealthy");
    }
    Ok(())
}
