//! One retrieve → generate → render cycle.
//!
//! [`ReportPipeline`] is shared by the HTTP surface and the `rh generate`
//! command. It holds injected handles only; every call is independent.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::config::Config;
use crate::generate::{build_prompt, GenerateError, TextGenerator};
use crate::report::{render_pdf, ReportError};
use crate::retrieve::retrieve_contents;
use crate::store::{StoreError, VectorStore};

#[derive(Debug, Error)]
pub enum DraftError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Generate(#[from] GenerateError),
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error("report task failed: {0}")]
    Task(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DraftOutcome {
    /// Retrieval returned nothing; no generation was attempted.
    NoDocuments,
    /// The report was written to `file_path`.
    Rendered { file_path: PathBuf, documents: usize },
}

#[derive(Clone)]
pub struct ReportPipeline {
    store: Arc<dyn VectorStore>,
    generator: Arc<dyn TextGenerator>,
    config: Arc<Config>,
}

impl ReportPipeline {
    pub fn new(
        store: Arc<dyn VectorStore>,
        generator: Arc<dyn TextGenerator>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            store,
            generator,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    pub async fn draft(&self, query: &str) -> Result<DraftOutcome, DraftError> {
        let cfg = &self.config;
        let contexts = retrieve_contents(
            self.store.as_ref(),
            &cfg.weaviate,
            query,
            cfg.generation.retrieval_limit,
        )
        .await?;

        if contexts.is_empty() {
            tracing::info!(query, "no relevant documents");
            return Ok(DraftOutcome::NoDocuments);
        }

        let prompt = build_prompt(&cfg.generation.persona, &contexts, query);
        let text = self.generator.generate(&prompt).await?;

        let path = cfg.report.output_path.clone();
        let file_path = tokio::task::spawn_blocking(move || render_pdf(&text, &path))
            .await
            .map_err(|e| DraftError::Task(e.to_string()))??;

        Ok(DraftOutcome::Rendered {
            file_path,
            documents: contexts.len(),
        })
    }
}

/// CLI entry point for `rh generate`.
pub async fn run_generate(config: Config, query: &str) -> anyhow::Result<()> {
    let store = Arc::new(crate::store::weaviate::WeaviateStore::new(&config.weaviate.url)?);
    let generator = Arc::new(crate::generate::OllamaClient::new(&config.generation)?);
    let pipeline = ReportPipeline::new(store, generator, Arc::new(config));

    match pipeline.draft(query).await? {
        DraftOutcome::NoDocuments => println!("No relevant documents found."),
        DraftOutcome::Rendered {
            file_path,
            documents,
        } => {
            println!("PDF generated successfully");
            println!("  context documents: {}", documents);
            println!("  file: {}", file_path.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ensure_collection, CollectionSchema};
    use crate::store::memory::InMemoryStore;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TextGenerator for Recorder {
        async fn generate(&self, prompt: &str) -> Result<String, GenerateError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok("Evaluation draft".to_string())
        }
    }

    fn config(dir: &std::path::Path) -> Config {
        let out = dir.join("report.pdf").to_string_lossy().into_owned();
        Config::from_lookup(move |key| (key == "REPORT_OUTPUT_PATH").then(|| out.clone())).unwrap()
    }

    #[tokio::test]
    async fn empty_collection_skips_generation() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let store = Arc::new(InMemoryStore::new());
        ensure_collection(store.as_ref(), &CollectionSchema::documents(&cfg.weaviate))
            .await
            .unwrap();
        let generator = Arc::new(Recorder::default());
        let pipeline = ReportPipeline::new(store, generator.clone(), Arc::new(cfg));

        assert_eq!(pipeline.draft("anything").await.unwrap(), DraftOutcome::NoDocuments);
        assert!(generator.prompts.lock().unwrap().is_empty());
        assert!(!dir.path().join("report.pdf").exists());
    }

    #[tokio::test]
    async fn missing_collection_is_a_store_error() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = ReportPipeline::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(Recorder::default()),
            Arc::new(config(dir.path())),
        );
        let err = pipeline.draft("anything").await.unwrap_err();
        assert!(matches!(err, DraftError::Store(StoreError::Query { .. })));
    }
}
