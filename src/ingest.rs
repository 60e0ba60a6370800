//! Ingestion driver.
//!
//! Walks a document tree, extracts each supported file, derives its
//! deterministic identity and upserts `{title, content}` into the configured
//! collection. Failures are isolated per file: an unreadable document or a
//! rejected write is recorded in the [`IngestReport`] and the walk continues.
//! Only a missing root or a failing schema step aborts the run.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::config::{Config, IngestConfig};
use crate::extract::ExtractorRegistry;
use crate::models::{DocumentRecord, FileOutcome, IngestReport};
use crate::schema::{ensure_collection, CollectionSchema};
use crate::store::weaviate::WeaviateStore;
use crate::store::{UpsertOutcome, VectorStore};

/// Excluded regardless of configuration.
const DEFAULT_EXCLUDES: &[&str] = &["**/.git/**", "**/node_modules/**", "**/target/**"];

/// Regular files under `root`, excludes applied, sorted by relative path.
pub fn scan_tree(root: &Path, cfg: &IngestConfig) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        bail!("Document root does not exist: {}", root.display());
    }

    let mut patterns: Vec<String> = DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect();
    patterns.extend(cfg.exclude_globs.iter().cloned());
    let exclude_set = build_globset(&patterns)?;

    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(cfg.follow_symlinks) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable directory entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        if exclude_set.is_match(relative) {
            continue;
        }
        files.push(path.to_path_buf());
    }

    files.sort();
    Ok(files)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("Invalid exclude glob '{}'", pattern))?);
    }
    Ok(builder.build()?)
}

/// Ingests every supported file under `root` into the configured collection.
///
/// With `dry_run`, files are extracted and identified but neither the schema
/// nor any object is written.
pub async fn ingest(
    store: &dyn VectorStore,
    extractors: &ExtractorRegistry,
    config: &Config,
    root: &Path,
    dry_run: bool,
) -> Result<IngestReport> {
    let files = scan_tree(root, &config.ingest)?;
    let weaviate = &config.weaviate;
    let mut report = IngestReport::default();

    if !dry_run {
        let schema = CollectionSchema::documents(weaviate);
        report.collection_created = ensure_collection(store, &schema)
            .await
            .with_context(|| format!("Failed to ensure collection '{}'", schema.name))?;
    }

    for path in files {
        let outcome = ingest_file(store, extractors, config, &path, dry_run).await;
        report.record(path, outcome);
    }

    tracing::info!(
        ingested = report.ingested,
        unsupported = report.skipped_unsupported,
        empty = report.skipped_empty,
        failed = report.failed,
        "ingestion finished"
    );
    Ok(report)
}

async fn ingest_file(
    store: &dyn VectorStore,
    extractors: &ExtractorRegistry,
    config: &Config,
    path: &Path,
    dry_run: bool,
) -> FileOutcome {
    if !extractors.supports(path) {
        tracing::info!(path = %path.display(), "skipping unsupported file");
        return FileOutcome::Unsupported;
    }

    // Blocking parsers and converter processes stay off the async workers.
    let text = {
        let extractors = extractors.clone();
        let owned = path.to_path_buf();
        match tokio::task::spawn_blocking(move || extractors.extract(&owned)).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "extraction task failed");
                None
            }
        }
    };
    let Some(text) = text else {
        tracing::info!(path = %path.display(), "skipping unreadable or empty file");
        return FileOutcome::Empty;
    };

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let record = DocumentRecord::new(name, text);

    if dry_run {
        return FileOutcome::Planned { id: record.id };
    }

    let weaviate = &config.weaviate;
    let properties = record.properties(&weaviate.title_field, &weaviate.content_field);
    match store.upsert(&weaviate.class_name, record.id, &properties).await {
        Ok(UpsertOutcome::Created) => {
            tracing::info!(file = %record.display_name, id = %record.id, "ingested");
            FileOutcome::Created { id: record.id }
        }
        Ok(UpsertOutcome::Replaced) => {
            tracing::info!(file = %record.display_name, id = %record.id, "re-ingested");
            FileOutcome::Replaced { id: record.id }
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "store write failed");
            FileOutcome::Failed {
                error: e.to_string(),
            }
        }
    }
}

/// CLI entry point: ingests `root` (or `DOCS_DIR`) into Weaviate and prints a summary.
pub async fn run_ingest(config: &Config, root: Option<PathBuf>, dry_run: bool) -> Result<()> {
    let root = root.unwrap_or_else(|| config.ingest.docs_dir.clone());
    let store: Arc<dyn VectorStore> = Arc::new(WeaviateStore::new(&config.weaviate.url)?);
    let extractors = ExtractorRegistry::with_defaults().with_max_file_bytes(config.ingest.max_file_bytes);

    let report = ingest(store.as_ref(), &extractors, config, &root, dry_run).await?;

    if dry_run {
        println!("ingest {} (dry-run)", root.display());
    } else {
        println!("ingest {}", root.display());
        if report.collection_created {
            println!("  created class: {}", config.weaviate.class_name);
        }
    }
    for file in &report.files {
        match &file.outcome {
            FileOutcome::Created { id } | FileOutcome::Replaced { id } | FileOutcome::Planned { id } => {
                println!("  + {} ({})", file.path.display(), id)
            }
            FileOutcome::Failed { error } => println!("  ! {}: {}", file.path.display(), error),
            FileOutcome::Unsupported | FileOutcome::Empty => {}
        }
    }
    println!("  ingested: {}", report.ingested);
    println!("  skipped (unsupported): {}", report.skipped_unsupported);
    println!("  skipped (empty/unreadable): {}", report.skipped_empty);
    println!("  failed: {}", report.failed);
    println!("ok");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ingest_config(excludes: &[&str]) -> IngestConfig {
        IngestConfig {
            docs_dir: PathBuf::from("."),
            exclude_globs: excludes.iter().map(|s| s.to_string()).collect(),
            follow_symlinks: false,
            max_file_bytes: None,
        }
    }

    #[test]
    fn scan_is_sorted_and_excludes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("b/.git")).unwrap();
        std::fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        std::fs::write(root.join("z.txt"), "z").unwrap();
        std::fs::write(root.join("a.md"), "a").unwrap();
        std::fs::write(root.join("b/c.csv"), "c").unwrap();
        std::fs::write(root.join("b/.git/HEAD"), "ref").unwrap();
        std::fs::write(root.join("node_modules/pkg/readme.md"), "x").unwrap();

        let files = scan_tree(root, &ingest_config(&[])).unwrap();
        let rel: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(rel, vec!["a.md", "b/c.csv", "z.txt"]);
    }

    #[test]
    fn configured_excludes_apply() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("keep.txt"), "k").unwrap();
        std::fs::write(dir.path().join("drop.log"), "d").unwrap();
        let files = scan_tree(dir.path(), &ingest_config(&["*.log"])).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("keep.txt"));
    }

    #[test]
    fn missing_root_is_an_error() {
        let err = scan_tree(Path::new("/definitely/not/here"), &ingest_config(&[])).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
