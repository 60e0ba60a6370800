//! Core data models shared by the ingestion and report pipelines.

use serde::Serialize;
use std::path::PathBuf;
use uuid::Uuid;

/// A retrieval result row: requested field name → stored value.
pub type FieldMap = serde_json::Map<String, serde_json::Value>;

/// A document ready to be written to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentRecord {
    /// Deterministic identifier, see [`crate::identity::document_id`].
    pub id: Uuid,
    /// File name shown to users (no directory component).
    pub display_name: String,
    /// Extracted plain text.
    pub content: String,
}

impl DocumentRecord {
    /// Builds the record for a file name and its extracted text.
    pub fn new(display_name: impl Into<String>, content: impl Into<String>) -> Self {
        let display_name = display_name.into();
        let content = content.into();
        Self {
            id: crate::identity::document_id(&display_name, &content),
            display_name,
            content,
        }
    }

    /// Store properties keyed by the configured title and content fields.
    pub fn properties(&self, title_field: &str, content_field: &str) -> FieldMap {
        let mut props = FieldMap::new();
        props.insert(
            title_field.to_string(),
            serde_json::Value::String(self.display_name.clone()),
        );
        props.insert(
            content_field.to_string(),
            serde_json::Value::String(self.content.clone()),
        );
        props
    }
}

/// What happened to one file during an ingestion run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum FileOutcome {
    /// Written to the store for the first time.
    Created { id: Uuid },
    /// An object with the same identity already existed and was overwritten.
    Replaced { id: Uuid },
    /// Extracted and identified but not written (dry run).
    Planned { id: Uuid },
    /// No handler for the file's suffix.
    Unsupported,
    /// Handler produced no text, failed, or the file exceeded the size cap.
    Empty,
    /// The store rejected the write.
    Failed { error: String },
}

/// Per-file record in an [`IngestReport`].
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    #[serde(flatten)]
    pub outcome: FileOutcome,
}

/// Summary of one ingestion run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub collection_created: bool,
    pub ingested: u64,
    pub skipped_unsupported: u64,
    pub skipped_empty: u64,
    pub failed: u64,
    pub files: Vec<FileReport>,
}

impl IngestReport {
    pub fn record(&mut self, path: PathBuf, outcome: FileOutcome) {
        match &outcome {
            FileOutcome::Created { .. } | FileOutcome::Replaced { .. } | FileOutcome::Planned { .. } => {
                self.ingested += 1
            }
            FileOutcome::Unsupported => self.skipped_unsupported += 1,
            FileOutcome::Empty => self.skipped_empty += 1,
            FileOutcome::Failed { .. } => self.failed += 1,
        }
        self.files.push(FileReport { path, outcome });
    }
}
