use serde::Serialize;

use crate::engine::DocumentStats;

#[derive(Debug, Clone, Serialize)]
pub struct CitationRecord {
    pub token: String,
    pub id: String,
    pub kind: String,
    pub urls: Vec<String>,
    pub markup_start: usize,
    pub markup_end: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SentenceRecord {
    pub index: usize,
    pub text: String,
    pub tokens: Vec<String>,
    pub urls: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineSettings {
    pub language: String,
    pub references_headings: Vec<String>,
    pub include_archive_urls: bool,
    pub renderer: String,
    pub splitter: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentManifest {
    pub manifest_version: u32,
    pub generated_at: String,
    pub source: String,
    pub input_sha256: String,
    pub settings: PipelineSettings,
    pub stats: DocumentStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchDocumentEntry {
    pub source: String,
    pub output: Option<String>,
    pub input_sha256: Option<String>,
    pub status: String,
    pub error: Option<String>,
    pub stats: Option<DocumentStats>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchCounts {
    pub documents: usize,
    pub succeeded: usize,
    pub alignment_failures: usize,
    pub other_failures: usize,
    pub sentences: usize,
    pub sentences_with_urls: usize,
    pub urls_emitted: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub started_at: String,
    pub completed_at: String,
    pub input_dir: String,
    pub output_dir: String,
    pub settings: PipelineSettings,
    pub counts: BatchCounts,
    pub documents: Vec<BatchDocumentEntry>,
}
