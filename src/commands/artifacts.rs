use std::path::Path;

use anyhow::Result;
use tracing::info;

use crate::engine::DocumentResult;
use crate::model::{CitationRecord, DocumentManifest, PipelineSettings, SentenceRecord};
use crate::util::{now_utc_string, write_json_pretty, write_text};

pub fn write_document_artifacts(
    dir: &Path,
    source: &str,
    input_sha256: &str,
    settings: &PipelineSettings,
    document: &DocumentResult,
) -> Result<()> {
    let citations = document
        .citations
        .entries()
        .iter()
        .map(|entry| CitationRecord {
            token: entry.token.clone(),
            id: entry.id.to_string(),
            kind: entry.kind.as_str().to_string(),
            urls: entry.urls.clone(),
            markup_start: entry.span.start,
            markup_end: entry.span.end,
        })
        .collect::<Vec<_>>();

    let sentences = document
        .sentences
        .iter()
        .zip(&document.token_lists)
        .zip(&document.url_lists)
        .enumerate()
        .map(|(index, ((text, tokens), urls))| SentenceRecord {
            index,
            text: text.clone(),
            tokens: tokens.clone(),
            urls: urls.clone(),
        })
        .collect::<Vec<_>>();

    write_json_pretty(&dir.join("citations.json"), &citations)?;
    write_json_pretty(&dir.join("sentences.json"), &sentences)?;
    write_text(&dir.join("markup.original.wiki"), &document.normalized)?;
    write_text(&dir.join("markup.substituted.wiki"), &document.substituted)?;
    write_text(&dir.join("plain.original.txt"), &document.plain_text)?;
    write_text(&dir.join("plain.tokens.txt"), &document.token_text)?;

    let manifest = DocumentManifest {
        manifest_version: 1,
        generated_at: now_utc_string(),
        source: source.to_string(),
        input_sha256: input_sha256.to_string(),
        settings: settings.clone(),
        stats: document.stats.clone(),
    };
    write_json_pretty(&dir.join("document_manifest.json"), &manifest)?;

    info!(path = %dir.display(), citations = citations.len(), "wrote diagnostics artifacts");
    Ok(())
}
