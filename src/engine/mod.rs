use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info, warn};

mod align;
mod citations;
mod external;
mod normalize;
mod output;
mod plain_text;
mod render;
mod resolve;
mod sentences;
#[cfg(test)]
mod tests;

pub use align::{AlignmentError, align_tokens};
pub use citations::{CitationExtractor, CitationKind, CitationMap, ExtractOptions};
pub use external::{CommandRenderer, CommandSplitter};
pub use normalize::{ReferenceHeadings, normalize_markup};
pub use output::{SentenceCitations, write_records};
pub use plain_text::WikiTextRenderer;
pub use render::{MarkupRenderer, SentenceSplitter, render_document};
pub use resolve::resolve_urls;
pub use sentences::RuleSentenceSplitter;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub headings: ReferenceHeadings,
    pub extract: ExtractOptions,
}

impl PipelineConfig {
    pub fn for_language(language: &str) -> Self {
        Self {
            headings: ReferenceHeadings::for_language(language),
            extract: ExtractOptions::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DocumentStats {
    pub tabs_removed: usize,
    pub truncated_at_heading: Option<String>,
    pub footnotes: usize,
    pub anonymous_footnotes: usize,
    pub defined_footnotes: usize,
    pub reference_footnotes: usize,
    pub unresolved_footnotes: usize,
    pub malformed_footnotes: usize,
    pub sentences: usize,
    pub sentences_with_urls: usize,
    pub tokens_aligned: usize,
    pub trailing_tokens: usize,
    pub dropped_tokens: usize,
    pub lost_tokens: usize,
    pub unmatched_trailing_chars: usize,
    pub unknown_tokens: usize,
    pub urls_emitted: usize,
}

#[derive(Debug, Clone)]
pub struct DocumentResult {
    pub normalized: String,
    pub substituted: String,
    pub citations: CitationMap,
    pub plain_text: String,
    pub token_text: String,
    pub sentences: Vec<String>,
    pub token_lists: Vec<Vec<String>>,
    pub url_lists: Vec<Vec<String>>,
    pub stats: DocumentStats,
}

impl DocumentResult {
    pub fn records(&self) -> Vec<SentenceCitations> {
        self.sentences
            .iter()
            .zip(&self.url_lists)
            .map(|(sentence, urls)| SentenceCitations {
                sentence: sentence.clone(),
                urls: urls.clone(),
            })
            .collect()
    }
}

/// Per-document pipeline. Holds only compiled patterns and configuration, so
/// one instance can be reused for any number of documents.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    extractor: CitationExtractor,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let extractor = CitationExtractor::new(config.extract.clone())?;
        Ok(Self { config, extractor })
    }

    pub fn process_document(
        &self,
        raw: &str,
        renderer: &dyn MarkupRenderer,
        splitter: &dyn SentenceSplitter,
    ) -> Result<DocumentResult> {
        let normalized = normalize_markup(raw, &self.config.headings);
        debug!(
            tabs_removed = normalized.tabs_removed,
            truncated_at = %normalized.truncated_at.clone().unwrap_or_default(),
            bytes = normalized.text.len(),
            "normalized markup"
        );

        let extraction = self.extractor.extract(&normalized.text);
        if extraction.map.is_empty() {
            debug!("no footnotes found");
        } else {
            debug!(footnotes = extraction.map.len(), "extracted citations");
        }

        let rendered = render_document(
            renderer,
            splitter,
            &normalized.text,
            &extraction.substituted,
        )?;
        debug!(
            sentences = rendered.sentences.len(),
            plain_chars = rendered.plain_text.len(),
            token_chars = rendered.token_text.len(),
            "rendered markup"
        );

        let alignment = align_tokens(&rendered.sentences, &rendered.token_text)?;
        if alignment.token_lists.len() != rendered.sentences.len() {
            return Err(AlignmentError::CountMismatch {
                sentences: rendered.sentences.len(),
                token_lists: alignment.token_lists.len(),
            }
            .into());
        }
        if alignment.dropped_tokens > 0 {
            warn!(
                tokens = alignment.dropped_tokens,
                "document has citations but no sentences; tokens dropped"
            );
        }
        if alignment.unmatched_trailing_chars > 0 {
            warn!(
                chars = alignment.unmatched_trailing_chars,
                "rendering has text after the last sentence"
            );
        }

        let lost_tokens = extraction
            .map
            .len()
            .saturating_sub(alignment.token_count() + alignment.dropped_tokens);
        if lost_tokens > 0 {
            warn!(
                tokens = lost_tokens,
                renderer = renderer.name(),
                "renderer dropped citation tokens"
            );
        }

        let resolution = resolve_urls(&alignment.token_lists, &extraction.map);

        let stats = DocumentStats {
            tabs_removed: normalized.tabs_removed,
            truncated_at_heading: normalized.truncated_at.clone(),
            footnotes: extraction.map.len(),
            anonymous_footnotes: extraction.map.count_kind(CitationKind::Anonymous),
            defined_footnotes: extraction.map.count_kind(CitationKind::Defined),
            reference_footnotes: extraction.map.count_kind(CitationKind::Reference),
            unresolved_footnotes: extraction.map.count_kind(CitationKind::Unresolved),
            malformed_footnotes: extraction.map.count_kind(CitationKind::Malformed),
            sentences: rendered.sentences.len(),
            sentences_with_urls: resolution
                .url_lists
                .iter()
                .filter(|urls| !urls.is_empty())
                .count(),
            tokens_aligned: alignment.token_count(),
            trailing_tokens: alignment.trailing_tokens,
            dropped_tokens: alignment.dropped_tokens,
            lost_tokens,
            unmatched_trailing_chars: alignment.unmatched_trailing_chars,
            unknown_tokens: resolution.unknown_tokens.len(),
            urls_emitted: resolution.url_lists.iter().map(Vec::len).sum(),
        };

        info!(
            sentences = stats.sentences,
            footnotes = stats.footnotes,
            sentences_with_urls = stats.sentences_with_urls,
            urls = stats.urls_emitted,
            "document processed"
        );

        Ok(DocumentResult {
            normalized: normalized.text,
            substituted: extraction.substituted,
            citations: extraction.map,
            plain_text: rendered.plain_text,
            token_text: rendered.token_text,
            sentences: rendered.sentences,
            token_lists: alignment.token_lists,
            url_lists: resolution.url_lists,
            stats,
        })
    }
}
