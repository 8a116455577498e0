use anyhow::{Context, Result};

pub trait MarkupRenderer {
    fn name(&self) -> &str;

    /// Must be deterministic and leave placeholder tokens untouched.
    fn render(&self, markup: &str) -> Result<String>;
}

pub trait SentenceSplitter {
    fn name(&self) -> &str;

    /// Sentences must cover `text` in order without gaps or overlaps,
    /// whitespace aside.
    fn split(&self, text: &str) -> Result<Vec<String>>;
}

#[derive(Debug, Clone)]
pub struct Rendered {
    pub plain_text: String,
    pub token_text: String,
    pub sentences: Vec<String>,
}

pub fn render_document(
    renderer: &dyn MarkupRenderer,
    splitter: &dyn SentenceSplitter,
    original: &str,
    substituted: &str,
) -> Result<Rendered> {
    let plain_text = renderer
        .render(original)
        .with_context(|| format!("renderer '{}' failed on original markup", renderer.name()))?;
    let token_text = renderer.render(substituted).with_context(|| {
        format!(
            "renderer '{}' failed on token-substituted markup",
            renderer.name()
        )
    })?;
    let sentences = splitter
        .split(&plain_text)
        .with_context(|| format!("sentence splitter '{}' failed", splitter.name()))?
        .into_iter()
        .map(|sentence| sentence.trim().to_string())
        .filter(|sentence| !sentence.is_empty())
        .collect();

    Ok(Rendered {
        plain_text,
        token_text,
        sentences,
    })
}
