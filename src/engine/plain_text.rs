use anyhow::{Context, Result};
use regex::{Captures, Regex};

use super::citations::{FootnoteScanner, TOKEN_PREFIX, TOKEN_SUFFIX};
use super::normalize::heading_title;
use super::render::MarkupRenderer;

/// Stands in for a deleted footnote until the last pass, so markup with
/// footnotes and markup with tokens go through the same transformations.
const FOOTNOTE_PLACEHOLDER: char = '\u{E000}';

const DROPPED_BLOCK_TAGS: &[&str] = &[
    "gallery",
    "math",
    "chem",
    "ce",
    "score",
    "timeline",
    "graph",
    "imagemap",
    "mapframe",
    "maplink",
    "templatedata",
    "syntaxhighlight",
    "source",
];

const DROPPED_LINK_NAMESPACES: &[&str] = &["file", "image", "category", "media"];

/// Deterministic wiki-markup to plain-text conversion. Citation tokens pass
/// through untouched, including tokens inside templates, tables, captions and
/// headings, which are kept in place of the construct that held them.
#[derive(Debug, Clone)]
pub struct WikiTextRenderer {
    footnotes: FootnoteScanner,
    marker: Regex,
    comment: Regex,
    reference_list: Regex,
    dropped_blocks: Vec<Regex>,
    external_link: Regex,
    line_break: Regex,
    html_tag: Regex,
    emphasis: Regex,
    magic_word: Regex,
    list_marker: Regex,
    entity: Regex,
    interlanguage: Regex,
}

impl WikiTextRenderer {
    pub fn new() -> Result<Self> {
        let dropped_blocks = DROPPED_BLOCK_TAGS
            .iter()
            .map(|tag| block_regex(tag))
            .collect::<Result<Vec<_>>>()?;
        let marker = format!(
            "{}[0-9]+{}|{}",
            regex::escape(TOKEN_PREFIX),
            regex::escape(TOKEN_SUFFIX),
            FOOTNOTE_PLACEHOLDER
        );

        Ok(Self {
            footnotes: FootnoteScanner::new()?,
            marker: Regex::new(&marker).context("failed to compile citation marker regex")?,
            comment: Regex::new(r"(?s)<!--.*?(?:-->|\z)").context("failed to compile comment regex")?,
            reference_list: block_regex("references")?,
            dropped_blocks,
            external_link: Regex::new(r"\[(?:https?:|ftp:)?//[^\s\[\]]+(?:\s+(?P<label>[^\[\]]*))?\]")
                .context("failed to compile external-link regex")?,
            line_break: Regex::new(r"(?i)<br\s*/?\s*>").context("failed to compile line-break regex")?,
            html_tag: Regex::new(r"(?i)</?[a-z][a-z0-9]*(?:\s[^<>]*)?/?>")
                .context("failed to compile html-tag regex")?,
            emphasis: Regex::new(r"'{2,}").context("failed to compile emphasis regex")?,
            magic_word: Regex::new(r"__[A-Z]+__").context("failed to compile magic-word regex")?,
            list_marker: Regex::new(r"^[*#:;]+\s*").context("failed to compile list-marker regex")?,
            entity: Regex::new(r"&(?:#(?P<dec>[0-9]{1,7})|#[xX](?P<hex>[0-9a-fA-F]{1,6})|(?P<name>[a-zA-Z]+));")
                .context("failed to compile entity regex")?,
            interlanguage: Regex::new(r"^[a-z]{2,3}(?:-[a-z]+)*:\S")
                .context("failed to compile interlanguage regex")?,
        })
    }

    fn mark_footnotes(&self, markup: &str) -> String {
        let mut output = String::with_capacity(markup.len());
        let mut cursor = 0usize;
        for footnote in self.footnotes.scan(markup) {
            output.push_str(&markup[cursor..footnote.span.start]);
            output.push(FOOTNOTE_PLACEHOLDER);
            cursor = footnote.span.end;
        }
        output.push_str(&markup[cursor..]);
        output
    }

    /// The citation markers inside text that is about to be dropped.
    fn kept_markers(&self, removed: &str) -> String {
        self.marker
            .find_iter(removed)
            .map(|found| found.as_str())
            .collect()
    }

    /// Removes balanced `open ... close` constructs, keeping the citation
    /// markers they held. An unterminated opener is dropped on its own and the
    /// text after it is kept.
    fn strip_nested(&self, text: &str, open: &str, close: &str) -> String {
        let mut output = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(start) = rest.find(open) {
            output.push_str(&rest[..start]);
            let after_open = &rest[start + open.len()..];
            rest = match matching_close(after_open, open, close) {
                Some(end) => {
                    output.push_str(&self.kept_markers(&after_open[..end]));
                    &after_open[end + close.len()..]
                }
                None => after_open,
            };
        }
        output.push_str(rest);
        output
    }

    fn render_links(&self, text: &str) -> String {
        let mut output = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(start) = rest.find("[[") {
            output.push_str(&rest[..start]);
            let after_open = &rest[start + 2..];
            match matching_close(after_open, "[[", "]]") {
                Some(end) => {
                    let inner = &after_open[..end];
                    output.push_str(&self.render_link_inner(inner));
                    rest = &after_open[end + 2..];
                }
                None => {
                    rest = after_open;
                }
            }
        }
        output.push_str(rest);
        output
    }

    fn render_link_inner(&self, inner: &str) -> String {
        let (target, label) = match inner.find('|') {
            Some(pipe) => (&inner[..pipe], Some(&inner[pipe + 1..])),
            None => (inner, None),
        };
        let target = target.trim();

        if !target.starts_with(':') {
            let lowered = target.to_lowercase();
            let namespace = lowered.split(':').next().unwrap_or("").trim();
            if lowered.contains(':') && DROPPED_LINK_NAMESPACES.contains(&namespace) {
                return self.kept_markers(inner);
            }
            if label.is_none() && self.interlanguage.is_match(target) {
                return self.kept_markers(inner);
            }
        }

        match label {
            Some(label) if !label.trim().is_empty() => self.render_links(label),
            _ => target.trim_start_matches(':').to_string(),
        }
    }

    fn decode_entities(&self, text: &str) -> String {
        self.entity
            .replace_all(text, |captures: &Captures| {
                if let Some(dec) = captures.name("dec") {
                    return dec
                        .as_str()
                        .parse::<u32>()
                        .ok()
                        .and_then(char::from_u32)
                        .map(String::from)
                        .unwrap_or_default();
                }
                if let Some(hex) = captures.name("hex") {
                    return u32::from_str_radix(hex.as_str(), 16)
                        .ok()
                        .and_then(char::from_u32)
                        .map(String::from)
                        .unwrap_or_default();
                }
                let name = captures.name("name").map(|m| m.as_str()).unwrap_or("");
                match named_entity(name) {
                    Some(value) => value.to_string(),
                    None => captures[0].to_string(),
                }
            })
            .into_owned()
    }

    fn render_line(&self, line: &str) -> Option<String> {
        let trimmed = line.trim();
        let structure = self.marker.replace_all(trimmed, "");
        let structure = structure.trim();
        if structure.is_empty() || structure.starts_with("----") || heading_title(structure).is_some()
        {
            return finish_line(&self.kept_markers(trimmed));
        }

        let without_marker = self.list_marker.replace(trimmed, "");
        let without_magic = self.magic_word.replace_all(&without_marker, "");
        finish_line(&self.decode_entities(&without_magic))
    }
}

impl MarkupRenderer for WikiTextRenderer {
    fn name(&self) -> &str {
        "builtin"
    }

    fn render(&self, markup: &str) -> Result<String> {
        let markup = markup.replace(FOOTNOTE_PLACEHOLDER, "");
        let text = self.comment.replace_all(&markup, "");
        let text = self.mark_footnotes(&text);
        let mut text = self.reference_list.replace_all(&text, "").into_owned();
        for block in &self.dropped_blocks {
            text = block
                .replace_all(&text, |captures: &Captures| self.kept_markers(&captures[0]))
                .into_owned();
        }
        let text = self.strip_nested(&text, "{{", "}}");
        let text = self.strip_nested(&text, "{|", "|}");
        let text = self.render_links(&text);
        let text = self
            .external_link
            .replace_all(&text, |captures: &Captures| {
                let whole = &captures[0];
                match captures.name("label") {
                    Some(label) => {
                        let target_len = label.start() - captures.get(0).map_or(0, |m| m.start());
                        format!("{}{}", self.kept_markers(&whole[..target_len]), label.as_str())
                    }
                    None => self.kept_markers(whole),
                }
            })
            .into_owned();
        let text = self.line_break.replace_all(&text, " ");
        let text = self.html_tag.replace_all(&text, "");
        let text = self.emphasis.replace_all(&text, "");

        let lines = text
            .lines()
            .filter_map(|line| self.render_line(line))
            .collect::<Vec<_>>();

        Ok(lines.join("\n"))
    }
}

/// Byte offset of the close delimiter balancing an already consumed open
/// delimiter, or `None` when the construct is unterminated.
fn matching_close(text: &str, open: &str, close: &str) -> Option<usize> {
    let mut depth = 1usize;
    let mut index = 0usize;
    while index < text.len() {
        let rest = &text[index..];
        if rest.starts_with(open) {
            depth += 1;
            index += open.len();
        } else if rest.starts_with(close) {
            depth -= 1;
            if depth == 0 {
                return Some(index);
            }
            index += close.len();
        } else {
            index += rest.chars().next().map(char::len_utf8).unwrap_or(1);
        }
    }
    None
}

fn block_regex(tag: &str) -> Result<Regex> {
    Regex::new(&format!(
        r"(?is)<{tag}\b[^<>]*?(?:/>|>.*?(?:</{tag}\s*>|\z))"
    ))
    .with_context(|| format!("failed to compile block regex for <{tag}>"))
}

/// Drops footnote placeholders and collapses whitespace.
fn finish_line(text: &str) -> Option<String> {
    let collapsed = text
        .replace(FOOTNOTE_PLACEHOLDER, "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    if collapsed.is_empty() { None } else { Some(collapsed) }
}

fn named_entity(name: &str) -> Option<&'static str> {
    let value = match name {
        "nbsp" | "ensp" | "emsp" | "thinsp" => " ",
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        "ndash" => "\u{2013}",
        "mdash" => "\u{2014}",
        "minus" => "\u{2212}",
        "hellip" => "\u{2026}",
        "laquo" => "\u{00AB}",
        "raquo" => "\u{00BB}",
        "lsquo" => "\u{2018}",
        "rsquo" => "\u{2019}",
        "ldquo" => "\u{201C}",
        "rdquo" => "\u{201D}",
        "deg" => "\u{00B0}",
        "times" => "\u{00D7}",
        "copy" => "\u{00A9}",
        "shy" | "zwj" | "zwnj" => "",
        _ => return None,
    };
    Some(value)
}
