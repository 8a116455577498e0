use std::collections::{HashMap, HashSet};
use std::fmt;
use std::ops::Range;

use anyhow::{Context, Result};
use regex::Regex;
use tracing::debug;

pub const TOKEN_PREFIX: &str = "ZZCITE";
pub const TOKEN_SUFFIX: &str = "ZZ";

pub fn citation_token(number: usize) -> String {
    format!("{TOKEN_PREFIX}{number:06}{TOKEN_SUFFIX}")
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CitationId {
    Named(String),
    Anonymous(usize),
}

impl fmt::Display for CitationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.write_str(name),
            Self::Anonymous(index) => write!(f, "#{index}"),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CitationKind {
    Anonymous,
    Defined,
    Reference,
    Unresolved,
    Malformed,
}

impl CitationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Anonymous => "anonymous",
            Self::Defined => "defined",
            Self::Reference => "reference",
            Self::Unresolved => "unresolved",
            Self::Malformed => "malformed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CitationEntry {
    pub token: String,
    pub id: CitationId,
    pub kind: CitationKind,
    pub urls: Vec<String>,
    pub span: Range<usize>,
}

/// Occurrence-indexed citation map: one entry per footnote occurrence, in
/// document order, with a token index for constant-time resolution.
#[derive(Debug, Clone, Default)]
pub struct CitationMap {
    entries: Vec<CitationEntry>,
    by_token: HashMap<String, usize>,
}

impl CitationMap {
    pub fn new(entries: Vec<CitationEntry>) -> Self {
        let by_token = entries
            .iter()
            .enumerate()
            .map(|(index, entry)| (entry.token.clone(), index))
            .collect();
        Self { entries, by_token }
    }

    pub fn urls_for(&self, token: &str) -> Option<&[String]> {
        self.by_token
            .get(token)
            .map(|index| self.entries[*index].urls.as_slice())
    }

    pub fn entries(&self) -> &[CitationEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count_kind(&self, kind: CitationKind) -> usize {
        self.entries.iter().filter(|entry| entry.kind == kind).count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameAttr {
    Absent,
    Present(String),
    Invalid,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FootnoteShape {
    Paired,
    SelfClosing,
    Unterminated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FootnoteSpan {
    pub span: Range<usize>,
    pub body: Option<Range<usize>>,
    pub name: NameAttr,
    pub shape: FootnoteShape,
}

#[derive(Debug, Clone)]
pub struct FootnoteScanner {
    open_tag: Regex,
    close_tag: Regex,
    comment: Regex,
    name_key: Regex,
    name_value: Regex,
}

impl FootnoteScanner {
    pub fn new() -> Result<Self> {
        Ok(Self {
            open_tag: Regex::new(r"(?i)<ref(?P<attrs>\s[^<>]*?)?\s*(?P<slash>/)?>")
                .context("failed to compile footnote opening-tag regex")?,
            close_tag: Regex::new(r"(?i)</ref\s*>")
                .context("failed to compile footnote closing-tag regex")?,
            comment: Regex::new(r"(?s)<!--.*?(?:-->|\z)")
                .context("failed to compile comment regex")?,
            name_key: Regex::new(r"(?i)(?:^|\s)name\s*=")
                .context("failed to compile name-attribute regex")?,
            name_value: Regex::new(
                r#"(?i)(?:^|\s)name\s*=\s*(?:"(?P<dq>[^"]*)"|'(?P<sq>[^']*)'|(?P<bare>[^\s"'/>]+))"#,
            )
            .context("failed to compile name-value regex")?,
        })
    }

    pub fn comment_ranges(&self, markup: &str) -> Vec<Range<usize>> {
        self.comment
            .find_iter(markup)
            .map(|found| found.range())
            .collect()
    }

    /// Footnote spans in document order. Spans never overlap and footnotes
    /// inside HTML comments are skipped.
    pub fn scan(&self, markup: &str) -> Vec<FootnoteSpan> {
        let comments = self.comment_ranges(markup);
        let mut spans = Vec::new();
        let mut position = 0usize;

        while let Some(open) = find_outside(&self.open_tag, markup, position, &comments) {
            let captures = match self.open_tag.captures_at(markup, open.start) {
                Some(captures) => captures,
                None => break,
            };
            let attrs = captures.name("attrs").map(|m| m.as_str()).unwrap_or("");
            let trimmed_attrs = attrs.trim_end();
            let self_closing = captures.name("slash").is_some() || trimmed_attrs.ends_with('/');
            let attrs = trimmed_attrs.trim_end_matches('/');
            let name = self.parse_name(attrs);

            if self_closing {
                spans.push(FootnoteSpan {
                    span: open.clone(),
                    body: None,
                    name,
                    shape: FootnoteShape::SelfClosing,
                });
                position = open.end;
                continue;
            }

            let close = find_outside(&self.close_tag, markup, open.end, &comments);
            let next_open = find_outside(&self.open_tag, markup, open.end, &comments);
            match close {
                Some(close)
                    if next_open
                        .as_ref()
                        .map(|next| next.start >= close.end)
                        .unwrap_or(true) =>
                {
                    spans.push(FootnoteSpan {
                        span: open.start..close.end,
                        body: Some(open.end..close.start),
                        name,
                        shape: FootnoteShape::Paired,
                    });
                    position = close.end;
                }
                _ => {
                    spans.push(FootnoteSpan {
                        span: open.clone(),
                        body: None,
                        name,
                        shape: FootnoteShape::Unterminated,
                    });
                    position = open.end;
                }
            }
        }

        spans
    }

    fn parse_name(&self, attrs: &str) -> NameAttr {
        if !self.name_key.is_match(attrs) {
            return NameAttr::Absent;
        }

        let Some(captures) = self.name_value.captures(attrs) else {
            return NameAttr::Invalid;
        };
        let value = captures
            .name("dq")
            .or_else(|| captures.name("sq"))
            .or_else(|| captures.name("bare"))
            .map(|m| m.as_str().trim())
            .unwrap_or("");

        if value.is_empty() {
            NameAttr::Invalid
        } else {
            NameAttr::Present(value.to_string())
        }
    }
}

fn find_outside(
    pattern: &Regex,
    text: &str,
    from: usize,
    excluded: &[Range<usize>],
) -> Option<Range<usize>> {
    let mut at = from;
    while at <= text.len() {
        let found = pattern.find_at(text, at)?;
        match excluded
            .iter()
            .find(|range| range.start <= found.start() && found.start() < range.end)
        {
            Some(range) => at = range.end,
            None => return Some(found.range()),
        }
    }
    None
}

#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    pub include_archive_urls: bool,
}

#[derive(Debug, Clone)]
pub struct Extraction {
    pub map: CitationMap,
    pub substituted: String,
}

#[derive(Debug, Clone)]
pub struct CitationExtractor {
    scanner: FootnoteScanner,
    url_pattern: Regex,
    options: ExtractOptions,
}

impl CitationExtractor {
    pub fn new(options: ExtractOptions) -> Result<Self> {
        Ok(Self {
            scanner: FootnoteScanner::new()?,
            url_pattern: Regex::new(
                r#"(?i)\|\s*(?P<param>[\w-]*url)\s*=\s*(?P<value>[^|{}\s<\]]+)|(?P<bare>(?:https?|ftp)://[^\s|\[\]{}<>"]+)"#,
            )
            .context("failed to compile citation URL regex")?,
            options,
        })
    }

    /// Replaces every footnote occurrence with a numbered token and records
    /// the URLs each occurrence stands for. Token numbers follow the start
    /// offset of the occurrence.
    pub fn extract(&self, markup: &str) -> Extraction {
        let footnotes = self.scanner.scan(markup);
        let mut definitions = HashMap::<String, Vec<String>>::new();
        let mut anonymous_count = 0usize;
        let mut entries = Vec::with_capacity(footnotes.len());
        let mut substituted = String::with_capacity(markup.len());
        let mut cursor = 0usize;

        for (index, footnote) in footnotes.iter().enumerate() {
            let token = citation_token(index + 1);
            let (id, kind, urls) =
                self.classify(markup, footnote, &mut definitions, &mut anonymous_count);

            if kind == CitationKind::Unresolved || kind == CitationKind::Malformed {
                debug!(
                    token = %token,
                    id = %id,
                    kind = kind.as_str(),
                    offset = footnote.span.start,
                    "footnote degraded to empty URL list"
                );
            }

            substituted.push_str(&markup[cursor..footnote.span.start]);
            substituted.push_str(&token);
            cursor = footnote.span.end;

            entries.push(CitationEntry {
                token,
                id,
                kind,
                urls,
                span: footnote.span.clone(),
            });
        }
        substituted.push_str(&markup[cursor..]);

        Extraction {
            map: CitationMap::new(entries),
            substituted,
        }
    }

    fn classify(
        &self,
        markup: &str,
        footnote: &FootnoteSpan,
        definitions: &mut HashMap<String, Vec<String>>,
        anonymous_count: &mut usize,
    ) -> (CitationId, CitationKind, Vec<String>) {
        let body = footnote
            .body
            .clone()
            .map(|range| &markup[range])
            .filter(|content| !content.trim().is_empty());

        match (&footnote.name, footnote.shape) {
            (_, FootnoteShape::Unterminated) | (NameAttr::Invalid, _) => {
                *anonymous_count += 1;
                (
                    CitationId::Anonymous(*anonymous_count),
                    CitationKind::Malformed,
                    Vec::new(),
                )
            }
            (NameAttr::Absent, _) => {
                *anonymous_count += 1;
                let urls = body
                    .map(|content| self.extract_urls(content))
                    .unwrap_or_default();
                (
                    CitationId::Anonymous(*anonymous_count),
                    CitationKind::Anonymous,
                    urls,
                )
            }
            (NameAttr::Present(name), _) => {
                let id = CitationId::Named(name.clone());
                match body {
                    Some(content) => {
                        let urls = definitions
                            .entry(name.clone())
                            .or_insert_with(|| self.extract_urls(content))
                            .clone();
                        (id, CitationKind::Defined, urls)
                    }
                    None => match definitions.get(name) {
                        Some(urls) => (id, CitationKind::Reference, urls.clone()),
                        None => (id, CitationKind::Unresolved, Vec::new()),
                    },
                }
            }
        }
    }

    pub fn extract_urls(&self, content: &str) -> Vec<String> {
        let mut seen = HashSet::<String>::new();
        let mut urls = Vec::new();

        for captures in self.url_pattern.captures_iter(content) {
            let candidate = if let Some(value) = captures.name("value") {
                let param = captures.name("param").map(|m| m.as_str()).unwrap_or("");
                if is_archive_param(param) && !self.options.include_archive_urls {
                    continue;
                }
                value.as_str()
            } else if let Some(bare) = captures.name("bare") {
                bare.as_str()
            } else {
                continue;
            };

            let url = trim_url(candidate);
            if url.is_empty() {
                continue;
            }
            if seen.insert(url.to_string()) {
                urls.push(url.to_string());
            }
        }

        urls
    }
}

fn is_archive_param(param: &str) -> bool {
    let compact = param
        .chars()
        .filter(|value| value.is_alphanumeric())
        .collect::<String>()
        .to_lowercase();
    compact.contains("archiveurl")
}

fn trim_url(candidate: &str) -> &str {
    let mut url = candidate.trim();
    loop {
        let before = url.len();
        url = url.trim_end_matches(['.', ',', ';', ':', '!', '?', '\'', '"']);
        if url.ends_with(')') && url.matches('(').count() < url.matches(')').count() {
            url = &url[..url.len() - 1];
        }
        if url.len() == before {
            return url;
        }
    }
}
