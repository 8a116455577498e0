const FALLBACK_LANGUAGE: &str = "en";

#[derive(Debug, Clone)]
pub struct ReferenceHeadings {
    titles: Vec<String>,
}

impl ReferenceHeadings {
    pub fn for_language(language: &str) -> Self {
        let titles = language_headings(language)
            .or_else(|| language_headings(FALLBACK_LANGUAGE))
            .unwrap_or_default();

        Self {
            titles: titles.iter().map(|title| title.to_lowercase()).collect(),
        }
    }

    pub fn with_extra<I>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        for title in extra {
            let title = title.trim().to_lowercase();
            if !title.is_empty() && !self.titles.contains(&title) {
                self.titles.push(title);
            }
        }
        self
    }

    pub fn matches(&self, title: &str) -> bool {
        let title = title.trim().to_lowercase();
        self.titles.iter().any(|candidate| *candidate == title)
    }

    pub fn titles(&self) -> &[String] {
        &self.titles
    }
}

fn language_headings(language: &str) -> Option<&'static [&'static str]> {
    let titles: &'static [&'static str] = match language.trim().to_ascii_lowercase().as_str() {
        "en" | "simple" => &["References", "Notes", "Footnotes", "Citations", "Notes and references"],
        "de" => &["Einzelnachweise", "Quellen", "Belege", "Anmerkungen"],
        "fr" => &["Références", "Notes et références", "Notes"],
        "es" => &["Referencias", "Notas", "Notas y referencias"],
        "it" => &["Note", "Riferimenti"],
        "nl" => &["Referenties", "Bronnen", "Noten", "Bronnen, noten en/of referenties"],
        "pt" => &["Referências", "Notas", "Notas e referências"],
        "pl" => &["Przypisy", "Bibliografia"],
        "sv" => &["Referenser", "Källor", "Noter"],
        "ru" => &["Примечания", "Ссылки", "Источники"],
        "ja" => &["脚注", "出典", "参考文献"],
        _ => return None,
    };
    Some(titles)
}

#[derive(Debug, Clone)]
pub struct NormalizedMarkup {
    pub text: String,
    pub tabs_removed: usize,
    pub truncated_at: Option<String>,
}

pub fn normalize_markup(raw: &str, headings: &ReferenceHeadings) -> NormalizedMarkup {
    let tabs_removed = raw.matches('\t').count();
    let mut text = raw.replace('\t', "");

    let truncated_at = match find_references_heading(&text, headings) {
        Some((offset, title)) => {
            text.truncate(offset);
            Some(title)
        }
        None => None,
    };

    NormalizedMarkup {
        text,
        tabs_removed,
        truncated_at,
    }
}

fn find_references_heading(text: &str, headings: &ReferenceHeadings) -> Option<(usize, String)> {
    let mut offset = 0usize;
    for line in text.split_inclusive('\n') {
        if let Some(title) = heading_title(line) {
            if headings.matches(title) {
                return Some((offset, title.to_string()));
            }
        }
        offset += line.len();
    }
    None
}

pub(crate) fn heading_title(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    if !trimmed.starts_with('=') {
        return None;
    }

    let title = trimmed.trim_start_matches('=').trim_end_matches('=').trim();
    if title.is_empty() { None } else { Some(title) }
}
