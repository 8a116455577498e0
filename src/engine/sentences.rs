use std::collections::HashSet;

use anyhow::Result;

use super::render::SentenceSplitter;

const DEFAULT_ABBREVIATIONS: &[&str] = &[
    "mr", "mrs", "ms", "dr", "prof", "sr", "jr", "st", "mt", "ft", "gen", "col", "lt", "sgt",
    "capt", "gov", "sen", "rep", "rev", "hon", "vs", "etc", "approx", "est", "no", "nos", "vol",
    "vols", "pp", "p", "ed", "eds", "fig", "figs", "ch", "sec", "inc", "ltd", "co", "corp",
    "jan", "feb", "mar", "apr", "jun", "jul", "aug", "sep", "sept", "oct", "nov", "dec", "ca",
    "cf", "al", "op", "cit", "ibid", "bros", "dept", "univ", "assn", "ave", "blvd", "rd",
];

const TERMINATORS: &[char] = &['.', '!', '?'];
const WIDE_TERMINATORS: &[char] = &['\u{3002}', '\u{FF01}', '\u{FF1F}'];
const CLOSERS: &[char] = &[
    '"', '\'', ')', ']', '\u{201D}', '\u{2019}', '\u{00BB}', '\u{300D}', '\u{300F}',
];
const OPENERS: &[char] = &[
    '"', '\'', '(', '[', '\u{201C}', '\u{2018}', '\u{00AB}', '\u{00BF}', '\u{00A1}',
];

/// Rule-based splitter: line breaks always end a sentence; terminal
/// punctuation ends one when the next word looks like a sentence start.
#[derive(Debug, Clone)]
pub struct RuleSentenceSplitter {
    abbreviations: HashSet<String>,
}

impl Default for RuleSentenceSplitter {
    fn default() -> Self {
        Self {
            abbreviations: DEFAULT_ABBREVIATIONS
                .iter()
                .map(|value| value.to_string())
                .collect(),
        }
    }
}

impl RuleSentenceSplitter {
    fn split_line(&self, line: &str, sentences: &mut Vec<String>) {
        let chars = line.char_indices().collect::<Vec<_>>();
        let mut start = 0usize;
        let mut index = 0usize;

        while index < chars.len() {
            let (position, value) = chars[index];

            if WIDE_TERMINATORS.contains(&value) {
                let mut end = index + 1;
                while end < chars.len() && CLOSERS.contains(&chars[end].1) {
                    end += 1;
                }
                let end_byte = chars.get(end).map(|(byte, _)| *byte).unwrap_or(line.len());
                push_trimmed(sentences, &line[start..end_byte]);
                start = end_byte;
                index = end;
                continue;
            }

            if !TERMINATORS.contains(&value) {
                index += 1;
                continue;
            }

            let mut end = index + 1;
            while end < chars.len()
                && (TERMINATORS.contains(&chars[end].1) || CLOSERS.contains(&chars[end].1))
            {
                end += 1;
            }

            let mut next = end;
            while next < chars.len() && chars[next].1.is_whitespace() {
                next += 1;
            }

            let boundary = next > end
                && next < chars.len()
                && starts_sentence(chars[next].1)
                && !(value == '.' && self.is_abbreviation(&line[start..position]));

            if boundary {
                push_trimmed(sentences, &line[start..chars[end].0]);
                start = chars[next].0;
                index = next;
            } else {
                index = end;
            }
        }

        push_trimmed(sentences, &line[start..]);
    }

    fn is_abbreviation(&self, preceding: &str) -> bool {
        let word = preceding
            .rsplit(char::is_whitespace)
            .next()
            .unwrap_or("")
            .trim_start_matches(OPENERS);

        if word.is_empty() {
            return false;
        }
        if word.contains('.') {
            return true;
        }

        let mut letters = word.chars();
        if let (Some(first), None) = (letters.next(), letters.next()) {
            if first.is_alphabetic() {
                return true;
            }
        }

        self.abbreviations.contains(&word.to_lowercase())
    }
}

impl SentenceSplitter for RuleSentenceSplitter {
    fn name(&self) -> &str {
        "builtin"
    }

    fn split(&self, text: &str) -> Result<Vec<String>> {
        let mut sentences = Vec::new();
        for line in text.lines() {
            self.split_line(line, &mut sentences);
        }
        Ok(sentences)
    }
}

fn starts_sentence(value: char) -> bool {
    value.is_numeric() || OPENERS.contains(&value) || (value.is_alphabetic() && !value.is_lowercase())
}

fn push_trimmed(sentences: &mut Vec<String>, candidate: &str) {
    let trimmed = candidate.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }
}
