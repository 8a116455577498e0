use thiserror::Error;

use super::citations::{TOKEN_PREFIX, TOKEN_SUFFIX};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AlignmentError {
    #[error(
        "sentence {sentence} diverges from the token-bearing rendering at byte {offset}: expected {expected:?}, found {found:?}"
    )]
    Diverged {
        sentence: usize,
        offset: usize,
        expected: char,
        found: Option<char>,
    },
    #[error("aligner produced {token_lists} token lists for {sentences} sentences")]
    CountMismatch { sentences: usize, token_lists: usize },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Alignment {
    pub token_lists: Vec<Vec<String>>,
    pub trailing_tokens: usize,
    pub dropped_tokens: usize,
    pub unmatched_trailing_chars: usize,
}

impl Alignment {
    pub fn token_count(&self) -> usize {
        self.token_lists.iter().map(Vec::len).sum()
    }
}

/// Assigns every token of `token_text` to the sentence whose characters
/// surround it. Sentences come from the token-free rendering, so outside of
/// tokens and whitespace both streams must agree character for character.
///
/// Tokens directly after a sentence's last character belong to that
/// sentence. Tokens after the last sentence go to the last sentence.
pub fn align_tokens(sentences: &[String], token_text: &str) -> Result<Alignment, AlignmentError> {
    let mut cursor = TokenCursor::new(token_text);
    let mut alignment = Alignment {
        token_lists: Vec::with_capacity(sentences.len()),
        ..Alignment::default()
    };

    for (index, sentence) in sentences.iter().enumerate() {
        let mut tokens = Vec::new();

        for expected in sentence.chars().filter(|value| !value.is_whitespace()) {
            cursor.take_tokens(&mut tokens);
            match cursor.peek() {
                Some(found) if found == expected => cursor.advance(found),
                found => {
                    return Err(AlignmentError::Diverged {
                        sentence: index,
                        offset: cursor.offset(),
                        expected,
                        found,
                    });
                }
            }
        }

        cursor.take_tokens(&mut tokens);
        alignment.token_lists.push(tokens);
    }

    let (trailing, unmatched) = cursor.drain_remaining();
    alignment.unmatched_trailing_chars = unmatched;
    match alignment.token_lists.last_mut() {
        Some(last) => {
            alignment.trailing_tokens = trailing.len();
            last.extend(trailing);
        }
        None => alignment.dropped_tokens = trailing.len(),
    }

    Ok(alignment)
}

struct TokenCursor<'a> {
    text: &'a str,
    offset: usize,
}

impl<'a> TokenCursor<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, offset: 0 }
    }

    fn offset(&self) -> usize {
        self.offset
    }

    fn rest(&self) -> &'a str {
        &self.text[self.offset..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn advance(&mut self, value: char) {
        self.offset += value.len_utf8();
    }

    fn skip_whitespace(&mut self) {
        while let Some(value) = self.peek() {
            if !value.is_whitespace() {
                break;
            }
            self.advance(value);
        }
    }

    fn take_tokens(&mut self, tokens: &mut Vec<String>) {
        loop {
            self.skip_whitespace();
            match token_len(self.rest()) {
                Some(len) => {
                    tokens.push(self.rest()[..len].to_string());
                    self.offset += len;
                }
                None => return,
            }
        }
    }

    /// Consumes the rest of the text, returning the tokens found and the
    /// number of other non-whitespace characters skipped.
    fn drain_remaining(&mut self) -> (Vec<String>, usize) {
        let mut tokens = Vec::new();
        let mut unmatched = 0usize;
        loop {
            self.take_tokens(&mut tokens);
            match self.peek() {
                Some(value) => {
                    unmatched += 1;
                    self.advance(value);
                }
                None => return (tokens, unmatched),
            }
        }
    }
}

/// Length in bytes of the token starting at the beginning of `text`.
pub(crate) fn token_len(text: &str) -> Option<usize> {
    let after_prefix = text.strip_prefix(TOKEN_PREFIX)?;
    let digits = after_prefix
        .bytes()
        .take_while(|value| value.is_ascii_digit())
        .count();
    if digits == 0 {
        return None;
    }
    after_prefix[digits..].strip_prefix(TOKEN_SUFFIX)?;
    Some(TOKEN_PREFIX.len() + digits + TOKEN_SUFFIX.len())
}
