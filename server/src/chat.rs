//! Chat text sanitizing

use shared::MAX_CHAT_LEN;
use std::collections::HashSet;

/// Cleans chat text before it is relayed to a game.
pub trait ChatFilter: Send + Sync {
    fn clean(&self, text: &str) -> String;
}

/// Masks listed words, matched case-insensitively on whole words, with `*`.
pub struct WordListFilter {
    words: HashSet<String>,
}

impl WordListFilter {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            words: words
                .into_iter()
                .map(|word| word.as_ref().to_lowercase())
                .collect(),
        }
    }

    fn mask_word(&self, word: &str, out: &mut String) {
        if self.words.contains(&word.to_lowercase()) {
            out.extend(std::iter::repeat('*').take(word.chars().count()));
        } else {
            out.push_str(word);
        }
    }
}

impl Default for WordListFilter {
    fn default() -> Self {
        Self::new(["damn", "hell", "crap", "bastard", "idiot", "stupid"])
    }
}

impl ChatFilter for WordListFilter {
    fn clean(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut word_start = None;

        for (i, c) in text.char_indices() {
            match (c.is_alphanumeric(), word_start) {
                (true, None) => word_start = Some(i),
                (false, Some(start)) => {
                    self.mask_word(&text[start..i], &mut out);
                    word_start = None;
                    out.push(c);
                }
                (false, None) => out.push(c),
                (true, Some(_)) => {}
            }
        }
        if let Some(start) = word_start {
            self.mask_word(&text[start..], &mut out);
        }

        out
    }
}

/// Trims and length-limits chat text. Returns `None` for an empty message.
pub fn prepare_message(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(MAX_CHAT_LEN).collect())
}
