//! Word lists: the hinted entries a layout is generated from, and a loader for the tab-separated
//! `word<TAB>hint[<TAB>flag]` files they usually live in.

use std::fs;
use std::path::Path;
use unicode_normalization::UnicodeNormalization;

#[cfg(feature = "serde")]
use serde_derive::{Deserialize, Serialize};

/// Stop collecting errors after this many; a file this broken is probably not a word list at all.
const MAX_REPORTED_ERRORS: usize = 100;

/// A word to be laid out, along with its clue.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WordEntry {
    /// The answer, as it should appear in the grid.
    pub text: String,

    /// The clue. This is opaque to the layout engine.
    pub hint: String,

    /// Required words must appear in the layout; the others are woven in when they fit.
    pub required: bool,
}

impl WordEntry {
    #[must_use]
    pub fn new(text: &str, hint: &str, required: bool) -> WordEntry {
        WordEntry {
            text: text.to_string(),
            hint: hint.to_string(),
            required,
        }
    }

    #[must_use]
    pub fn required(text: &str, hint: &str) -> WordEntry {
        WordEntry::new(text, hint, true)
    }

    #[must_use]
    pub fn optional(text: &str, hint: &str) -> WordEntry {
        WordEntry::new(text, hint, false)
    }
}

/// Does the third column of a word list line mark the word as optional? "Optional", "True",
/// "Bonus" and "Extra" do (or anything else starting with the same letter, in any case). An empty
/// flag doesn't.
#[must_use]
pub fn is_optional_flag(flag: &str) -> bool {
    flag.trim()
        .chars()
        .next()
        .is_some_and(|first| matches!(first.to_ascii_uppercase(), 'O' | 'T' | 'B' | 'E'))
}

/// Given a word as the user typed it, turn it into the form that's written into the grid.
#[must_use]
pub fn normalize_word(canonical: &str) -> String {
    canonical
        .nfc() // Normalize Unicode combining forms
        .flat_map(char::to_uppercase)
        .filter(|c| !c.is_whitespace())
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum WordListError {
    #[error("Can’t read file: “{path}”")]
    InvalidPath { path: String },

    #[error("Line {line}: word is empty")]
    InvalidWord { line: usize },

    #[error("Line {line}: no hint given for “{word}”")]
    MissingHint { line: usize, word: String },
}

/// The parsed contents of a word list file. Lines that couldn't be parsed are reported in
/// `errors` and left out of `entries`.
#[derive(Debug, Default)]
pub struct WordList {
    pub entries: Vec<WordEntry>,
    pub errors: Vec<WordListError>,
}

impl WordList {
    /// Read and parse the word list file at `path`.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<WordList, WordListError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|_| WordListError::InvalidPath {
            path: path.display().to_string(),
        })?;

        Ok(WordList::parse(&contents))
    }

    /// Parse tab-separated `word`, `hint`, and optional flag columns. Blank lines are skipped.
    #[must_use]
    pub fn parse(contents: &str) -> WordList {
        let mut word_list = WordList::default();

        for (line_idx, line) in contents.lines().enumerate() {
            if word_list.errors.len() >= MAX_REPORTED_ERRORS {
                break;
            }
            if line.trim().is_empty() {
                continue;
            }

            let line_number = line_idx + 1;
            let mut columns = line.split('\t').map(str::trim);

            let word = columns.next().unwrap_or_default();
            if word.is_empty() {
                word_list.errors.push(WordListError::InvalidWord { line: line_number });
                continue;
            }

            let Some(hint) = columns.next().filter(|hint| !hint.is_empty()) else {
                word_list.errors.push(WordListError::MissingHint {
                    line: line_number,
                    word: word.to_string(),
                });
                continue;
            };

            let required = !columns.next().is_some_and(is_optional_flag);

            word_list.entries.push(WordEntry::new(word, hint, required));
        }

        word_list
    }

    #[must_use]
    pub fn required_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.required).count()
    }
}
