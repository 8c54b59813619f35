//! Errors produced while generating a layout.
//!
//! - L001: `EmptyWordList`
//! - L002: `InvalidWordCharacters`
//! - L003: `UnplaceableRequiredWord`
//! - L004: `SearchBudgetExceeded` (never returned as an `Err`; only reported as a warning on an
//!   otherwise successful `Puzzle`)

#[cfg(feature = "serde")]
use serde_derive::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum GenerationError {
    /// No words were supplied.
    #[error("no words to lay out")]
    EmptyWordList,

    /// A word contains something other than letters.
    #[error("“{word}” contains invalid character {invalid_char:?}")]
    InvalidWordCharacters { word: String, invalid_char: char },

    /// Every search attempt ran out of options (or budget) before placing all required words.
    /// `required_placed` is the most required words any single attempt managed to place at once,
    /// and `word` is the one it got stuck on.
    #[error(
        "couldn’t place required word “{word}” (best attempt placed {required_placed} of \
         {required_total} required words)"
    )]
    UnplaceableRequiredWord {
        word: String,
        required_placed: usize,
        required_total: usize,
    },

    /// The search stopped early after all required words were placed, so some optional words
    /// weren't tried.
    #[error("search budget ran out; {skipped_optional} optional word(s) skipped")]
    SearchBudgetExceeded { skipped_optional: usize },
}

impl GenerationError {
    /// Returns the error code for this error variant
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            GenerationError::EmptyWordList => "L001",
            GenerationError::InvalidWordCharacters { .. } => "L002",
            GenerationError::UnplaceableRequiredWord { .. } => "L003",
            GenerationError::SearchBudgetExceeded { .. } => "L004",
        }
    }

    /// Returns a helpful suggestion for this error
    #[must_use]
    pub fn help(&self) -> Option<&'static str> {
        match self {
            GenerationError::EmptyWordList => Some("Supply at least one word with a hint."),
            GenerationError::InvalidWordCharacters { .. } => {
                Some("Words may only contain letters; spaces are removed automatically.")
            }
            GenerationError::UnplaceableRequiredWord { .. } => Some(
                "Raise the maximum extent or backtrack budget, add words that share letters \
                 with it, or mark it optional.",
            ),
            GenerationError::SearchBudgetExceeded { .. } => {
                Some("Raise the backtrack budget or timeout to try more optional words.")
            }
        }
    }

    /// Is this a problem that stops generation, as opposed to a warning?
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, GenerationError::SearchBudgetExceeded { .. })
    }

    /// Formats the error with code and optional help text
    #[must_use]
    pub fn display_detailed(&self) -> String {
        match self.help() {
            Some(help) => format!("{self} ({})\n  help: {help}", self.code()),
            None => format!("{self} ({})", self.code()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_detailed() {
        let error = GenerationError::UnplaceableRequiredWord {
            word: "QUIZ".into(),
            required_placed: 2,
            required_total: 3,
        };

        let detailed = error.display_detailed();
        assert!(detailed.starts_with(
            "couldn’t place required word “QUIZ” (best attempt placed 2 of 3 required words) (L003)"
        ));
        assert!(detailed.contains("help: "));
        assert!(error.is_fatal());
        assert!(!GenerationError::SearchBudgetExceeded { skipped_optional: 1 }.is_fatal());
    }
}
