//! Crossword layout generation: given words with hints, arrange them on a grid so that required
//! words cross each other, optional words are woven in where they fit, and the result stays
//! compact. Start with `puzzle::generate_layout`.

pub mod backtracking_search;
pub mod candidates;
pub mod errors;
pub mod grid;
pub mod layout_config;
pub mod logging;
pub mod puzzle;
pub mod scorer;
pub mod types;
pub mod word_list;

pub const CHECK_INVARIANTS: bool = cfg!(feature = "check_invariants");

pub use errors::GenerationError;
pub use layout_config::LayoutConfig;
pub use puzzle::{generate_compact_layout, generate_layout, Puzzle};
pub use word_list::WordEntry;
