//! Turning a finished search into a puzzle: numbered clues, coordinates relative to the top-left
//! corner of the layout, and a lattice of cells ready to be drawn.

use log::{info, warn};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::time::Instant;

#[cfg(feature = "serde")]
use serde_derive::Serialize;

use crate::backtracking_search::{
    find_layout_until, prepare_words, suggested_extent, LayoutSuccess, SearchFailure, SearchWord,
    Statistics,
};
use crate::errors::GenerationError;
use crate::grid::{BoundingBox, Direction, Grid, Placement};
use crate::layout_config::LayoutConfig;
use crate::scorer::LayoutScore;
use crate::types::WordId;
use crate::word_list::{normalize_word, WordEntry};

/// One cell of the rectangular lattice covering the layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum LatticeCell {
    /// An empty cell connected to the edge of the lattice.
    Boundary,

    /// An empty cell walled in by letters.
    Void,

    Letter {
        letter: char,
        /// The clue number, if a word starts here.
        number: Option<usize>,
    },
}

/// A word in the finished puzzle, with its clue number and hint.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct PlacedWord {
    /// The index of the entry this word came from.
    pub word_id: WordId,
    pub number: usize,
    /// The word as written into the grid.
    pub text: String,
    pub hint: String,
    pub required: bool,
    /// `(row, col)` of the first letter, with `(0, 0)` at the top-left of the lattice.
    pub start: (usize, usize),
    pub direction: Direction,
    /// The placement as it was made during the search, in search coordinates.
    pub placement: Placement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum PuzzleStatus {
    AllWordsPlaced,
    /// Some optional words (or demoted required words) didn't fit.
    OptionalWordsSkipped,
    /// The time budget ran out or the search was canceled before every optional word was tried.
    BudgetExceeded,
}

/// The result of a successful generation.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Puzzle {
    #[cfg_attr(feature = "serde", serde(skip))]
    pub grid: Grid,

    /// Every placed word, ordered by clue number with across before down.
    pub placements: Vec<PlacedWord>,

    /// Entries that ended up outside the layout, in input order.
    pub skipped: Vec<WordEntry>,

    /// Entries that repeated another entry's word and were merged into it, in input order.
    pub duplicates: Vec<WordEntry>,

    pub status: PuzzleStatus,
    pub score: LayoutScore,

    /// Non-fatal problems: `SearchBudgetExceeded`, and `UnplaceableRequiredWord` for each required
    /// word that was demoted to optional.
    pub warnings: Vec<GenerationError>,

    /// Stats for the winning attempt.
    pub statistics: Statistics,
    pub attempt_index: usize,
    pub seed: u64,

    pub width: usize,
    pub height: usize,

    /// `height` rows of `width` cells.
    pub lattice: Vec<Vec<LatticeCell>>,
}

impl Puzzle {
    pub fn across(&self) -> impl Iterator<Item = &PlacedWord> {
        self.placements
            .iter()
            .filter(|word| word.direction == Direction::Across)
    }

    pub fn down(&self) -> impl Iterator<Item = &PlacedWord> {
        self.placements
            .iter()
            .filter(|word| word.direction == Direction::Down)
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.status == PuzzleStatus::AllWordsPlaced
    }
}

/// Lay out `entries` according to `config`.
///
/// Validation problems (`EmptyWordList`, `InvalidWordCharacters`) are reported before any
/// searching happens. If no attempt manages to place every required word, the result is
/// `UnplaceableRequiredWord`, unless `config.skip_unplaceable_required` is set, in which case the
/// blocking word is demoted to optional, the search is repeated, and the demotion is reported in
/// `Puzzle::warnings`. `config.timeout` covers all of the repeats together.
pub fn generate_layout(
    entries: &[WordEntry],
    config: &LayoutConfig,
) -> Result<Puzzle, GenerationError> {
    generate_layout_until(entries, config, config.deadline_from(Instant::now()))
}

fn generate_layout_until(
    entries: &[WordEntry],
    config: &LayoutConfig,
    deadline: Option<Instant>,
) -> Result<Puzzle, GenerationError> {
    let mut words = prepare_words(entries)?;
    let mut warnings: Vec<GenerationError> = vec![];

    loop {
        let required_total = words.iter().filter(|word| word.required).count();

        let failure = match find_layout_until(&words, config, deadline) {
            Ok(success) => return Ok(assemble(entries, &words, success, warnings)),
            Err(failure) => failure,
        };

        let blocking_idx = words
            .iter()
            .position(|word| word.id == failure.blocking_word && word.required);
        let error = GenerationError::UnplaceableRequiredWord {
            word: blocking_idx.map_or_else(String::new, |idx| words[idx].text.clone()),
            required_placed: failure.required_placed,
            required_total,
        };

        // Once the budget is gone, demoting another word wouldn't get a real search.
        let interrupted = matches!(failure.reason, SearchFailure::Timeout | SearchFailure::Abort);

        match blocking_idx {
            Some(idx) if config.skip_unplaceable_required && !interrupted => {
                warn!(
                    "Demoting {} to optional after {:?} ({} attempts)",
                    words[idx].text, failure.reason, failure.attempts_run
                );
                words[idx].required = false;
                warnings.push(error);
            }
            _ => return Err(error),
        }
    }
}

/// Lay out `entries` in as small a square as we can find. Starting from `suggested_extent`, each
/// time the required words can't be placed the extent grows by one, up to the total number of
/// letters (or `config.max_extent`, if that's smaller). `config.timeout` covers every extent
/// tried, and we stop growing once it runs out.
pub fn generate_compact_layout(
    entries: &[WordEntry],
    config: &LayoutConfig,
) -> Result<Puzzle, GenerationError> {
    let deadline = config.deadline_from(Instant::now());
    let words = prepare_words(entries)?;
    let total_letters: usize = words.iter().map(|word| word.letters.len()).sum();
    let limit = config
        .max_extent
        .map_or(total_letters, |max_extent| max_extent.min(total_letters));
    let mut extent = suggested_extent(&words).min(limit);

    loop {
        info!("Trying a maximum extent of {extent}");

        let out_of_time = || deadline.is_some_and(|deadline| Instant::now() >= deadline);

        match generate_layout_until(entries, &config.with_max_extent(Some(extent)), deadline) {
            Err(error @ GenerationError::UnplaceableRequiredWord { .. })
                if extent < limit && !config.is_aborted() && !out_of_time() =>
            {
                info!("{error}");
                extent += 1;
            }
            result => return result,
        }
    }
}

fn assemble(
    entries: &[WordEntry],
    words: &[SearchWord],
    success: LayoutSuccess,
    mut warnings: Vec<GenerationError>,
) -> Puzzle {
    let LayoutSuccess {
        state,
        score,
        statistics,
        budget_exceeded,
        attempt_index,
        seed,
        attempts_run,
    } = success;

    info!(
        "Best layout came from attempt {attempt_index} of {attempts_run} (seed {seed}): {score:?}"
    );

    let bounds = state.grid.bounding_box();
    let (height, width) = bounds.map_or((0, 0), |bounds| (bounds.height(), bounds.width()));
    let to_lattice = |(row, col): (isize, isize)| -> (usize, usize) {
        bounds.map_or((0, 0), |bounds| {
            (
                (row - bounds.min_row).unsigned_abs(),
                (col - bounds.min_col).unsigned_abs(),
            )
        })
    };

    // Clue numbers go in reading order, and an across word and a down word that start in the
    // same cell share one.
    let starts: BTreeMap<(usize, usize), usize> = state
        .placements
        .iter()
        .map(|placement| to_lattice(placement.anchor))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .enumerate()
        .map(|(idx, start)| (start, idx + 1))
        .collect();

    let mut placements: Vec<PlacedWord> = state
        .placements
        .iter()
        .filter_map(|placement| {
            let word = words.iter().find(|word| word.id == placement.word_id)?;
            let entry = entries.get(placement.word_id)?;
            let start = to_lattice(placement.anchor);

            Some(PlacedWord {
                word_id: placement.word_id,
                number: starts.get(&start).copied().unwrap_or_default(),
                text: word.text.clone(),
                hint: entry.hint.clone(),
                required: word.required,
                start,
                direction: placement.direction,
                placement: placement.clone(),
            })
        })
        .collect();
    placements.sort_by_key(|word| (word.number, word.direction));

    let skipped: Vec<WordEntry> = state
        .skipped
        .iter()
        .filter_map(|&word_id| entries.get(word_id).cloned())
        .collect();

    let duplicates: Vec<WordEntry> = entries
        .iter()
        .enumerate()
        .filter(|&(word_id, entry)| {
            !normalize_word(&entry.text).is_empty() && !words.iter().any(|word| word.id == word_id)
        })
        .map(|(_, entry)| entry.clone())
        .collect();

    if budget_exceeded {
        let error = GenerationError::SearchBudgetExceeded {
            skipped_optional: skipped.len(),
        };
        warn!("{error}");
        warnings.push(error);
    }

    let status = if budget_exceeded {
        PuzzleStatus::BudgetExceeded
    } else if skipped.is_empty() {
        PuzzleStatus::AllWordsPlaced
    } else {
        PuzzleStatus::OptionalWordsSkipped
    };

    let lattice = build_lattice(&state.grid, bounds, &starts);

    Puzzle {
        grid: state.grid,
        placements,
        skipped,
        duplicates,
        status,
        score,
        warnings,
        statistics,
        attempt_index,
        seed,
        width,
        height,
        lattice,
    }
}

/// Lay the grid out as rows of cells. Empty cells start out as `Void`; a flood fill from every
/// empty cell on the edge then turns the ones reachable from outside into `Boundary`.
fn build_lattice(
    grid: &Grid,
    bounds: Option<BoundingBox>,
    starts: &BTreeMap<(usize, usize), usize>,
) -> Vec<Vec<LatticeCell>> {
    let Some(bounds) = bounds else {
        return vec![];
    };
    let (height, width) = (bounds.height(), bounds.width());

    let mut lattice: Vec<Vec<LatticeCell>> = (0..height)
        .map(|row| {
            (0..width)
                .map(|col| {
                    let coord = (
                        bounds.min_row + row as isize,
                        bounds.min_col + col as isize,
                    );
                    match grid.letter_at(coord) {
                        Some(letter) => LatticeCell::Letter {
                            letter,
                            number: starts.get(&(row, col)).copied(),
                        },
                        None => LatticeCell::Void,
                    }
                })
                .collect()
        })
        .collect();

    let mut queue: VecDeque<(usize, usize)> = (0..height)
        .flat_map(|row| (0..width).map(move |col| (row, col)))
        .filter(|&(row, col)| row == 0 || col == 0 || row == height - 1 || col == width - 1)
        .collect();

    while let Some((row, col)) = queue.pop_front() {
        if lattice[row][col] != LatticeCell::Void {
            continue;
        }
        lattice[row][col] = LatticeCell::Boundary;

        if row > 0 {
            queue.push_back((row - 1, col));
        }
        if row + 1 < height {
            queue.push_back((row + 1, col));
        }
        if col > 0 {
            queue.push_back((row, col - 1));
        }
        if col + 1 < width {
            queue.push_back((row, col + 1));
        }
    }

    lattice
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::word_list::tests::word_file_path;
    use std::time::Duration;
    use crate::word_list::WordList;

    fn single_attempt() -> LayoutConfig {
        LayoutConfig {
            attempts: 1,
            parallel: false,
            ..LayoutConfig::default()
        }
    }

    fn draw(puzzle: &Puzzle) -> Vec<String> {
        puzzle
            .lattice
            .iter()
            .map(|row| {
                row.iter()
                    .map(|cell| match cell {
                        LatticeCell::Boundary => '#',
                        LatticeCell::Void => '.',
                        LatticeCell::Letter { letter, .. } => *letter,
                    })
                    .collect()
            })
            .collect()
    }

    fn clue_list<'a>(words: impl Iterator<Item = &'a PlacedWord>) -> Vec<(usize, &'a str)> {
        words.map(|word| (word.number, word.text.as_str())).collect()
    }

    #[test]
    fn test_cat_car_art_puzzle() {
        let entries = vec![
            WordEntry::required("cat", "Meows"),
            WordEntry::required("car", "Drives"),
            WordEntry::required("art", "Paintings"),
        ];

        let puzzle = generate_layout(&entries, &single_attempt()).expect("should lay out");

        assert!(puzzle.is_complete());
        assert!(puzzle.warnings.is_empty());
        assert!(puzzle.skipped.is_empty());
        assert_eq!((puzzle.width, puzzle.height), (4, 3));
        assert_eq!(draw(&puzzle), vec!["#CAT", "#A##", "ART#"]);

        assert_eq!(clue_list(puzzle.across()), vec![(1, "CAT"), (2, "ART")]);
        assert_eq!(clue_list(puzzle.down()), vec![(1, "CAR")]);
        assert_eq!(puzzle.placements[0].hint, "Meows");
        assert_eq!(puzzle.placements[0].start, (0, 1));
        assert_eq!(
            puzzle.lattice[0][1],
            LatticeCell::Letter {
                letter: 'C',
                number: Some(1),
            }
        );
        assert!(puzzle.score.intersections >= 2);
    }

    #[test]
    fn test_enclosed_cells_are_void() {
        let entries = vec![
            WordEntry::required("abc", "1"),
            WordEntry::required("adg", "2"),
            WordEntry::required("cfi", "3"),
            WordEntry::required("ghi", "4"),
        ];

        let puzzle = generate_layout(&entries, &single_attempt()).expect("should lay out");

        assert_eq!(draw(&puzzle), vec!["ABC", "D.F", "GHI"]);
        assert_eq!(clue_list(puzzle.across()), vec![(1, "ABC"), (3, "GHI")]);
        assert_eq!(clue_list(puzzle.down()), vec![(1, "ADG"), (2, "CFI")]);
    }

    #[test]
    fn test_lone_optional_word_is_skipped() {
        let entries = vec![WordEntry::optional("lonely", "By oneself")];

        let puzzle = generate_layout(&entries, &LayoutConfig::default()).expect("nothing required");

        assert!(puzzle.placements.is_empty());
        assert_eq!(puzzle.skipped, entries);
        assert_eq!(puzzle.status, PuzzleStatus::OptionalWordsSkipped);
        assert_eq!((puzzle.width, puzzle.height), (0, 0));
        assert!(puzzle.lattice.is_empty());
    }

    #[test]
    fn test_validation_errors() {
        assert_eq!(
            generate_layout(&[], &LayoutConfig::default()).unwrap_err(),
            GenerationError::EmptyWordList
        );
        assert_eq!(
            generate_layout(
                &[WordEntry::required("rock'n'roll", "Genre")],
                &LayoutConfig::default()
            )
            .unwrap_err(),
            GenerationError::InvalidWordCharacters {
                word: "rock'n'roll".into(),
                invalid_char: '\'',
            }
        );
    }

    #[test]
    fn test_required_word_longer_than_extent() {
        let entries = vec![
            WordEntry::required("hippopotamus", "River horse"),
            WordEntry::required("xyz", "Nothing in common"),
        ];
        let config = LayoutConfig {
            max_extent: Some(8),
            ..LayoutConfig::default()
        };

        assert_eq!(
            generate_layout(&entries, &config).unwrap_err(),
            GenerationError::UnplaceableRequiredWord {
                word: "HIPPOPOTAMUS".into(),
                required_placed: 0,
                required_total: 2,
            }
        );
    }

    #[test]
    fn test_unplaceable_required_word_demoted_when_relaxed() {
        let entries = vec![
            WordEntry::required("hippopotamus", "River horse"),
            WordEntry::required("xyz", "Nothing in common"),
        ];
        let config = LayoutConfig {
            max_extent: Some(8),
            skip_unplaceable_required: true,
            ..LayoutConfig::default()
        };

        let puzzle = generate_layout(&entries, &config).expect("should lay out without it");

        assert_eq!(clue_list(puzzle.across()), vec![(1, "XYZ")]);
        assert_eq!(puzzle.skipped, vec![entries[0].clone()]);
        assert_eq!(puzzle.status, PuzzleStatus::OptionalWordsSkipped);
        assert_eq!(
            puzzle.warnings,
            vec![GenerationError::UnplaceableRequiredWord {
                word: "HIPPOPOTAMUS".into(),
                required_placed: 0,
                required_total: 2,
            }]
        );
    }

    #[test]
    fn test_budget_exceeded_warning() {
        let entries = vec![
            WordEntry::required("cat", "Meows"),
            WordEntry::optional("tar", "Pitch"),
        ];
        let config = LayoutConfig {
            timeout: Some(Duration::ZERO),
            ..single_attempt()
        };

        let puzzle = generate_layout(&entries, &config).expect("required words fit");

        assert_eq!(puzzle.status, PuzzleStatus::BudgetExceeded);
        assert_eq!(
            puzzle.warnings,
            vec![GenerationError::SearchBudgetExceeded { skipped_optional: 1 }]
        );
    }

    #[test]
    fn test_compact_layout_grows_extent() {
        // DZZZ can only hang off the end of ABCD on the opposite side from WXYA, so the layout
        // needs seven cells in one dimension; the search starts at four.
        let entries = vec![
            WordEntry::required("abcd", "1"),
            WordEntry::required("wxya", "2"),
            WordEntry::required("dzzz", "3"),
        ];

        let puzzle =
            generate_compact_layout(&entries, &LayoutConfig::default()).expect("should lay out");

        assert!(puzzle.is_complete());
        assert_eq!(puzzle.width.max(puzzle.height), 7);
    }

    #[test]
    fn test_compact_layout_gives_up_at_total_letters() {
        let entries = vec![
            WordEntry::required("hippopotamus", "River horse"),
            WordEntry::required("xyz", "Nothing in common"),
        ];

        let error = generate_compact_layout(&entries, &LayoutConfig::default()).unwrap_err();

        assert_eq!(
            error,
            GenerationError::UnplaceableRequiredWord {
                word: "XYZ".into(),
                required_placed: 1,
                required_total: 2,
            }
        );
    }

    #[test]
    fn test_animals_puzzle() {
        let word_list = WordList::from_file(word_file_path()).unwrap();
        let puzzle = generate_layout(&word_list.entries, &LayoutConfig::default()).unwrap();

        let placed_required = puzzle.placements.iter().filter(|word| word.required).count();
        assert_eq!(placed_required, word_list.required_count());

        for word in &puzzle.placements {
            assert_eq!(puzzle.grid.read_placement(&word.placement), word.text);

            let (row, col) = word.start;
            assert!(matches!(
                puzzle.lattice[row][col],
                LatticeCell::Letter { number: Some(number), .. } if number == word.number
            ));
        }

        for pair in puzzle.placements.windows(2) {
            assert!((pair[0].number, pair[0].direction) < (pair[1].number, pair[1].direction));
        }
    }

    #[test]
    fn test_required_repeat_replaces_optional_entry() {
        let entries = vec![
            WordEntry::optional("cat", "Optional hint"),
            WordEntry::required("CAT", "Required hint"),
        ];

        let puzzle = generate_layout(&entries, &single_attempt()).expect("should lay out");

        assert_eq!(puzzle.placements.len(), 1);
        assert_eq!(puzzle.placements[0].word_id, 1);
        assert_eq!(puzzle.placements[0].hint, "Required hint");
        assert!(puzzle.placements[0].required);
        assert!(puzzle.skipped.is_empty());
        assert_eq!(puzzle.duplicates, vec![entries[0].clone()]);
        assert!(puzzle.is_complete());
    }

    fn overlapping_words_and(stray: &str) -> Vec<WordEntry> {
        [
            "crane", "react", "trace", "cater", "crate", "caret", "train", "tears", "stare",
            "rates", "aster", "tenor", "notes", "stone", "tones", "onset", "store", "roast",
            "toast", "start", stray,
        ]
        .iter()
        .map(|word| WordEntry::required(word, "Hint"))
        .collect()
    }

    fn budget_config() -> LayoutConfig {
        LayoutConfig {
            timeout: Some(Duration::from_millis(100)),
            max_backtracks: usize::MAX,
            ..single_attempt()
        }
    }

    #[test]
    fn test_compact_layout_shares_one_time_budget() {
        let entries = overlapping_words_and("xyzzy");

        let start = Instant::now();
        let error = generate_compact_layout(&entries, &budget_config()).unwrap_err();
        let elapsed = start.elapsed();

        assert!(matches!(error, GenerationError::UnplaceableRequiredWord { .. }));
        assert!(elapsed < Duration::from_millis(1000), "100ms budget took {elapsed:?}");
    }

    #[test]
    fn test_relaxed_layout_stops_demoting_after_timeout() {
        let entries = overlapping_words_and("xyzzy");
        let config = LayoutConfig {
            skip_unplaceable_required: true,
            ..budget_config()
        };

        let start = Instant::now();
        let result = generate_layout(&entries, &config);
        let elapsed = start.elapsed();

        assert!(elapsed < Duration::from_millis(1000), "100ms budget took {elapsed:?}");
        if let Ok(puzzle) = result {
            assert!(puzzle.warnings.len() < entries.len());
        }
    }
}
