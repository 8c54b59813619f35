//! This module implements word placement using a depth-first backtracking search. Required words
//! are placed longest-first, each one trying the ranked candidates from `candidates.rs` in order and
//! undoing the previous choice when it runs out; optional words are then woven in greedily without
//! backtracking. Several independently-seeded attempts can run side by side, and the best
//! successful one wins.

use log::{debug, trace, warn};
use rand::prelude::*;
use rand::rngs::SmallRng;
use std::cmp::Reverse;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

#[cfg(feature = "serde")]
use serde_derive::Serialize;

use crate::candidates::{generate_candidates, Candidate};
use crate::errors::GenerationError;
use crate::grid::{Grid, Placement};
use crate::layout_config::LayoutConfig;
use crate::scorer::LayoutScore;
use crate::types::WordId;
use crate::word_list::{normalize_word, WordEntry};

/// How many times should we loop before checking whether we've passed our deadline or been asked
/// to stop?
pub const INTERRUPT_FREQUENCY: usize = 10;

/// How much do we increase the backtrack limit for each successive attempt?
pub const RETRY_GROWTH_FACTOR: f32 = 1.1;

/// A struct tracking stats about a single search attempt.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Statistics {
    pub states: usize,
    pub backtracks: usize,
    pub placements: usize,
    /// The most required words that were in the grid at the same time.
    pub max_required_placed: usize,
    pub optional_passes: usize,
    pub total_time: Duration,
}

/// A validated word, ready to be placed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchWord {
    /// The index of the entry this word came from.
    pub id: WordId,
    pub text: String,
    pub letters: Vec<char>,
    pub required: bool,
}

/// Validate and normalize the entries to lay out. Entries that are blank after normalization are
/// dropped, and repeated words are merged into one: the first required occurrence if there is
/// one, otherwise the first occurrence.
pub fn prepare_words(entries: &[WordEntry]) -> Result<Vec<SearchWord>, GenerationError> {
    let mut words: Vec<SearchWord> = Vec::with_capacity(entries.len());

    for (id, entry) in entries.iter().enumerate() {
        let text = normalize_word(&entry.text);

        if text.is_empty() {
            warn!("Ignoring blank word (hint: {:?})", entry.hint);
            continue;
        }

        if let Some(invalid_char) = text.chars().find(|c| !c.is_alphabetic()) {
            return Err(GenerationError::InvalidWordCharacters {
                word: entry.text.clone(),
                invalid_char,
            });
        }

        if let Some(existing) = words.iter_mut().find(|word| word.text == text) {
            debug!("Merging repeated word {text}");
            // A required repeat of an optional word takes its place, hint and all.
            if entry.required && !existing.required {
                existing.id = id;
                existing.required = true;
            }
            continue;
        }

        words.push(SearchWord {
            id,
            letters: text.chars().collect(),
            text,
            required: entry.required,
        });
    }

    if words.is_empty() {
        return Err(GenerationError::EmptyWordList);
    }

    Ok(words)
}

/// The side length the original square-grid generator starts from: enough for the longest word,
/// and for all of the letters packed into a square with a little slack.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn suggested_extent(words: &[SearchWord]) -> usize {
    let longest = words.iter().map(|word| word.letters.len()).max().unwrap_or(0);
    let total: usize = words.iter().map(|word| word.letters.len()).sum();

    longest.max(((total as f64).sqrt() + 1.0).round() as usize)
}

/// Split the words into the order we'll place them in: required words by descending length, then
/// optional words in input order. Each list holds indices into `words`. If `rng` is given,
/// required words of the same length are shuffled instead of staying in input order.
#[must_use]
pub fn order_words(
    words: &[SearchWord],
    rng: Option<&mut SmallRng>,
) -> (Vec<usize>, Vec<usize>) {
    let mut required: Vec<usize> = (0..words.len()).filter(|&idx| words[idx].required).collect();
    let optional: Vec<usize> = (0..words.len()).filter(|&idx| !words[idx].required).collect();

    if let Some(rng) = rng {
        required.shuffle(rng);
    }
    required.sort_by_key(|&idx| Reverse(words[idx].letters.len()));

    (required, optional)
}

/// Everything one search attempt owns: the grid, the placements made so far (oldest first), and
/// the words that haven't been placed.
#[derive(Debug, Clone)]
pub struct PuzzleState {
    pub grid: Grid,
    pub placements: Vec<Placement>,
    pub unplaced: BTreeSet<WordId>,
    pub skipped: Vec<WordId>,
}

impl PuzzleState {
    #[must_use]
    pub fn new(max_extent: Option<usize>, words: &[SearchWord]) -> PuzzleState {
        PuzzleState {
            grid: Grid::new(max_extent),
            placements: vec![],
            unplaced: words.iter().map(|word| word.id).collect(),
            skipped: vec![],
        }
    }

    fn apply(&mut self, word: &SearchWord, candidate: &Candidate) {
        let placement = self.grid.place(
            word.id,
            &word.letters,
            candidate.anchor,
            candidate.direction,
        );
        self.unplaced.remove(&word.id);
        self.placements.push(placement);
    }

    fn revert_last(&mut self) -> Option<Placement> {
        let placement = self.placements.pop()?;
        self.grid.remove(&placement);
        self.unplaced.insert(placement.word_id);
        Some(placement)
    }
}

/// The states of the required-word search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchState {
    /// Try candidate `cursor` for the word at `word_index` in the placement order.
    Searching { word_index: usize, cursor: usize },
    /// The last word ran out of candidates; undo the one before it.
    Backtracked,
    Success,
    Failed,
}

/// The ranked candidates for one word on the search stack, and how far through them we are.
struct Frame {
    candidates: Vec<Candidate>,
    cursor: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchFailure {
    /// Every branch was explored without placing all required words.
    HardFailure,
    Timeout,
    Abort,
    ExceededBacktrackLimit(usize),
}

/// Anything that can cut an attempt short.
struct Interrupts<'a> {
    deadline: Option<Instant>,
    cancel: &'a AtomicBool,
    abort: Option<&'a AtomicBool>,
}

impl Interrupts<'_> {
    fn check(&self) -> Option<SearchFailure> {
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Some(SearchFailure::Timeout);
        }
        if self.cancel.load(Ordering::Relaxed)
            || self.abort.is_some_and(|abort| abort.load(Ordering::Relaxed))
        {
            return Some(SearchFailure::Abort);
        }
        None
    }
}

/// A successful attempt: every required word is in the grid.
#[derive(Debug, Clone)]
pub struct AttemptSuccess {
    pub state: PuzzleState,
    pub statistics: Statistics,
    /// Did we stop trying optional words because of the time budget or a cancellation?
    pub budget_exceeded: bool,
}

/// A failed attempt, along with the word it got stuck on at its deepest point.
#[derive(Debug, Clone)]
pub struct AttemptFailure {
    pub reason: SearchFailure,
    pub statistics: Statistics,
    pub blocking_word: WordId,
}

/// Run a single search attempt. Attempts with the same words, seed, and budget always produce the
/// same layout, unless they're interrupted.
fn find_layout_for_seed(
    words: &[SearchWord],
    max_extent: Option<usize>,
    max_backtracks: usize,
    mut rng: Option<SmallRng>,
    interrupts: &Interrupts,
) -> Result<AttemptSuccess, AttemptFailure> {
    let start = Instant::now();
    let mut statistics = Statistics::default();

    let (required_queue, optional_queue) = order_words(words, rng.as_mut());
    let mut state = PuzzleState::new(max_extent, words);
    let mut frames: Vec<Frame> = Vec::with_capacity(required_queue.len());

    let fail = |reason: SearchFailure, statistics: Statistics| {
        let stuck_idx = statistics
            .max_required_placed
            .min(required_queue.len().saturating_sub(1));
        AttemptFailure {
            reason,
            blocking_word: required_queue
                .get(stuck_idx)
                .map_or(0, |&word_idx| words[word_idx].id),
            statistics,
        }
    };

    // Place the required words. Invariant: while at `Searching { word_index, .. }`, exactly
    // `word_index` placements are in the grid, one for each frame below the current one.
    let mut search_state = SearchState::Searching {
        word_index: 0,
        cursor: 0,
    };
    loop {
        statistics.states += 1;

        if statistics.states % INTERRUPT_FREQUENCY == 0 {
            if let Some(reason) = interrupts.check() {
                statistics.total_time = start.elapsed();
                return Err(fail(reason, statistics));
            }
        }

        search_state = match search_state {
            SearchState::Searching { word_index, .. } if word_index == required_queue.len() => {
                SearchState::Success
            }

            SearchState::Searching { word_index, cursor } => {
                let word = &words[required_queue[word_index]];

                if frames.len() == word_index {
                    frames.push(Frame {
                        candidates: generate_candidates(&state.grid, &word.letters, rng.as_mut()),
                        cursor: 0,
                    });
                }

                let frame = &mut frames[word_index];
                match frame.candidates.get(cursor) {
                    Some(candidate) => {
                        trace!(
                            "Placing {} {:?} at {:?} (candidate {cursor} of {})",
                            word.text,
                            candidate.direction,
                            candidate.anchor,
                            frame.candidates.len()
                        );
                        state.apply(word, candidate);
                        frame.cursor = cursor + 1;
                        statistics.placements += 1;
                        statistics.max_required_placed =
                            statistics.max_required_placed.max(word_index + 1);

                        SearchState::Searching {
                            word_index: word_index + 1,
                            cursor: 0,
                        }
                    }
                    None => {
                        trace!("No candidates left for {}", word.text);
                        frames.pop();
                        SearchState::Backtracked
                    }
                }
            }

            SearchState::Backtracked => {
                statistics.backtracks += 1;

                if statistics.backtracks > max_backtracks {
                    statistics.total_time = start.elapsed();
                    return Err(fail(
                        SearchFailure::ExceededBacktrackLimit(statistics.backtracks),
                        statistics,
                    ));
                }

                match frames.last() {
                    Some(frame) => {
                        if let Some(placement) = state.revert_last() {
                            trace!("Backtracking from {}", words_text(words, placement.word_id));
                        }
                        SearchState::Searching {
                            word_index: frames.len() - 1,
                            cursor: frame.cursor,
                        }
                    }
                    None => SearchState::Failed,
                }
            }

            SearchState::Success => break,

            SearchState::Failed => {
                statistics.total_time = start.elapsed();
                return Err(fail(SearchFailure::HardFailure, statistics));
            }
        };
    }

    // Now weave in the optional words. A word that doesn't fit is set aside and retried after the
    // rest, since later words can create new crossings; we stop once a pass makes no progress.
    let mut pending: Vec<usize> = optional_queue;
    let mut budget_exceeded = false;

    while !pending.is_empty() && !state.grid.is_empty() {
        let mut still_pending: Vec<usize> = vec![];
        let placed_before = state.placements.len();
        statistics.optional_passes += 1;

        for (queue_idx, &word_idx) in pending.iter().enumerate() {
            statistics.states += 1;

            if interrupts.check().is_some() {
                budget_exceeded = true;
                still_pending.extend_from_slice(&pending[queue_idx..]);
                break;
            }

            let word = &words[word_idx];
            let candidates = generate_candidates(&state.grid, &word.letters, rng.as_mut());
            match candidates.first() {
                Some(candidate) => {
                    trace!(
                        "Placing optional {} {:?} at {:?}",
                        word.text,
                        candidate.direction,
                        candidate.anchor
                    );
                    state.apply(word, candidate);
                    statistics.placements += 1;
                }
                None => still_pending.push(word_idx),
            }
        }

        pending = still_pending;
        if budget_exceeded || state.placements.len() == placed_before {
            break;
        }
    }

    state.skipped = pending.into_iter().map(|word_idx| words[word_idx].id).collect();
    statistics.total_time = start.elapsed();

    Ok(AttemptSuccess {
        state,
        statistics,
        budget_exceeded,
    })
}

fn words_text(words: &[SearchWord], word_id: WordId) -> &str {
    words
        .iter()
        .find(|word| word.id == word_id)
        .map_or("?", |word| word.text.as_str())
}

/// The outcome of one attempt, tagged with its index and seed.
#[derive(Debug, Clone)]
pub struct Attempt {
    pub index: usize,
    pub seed: u64,
    pub result: Result<AttemptSuccess, AttemptFailure>,
}

/// The best layout found across all attempts.
#[derive(Debug, Clone)]
pub struct LayoutSuccess {
    pub state: PuzzleState,
    pub score: LayoutScore,
    pub statistics: Statistics,
    pub budget_exceeded: bool,
    pub attempt_index: usize,
    pub seed: u64,
    pub attempts_run: usize,
}

/// Why no attempt succeeded, taken from the attempt that got furthest.
#[derive(Debug, Clone)]
pub struct LayoutFailure {
    pub reason: SearchFailure,
    pub blocking_word: WordId,
    pub required_placed: usize,
    pub statistics: Statistics,
    pub attempts_run: usize,
}

/// The backtrack budget for the attempt with the given index.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn attempt_backtrack_limit(base: usize, attempt_idx: usize) -> usize {
    let mut max_backtracks = base;
    for _ in 0..attempt_idx {
        // Ensure that we always increase `max_backtracks` by at least 1.
        max_backtracks =
            (max_backtracks + 1).max((max_backtracks as f32 * RETRY_GROWTH_FACTOR) as usize);
    }
    max_backtracks
}

/// Run `config.attempts` independent attempts (in parallel if configured) and return the best
/// successful layout, or the most informative failure if none succeeded. The attempts share a
/// deadline of `config.timeout` from now.
pub fn find_layout(
    words: &[SearchWord],
    config: &LayoutConfig,
) -> Result<LayoutSuccess, LayoutFailure> {
    find_layout_until(words, config, config.deadline_from(Instant::now()))
}

/// Like `find_layout`, but stop at an absolute `deadline` (if any) instead of one derived from
/// `config.timeout`, so that several searches can share one budget.
pub fn find_layout_until(
    words: &[SearchWord],
    config: &LayoutConfig,
    deadline: Option<Instant>,
) -> Result<LayoutSuccess, LayoutFailure> {
    let attempt_count = config.attempts.max(1);
    let cancel = AtomicBool::new(false);

    let run_attempt = |attempt_idx: usize| -> Attempt {
        let seed = config.attempt_seed(attempt_idx);
        let interrupts = Interrupts {
            deadline,
            cancel: &cancel,
            abort: config.abort.as_deref(),
        };

        // The first attempt keeps the input order and discovery order as-is, so that a single
        // attempt is reproducible without reference to any seed.
        let rng = (attempt_idx > 0).then(|| SmallRng::seed_from_u64(seed));

        let result = find_layout_for_seed(
            words,
            config.max_extent,
            attempt_backtrack_limit(config.max_backtracks, attempt_idx),
            rng,
            &interrupts,
        );

        match &result {
            Ok(success) => {
                let score = LayoutScore::of(&success.state.grid);
                debug!(
                    "Attempt {attempt_idx} (seed {seed}) succeeded: {score:?}, {:?}",
                    success.statistics
                );
                if config
                    .quality_threshold
                    .is_some_and(|threshold| score.meets_threshold(threshold))
                {
                    debug!("Attempt {attempt_idx} meets the quality threshold; canceling the rest");
                    cancel.store(true, Ordering::Relaxed);
                }
            }
            Err(failure) => {
                debug!(
                    "Attempt {attempt_idx} (seed {seed}) failed: {:?}, {:?}",
                    failure.reason, failure.statistics
                );
            }
        }

        Attempt {
            index: attempt_idx,
            seed,
            result,
        }
    };

    let mut attempts: Vec<Attempt> = if config.parallel && attempt_count > 1 {
        thread::scope(|scope| {
            let (tx, rx) = mpsc::channel();
            let run_attempt = &run_attempt;

            for attempt_idx in 0..attempt_count {
                let worker_tx = tx.clone();
                let spawned = thread::Builder::new()
                    .name(format!("layout-attempt-{attempt_idx}"))
                    .spawn_scoped(scope, move || {
                        let _ = worker_tx.send(run_attempt(attempt_idx));
                    });

                if let Err(error) = spawned {
                    warn!("Couldn't spawn a thread for attempt {attempt_idx} ({error}); running it inline");
                    let _ = tx.send(run_attempt(attempt_idx));
                }
            }

            drop(tx);
            rx.into_iter().collect()
        })
    } else {
        let mut attempts = Vec::with_capacity(attempt_count);
        for attempt_idx in 0..attempt_count {
            if attempt_idx > 0 && cancel.load(Ordering::Relaxed) {
                break;
            }
            attempts.push(run_attempt(attempt_idx));
        }
        attempts
    };

    attempts.sort_by_key(|attempt| attempt.index);
    select_best_attempt(attempts)
}

/// Pick the best-ranked successful attempt (ties go to the lowest index), or, if every attempt
/// failed, the failure from the attempt that placed the most required words.
fn select_best_attempt(attempts: Vec<Attempt>) -> Result<LayoutSuccess, LayoutFailure> {
    let attempts_run = attempts.len();
    let mut best_success: Option<LayoutSuccess> = None;
    let mut best_failure: Option<LayoutFailure> = None;

    for Attempt {
        index,
        seed,
        result,
    } in attempts
    {
        match result {
            Ok(success) => {
                let score = LayoutScore::of(&success.state.grid);
                if best_success
                    .as_ref()
                    .map_or(true, |best| score.compare(&best.score).is_lt())
                {
                    best_success = Some(LayoutSuccess {
                        state: success.state,
                        score,
                        statistics: success.statistics,
                        budget_exceeded: success.budget_exceeded,
                        attempt_index: index,
                        seed,
                        attempts_run,
                    });
                }
            }
            Err(failure) => {
                let required_placed = failure.statistics.max_required_placed;
                if best_failure
                    .as_ref()
                    .map_or(true, |best| required_placed > best.required_placed)
                {
                    best_failure = Some(LayoutFailure {
                        reason: failure.reason,
                        blocking_word: failure.blocking_word,
                        required_placed,
                        statistics: failure.statistics,
                        attempts_run,
                    });
                }
            }
        }
    }

    match (best_success, best_failure) {
        (Some(success), _) => Ok(success),
        (None, Some(failure)) => Err(failure),
        (None, None) => unreachable!("find_layout always runs at least one attempt"),
    }
}
