//! Candidate generation: given a word and the current grid, find every anchor and direction where
//! the word crosses at least one existing letter without breaking the layout rules, best first.

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use std::cmp::Reverse;
use std::collections::HashSet;

use crate::grid::{step, Direction, Grid};
use crate::types::GridCoord;

/// Where the first word of every layout goes.
pub const ORIGIN: GridCoord = (0, 0);

/// A legal position for a word, along with the measurements it was ranked by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub anchor: GridCoord,
    pub direction: Direction,

    /// How many of the word's cells would be shared with words already in the grid.
    pub intersections: usize,

    /// How much the bounding-box area would grow.
    pub area_growth: usize,
}

/// List the legal placements for `word`, ordered by descending intersection count, then ascending
/// area growth, then the order they were discovered in. If `rng` is given, the discovery order is
/// shuffled first so that equally-ranked candidates come out in a different order for each seed.
///
/// On an empty grid, the only candidate is across at `ORIGIN` (if the word fits at all).
pub fn generate_candidates(
    grid: &Grid,
    word: &[char],
    rng: Option<&mut SmallRng>,
) -> Vec<Candidate> {
    if grid.is_empty() {
        return match grid.can_place(word, ORIGIN, Direction::Across) {
            Ok(()) => vec![Candidate {
                anchor: ORIGIN,
                direction: Direction::Across,
                intersections: 0,
                area_growth: grid.area_if_placed(ORIGIN, Direction::Across, word.len()),
            }],
            Err(_) => vec![],
        };
    }

    let current_area = grid.area();
    let mut seen: HashSet<(GridCoord, Direction)> = HashSet::new();
    let mut candidates: Vec<Candidate> = vec![];

    // Every candidate has to line up one of the word's letters with a matching letter that's
    // already in the grid, so we only need to look at anchors derived from those pairs.
    for (&coord, cell) in grid.cells() {
        for (letter_idx, _) in word
            .iter()
            .enumerate()
            .filter(|&(_, &letter)| letter == cell.letter)
        {
            for direction in Direction::ALL {
                if cell.placements.iter().any(|&(_, dir)| dir == direction) {
                    continue;
                }

                let anchor = step(coord, direction, -(letter_idx as isize));
                if !seen.insert((anchor, direction)) {
                    continue;
                }
                if grid.can_place(word, anchor, direction).is_err() {
                    continue;
                }

                let intersections = (0..word.len())
                    .filter(|&cell_idx| grid.is_occupied(step(anchor, direction, cell_idx as isize)))
                    .count();

                candidates.push(Candidate {
                    anchor,
                    direction,
                    intersections,
                    area_growth: grid.area_if_placed(anchor, direction, word.len()) - current_area,
                });
            }
        }
    }

    if let Some(rng) = rng {
        candidates.shuffle(rng);
    }

    // `sort_by_key` is stable, so ties stay in discovery order.
    candidates.sort_by_key(|candidate| (Reverse(candidate.intersections), candidate.area_growth));

    candidates
}
