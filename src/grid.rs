//! This module implements the sparse letter grid that words are laid out on. All letters live here;
//! the search only changes the grid through `place` and `remove`, and only after `can_place` has
//! approved the placement for the current grid state.

use smallvec::{smallvec, SmallVec};
use std::collections::BTreeMap;
use std::fmt;

#[cfg(feature = "serde")]
use serde_derive::{Deserialize, Serialize};

use crate::types::{GridCoord, PlacementId, WordId};
use crate::CHECK_INVARIANTS;

/// The direction that a placed word runs in.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Direction {
    Across,
    Down,
}

impl Direction {
    pub const ALL: [Direction; 2] = [Direction::Across, Direction::Down];

    #[must_use]
    pub fn perpendicular(self) -> Direction {
        match self {
            Direction::Across => Direction::Down,
            Direction::Down => Direction::Across,
        }
    }

    /// The (row, col) offset between consecutive letters of a word running in this direction.
    #[must_use]
    pub fn delta(self) -> (isize, isize) {
        match self {
            Direction::Across => (0, 1),
            Direction::Down => (1, 0),
        }
    }
}

/// Move `distance` cells away from `coord` along `direction` (backwards if negative).
#[must_use]
pub fn step(coord: GridCoord, direction: Direction, distance: isize) -> GridCoord {
    let (d_row, d_col) = direction.delta();
    (coord.0 + d_row * distance, coord.1 + d_col * distance)
}

/// Generate the coords for each cell of a word of the given length.
#[must_use]
pub fn cell_coords(anchor: GridCoord, direction: Direction, length: usize) -> Vec<GridCoord> {
    (0..length)
        .map(|cell_idx| step(anchor, direction, cell_idx as isize))
        .collect()
}

/// The smallest rectangle enclosing a set of cells, with inclusive bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BoundingBox {
    pub min_row: isize,
    pub max_row: isize,
    pub min_col: isize,
    pub max_col: isize,
}

impl BoundingBox {
    #[must_use]
    pub fn around(coord: GridCoord) -> BoundingBox {
        BoundingBox {
            min_row: coord.0,
            max_row: coord.0,
            min_col: coord.1,
            max_col: coord.1,
        }
    }

    /// Grow the box (if needed) so that it contains `coord`.
    #[must_use]
    pub fn including(self, coord: GridCoord) -> BoundingBox {
        BoundingBox {
            min_row: self.min_row.min(coord.0),
            max_row: self.max_row.max(coord.0),
            min_col: self.min_col.min(coord.1),
            max_col: self.max_col.max(coord.1),
        }
    }

    #[must_use]
    pub fn height(&self) -> usize {
        (self.max_row - self.min_row + 1) as usize
    }

    #[must_use]
    pub fn width(&self) -> usize {
        (self.max_col - self.min_col + 1) as usize
    }

    #[must_use]
    pub fn area(&self) -> usize {
        self.width() * self.height()
    }
}

/// Extend an optional bounding box to cover `coord`.
fn grow_bounds(bounds: Option<BoundingBox>, coord: GridCoord) -> BoundingBox {
    match bounds {
        Some(bounds) => bounds.including(coord),
        None => BoundingBox::around(coord),
    }
}

/// A single populated cell. Every placement listed here wrote the same letter into the cell.
#[derive(Debug, Clone)]
pub struct Cell {
    pub letter: char,

    /// The placements covering this cell, along with the direction each one runs in. A cell can be
    /// covered by at most one placement per direction.
    pub placements: SmallVec<[(PlacementId, Direction); 2]>,
}

impl Cell {
    /// Is this cell shared by two crossing words?
    #[must_use]
    pub fn is_intersection(&self) -> bool {
        self.placements.len() > 1
    }
}

/// A word that has been written into the grid.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Placement {
    pub id: PlacementId,
    pub word_id: WordId,
    pub anchor: GridCoord,
    pub direction: Direction,

    /// The covered cells, in the order of the word's letters.
    pub cells: Vec<GridCoord>,
}

/// The reason a word can't be placed at a given anchor and direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlacementConflict {
    EmptyWord,

    /// An existing letter differs from the word's letter in the same cell.
    LetterMismatch {
        coord: GridCoord,
        existing: char,
        attempted: char,
    },

    /// The word would share a cell with another word running in the same direction.
    ParallelOverlap { coord: GridCoord },

    /// A newly-written cell would sit directly beside an existing letter.
    AdjacentCell { coord: GridCoord },

    /// The cell just before the first letter or just after the last one is occupied.
    EndpointOccupied { coord: GridCoord },

    /// The layout would grow beyond the configured maximum extent.
    ExceedsExtent {
        width: usize,
        height: usize,
        max_extent: usize,
    },
}

impl fmt::Display for PlacementConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlacementConflict::EmptyWord => write!(f, "word is empty"),
            PlacementConflict::LetterMismatch {
                coord,
                existing,
                attempted,
            } => write!(
                f,
                "cell {coord:?} holds '{existing}' but the word needs '{attempted}'"
            ),
            PlacementConflict::ParallelOverlap { coord } => {
                write!(f, "cell {coord:?} is already used by a word in the same direction")
            }
            PlacementConflict::AdjacentCell { coord } => {
                write!(f, "new letter would touch the existing letter at {coord:?}")
            }
            PlacementConflict::EndpointOccupied { coord } => {
                write!(f, "word would run into the existing letter at {coord:?}")
            }
            PlacementConflict::ExceedsExtent {
                width,
                height,
                max_extent,
            } => write!(
                f,
                "layout would grow to {width}x{height}, beyond the maximum extent of {max_extent}"
            ),
        }
    }
}

/// A sparse grid of letters, with a running bounding box.
#[derive(Debug, Clone, Default)]
pub struct Grid {
    cells: BTreeMap<GridCoord, Cell>,
    bounds: Option<BoundingBox>,
    max_extent: Option<usize>,
    next_placement_id: PlacementId,

    /// Live placements in the order they were made, along with the bounding box from just before
    /// each one so that last-in-first-out removal can restore it directly:
    /// * `Some(bounds)` is the saved bounding box (`Some(None)` meaning the grid was empty)
    /// * `None` means the saved value went stale after an out-of-order removal and has to be
    ///   recomputed
    history: Vec<(PlacementId, Option<Option<BoundingBox>>)>,
}

impl Grid {
    #[must_use]
    pub fn new(max_extent: Option<usize>) -> Grid {
        Grid {
            max_extent,
            ..Grid::default()
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    #[must_use]
    pub fn max_extent(&self) -> Option<usize> {
        self.max_extent
    }

    #[must_use]
    pub fn cell(&self, coord: GridCoord) -> Option<&Cell> {
        self.cells.get(&coord)
    }

    #[must_use]
    pub fn letter_at(&self, coord: GridCoord) -> Option<char> {
        self.cells.get(&coord).map(|cell| cell.letter)
    }

    #[must_use]
    pub fn is_occupied(&self, coord: GridCoord) -> bool {
        self.cells.contains_key(&coord)
    }

    /// All populated cells, in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (&GridCoord, &Cell)> {
        self.cells.iter()
    }

    #[must_use]
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        self.bounds
    }

    /// The area of the bounding box, or zero for an empty grid.
    #[must_use]
    pub fn area(&self) -> usize {
        self.bounds.map_or(0, |bounds| bounds.area())
    }

    #[must_use]
    pub fn filled_cell_count(&self) -> usize {
        self.cells.len()
    }

    /// The number of cells shared by two placements.
    #[must_use]
    pub fn intersection_count(&self) -> usize {
        self.cells.values().filter(|cell| cell.is_intersection()).count()
    }

    #[must_use]
    pub fn placement_count(&self) -> usize {
        self.history.len()
    }

    /// Check whether `word` could be written starting at `anchor` without breaking any of the
    /// layout rules. See `PlacementConflict` for the possible reasons it can't.
    pub fn can_place(
        &self,
        word: &[char],
        anchor: GridCoord,
        direction: Direction,
    ) -> Result<(), PlacementConflict> {
        if word.is_empty() {
            return Err(PlacementConflict::EmptyWord);
        }

        for coord in [
            step(anchor, direction, -1),
            step(anchor, direction, word.len() as isize),
        ] {
            if self.is_occupied(coord) {
                return Err(PlacementConflict::EndpointOccupied { coord });
            }
        }

        let perpendicular = direction.perpendicular();
        let mut bounds = self.bounds;

        for (cell_idx, &letter) in word.iter().enumerate() {
            let coord = step(anchor, direction, cell_idx as isize);

            match self.cells.get(&coord) {
                Some(cell) => {
                    if cell.letter != letter {
                        return Err(PlacementConflict::LetterMismatch {
                            coord,
                            existing: cell.letter,
                            attempted: letter,
                        });
                    }
                    if cell.placements.iter().any(|&(_, dir)| dir == direction) {
                        return Err(PlacementConflict::ParallelOverlap { coord });
                    }
                }
                None => {
                    for side in [-1, 1] {
                        let neighbor = step(coord, perpendicular, side);
                        if self.is_occupied(neighbor) {
                            return Err(PlacementConflict::AdjacentCell { coord: neighbor });
                        }
                    }
                }
            }

            bounds = Some(grow_bounds(bounds, coord));
        }

        if let (Some(max_extent), Some(bounds)) = (self.max_extent, bounds) {
            if bounds.width() > max_extent || bounds.height() > max_extent {
                return Err(PlacementConflict::ExceedsExtent {
                    width: bounds.width(),
                    height: bounds.height(),
                    max_extent,
                });
            }
        }

        Ok(())
    }

    /// The bounding-box area the grid would have after writing a word of `length` at `anchor`.
    #[must_use]
    pub fn area_if_placed(&self, anchor: GridCoord, direction: Direction, length: usize) -> usize {
        if length == 0 {
            return self.area();
        }
        let first = grow_bounds(self.bounds, anchor);
        first
            .including(step(anchor, direction, length as isize - 1))
            .area()
    }

    /// Write a word into the grid. Only valid if `can_place` approved the same placement against
    /// the current grid state.
    pub fn place(
        &mut self,
        word_id: WordId,
        word: &[char],
        anchor: GridCoord,
        direction: Direction,
    ) -> Placement {
        if CHECK_INVARIANTS {
            if let Err(conflict) = self.can_place(word, anchor, direction) {
                panic!("Placing a word that conflicts with the grid: {conflict}");
            }
        }

        let id = self.next_placement_id;
        self.next_placement_id += 1;
        self.history.push((id, Some(self.bounds)));

        let cells = cell_coords(anchor, direction, word.len());
        for (&coord, &letter) in cells.iter().zip(word) {
            self.cells
                .entry(coord)
                .or_insert_with(|| Cell {
                    letter,
                    placements: smallvec![],
                })
                .placements
                .push((id, direction));
            self.bounds = Some(grow_bounds(self.bounds, coord));
        }

        Placement {
            id,
            word_id,
            anchor,
            direction,
            cells,
        }
    }

    /// Undo a single placement. Cells shared with other placements keep their letter.
    pub fn remove(&mut self, placement: &Placement) {
        let Some(history_idx) = self
            .history
            .iter()
            .rposition(|&(id, _)| id == placement.id)
        else {
            if CHECK_INVARIANTS {
                panic!("Removing a placement that isn't in the grid: {placement:?}");
            }
            return;
        };

        for coord in &placement.cells {
            if let Some(cell) = self.cells.get_mut(coord) {
                cell.placements.retain(|&mut (id, _)| id != placement.id);
                if cell.placements.is_empty() {
                    self.cells.remove(coord);
                }
            }
        }

        let (_, saved_bounds) = self.history.remove(history_idx);

        if history_idx == self.history.len() {
            self.bounds = saved_bounds.unwrap_or_else(|| self.compute_bounds());
        } else {
            // Every later placement saved a box that may include the cells we just cleared.
            for entry in &mut self.history[history_idx..] {
                entry.1 = None;
            }
            self.bounds = self.compute_bounds();
        }

        if CHECK_INVARIANTS && self.bounds != self.compute_bounds() {
            panic!("Bounding box out of sync after removing {placement:?}");
        }
    }

    fn compute_bounds(&self) -> Option<BoundingBox> {
        self.cells
            .keys()
            .fold(None, |bounds, &coord| Some(grow_bounds(bounds, coord)))
    }

    /// Read the letters along a placement's cells, in order.
    #[must_use]
    pub fn read_placement(&self, placement: &Placement) -> String {
        placement
            .cells
            .iter()
            .map(|&coord| self.letter_at(coord).unwrap_or(' '))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(word: &str) -> Vec<char> {
        word.chars().collect()
    }

    #[test]
    fn test_first_word_can_go_anywhere() {
        let grid = Grid::new(None);
        assert_eq!(grid.can_place(&chars("DOG"), (0, 0), Direction::Across), Ok(()));
        assert_eq!(grid.can_place(&chars("DOG"), (-4, 7), Direction::Down), Ok(()));
    }

    #[test]
    fn test_adjacent_parallel_word_is_rejected() {
        let mut grid = Grid::new(None);
        grid.place(0, &chars("DOG"), (0, 0), Direction::Across);

        assert_eq!(
            grid.can_place(&chars("DOT"), (1, 0), Direction::Across),
            Err(PlacementConflict::AdjacentCell { coord: (0, 0) })
        );
    }

    #[test]
    fn test_crossing_word_shares_letter() {
        let mut grid = Grid::new(None);
        grid.place(0, &chars("CAT"), (0, 0), Direction::Across);

        assert_eq!(grid.can_place(&chars("CAR"), (0, 0), Direction::Down), Ok(()));
        assert_eq!(grid.can_place(&chars("ART"), (0, 1), Direction::Down), Ok(()));
        assert_eq!(
            grid.can_place(&chars("DOG"), (0, 0), Direction::Down),
            Err(PlacementConflict::LetterMismatch {
                coord: (0, 0),
                existing: 'C',
                attempted: 'D',
            })
        );
    }

    #[test]
    fn test_overlapping_same_direction_is_rejected() {
        let mut grid = Grid::new(None);
        grid.place(0, &chars("CATS"), (0, 0), Direction::Across);

        // Fully contained in CATS, but the cells before/after are occupied or the overlap runs the
        // same way.
        assert!(grid.can_place(&chars("CAT"), (0, 0), Direction::Across).is_err());
        assert_eq!(
            grid.can_place(&chars("CATS"), (0, 0), Direction::Across),
            Err(PlacementConflict::ParallelOverlap { coord: (0, 0) })
        );
    }

    #[test]
    fn test_word_may_not_run_into_existing_letter() {
        let mut grid = Grid::new(None);
        grid.place(0, &chars("CAT"), (0, 0), Direction::Across);

        assert_eq!(
            grid.can_place(&chars("DOG"), (0, 3), Direction::Across),
            Err(PlacementConflict::EndpointOccupied { coord: (0, 2) })
        );
        assert_eq!(
            grid.can_place(&chars("DOG"), (-3, 0), Direction::Down),
            Err(PlacementConflict::EndpointOccupied { coord: (0, 0) })
        );
    }

    #[test]
    fn test_max_extent_is_enforced() {
        let grid = Grid::new(Some(4));
        assert_eq!(grid.can_place(&chars("LONG"), (0, 0), Direction::Across), Ok(()));
        assert_eq!(
            grid.can_place(&chars("LONGER"), (0, 0), Direction::Across),
            Err(PlacementConflict::ExceedsExtent {
                width: 6,
                height: 1,
                max_extent: 4,
            })
        );
    }

    #[test]
    fn test_place_and_remove_shared_cell() {
        let mut grid = Grid::new(None);
        let cat = grid.place(0, &chars("CAT"), (0, 0), Direction::Across);
        let car = grid.place(1, &chars("CAR"), (0, 0), Direction::Down);

        assert_eq!(grid.intersection_count(), 1);
        assert_eq!(grid.filled_cell_count(), 5);
        assert_eq!(grid.read_placement(&cat), "CAT");
        assert_eq!(grid.read_placement(&car), "CAR");
        assert_eq!(grid.area(), 9);

        grid.remove(&car);

        assert_eq!(grid.letter_at((0, 0)), Some('C'));
        assert_eq!(grid.letter_at((1, 0)), None);
        assert_eq!(grid.intersection_count(), 0);
        assert_eq!(grid.bounding_box(), Some(BoundingBox::around((0, 0)).including((0, 2))));

        grid.remove(&cat);

        assert!(grid.is_empty());
        assert_eq!(grid.bounding_box(), None);
    }

    #[test]
    fn test_out_of_order_removal_tightens_bounds() {
        let mut grid = Grid::new(None);
        let cat = grid.place(0, &chars("CAT"), (0, 0), Direction::Across);
        let car = grid.place(1, &chars("CAR"), (0, 0), Direction::Down);
        let tea = grid.place(2, &chars("TEA"), (0, 2), Direction::Down);

        grid.remove(&car);
        assert_eq!(grid.bounding_box(), Some(BoundingBox::around((0, 0)).including((2, 2))));

        grid.remove(&tea);
        assert_eq!(grid.bounding_box(), Some(BoundingBox::around((0, 0)).including((0, 2))));

        grid.remove(&cat);
        assert_eq!(grid.bounding_box(), None);
    }

    #[test]
    fn test_area_if_placed() {
        let mut grid = Grid::new(None);
        assert_eq!(grid.area_if_placed((0, 0), Direction::Across, 3), 3);

        grid.place(0, &chars("CAT"), (0, 0), Direction::Across);
        assert_eq!(grid.area_if_placed((0, 1), Direction::Down, 3), 9);
        assert_eq!(grid.area_if_placed((-2, 2), Direction::Down, 3), 9);
        assert_eq!(grid.area_if_placed((-1, 0), Direction::Down, 2), 6);
    }
}
