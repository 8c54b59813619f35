//! Layout quality metrics, used to pick a winner among independent search attempts.

use float_ord::FloatOrd;
use std::cmp::{Ordering, Reverse};

#[cfg(feature = "serde")]
use serde_derive::Serialize;

use crate::grid::Grid;

/// Measurements of a finished (or abandoned) layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct LayoutScore {
    /// Cells shared by two words.
    pub intersections: usize,

    /// Area of the bounding box.
    pub area: usize,

    /// Number of words in the layout.
    pub words_placed: usize,

    /// Number of cells holding a letter.
    pub filled_cells: usize,
}

impl LayoutScore {
    #[must_use]
    pub fn of(grid: &Grid) -> LayoutScore {
        LayoutScore {
            intersections: grid.intersection_count(),
            area: grid.area(),
            words_placed: grid.placement_count(),
            filled_cells: grid.filled_cell_count(),
        }
    }

    /// The share of the bounding box that's covered by letters, from 0.0 to 1.0.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn density(&self) -> f32 {
        if self.area == 0 {
            0.0
        } else {
            self.filled_cells as f32 / self.area as f32
        }
    }

    /// Is this layout good enough that there's no point in waiting for other attempts?
    #[must_use]
    pub fn meets_threshold(&self, threshold: f32) -> bool {
        FloatOrd(self.density()) >= FloatOrd(threshold)
    }

    /// Order two successful layouts so that the better one comes first: more words placed wins,
    /// then (among layouts with as many words) the smaller bounding box, then more intersections,
    /// then higher density.
    #[must_use]
    pub fn compare(&self, other: &LayoutScore) -> Ordering {
        self.rank_key().cmp(&other.rank_key())
    }

    fn rank_key(&self) -> (Reverse<usize>, usize, Reverse<usize>, Reverse<FloatOrd<f32>>) {
        (
            Reverse(self.words_placed),
            self.area,
            Reverse(self.intersections),
            Reverse(FloatOrd(self.density())),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Direction;

    fn score(intersections: usize, area: usize, words_placed: usize) -> LayoutScore {
        LayoutScore {
            intersections,
            area,
            words_placed,
            filled_cells: area / 2,
        }
    }

    #[test]
    fn test_score_of_grid() {
        let mut grid = Grid::new(None);
        assert_eq!(LayoutScore::of(&grid), LayoutScore::default());
        assert_eq!(LayoutScore::default().density(), 0.0);

        grid.place(0, &['C', 'A', 'T'], (0, 0), Direction::Across);
        grid.place(1, &['C', 'A', 'R'], (0, 0), Direction::Down);

        let score = LayoutScore::of(&grid);
        assert_eq!(
            score,
            LayoutScore {
                intersections: 1,
                area: 9,
                words_placed: 2,
                filled_cells: 5,
            }
        );
        assert!(score.meets_threshold(0.5));
        assert!(!score.meets_threshold(0.6));
    }

    #[test]
    fn test_more_words_win() {
        assert_eq!(score(1, 30, 4).compare(&score(5, 20, 3)), Ordering::Less);
        assert_eq!(score(5, 20, 3).compare(&score(1, 30, 4)), Ordering::Greater);
    }

    #[test]
    fn test_smaller_area_wins_among_equal_word_counts() {
        assert_eq!(score(1, 20, 4).compare(&score(5, 30, 4)), Ordering::Less);
        assert_eq!(score(5, 30, 4).compare(&score(1, 20, 4)), Ordering::Greater);
    }

    #[test]
    fn test_ties_broken_by_intersections() {
        assert_eq!(score(3, 20, 4).compare(&score(2, 20, 4)), Ordering::Less);
        assert_eq!(score(3, 20, 4).compare(&score(3, 20, 4)), Ordering::Equal);
    }
}
