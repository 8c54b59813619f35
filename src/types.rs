/// An identifier for a word: the index of its entry in the list passed to `generate_layout`.
pub type WordId = usize;

/// An identifier for a placement, unique within a single `Grid` for the lifetime of that grid.
pub type PlacementId = usize;

/// Signed (row, col) coordinates for a cell in the sparse grid. The first word is anchored at
/// (0, 0) and later words may extend in any direction, so both components can go negative.
pub type GridCoord = (isize, isize);
