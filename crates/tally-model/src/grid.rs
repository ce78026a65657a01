use core::fmt;

use serde::{Deserialize, Serialize};

use crate::{Cell, CellRef};

/// An ordered sequence of cell rows; the first row is the header.
///
/// The structural invariant is that every row's width equals the header
/// row's width. The grid does not enforce it on construction — a rebuild
/// always replaces the whole grid, and a width mismatch is a builder defect
/// to *report*, not to silently truncate or pad (see [`Grid::check_structure`]).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    rows: Vec<Vec<Cell>>,
}

impl Grid {
    /// Wrap pre-built rows. The first row is treated as the header.
    pub fn from_rows(rows: Vec<Vec<Cell>>) -> Self {
        Self { rows }
    }

    /// Header width; the column count every row is expected to match.
    ///
    /// Zero for a grid with no rows at all.
    pub fn width(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }

    /// Number of rows, header included.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn cell(&self, at: CellRef) -> Option<&Cell> {
        self.rows.get(at.row as usize)?.get(at.col as usize)
    }

    pub fn cell_mut(&mut self, at: CellRef) -> Option<&mut Cell> {
        self.rows.get_mut(at.row as usize)?.get_mut(at.col as usize)
    }

    /// Iterate all cells with their coordinates, row-major.
    pub fn iter_cells(&self) -> impl Iterator<Item = (CellRef, &Cell)> {
        self.rows.iter().enumerate().flat_map(|(row, cells)| {
            cells
                .iter()
                .enumerate()
                .map(move |(col, cell)| (CellRef::new(row as u32, col as u32), cell))
        })
    }

    /// Report every row whose width differs from the header's.
    ///
    /// An empty result means the structural invariant holds. Callers decide
    /// whether to treat violations as fatal; the builder and exporter log
    /// them and proceed with the malformed rows.
    pub fn check_structure(&self) -> Vec<StructuralViolation> {
        let expected = self.width();
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.len() != expected)
            .map(|(index, row)| StructuralViolation {
                row: index,
                width: row.len(),
                expected,
            })
            .collect()
    }
}

/// A built row's width differs from the header width.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StructuralViolation {
    /// 0-indexed row (0 is the header).
    pub row: usize,
    /// Actual width of the offending row.
    pub width: usize,
    /// Header width the row was expected to match.
    pub expected: usize,
}

impl fmt::Display for StructuralViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "row {} has {} cells, expected {}",
            self.row, self.width, self.expected
        )
    }
}

impl std::error::Error for StructuralViolation {}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn row(n: usize) -> Vec<Cell> {
        (0..n).map(|_| Cell::default()).collect()
    }

    #[test]
    fn structure_check_flags_short_and_long_rows() {
        let grid = Grid::from_rows(vec![row(3), row(3), row(2), row(4)]);
        assert_eq!(grid.width(), 3);
        assert_eq!(
            grid.check_structure(),
            vec![
                StructuralViolation {
                    row: 2,
                    width: 2,
                    expected: 3
                },
                StructuralViolation {
                    row: 3,
                    width: 4,
                    expected: 3
                },
            ]
        );
    }

    #[test]
    fn uniform_grid_is_clean() {
        let grid = Grid::from_rows(vec![row(10); 5]);
        assert!(grid.check_structure().is_empty());
    }

    #[test]
    fn cell_lookup_is_bounds_checked() {
        let grid = Grid::from_rows(vec![row(2)]);
        assert!(grid.cell(CellRef::new(0, 1)).is_some());
        assert!(grid.cell(CellRef::new(0, 2)).is_none());
        assert!(grid.cell(CellRef::new(1, 0)).is_none());
    }
}
