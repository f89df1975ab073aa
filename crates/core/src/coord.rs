//! Coordinate and range primitives.
//!
//! Everything outside the display grid adapter works in "true spreadsheet"
//! space: rows are 1-based (row 1 is the first data row), columns are 0-based.
//! Display-grid indices exist only inside `grid`.

use serde::{Deserialize, Serialize};

/// A true spreadsheet coordinate: 1-based row, 0-based column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coordinate {
    pub row: usize,
    pub col: usize,
}

impl Coordinate {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

/// A rectangular range of cells on a named sheet, inclusive on both ends.
///
/// A range may hold its corners in any order (a drag can run bottom-right to
/// top-left); `normalized` returns the canonical form with `start <= end` on
/// both axes. Stored records (mappings, named ranges) are always normalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub sheet: String,
    pub start: Coordinate,
    pub end: Coordinate,
}

impl Range {
    /// Create a range with the corners exactly as given.
    pub fn new(sheet: impl Into<String>, start: Coordinate, end: Coordinate) -> Self {
        Self {
            sheet: sheet.into(),
            start,
            end,
        }
    }

    /// Create a single-cell range.
    pub fn cell(sheet: impl Into<String>, at: Coordinate) -> Self {
        Self {
            sheet: sheet.into(),
            start: at,
            end: at,
        }
    }

    /// Canonical form: per-axis min as `start`, per-axis max as `end`.
    /// Idempotent - normalizing a normalized range returns an equal range.
    pub fn normalized(&self) -> Range {
        Range {
            sheet: self.sheet.clone(),
            start: Coordinate {
                row: self.start.row.min(self.end.row),
                col: self.start.col.min(self.end.col),
            },
            end: Coordinate {
                row: self.start.row.max(self.end.row),
                col: self.start.col.max(self.end.col),
            },
        }
    }

    /// Check whether a cell on the given sheet falls inside this range.
    /// Works on raw corners, so callers don't have to normalize first.
    pub fn contains(&self, sheet: &str, at: Coordinate) -> bool {
        if self.sheet != sheet {
            return false;
        }
        let (r1, r2) = (
            self.start.row.min(self.end.row),
            self.start.row.max(self.end.row),
        );
        let (c1, c2) = (
            self.start.col.min(self.end.col),
            self.start.col.max(self.end.col),
        );
        at.row >= r1 && at.row <= r2 && at.col >= c1 && at.col <= c2
    }

    /// Check if this is a single cell.
    pub fn is_single(&self) -> bool {
        self.start == self.end
    }

    /// Number of cells in this range.
    pub fn cell_count(&self) -> usize {
        let n = self.normalized();
        (n.end.row - n.start.row + 1) * (n.end.col - n.start.col + 1)
    }

    /// Iterate over all cells in this range (row-major order).
    pub fn cells(&self) -> impl Iterator<Item = Coordinate> {
        let n = self.normalized();
        (n.start.row..=n.end.row).flat_map(move |row| {
            (n.start.col..=n.end.col).map(move |col| Coordinate { row, col })
        })
    }

    /// Check whether two ranges on the same sheet overlap.
    pub fn intersects(&self, other: &Range) -> bool {
        if self.sheet != other.sheet {
            return false;
        }
        let a = self.normalized();
        let b = other.normalized();
        a.start.row <= b.end.row
            && b.start.row <= a.end.row
            && a.start.col <= b.end.col
            && b.start.col <= a.end.col
    }
}
