//! Display grid adapter.
//!
//! The rendered grid prepends a synthetic column-letter header row and a
//! row-number gutter column to the true tabular data. This adapter is the
//! single translation point between display-grid indices and true
//! coordinates; no other component is allowed to see both spaces.
//!
//! The adapter also carries the data anchor reported by sheet ingestion
//! (e.g. `"Sheet1!B3"` when the source had leading blank rows/columns), so
//! headers and conversions are offset instead of assuming data starts at A1.

use crate::addr::{index_to_column_letter, parse_address, AddressError};
use crate::coord::Coordinate;

/// Translates between display-grid indices and true coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridAdapter {
    /// True coordinate of the top-left data cell.
    origin: Coordinate,
}

impl Default for GridAdapter {
    /// Adapter anchored at A1.
    fn default() -> Self {
        Self {
            origin: Coordinate { row: 1, col: 0 },
        }
    }
}

impl GridAdapter {
    /// Adapter anchored at an arbitrary true coordinate.
    pub fn new(origin: Coordinate) -> Self {
        Self { origin }
    }

    /// Adapter anchored at the start of an ingestion anchor address,
    /// e.g. `"Sheet1!B3"`.
    pub fn from_anchor(address: &str) -> Result<Self, AddressError> {
        let range = parse_address(address)?;
        Ok(Self::new(range.normalized().start))
    }

    pub fn origin(&self) -> Coordinate {
        self.origin
    }

    /// Map a display-grid index pair to a true coordinate.
    ///
    /// Returns `None` for the header row and the gutter column (display index
    /// 0 on either axis) - "not a data cell, ignore the interaction".
    pub fn to_true(&self, display_row: usize, display_col: usize) -> Option<Coordinate> {
        if display_row == 0 || display_col == 0 {
            return None;
        }
        Some(Coordinate {
            row: self.origin.row + display_row - 1,
            col: self.origin.col + display_col - 1,
        })
    }

    /// Map a true coordinate back to display-grid indices. Exact inverse of
    /// `to_true`; `None` if the coordinate lies before the anchor.
    pub fn from_true(&self, at: Coordinate) -> Option<(usize, usize)> {
        let display_row = at.row.checked_sub(self.origin.row)? + 1;
        let display_col = at.col.checked_sub(self.origin.col)? + 1;
        Some((display_row, display_col))
    }

    /// Build the full display grid: corner cell, column-letter header, and
    /// row-number gutter around the true data.
    ///
    /// Width comes from the widest true row; ragged rows are padded with
    /// empty cells. An empty sheet yields just the corner cell.
    pub fn build_display_grid(&self, data: &[Vec<String>]) -> Vec<Vec<String>> {
        let width = data.iter().map(|row| row.len()).max().unwrap_or(0);

        let mut grid = Vec::with_capacity(data.len() + 1);
        let mut header = Vec::with_capacity(width + 1);
        header.push(String::new());
        for j in 0..width {
            header.push(index_to_column_letter(self.origin.col + j));
        }
        grid.push(header);

        for (i, row) in data.iter().enumerate() {
            let mut display_row = Vec::with_capacity(width + 1);
            display_row.push((self.origin.row + i).to_string());
            display_row.extend(row.iter().cloned());
            display_row.resize(width + 1, String::new());
            grid.push(display_row);
        }

        grid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(data: &[&[&str]]) -> Vec<Vec<String>> {
        data.iter()
            .map(|row| row.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_header_and_gutter_are_not_data_cells() {
        let adapter = GridAdapter::default();
        assert_eq!(adapter.to_true(0, 0), None);
        assert_eq!(adapter.to_true(0, 7), None);
        assert_eq!(adapter.to_true(3, 0), None);
    }

    #[test]
    fn test_to_true_drops_gutter_offset() {
        let adapter = GridAdapter::default();
        assert_eq!(adapter.to_true(1, 1), Some(Coordinate::new(1, 0)));
        assert_eq!(adapter.to_true(4, 2), Some(Coordinate::new(4, 1)));
    }

    #[test]
    fn test_display_true_inverse() {
        let adapter = GridAdapter::default();
        for row in 1..40 {
            for col in 0..30 {
                let c = Coordinate::new(row, col);
                let (dr, dc) = adapter.from_true(c).unwrap();
                assert_eq!(adapter.to_true(dr, dc), Some(c));
            }
        }
    }

    #[test]
    fn test_anchored_adapter_honors_offset() {
        // Data anchored at B3: display cell (1,1) is the first data cell.
        let adapter = GridAdapter::from_anchor("Sheet1!B3").unwrap();
        assert_eq!(adapter.to_true(1, 1), Some(Coordinate::new(3, 1)));
        assert_eq!(adapter.from_true(Coordinate::new(3, 1)), Some((1, 1)));
        // A1 lies before the anchor and is not on the grid.
        assert_eq!(adapter.from_true(Coordinate::new(1, 0)), None);
    }

    #[test]
    fn test_build_display_grid() {
        let adapter = GridAdapter::default();
        let grid = adapter.build_display_grid(&rows(&[
            &["cash", "1200"],
            &["ppe", "880"],
        ]));
        assert_eq!(grid[0], vec!["", "A", "B"]);
        assert_eq!(grid[1], vec!["1", "cash", "1200"]);
        assert_eq!(grid[2], vec!["2", "ppe", "880"]);
    }

    #[test]
    fn test_build_display_grid_pads_ragged_rows() {
        let adapter = GridAdapter::default();
        let grid = adapter.build_display_grid(&rows(&[
            &["a"],
            &["b", "c", "d"],
        ]));
        assert_eq!(grid[0], vec!["", "A", "B", "C"]);
        assert_eq!(grid[1], vec!["1", "a", "", ""]);
        assert_eq!(grid[2], vec!["2", "b", "c", "d"]);
    }

    #[test]
    fn test_build_display_grid_empty_sheet() {
        let adapter = GridAdapter::default();
        let grid = adapter.build_display_grid(&[]);
        assert_eq!(grid, vec![vec![String::new()]]);
    }

    #[test]
    fn test_build_display_grid_anchored() {
        let adapter = GridAdapter::from_anchor("Sheet1!B3").unwrap();
        let grid = adapter.build_display_grid(&rows(&[&["x", "y"]]));
        assert_eq!(grid[0], vec!["", "B", "C"]);
        assert_eq!(grid[1], vec!["3", "x", "y"]);
    }
}
