//! Version diff engine.
//!
//! Compares two versions of one sheet's tabular data cell by cell, reports
//! added/removed rows, and projects the changes onto the saved mappings so a
//! reviewer can see which destination fields a re-upload touched.
//!
//! Rows are compared positionally: this is a viewer for re-uploaded exports,
//! not a move-detecting text differ.

use mapgrid_core::addr::format_cell_ref;
use mapgrid_core::coord::Coordinate;
use mapgrid_core::model::Mapping;

/// One cell whose value differs between versions. Missing cells (ragged or
/// short rows) compare as empty strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellChange {
    pub at: Coordinate,
    pub old: String,
    pub new: String,
}

impl CellChange {
    /// Cell reference for display, e.g. `"C4"`.
    pub fn cell_ref(&self) -> String {
        format_cell_ref(self.at)
    }
}

/// Cell-level difference report for one sheet.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SheetDiff {
    pub sheet: String,
    pub changed: Vec<CellChange>,
    /// 1-based row numbers present only in the new version.
    pub rows_added: Vec<usize>,
    /// 1-based row numbers present only in the old version.
    pub rows_removed: Vec<usize>,
    /// True when `changed` was capped; the report is not exhaustive.
    pub truncated: bool,
}

impl SheetDiff {
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.rows_added.is_empty() && self.rows_removed.is_empty()
    }

    pub fn total_changes(&self) -> usize {
        self.changed.len() + self.rows_added.len() + self.rows_removed.len()
    }
}

/// Compare two versions of a sheet. `origin` is the true coordinate of the
/// top-left data cell (the ingestion anchor), so reported coordinates line
/// up with saved mappings. `max_cell_changes` bounds the report so a full
/// re-export cannot produce an unbounded diff; the cap is surfaced via
/// `truncated`, never silently.
pub fn diff_sheets(
    sheet: &str,
    old: &[Vec<String>],
    new: &[Vec<String>],
    origin: Coordinate,
    max_cell_changes: usize,
) -> SheetDiff {
    let mut diff = SheetDiff {
        sheet: sheet.to_string(),
        ..Default::default()
    };

    let common_rows = old.len().min(new.len());
    let empty = String::new();

    'rows: for i in 0..common_rows {
        let width = old[i].len().max(new[i].len());
        for j in 0..width {
            let old_cell = old[i].get(j).unwrap_or(&empty);
            let new_cell = new[i].get(j).unwrap_or(&empty);
            if old_cell != new_cell {
                if diff.changed.len() >= max_cell_changes {
                    diff.truncated = true;
                    break 'rows;
                }
                diff.changed.push(CellChange {
                    at: Coordinate::new(origin.row + i, origin.col + j),
                    old: old_cell.clone(),
                    new: new_cell.clone(),
                });
            }
        }
    }

    for i in common_rows..new.len() {
        diff.rows_added.push(origin.row + i);
    }
    for i in common_rows..old.len() {
        diff.rows_removed.push(origin.row + i);
    }

    diff
}

/// How a re-upload affects one mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImpactKind {
    /// Values inside the mapped region changed.
    CellsChanged { count: usize },
    /// The mapped region extends past the new sheet dimensions. Mappings are
    /// not retroactively invalidated on re-upload; this flag is how the gap
    /// is surfaced to a reviewer.
    OutOfBounds,
}

/// Impact of a sheet diff on one saved mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingImpact {
    pub mapping_id: String,
    pub destination_field: String,
    pub kind: ImpactKind,
}

/// Project a sheet diff onto the saved mappings for that sheet.
///
/// `origin` is the anchor of the new version and `new_dims` its (rows,
/// widest row). A mapping outside the new bounds reports `OutOfBounds`;
/// otherwise a mapping reports the count of changed cells it contains, and
/// unaffected mappings are omitted.
pub fn mapping_impact(
    diff: &SheetDiff,
    mappings: &[Mapping],
    origin: Coordinate,
    new_dims: (usize, usize),
) -> Vec<MappingImpact> {
    let (rows, cols) = new_dims;
    let mut impacts = Vec::new();

    for mapping in mappings.iter().filter(|m| m.sheet == diff.sheet) {
        if mapping.start.row < origin.row
            || mapping.start.col < origin.col
            || mapping.end.row >= origin.row + rows
            || mapping.end.col >= origin.col + cols
        {
            impacts.push(MappingImpact {
                mapping_id: mapping.id.clone(),
                destination_field: mapping.destination_field.clone(),
                kind: ImpactKind::OutOfBounds,
            });
            continue;
        }
        let count = diff
            .changed
            .iter()
            .filter(|c| mapping.contains(&diff.sheet, c.at))
            .count();
        if count > 0 {
            impacts.push(MappingImpact {
                mapping_id: mapping.id.clone(),
                destination_field: mapping.destination_field.clone(),
                kind: ImpactKind::CellsChanged { count },
            });
        }
    }

    impacts
}
