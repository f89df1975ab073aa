//! Mapping overlay resolution and construction.
//!
//! Mappings may overlap freely in the data model; ownership of a cell is
//! decided only at render/lookup time, first match in creation order. That
//! tie-break is a rendering policy, not a statement about which destination
//! field "really" owns the data.

use mapgrid_core::coord::{Coordinate, Range};
use mapgrid_core::model::{Mapping, MappingPatch, Transform};
use uuid::Uuid;

use crate::error::EngineError;

/// Resolve which mapping owns a cell: first match in creation order wins.
pub fn find_owning_mapping<'a>(
    mappings: &'a [Mapping],
    sheet: &str,
    at: Coordinate,
) -> Option<&'a Mapping> {
    mappings.iter().find(|m| m.contains(sheet, at))
}

/// All mappings overlapping a region, in creation order. Used to paint the
/// overlay for a viewport.
pub fn mappings_in_range<'a>(mappings: &'a [Mapping], region: &Range) -> Vec<&'a Mapping> {
    mappings
        .iter()
        .filter(|m| m.range().intersects(region))
        .collect()
}

/// Build a mapping record from a committed selection.
///
/// The selection may be drawn in any direction; the stored record is
/// normalized so `start <= end` holds per axis before persistence, not only
/// at display time.
pub fn build_mapping(
    selection: &Range,
    destination_field: &str,
    transform: Transform,
    validation: Option<String>,
    color: String,
) -> Result<Mapping, EngineError> {
    if destination_field.trim().is_empty() {
        return Err(EngineError::InvalidMapping(
            "destination field must not be empty".to_string(),
        ));
    }
    let normalized = selection.normalized();
    Ok(Mapping {
        id: Uuid::new_v4().to_string(),
        sheet: normalized.sheet,
        start: normalized.start,
        end: normalized.end,
        destination_field: destination_field.to_string(),
        transform,
        validation,
        color,
    })
}

/// Apply a partial update, then re-normalize the stored corners.
pub fn apply_patch(mapping: &mut Mapping, patch: MappingPatch) -> Result<(), EngineError> {
    if let Some(field) = &patch.destination_field {
        if field.trim().is_empty() {
            return Err(EngineError::InvalidMapping(
                "destination field must not be empty".to_string(),
            ));
        }
    }
    if let Some(sheet) = patch.sheet {
        mapping.sheet = sheet;
    }
    if let Some(start) = patch.start {
        mapping.start = start;
    }
    if let Some(end) = patch.end {
        mapping.end = end;
    }
    if let Some(field) = patch.destination_field {
        mapping.destination_field = field;
    }
    if let Some(transform) = patch.transform {
        mapping.transform = transform;
    }
    if let Some(validation) = patch.validation {
        mapping.validation = validation;
    }
    if let Some(color) = patch.color {
        mapping.color = color;
    }
    let normalized = mapping.range().normalized();
    mapping.start = normalized.start;
    mapping.end = normalized.end;
    Ok(())
}

/// Overlay colors cycled across new mappings. The palette carries no
/// meaning; it only keeps adjacent mappings visually distinct.
pub const DEFAULT_PALETTE: [&str; 8] = [
    "#4A90D9", "#6AA84F", "#E69138", "#8E63CE", "#CC4125", "#45818E", "#C27BA0", "#BF9000",
];

/// Cycles through a fixed palette.
#[derive(Debug, Clone)]
pub struct ColorPalette {
    colors: Vec<String>,
    cursor: usize,
}

impl Default for ColorPalette {
    fn default() -> Self {
        Self::new(DEFAULT_PALETTE.iter().map(|c| c.to_string()).collect())
    }
}

impl ColorPalette {
    /// Falls back to the default palette if `colors` is empty.
    pub fn new(colors: Vec<String>) -> Self {
        let colors = if colors.is_empty() {
            DEFAULT_PALETTE.iter().map(|c| c.to_string()).collect()
        } else {
            colors
        };
        Self { colors, cursor: 0 }
    }

    pub fn next(&mut self) -> String {
        let color = self.colors[self.cursor % self.colors.len()].clone();
        self.cursor += 1;
        color
    }
}
