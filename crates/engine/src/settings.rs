// Engine settings
// Loaded from the embedding application's config directory, e.g.
// <config>/mapgrid/engine.json. Missing file or bad JSON falls back to
// defaults; unknown keys are ignored.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::mapping::DEFAULT_PALETTE;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Overlay colors cycled across new mappings.
    #[serde(rename = "mapping.palette")]
    pub mapping_palette: Vec<String>,

    /// Cap on cell-level changes reported per sheet diff.
    #[serde(rename = "diff.maxCellChanges")]
    pub diff_max_cell_changes: usize,

    /// Page size for audit trail display.
    #[serde(rename = "audit.pageSize")]
    pub audit_page_size: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            mapping_palette: DEFAULT_PALETTE.iter().map(|c| c.to_string()).collect(),
            diff_max_cell_changes: 2000,
            audit_page_size: 50,
        }
    }
}

impl EngineSettings {
    /// Load settings from a JSON file, falling back to defaults if the file
    /// is missing or unreadable.
    pub fn load_from(path: &Path) -> Self {
        fs::read_to_string(path)
            .ok()
            .and_then(|contents| serde_json::from_str(&contents).ok())
            .unwrap_or_default()
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
    }
}
