//! Persisted data model records.
//!
//! These are the document-store shapes shared by the engine and the store
//! interface: workbooks, mappings, named ranges, and audit log entries.
//! Records carry string ids (UUID v4) so they round-trip through the JSON
//! document store unchanged.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::coord::{Coordinate, Range};

/// Aggregation applied when a mapped region is pulled into its destination
/// field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transform {
    Sum,
    Average,
    Count,
    Max,
    Min,
    First,
    Last,
    Concat,
}

/// A saved binding from a rectangular cell region to a destination field.
///
/// Owned by a single workbook. Stored corners are always normalized
/// (`start <= end` per axis); independent mappings may overlap, and overlap
/// is resolved only at render/lookup time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mapping {
    pub id: String,
    pub sheet: String,
    pub start: Coordinate,
    pub end: Coordinate,
    pub destination_field: String,
    pub transform: Transform,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<String>,
    pub color: String,
}

impl Mapping {
    /// The mapped region as a range.
    pub fn range(&self) -> Range {
        Range::new(self.sheet.clone(), self.start, self.end)
    }

    /// Whether this mapping owns the given cell.
    pub fn contains(&self, sheet: &str, at: Coordinate) -> bool {
        self.sheet == sheet
            && at.row >= self.start.row
            && at.row <= self.end.row
            && at.col >= self.start.col
            && at.col <= self.end.col
    }
}

/// Partial update for a mapping. `None` fields keep the stored value;
/// `sheet`/`start`/`end` are never cleared implicitly.
#[derive(Debug, Clone, Default)]
pub struct MappingPatch {
    pub sheet: Option<String>,
    pub start: Option<Coordinate>,
    pub end: Option<Coordinate>,
    pub destination_field: Option<String>,
    pub transform: Option<Transform>,
    /// `Some(None)` clears the validation rule, `Some(Some(..))` replaces it.
    pub validation: Option<Option<String>>,
    pub color: Option<String>,
}

/// A user-defined alias for an address string.
///
/// `name` is unique within its workbook and matched case-sensitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedRange {
    pub id: String,
    pub name: String,
    /// Address string, e.g. `"Balance_Sheet!B2:B14"`. Validated against the
    /// address codec before it is accepted.
    pub range: String,
}

/// An uploaded workbook: tabular sheet data plus the mappings and named
/// ranges it exclusively owns (cascade-deleted with it).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workbook {
    pub id: String,
    pub name: String,
    /// `"v1"`, `"v2"`, ... - bumped on re-upload.
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_version: Option<String>,
    /// Sheet name -> already-tabular string data.
    pub sheets: BTreeMap<String, Vec<Vec<String>>>,
    /// Creation order. Overlap lookups rely on this ordering.
    pub mappings: Vec<Mapping>,
    pub named_ranges: Vec<NamedRange>,
}

impl Workbook {
    /// Create a freshly-uploaded workbook at version v1.
    pub fn new(name: impl Into<String>, sheets: BTreeMap<String, Vec<Vec<String>>>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            version: "v1".to_string(),
            previous_version: None,
            sheets,
            mappings: Vec::new(),
            named_ranges: Vec::new(),
        }
    }

    pub fn sheet(&self, name: &str) -> Option<&Vec<Vec<String>>> {
        self.sheets.get(name)
    }

    /// Row/column dimensions of a sheet (rows, widest row).
    pub fn sheet_dimensions(&self, name: &str) -> Option<(usize, usize)> {
        let data = self.sheets.get(name)?;
        let cols = data.iter().map(|row| row.len()).max().unwrap_or(0);
        Some((data.len(), cols))
    }

    pub fn mapping(&self, id: &str) -> Option<&Mapping> {
        self.mappings.iter().find(|m| m.id == id)
    }

    pub fn named_range(&self, id: &str) -> Option<&NamedRange> {
        self.named_ranges.iter().find(|nr| nr.id == id)
    }

    pub fn named_range_by_name(&self, name: &str) -> Option<&NamedRange> {
        // Case-sensitive on purpose: "PPE_Values" and "ppe_values" are
        // distinct names.
        self.named_ranges.iter().find(|nr| nr.name == name)
    }

    /// Replace the sheet data for a re-upload: bumps the version and retains
    /// the prior identifier for diffing.
    pub fn apply_reupload(&mut self, sheets: BTreeMap<String, Vec<Vec<String>>>) {
        self.previous_version = Some(self.version.clone());
        self.version = next_version(&self.version);
        self.sheets = sheets;
    }
}

/// Increment a `"v<n>"` version identifier.
pub fn next_version(version: &str) -> String {
    match version.strip_prefix('v').and_then(|n| n.parse::<u64>().ok()) {
        Some(n) => format!("v{}", n + 1),
        None => "v2".to_string(),
    }
}

/// What happened, for the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Upload,
    CreateMapping,
    UpdateMapping,
    DeleteMapping,
    CreateNamedRange,
    UpdateNamedRange,
    DeleteNamedRange,
    Reupload,
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Upload => "upload",
            Self::CreateMapping => "create_mapping",
            Self::UpdateMapping => "update_mapping",
            Self::DeleteMapping => "delete_mapping",
            Self::CreateNamedRange => "create_named_range",
            Self::UpdateNamedRange => "update_named_range",
            Self::DeleteNamedRange => "delete_named_range",
            Self::Reupload => "reupload",
        };
        write!(f, "{s}")
    }
}

/// One immutable audit trail entry. Never mutated or deleted once written;
/// corrections are modeled as new entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: String,
    /// UTC, serialized as ISO-8601.
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    pub action: AuditAction,
    pub subject_workbook_id: String,
    pub details: String,
}

impl AuditLogEntry {
    pub fn new(
        action: AuditAction,
        subject_workbook_id: impl Into<String>,
        actor: impl Into<String>,
        details: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp,
            actor: actor.into(),
            action,
            subject_workbook_id: subject_workbook_id.into(),
            details: details.into(),
        }
    }
}
