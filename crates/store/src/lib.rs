//! External collaborator interfaces.
//!
//! The engine treats persistence and file ingestion as opaque collaborators
//! behind two narrow traits: `DocumentStore` (CRUD for workbook-owned
//! records) and `SheetIngestion` (already-tabular sheet data plus its anchor
//! address). Requests and responses are plain serde types so any backend -
//! HTTP document store, local database, test double - can sit behind them.

pub mod ingest;
pub mod memory;

use serde::{Deserialize, Serialize};

use mapgrid_core::model::{AuditLogEntry, Mapping, NamedRange, Workbook};

/// Error type for store operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Requested record does not exist.
    NotFound(String),
    /// Backend failure (network, I/O, rejected write) with the underlying
    /// message.
    Backend(String),
    /// Payload could not be (de)serialized.
    Serialization(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(what) => write!(f, "not found: {what}"),
            Self::Backend(msg) => write!(f, "store backend error: {msg}"),
            Self::Serialization(msg) => write!(f, "serialization error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Success/error envelope returned by every document-store endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreEnvelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> StoreEnvelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Success with no payload (e.g. idempotent delete of an absent id).
    pub fn ok_empty() -> Self {
        Self {
            success: true,
            data: None,
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }

    pub fn into_result(self) -> Result<Option<T>, StoreError> {
        if self.success {
            Ok(self.data)
        } else {
            Err(StoreError::Backend(
                self.error.unwrap_or_else(|| "unspecified store error".to_string()),
            ))
        }
    }
}

/// A single persistence request issued by the engine.
///
/// Writes are full-record puts: the document store is the system of record
/// and serializes writes per record id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum StoreRequest {
    PutWorkbook {
        workbook: Workbook,
    },
    /// Deletes the workbook and everything it owns (mappings, named ranges).
    DeleteWorkbook {
        workbook_id: String,
    },
    PutMapping {
        workbook_id: String,
        mapping: Mapping,
    },
    DeleteMapping {
        workbook_id: String,
        mapping_id: String,
    },
    PutNamedRange {
        workbook_id: String,
        named_range: NamedRange,
    },
    DeleteNamedRange {
        workbook_id: String,
        named_range_id: String,
    },
    AppendAuditEntry {
        entry: AuditLogEntry,
    },
}

/// The record a successful request echoes back. The engine reconciles its
/// optimistic local copy against this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum StoreRecord {
    Workbook(Workbook),
    Mapping(Mapping),
    NamedRange(NamedRange),
    AuditEntry(AuditLogEntry),
}

/// Narrow CRUD interface to the document store.
pub trait DocumentStore {
    /// Execute one request, returning the standard envelope. Implementations
    /// must make deletes of absent ids an empty success, not an error.
    fn execute(&mut self, request: &StoreRequest) -> StoreEnvelope<StoreRecord>;

    /// Load a workbook with everything it owns.
    fn load_workbook(&self, id: &str) -> Result<Workbook, StoreError>;

    /// All persisted audit entries for a workbook, in insertion order.
    fn audit_entries(&self, workbook_id: &str) -> Result<Vec<AuditLogEntry>, StoreError>;
}
