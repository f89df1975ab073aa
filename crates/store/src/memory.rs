//! In-memory document store.
//!
//! Backs the engine integration tests and local development. Behaves like
//! the real document store contract: full-record puts, idempotent deletes,
//! cascade delete of workbook-owned records, and per-request failure
//! injection for error-path tests.

use rustc_hash::FxHashMap;

use mapgrid_core::model::{AuditLogEntry, Workbook};

use crate::{DocumentStore, StoreEnvelope, StoreError, StoreRecord, StoreRequest};

#[derive(Debug, Default)]
pub struct MemoryStore {
    workbooks: FxHashMap<String, Workbook>,
    audit_log: Vec<AuditLogEntry>,
    /// When set, the next `execute` call fails with this message.
    fail_next: Option<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `execute` call fail, without touching state.
    pub fn fail_next_request(&mut self, message: &str) {
        self.fail_next = Some(message.to_string());
    }

    pub fn workbook_count(&self) -> usize {
        self.workbooks.len()
    }

    fn workbook_mut(&mut self, id: &str) -> Result<&mut Workbook, StoreError> {
        self.workbooks
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("workbook '{id}'")))
    }
}

impl DocumentStore for MemoryStore {
    fn execute(&mut self, request: &StoreRequest) -> StoreEnvelope<StoreRecord> {
        if let Some(message) = self.fail_next.take() {
            return StoreEnvelope::err(message);
        }

        match request {
            StoreRequest::PutWorkbook { workbook } => {
                self.workbooks.insert(workbook.id.clone(), workbook.clone());
                StoreEnvelope::ok(StoreRecord::Workbook(workbook.clone()))
            }
            StoreRequest::DeleteWorkbook { workbook_id } => {
                // Cascade: owned mappings and named ranges go with the
                // workbook record itself.
                self.workbooks.remove(workbook_id);
                StoreEnvelope::ok_empty()
            }
            StoreRequest::PutMapping {
                workbook_id,
                mapping,
            } => match self.workbook_mut(workbook_id) {
                Ok(wb) => {
                    match wb.mappings.iter_mut().find(|m| m.id == mapping.id) {
                        Some(existing) => *existing = mapping.clone(),
                        None => wb.mappings.push(mapping.clone()),
                    }
                    StoreEnvelope::ok(StoreRecord::Mapping(mapping.clone()))
                }
                Err(e) => StoreEnvelope::err(e.to_string()),
            },
            StoreRequest::DeleteMapping {
                workbook_id,
                mapping_id,
            } => match self.workbook_mut(workbook_id) {
                Ok(wb) => {
                    wb.mappings.retain(|m| m.id != *mapping_id);
                    StoreEnvelope::ok_empty()
                }
                Err(e) => StoreEnvelope::err(e.to_string()),
            },
            StoreRequest::PutNamedRange {
                workbook_id,
                named_range,
            } => match self.workbook_mut(workbook_id) {
                Ok(wb) => {
                    match wb.named_ranges.iter_mut().find(|nr| nr.id == named_range.id) {
                        Some(existing) => *existing = named_range.clone(),
                        None => wb.named_ranges.push(named_range.clone()),
                    }
                    StoreEnvelope::ok(StoreRecord::NamedRange(named_range.clone()))
                }
                Err(e) => StoreEnvelope::err(e.to_string()),
            },
            StoreRequest::DeleteNamedRange {
                workbook_id,
                named_range_id,
            } => match self.workbook_mut(workbook_id) {
                Ok(wb) => {
                    wb.named_ranges.retain(|nr| nr.id != *named_range_id);
                    StoreEnvelope::ok_empty()
                }
                Err(e) => StoreEnvelope::err(e.to_string()),
            },
            StoreRequest::AppendAuditEntry { entry } => {
                self.audit_log.push(entry.clone());
                StoreEnvelope::ok(StoreRecord::AuditEntry(entry.clone()))
            }
        }
    }

    fn load_workbook(&self, id: &str) -> Result<Workbook, StoreError> {
        self.workbooks
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("workbook '{id}'")))
    }

    fn audit_entries(&self, workbook_id: &str) -> Result<Vec<AuditLogEntry>, StoreError> {
        Ok(self
            .audit_log
            .iter()
            .filter(|e| e.subject_workbook_id == workbook_id)
            .cloned()
            .collect())
    }
}
