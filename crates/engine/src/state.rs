//! Workbook session state.
//!
//! `WorkbookSession` is the single explicit state object behind the workbook
//! viewer: the active workbook, its audit trail, and the in-flight store
//! operations. The UI layer is a read-only subscriber; every mutation goes
//! through the operations here.
//!
//! Store I/O is the embedding layer's job. Each mutating operation applies
//! optimistically to local state and enqueues a tagged pending operation;
//! `take_requests` hands the requests out for execution, and `complete`
//! reconciles the response when it arrives. Completions are applied in the
//! order they arrive (not the order ops were issued), a response tagged with
//! a workbook that is no longer selected is ignored, and a failed response
//! rolls local state back to the pre-operation snapshot, so a store failure
//! never leaves a partial apply.

use std::collections::BTreeMap;

use mapgrid_core::addr::format_address;
use mapgrid_core::coord::{Coordinate, Range};
use mapgrid_core::grid::GridAdapter;
use mapgrid_core::model::{
    AuditAction, AuditLogEntry, Mapping, MappingPatch, NamedRange, Transform, Workbook,
};
use mapgrid_store::ingest::SheetIngestion;
use mapgrid_store::{StoreEnvelope, StoreRecord, StoreRequest};

use crate::audit::AuditTrail;
use crate::diff::{diff_sheets, mapping_impact, MappingImpact, SheetDiff};
use crate::error::EngineError;
use crate::mapping::{apply_patch, build_mapping, find_owning_mapping, ColorPalette};
use crate::named_range::{
    build_named_range, ensure_name_available, resolve, validate_address, validate_name,
};
use crate::settings::EngineSettings;

/// Identifier for one in-flight store operation.
pub type OpId = u64;

/// Snapshot restored if the store rejects an optimistic apply.
#[derive(Debug, Clone)]
enum Rollback {
    /// Audit persistence is best-effort: a failure is reported, never
    /// rolled back locally.
    AuditPersist,
    /// Remove the mapping with this id, then restore the prior record (with
    /// its creation-order index) if there was one.
    Mapping {
        id: String,
        prior: Option<(usize, Mapping)>,
    },
    NamedRange {
        id: String,
        prior: Option<(usize, NamedRange)>,
    },
    /// Restore the whole workbook; `None` means nothing was open before.
    Workbook(Option<Box<Workbook>>),
}

/// One in-flight store operation, tagged with its originating workbook so a
/// late response for a deselected workbook can be recognized and dropped.
#[derive(Debug, Clone)]
struct PendingOp {
    id: OpId,
    workbook_id: String,
    request: StoreRequest,
    rollback: Rollback,
    sent: bool,
}

/// Outcome of reconciling one store response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// Local state reconciled with the store's copy.
    Applied,
    /// Response was for an untracked op or a workbook no longer selected.
    Ignored,
    /// The audit entry could not be persisted. The operation that produced
    /// it already succeeded and stands.
    AuditPersistFailed(String),
}

pub struct WorkbookSession {
    actor: String,
    settings: EngineSettings,
    workbook: Option<Workbook>,
    /// Ingestion anchor address per sheet of the active workbook.
    anchors: BTreeMap<String, String>,
    audit: AuditTrail,
    palette: ColorPalette,
    pending: Vec<PendingOp>,
    next_op_id: OpId,
}

impl WorkbookSession {
    pub fn new(actor: impl Into<String>, settings: EngineSettings) -> Self {
        let palette = ColorPalette::new(settings.mapping_palette.clone());
        Self {
            actor: actor.into(),
            settings,
            workbook: None,
            anchors: BTreeMap::new(),
            audit: AuditTrail::new(),
            palette,
            pending: Vec::new(),
            next_op_id: 1,
        }
    }

    pub fn workbook(&self) -> Option<&Workbook> {
        self.workbook.as_ref()
    }

    pub fn audit(&self) -> &AuditTrail {
        &self.audit
    }

    /// Number of operations still awaiting a store response.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// First display page of the active workbook's audit trail, newest
    /// first. Page size comes from settings.
    pub fn recent_audit(&self) -> Vec<&AuditLogEntry> {
        let Some(wb) = self.workbook.as_ref() else {
            return Vec::new();
        };
        let mut entries = self.audit.list_for_workbook(&wb.id);
        entries.truncate(self.settings.audit_page_size);
        entries
    }

    // ------------------------------------------------------------------
    // Workbook lifecycle
    // ------------------------------------------------------------------

    /// Pull a freshly uploaded workbook out of the ingestion service and
    /// make it the active one. Records the `upload` audit entry and enqueues
    /// persistence of the new workbook. Returns the workbook id.
    pub fn ingest_workbook(
        &mut self,
        name: &str,
        ingestion: &dyn SheetIngestion,
        handle: &str,
    ) -> Result<String, EngineError> {
        // Gather everything before touching session state, so an ingestion
        // failure leaves the session exactly as it was.
        let sheet_names = ingestion.sheet_names(handle)?;
        let mut sheets = BTreeMap::new();
        let mut anchors = BTreeMap::new();
        for sheet_name in &sheet_names {
            let ingested = ingestion.sheet_data(handle, sheet_name)?;
            sheets.insert(sheet_name.clone(), ingested.values);
            anchors.insert(sheet_name.clone(), ingested.address);
        }

        let workbook = Workbook::new(name, sheets);
        let workbook_id = workbook.id.clone();
        let sheet_count = sheet_names.len();

        self.workbook = Some(workbook.clone());
        self.anchors = anchors;
        let entry = self
            .audit
            .record(
                AuditAction::Upload,
                &workbook_id,
                &self.actor,
                format!("uploaded '{name}' with {sheet_count} sheet(s) as v1"),
            )
            .clone();
        self.enqueue(
            workbook_id.clone(),
            StoreRequest::PutWorkbook { workbook },
            Rollback::Workbook(None),
        );
        self.enqueue_audit(entry);
        Ok(workbook_id)
    }

    /// Select an already-persisted workbook. Responses still in flight for
    /// the previous workbook will be ignored when they arrive.
    pub fn open_workbook(&mut self, workbook: Workbook) {
        self.anchors.clear();
        self.workbook = Some(workbook);
    }

    /// Deselect the active workbook. In-flight responses for it will be
    /// ignored when they arrive.
    pub fn close_workbook(&mut self) {
        self.anchors.clear();
        self.workbook = None;
    }

    /// Replace the active workbook's sheet data with a re-uploaded version:
    /// bumps the version, keeps the prior identifier for diffing, records
    /// `reupload`.
    pub fn apply_reupload(
        &mut self,
        sheets: BTreeMap<String, Vec<Vec<String>>>,
    ) -> Result<OpId, EngineError> {
        let wb = self.workbook.as_mut().ok_or_else(no_workbook)?;
        let prior = Box::new(wb.clone());
        wb.apply_reupload(sheets);
        let workbook_id = wb.id.clone();
        let details = format!(
            "re-uploaded as {} (was {})",
            wb.version,
            prior.version.as_str()
        );
        let snapshot = wb.clone();

        let entry = self
            .audit
            .record(AuditAction::Reupload, &workbook_id, &self.actor, details)
            .clone();
        let op_id = self.enqueue(
            workbook_id,
            StoreRequest::PutWorkbook { workbook: snapshot },
            Rollback::Workbook(Some(prior)),
        );
        self.enqueue_audit(entry);
        Ok(op_id)
    }

    /// Re-upload via the ingestion service, refreshing the sheet anchors.
    pub fn reupload_from_ingestion(
        &mut self,
        ingestion: &dyn SheetIngestion,
        handle: &str,
    ) -> Result<OpId, EngineError> {
        self.workbook.as_ref().ok_or_else(no_workbook)?;
        let sheet_names = ingestion.sheet_names(handle)?;
        let mut sheets = BTreeMap::new();
        let mut anchors = BTreeMap::new();
        for sheet_name in &sheet_names {
            let ingested = ingestion.sheet_data(handle, sheet_name)?;
            sheets.insert(sheet_name.clone(), ingested.values);
            anchors.insert(sheet_name.clone(), ingested.address);
        }
        let op_id = self.apply_reupload(sheets)?;
        self.anchors = anchors;
        Ok(op_id)
    }

    /// Display grid adapter for a sheet of the active workbook, anchored at
    /// the address the ingestion service reported (A1 when unknown, e.g.
    /// for a workbook opened from the store).
    pub fn grid_adapter(&self, sheet: &str) -> Result<GridAdapter, EngineError> {
        let wb = self.workbook.as_ref().ok_or_else(no_workbook)?;
        if wb.sheet(sheet).is_none() {
            return Err(EngineError::NotFound(format!("sheet '{sheet}'")));
        }
        Ok(GridAdapter::new(self.sheet_origin(sheet)?))
    }

    /// True coordinate of a sheet's top-left data cell, from the ingestion
    /// anchor (A1 when unknown).
    fn sheet_origin(&self, sheet: &str) -> Result<Coordinate, EngineError> {
        match self.anchors.get(sheet) {
            Some(anchor) => Ok(GridAdapter::from_anchor(anchor)?.origin()),
            None => Ok(Coordinate::new(1, 0)),
        }
    }

    /// Mappings must not reference coordinates outside the sheet's current
    /// data at creation/update time. (Re-uploads shrinking a sheet do not
    /// retroactively invalidate mappings; the diff engine flags those.)
    fn check_in_bounds(&self, range: &Range) -> Result<(), EngineError> {
        let wb = self.workbook.as_ref().ok_or_else(no_workbook)?;
        let (rows, cols) = wb
            .sheet_dimensions(&range.sheet)
            .ok_or_else(|| EngineError::NotFound(format!("sheet '{}'", range.sheet)))?;
        let origin = self.sheet_origin(&range.sheet)?;
        let n = range.normalized();
        if n.start.row < origin.row
            || n.start.col < origin.col
            || n.end.row >= origin.row + rows
            || n.end.col >= origin.col + cols
        {
            return Err(EngineError::InvalidMapping(format!(
                "selection {} extends outside the sheet's {rows}x{cols} data",
                format_address(&n)
            )));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Mappings
    // ------------------------------------------------------------------

    /// Which mapping owns a cell, first created wins.
    pub fn find_mapping_at(&self, sheet: &str, at: Coordinate) -> Option<&Mapping> {
        self.workbook
            .as_ref()
            .and_then(|wb| find_owning_mapping(&wb.mappings, sheet, at))
    }

    /// Create a mapping from a committed selection. The selection comes from
    /// `SelectionTracker::committed`; `None` (nothing committed) is an
    /// `InvalidMapping` error.
    pub fn create_mapping(
        &mut self,
        selection: Option<&Range>,
        destination_field: &str,
        transform: Transform,
        validation: Option<String>,
    ) -> Result<(String, OpId), EngineError> {
        let selection = selection.ok_or_else(|| {
            EngineError::InvalidMapping("a committed selection is required".to_string())
        })?;
        self.check_in_bounds(selection)?;

        let color = self.palette.next();
        let mapping = build_mapping(selection, destination_field, transform, validation, color)?;
        let Some(wb) = self.workbook.as_mut() else {
            return Err(no_workbook());
        };
        wb.mappings.push(mapping.clone());
        let workbook_id = wb.id.clone();

        let entry = self
            .audit
            .record(
                AuditAction::CreateMapping,
                &workbook_id,
                &self.actor,
                format!(
                    "mapped {} -> '{}'",
                    format_address(&mapping.range()),
                    mapping.destination_field
                ),
            )
            .clone();
        let op_id = self.enqueue(
            workbook_id.clone(),
            StoreRequest::PutMapping {
                workbook_id,
                mapping: mapping.clone(),
            },
            Rollback::Mapping {
                id: mapping.id.clone(),
                prior: None,
            },
        );
        self.enqueue_audit(entry);
        Ok((mapping.id, op_id))
    }

    /// Partially update a mapping. Unset patch fields keep their stored
    /// values; in particular `sheet`/`start`/`end` are never cleared unless
    /// explicitly provided.
    pub fn update_mapping(&mut self, id: &str, patch: MappingPatch) -> Result<OpId, EngineError> {
        let wb = self.workbook.as_ref().ok_or_else(no_workbook)?;
        let index = wb
            .mappings
            .iter()
            .position(|m| m.id == id)
            .ok_or_else(|| EngineError::NotFound(format!("mapping '{id}'")))?;

        // Patch a copy first: a validation failure must leave the stored
        // record untouched.
        let mut updated = wb.mappings[index].clone();
        apply_patch(&mut updated, patch)?;
        self.check_in_bounds(&updated.range())?;

        let Some(wb) = self.workbook.as_mut() else {
            return Err(no_workbook());
        };
        let prior = wb.mappings[index].clone();
        wb.mappings[index] = updated.clone();
        let workbook_id = wb.id.clone();

        let entry = self
            .audit
            .record(
                AuditAction::UpdateMapping,
                &workbook_id,
                &self.actor,
                format!(
                    "updated mapping '{}' ({})",
                    updated.destination_field,
                    format_address(&updated.range())
                ),
            )
            .clone();
        let op_id = self.enqueue(
            workbook_id.clone(),
            StoreRequest::PutMapping {
                workbook_id,
                mapping: updated,
            },
            Rollback::Mapping {
                id: id.to_string(),
                prior: Some((index, prior)),
            },
        );
        self.enqueue_audit(entry);
        Ok(op_id)
    }

    /// Delete a mapping. Deleting an id that is already absent is a no-op
    /// success (`Ok(None)`), so two rapid deletes of the same mapping cannot
    /// fail the second caller.
    pub fn delete_mapping(&mut self, id: &str) -> Result<Option<OpId>, EngineError> {
        let wb = self.workbook.as_mut().ok_or_else(no_workbook)?;
        let Some(index) = wb.mappings.iter().position(|m| m.id == id) else {
            log::debug!("delete of absent mapping '{id}' is a no-op");
            return Ok(None);
        };
        let removed = wb.mappings.remove(index);
        let workbook_id = wb.id.clone();

        let entry = self
            .audit
            .record(
                AuditAction::DeleteMapping,
                &workbook_id,
                &self.actor,
                format!("deleted mapping '{}'", removed.destination_field),
            )
            .clone();
        let op_id = self.enqueue(
            workbook_id.clone(),
            StoreRequest::DeleteMapping {
                workbook_id,
                mapping_id: id.to_string(),
            },
            Rollback::Mapping {
                id: id.to_string(),
                prior: Some((index, removed)),
            },
        );
        self.enqueue_audit(entry);
        Ok(Some(op_id))
    }

    // ------------------------------------------------------------------
    // Named ranges
    // ------------------------------------------------------------------

    pub fn create_named_range(
        &mut self,
        name: &str,
        address: &str,
    ) -> Result<(String, OpId), EngineError> {
        let wb = self.workbook.as_mut().ok_or_else(no_workbook)?;
        let named_range = build_named_range(wb, name, address)?;
        wb.named_ranges.push(named_range.clone());
        let workbook_id = wb.id.clone();

        let entry = self
            .audit
            .record(
                AuditAction::CreateNamedRange,
                &workbook_id,
                &self.actor,
                format!("named '{}' = {}", named_range.name, named_range.range),
            )
            .clone();
        let op_id = self.enqueue(
            workbook_id.clone(),
            StoreRequest::PutNamedRange {
                workbook_id,
                named_range: named_range.clone(),
            },
            Rollback::NamedRange {
                id: named_range.id.clone(),
                prior: None,
            },
        );
        self.enqueue_audit(entry);
        Ok((named_range.id, op_id))
    }

    pub fn update_named_range(
        &mut self,
        id: &str,
        name: Option<&str>,
        address: Option<&str>,
    ) -> Result<OpId, EngineError> {
        let wb = self.workbook.as_mut().ok_or_else(no_workbook)?;
        let index = wb
            .named_ranges
            .iter()
            .position(|nr| nr.id == id)
            .ok_or_else(|| EngineError::NotFound(format!("named range '{id}'")))?;

        if let Some(name) = name {
            validate_name(name)?;
            ensure_name_available(wb, name, Some(id))?;
        }
        if let Some(address) = address {
            validate_address(address)?;
        }

        let prior = wb.named_ranges[index].clone();
        let mut updated = prior.clone();
        if let Some(name) = name {
            updated.name = name.to_string();
        }
        if let Some(address) = address {
            updated.range = address.to_string();
        }
        wb.named_ranges[index] = updated.clone();
        let workbook_id = wb.id.clone();

        let entry = self
            .audit
            .record(
                AuditAction::UpdateNamedRange,
                &workbook_id,
                &self.actor,
                format!("renamed/retargeted '{}' = {}", updated.name, updated.range),
            )
            .clone();
        let op_id = self.enqueue(
            workbook_id.clone(),
            StoreRequest::PutNamedRange {
                workbook_id,
                named_range: updated,
            },
            Rollback::NamedRange {
                id: id.to_string(),
                prior: Some((index, prior)),
            },
        );
        self.enqueue_audit(entry);
        Ok(op_id)
    }

    /// Idempotent, like `delete_mapping`.
    pub fn delete_named_range(&mut self, id: &str) -> Result<Option<OpId>, EngineError> {
        let wb = self.workbook.as_mut().ok_or_else(no_workbook)?;
        let Some(index) = wb.named_ranges.iter().position(|nr| nr.id == id) else {
            log::debug!("delete of absent named range '{id}' is a no-op");
            return Ok(None);
        };
        let removed = wb.named_ranges.remove(index);
        let workbook_id = wb.id.clone();

        let entry = self
            .audit
            .record(
                AuditAction::DeleteNamedRange,
                &workbook_id,
                &self.actor,
                format!("deleted named range '{}'", removed.name),
            )
            .clone();
        let op_id = self.enqueue(
            workbook_id.clone(),
            StoreRequest::DeleteNamedRange {
                workbook_id,
                named_range_id: id.to_string(),
            },
            Rollback::NamedRange {
                id: id.to_string(),
                prior: Some((index, removed)),
            },
        );
        self.enqueue_audit(entry);
        Ok(Some(op_id))
    }

    /// Exact-name lookup on the active workbook.
    pub fn resolve_named_range(&self, name: &str) -> Result<Range, EngineError> {
        let wb = self.workbook.as_ref().ok_or_else(no_workbook)?;
        resolve(wb, name)
    }

    /// Click-to-select by name: returns the range so the caller can switch
    /// the active sheet and seed a selection from it.
    pub fn select_by_name(&self, name: &str) -> Result<Range, EngineError> {
        self.resolve_named_range(name)
    }

    // ------------------------------------------------------------------
    // Diffing
    // ------------------------------------------------------------------

    /// Diff a sheet of the active workbook against an older version of its
    /// data, and project the changes onto the saved mappings.
    pub fn diff_sheet(
        &self,
        sheet: &str,
        old_values: &[Vec<String>],
    ) -> Result<(SheetDiff, Vec<MappingImpact>), EngineError> {
        let wb = self.workbook.as_ref().ok_or_else(no_workbook)?;
        let new_values = wb
            .sheet(sheet)
            .ok_or_else(|| EngineError::NotFound(format!("sheet '{sheet}'")))?;
        let origin = self.sheet_origin(sheet)?;
        let diff = diff_sheets(
            sheet,
            old_values,
            new_values,
            origin,
            self.settings.diff_max_cell_changes,
        );
        let dims = wb.sheet_dimensions(sheet).unwrap_or((0, 0));
        let impacts = mapping_impact(&diff, &wb.mappings, origin, dims);
        Ok((diff, impacts))
    }

    // ------------------------------------------------------------------
    // Pending operation plumbing
    // ------------------------------------------------------------------

    fn enqueue(&mut self, workbook_id: String, request: StoreRequest, rollback: Rollback) -> OpId {
        let id = self.next_op_id;
        self.next_op_id += 1;
        self.pending.push(PendingOp {
            id,
            workbook_id,
            request,
            rollback,
            sent: false,
        });
        id
    }

    fn enqueue_audit(&mut self, entry: AuditLogEntry) {
        let workbook_id = entry.subject_workbook_id.clone();
        self.enqueue(
            workbook_id,
            StoreRequest::AppendAuditEntry { entry },
            Rollback::AuditPersist,
        );
    }

    /// Drain requests not yet handed to the store layer. Each request stays
    /// tracked as pending until `complete` is called for it.
    pub fn take_requests(&mut self) -> Vec<(OpId, StoreRequest)> {
        self.pending
            .iter_mut()
            .filter(|op| !op.sent)
            .map(|op| {
                op.sent = true;
                (op.id, op.request.clone())
            })
            .collect()
    }

    /// Reconcile one store response. Responses are applied in the order
    /// this is called - arrival order, not issue order.
    pub fn complete(
        &mut self,
        op_id: OpId,
        envelope: StoreEnvelope<StoreRecord>,
    ) -> Result<Completion, EngineError> {
        let Some(position) = self.pending.iter().position(|op| op.id == op_id) else {
            log::debug!("completion for untracked op {op_id} ignored");
            return Ok(Completion::Ignored);
        };
        let op = self.pending.remove(position);

        let current_id = self.workbook.as_ref().map(|wb| wb.id.as_str());
        if current_id != Some(op.workbook_id.as_str()) {
            log::debug!(
                "completion for deselected workbook '{}' ignored",
                op.workbook_id
            );
            return Ok(Completion::Ignored);
        }

        if !envelope.success {
            let message = envelope
                .error
                .unwrap_or_else(|| "unspecified store error".to_string());
            if matches!(op.rollback, Rollback::AuditPersist) {
                // The primary operation already succeeded; the audit write
                // is best-effort and its failure is reported separately.
                log::warn!("audit entry could not be persisted: {message}");
                return Ok(Completion::AuditPersistFailed(message));
            }
            self.apply_rollback(op.rollback);
            return Err(EngineError::ExternalService(message));
        }

        if let Some(record) = envelope.data {
            self.reconcile(record);
        }
        Ok(Completion::Applied)
    }

    fn apply_rollback(&mut self, rollback: Rollback) {
        match rollback {
            Rollback::AuditPersist => {}
            Rollback::Mapping { id, prior } => {
                if let Some(wb) = self.workbook.as_mut() {
                    wb.mappings.retain(|m| m.id != id);
                    if let Some((index, mapping)) = prior {
                        let index = index.min(wb.mappings.len());
                        wb.mappings.insert(index, mapping);
                    }
                }
            }
            Rollback::NamedRange { id, prior } => {
                if let Some(wb) = self.workbook.as_mut() {
                    wb.named_ranges.retain(|nr| nr.id != id);
                    if let Some((index, named_range)) = prior {
                        let index = index.min(wb.named_ranges.len());
                        wb.named_ranges.insert(index, named_range);
                    }
                }
            }
            Rollback::Workbook(prior) => {
                self.workbook = prior.map(|boxed| *boxed);
            }
        }
    }

    /// Replace the optimistic local record with the store's copy.
    fn reconcile(&mut self, record: StoreRecord) {
        match record {
            StoreRecord::Mapping(server) => {
                if let Some(wb) = self.workbook.as_mut() {
                    if let Some(local) = wb.mappings.iter_mut().find(|m| m.id == server.id) {
                        *local = server;
                    }
                }
            }
            StoreRecord::NamedRange(server) => {
                if let Some(wb) = self.workbook.as_mut() {
                    if let Some(local) = wb.named_ranges.iter_mut().find(|nr| nr.id == server.id) {
                        *local = server;
                    }
                }
            }
            StoreRecord::Workbook(server) => {
                if let Some(wb) = self.workbook.as_ref() {
                    if wb.id == server.id {
                        self.workbook = Some(server);
                    }
                }
            }
            StoreRecord::AuditEntry(_) => {}
        }
    }
}

fn no_workbook() -> EngineError {
    EngineError::NotFound("no workbook is open".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet(data: &[&[&str]]) -> Vec<Vec<String>> {
        data.iter()
            .map(|row| row.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    fn session_with_workbook() -> (WorkbookSession, String) {
        let mut sheets = BTreeMap::new();
        sheets.insert(
            "Trial_Balance".to_string(),
            sheet(&[
                &["cash", "1200"],
                &["ppe", "880"],
                &["debt", "300"],
                &["equity", "1780"],
            ]),
        );
        let workbook = Workbook::new("TB 2025", sheets);
        let id = workbook.id.clone();
        let mut session = WorkbookSession::new("auditor_1", EngineSettings::default());
        session.open_workbook(workbook);
        (session, id)
    }

    fn selection(rows: (usize, usize), cols: (usize, usize)) -> Range {
        Range::new(
            "Trial_Balance",
            Coordinate::new(rows.0, cols.0),
            Coordinate::new(rows.1, cols.1),
        )
    }

    #[test]
    fn test_create_mapping_optimistic_apply() {
        let (mut session, _) = session_with_workbook();
        let sel = selection((1, 2), (1, 1));
        let (mapping_id, _op) = session
            .create_mapping(Some(&sel), "current_assets", Transform::Sum, None)
            .unwrap();

        let wb = session.workbook().unwrap();
        assert_eq!(wb.mappings.len(), 1);
        assert_eq!(wb.mappings[0].id, mapping_id);
        // Mapping write + audit write are both pending.
        assert_eq!(session.pending_count(), 2);
        assert_eq!(session.audit().len(), 1);
    }

    #[test]
    fn test_create_mapping_requires_selection_and_field() {
        let (mut session, _) = session_with_workbook();
        assert!(matches!(
            session.create_mapping(None, "cash", Transform::Sum, None),
            Err(EngineError::InvalidMapping(_))
        ));
        let sel = selection((1, 1), (1, 1));
        assert!(matches!(
            session.create_mapping(Some(&sel), "", Transform::Sum, None),
            Err(EngineError::InvalidMapping(_))
        ));
        // Nothing was applied or enqueued.
        assert!(session.workbook().unwrap().mappings.is_empty());
        assert_eq!(session.pending_count(), 0);
    }

    #[test]
    fn test_create_mapping_rejects_out_of_bounds() {
        let (mut session, _) = session_with_workbook();
        let sel = selection((1, 9), (0, 1)); // sheet has 4 rows
        assert!(matches!(
            session.create_mapping(Some(&sel), "cash", Transform::Sum, None),
            Err(EngineError::InvalidMapping(_))
        ));
    }

    #[test]
    fn test_failed_store_write_rolls_back() {
        let (mut session, _) = session_with_workbook();
        let sel = selection((1, 2), (1, 1));
        let (_, op) = session
            .create_mapping(Some(&sel), "current_assets", Transform::Sum, None)
            .unwrap();

        let err = session
            .complete(op, StoreEnvelope::err("backend unavailable"))
            .unwrap_err();
        assert!(matches!(err, EngineError::ExternalService(_)));
        assert!(session.workbook().unwrap().mappings.is_empty());
    }

    #[test]
    fn test_failed_update_restores_prior_record() {
        let (mut session, _) = session_with_workbook();
        let sel = selection((1, 2), (1, 1));
        let (mapping_id, create_op) = session
            .create_mapping(Some(&sel), "current_assets", Transform::Sum, None)
            .unwrap();
        let created = session.workbook().unwrap().mappings[0].clone();
        session
            .complete(create_op, StoreEnvelope::ok(StoreRecord::Mapping(created.clone())))
            .unwrap();

        let update_op = session
            .update_mapping(
                &mapping_id,
                MappingPatch {
                    destination_field: Some("net_assets".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(
            session.workbook().unwrap().mappings[0].destination_field,
            "net_assets"
        );

        session
            .complete(update_op, StoreEnvelope::err("conflict"))
            .unwrap_err();
        assert_eq!(session.workbook().unwrap().mappings[0], created);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let (mut session, _) = session_with_workbook();
        let sel = selection((1, 1), (1, 1));
        let (mapping_id, _) = session
            .create_mapping(Some(&sel), "cash", Transform::First, None)
            .unwrap();

        assert!(session.delete_mapping(&mapping_id).unwrap().is_some());
        // Second delete: no-op success.
        assert_eq!(session.delete_mapping(&mapping_id).unwrap(), None);
    }

    #[test]
    fn test_delete_rollback_restores_creation_order() {
        let (mut session, _) = session_with_workbook();
        let first = selection((1, 1), (0, 1));
        let second = selection((2, 2), (0, 1));
        let (id_a, _) = session
            .create_mapping(Some(&first), "a", Transform::Sum, None)
            .unwrap();
        let (id_b, _) = session
            .create_mapping(Some(&second), "b", Transform::Sum, None)
            .unwrap();

        let op = session.delete_mapping(&id_a).unwrap().unwrap();
        session.complete(op, StoreEnvelope::err("timeout")).unwrap_err();

        let ids: Vec<&str> = session
            .workbook()
            .unwrap()
            .mappings
            .iter()
            .map(|m| m.id.as_str())
            .collect();
        // First-created-wins overlap resolution depends on this order.
        assert_eq!(ids, vec![id_a.as_str(), id_b.as_str()]);
    }

    #[test]
    fn test_stale_completion_for_deselected_workbook_ignored() {
        let (mut session, _) = session_with_workbook();
        let sel = selection((1, 1), (1, 1));
        let (_, op) = session
            .create_mapping(Some(&sel), "cash", Transform::Sum, None)
            .unwrap();

        // User switches workbooks while the write is in flight.
        let other = Workbook::new("Other", BTreeMap::new());
        session.open_workbook(other);

        let outcome = session
            .complete(op, StoreEnvelope::err("would have rolled back"))
            .unwrap();
        assert_eq!(outcome, Completion::Ignored);
        // The newly selected workbook was not touched.
        assert!(session.workbook().unwrap().mappings.is_empty());
    }

    #[test]
    fn test_audit_persist_failure_reported_separately() {
        let (mut session, _) = session_with_workbook();
        let sel = selection((1, 1), (1, 1));
        let (_, mapping_op) = session
            .create_mapping(Some(&sel), "cash", Transform::Sum, None)
            .unwrap();

        let requests = session.take_requests();
        assert_eq!(requests.len(), 2);
        let audit_op = requests
            .iter()
            .find(|(id, _)| *id != mapping_op)
            .map(|(id, _)| *id)
            .unwrap();

        let mapping = session.workbook().unwrap().mappings[0].clone();
        session
            .complete(mapping_op, StoreEnvelope::ok(StoreRecord::Mapping(mapping)))
            .unwrap();
        let outcome = session
            .complete(audit_op, StoreEnvelope::err("audit log unavailable"))
            .unwrap();
        assert!(matches!(outcome, Completion::AuditPersistFailed(_)));
        // Mapping stands, and the local trail still has the entry.
        assert_eq!(session.workbook().unwrap().mappings.len(), 1);
        assert_eq!(session.audit().len(), 1);
    }

    #[test]
    fn test_reconcile_replaces_local_record_with_server_copy() {
        let (mut session, wb_id) = session_with_workbook();
        let sel = selection((1, 1), (1, 1));
        let (mapping_id, op) = session
            .create_mapping(Some(&sel), "cash", Transform::Sum, None)
            .unwrap();

        let mut server_copy = session.workbook().unwrap().mappings[0].clone();
        server_copy.color = "#000000".to_string(); // store normalized the color
        session
            .complete(op, StoreEnvelope::ok(StoreRecord::Mapping(server_copy)))
            .unwrap();

        let wb = session.workbook().unwrap();
        assert_eq!(wb.id, wb_id);
        assert_eq!(wb.mapping(&mapping_id).unwrap().color, "#000000");
    }

    #[test]
    fn test_reupload_bumps_version_and_keeps_previous() {
        let (mut session, _) = session_with_workbook();
        let mut sheets = BTreeMap::new();
        sheets.insert("Trial_Balance".to_string(), sheet(&[&["cash", "1350"]]));
        session.apply_reupload(sheets).unwrap();

        let wb = session.workbook().unwrap();
        assert_eq!(wb.version, "v2");
        assert_eq!(wb.previous_version.as_deref(), Some("v1"));
        let newest = session.audit().list_all();
        assert_eq!(newest[0].action, AuditAction::Reupload);
        let recent = session.recent_audit();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].action, AuditAction::Reupload);
    }

    #[test]
    fn test_named_range_crud_and_resolution() {
        let (mut session, _) = session_with_workbook();
        let (id, _) = session
            .create_named_range("tb_cash", "Trial_Balance!B1")
            .unwrap();

        let range = session.resolve_named_range("tb_cash").unwrap();
        assert_eq!(range.start, Coordinate::new(1, 1));

        session
            .update_named_range(&id, None, Some("Trial_Balance!B1:B4"))
            .unwrap();
        let range = session.select_by_name("tb_cash").unwrap();
        assert_eq!(range.end, Coordinate::new(4, 1));

        assert!(session.delete_named_range(&id).unwrap().is_some());
        assert_eq!(session.delete_named_range(&id).unwrap(), None);
        assert!(matches!(
            session.resolve_named_range("tb_cash"),
            Err(EngineError::NotFound(_))
        ));
    }

    #[test]
    fn test_named_range_rejects_whitespace_name() {
        let (mut session, _) = session_with_workbook();
        assert!(matches!(
            session.create_named_range("tb_cash ", "Trial_Balance!B1"),
            Err(EngineError::InvalidName(_))
        ));
    }

    #[test]
    fn test_take_requests_drains_once() {
        let (mut session, _) = session_with_workbook();
        let sel = selection((1, 1), (1, 1));
        session
            .create_mapping(Some(&sel), "cash", Transform::Sum, None)
            .unwrap();

        assert_eq!(session.take_requests().len(), 2);
        assert!(session.take_requests().is_empty());
        // Still pending until completions arrive.
        assert_eq!(session.pending_count(), 2);
    }
}
