//! Append-only audit trail.
//!
//! Every create/update/delete of a mapping, named range, or workbook version
//! produces one immutable entry, regardless of which actor performed it.
//! There is no mutation or deletion API; corrections are new entries.

use chrono::{DateTime, Utc};

use mapgrid_core::model::{AuditAction, AuditLogEntry};

/// In-memory audit trail for the current session. The document store holds
/// the durable copy; persistence of each entry is best-effort and never
/// blocks the operation that produced it.
#[derive(Debug, Clone, Default)]
pub struct AuditTrail {
    entries: Vec<AuditLogEntry>,
}

impl AuditTrail {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry stamped with the current time.
    pub fn record(
        &mut self,
        action: AuditAction,
        subject_workbook_id: &str,
        actor: &str,
        details: impl Into<String>,
    ) -> &AuditLogEntry {
        self.record_at(action, subject_workbook_id, actor, details, Utc::now())
    }

    /// Append an entry with an explicit timestamp. Used for imports and
    /// backfill, where the event time is not the wall clock.
    pub fn record_at(
        &mut self,
        action: AuditAction,
        subject_workbook_id: &str,
        actor: &str,
        details: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> &AuditLogEntry {
        let entry = AuditLogEntry::new(action, subject_workbook_id, actor, details, timestamp);
        self.entries.push(entry);
        self.entries.last().unwrap()
    }

    /// Entries for one workbook, newest first. Identical timestamps keep
    /// insertion order (stable sort).
    pub fn list_for_workbook(&self, workbook_id: &str) -> Vec<&AuditLogEntry> {
        let mut entries: Vec<&AuditLogEntry> = self
            .entries
            .iter()
            .filter(|e| e.subject_workbook_id == workbook_id)
            .collect();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries
    }

    /// All entries, newest first, stable on ties.
    pub fn list_all(&self) -> Vec<&AuditLogEntry> {
        let mut entries: Vec<&AuditLogEntry> = self.entries.iter().collect();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
