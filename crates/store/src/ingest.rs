//! Sheet ingestion interface.
//!
//! Upload and cloud-sync pipelines live outside this engine; what reaches us
//! is already-tabular string data per sheet, plus the anchor address where
//! the true data starts (sources often carry leading blank rows/columns, so
//! the anchor is not always `A1`).

use rustc_hash::FxHashMap;

use crate::StoreError;

/// One ingested sheet: tabular values and the anchor address of the
/// top-left data cell, e.g. `"Sheet1!B3"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestedSheet {
    pub values: Vec<Vec<String>>,
    pub address: String,
}

/// Access to a workbook that has been uploaded or linked from cloud storage.
/// `handle` identifies the source file in whatever scheme the ingestion
/// service uses; the engine treats it as opaque.
pub trait SheetIngestion {
    fn sheet_names(&self, handle: &str) -> Result<Vec<String>, StoreError>;
    fn sheet_data(&self, handle: &str, sheet_name: &str) -> Result<IngestedSheet, StoreError>;
}

/// Fixture-backed ingestion used by tests and local development.
#[derive(Debug, Default)]
pub struct StaticIngestion {
    workbooks: FxHashMap<String, Vec<(String, IngestedSheet)>>,
}

impl StaticIngestion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sheet for a handle. Sheets keep registration order.
    pub fn add_sheet(
        &mut self,
        handle: &str,
        sheet_name: &str,
        values: Vec<Vec<String>>,
        address: &str,
    ) {
        self.workbooks.entry(handle.to_string()).or_default().push((
            sheet_name.to_string(),
            IngestedSheet {
                values,
                address: address.to_string(),
            },
        ));
    }
}

impl SheetIngestion for StaticIngestion {
    fn sheet_names(&self, handle: &str) -> Result<Vec<String>, StoreError> {
        let sheets = self
            .workbooks
            .get(handle)
            .ok_or_else(|| StoreError::NotFound(format!("workbook handle '{handle}'")))?;
        Ok(sheets.iter().map(|(name, _)| name.clone()).collect())
    }

    fn sheet_data(&self, handle: &str, sheet_name: &str) -> Result<IngestedSheet, StoreError> {
        let sheets = self
            .workbooks
            .get(handle)
            .ok_or_else(|| StoreError::NotFound(format!("workbook handle '{handle}'")))?;
        sheets
            .iter()
            .find(|(name, _)| name == sheet_name)
            .map(|(_, sheet)| sheet.clone())
            .ok_or_else(|| StoreError::NotFound(format!("sheet '{sheet_name}' in '{handle}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_ingestion_round_trip() {
        let mut ingestion = StaticIngestion::new();
        ingestion.add_sheet(
            "tb.xlsx",
            "Trial_Balance",
            vec![vec!["cash".to_string(), "1200".to_string()]],
            "Trial_Balance!A1",
        );

        assert_eq!(
            ingestion.sheet_names("tb.xlsx").unwrap(),
            vec!["Trial_Balance".to_string()]
        );
        let sheet = ingestion.sheet_data("tb.xlsx", "Trial_Balance").unwrap();
        assert_eq!(sheet.address, "Trial_Balance!A1");
        assert_eq!(sheet.values[0][1], "1200");
    }

    #[test]
    fn test_static_ingestion_missing_handle() {
        let ingestion = StaticIngestion::new();
        assert!(matches!(
            ingestion.sheet_names("nope.xlsx"),
            Err(StoreError::NotFound(_))
        ));
    }
}
