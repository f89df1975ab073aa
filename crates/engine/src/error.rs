//! Engine error taxonomy.

use std::fmt;

use mapgrid_core::addr::AddressError;
use mapgrid_store::StoreError;

/// Error type for engine operations.
///
/// Address and validation failures are synchronous and recoverable locally;
/// `ExternalService` wraps a collaborator failure and always leaves local
/// state as it was before the operation (no partial apply).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Malformed or unparsable address string.
    InvalidAddress(AddressError),
    /// Missing selection, destination field, or out-of-bounds region.
    InvalidMapping(String),
    /// Named range name rejected (empty, surrounding whitespace, reads as a
    /// cell reference, or collides with an existing name).
    InvalidName(String),
    /// Named range, mapping, sheet, or workbook absent.
    NotFound(String),
    /// Wrapped failure from the document store or ingestion service.
    ExternalService(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidAddress(err) => write!(f, "invalid address: {err}"),
            Self::InvalidMapping(msg) => write!(f, "invalid mapping: {msg}"),
            Self::InvalidName(msg) => write!(f, "invalid name: {msg}"),
            Self::NotFound(what) => write!(f, "not found: {what}"),
            Self::ExternalService(msg) => write!(f, "external service error: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidAddress(err) => Some(err),
            _ => None,
        }
    }
}

impl From<AddressError> for EngineError {
    fn from(err: AddressError) -> Self {
        Self::InvalidAddress(err)
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        Self::ExternalService(err.to_string())
    }
}
