//! Named range registry rules.
//!
//! Names are matched case-sensitively and exactly: surrounding whitespace is
//! a validation error, never trimmed silently, so "ppe_values " can never
//! coexist with "ppe_values" as a lookalike duplicate. Address strings are
//! validated through the address codec before a record is accepted, and a
//! malformed address surfaces as the codec's own error class rather than a
//! generic failure.

use mapgrid_core::addr::{column_letter_to_index, parse_address};
use mapgrid_core::coord::Range;
use mapgrid_core::model::{NamedRange, Workbook};
use uuid::Uuid;

use crate::error::EngineError;

/// Validate a named range identifier.
///
/// Rules:
/// - No surrounding whitespace (rejected, not trimmed)
/// - Must start with a letter or underscore
/// - May contain letters, digits, and underscores
/// - Must not read as a bare cell reference (B2, AA10)
pub fn validate_name(name: &str) -> Result<(), EngineError> {
    if name.is_empty() {
        return Err(EngineError::InvalidName("name must not be empty".to_string()));
    }
    if name != name.trim() {
        return Err(EngineError::InvalidName(format!(
            "name '{name}' has surrounding whitespace"
        )));
    }
    let first = name.chars().next().unwrap();
    if !first.is_ascii_alphabetic() && first != '_' {
        return Err(EngineError::InvalidName(format!(
            "name '{name}' must start with a letter or underscore"
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(EngineError::InvalidName(format!(
            "name '{name}' may only contain letters, digits, and underscores"
        )));
    }
    if looks_like_cell_ref(name) {
        return Err(EngineError::InvalidName(format!(
            "name '{name}' reads as a cell reference"
        )));
    }
    Ok(())
}

/// Whether a candidate name would parse as a cell reference (case-insensitive,
/// column within Excel's A..XFD range).
fn looks_like_cell_ref(name: &str) -> bool {
    let letters: String = name.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
    if letters.is_empty() || letters.len() > 3 {
        return false;
    }
    let digits = &name[letters.len()..];
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    match column_letter_to_index(&letters.to_ascii_uppercase()) {
        Ok(col) => col <= 16_383 && digits.parse::<u64>().map(|r| r >= 1).unwrap_or(false),
        Err(_) => false,
    }
}

/// Validate an address string through the codec and return the range it
/// denotes.
pub fn validate_address(address: &str) -> Result<Range, EngineError> {
    Ok(parse_address(address)?)
}

/// Build a named range record, validating both name and address.
pub fn build_named_range(
    workbook: &Workbook,
    name: &str,
    address: &str,
) -> Result<NamedRange, EngineError> {
    validate_name(name)?;
    ensure_name_available(workbook, name, None)?;
    validate_address(address)?;
    Ok(NamedRange {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        range: address.to_string(),
    })
}

/// Reject a name already used by a different named range in this workbook.
pub fn ensure_name_available(
    workbook: &Workbook,
    name: &str,
    exclude_id: Option<&str>,
) -> Result<(), EngineError> {
    let taken = workbook
        .named_ranges
        .iter()
        .any(|nr| nr.name == name && Some(nr.id.as_str()) != exclude_id);
    if taken {
        return Err(EngineError::InvalidName(format!(
            "name '{name}' already exists in this workbook"
        )));
    }
    Ok(())
}

/// Exact-name lookup, resolved to the range its address denotes.
pub fn resolve(workbook: &Workbook, name: &str) -> Result<Range, EngineError> {
    let nr = workbook
        .named_range_by_name(name)
        .ok_or_else(|| EngineError::NotFound(format!("named range '{name}'")))?;
    Ok(parse_address(&nr.range)?)
}

/// Click-to-select by name: resolves the range so the caller can switch the
/// active sheet to `range.sheet` and seed a selection from it.
pub fn select_by_name(workbook: &Workbook, name: &str) -> Result<Range, EngineError> {
    resolve(workbook, name)
}
