//! Excel-style address codec.
//!
//! Converts between 0-based column indices and column letters, and parses and
//! formats `"Sheet!A1"` / `"Sheet!A1:B5"` address strings. Column letters are
//! a base-26 odometer with digits A..Z worth 1..26 and no zero digit, so Z
//! rolls over to AA rather than A0.
//!
//! This module is the only place address strings are taken apart; every other
//! component passes `Range` values around.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

use crate::coord::{Coordinate, Range};

static CELL_REF_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([A-Z]+)([0-9]+)$").unwrap());

/// Address parsing failure. All variants are `InvalidAddress`-class errors:
/// synchronous, recoverable, surfaced to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// Empty column-letter input.
    EmptyColumn,
    /// Column letters contain a character outside `A-Z`.
    InvalidColumn(String),
    /// Address string has no `!` between sheet name and cell reference.
    MissingSheetSeparator(String),
    /// Sheet name part before the `!` is empty.
    EmptySheetName(String),
    /// Cell reference does not match `[A-Z]+[0-9]+`, or its row is zero or
    /// too large to represent.
    MalformedCellRef(String),
}

impl fmt::Display for AddressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyColumn => write!(f, "column letters are empty"),
            Self::InvalidColumn(s) => write!(f, "invalid column letters '{s}': expected A-Z only"),
            Self::MissingSheetSeparator(s) => {
                write!(f, "address '{s}' is missing the '!' sheet separator")
            }
            Self::EmptySheetName(s) => write!(f, "address '{s}' has an empty sheet name"),
            Self::MalformedCellRef(s) => {
                write!(f, "malformed cell reference '{s}': expected letters then digits, e.g. B2")
            }
        }
    }
}

impl std::error::Error for AddressError {}

/// Convert column letters to a 0-based column index (A=0, Z=25, AA=26).
pub fn column_letter_to_index(letters: &str) -> Result<usize, AddressError> {
    if letters.is_empty() {
        return Err(AddressError::EmptyColumn);
    }
    let mut acc: usize = 0;
    for ch in letters.chars() {
        if !ch.is_ascii_uppercase() {
            return Err(AddressError::InvalidColumn(letters.to_string()));
        }
        acc = acc * 26 + (ch as usize - 'A' as usize + 1);
    }
    Ok(acc - 1)
}

/// Convert a 0-based column index to letters (0=A, 25=Z, 26=AA).
/// Exact inverse of `column_letter_to_index` for any index.
pub fn index_to_column_letter(index: usize) -> String {
    let mut s = String::new();
    let mut n = index;
    loop {
        s.insert(0, (b'A' + (n % 26) as u8) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    s
}

/// Parse a bare cell reference like `B2` into a coordinate.
pub fn parse_cell_ref(cell: &str) -> Result<Coordinate, AddressError> {
    let caps = CELL_REF_RE
        .captures(cell)
        .ok_or_else(|| AddressError::MalformedCellRef(cell.to_string()))?;
    let col = column_letter_to_index(&caps[1])?;
    let row: usize = caps[2]
        .parse()
        .map_err(|_| AddressError::MalformedCellRef(cell.to_string()))?;
    if row == 0 {
        // Rows are 1-based; "A0" is not a cell.
        return Err(AddressError::MalformedCellRef(cell.to_string()));
    }
    Ok(Coordinate { row, col })
}

/// Parse `"Sheet!A1"` or `"Sheet!A1:B5"` into a range.
///
/// Splits on the first `!` (sheet names must not contain `!`), then on `:`.
/// Corners are returned as written; callers that need the canonical order use
/// `Range::normalized`.
pub fn parse_address(address: &str) -> Result<Range, AddressError> {
    let (sheet, cells) = address
        .split_once('!')
        .ok_or_else(|| AddressError::MissingSheetSeparator(address.to_string()))?;
    if sheet.is_empty() {
        return Err(AddressError::EmptySheetName(address.to_string()));
    }
    match cells.split_once(':') {
        Some((first, second)) => {
            let start = parse_cell_ref(first)?;
            let end = parse_cell_ref(second)?;
            Ok(Range::new(sheet, start, end))
        }
        None => {
            let at = parse_cell_ref(cells)?;
            Ok(Range::cell(sheet, at))
        }
    }
}

/// Format a range as an address string. Inverse of `parse_address`.
///
/// Normalizes first, and emits a single-cell range as `"Sheet!A1"` - never a
/// degenerate `"Sheet!A1:A1"`.
pub fn format_address(range: &Range) -> String {
    let n = range.normalized();
    let start = format_cell_ref(n.start);
    if n.is_single() {
        format!("{}!{}", n.sheet, start)
    } else {
        format!("{}!{}:{}", n.sheet, start, format_cell_ref(n.end))
    }
}

/// Format a coordinate as a bare cell reference like `B2`.
pub fn format_cell_ref(at: Coordinate) -> String {
    format!("{}{}", index_to_column_letter(at.col), at.row)
}
