// Property-based tests for the address codec and range normalization.
// CI: 256 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use proptest::prelude::*;

use mapgrid_core::addr::{
    column_letter_to_index, format_address, index_to_column_letter, parse_address,
};
use mapgrid_core::coord::{Coordinate, Range};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn config_256() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

/// Sheet names as they appear in the product: letters, digits, underscores.
fn arb_sheet_name() -> impl Strategy<Value = String> {
    r"[A-Za-z_][A-Za-z0-9_]{0,19}"
}

fn arb_coordinate() -> impl Strategy<Value = Coordinate> {
    (1usize..=1_048_576, 0usize..=16_383).prop_map(|(row, col)| Coordinate { row, col })
}

fn arb_range() -> impl Strategy<Value = Range> {
    (arb_sheet_name(), arb_coordinate(), arb_coordinate())
        .prop_map(|(sheet, start, end)| Range::new(sheet, start, end))
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]

    /// Column letters and indices are bijective well past Excel's ceiling.
    #[test]
    fn prop_column_round_trip(n in 0usize..200_000) {
        let letters = index_to_column_letter(n);
        prop_assert_eq!(column_letter_to_index(&letters).unwrap(), n);
    }

    /// Formatting then parsing any range yields the normalized original.
    #[test]
    fn prop_address_round_trip(range in arb_range()) {
        let formatted = format_address(&range);
        let parsed = parse_address(&formatted).unwrap();
        prop_assert_eq!(parsed.normalized(), range.normalized());
    }

    /// Normalization is idempotent.
    #[test]
    fn prop_normalize_idempotent(range in arb_range()) {
        let once = range.normalized();
        prop_assert_eq!(once.normalized(), once);
    }

    /// Normalized ranges always have start <= end per axis.
    #[test]
    fn prop_normalized_orders_corners(range in arb_range()) {
        let n = range.normalized();
        prop_assert!(n.start.row <= n.end.row);
        prop_assert!(n.start.col <= n.end.col);
    }
}
