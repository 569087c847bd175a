//! Row/column differ
//!
//! Structural problems (column count, names, types, row count) end the
//! comparison with a single failure. Cell mismatches are collected across the
//! whole grid so one pass reports all of them.

use bqt_core::{
    ComparisonPolicy, FailureKind, MultiFailure, QueryTestFailure, Result, TabularResult, Verdict,
};

use crate::cell::{CellComparator, CellPosition};
use crate::ordering::IndexedRow;
use crate::utils::short_name;

/// Type name an actual binary large object column is reported as
pub const CANONICAL_BLOB_TYPE: &str = "byte[]";

/// Compares two tabular results column by column and row by row
#[derive(Debug, Clone, Copy)]
pub struct RowColumnDiffer {
    cells: CellComparator,
}

impl RowColumnDiffer {
    pub fn new(policy: &ComparisonPolicy) -> Self {
        Self {
            cells: CellComparator::new(policy),
        }
    }

    /// Compare metadata, row count and every cell
    ///
    /// `actual_rows` and `expected_rows` are the rows of `actual` and
    /// `expected` in comparison order.
    pub fn compare_all(
        &self,
        actual: &TabularResult,
        actual_rows: &[IndexedRow<'_>],
        expected: &TabularResult,
        expected_rows: &[IndexedRow<'_>],
    ) -> Result<Verdict> {
        if let Some(failure) = compare_identifiers(actual, expected) {
            return Ok(failure.into());
        }

        if let Some(failure) = compare_row_counts(actual_rows.len(), expected_rows.len()) {
            return Ok(failure.into());
        }

        let mut failures = MultiFailure::new();
        for (row_index, (actual_row, expected_row)) in
            actual_rows.iter().zip(expected_rows.iter()).enumerate()
        {
            for (column_index, (actual_value, expected_value)) in actual_row
                .values
                .iter()
                .zip(expected_row.values.iter())
                .enumerate()
            {
                let position = CellPosition {
                    row: row_index + 1,
                    column: column_index + 1,
                    actual_original_row: actual_row.original_index + 1,
                    expected_original_row: expected_row.original_index + 1,
                };
                if let Some(failure) = self.cells.compare(actual_value, expected_value, &position)? {
                    failures.add_failure(failure);
                }
            }
        }

        if !failures.is_empty() {
            log::debug!("Collected {} cell mismatches", failures.total_failures());
        }
        Ok(failures.into_verdict())
    }
}

/// Check column count, short names and type names
pub fn compare_identifiers(
    actual: &TabularResult,
    expected: &TabularResult,
) -> Option<QueryTestFailure> {
    if expected.column_names.len() != actual.column_names.len() {
        return Some(QueryTestFailure::new(
            FailureKind::Structure,
            format!(
                "Got incorrect number of columns, expected = {}, actual = {}",
                expected.column_names.len(),
                actual.column_names.len()
            ),
        ));
    }

    let columns = actual
        .column_names
        .iter()
        .zip(expected.column_names.iter())
        .zip(actual.column_types.iter().zip(expected.column_types.iter()));

    for (index, ((actual_name, expected_name), (actual_type, expected_type))) in columns.enumerate() {
        let actual_short = short_name(actual_name);
        let expected_short = short_name(expected_name);
        if !expected_short.eq_ignore_ascii_case(actual_short) {
            return Some(QueryTestFailure::new(
                FailureKind::Structure,
                format!(
                    "Got incorrect column name at column {}, expected = {} but got = {}",
                    index + 1,
                    expected_short,
                    actual_short
                ),
            ));
        }

        let actual_type = if actual_type.eq_ignore_ascii_case("blob") {
            CANONICAL_BLOB_TYPE
        } else {
            actual_type.as_str()
        };
        if !expected_type.eq_ignore_ascii_case(actual_type) {
            return Some(QueryTestFailure::new(
                FailureKind::Structure,
                format!(
                    "Got incorrect column type at column {}, expected = {} but got = {}",
                    index + 1,
                    expected_type,
                    actual_type
                ),
            ));
        }
    }

    None
}

fn compare_row_counts(actual: usize, expected: usize) -> Option<QueryTestFailure> {
    let message = if actual < expected {
        format!("Expected {} records but received only {}", expected, actual)
    } else if actual > expected {
        format!("Expected {} records but received {}", expected, actual)
    } else {
        return None;
    };
    Some(QueryTestFailure::new(FailureKind::RowCount, message))
}
