//! Row order canonicalization for unordered queries
//!
//! Rows are never moved in the caller's result. Sorting works on views that
//! pair each row with its position in the result as delivered, so mismatch
//! reports can name both positions.

use bqt_core::Value;
use std::cmp::Ordering;

/// Number of leading columns used as the sort key
pub const SORT_KEY_COLUMNS: usize = 3;

/// Borrowed row together with its position in the original result
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexedRow<'a> {
    /// Zero-based position in the result as delivered
    pub original_index: usize,
    pub values: &'a [Value],
}

/// Attach original positions to rows
pub fn index_rows(rows: &[Vec<Value>]) -> Vec<IndexedRow<'_>> {
    rows.iter()
        .enumerate()
        .map(|(original_index, values)| IndexedRow {
            original_index,
            values,
        })
        .collect()
}

/// Row views in comparison order
///
/// When the query is unordered and both sides have rows, each side is
/// sorted ascending on its first `SORT_KEY_COLUMNS` columns. Otherwise the
/// views keep the delivered order.
pub fn order_if_needed<'a, 'b>(
    actual_rows: &'a [Vec<Value>],
    expected_rows: &'b [Vec<Value>],
    is_ordered: bool,
) -> (Vec<IndexedRow<'a>>, Vec<IndexedRow<'b>>) {
    let mut actual = index_rows(actual_rows);
    let mut expected = index_rows(expected_rows);

    if !is_ordered && !actual.is_empty() && !expected.is_empty() {
        sort_rows(&mut actual);
        sort_rows(&mut expected);
        log::debug!(
            "Sorted {} actual and {} expected rows before comparison",
            actual.len(),
            expected.len()
        );
    }

    (actual, expected)
}

fn sort_rows(rows: &mut [IndexedRow<'_>]) {
    let key_width = rows
        .first()
        .map_or(0, |row| row.values.len().min(SORT_KEY_COLUMNS));
    if key_width == 0 {
        return;
    }
    rows.sort_by(|a, b| compare_keys(a.values, b.values, key_width));
}

fn compare_keys(a: &[Value], b: &[Value], key_width: usize) -> Ordering {
    a.iter()
        .zip(b.iter())
        .take(key_width)
        .map(|(x, y)| x.sort_cmp(y))
        .find(|ordering| *ordering != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}
