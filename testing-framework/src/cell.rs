//! Value-level comparison of one actual cell against its expected cell

use bqt_core::normalize::normalize_pair;
use bqt_core::{
    ComparisonPolicy, MismatchRecord, NumericMatch, QueryTestFailure, Result,
    TolerantNumericComparator, Value,
};
use std::borrow::Cow;
use std::fmt;

use crate::string_match::match_strings;

/// Position of a cell, all numbers 1-based
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellPosition {
    /// Row in comparison order
    pub row: usize,
    pub column: usize,
    /// Row in the actual result as delivered
    pub actual_original_row: usize,
    /// Row in the expected result as delivered
    pub expected_original_row: usize,
}

impl fmt::Display for CellPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "at row {} and column {} (row in actual result: {}, row in expected result: {})",
            self.row, self.column, self.actual_original_row, self.expected_original_row
        )
    }
}

/// Applies the null, numeric tolerance, equality and text rules to one cell
#[derive(Debug, Clone, Copy)]
pub struct CellComparator {
    numeric: TolerantNumericComparator,
}

impl CellComparator {
    pub fn new(policy: &ComparisonPolicy) -> Self {
        Self {
            numeric: TolerantNumericComparator::new(policy),
        }
    }

    /// Compare one cell
    ///
    /// `Ok(None)` is a match. A mismatch is returned as a failure; only a
    /// failure to read a large object is an error.
    pub fn compare(
        &self,
        actual: &Value,
        expected: &Value,
        position: &CellPosition,
    ) -> Result<Option<QueryTestFailure>> {
        match (actual.is_null(), expected.is_null()) {
            (true, true) => return Ok(None),
            (false, false) => {}
            _ => {
                return Ok(Some(value_mismatch(position, expected, actual, None)));
            }
        }

        let (actual, expected) = normalize_pair(actual, expected)?;

        match self.numeric.compare(&expected, &actual) {
            NumericMatch::Within => return Ok(None),
            NumericMatch::Outside => {
                let note = format!(" {{allowed divergence: {}}}", self.numeric.divergence());
                return Ok(Some(value_mismatch(position, &expected, &actual, Some(&note))));
            }
            NumericMatch::NotApplicable => {}
        }

        if actual == expected {
            return Ok(None);
        }

        let (actual, expected) = if actual.is_date_time() || expected.is_date_time() {
            (stringify(actual), stringify(expected))
        } else {
            (actual, expected)
        };

        let Some(expected_text) = expected.as_text() else {
            return Ok(Some(value_mismatch(position, &expected, &actual, None)));
        };

        let Some(actual_text) = actual.as_text() else {
            let message = format!(
                "Value (types) mismatch {}: expected = [{}, ({}) ], actual = [{}, ({}) ]",
                position,
                expected_text,
                expected.type_name(),
                actual,
                actual.type_name()
            );
            return Ok(Some(failure(position, &expected, &actual, message)));
        };

        Ok(match_strings(expected_text, actual_text).map(|mismatch| {
            let message = format!("String mismatch {}. {}", position, mismatch.describe());
            failure(position, &expected, &actual, message)
        }))
    }
}

fn stringify(value: Cow<'_, Value>) -> Cow<'_, Value> {
    if value.as_text().is_some() {
        value
    } else {
        Cow::Owned(Value::Text(value.to_string()))
    }
}

fn value_mismatch(
    position: &CellPosition,
    expected: &Value,
    actual: &Value,
    note: Option<&str>,
) -> QueryTestFailure {
    let message = format!(
        "Value mismatch {}: expected = [{}], actual = [{}]{}",
        position,
        expected,
        actual,
        note.unwrap_or_default()
    );
    failure(position, expected, actual, message)
}

fn failure(
    position: &CellPosition,
    expected: &Value,
    actual: &Value,
    message: String,
) -> QueryTestFailure {
    let record = MismatchRecord {
        row: position.row,
        column: position.column,
        actual_original_row: position.actual_original_row,
        expected_original_row: position.expected_original_row,
        expected_value: expected.to_string(),
        actual_value: actual.to_string(),
    };
    QueryTestFailure::cell(record, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bqt_core::{Error, FailureKind, LargeObject, LobSource};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use std::io::Read;
    use std::str::FromStr;
    use std::sync::Arc;

    const POS: CellPosition = CellPosition {
        row: 2,
        column: 3,
        actual_original_row: 1,
        expected_original_row: 2,
    };

    fn exact() -> CellComparator {
        CellComparator::new(&ComparisonPolicy::exact())
    }

    fn tolerant(divergence: &str) -> CellComparator {
        let policy = ComparisonPolicy::exact()
            .with_allowed_divergence(Decimal::from_str(divergence).unwrap());
        CellComparator::new(&policy)
    }

    #[test]
    fn test_nulls() {
        let cmp = exact();
        assert!(cmp.compare(&Value::Null, &Value::Null, &POS).unwrap().is_none());

        let failure = cmp
            .compare(&Value::Null, &Value::Integer(1), &POS)
            .unwrap()
            .unwrap();
        assert_eq!(failure.kind, FailureKind::Cell);
        assert_eq!(
            failure.message,
            "Value mismatch at row 2 and column 3 (row in actual result: 1, row in expected result: 2): expected = [1], actual = [null]"
        );
        let record = failure.mismatch.unwrap();
        assert_eq!(record.row, 2);
        assert_eq!(record.column, 3);
        assert_eq!(record.actual_value, "null");
    }

    #[test]
    fn test_numeric_tolerance() {
        let cmp = tolerant("0.5");
        assert!(cmp
            .compare(&Value::Double(10.4), &Value::Double(10.0), &POS)
            .unwrap()
            .is_none());

        let failure = cmp
            .compare(&Value::Double(10.6), &Value::Double(10.0), &POS)
            .unwrap()
            .unwrap();
        assert!(failure.message.ends_with("{allowed divergence: 0.5}"));
        assert!(failure.message.contains("expected = [10.0], actual = [10.6]"));
    }

    #[test]
    fn test_cross_kind_numbers_use_equality() {
        let cmp = tolerant("0.5");
        let failure = cmp
            .compare(&Value::Float(10.0), &Value::Double(10.0), &POS)
            .unwrap();
        assert!(failure.is_some());
        assert!(cmp
            .compare(&Value::Integer(7), &Value::Integer(7), &POS)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_string_mismatch_message() {
        let failure = exact()
            .compare(&Value::from("abXd"), &Value::from("abcd"), &POS)
            .unwrap()
            .unwrap();
        assert!(failure.message.starts_with(
            "String mismatch at row 2 and column 3 (row in actual result: 1, row in expected result: 2). Expected: abcd but was: abXd"
        ));
    }

    #[test]
    fn test_type_mismatch() {
        let failure = exact()
            .compare(&Value::Integer(5), &Value::from("5"), &POS)
            .unwrap()
            .unwrap();
        assert!(failure.message.starts_with("Value (types) mismatch"));
        assert!(failure
            .message
            .ends_with("expected = [5, (string) ], actual = [5, (integer) ]"));
    }

    #[test]
    fn test_dates_compared_as_text() {
        let date = NaiveDate::from_ymd_opt(2020, 1, 31).unwrap();
        assert!(exact()
            .compare(&Value::Date(date), &Value::from("2020-01-31"), &POS)
            .unwrap()
            .is_none());

        let failure = exact()
            .compare(&Value::Date(date), &Value::from("2020-01-30"), &POS)
            .unwrap()
            .unwrap();
        assert!(failure.message.starts_with("String mismatch"));
    }

    #[test]
    fn test_clob_against_text() {
        let actual = Value::Clob(LargeObject::from_bytes("some text"));
        assert!(exact()
            .compare(&actual, &Value::from("some text"), &POS)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_bytes_against_base64_text() {
        let actual = Value::Bytes(vec![1, 2, 3]);
        assert!(exact()
            .compare(&actual, &Value::from("AQID"), &POS)
            .unwrap()
            .is_none());
    }

    #[derive(Debug)]
    struct Unreadable;

    impl LobSource for Unreadable {
        fn open(&self) -> std::io::Result<Box<dyn Read + '_>> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "stream gone"))
        }
    }

    #[test]
    fn test_lob_read_failure_is_error() {
        let actual = Value::Blob(LargeObject::from_source(Arc::new(Unreadable)));
        let err = exact()
            .compare(&actual, &Value::from("AQID"), &POS)
            .unwrap_err();
        assert!(matches!(err, Error::LargeObject(_)));
    }
}
