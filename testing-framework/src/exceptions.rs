//! Comparison of an actual error against the expected one
//!
//! Messages are lower-cased on both sides before matching. Any mismatch is a
//! single failure; an expected message that is not a valid regular expression
//! is an error.

use bqt_core::{Error, ExceptionMatchMode, ExceptionOutcome, FailureKind, QueryTestFailure, Result};
use regex::RegexBuilder;

/// Compares exception class names and messages
#[derive(Debug, Clone, Copy, Default)]
pub struct ExceptionComparator;

impl ExceptionComparator {
    pub fn new() -> Self {
        Self
    }

    /// Compare the actual exception against the expected one
    ///
    /// The match mode is taken from `expected`.
    pub fn compare(
        &self,
        actual: &ExceptionOutcome,
        expected: &ExceptionOutcome,
    ) -> Result<Option<QueryTestFailure>> {
        let expected_class = expected.class_name.as_deref().unwrap_or_default();

        let Some(actual_class) = actual.class_name.as_deref() else {
            return Ok(Some(fail(format!(
                "Expected exception: {} but got none.",
                expected_class
            ))));
        };

        if expected_class != actual_class {
            return Ok(Some(fail(format!(
                "Got wrong exception, expected \"{}\" but got \"{}\"",
                expected_class, actual_class
            ))));
        }

        let expected_message = expected.message.to_lowercase();
        let actual_message = actual.message.to_lowercase();

        let failure = match expected.match_mode {
            // fails when the expected text is found in the actual message
            ExceptionMatchMode::Contains => actual_message.contains(&expected_message).then(|| {
                format!(
                    "Expected exception message {} is not contained in actual exception of {}",
                    expected_message, actual_message
                )
            }),
            ExceptionMatchMode::StartsWith => (!actual_message.starts_with(&expected_message)).then(|| {
                format!(
                    "Actual exception message {} does not start with the expected exception of {}",
                    actual_message, expected_message
                )
            }),
            ExceptionMatchMode::Regex => {
                let pattern = RegexBuilder::new(&expected_message)
                    .dot_matches_new_line(true)
                    .build()
                    .map_err(|e| Error::invalid_pattern(e.to_string()))?;
                (!pattern.is_match(&actual_message)).then(|| {
                    format!(
                        "Actual exception message {} does not match regex pattern {}",
                        actual_message, expected_message
                    )
                })
            }
            ExceptionMatchMode::Exact => (expected_message != actual_message
                && !line_tokens_match(&expected_message, &actual_message))
            .then(|| {
                format!(
                    "Got expected exception but with wrong message. Got {}",
                    actual_message
                )
            }),
        };

        Ok(failure.map(fail))
    }
}

fn fail(message: String) -> QueryTestFailure {
    QueryTestFailure::new(FailureKind::Exception, message)
}

/// Equal once split into non-empty lines
fn line_tokens_match(expected: &str, actual: &str) -> bool {
    line_tokens(expected) == line_tokens(actual)
}

fn line_tokens(s: &str) -> Vec<&str> {
    s.split(['\r', '\n']).filter(|token| !token.is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SQL_EXCEPTION: &str = "java.sql.SQLException";

    fn outcome(class: &str, message: &str, mode: ExceptionMatchMode) -> ExceptionOutcome {
        ExceptionOutcome::new(class, message).with_match_mode(mode)
    }

    fn compare(actual: &ExceptionOutcome, expected: &ExceptionOutcome) -> Option<QueryTestFailure> {
        ExceptionComparator::new().compare(actual, expected).unwrap()
    }

    #[test]
    fn test_exact_match() {
        let expected = outcome(SQL_EXCEPTION, "bad syntax", ExceptionMatchMode::Exact);
        let actual = outcome(SQL_EXCEPTION, "Bad Syntax", ExceptionMatchMode::Exact);
        assert!(compare(&actual, &expected).is_none());

        let actual = outcome(SQL_EXCEPTION, "bad grammar", ExceptionMatchMode::Exact);
        let failure = compare(&actual, &expected).unwrap();
        assert_eq!(
            failure.message,
            "Got expected exception but with wrong message. Got bad grammar"
        );
    }

    #[test]
    fn test_exact_tolerates_line_breaks() {
        let expected = outcome(SQL_EXCEPTION, "line one\nline two", ExceptionMatchMode::Exact);
        let actual = outcome(SQL_EXCEPTION, "line one\r\nline two\n", ExceptionMatchMode::Exact);
        assert!(compare(&actual, &expected).is_none());

        let actual = outcome(SQL_EXCEPTION, "line one line two", ExceptionMatchMode::Exact);
        assert!(compare(&actual, &expected).is_some());
    }

    #[test]
    fn test_wrong_class() {
        let expected = outcome(SQL_EXCEPTION, "bad syntax", ExceptionMatchMode::Exact);
        let actual = outcome("java.lang.RuntimeException", "bad syntax", ExceptionMatchMode::Exact);
        let failure = compare(&actual, &expected).unwrap();
        assert_eq!(
            failure.message,
            "Got wrong exception, expected \"java.sql.SQLException\" but got \"java.lang.RuntimeException\""
        );
        assert_eq!(failure.kind, FailureKind::Exception);
    }

    #[test]
    fn test_missing_actual_class() {
        let expected = outcome(SQL_EXCEPTION, "bad syntax", ExceptionMatchMode::Exact);
        let actual = ExceptionOutcome::default();
        let failure = compare(&actual, &expected).unwrap();
        assert_eq!(
            failure.message,
            "Expected exception: java.sql.SQLException but got none."
        );
    }

    #[test]
    fn test_contains_fails_when_found() {
        let expected = outcome(SQL_EXCEPTION, "table", ExceptionMatchMode::Contains);
        let actual = outcome(SQL_EXCEPTION, "Unknown TABLE foo", ExceptionMatchMode::Exact);
        assert!(compare(&actual, &expected).is_some());

        let actual = outcome(SQL_EXCEPTION, "Unknown column", ExceptionMatchMode::Exact);
        assert!(compare(&actual, &expected).is_none());
    }

    #[test]
    fn test_starts_with() {
        let expected = outcome(SQL_EXCEPTION, "error 42", ExceptionMatchMode::StartsWith);
        let actual = outcome(SQL_EXCEPTION, "ERROR 42: no such table", ExceptionMatchMode::Exact);
        assert!(compare(&actual, &expected).is_none());

        let actual = outcome(SQL_EXCEPTION, "warning: error 42", ExceptionMatchMode::Exact);
        assert!(compare(&actual, &expected).is_some());
    }

    #[test]
    fn test_regex_dot_matches_newline() {
        let expected = outcome(SQL_EXCEPTION, "first.*second", ExceptionMatchMode::Regex);
        let actual = outcome(SQL_EXCEPTION, "prefix first\nthen second", ExceptionMatchMode::Exact);
        assert!(compare(&actual, &expected).is_none());

        let actual = outcome(SQL_EXCEPTION, "second before first", ExceptionMatchMode::Exact);
        let failure = compare(&actual, &expected).unwrap();
        assert!(failure.message.contains("does not match regex pattern first.*second"));
    }

    #[test]
    fn test_invalid_regex_is_error() {
        let expected = outcome(SQL_EXCEPTION, "unclosed (group", ExceptionMatchMode::Regex);
        let actual = outcome(SQL_EXCEPTION, "anything", ExceptionMatchMode::Exact);
        let err = ExceptionComparator::new().compare(&actual, &expected).unwrap_err();
        assert!(matches!(err, Error::InvalidPattern(_)));
    }
}
