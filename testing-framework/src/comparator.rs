//! Per-test comparison of an actual outcome against the expected one
//!
//! Routes exception outcomes to the exception comparator and tabular outcomes
//! through the orderer and the row/column differ, then applies the execution
//! time check.

use bqt_core::{
    ComparisonPolicy, FailureKind, QueryOutcome, QueryTestFailure, Result, TabularResult, Verdict,
};
use serde::{Deserialize, Serialize};

use crate::differ::RowColumnDiffer;
use crate::exceptions::ExceptionComparator;
use crate::ordering::order_if_needed;

/// Result of comparing one test's outcomes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonOutcome {
    /// Row, structure or exception verdict
    pub verdict: Verdict,
    /// Set when the query ran longer than its baseline allows, regardless of the verdict
    pub execution_time_exceeded: Option<QueryTestFailure>,
}

impl ComparisonOutcome {
    fn from_verdict(verdict: Verdict) -> Self {
        Self {
            verdict,
            execution_time_exceeded: None,
        }
    }

    /// Whether the results matched and the timing check passed
    pub fn is_pass(&self) -> bool {
        self.verdict.is_pass() && self.execution_time_exceeded.is_none()
    }
}

/// Compares actual query outcomes against expected ones under a fixed policy
#[derive(Debug, Clone)]
pub struct ResultComparator {
    policy: ComparisonPolicy,
    differ: RowColumnDiffer,
    exceptions: ExceptionComparator,
}

impl ResultComparator {
    /// Create a comparator for the given policy
    pub fn new(policy: ComparisonPolicy) -> Self {
        let differ = RowColumnDiffer::new(&policy);
        Self {
            policy,
            differ,
            exceptions: ExceptionComparator::new(),
        }
    }

    /// Comparison policy in use
    pub fn policy(&self) -> &ComparisonPolicy {
        &self.policy
    }

    /// Compare an actual outcome against the expected one
    ///
    /// `is_ordered` tells whether the query fixes the row order; unordered
    /// rows are compared after sorting both sides. Neither input is modified.
    ///
    /// Mismatches are reported in the returned outcome. An error means the
    /// comparison could not be carried out: a malformed result, an invalid
    /// expected-message pattern or an unreadable large object.
    pub fn compare(
        &self,
        actual: &QueryOutcome,
        expected: &QueryOutcome,
        is_ordered: bool,
    ) -> Result<ComparisonOutcome> {
        match (actual, expected) {
            (QueryOutcome::Exception(actual), QueryOutcome::Results(_)) => {
                let failure = QueryTestFailure::new(
                    FailureKind::UnexpectedException,
                    format!(
                        "TestResult resulted in unexpected exception {}: {}",
                        actual.class_name.as_deref().unwrap_or("<unknown>"),
                        actual.message
                    ),
                );
                Ok(ComparisonOutcome::from_verdict(failure.into()))
            }
            (QueryOutcome::Results(actual), QueryOutcome::Exception(expected)) => {
                let failure = QueryTestFailure::new(
                    FailureKind::MissingException,
                    format!(
                        "{} expected but not thrown, returned {} rows.",
                        expected.class_name.as_deref().unwrap_or_default(),
                        actual.row_count()
                    ),
                );
                Ok(ComparisonOutcome::from_verdict(failure.into()))
            }
            (QueryOutcome::Exception(actual), QueryOutcome::Exception(expected)) => {
                let verdict = match self.exceptions.compare(actual, expected)? {
                    Some(failure) => Verdict::Failed(failure),
                    None => Verdict::Pass,
                };
                Ok(ComparisonOutcome::from_verdict(verdict))
            }
            (QueryOutcome::Results(actual), QueryOutcome::Results(expected)) => {
                self.compare_tabular(actual, expected, is_ordered)
            }
        }
    }

    fn compare_tabular(
        &self,
        actual: &TabularResult,
        expected: &TabularResult,
        is_ordered: bool,
    ) -> Result<ComparisonOutcome> {
        actual.validate()?;
        expected.validate()?;

        let verdict = if expected.has_rows() {
            let (actual_rows, expected_rows) =
                order_if_needed(&actual.rows, &expected.rows, is_ordered);
            self.differ
                .compare_all(actual, &actual_rows, expected, &expected_rows)?
        } else if actual.has_rows() {
            QueryTestFailure::new(
                FailureKind::RowCount,
                format!(
                    "Expected results indicated no results, but actual shows {} rows.",
                    actual.row_count()
                ),
            )
            .into()
        } else {
            compare_update_counts(actual.update_count, expected.update_count)
        };

        let execution_time_exceeded = self
            .policy
            .check_execution_time(actual.execution_time_ms, expected.execution_time_ms)
            .map(|message| QueryTestFailure::new(FailureKind::ExecutionTime, message));

        Ok(ComparisonOutcome {
            verdict,
            execution_time_exceeded,
        })
    }
}

fn compare_update_counts(actual: Option<u64>, expected: Option<u64>) -> Verdict {
    match expected {
        Some(expected_count) if actual != Some(expected_count) => QueryTestFailure::new(
            FailureKind::UpdateCount,
            format!(
                "Expected update count: {}, actual update count: {}.",
                expected_count,
                actual.map_or_else(|| String::from("-1"), |count| count.to_string())
            ),
        )
        .into(),
        _ => Verdict::Pass,
    }
}
