//! Structured comparison failures
//!
//! A single comparison pass can detect many cell mismatches. They are
//! collected into a `MultiFailure` so the whole grid is reported at once,
//! bounded by `SAVED_FAILURES_LIMIT` stored entries.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of failures kept by a `MultiFailure`
pub const SAVED_FAILURES_LIMIT: usize = 2000;

/// Category of a detected discrepancy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Column count, name or type mismatch
    Structure,
    /// Row count mismatch, including rows where none were expected
    RowCount,
    /// Update count mismatch
    UpdateCount,
    /// Value mismatch in one cell
    Cell,
    /// Expected exception was not matched
    Exception,
    /// An exception was raised but none was expected
    UnexpectedException,
    /// Rows were returned but an exception was expected
    MissingException,
    /// The query took longer than its expected baseline allows
    ExecutionTime,
    /// The harness could not run or compare the test
    Framework,
    /// Placeholder standing in for failures beyond the storage limit
    Truncated,
}

/// Location and values of one cell-level discrepancy
///
/// All row and column numbers are 1-based. `row` is the position in the
/// compared (possibly sorted) order; the `*_original_row` fields locate the
/// row in the result as the engine or the expected file delivered it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MismatchRecord {
    pub row: usize,
    pub column: usize,
    pub actual_original_row: usize,
    pub expected_original_row: usize,
    pub expected_value: String,
    pub actual_value: String,
}

/// One test failure with its diagnostic message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryTestFailure {
    pub kind: FailureKind,
    pub message: String,
    pub mismatch: Option<MismatchRecord>,
}

impl QueryTestFailure {
    /// Create a failure without cell location
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            mismatch: None,
        }
    }

    /// Create a cell mismatch failure
    pub fn cell(record: MismatchRecord, message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Cell,
            message: message.into(),
            mismatch: Some(record),
        }
    }

    /// Failure message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for QueryTestFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Aggregate of the failures found in one comparison pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiFailure {
    failures: Vec<QueryTestFailure>,
    total_failures: u64,
}

impl MultiFailure {
    /// Create an empty collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure; failures beyond the limit are only counted
    pub fn add_failure(&mut self, failure: QueryTestFailure) {
        if self.failures.len() < SAVED_FAILURES_LIMIT {
            self.failures.push(failure);
        }
        self.total_failures += 1;
    }

    /// Total number of failures, including those not stored
    pub fn total_failures(&self) -> u64 {
        self.total_failures
    }

    /// Whether nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.total_failures == 0
    }

    /// Stored failures
    ///
    /// When more failures were recorded than stored, the last entry is
    /// replaced by a "(+N more failures)" placeholder so the list never grows
    /// past the limit.
    pub fn failures(&self) -> Vec<QueryTestFailure> {
        let mut failures = self.failures.clone();
        let limit = SAVED_FAILURES_LIMIT as u64;
        if self.total_failures > limit {
            if let Some(last) = failures.last_mut() {
                *last = QueryTestFailure::new(
                    FailureKind::Truncated,
                    format!("(+{} more failures)", self.total_failures - limit),
                );
            }
        }
        failures
    }

    /// First failure message followed by the number of further failures
    pub fn message(&self) -> String {
        match self.failures.first() {
            Some(first) => format!(
                "{} (+{} more failures)",
                first.message,
                self.total_failures.saturating_sub(1)
            ),
            None => String::from("No failures"),
        }
    }

    /// Collapse into a verdict: none is a pass, one stays a plain failure
    pub fn into_verdict(mut self) -> Verdict {
        match self.total_failures {
            0 => Verdict::Pass,
            1 => match self.failures.pop() {
                Some(failure) => Verdict::Failed(failure),
                None => Verdict::Pass,
            },
            _ => Verdict::MultiFailed(self),
        }
    }
}

impl fmt::Display for MultiFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

/// Pass/fail result of comparing one actual outcome against its expectation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Pass,
    Failed(QueryTestFailure),
    MultiFailed(MultiFailure),
}

impl Verdict {
    /// Whether the comparison passed
    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }

    /// Total number of failures represented by this verdict
    pub fn total_failures(&self) -> u64 {
        match self {
            Verdict::Pass => 0,
            Verdict::Failed(_) => 1,
            Verdict::MultiFailed(multi) => multi.total_failures(),
        }
    }

    /// Message describing the failure, if any
    pub fn message(&self) -> Option<String> {
        match self {
            Verdict::Pass => None,
            Verdict::Failed(failure) => Some(failure.message.clone()),
            Verdict::MultiFailed(multi) => Some(multi.message()),
        }
    }

    /// Failures as a flat list, including the truncation placeholder
    pub fn failures(&self) -> Vec<QueryTestFailure> {
        match self {
            Verdict::Pass => Vec::new(),
            Verdict::Failed(failure) => vec![failure.clone()],
            Verdict::MultiFailed(multi) => multi.failures(),
        }
    }
}

impl From<QueryTestFailure> for Verdict {
    fn from(failure: QueryTestFailure) -> Self {
        Verdict::Failed(failure)
    }
}
