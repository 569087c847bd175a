//! Query tests and their recorded results

use bqt_core::{QueryOutcome, QueryTestFailure, Verdict};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::comparator::ComparisonOutcome;
use crate::result_mode::ResultModeKind;
use crate::utils::is_ordered;

/// One SQL statement of a query test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySql {
    pub sql: String,

    /// Number of times the statement is executed
    #[serde(default = "default_run_times")]
    pub run_times: u32,

    /// Declared number of rows the statement returns
    #[serde(default)]
    pub row_count: Option<u64>,

    /// Declared update count of the statement
    #[serde(default)]
    pub update_count: Option<u64>,
}

fn default_run_times() -> u32 {
    1
}

impl QuerySql {
    /// Statement executed once with no declared counts
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            run_times: 1,
            row_count: None,
            update_count: None,
        }
    }

    /// Set the number of executions
    pub fn with_run_times(mut self, run_times: u32) -> Self {
        self.run_times = run_times;
        self
    }

    /// Declare the expected row count
    pub fn with_row_count(mut self, row_count: u64) -> Self {
        self.row_count = Some(row_count);
        self
    }

    /// Declare the expected update count
    pub fn with_update_count(mut self, update_count: u64) -> Self {
        self.update_count = Some(update_count);
        self
    }

    /// Whether the statement carries an explicit ordering clause
    pub fn is_ordered(&self) -> bool {
        is_ordered(&self.sql)
    }
}

/// A named test made of one or more SQL statements
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryTest {
    pub query_set_id: String,
    pub query_id: String,
    pub statements: Vec<QuerySql>,
}

impl QueryTest {
    /// Test with a single statement
    pub fn new(
        query_set_id: impl Into<String>,
        query_id: impl Into<String>,
        sql: impl Into<String>,
    ) -> Self {
        Self {
            query_set_id: query_set_id.into(),
            query_id: query_id.into(),
            statements: vec![QuerySql::new(sql)],
        }
    }

    /// Test with several statements
    pub fn with_statements(
        query_set_id: impl Into<String>,
        query_id: impl Into<String>,
        statements: Vec<QuerySql>,
    ) -> Self {
        Self {
            query_set_id: query_set_id.into(),
            query_id: query_id.into(),
            statements,
        }
    }

    /// Statements joined for display
    pub fn sql_text(&self) -> String {
        self.statements
            .iter()
            .map(|s| s.sql.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Whether the outcome can only be checked against declared counts
    ///
    /// True for multi-statement tests and for statements that run more than
    /// once or declare a row count.
    pub fn requires_count_checks_only(&self) -> bool {
        self.statements.len() > 1
            || self
                .statements
                .iter()
                .any(|s| s.run_times > 1 || s.row_count.is_some())
    }

    /// Whether the (single) statement carries an ordering clause
    pub fn is_ordered(&self) -> bool {
        self.statements.first().map_or(false, QuerySql::is_ordered)
    }
}

/// State of a test result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    /// Not yet executed
    PreRun,
    Success,
    /// Failed: an unexpected error or a mismatch
    Exception,
    /// The query raised the error it was expected to raise
    ExpectedException,
    /// Results matched but the query was too slow
    ExecutionTimeExceeded,
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TestStatus::PreRun => "pre-run",
            TestStatus::Success => "pass",
            TestStatus::Exception => "fail",
            TestStatus::ExpectedException => "expected exception",
            TestStatus::ExecutionTimeExceeded => "execution time exceeded",
        };
        write!(f, "{}", text)
    }
}

/// Result of running one query test
#[derive(Debug, Clone, Serialize)]
pub struct TestResult {
    pub test_id: Uuid,
    pub query_set_id: String,
    pub query_id: String,
    pub query: String,
    pub result_mode: ResultModeKind,
    pub status: TestStatus,
    /// Outcome as produced by the engine; handed to writers, not serialized
    #[serde(skip)]
    pub outcome: Option<QueryOutcome>,
    pub failure_message: Option<String>,
    pub failures: Vec<QueryTestFailure>,
    /// Description of the execution time excess, if any
    pub time_exceeded: Option<String>,
    pub execution_time_ms: u64,
    pub begin_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

impl TestResult {
    /// Fresh result for a test about to run
    pub fn new(test: &QueryTest, result_mode: ResultModeKind) -> Self {
        Self {
            test_id: Uuid::new_v4(),
            query_set_id: test.query_set_id.clone(),
            query_id: test.query_id.clone(),
            query: test.sql_text(),
            result_mode,
            status: TestStatus::PreRun,
            outcome: None,
            failure_message: None,
            failures: Vec::new(),
            time_exceeded: None,
            execution_time_ms: 0,
            begin_time: Utc::now(),
            end_time: None,
        }
    }

    /// Record what the engine returned
    pub fn record_outcome(&mut self, outcome: QueryOutcome) {
        self.execution_time_ms = outcome.execution_time_ms();
        self.status = match &outcome {
            QueryOutcome::Exception(e) => {
                self.failure_message = Some(e.message.clone());
                TestStatus::Exception
            }
            QueryOutcome::Results(_) => TestStatus::Success,
        };
        self.outcome = Some(outcome);
    }

    /// Mark the test failed
    pub fn fail(&mut self, failure: QueryTestFailure) {
        self.status = TestStatus::Exception;
        self.failure_message = Some(failure.message.clone());
        self.failures = vec![failure];
    }

    /// Apply the outcome of comparing against expected results
    pub fn apply_comparison(&mut self, comparison: &ComparisonOutcome) {
        let expected_exception = matches!(self.outcome, Some(QueryOutcome::Exception(_)));

        match &comparison.verdict {
            Verdict::Pass => {
                self.failure_message = None;
                self.failures.clear();
                self.status = if comparison.execution_time_exceeded.is_some() {
                    TestStatus::ExecutionTimeExceeded
                } else if expected_exception {
                    TestStatus::ExpectedException
                } else {
                    TestStatus::Success
                };
            }
            failed => {
                self.status = TestStatus::Exception;
                self.failure_message = failed.message();
                self.failures = failed.failures();
            }
        }

        if let Some(exceeded) = &comparison.execution_time_exceeded {
            self.time_exceeded = Some(exceeded.message.clone());
            if self.failure_message.is_none() {
                self.failure_message = Some(exceeded.message.clone());
            }
        }
    }

    /// Stamp the end time
    pub fn finish(&mut self) {
        self.end_time = Some(Utc::now());
    }

    /// Whether the test counts as passed
    pub fn is_success(&self) -> bool {
        matches!(
            self.status,
            TestStatus::Success | TestStatus::ExpectedException
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bqt_core::{ExceptionOutcome, FailureKind, TabularResult};

    #[test]
    fn test_count_checks_only() {
        let single = QueryTest::new("set1", "q1", "SELECT 1");
        assert!(!single.requires_count_checks_only());

        let repeated = QueryTest::with_statements(
            "set1",
            "q2",
            vec![QuerySql::new("SELECT 1").with_run_times(3)],
        );
        assert!(repeated.requires_count_checks_only());

        let counted = QueryTest::with_statements(
            "set1",
            "q3",
            vec![QuerySql::new("SELECT 1").with_row_count(1)],
        );
        assert!(counted.requires_count_checks_only());

        let multi = QueryTest::with_statements(
            "set1",
            "q4",
            vec![QuerySql::new("INSERT INTO t VALUES (1)"), QuerySql::new("SELECT * FROM t")],
        );
        assert!(multi.requires_count_checks_only());
        assert_eq!(multi.sql_text(), "INSERT INTO t VALUES (1); SELECT * FROM t");
    }

    #[test]
    fn test_query_sql_deserialize_defaults() {
        let sql: QuerySql = serde_json::from_str(r#"{"sql": "SELECT a FROM t ORDER BY a"}"#).unwrap();
        assert_eq!(sql.run_times, 1);
        assert!(sql.row_count.is_none());
        assert!(sql.is_ordered());
    }

    #[test]
    fn test_expected_exception_status() {
        let test = QueryTest::new("set1", "q1", "SELECT * FROM missing");
        let mut result = TestResult::new(&test, ResultModeKind::Compare);
        result.record_outcome(ExceptionOutcome::new("java.sql.SQLException", "no table").into());
        assert_eq!(result.status, TestStatus::Exception);

        result.apply_comparison(&ComparisonOutcome {
            verdict: Verdict::Pass,
            execution_time_exceeded: None,
        });
        assert_eq!(result.status, TestStatus::ExpectedException);
        assert!(result.is_success());
        assert!(result.failure_message.is_none());
    }

    #[test]
    fn test_time_exceeded_status() {
        let test = QueryTest::new("set1", "q1", "SELECT 1");
        let mut result = TestResult::new(&test, ResultModeKind::Compare);
        result.record_outcome(TabularResult::update(0).into());
        result.apply_comparison(&ComparisonOutcome {
            verdict: Verdict::Pass,
            execution_time_exceeded: Some(QueryTestFailure::new(FailureKind::ExecutionTime, "slow")),
        });
        assert_eq!(result.status, TestStatus::ExecutionTimeExceeded);
        assert_eq!(result.time_exceeded.as_deref(), Some("slow"));
        assert!(!result.is_success());
    }

    #[test]
    fn test_failed_comparison() {
        let test = QueryTest::new("set1", "q1", "SELECT 1");
        let mut result = TestResult::new(&test, ResultModeKind::Compare);
        result.record_outcome(TabularResult::update(0).into());
        result.apply_comparison(&ComparisonOutcome {
            verdict: QueryTestFailure::new(FailureKind::RowCount, "Expected 2 records but received 3").into(),
            execution_time_exceeded: None,
        });
        assert_eq!(result.status, TestStatus::Exception);
        assert_eq!(result.failures.len(), 1);

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "exception");
        assert!(json.get("outcome").is_none());
    }
}
