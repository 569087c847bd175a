//! Result modes
//!
//! A scenario runs in one mode, chosen once: compare against expected
//! results, check declared counts only, generate new expected results, or
//! just execute. Each mode is a `ResultModeHandler`; the collaborators that
//! read and write expected results or persist failures are traits as well.

use bqt_core::{
    ComparisonPolicy, Error, FailureKind, PolicyConfig, QueryOutcome, QueryTestFailure, Result,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use crate::comparator::ResultComparator;
use crate::test_case::{QuerySql, QueryTest, TestResult};
use crate::utils::truncate_string;

/// Selectable result modes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultModeKind {
    /// Compare against expected results
    #[default]
    Compare,
    /// Check declared row and update counts only
    None,
    /// Record outcomes as new expected results
    Generate,
    /// Execute without any checking
    Sql,
}

impl FromStr for ResultModeKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compare" => Ok(Self::Compare),
            "none" => Ok(Self::None),
            "generate" => Ok(Self::Generate),
            "sql" => Ok(Self::Sql),
            other => Err(Error::configuration(format!("unknown result mode: {}", other))),
        }
    }
}

impl fmt::Display for ResultModeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Compare => "compare",
            Self::None => "none",
            Self::Generate => "generate",
            Self::Sql => "sql",
        };
        write!(f, "{}", name)
    }
}

/// Source of expected outcomes
pub trait ExpectedResultsReader: Send + Sync {
    /// Expected outcome of `test`, with its baseline execution time
    fn expected_outcome(&self, test: &QueryTest) -> Result<QueryOutcome>;
}

/// Destination for newly generated expected outcomes
pub trait ExpectedResultsWriter: Send + Sync {
    fn write_expected(&self, test: &QueryTest, outcome: &QueryOutcome) -> Result<()>;
}

/// Destination for failure reports
pub trait ErrorReportSink: Send + Sync {
    /// Report the failures of one test
    fn report_failures(&self, result: &TestResult, failures: &[QueryTestFailure]) -> Result<()>;

    /// Additional report listing every message, sent when a test has more than one failure
    fn report_all_messages(&self, result: &TestResult, failures: &[QueryTestFailure]) -> Result<()> {
        let _ = (result, failures);
        Ok(())
    }
}

/// Post-execution handling of one test under a result mode
pub trait ResultModeHandler: Send + Sync {
    fn kind(&self) -> ResultModeKind;

    /// Check one execution of a statement as it happens
    fn check_execution(&self, statement: &QuerySql, outcome: &QueryOutcome) -> Option<QueryTestFailure> {
        let _ = (statement, outcome);
        None
    }

    /// Finish a test once all its statements ran
    fn handle_result(&self, test: &QueryTest, result: &mut TestResult) -> Result<()>;
}

/// Compare each outcome against the expected one
pub struct CompareMode {
    comparator: ResultComparator,
    reader: Arc<dyn ExpectedResultsReader>,
    sink: Arc<dyn ErrorReportSink>,
}

impl CompareMode {
    pub fn new(
        comparator: ResultComparator,
        reader: Arc<dyn ExpectedResultsReader>,
        sink: Arc<dyn ErrorReportSink>,
    ) -> Self {
        Self {
            comparator,
            reader,
            sink,
        }
    }
}

impl ResultModeHandler for CompareMode {
    fn kind(&self) -> ResultModeKind {
        ResultModeKind::Compare
    }

    fn handle_result(&self, test: &QueryTest, result: &mut TestResult) -> Result<()> {
        let Some(actual) = result.outcome.as_ref() else {
            // execution itself failed; nothing to compare
            return report(self.sink.as_ref(), result);
        };

        let expected = self.reader.expected_outcome(test)?;
        let comparison = self.comparator.compare(actual, &expected, test.is_ordered())?;
        result.apply_comparison(&comparison);

        if !comparison.verdict.is_pass() {
            log::debug!(
                "Comparison failed for {}:{} with {} failure(s)",
                test.query_set_id,
                test.query_id,
                comparison.verdict.total_failures()
            );
            report(self.sink.as_ref(), result)?;
        }
        Ok(())
    }
}

/// Check declared row and update counts instead of comparing results
pub struct NoneMode {
    sink: Arc<dyn ErrorReportSink>,
}

impl NoneMode {
    pub fn new(sink: Arc<dyn ErrorReportSink>) -> Self {
        Self { sink }
    }
}

impl ResultModeHandler for NoneMode {
    fn kind(&self) -> ResultModeKind {
        ResultModeKind::None
    }

    fn check_execution(&self, statement: &QuerySql, outcome: &QueryOutcome) -> Option<QueryTestFailure> {
        check_declared_counts(statement, outcome)
    }

    fn handle_result(&self, _test: &QueryTest, result: &mut TestResult) -> Result<()> {
        if result.is_success() {
            return Ok(());
        }
        if result.failures.is_empty() {
            if let Some(message) = result.failure_message.clone() {
                result
                    .failures
                    .push(QueryTestFailure::new(FailureKind::UnexpectedException, message));
            }
        }
        report(self.sink.as_ref(), result)
    }
}

/// Record every outcome as the new expected outcome
pub struct GenerateMode {
    writer: Arc<dyn ExpectedResultsWriter>,
}

impl GenerateMode {
    pub fn new(writer: Arc<dyn ExpectedResultsWriter>) -> Self {
        Self { writer }
    }
}

impl ResultModeHandler for GenerateMode {
    fn kind(&self) -> ResultModeKind {
        ResultModeKind::Generate
    }

    fn handle_result(&self, test: &QueryTest, result: &mut TestResult) -> Result<()> {
        match &result.outcome {
            Some(outcome) => self.writer.write_expected(test, outcome),
            None => Ok(()),
        }
    }
}

/// Execute only
#[derive(Debug, Default)]
pub struct SqlMode;

impl ResultModeHandler for SqlMode {
    fn kind(&self) -> ResultModeKind {
        ResultModeKind::Sql
    }

    fn handle_result(&self, _test: &QueryTest, _result: &mut TestResult) -> Result<()> {
        Ok(())
    }
}

/// External collaborators available to result modes
#[derive(Clone)]
pub struct Collaborators {
    pub reader: Option<Arc<dyn ExpectedResultsReader>>,
    pub writer: Option<Arc<dyn ExpectedResultsWriter>>,
    pub sink: Arc<dyn ErrorReportSink>,
}

impl Collaborators {
    /// Collaborators with only a failure sink
    pub fn new(sink: Arc<dyn ErrorReportSink>) -> Self {
        Self {
            reader: None,
            writer: None,
            sink,
        }
    }

    pub fn with_reader(mut self, reader: Arc<dyn ExpectedResultsReader>) -> Self {
        self.reader = Some(reader);
        self
    }

    pub fn with_writer(mut self, writer: Arc<dyn ExpectedResultsWriter>) -> Self {
        self.writer = Some(writer);
        self
    }
}

/// Build the handler for a result mode
pub fn handler_for(
    kind: ResultModeKind,
    policy: ComparisonPolicy,
    collaborators: &Collaborators,
) -> Result<Box<dyn ResultModeHandler>> {
    let handler: Box<dyn ResultModeHandler> = match kind {
        ResultModeKind::Compare => {
            let reader = collaborators.reader.clone().ok_or_else(|| {
                Error::configuration("compare mode requires an expected results reader")
            })?;
            Box::new(CompareMode::new(
                ResultComparator::new(policy),
                reader,
                collaborators.sink.clone(),
            ))
        }
        ResultModeKind::None => Box::new(NoneMode::new(collaborators.sink.clone())),
        ResultModeKind::Generate => {
            let writer = collaborators.writer.clone().ok_or_else(|| {
                Error::configuration("generate mode requires an expected results writer")
            })?;
            Box::new(GenerateMode::new(writer))
        }
        ResultModeKind::Sql => Box::new(SqlMode),
    };
    Ok(handler)
}

/// Build the handler named by the configuration, defaulting to compare
pub fn handler_from_config(
    config: &PolicyConfig,
    collaborators: &Collaborators,
) -> Result<Box<dyn ResultModeHandler>> {
    let kind = match config.result_mode.as_deref() {
        Some(raw) if !raw.trim().is_empty() => raw.parse()?,
        _ => ResultModeKind::default(),
    };
    let policy = ComparisonPolicy::from_config(config)?;
    log::debug!("Result mode {} selected", kind);
    handler_for(kind, policy, collaborators)
}

/// Compare an execution against the counts its statement declares
pub fn check_declared_counts(statement: &QuerySql, outcome: &QueryOutcome) -> Option<QueryTestFailure> {
    let QueryOutcome::Results(results) = outcome else {
        return None;
    };

    if let Some(expected) = statement.row_count {
        let actual = results.row_count() as u64;
        if actual != expected {
            return Some(QueryTestFailure::new(
                FailureKind::RowCount,
                format!("Expected row count: {}, actual row count: {}.", expected, actual),
            ));
        }
    } else if let Some(expected) = statement.update_count {
        if results.update_count != Some(expected) {
            return Some(QueryTestFailure::new(
                FailureKind::UpdateCount,
                format!(
                    "Expected update count: {}, actual update count: {}.",
                    expected,
                    results
                        .update_count
                        .map_or_else(|| String::from("-1"), |c| c.to_string())
                ),
            ));
        }
    }
    None
}

fn report(sink: &dyn ErrorReportSink, result: &TestResult) -> Result<()> {
    if result.failures.is_empty() {
        return Ok(());
    }
    sink.report_failures(result, &result.failures)?;
    if result.failures.len() > 1 {
        sink.report_all_messages(result, &result.failures)?;
    }
    Ok(())
}

/// Failure sink that writes to the log
#[derive(Debug, Clone)]
pub struct LogErrorSink {
    max_message_len: usize,
}

impl Default for LogErrorSink {
    fn default() -> Self {
        Self {
            max_message_len: 500,
        }
    }
}

impl LogErrorSink {
    pub fn new(max_message_len: usize) -> Self {
        Self { max_message_len }
    }
}

impl ErrorReportSink for LogErrorSink {
    fn report_failures(&self, result: &TestResult, failures: &[QueryTestFailure]) -> Result<()> {
        log::warn!(
            "Test {}:{} failed: {}",
            result.query_set_id,
            result.query_id,
            truncate_string(
                result.failure_message.as_deref().unwrap_or_default(),
                self.max_message_len
            )
        );
        for failure in failures.iter().skip(1) {
            log::debug!("  {}", truncate_string(&failure.message, self.max_message_len));
        }
        Ok(())
    }
}

/// Expected outcomes kept in memory, keyed by query set and query id
#[derive(Debug, Default)]
pub struct InMemoryExpectedResults {
    outcomes: Mutex<HashMap<(String, String), QueryOutcome>>,
}

impl InMemoryExpectedResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the expected outcome of a test
    pub fn insert(&self, query_set_id: &str, query_id: &str, outcome: QueryOutcome) -> Result<()> {
        self.outcomes
            .lock()
            .map_err(|_| Error::internal("expected results store poisoned"))?
            .insert((query_set_id.to_string(), query_id.to_string()), outcome);
        Ok(())
    }

    /// Number of stored outcomes
    pub fn len(&self) -> usize {
        self.outcomes.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ExpectedResultsReader for InMemoryExpectedResults {
    fn expected_outcome(&self, test: &QueryTest) -> Result<QueryOutcome> {
        let outcomes = self
            .outcomes
            .lock()
            .map_err(|_| Error::internal("expected results store poisoned"))?;
        outcomes
            .get(&(test.query_set_id.clone(), test.query_id.clone()))
            .cloned()
            .ok_or_else(|| {
                Error::configuration(format!(
                    "no expected results recorded for {}:{}",
                    test.query_set_id, test.query_id
                ))
            })
    }
}

impl ExpectedResultsWriter for InMemoryExpectedResults {
    fn write_expected(&self, test: &QueryTest, outcome: &QueryOutcome) -> Result<()> {
        self.insert(&test.query_set_id, &test.query_id, outcome.clone())
    }
}
