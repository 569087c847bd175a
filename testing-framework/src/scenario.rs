//! Sequential scenario runner
//!
//! Tests run one at a time against a single executor. The scenario time
//! budget is checked before each test and the interrupt flag after each
//! test; neither stops a query that is already running. An interrupt stops
//! one run and is cleared by it.

use async_trait::async_trait;
use bqt_core::{Error, FailureKind, PolicyConfig, QueryOutcome, QueryTestFailure, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::reporter::{AbortKind, AbortReason, ScenarioReport, TestResultsSummary};
use crate::result_mode::{handler_from_config, Collaborators, NoneMode, ResultModeHandler, ResultModeKind};
use crate::test_case::{QuerySql, QueryTest, TestResult, TestStatus};

/// Runs SQL against the engine under test
///
/// An error raised by the engine for the statement itself is an
/// `Ok(QueryOutcome::Exception(..))`. `Err` means the harness could not run
/// the statement; `Error::Connection` stops the scenario.
#[async_trait]
pub trait QueryExecutor: Send {
    /// Check the connection before the scenario starts
    async fn ping(&mut self) -> Result<()> {
        Ok(())
    }

    /// Execute one statement
    async fn execute(&mut self, statement: &QuerySql) -> Result<QueryOutcome>;

    /// Release per-test resources
    async fn cleanup(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Shared flag used to stop a running scenario between tests
#[derive(Debug, Clone, Default)]
pub struct Interrupt(Arc<AtomicBool>);

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the scenario to stop after the current test
    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    /// Consume a raised flag, leaving it cleared
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }
}

/// Ordered group of tests sharing an identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySet {
    pub id: String,
    pub tests: Vec<QueryTest>,
}

impl QuerySet {
    pub fn new(id: impl Into<String>, tests: Vec<QueryTest>) -> Self {
        Self {
            id: id.into(),
            tests,
        }
    }
}

/// Named collection of query sets run under one configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub query_sets: Vec<QuerySet>,
}

impl Scenario {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            query_sets: Vec::new(),
        }
    }

    /// Add a query set
    pub fn with_query_set(mut self, query_set: QuerySet) -> Self {
        self.query_sets.push(query_set);
        self
    }

    /// Number of tests across all query sets
    pub fn total_queries(&self) -> usize {
        self.query_sets.iter().map(|s| s.tests.len()).sum()
    }
}

/// Drives a scenario through an executor and a result mode
pub struct ScenarioRunner {
    handler: Box<dyn ResultModeHandler>,
    count_checks: NoneMode,
    time_for_one_query: Option<Duration>,
    interrupt: Interrupt,
}

impl ScenarioRunner {
    /// Create a runner; `collaborators.sink` also receives failures of
    /// tests that are checked against declared counts only
    pub fn new(handler: Box<dyn ResultModeHandler>, collaborators: &Collaborators) -> Self {
        Self {
            handler,
            count_checks: NoneMode::new(collaborators.sink.clone()),
            time_for_one_query: None,
            interrupt: Interrupt::new(),
        }
    }

    /// Create a runner from configuration
    pub fn from_config(config: &PolicyConfig, collaborators: &Collaborators) -> Result<Self> {
        let handler = handler_from_config(config, collaborators)?;
        let mut runner = Self::new(handler, collaborators);
        if let Some(millis) = config.time_for_one_query_ms.filter(|m| *m > 0) {
            runner.time_for_one_query = Some(Duration::from_millis(millis));
        }
        Ok(runner)
    }

    /// Set the per-query time allowance of the scenario budget
    pub fn with_time_for_one_query(mut self, allowance: Duration) -> Self {
        self.time_for_one_query = Some(allowance);
        self
    }

    /// Use a caller-held interrupt flag
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Interrupt flag observed by this runner
    pub fn interrupt(&self) -> Interrupt {
        self.interrupt.clone()
    }

    /// Result mode of the scenario
    pub fn result_mode(&self) -> ResultModeKind {
        self.handler.kind()
    }

    /// Run every test of the scenario in order
    pub async fn run(&self, scenario: &Scenario, executor: &mut dyn QueryExecutor) -> ScenarioReport {
        let started_at = Utc::now();
        let started = Instant::now();
        let planned_queries = scenario.total_queries();

        let deadline = match self.time_for_one_query {
            Some(allowance) => {
                let queries = u32::try_from(planned_queries).unwrap_or(u32::MAX);
                let budget = allowance.checked_mul(queries).unwrap_or(Duration::MAX);
                started.checked_add(budget)
            }
            None => {
                log::warn!("Time for one query is not set [scenario: {}]", scenario.name);
                None
            }
        };

        let mut summary = TestResultsSummary::new(scenario.name.clone());
        let mut results = Vec::with_capacity(planned_queries);
        let mut abort_reason = match executor.ping().await {
            Ok(()) => None,
            Err(e) => Some(AbortReason {
                kind: AbortKind::Connection,
                message: e.to_string(),
            }),
        };

        for query_set in &scenario.query_sets {
            if abort_reason.is_some() {
                break;
            }
            log::info!("Start TestResult: QuerySetID [{}]", query_set.id);
            let begin = Utc::now();

            for test in &query_set.tests {
                if deadline.map_or(false, |d| Instant::now() > d) {
                    abort_reason = Some(AbortReason {
                        kind: AbortKind::TimeBudgetExceeded,
                        message: Error::scenario_aborted("maximum time exceeded").to_string(),
                    });
                    break;
                }

                let mut result = TestResult::new(test, self.handler.kind());
                log::debug!("Test: QuerySetID [{} - {}]", test.query_set_id, test.query_id);

                if let Some(reason) = self.run_test(test, &mut result, executor).await {
                    abort_reason = Some(reason);
                }
                result.finish();
                summary.add_test(&result);
                results.push(result);

                if let Err(e) = executor.cleanup().await {
                    log::warn!("Cleanup after {}:{} failed: {}", test.query_set_id, test.query_id, e);
                }

                if abort_reason.is_none() && self.interrupt.take() {
                    log::info!("Scenario {} has been interrupted.", scenario.name);
                    abort_reason = Some(AbortReason {
                        kind: AbortKind::Interrupted,
                        message: Error::interrupted("scenario run has been interrupted").to_string(),
                    });
                }
                if abort_reason.is_some() {
                    break;
                }
            }

            log::info!("End TestResult: QuerySetID [{}]", query_set.id);
            summary.print_results(&query_set.id, begin, Utc::now());
        }

        // a raise that arrived while the run was stopping for another reason
        self.interrupt.clear();
        summary.print_totals(planned_queries);
        if let Some(reason) = &abort_reason {
            log::error!("Scenario {} aborted: {}", scenario.name, reason.message);
        }
        log::debug!("Scenario {} took {:?}", scenario.name, started.elapsed());

        ScenarioReport {
            scenario_name: scenario.name.clone(),
            planned_queries,
            summary,
            results,
            abort_reason,
            started_at,
            finished_at: Utc::now(),
        }
    }

    async fn run_test(
        &self,
        test: &QueryTest,
        result: &mut TestResult,
        executor: &mut dyn QueryExecutor,
    ) -> Option<AbortReason> {
        let handler: &dyn ResultModeHandler =
            if test.requires_count_checks_only() && self.handler.kind() != ResultModeKind::None {
                log::info!(
                    "Overriding ResultMode to NONE for QueryID [{}]",
                    test.query_id
                );
                result.result_mode = ResultModeKind::None;
                &self.count_checks
            } else {
                self.handler.as_ref()
            };

        let mut abort = None;
        'statements: for statement in &test.statements {
            result.query = statement.sql.clone();
            for _ in 0..statement.run_times {
                match executor.execute(statement).await {
                    Ok(outcome) => {
                        let failure = handler.check_execution(statement, &outcome);
                        result.record_outcome(outcome);
                        if let Some(failure) = failure {
                            result.fail(failure);
                        }
                    }
                    Err(e) => {
                        result.outcome = None;
                        result.fail(QueryTestFailure::new(
                            FailureKind::Framework,
                            format!("Execution failed: {}", e),
                        ));
                        if e.aborts_scenario() {
                            abort = Some(AbortReason {
                                kind: AbortKind::Connection,
                                message: e.to_string(),
                            });
                        }
                    }
                }
                if !result.is_success() {
                    break 'statements;
                }
            }
        }

        if result.status == TestStatus::PreRun {
            result.status = TestStatus::Success;
        }

        if let Err(e) = handler.handle_result(test, result) {
            log::error!(
                "Handling result of {}:{} failed: {}",
                test.query_set_id,
                test.query_id,
                e
            );
            result.fail(QueryTestFailure::new(FailureKind::Framework, e.to_string()));
        }

        abort
    }
}
