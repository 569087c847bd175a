//! Scenario runs through generate and compare modes

use async_trait::async_trait;
use bqt_testing_framework::{
    Collaborators, ComparisonPolicy, ErrorReportSink, ExceptionOutcome, InMemoryExpectedResults,
    PolicyConfig, QueryExecutor, QueryOutcome, QuerySet, QuerySql, QueryTest, QueryTestFailure,
    Result, ResultModeKind, Scenario, ScenarioRunner, TabularResult, TestResult, TestStatus, Value,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Engine double answering each statement from a fixed table
struct FakeEngine {
    answers: HashMap<String, QueryOutcome>,
}

impl FakeEngine {
    fn new() -> Self {
        Self {
            answers: HashMap::new(),
        }
    }

    fn answer(mut self, sql: &str, outcome: impl Into<QueryOutcome>) -> Self {
        self.answers.insert(sql.to_string(), outcome.into());
        self
    }
}

#[async_trait]
impl QueryExecutor for FakeEngine {
    async fn execute(&mut self, statement: &QuerySql) -> Result<QueryOutcome> {
        Ok(self
            .answers
            .get(&statement.sql)
            .cloned()
            .unwrap_or_else(|| TabularResult::update(0).into()))
    }
}

#[derive(Default)]
struct CollectingSink {
    failed: Mutex<Vec<String>>,
}

impl ErrorReportSink for CollectingSink {
    fn report_failures(&self, result: &TestResult, _failures: &[QueryTestFailure]) -> Result<()> {
        self.failed.lock().unwrap().push(result.query_id.clone());
        Ok(())
    }
}

fn names(rows: &[&str]) -> TabularResult {
    rows.iter().fold(TabularResult::new(["name"], ["string"]), |r, name| {
        r.with_row(vec![Value::from(*name)])
    })
}

fn scenario() -> Scenario {
    Scenario::new("regression").with_query_set(QuerySet::new(
        "people",
        vec![
            QueryTest::new("people", "unordered", "SELECT name FROM people"),
            QueryTest::new("people", "ordered", "SELECT name FROM people ORDER BY name"),
            QueryTest::new("people", "missing", "SELECT * FROM missing"),
        ],
    ))
}

#[tokio::test]
async fn generate_then_compare() {
    init_logger();
    let store = Arc::new(InMemoryExpectedResults::new());
    let sink = Arc::new(CollectingSink::default());
    let collaborators = Collaborators::new(sink.clone())
        .with_reader(store.clone())
        .with_writer(store.clone());

    let mut baseline = FakeEngine::new()
        .answer("SELECT name FROM people", names(&["ann", "bob"]))
        .answer("SELECT name FROM people ORDER BY name", names(&["ann", "bob"]))
        .answer(
            "SELECT * FROM missing",
            ExceptionOutcome::new("java.sql.SQLException", "Table missing not found"),
        );

    let generate = PolicyConfig {
        result_mode: Some("generate".into()),
        ..Default::default()
    };
    let runner = ScenarioRunner::from_config(&generate, &collaborators).unwrap();
    let report = runner.run(&scenario(), &mut baseline).await;
    assert_eq!(report.results.len(), 3);
    assert_eq!(store.len(), 3);

    // same rows in a different order, and the same error
    let mut candidate = FakeEngine::new()
        .answer("SELECT name FROM people", names(&["bob", "ann"]))
        .answer("SELECT name FROM people ORDER BY name", names(&["bob", "ann"]))
        .answer(
            "SELECT * FROM missing",
            ExceptionOutcome::new("java.sql.SQLException", "TABLE MISSING NOT FOUND"),
        );

    let compare = PolicyConfig {
        result_mode: Some("compare".into()),
        ..Default::default()
    };
    let runner = ScenarioRunner::from_config(&compare, &collaborators).unwrap();
    assert_eq!(runner.result_mode(), ResultModeKind::Compare);
    let report = runner.run(&scenario(), &mut candidate).await;

    let status: Vec<TestStatus> = report.results.iter().map(|r| r.status).collect();
    assert_eq!(
        status,
        vec![
            TestStatus::Success,
            TestStatus::Exception,
            TestStatus::ExpectedException
        ]
    );
    assert_eq!(report.results[1].failures.len(), 2);
    assert_eq!(sink.failed.lock().unwrap().as_slice(), &["ordered".to_string()]);

    assert_eq!(report.summary.total_passed(), 2);
    assert_eq!(report.summary.total_failed(), 1);
    assert!(report.abort_reason.is_none());

    let json = report.to_json().unwrap();
    assert!(json.contains("\"query_set_id\": \"people\""));
}

#[tokio::test]
async fn slow_query_flagged_without_failing_rows() {
    init_logger();
    let store = Arc::new(InMemoryExpectedResults::new());
    store
        .insert("people", "unordered", names(&["ann"]).with_execution_time(100).into())
        .unwrap();
    let collaborators =
        Collaborators::new(Arc::new(CollectingSink::default())).with_reader(store.clone());

    let policy = ComparisonPolicy::from_config(&PolicyConfig {
        execute_exceed_percent: Some("20".into()),
        execute_time_minimum: Some("10".into()),
        ..Default::default()
    })
    .unwrap();
    let handler =
        bqt_testing_framework::handler_for(ResultModeKind::Compare, policy, &collaborators).unwrap();
    let runner = ScenarioRunner::new(handler, &collaborators);

    let scenario = Scenario::new("timing").with_query_set(QuerySet::new(
        "people",
        vec![QueryTest::new("people", "unordered", "SELECT name FROM people")],
    ));
    let mut engine =
        FakeEngine::new().answer("SELECT name FROM people", names(&["ann"]).with_execution_time(500));

    let report = runner.run(&scenario, &mut engine).await;
    let result = &report.results[0];
    assert_eq!(result.status, TestStatus::ExecutionTimeExceeded);
    assert!(result.time_exceeded.as_deref().unwrap().starts_with("Actual: 500 Expected: 100"));
    assert_eq!(report.summary.total_time_exceeded(), 1);
}
