//! Scenario results summary

use bqt_core::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::test_case::{TestResult, TestStatus};
use crate::utils::format_duration;

/// Counts for one query set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySetSummary {
    pub query_set_id: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub expected_exceptions: usize,
    pub time_exceeded: usize,
    pub elapsed_ms: u64,
    pub failed_queries: Vec<String>,
}

impl QuerySetSummary {
    fn new(query_set_id: &str) -> Self {
        Self {
            query_set_id: query_set_id.to_string(),
            ..Default::default()
        }
    }

    fn add(&mut self, result: &TestResult) {
        self.total += 1;
        match result.status {
            TestStatus::Success => self.passed += 1,
            TestStatus::ExpectedException => {
                self.passed += 1;
                self.expected_exceptions += 1;
            }
            TestStatus::ExecutionTimeExceeded => {
                self.failed += 1;
                self.time_exceeded += 1;
                self.failed_queries.push(result.query_id.clone());
            }
            TestStatus::Exception | TestStatus::PreRun => {
                self.failed += 1;
                self.failed_queries.push(result.query_id.clone());
            }
        }
    }

    /// Percentage of passed tests
    pub fn success_rate(&self) -> f64 {
        if self.total > 0 {
            (self.passed as f64 / self.total as f64) * 100.0
        } else {
            0.0
        }
    }
}

/// Per-query-set and total counts of a scenario run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestResultsSummary {
    pub scenario_name: String,
    pub query_sets: Vec<QuerySetSummary>,
}

impl TestResultsSummary {
    pub fn new(scenario_name: impl Into<String>) -> Self {
        Self {
            scenario_name: scenario_name.into(),
            query_sets: Vec::new(),
        }
    }

    /// Count a finished test under its query set
    pub fn add_test(&mut self, result: &TestResult) {
        self.entry(&result.query_set_id).add(result);
    }

    fn entry(&mut self, query_set_id: &str) -> &mut QuerySetSummary {
        let index = match self
            .query_sets
            .iter()
            .position(|s| s.query_set_id == query_set_id)
        {
            Some(index) => index,
            None => {
                self.query_sets.push(QuerySetSummary::new(query_set_id));
                self.query_sets.len() - 1
            }
        };
        &mut self.query_sets[index]
    }

    /// Close a query set and log its counts
    pub fn print_results(&mut self, query_set_id: &str, begin: DateTime<Utc>, end: DateTime<Utc>) {
        let elapsed = (end - begin).to_std().unwrap_or_default();
        let set = self.entry(query_set_id);
        set.elapsed_ms = elapsed.as_millis() as u64;

        log::info!(
            "Query set [{}]: {} tests, {} passed, {} failed, {} expected exceptions, {} over time ({})",
            set.query_set_id,
            set.total,
            set.passed,
            set.failed,
            set.expected_exceptions,
            set.time_exceeded,
            format_duration(elapsed)
        );
        if !set.failed_queries.is_empty() {
            log::info!("  failed queries: {}", set.failed_queries.join(", "));
        }
    }

    /// Log the totals of the scenario
    pub fn print_totals(&self, planned_queries: usize) {
        let elapsed = Duration::from_millis(self.query_sets.iter().map(|s| s.elapsed_ms).sum());
        log::info!(
            "Scenario [{}] totals: {} of {} planned queries run, {} passed, {} failed ({:.1}%) in {}",
            self.scenario_name,
            self.total_tests(),
            planned_queries,
            self.total_passed(),
            self.total_failed(),
            self.success_rate(),
            format_duration(elapsed)
        );
    }

    pub fn total_tests(&self) -> usize {
        self.query_sets.iter().map(|s| s.total).sum()
    }

    pub fn total_passed(&self) -> usize {
        self.query_sets.iter().map(|s| s.passed).sum()
    }

    pub fn total_failed(&self) -> usize {
        self.query_sets.iter().map(|s| s.failed).sum()
    }

    pub fn total_time_exceeded(&self) -> usize {
        self.query_sets.iter().map(|s| s.time_exceeded).sum()
    }

    /// Percentage of passed tests across all query sets
    pub fn success_rate(&self) -> f64 {
        let total = self.total_tests();
        if total > 0 {
            (self.total_passed() as f64 / total as f64) * 100.0
        } else {
            0.0
        }
    }
}

/// Why a scenario stopped before running every test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortKind {
    /// The scenario time budget ran out
    TimeBudgetExceeded,
    /// The run was interrupted
    Interrupted,
    /// The engine connection failed
    Connection,
}

/// Abort reason recorded on a scenario report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbortReason {
    pub kind: AbortKind,
    pub message: String,
}

/// Everything a scenario run produced
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub scenario_name: String,
    pub planned_queries: usize,
    pub summary: TestResultsSummary,
    pub results: Vec<TestResult>,
    pub abort_reason: Option<AbortReason>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ScenarioReport {
    /// Whether every planned test ran and passed
    pub fn is_success(&self) -> bool {
        self.abort_reason.is_none()
            && self.results.len() == self.planned_queries
            && self.results.iter().all(TestResult::is_success)
    }

    /// Results that did not pass
    pub fn failed_results(&self) -> impl Iterator<Item = &TestResult> {
        self.results.iter().filter(|r| !r.is_success())
    }

    /// Report as pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result_mode::ResultModeKind;
    use crate::test_case::QueryTest;

    fn result(set: &str, id: &str, status: TestStatus) -> TestResult {
        let mut result = TestResult::new(&QueryTest::new(set, id, "SELECT 1"), ResultModeKind::Compare);
        result.status = status;
        result
    }

    #[test]
    fn test_counts_per_query_set() {
        let mut summary = TestResultsSummary::new("smoke");
        summary.add_test(&result("set1", "q1", TestStatus::Success));
        summary.add_test(&result("set1", "q2", TestStatus::Exception));
        summary.add_test(&result("set1", "q3", TestStatus::ExpectedException));
        summary.add_test(&result("set2", "q1", TestStatus::ExecutionTimeExceeded));

        assert_eq!(summary.query_sets.len(), 2);
        let set1 = &summary.query_sets[0];
        assert_eq!((set1.total, set1.passed, set1.failed), (3, 2, 1));
        assert_eq!(set1.expected_exceptions, 1);
        assert_eq!(set1.failed_queries, vec!["q2".to_string()]);

        assert_eq!(summary.total_tests(), 4);
        assert_eq!(summary.total_failed(), 2);
        assert_eq!(summary.total_time_exceeded(), 1);
        assert!((summary.success_rate() - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_print_results_records_elapsed() {
        let mut summary = TestResultsSummary::new("smoke");
        summary.add_test(&result("set1", "q1", TestStatus::Success));
        let begin = Utc::now();
        summary.print_results("set1", begin, begin + chrono::Duration::milliseconds(1500));
        assert_eq!(summary.query_sets[0].elapsed_ms, 1500);
        summary.print_totals(1);
    }

    #[test]
    fn test_report_json() {
        let mut summary = TestResultsSummary::new("smoke");
        let failed = result("set1", "q1", TestStatus::Exception);
        summary.add_test(&failed);
        let now = Utc::now();
        let report = ScenarioReport {
            scenario_name: "smoke".into(),
            planned_queries: 2,
            summary,
            results: vec![failed],
            abort_reason: Some(AbortReason {
                kind: AbortKind::Interrupted,
                message: "interrupted".into(),
            }),
            started_at: now,
            finished_at: now,
        };
        assert!(!report.is_success());
        assert_eq!(report.failed_results().count(), 1);

        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["abort_reason"]["kind"], "interrupted");
        assert_eq!(json["summary"]["query_sets"][0]["failed"], 1);
    }
}
