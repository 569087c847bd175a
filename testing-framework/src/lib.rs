//! BQT Testing Framework
//!
//! Result comparison engine for SQL engine regression tests, together with
//! the sequential scenario driver that feeds it.
//!
//! `ResultComparator` decides whether an actual query outcome (rows, column
//! metadata, update count or a raised error) matches the expected one under a
//! `ComparisonPolicy`. Row order is canonicalized for unordered queries and
//! every cell mismatch of a pass is collected into one report.
//!
//! `ScenarioRunner` executes query sets through a `QueryExecutor` and hands
//! each outcome to the scenario's result mode.

pub mod cell;
pub mod comparator;
pub mod differ;
pub mod exceptions;
pub mod ordering;
pub mod reporter;
pub mod result_mode;
pub mod scenario;
pub mod string_match;
pub mod test_case;
pub mod utils;

pub use bqt_core::{
    ComparisonPolicy, Error, ExceptionMatchMode, ExceptionOutcome, FailureKind, MismatchRecord,
    MultiFailure, PolicyConfig, QueryOutcome, QueryTestFailure, Result, TabularResult, Value,
    Verdict, SAVED_FAILURES_LIMIT,
};

pub use crate::{
    comparator::{ComparisonOutcome, ResultComparator},
    differ::RowColumnDiffer,
    exceptions::ExceptionComparator,
    ordering::{order_if_needed, IndexedRow},
    reporter::{AbortKind, AbortReason, QuerySetSummary, ScenarioReport, TestResultsSummary},
    result_mode::{
        handler_for, handler_from_config, Collaborators, CompareMode, ErrorReportSink,
        ExpectedResultsReader, ExpectedResultsWriter, GenerateMode, InMemoryExpectedResults,
        LogErrorSink, NoneMode, ResultModeHandler, ResultModeKind, SqlMode,
    },
    scenario::{Interrupt, QueryExecutor, QuerySet, Scenario, ScenarioRunner},
    test_case::{QuerySql, QueryTest, TestResult, TestStatus},
};
