//! Core data types for query outcomes
//!
//! Both sides of a comparison, the actual outcome produced by running a query
//! and the expected outcome read from a previous run, share these shapes.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::io::{Cursor, Read};
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{Error, Result};

/// Readable backing store of a large-object column value
///
/// Engines hand out character, XML and binary large objects as streams. The
/// source is opened once per read; every call must yield the full content.
pub trait LobSource: fmt::Debug + Send + Sync {
    /// Open a reader positioned at the start of the object
    fn open(&self) -> std::io::Result<Box<dyn Read + '_>>;
}

#[derive(Debug)]
struct InMemoryLob(Vec<u8>);

impl LobSource for InMemoryLob {
    fn open(&self) -> std::io::Result<Box<dyn Read + '_>> {
        Ok(Box::new(Cursor::new(self.0.as_slice())))
    }
}

/// Handle to a large-object value
#[derive(Clone)]
pub struct LargeObject {
    source: Arc<dyn LobSource>,
}

impl LargeObject {
    /// Large object held entirely in memory
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            source: Arc::new(InMemoryLob(bytes.into())),
        }
    }

    /// Large object backed by a caller-supplied stream source
    pub fn from_source(source: Arc<dyn LobSource>) -> Self {
        Self { source }
    }

    /// Read the whole object
    pub fn read_bytes(&self) -> std::io::Result<Vec<u8>> {
        let mut reader = self.source.open()?;
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Read the whole object as UTF-8 text
    pub fn read_string(&self) -> std::io::Result<String> {
        let bytes = self.read_bytes()?;
        String::from_utf8(bytes)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

impl fmt::Debug for LargeObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LargeObject")
            .field("source", &self.source)
            .finish()
    }
}

impl PartialEq for LargeObject {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.source, &other.source)
    }
}

/// A single, possibly null, column value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL
    Null,
    /// Boolean value
    Boolean(bool),
    /// 8-bit signed integer
    TinyInt(i8),
    /// 16-bit signed integer
    SmallInt(i16),
    /// 32-bit signed integer
    Integer(i32),
    /// 64-bit signed integer
    BigInt(i64),
    /// Single-precision floating point
    Float(f32),
    /// Double-precision floating point
    Double(f64),
    /// Arbitrary-precision decimal
    Decimal(Decimal),
    /// Character data
    Text(String),
    /// Calendar date
    Date(NaiveDate),
    /// Time of day
    Time(NaiveTime),
    /// Date and time without zone
    Timestamp(NaiveDateTime),
    /// Raw byte sequence
    Bytes(Vec<u8>),
    /// Byte sequence delivered element by element as signed bytes
    BoxedBytes(Vec<i8>),
    /// Character large object
    Clob(LargeObject),
    /// XML large object
    Xml(LargeObject),
    /// Binary large object
    Blob(LargeObject),
}

impl Value {
    /// Check if this value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether this value is a date, time or timestamp
    pub fn is_date_time(&self) -> bool {
        matches!(self, Value::Date(_) | Value::Time(_) | Value::Timestamp(_))
    }

    /// Whether this value is a large object that must be read before comparison
    pub fn is_large_object(&self) -> bool {
        matches!(self, Value::Clob(_) | Value::Xml(_) | Value::Blob(_))
    }

    /// Runtime type name used in diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::TinyInt(_) => "tinyint",
            Value::SmallInt(_) => "smallint",
            Value::Integer(_) => "integer",
            Value::BigInt(_) => "bigint",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Decimal(_) => "decimal",
            Value::Text(_) => "string",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::Timestamp(_) => "timestamp",
            Value::Bytes(_) => "byte[]",
            Value::BoxedBytes(_) => "Byte[]",
            Value::Clob(_) => "clob",
            Value::Xml(_) => "xml",
            Value::Blob(_) => "blob",
        }
    }

    /// Text content, if this is a text value
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    fn as_i64(&self) -> Option<i64> {
        match self {
            Value::TinyInt(v) => Some(i64::from(*v)),
            Value::SmallInt(v) => Some(i64::from(*v)),
            Value::Integer(v) => Some(i64::from(*v)),
            Value::BigInt(v) => Some(*v),
            _ => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(f64::from(*v)),
            Value::Double(v) => Some(*v),
            Value::Decimal(v) => v.to_f64(),
            other => other.as_i64().map(|v| v as f64),
        }
    }

    fn sort_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Boolean(_) => 1,
            Value::TinyInt(_)
            | Value::SmallInt(_)
            | Value::Integer(_)
            | Value::BigInt(_)
            | Value::Float(_)
            | Value::Double(_)
            | Value::Decimal(_) => 2,
            Value::Text(_) => 3,
            Value::Date(_) | Value::Time(_) | Value::Timestamp(_) => 4,
            Value::Bytes(_) | Value::BoxedBytes(_) => 5,
            Value::Clob(_) | Value::Xml(_) | Value::Blob(_) => 6,
        }
    }

    /// Total order used to canonicalize row order of unordered results
    ///
    /// Nulls sort first. Numbers of different kinds compare by magnitude.
    /// Values of unrelated kinds sort by kind, then by display text.
    /// Large objects are never read here and compare equal to each other.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        let rank = self.sort_rank().cmp(&other.sort_rank());
        if rank != Ordering::Equal {
            return rank;
        }

        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::Decimal(a), Value::Decimal(b)) => a.cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            (Value::Time(a), Value::Time(b)) => a.cmp(b),
            (Value::Timestamp(a), Value::Timestamp(b)) => a.cmp(b),
            (Value::Bytes(a), Value::Bytes(b)) => a.cmp(b),
            (Value::BoxedBytes(a), Value::BoxedBytes(b)) => a.cmp(b),
            (a, b) if a.is_large_object() && b.is_large_object() => Ordering::Equal,
            (a, b) => match (a.as_i64(), b.as_i64()) {
                (Some(x), Some(y)) => x.cmp(&y),
                _ => match (a.as_f64(), b.as_f64()) {
                    (Some(x), Some(y)) => x.total_cmp(&y),
                    _ => a.to_string().cmp(&b.to_string()),
                },
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(v) => write!(f, "{}", v),
            Value::TinyInt(v) => write!(f, "{}", v),
            Value::SmallInt(v) => write!(f, "{}", v),
            Value::Integer(v) => write!(f, "{}", v),
            Value::BigInt(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{:?}", v),
            Value::Double(v) => write!(f, "{:?}", v),
            Value::Decimal(v) => write!(f, "{}", v),
            Value::Text(v) => write!(f, "{}", v),
            Value::Date(v) => write!(f, "{}", v.format("%Y-%m-%d")),
            Value::Time(v) => write!(f, "{}", v.format("%H:%M:%S")),
            Value::Timestamp(v) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S%.f")),
            Value::Bytes(v) => write!(f, "{}", BASE64.encode(v)),
            Value::BoxedBytes(v) => write!(f, "{}", BASE64.encode(unbox_bytes(v))),
            Value::Clob(_) => write!(f, "[clob]"),
            Value::Xml(_) => write!(f, "[xml]"),
            Value::Blob(_) => write!(f, "[blob]"),
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::BigInt(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Decimal(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Reinterpret signed bytes as raw bytes
pub fn unbox_bytes(bytes: &[i8]) -> Vec<u8> {
    bytes.iter().map(|b| b.to_ne_bytes()[0]).collect()
}

/// Rows, column metadata and update count produced by one query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TabularResult {
    /// Column identifiers, possibly qualified
    pub column_names: Vec<String>,
    /// Column type names, one per column
    pub column_types: Vec<String>,
    /// Row values, one value per column
    pub rows: Vec<Vec<Value>>,
    /// Update count of a mutation, `None` when not applicable
    pub update_count: Option<u64>,
    /// Elapsed time of the query (baseline time on the expected side)
    pub execution_time_ms: u64,
}

impl TabularResult {
    /// Create an empty result with the given column metadata
    pub fn new<N, T>(column_names: N, column_types: T) -> Self
    where
        N: IntoIterator,
        N::Item: Into<String>,
        T: IntoIterator,
        T::Item: Into<String>,
    {
        Self {
            column_names: column_names.into_iter().map(Into::into).collect(),
            column_types: column_types.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Result of a mutation that returned no rows
    pub fn update(count: u64) -> Self {
        Self {
            update_count: Some(count),
            ..Default::default()
        }
    }

    /// Append a row
    pub fn push_row(&mut self, row: Vec<Value>) {
        self.rows.push(row);
    }

    /// Builder-style row append
    pub fn with_row(mut self, row: Vec<Value>) -> Self {
        self.rows.push(row);
        self
    }

    /// Set the update count
    pub fn with_update_count(mut self, count: u64) -> Self {
        self.update_count = Some(count);
        self
    }

    /// Set the execution time
    pub fn with_execution_time(mut self, millis: u64) -> Self {
        self.execution_time_ms = millis;
        self
    }

    /// Number of rows returned
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Whether any rows were returned
    pub fn has_rows(&self) -> bool {
        !self.rows.is_empty()
    }

    /// Number of columns
    pub fn column_count(&self) -> usize {
        self.column_names.len()
    }

    /// Check the shape invariants: one type per column and one value per column in every row
    pub fn validate(&self) -> Result<()> {
        if self.column_names.len() != self.column_types.len() {
            return Err(Error::internal(format!(
                "{} column names but {} column types",
                self.column_names.len(),
                self.column_types.len()
            )));
        }
        for (index, row) in self.rows.iter().enumerate() {
            if row.len() != self.column_names.len() {
                return Err(Error::internal(format!(
                    "row {} has {} values, expected {}",
                    index + 1,
                    row.len(),
                    self.column_names.len()
                )));
            }
        }
        Ok(())
    }
}

/// How an expected exception message is matched against the actual one
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionMatchMode {
    /// Messages must be equal, tolerating differing line breaks
    #[default]
    Exact,
    /// Substring match
    Contains,
    /// Prefix match
    StartsWith,
    /// Regular expression search
    Regex,
}

impl FromStr for ExceptionMatchMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "exact" => Ok(Self::Exact),
            "contains" => Ok(Self::Contains),
            "starts_with" | "startswith" => Ok(Self::StartsWith),
            "regex" => Ok(Self::Regex),
            other => Err(Error::configuration(format!(
                "unknown exception match mode: {}",
                other
            ))),
        }
    }
}

/// Error raised by a query, or expected to be raised
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExceptionOutcome {
    /// Class-style name of the error kind; `None` when nothing was recorded
    pub class_name: Option<String>,
    /// Error message
    pub message: String,
    /// How the message is matched (meaningful on the expected side)
    pub match_mode: ExceptionMatchMode,
    /// Elapsed time of the failing query
    pub execution_time_ms: u64,
}

impl ExceptionOutcome {
    /// Create an exception outcome
    pub fn new(class_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            class_name: Some(class_name.into()),
            message: message.into(),
            ..Default::default()
        }
    }

    /// Set the message match mode
    pub fn with_match_mode(mut self, match_mode: ExceptionMatchMode) -> Self {
        self.match_mode = match_mode;
        self
    }
}

/// Outcome of executing one test: exactly one of rows or an exception
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    /// The query returned rows or an update count
    Results(TabularResult),
    /// The query raised an error
    Exception(ExceptionOutcome),
}

impl QueryOutcome {
    /// Elapsed time recorded on the outcome
    pub fn execution_time_ms(&self) -> u64 {
        match self {
            QueryOutcome::Results(r) => r.execution_time_ms,
            QueryOutcome::Exception(e) => e.execution_time_ms,
        }
    }

    /// Whether this outcome is an exception
    pub fn is_exception(&self) -> bool {
        matches!(self, QueryOutcome::Exception(_))
    }

    /// Number of rows, zero for exceptions
    pub fn row_count(&self) -> usize {
        match self {
            QueryOutcome::Results(r) => r.row_count(),
            QueryOutcome::Exception(_) => 0,
        }
    }
}

impl From<TabularResult> for QueryOutcome {
    fn from(r: TabularResult) -> Self {
        QueryOutcome::Results(r)
    }
}

impl From<ExceptionOutcome> for QueryOutcome {
    fn from(e: ExceptionOutcome) -> Self {
        QueryOutcome::Exception(e)
    }
}
