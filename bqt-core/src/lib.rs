//! BQT comparison core
//!
//! Value model, comparison policy and failure types shared by the result
//! comparison engine, together with the two leaf components that work on
//! single values: the large-object normalizer and the tolerant numeric
//! comparator.

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod failure;
pub mod normalize;
pub mod numeric;
pub mod types;

// Re-export main types for convenience
pub use crate::{
    config::{ComparisonPolicy, PolicyConfig},
    error::{Error, Result},
    failure::{FailureKind, MismatchRecord, MultiFailure, QueryTestFailure, Verdict, SAVED_FAILURES_LIMIT},
    numeric::{NumericMatch, TolerantNumericComparator},
    types::*,
};
