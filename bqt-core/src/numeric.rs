//! Tolerance-aware numeric comparison
//!
//! Decimal, double and float values are compared within the allowed
//! divergence of the policy, each in its own precision. Values of differing
//! numeric kinds are not handled here and fall through to exact equality.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::config::ComparisonPolicy;
use crate::types::Value;

/// Result of a tolerant numeric comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericMatch {
    /// The pair is not two values of the same tolerant numeric kind
    NotApplicable,
    /// Equal within tolerance
    Within,
    /// Outside the tolerance band
    Outside,
}

/// Compares decimal and floating point values against an absolute tolerance
#[derive(Debug, Clone, Copy)]
pub struct TolerantNumericComparator {
    divergence: Decimal,
}

impl TolerantNumericComparator {
    /// Create a comparator using the policy's allowed divergence
    pub fn new(policy: &ComparisonPolicy) -> Self {
        Self {
            divergence: policy.allowed_divergence(),
        }
    }

    /// Allowed divergence
    pub fn divergence(&self) -> Decimal {
        self.divergence
    }

    /// Compare expected against actual
    pub fn compare(&self, expected: &Value, actual: &Value) -> NumericMatch {
        let outside = match (expected, actual) {
            (Value::Decimal(e), Value::Decimal(a)) => self.decimal_outside(*e, *a),
            (Value::Double(e), Value::Double(a)) => {
                let tolerance = self.divergence.to_f64().unwrap_or(0.0);
                float_outside(*e, *a, tolerance, self.divergence.is_zero())
            }
            (Value::Float(e), Value::Float(a)) => {
                let tolerance = self.divergence.to_f32().unwrap_or(0.0);
                float_outside(*e, *a, tolerance, self.divergence.is_zero())
            }
            _ => return NumericMatch::NotApplicable,
        };

        if outside {
            NumericMatch::Outside
        } else {
            NumericMatch::Within
        }
    }

    fn decimal_outside(&self, expected: Decimal, actual: Decimal) -> bool {
        if expected == actual {
            return false;
        }
        if self.divergence.is_zero() {
            return true;
        }
        let above = expected
            .checked_add(self.divergence)
            .map_or(false, |upper| upper < actual);
        let below = expected
            .checked_sub(self.divergence)
            .map_or(false, |lower| lower > actual);
        above || below
    }
}

#[allow(clippy::float_cmp)]
fn float_outside<F>(expected: F, actual: F, tolerance: F, exact: bool) -> bool
where
    F: Copy + PartialOrd + std::ops::Add<Output = F> + std::ops::Sub<Output = F>,
{
    if expected == actual {
        return false;
    }
    if exact {
        return true;
    }
    expected + tolerance < actual || expected - tolerance > actual
}
