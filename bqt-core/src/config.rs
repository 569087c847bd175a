//! Comparison policy configuration
//!
//! `PolicyConfig` holds the raw, optional settings as they come out of a
//! configuration file. `ComparisonPolicy` is the validated, immutable form the
//! comparator is constructed with.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Raw comparison and scenario settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Allowed absolute divergence for decimal and floating point values
    pub allowed_divergence: Option<String>,

    /// Percentage by which the actual execution time may exceed the expected one
    pub execute_exceed_percent: Option<String>,

    /// Expected execution time (ms) below which timing is not checked
    pub execute_time_minimum: Option<String>,

    /// Per-query time allowance (ms) used to budget a whole scenario
    pub time_for_one_query_ms: Option<u64>,

    /// Result mode of the scenario: compare, none, generate or sql
    pub result_mode: Option<String>,
}

impl PolicyConfig {
    /// Load configuration from file
    ///
    /// The format follows the extension: `.toml`, `.yaml`/`.yml`, otherwise JSON.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;

        match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => Ok(toml::from_str(&content)?),
            Some("yaml") | Some("yml") => Ok(serde_yaml::from_str(&content)?),
            _ => Ok(serde_json::from_str(&content)?),
        }
    }

    /// Save configuration to file as JSON or YAML
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = match path.extension().and_then(|s| s.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::to_string(self)?,
            Some("toml") => toml::to_string_pretty(self)
                .map_err(|e| Error::serialization(e.to_string()))?,
            _ => serde_json::to_string_pretty(self)?,
        };

        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Validated comparison policy
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonPolicy {
    allowed_divergence: Decimal,
    exceed_percent: f64,
    minimum_execution_time_ms: i64,
}

impl Default for ComparisonPolicy {
    fn default() -> Self {
        Self::exact()
    }
}

impl ComparisonPolicy {
    /// Zero numeric tolerance and no execution time check
    pub fn exact() -> Self {
        Self {
            allowed_divergence: Decimal::ZERO,
            exceed_percent: 0.0,
            minimum_execution_time_ms: -1,
        }
    }

    /// Build a policy from raw configuration values
    pub fn from_config(config: &PolicyConfig) -> Result<Self> {
        let allowed_divergence = parse_divergence(config.allowed_divergence.as_deref())?;

        let exceed_percent = match non_blank(config.execute_exceed_percent.as_deref()) {
            Some(raw) => {
                log::debug!("execute_exceed_percent is set to {}", raw);
                raw.parse::<f64>().map_err(|e| {
                    Error::configuration(format!("invalid execute_exceed_percent '{}': {}", raw, e))
                })?
            }
            None => 0.0,
        };

        let mut minimum_execution_time_ms = match non_blank(config.execute_time_minimum.as_deref()) {
            Some(raw) => {
                log::debug!("execute_time_minimum is set to {}", raw);
                raw.parse::<i64>().map_err(|e| {
                    Error::configuration(format!("invalid execute_time_minimum '{}': {}", raw, e))
                })?
            }
            None => -1,
        };

        // an exceed percentage without a minimum still enables the check
        if exceed_percent > 0.0 && minimum_execution_time_ms < 0 {
            minimum_execution_time_ms = 1;
        }

        Ok(Self {
            allowed_divergence,
            exceed_percent,
            minimum_execution_time_ms,
        })
    }

    /// Set the allowed numeric divergence
    pub fn with_allowed_divergence(mut self, divergence: Decimal) -> Self {
        self.allowed_divergence = divergence.abs();
        self
    }

    /// Enable the execution time check
    pub fn with_execution_time_check(mut self, exceed_percent: f64, minimum_ms: i64) -> Self {
        self.exceed_percent = exceed_percent;
        self.minimum_execution_time_ms = minimum_ms;
        self
    }

    /// Allowed absolute divergence for numeric values
    pub fn allowed_divergence(&self) -> Decimal {
        self.allowed_divergence
    }

    /// Whether numeric values must match exactly
    pub fn is_exact(&self) -> bool {
        self.allowed_divergence.is_zero()
    }

    /// Allowed execution time excess in percent
    pub fn exceed_percent(&self) -> f64 {
        self.exceed_percent
    }

    /// Expected time threshold for the execution time check, negative when disabled
    pub fn minimum_execution_time_ms(&self) -> i64 {
        self.minimum_execution_time_ms
    }

    /// Check actual against expected execution time
    ///
    /// Returns a description of the excess when the actual time exceeds the
    /// expected baseline by more than the allowed percentage.
    pub fn check_execution_time(&self, actual_ms: u64, expected_ms: u64) -> Option<String> {
        if self.minimum_execution_time_ms <= 0 {
            return None;
        }
        let actual = actual_ms as f64;
        let expected = expected_ms as f64;
        if expected <= self.minimum_execution_time_ms as f64 || actual <= expected {
            return None;
        }

        let allowed_diff = expected * (self.exceed_percent / 100.0);
        log::info!(
            "Execution time check: minimum {} ms, exceed {}%, expected {} ms, actual {} ms",
            self.minimum_execution_time_ms,
            self.exceed_percent,
            expected_ms,
            actual_ms
        );

        if actual - allowed_diff > expected {
            Some(format!(
                "Actual: {} Expected: {} Diff: {} Allowed %: {} ({})",
                actual_ms,
                expected_ms,
                actual_ms - expected_ms,
                self.exceed_percent / 100.0,
                allowed_diff
            ))
        } else {
            None
        }
    }
}

fn non_blank(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

fn parse_divergence(raw: Option<&str>) -> Result<Decimal> {
    let Some(raw) = non_blank(raw) else {
        return Ok(Decimal::ZERO);
    };

    let parsed = Decimal::from_str(raw).or_else(|_| Decimal::from_scientific(raw));
    match parsed {
        Ok(value) if value.is_sign_negative() && !value.is_zero() => {
            log::warn!(
                "Negative allowed_divergence '{}', falling back to exact comparison",
                raw
            );
            Ok(Decimal::ZERO)
        }
        Ok(value) => Ok(value),
        Err(e) => {
            log::warn!(
                "Unparsable allowed_divergence '{}' ({}), falling back to exact comparison",
                raw,
                e
            );
            Ok(Decimal::ZERO)
        }
    }
}
