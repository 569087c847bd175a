//! Error types for the comparison engine
//!
//! Test failures are not errors. A comparison that detects mismatches still
//! returns `Ok` with a failing verdict; `Error` is reserved for conditions that
//! make the comparison itself impossible to carry out.

use thiserror::Error;

/// Result type alias for comparison engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the comparison engine
#[derive(Error, Debug)]
pub enum Error {
    /// I/O related errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Reading a large-object value failed
    #[error("Large object error: {0}")]
    LargeObject(String),

    /// An expected exception message is not a valid regular expression
    #[error("Invalid exception message regex pattern: {0}")]
    InvalidPattern(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Query execution collaborator reported a failure outside the test itself
    #[error("Execution error: {0}")]
    Execution(String),

    /// The connection to the engine under test is unusable
    #[error("Connection error: {0}")]
    Connection(String),

    /// The scenario was stopped before all tests ran
    #[error("Scenario aborted: {0}")]
    ScenarioAborted(String),

    /// The run was interrupted between test cases
    #[error("Interrupted: {0}")]
    Interrupted(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a large-object error
    pub fn large_object(msg: impl Into<String>) -> Self {
        Self::LargeObject(msg.into())
    }

    /// Create an invalid pattern error
    pub fn invalid_pattern(msg: impl Into<String>) -> Self {
        Self::InvalidPattern(msg.into())
    }

    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a serialization error
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Create an execution error
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    /// Create a connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a scenario aborted error
    pub fn scenario_aborted(msg: impl Into<String>) -> Self {
        Self::ScenarioAborted(msg.into())
    }

    /// Create an interrupted error
    pub fn interrupted(msg: impl Into<String>) -> Self {
        Self::Interrupted(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error stops the remaining tests of a scenario
    pub fn aborts_scenario(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::ScenarioAborted(_) | Self::Interrupted(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::configuration("bad divergence");
        assert_eq!(err.to_string(), "Configuration error: bad divergence");

        let err = Error::invalid_pattern("unclosed group");
        assert!(err.to_string().contains("unclosed group"));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "stream closed");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_aborts_scenario() {
        assert!(Error::scenario_aborted("budget").aborts_scenario());
        assert!(Error::interrupted("signal").aborts_scenario());
        assert!(Error::connection("refused").aborts_scenario());
        assert!(!Error::execution("syntax").aborts_scenario());
    }
}
