//! Error types for the fingerprint engine crate.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FingerprintError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FingerprintError {
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Parse error on line {line}: {message}")]
    ParseError { line: usize, message: String },
    #[error("Unsupported configuration version: {0}")]
    UnsupportedVersion(u32),
    #[error("Unknown matcher key: {0}")]
    UnknownMatcherKey(String),
    #[error("Invalid pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },
    #[error("Unresolved placeholder: {0}")]
    UnresolvedPlaceholder(String),
    #[error("YAML parsing error: {0}")]
    YamlError(String),
    #[error("JSON parsing error: {0}")]
    JsonError(String),
    #[error("IO error: {0}")]
    IoError(String),
}

impl FingerprintError {
    /// Whether the error was raised while loading rules, as opposed to
    /// while evaluating an event.
    pub fn is_load_error(&self) -> bool {
        !matches!(self, FingerprintError::UnresolvedPlaceholder(_))
    }
}

impl From<std::io::Error> for FingerprintError {
    fn from(err: std::io::Error) -> Self {
        FingerprintError::IoError(err.to_string())
    }
}

impl From<serde_yaml::Error> for FingerprintError {
    fn from(err: serde_yaml::Error) -> Self {
        FingerprintError::YamlError(err.to_string())
    }
}

impl From<serde_json::Error> for FingerprintError {
    fn from(err: serde_json::Error) -> Self {
        FingerprintError::JsonError(err.to_string())
    }
}
