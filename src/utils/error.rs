// src/utils/error.rs

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

pub type RouterResult<T> = Result<T, RouterError>;

/// Custom error details for additional context
pub type ErrorDetails = HashMap<String, serde_json::Value>;

/// Main error type for the data source router
/// Optimized for size by boxing large fields
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterError {
    pub message: String,
    pub details: Option<Box<ErrorDetails>>, // Boxed to reduce struct size
    pub source_id: Option<String>,
    pub error_code: Option<String>,
    pub kind: ErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    #[default]
    UnknownError,
    NoAvailableSource,
    AllSourcesUnavailable,
    QualityBelowThreshold,
    ExecutionError,
    EvaluationError,
    ValidationError,
    ConfigurationError,
    SerializationError,
    TimeoutError,
    NotFoundError,
    InternalError,
    ServiceUnavailable,
}

impl fmt::Display for RouterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for RouterError {}

impl RouterError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            details: None,
            source_id: None,
            error_code: None,
            kind,
        }
    }

    pub fn with_details(mut self, details: ErrorDetails) -> Self {
        self.details = Some(Box::new(details));
        self
    }

    pub fn with_source_id(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    pub fn with_code(mut self, error_code: impl Into<String>) -> Self {
        self.error_code = Some(error_code.into());
        self
    }

    // Convenience constructors for common error types
    pub fn no_available_source(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NoAvailableSource, message).with_code("NO_AVAILABLE_SOURCE")
    }

    pub fn all_sources_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AllSourcesUnavailable, message).with_code("ALL_SOURCES_UNAVAILABLE")
    }

    pub fn quality_below_threshold(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::QualityBelowThreshold, message).with_code("QUALITY_BELOW_THRESHOLD")
    }

    pub fn execution_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ExecutionError, message).with_code("EXECUTION_ERROR")
    }

    pub fn evaluation_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::EvaluationError, message).with_code("EVALUATION_ERROR")
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ValidationError, message).with_code("VALIDATION_ERROR")
    }

    pub fn config_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConfigurationError, message).with_code("CONFIG_ERROR")
    }

    pub fn serialization_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SerializationError, message).with_code("SERIALIZATION_ERROR")
    }

    pub fn timeout_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TimeoutError, message).with_code("TIMEOUT_ERROR")
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFoundError, message).with_code("NOT_FOUND")
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InternalError, message).with_code("INTERNAL_ERROR")
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ServiceUnavailable, message)
    }
}

/// Errors raised while computing a quality snapshot for a single source.
/// Kept separate from `RouterError` so batch evaluation can isolate them.
#[derive(Error, Debug)]
pub enum EvaluationError {
    #[error("Invalid source definition: {0}")]
    InvalidSource(String),
    #[error("Evaluation deadline exceeded for source {0}")]
    DeadlineExceeded(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// Implement From conversions for common error types
impl From<serde_json::Error> for RouterError {
    fn from(err: serde_json::Error) -> Self {
        RouterError::serialization_error(format!("JSON error: {}", err))
    }
}

impl From<EvaluationError> for RouterError {
    fn from(err: EvaluationError) -> Self {
        match err {
            EvaluationError::InvalidSource(msg) => {
                RouterError::validation_error(format!("Invalid source: {}", msg))
            }
            EvaluationError::DeadlineExceeded(source_id) => {
                RouterError::timeout_error("Evaluation deadline exceeded").with_source_id(source_id)
            }
            EvaluationError::Serialization(e) => {
                RouterError::serialization_error(format!("Evaluation serialization error: {}", e))
            }
        }
    }
}

impl From<String> for RouterError {
    fn from(err: String) -> Self {
        Self::validation_error(err)
    }
}

impl From<&str> for RouterError {
    fn from(err: &str) -> Self {
        Self::validation_error(err.to_string())
    }
}

// Helper macro for creating errors with context
#[macro_export]
macro_rules! router_error {
    ($kind:expr, $msg:expr) => {
        RouterError::new($kind, $msg)
    };
    ($kind:expr, $msg:expr, $($key:expr => $value:expr),+) => {{
        let mut details = std::collections::HashMap::new();
        $(
            details.insert($key.to_string(), serde_json::json!($value));
        )+
        RouterError::new($kind, $msg).with_details(details)
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_constructors_set_kind_and_code() {
        let err = RouterError::no_available_source("all candidates filtered out");
        assert_eq!(err.kind, ErrorKind::NoAvailableSource);
        assert_eq!(err.error_code.as_deref(), Some("NO_AVAILABLE_SOURCE"));

        let err = RouterError::timeout_error("deadline passed").with_source_id("db-primary");
        assert_eq!(err.kind, ErrorKind::TimeoutError);
        assert_eq!(err.source_id.as_deref(), Some("db-primary"));
    }

    #[test]
    fn test_evaluation_error_conversion() {
        let err: RouterError = EvaluationError::InvalidSource("zero capacity".to_string()).into();
        assert_eq!(err.kind, ErrorKind::ValidationError);

        let err: RouterError = EvaluationError::DeadlineExceeded("cache-1".to_string()).into();
        assert_eq!(err.kind, ErrorKind::TimeoutError);
        assert_eq!(err.source_id.as_deref(), Some("cache-1"));
    }

    #[test]
    fn test_error_details_roundtrip() {
        let mut details = ErrorDetails::new();
        details.insert("attempted".to_string(), serde_json::json!(["a", "b"]));
        let err = RouterError::all_sources_unavailable("exhausted").with_details(details);

        let json = serde_json::to_string(&err).unwrap();
        let back: RouterError = serde_json::from_str(&json).unwrap();
        assert_eq!(back.kind, ErrorKind::AllSourcesUnavailable);
        assert!(back.details.is_some());
    }
}
