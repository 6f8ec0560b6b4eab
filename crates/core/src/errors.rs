//! Error types

use std::time::Duration;
use thiserror::Error;

/// Failure of a single fetch attempt against one price source
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("source returned status: {0}")]
    Status(u16),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("invalid price: {0}")]
    InvalidPrice(f64),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("request cancelled")]
    Cancelled,
}

/// Outcome of a retried operation that never succeeded
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RetryError<E> {
    #[error("max retries reached after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },

    #[error("operation cancelled during retry")]
    Cancelled,
}

impl<E> RetryError<E> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RetryError::Cancelled)
    }

    /// Last operation error, if retries ran out
    pub fn last_error(&self) -> Option<&E> {
        match self {
            RetryError::Exhausted { last, .. } => Some(last),
            RetryError::Cancelled => None,
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid duration for {key}: {reason}")]
    InvalidDuration { key: &'static str, reason: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Result type alias
pub type SourceResult<T> = Result<T, SourceError>;
pub type ConfigResult<T> = Result<T, ConfigError>;
