//! Error handling for qpipe
//!
//! This module defines the crate error type and a Result alias used by
//! every service and pipeline operation.

use thiserror::Error;

/// Main error type for qpipe operations
#[derive(Error, Debug)]
pub enum QpipeError {
    /// A pipeline chain or pool was configured incorrectly
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An operation was attempted in the wrong lifecycle state
    /// (submitting after shutdown, shutting down twice, reusing a consumed session)
    #[error("Lifecycle error: {0}")]
    Lifecycle(String),

    /// A provider failed while executing a query
    #[error("Execution failure: {0}")]
    Execution(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<QpipeError>,
    },
}

impl QpipeError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        QpipeError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Convert a provider error into a contained execution failure
    pub fn from_provider_error(err: anyhow::Error) -> Self {
        QpipeError::Execution(format!("{:#}", err))
    }

    /// The innermost error, with every context layer stripped
    pub fn root(&self) -> &QpipeError {
        match self {
            QpipeError::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether this is (or wraps) a configuration error
    pub fn is_configuration(&self) -> bool {
        matches!(self.root(), QpipeError::Configuration(_))
    }

    /// Whether this is (or wraps) a lifecycle error
    pub fn is_lifecycle(&self) -> bool {
        matches!(self.root(), QpipeError::Lifecycle(_))
    }
}

/// Result type alias for qpipe operations
pub type Result<T> = std::result::Result<T, QpipeError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

impl<T> ResultExt<T> for anyhow::Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| QpipeError::from_provider_error(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| QpipeError::from_provider_error(e).with_context(f()))
    }
}
