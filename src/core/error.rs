// SPDX-License-Identifier: MIT OR Apache-2.0

//! DataCount Core Error Types
//!
//! Configuration errors are fatal and only raised at startup; everything
//! that can go wrong at runtime (persistence, emission) is reported through
//! these types but handled best-effort by the callers.

use thiserror::Error;

/// Result type for DataCount operations
pub type DataCountResult<T> = Result<T, DataCountError>;

/// DataCount error types
#[derive(Error, Debug)]
pub enum DataCountError {
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        config_key: Option<String>,
    },

    #[error("Persistence error: {message}")]
    Persistence {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Emit failed: {message}")]
    Emit {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

// Custom error creation helpers
impl DataCountError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            config_key: None,
        }
    }

    /// Create a configuration error with a specific key
    pub fn configuration_with_key(
        message: impl Into<String>,
        config_key: impl Into<String>,
    ) -> Self {
        Self::Configuration {
            message: message.into(),
            config_key: Some(config_key.into()),
        }
    }

    /// Create a persistence error
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence {
            message: message.into(),
            source: None,
        }
    }

    /// Create a persistence error with source
    pub fn persistence_with_source(
        message: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Persistence {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create an emit error
    pub fn emit(message: impl Into<String>) -> Self {
        Self::Emit {
            message: message.into(),
            source: None,
        }
    }

    /// Create an emit error with source
    pub fn emit_with_source(
        message: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Emit {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Whether this error is fatal at startup
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }
}
