//! Error handling and error types for anomalyze.
//!
//! Structural problems (missing columns, malformed shapes, a feature matrix
//! that does not line up with the forest) are fatal and surface as
//! [`AnomalyzeError`]. Numerical edge cases are represented in the data
//! itself and never raised.

use std::io;
use thiserror::Error;

/// Main error type for the anomalyze library.
#[derive(Error, Debug)]
pub enum AnomalyzeError {
    /// One or more required columns are missing from a table or matrix
    #[error("Schema error: missing column(s) {}", missing.join(", "))]
    Schema { missing: Vec<String> },

    /// Malformed shape (ragged columns, zero-width matrix, empty forest, ...)
    #[error("Shape error: {message}")]
    Shape { message: String },

    /// Feature matrix does not correspond to what the forest was trained on
    #[error("Input mismatch: expected {expected}, got {actual}")]
    InputMismatch { expected: String, actual: String },

    /// Configuration and validation errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Invalid input parameters
    #[error("Invalid parameter: {parameter} = {value}, {reason}")]
    InvalidParameter {
        parameter: String,
        value: String,
        reason: String,
    },

    /// Out of bounds access
    #[error("Index out of bounds: index {index}, length {length}")]
    IndexOutOfBounds { index: usize, length: usize },

    /// A computation was cancelled before all tree tasks finished
    #[error("Computation cancelled: {reason}")]
    Cancelled { reason: String },

    /// File I/O errors
    #[error("I/O error: {source}")]
    IO {
        #[from]
        source: io::Error,
    },

    /// JSON serialization errors
    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    /// TOML parsing errors
    #[error("TOML error: {source}")]
    Toml {
        #[from]
        source: toml::de::Error,
    },

    /// Bincode serialization errors
    #[error("Bincode error: {source}")]
    Bincode {
        #[from]
        source: bincode::Error,
    },

    /// Internal library errors (should not occur in normal usage)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Type alias for Results using AnomalyzeError
pub type Result<T> = std::result::Result<T, AnomalyzeError>;

impl AnomalyzeError {
    /// Create a schema error for the given missing column names
    pub fn schema<I, S>(missing: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AnomalyzeError::Schema {
            missing: missing.into_iter().map(Into::into).collect(),
        }
    }

    /// Create a shape error
    pub fn shape<S: Into<String>>(message: S) -> Self {
        AnomalyzeError::Shape {
            message: message.into(),
        }
    }

    /// Create an input mismatch error
    pub fn input_mismatch<E, A>(expected: E, actual: A) -> Self
    where
        E: Into<String>,
        A: Into<String>,
    {
        AnomalyzeError::InputMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        AnomalyzeError::Config {
            message: message.into(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter<P, V, R>(parameter: P, value: V, reason: R) -> Self
    where
        P: Into<String>,
        V: Into<String>,
        R: Into<String>,
    {
        AnomalyzeError::InvalidParameter {
            parameter: parameter.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create an index out of bounds error
    pub fn index_out_of_bounds(index: usize, length: usize) -> Self {
        AnomalyzeError::IndexOutOfBounds { index, length }
    }

    /// Create a cancellation error
    pub fn cancelled<S: Into<String>>(reason: S) -> Self {
        AnomalyzeError::Cancelled {
            reason: reason.into(),
        }
    }

    /// Create an internal error (should be used sparingly)
    pub fn internal<S: Into<String>>(message: S) -> Self {
        AnomalyzeError::Internal {
            message: message.into(),
        }
    }

    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            AnomalyzeError::Schema { .. } => false,
            AnomalyzeError::Shape { .. } => false,
            AnomalyzeError::InputMismatch { .. } => false,
            AnomalyzeError::Config { .. } => false,
            AnomalyzeError::InvalidParameter { .. } => false,
            AnomalyzeError::IndexOutOfBounds { .. } => false,
            AnomalyzeError::Cancelled { .. } => true,
            AnomalyzeError::IO { .. } => false,
            AnomalyzeError::Json { .. } => false,
            AnomalyzeError::Toml { .. } => false,
            AnomalyzeError::Bincode { .. } => false,
            AnomalyzeError::Internal { .. } => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            AnomalyzeError::Schema { .. } => "schema",
            AnomalyzeError::Shape { .. } => "shape",
            AnomalyzeError::InputMismatch { .. } => "input_mismatch",
            AnomalyzeError::Config { .. } => "config",
            AnomalyzeError::InvalidParameter { .. } => "invalid_parameter",
            AnomalyzeError::IndexOutOfBounds { .. } => "index_out_of_bounds",
            AnomalyzeError::Cancelled { .. } => "cancelled",
            AnomalyzeError::IO { .. } => "io",
            AnomalyzeError::Json { .. } => "json",
            AnomalyzeError::Toml { .. } => "toml",
            AnomalyzeError::Bincode { .. } => "bincode",
            AnomalyzeError::Internal { .. } => "internal",
        }
    }
}

/// Convenience macros for error creation
#[macro_export]
macro_rules! shape_error {
    ($msg:expr) => {
        $crate::core::error::AnomalyzeError::shape($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::core::error::AnomalyzeError::shape(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::core::error::AnomalyzeError::config($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::core::error::AnomalyzeError::config(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! ensure {
    ($cond:expr, $err:expr) => {
        if !($cond) {
            return Err($err.into());
        }
    };
}
