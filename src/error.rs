// src/error.rs

//! Unified error handling for the deployment tool.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for deployment operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// The deployment artifact does not exist at apply time
    #[error("Artifact not found: {}", path.display())]
    ArtifactNotFound { path: PathBuf },

    /// Descriptor or parameter validation failed
    #[error("Validation error: {0}")]
    Validation(String),

    /// The platform refused the call for lack of permissions
    #[error("Authorization error: {0}")]
    Authorization(String),

    /// Resource-state conflict (name collision, concurrent modification)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A resource expected to exist is gone
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Any other platform failure, surfaced verbatim
    #[error("Provider error for {context}: {message}")]
    Provider { context: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization failed
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl AppError {
    /// Create an artifact-not-found error.
    pub fn artifact_not_found(path: impl Into<PathBuf>) -> Self {
        Self::ArtifactNotFound { path: path.into() }
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a provider error with context.
    pub fn provider(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Provider {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Classify a platform error code into the error taxonomy.
    ///
    /// Codes follow the AWS service exception names; anything unrecognized
    /// becomes a [`AppError::Provider`] carrying the original message.
    pub fn from_platform_code(context: &str, code: Option<&str>, message: impl fmt::Display) -> Self {
        let message = message.to_string();
        match code {
            Some(
                "AccessDeniedException"
                | "AccessDenied"
                | "UnauthorizedOperation"
                | "UnrecognizedClientException"
                | "ExpiredTokenException",
            ) => Self::Authorization(format!("{context}: {message}")),
            Some(
                "ResourceConflictException"
                | "ResourceAlreadyExistsException"
                | "OperationAbortedException",
            ) => Self::Conflict(format!("{context}: {message}")),
            Some("ResourceNotFoundException") => Self::NotFound(format!("{context}: {message}")),
            Some("InvalidParameterValueException" | "InvalidParameterException") => {
                Self::Validation(format!("{context}: {message}"))
            }
            _ => Self::provider(context, message),
        }
    }

    /// Whether this error means the resource does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
