//! Error types for DocForge.
//!
//! Library crates use [`DocForgeError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all DocForge operations.
#[derive(Debug, thiserror::Error)]
pub enum DocForgeError {
    /// A caller-supplied argument violates a precondition.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Configuration loading error, or a render requested without a renderer.
    #[error("config error: {message}")]
    Config { message: String },

    /// The external renderer ran and failed, or could not be located.
    #[error("render error: {detail}")]
    Render { detail: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Markdown-to-HTML conversion error.
    #[error("conversion error: {0}")]
    Conversion(String),

    /// Malformed run-contract payload.
    #[error("contract error: {message}")]
    Contract { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DocForgeError>;

impl DocForgeError {
    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a render error carrying the renderer's failure detail.
    pub fn render(detail: impl Into<String>) -> Self {
        Self::Render {
            detail: detail.into(),
        }
    }

    /// Create a contract error from any displayable message.
    pub fn contract(msg: impl Into<String>) -> Self {
        Self::Contract {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Short machine-readable name of the error category.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation",
            Self::Config { .. } => "config",
            Self::Render { .. } => "render",
            Self::Io { .. } => "io",
            Self::Conversion(_) => "conversion",
            Self::Contract { .. } => "contract",
        }
    }
}
