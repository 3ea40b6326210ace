//! Error types for relayout.
//!
//! These cover the API boundary only: decoding and validating input,
//! validating options, and serializing output. Layout problems inside a
//! document are never errors; they are reported as
//! [`Diagnostic`](crate::model::Diagnostic)s.

use std::io;
use thiserror::Error;

/// Result type alias for relayout operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur at the library boundary.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The token input violates the input contract.
    #[error("Invalid token input: {0}")]
    InvalidInput(String),

    /// Error decoding or encoding JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A layout option is out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Error during rendering (Markdown, text, JSON).
    #[error("Rendering error: {0}")]
    Render(String),
}
