//! Error types for gmccx-io

use gmccx_model::{ComponentKind, ModelError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CodecError>;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Format error at line {line}: {message}")]
    Format { line: usize, message: String },

    #[error("Analysis did not converge: expected time {expected}, found {found}")]
    Convergence { expected: f64, found: f64 },

    #[error("Missing block: {0}")]
    MissingBlock(String),

    #[error("Unsupported element type: {0}")]
    UnsupportedElement(String),

    #[error("No {kind:?} left to receive element set {set}")]
    NoPendingComponent { kind: ComponentKind, set: String },

    #[error("Element {0} does not belong to any component")]
    Unassigned(usize),

    #[error("Deck parse error at line {line}: {message}")]
    Deck { line: usize, message: String },

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CodecError {
    pub(crate) fn format(line: usize, message: impl Into<String>) -> Self {
        CodecError::Format {
            line,
            message: message.into(),
        }
    }
}
