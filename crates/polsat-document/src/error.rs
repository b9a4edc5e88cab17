//! Error types for document extraction and generation.

use std::path::PathBuf;

use thiserror::Error;

/// A policy document could not be turned into entries.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Failed to read policy document at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed XML: {0}")]
    Xml(String),

    #[error("Expected root element 'policyFile', found '{found}'")]
    UnexpectedRoot { found: String },

    #[error("Unexpected element '{element}' at policy {policy}")]
    UnexpectedElement { policy: usize, element: String },

    #[error("Policy {policy} is missing required element '{element}'")]
    MissingElement {
        policy: usize,
        element: &'static str,
    },

    #[error("Policy {policy} has non-integer {attribute} bound '{value}'")]
    InvalidBound {
        policy: usize,
        attribute: &'static str,
        value: String,
    },

    #[error("Comparator policy {policy} declares neither 'min' nor 'max'")]
    MissingBounds { policy: usize },

    #[error("Policy {policy} declares bounds on a '{rule}' rule")]
    UnexpectedBounds { policy: usize, rule: String },
}

/// Result type for document extraction.
pub type Result<T> = std::result::Result<T, DocumentError>;

/// Synthetic policy files could not be written.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("Failed to write policy file at {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid generator options: {0}")]
    InvalidOptions(String),
}
