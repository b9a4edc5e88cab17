//! Error types for conflict analysis.

use std::path::PathBuf;

use polsat_document::DocumentError;
use polsat_types::{GroupKey, IdentityId};
use thiserror::Error;

use crate::encoder::EncodeError;
use crate::solver::SolverError;

/// Errors raised while analyzing policy documents.
///
/// Most variants are scoped to one file or one conflict group: the batch
/// runner records them and moves on. Exhausting the identity domain or
/// failing to append the summary log aborts the run.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Failed to parse policy document {path}: {source}")]
    DocumentParse {
        path: PathBuf,
        #[source]
        source: DocumentError,
    },

    #[error("Failed to encode conflict group {group}: {source}")]
    ConstraintEncoding {
        group: GroupKey,
        #[source]
        source: EncodeError,
    },

    #[error("Identity domain exhausted: at most {limit} distinct users and groups fit a selector")]
    IdentityDomainExceeded { limit: usize },

    #[error("Solver failed on conflict group {group}: {source}")]
    SolverInvocation {
        group: GroupKey,
        #[source]
        source: SolverError,
    },

    #[error("Unknown identity id {0}")]
    UnknownIdentity(IdentityId),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to append summary log {path}: {source}")]
    Summary {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl AnalysisError {
    /// Returns true if the error must stop the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::IdentityDomainExceeded { .. } | Self::Summary { .. }
        )
    }
}

/// Result type for analysis operations.
pub type Result<T> = std::result::Result<T, AnalysisError>;
