//! Error types for artifact persistence.
//!
//! Every variant names the artifact it concerns. [`ArtifactError::hint`]
//! maps known failure signatures to an operator-facing remedy.

use serde_json::error::Category;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArtifactError {
    /// The artifact does not exist
    #[error("Artifact {name} not found")]
    NotFound { name: String },

    #[error("I/O error on artifact {name}: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in artifact {name}: {source}")]
    Json {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    /// Written by a newer format than this build understands
    #[error("Artifact {name} has format version {found}, this build supports up to {supported}")]
    IncompatibleVersion {
        name: String,
        found: u32,
        supported: u32,
    },

    /// Parsed, but not in any shape the reader accepts
    #[error("Artifact {name} has an unrecognized shape: {reason}")]
    UnrecognizedShape { name: String, reason: String },

    /// A raw matrix file failed header or length validation
    #[error("Matrix file {name} is invalid: {reason}")]
    MatrixFormat { name: String, reason: String },

    /// A matrix does not line up with the rows it is supposed to index
    #[error("Matrix in {name} is {found}x{found} but {expected} rows were expected")]
    MatrixMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    /// Every strategy in a loader chain failed
    #[error("No loadable {kind} artifact after {attempts} attempts")]
    Exhausted { kind: String, attempts: usize },
}

impl ArtifactError {
    /// Remedy for a known failure signature; `None` for plain absence
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            ArtifactError::NotFound { .. } | ArtifactError::Exhausted { .. } => None,
            ArtifactError::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound => {
                None
            }
            ArtifactError::Io { .. } => Some("check permissions on the artifact directory"),
            ArtifactError::IncompatibleVersion { .. } => {
                Some("retrain with the current toolchain")
            }
            ArtifactError::Json { source, .. } => match source.classify() {
                Category::Data => Some("artifact shape not recognized"),
                _ => Some("artifact is corrupt or truncated; delete it and retrain"),
            },
            ArtifactError::UnrecognizedShape { .. } => Some("artifact shape not recognized"),
            ArtifactError::MatrixFormat { .. } | ArtifactError::MatrixMismatch { .. } => {
                Some("matrix file does not match the snapshot; regenerate both together")
            }
        }
    }

    /// Whether this is plain absence rather than a broken artifact
    pub fn is_not_found(&self) -> bool {
        match self {
            ArtifactError::NotFound { .. } => true,
            ArtifactError::Io { source, .. } => source.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ArtifactError>;
