//! Error types for the recommendation engines.
//!
//! Public query operations never return these; they log them and answer
//! with an empty result. The `try_*` variants expose them for callers that
//! need to tell a fault from a miss.

use artifacts::ArtifactError;
use catalog::CatalogError;
use features::FeatureError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Feature preparation failed: {0}")]
    Feature(#[from] FeatureError),

    #[error("Artifact error: {0}")]
    Artifact(#[from] ArtifactError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// No model has been fit or loaded
    #[error("{0} model is not loaded")]
    NotLoaded(&'static str),

    /// A lookup resolved to a row the loaded matrix does not have
    #[error("Row {index} is outside a matrix of size {size}")]
    IndexOutOfRange { index: usize, size: usize },

    #[error("Invalid similarity matrix: {0}")]
    InvalidMatrix(String),

    #[error("No training data")]
    EmptyInput,

    #[error("Expected {expected} feature columns, found {found}")]
    DimensionMismatch { expected: usize, found: usize },
}

pub type Result<T> = std::result::Result<T, EngineError>;
