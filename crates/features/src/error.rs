//! Error types for feature preparation.

use catalog::CatalogError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeatureError {
    /// A categorical value was not seen when the encoder was fit
    #[error("Unknown {feature} category: {value:?}")]
    UnknownCategory { feature: String, value: String },

    /// An encoder or scaler was used before being fit
    #[error("{0} has not been fit")]
    NotFitted(&'static str),

    /// A row's width does not match the fitted column count
    #[error("Expected {expected} feature columns, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    /// A content snapshot is unreadable or lacks required columns
    #[error("Malformed snapshot {file}: {reason}")]
    MalformedSnapshot { file: String, reason: String },

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

pub type Result<T> = std::result::Result<T, FeatureError>;
