//! Feature preparation for the recommendation engines.
//!
//! This crate provides:
//! - `LabelEncoder` and `StandardScaler`, the fitted transforms
//! - `CategoricalEncoders` / `FeatureSpace`, the immutable configuration a
//!   training run produces and inference consumes
//! - `FeatureTable`, one numeric row per game
//! - `FeaturePreparer`, which prefers a pre-processed content snapshot and
//!   falls back to deriving features from catalog records
//!
//! ## Example Usage
//! ```ignore
//! use features::{FeaturePreparer, FeatureSpace, StandardScaler};
//!
//! let prepared = FeaturePreparer::with_snapshot_dir("artifacts").prepare(&games);
//! let (scaler, scaled) = StandardScaler::fit_transform(&prepared.table.matrix())?;
//! let space = FeatureSpace::new(prepared.table.columns().to_vec(), prepared.encoders, scaler);
//! ```

pub mod encoder;
pub mod error;
pub mod prepare;
pub mod scaler;
pub mod snapshot;
pub mod space;
pub mod table;

pub use encoder::LabelEncoder;
pub use error::{FeatureError, Result};
pub use prepare::{FeaturePreparer, PreparedFeatures, prepare_live, transform_live};
pub use scaler::StandardScaler;
pub use space::{CategoricalEncoders, FeatureSpace, LIVE_COLUMNS};
pub use table::{FeatureRow, FeatureSource, FeatureTable};
