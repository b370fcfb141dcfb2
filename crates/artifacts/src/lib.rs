//! # Artifacts Crate
//!
//! Persistence for trained models.
//!
//! ## Main Components
//!
//! - **store**: `ArtifactStore`, named blobs in one directory with atomic writes
//! - **envelope**: versioned JSON wrapper around model payloads
//! - **chain**: `LoadStrategy` / `LoaderChain`, prioritized fallback loading
//! - **matrix**: `DenseMatrix` and its raw binary file format
//! - **names**: the well-known artifact file names
//! - **error**: `ArtifactError` with diagnostic hints

pub mod chain;
pub mod envelope;
pub mod error;
pub mod matrix;
pub mod names;
pub mod store;

pub use chain::{LoadStrategy, Loaded, LoaderChain};
pub use envelope::{CURRENT_FORMAT_VERSION, Envelope, read_envelope, write_envelope};
pub use error::{ArtifactError, Result};
pub use matrix::{DenseMatrix, read_matrix, write_matrix};
pub use store::ArtifactStore;
