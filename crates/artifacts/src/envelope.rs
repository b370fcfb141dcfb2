//! Versioned JSON envelope around every model payload.
//!
//! ```text
//! { "format_version": 2, "kind": "kmeans", "trained_at": 1760000000, "payload": { ... } }
//! ```
//!
//! The header is checked before the payload is decoded, so a file from a
//! newer build fails with `IncompatibleVersion` instead of a confusing
//! field error. A file without a header is `UnrecognizedShape`, which lets
//! a loader chain move on to its legacy strategies.

use crate::error::{ArtifactError, Result};
use crate::store::ArtifactStore;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Format version written by this build
pub const CURRENT_FORMAT_VERSION: u32 = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub format_version: u32,
    pub kind: String,
    /// Unix seconds
    pub trained_at: u64,
    pub payload: T,
}

#[derive(Deserialize)]
struct Header {
    format_version: Option<u32>,
    kind: Option<String>,
}

impl<T> Envelope<T> {
    /// Wrap a payload stamped with the current version and time
    pub fn new(kind: &str, payload: T) -> Self {
        let trained_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self {
            format_version: CURRENT_FORMAT_VERSION,
            kind: kind.to_string(),
            trained_at,
            payload,
        }
    }
}

pub fn write_envelope<T: Serialize>(
    store: &ArtifactStore,
    name: &str,
    kind: &str,
    payload: &T,
) -> Result<()> {
    store.write_json(name, &Envelope::new(kind, payload))
}

pub fn read_envelope<T: DeserializeOwned>(
    store: &ArtifactStore,
    name: &str,
    kind: &str,
) -> Result<Envelope<T>> {
    let bytes = store.read(name)?;
    let json_err = |source| ArtifactError::Json {
        name: name.to_string(),
        source,
    };
    let shape_err = |reason: String| ArtifactError::UnrecognizedShape {
        name: name.to_string(),
        reason,
    };

    let header: Header = serde_json::from_slice(&bytes).map_err(json_err)?;
    let version = header
        .format_version
        .ok_or_else(|| shape_err("no format_version header".to_string()))?;
    if version > CURRENT_FORMAT_VERSION {
        return Err(ArtifactError::IncompatibleVersion {
            name: name.to_string(),
            found: version,
            supported: CURRENT_FORMAT_VERSION,
        });
    }
    match header.kind.as_deref() {
        Some(k) if k == kind => {}
        other => {
            return Err(shape_err(format!(
                "expected kind {kind:?}, found {:?}",
                other.unwrap_or("<none>")
            )));
        }
    }

    serde_json::from_slice(&bytes).map_err(json_err)
}
