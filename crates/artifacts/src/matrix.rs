//! Dense square `f32` matrix and its raw binary file format.
//!
//! File layout (little endian):
//!
//! | offset | size        | field                  |
//! |--------|-------------|------------------------|
//! | 0      | 4           | magic `GMAT`           |
//! | 4      | 4           | format version (`u32`) |
//! | 8      | 8           | rows (`u64`)           |
//! | 16     | 8           | cols (`u64`)           |
//! | 24     | 4*rows*cols | values, row-major      |

use crate::error::{ArtifactError, Result};
use crate::store::ArtifactStore;
use serde::{Deserialize, Serialize};

const MAGIC: &[u8; 4] = b"GMAT";
const MATRIX_VERSION: u32 = 1;
const HEADER_LEN: usize = 24;

/// Row-major square matrix.
///
/// Serializes as a list of rows so JSON bundles stay readable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<f32>>", into = "Vec<Vec<f32>>")]
pub struct DenseMatrix {
    size: usize,
    values: Vec<f32>,
}

impl DenseMatrix {
    /// Build from row-major values; `values.len()` must equal `size * size`
    pub fn new(size: usize, values: Vec<f32>) -> std::result::Result<Self, String> {
        if values.len() != size * size {
            return Err(format!(
                "{} values cannot form a {size}x{size} matrix",
                values.len()
            ));
        }
        Ok(Self { size, values })
    }

    pub fn from_rows(rows: Vec<Vec<f32>>) -> std::result::Result<Self, String> {
        let size = rows.len();
        if let Some(bad) = rows.iter().find(|r| r.len() != size) {
            return Err(format!(
                "matrix is not square: {size} rows but a row of length {}",
                bad.len()
            ));
        }
        Ok(Self {
            size,
            values: rows.into_iter().flatten().collect(),
        })
    }

    pub fn empty() -> Self {
        Self {
            size: 0,
            values: Vec::new(),
        }
    }

    /// Number of rows (and columns)
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        if row < self.size && col < self.size {
            Some(self.values[row * self.size + col])
        } else {
            None
        }
    }

    pub fn row(&self, row: usize) -> Option<&[f32]> {
        (row < self.size).then(|| &self.values[row * self.size..(row + 1) * self.size])
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// (mean, min, max) over every entry, `None` when empty
    pub fn stats(&self) -> Option<(f32, f32, f32)> {
        if self.values.is_empty() {
            return None;
        }
        let (sum, min, max) = self.values.iter().fold(
            (0.0f64, f32::INFINITY, f32::NEG_INFINITY),
            |(s, lo, hi), &v| (s + v as f64, lo.min(v), hi.max(v)),
        );
        Some(((sum / self.values.len() as f64) as f32, min, max))
    }

    /// Encode to the raw binary format
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.values.len() * 4);
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&MATRIX_VERSION.to_le_bytes());
        out.extend_from_slice(&(self.size as u64).to_le_bytes());
        out.extend_from_slice(&(self.size as u64).to_le_bytes());
        for v in &self.values {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out
    }

    /// Decode the raw binary format. `name` is only used in errors.
    pub fn from_bytes(name: &str, bytes: &[u8]) -> Result<Self> {
        let bad = |reason: String| ArtifactError::MatrixFormat {
            name: name.to_string(),
            reason,
        };

        if bytes.len() < HEADER_LEN {
            return Err(bad(format!("{} bytes is shorter than the header", bytes.len())));
        }
        if &bytes[0..4] != MAGIC {
            return Err(bad("bad magic".to_string()));
        }
        let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        if version != MATRIX_VERSION {
            return Err(bad(format!("unsupported matrix version {version}")));
        }
        let rows = read_u64(&bytes[8..16]);
        let cols = read_u64(&bytes[16..24]);
        if rows != cols {
            return Err(bad(format!("matrix is {rows}x{cols}, expected square")));
        }

        let size = usize::try_from(rows).map_err(|_| bad(format!("{rows} rows is too large")))?;
        let expected = size
            .checked_mul(size)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| bad(format!("{size}x{size} is too large")))?;
        let payload = &bytes[HEADER_LEN..];
        if payload.len() != expected {
            return Err(bad(format!(
                "expected {expected} payload bytes, found {}",
                payload.len()
            )));
        }

        let values = payload
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Ok(Self { size, values })
    }
}

fn read_u64(b: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(b);
    u64::from_le_bytes(buf)
}

impl TryFrom<Vec<Vec<f32>>> for DenseMatrix {
    type Error = String;

    fn try_from(rows: Vec<Vec<f32>>) -> std::result::Result<Self, String> {
        Self::from_rows(rows)
    }
}

impl From<DenseMatrix> for Vec<Vec<f32>> {
    fn from(m: DenseMatrix) -> Self {
        if m.size == 0 {
            return Vec::new();
        }
        m.values.chunks(m.size).map(|c| c.to_vec()).collect()
    }
}

pub fn write_matrix(store: &ArtifactStore, name: &str, matrix: &DenseMatrix) -> Result<()> {
    store.write(name, &matrix.to_bytes())
}

pub fn read_matrix(store: &ArtifactStore, name: &str) -> Result<DenseMatrix> {
    let bytes = store.read(name)?;
    DenseMatrix::from_bytes(name, &bytes)
}
