//! The prepared feature table shared by both engines.

use catalog::GameId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Where a feature table came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureSource {
    /// Derived from catalog records with freshly fit encoders
    Live,
    /// Read from a pre-processed snapshot file
    Snapshot { file: String },
}

impl FeatureSource {
    pub fn is_snapshot(&self) -> bool {
        matches!(self, FeatureSource::Snapshot { .. })
    }
}

/// One game's row: identity, raw categorical values and numeric features
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub id: GameId,
    pub name: String,
    pub rating: f32,
    pub genre: String,
    pub platform: String,
    pub esrb: String,
    /// Numeric features, one per entry of the table's `columns`
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    columns: Vec<String>,
    rows: Vec<FeatureRow>,
    source: FeatureSource,
}

impl FeatureTable {
    pub fn new(columns: Vec<String>, rows: Vec<FeatureRow>, source: FeatureSource) -> Self {
        Self {
            columns,
            rows,
            source,
        }
    }

    /// A table with no rows and no columns
    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new(), FeatureSource::Live)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn source(&self) -> &FeatureSource {
        &self.source
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Numeric features as a row-major matrix
    pub fn matrix(&self) -> Vec<Vec<f64>> {
        self.rows.iter().map(|r| r.values.clone()).collect()
    }

    /// Game ids in row order
    pub fn ids(&self) -> Vec<GameId> {
        self.rows.iter().map(|r| r.id).collect()
    }

    /// Game id -> row index. If an id repeats, its first row wins.
    pub fn index_map(&self) -> HashMap<GameId, usize> {
        let mut map = HashMap::with_capacity(self.rows.len());
        for (idx, row) in self.rows.iter().enumerate() {
            map.entry(row.id).or_insert(idx);
        }
        map
    }
}
