//! Feature preparation.
//!
//! ## Algorithm
//! 1. No games -> empty table
//! 2. With a snapshot directory: try each snapshot candidate in order,
//!    reusing its pre-encoded columns (first readable one wins)
//! 3. Otherwise, or when every snapshot fails: derive features live from
//!    the catalog records with freshly fit label encoders

use crate::error::Result;
use crate::snapshot::{self, SNAPSHOT_CANDIDATES};
use crate::space::{CategoricalEncoders, LIVE_COLUMNS};
use crate::table::{FeatureRow, FeatureSource, FeatureTable};
use catalog::Game;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Derive features from catalog records, fitting new encoders
pub fn prepare_live(games: &[Game]) -> (FeatureTable, CategoricalEncoders) {
    let encoders = CategoricalEncoders::fit(games);
    // Encoders were fit on exactly these games, so every value is known
    let table = match transform_live(games, &encoders) {
        Ok(table) => table,
        Err(e) => {
            warn!(error = %e, "Freshly fit encoders rejected their own input");
            FeatureTable::empty()
        }
    };
    (table, encoders)
}

/// Derive features from catalog records with an existing encoder set
pub fn transform_live(games: &[Game], encoders: &CategoricalEncoders) -> Result<FeatureTable> {
    let rows = games
        .par_iter()
        .map(|game| {
            Ok(FeatureRow {
                id: game.id,
                name: game.name.clone(),
                rating: game.rating_or_zero(),
                genre: game.primary_genre().to_string(),
                platform: game.primary_platform().to_string(),
                esrb: game.esrb_label().to_string(),
                values: encoders.encode(game)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(FeatureTable::new(
        LIVE_COLUMNS.iter().map(|c| c.to_string()).collect(),
        rows,
        FeatureSource::Live,
    ))
}

/// Output of [`FeaturePreparer::prepare`]
#[derive(Debug, Clone)]
pub struct PreparedFeatures {
    pub table: FeatureTable,
    /// Present only for live derivation
    pub encoders: Option<CategoricalEncoders>,
}

/// Chooses between a content snapshot and live derivation
#[derive(Debug, Clone, Default)]
pub struct FeaturePreparer {
    snapshot_dir: Option<PathBuf>,
}

impl FeaturePreparer {
    /// Always derive live
    pub fn live() -> Self {
        Self { snapshot_dir: None }
    }

    /// Prefer snapshots found in `dir`
    pub fn with_snapshot_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            snapshot_dir: Some(dir.into()),
        }
    }

    pub fn snapshot_dir(&self) -> Option<&Path> {
        self.snapshot_dir.as_deref()
    }

    pub fn prepare(&self, games: &[Game]) -> PreparedFeatures {
        if games.is_empty() {
            warn!("No games to prepare features for");
            return PreparedFeatures {
                table: FeatureTable::empty(),
                encoders: None,
            };
        }

        if let Some(table) = self.prepare_snapshot(games) {
            return PreparedFeatures {
                table,
                encoders: None,
            };
        }

        let (table, encoders) = prepare_live(games);
        info!(
            games = table.len(),
            columns = ?table.columns(),
            "Prepared live features"
        );
        PreparedFeatures {
            table,
            encoders: Some(encoders),
        }
    }

    /// First readable, non-empty snapshot, if any
    pub fn prepare_snapshot(&self, games: &[Game]) -> Option<FeatureTable> {
        let dir = self.snapshot_dir.as_ref()?;

        for name in SNAPSHOT_CANDIDATES {
            let path = dir.join(name);
            if !path.exists() {
                debug!(file = name, "Snapshot not present");
                continue;
            }
            match snapshot::read_snapshot(&path, games) {
                Ok(table) if !table.is_empty() => return Some(table),
                Ok(_) => warn!(file = name, "Snapshot matched no games, trying next source"),
                Err(e) => warn!(file = name, error = %e, "Failed to read snapshot, trying next source"),
            }
        }
        None
    }
}
