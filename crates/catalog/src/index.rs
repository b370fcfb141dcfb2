//! CatalogIndex loading, secondary indices and validation.

use crate::error::{CatalogError, Result};
use crate::parser;
use crate::types::*;
use rayon::prelude::*;
use std::path::Path;
use tracing::info;

impl CatalogIndex {
    /// Load the catalog from a games CSV.
    ///
    /// Steps:
    /// 1. Parse the file (rows in parallel)
    /// 2. Build the primary and name indices
    /// 3. Build the genre and platform indices
    /// 4. Validate
    pub fn load_from_file(path: &Path) -> Result<Self> {
        info!(path = %path.display(), "Loading game catalog");

        let games = parser::parse_games(path)?;
        let index = Self::from_games(games);
        index.validate()?;

        let (games, genres, platforms) = index.counts();
        info!(games, genres, platforms, "Catalog loaded");
        Ok(index)
    }

    /// Rebuild the genre and platform indices from the primary map.
    ///
    /// Each id list is sorted so lookups are deterministic.
    pub fn build_secondary_indices(&mut self) {
        self.genre_index.clear();
        self.platform_index.clear();

        for (&game_id, game) in &self.games {
            for genre in &game.genres {
                self.genre_index
                    .entry(genre.clone())
                    .or_default()
                    .push(game_id);
            }
            for platform in &game.platforms {
                self.platform_index
                    .entry(platform.clone())
                    .or_default()
                    .push(game_id);
            }
        }

        for ids in self
            .genre_index
            .values_mut()
            .chain(self.platform_index.values_mut())
        {
            ids.sort_unstable();
            ids.dedup();
        }
    }

    /// Validate data integrity
    ///
    /// Check that:
    /// - Every game has a non-empty name
    /// - Ratings, when present, are finite and within 0.0 - 5.0
    pub fn validate(&self) -> Result<()> {
        let bad = self.games.par_iter().find_any(|(_, game)| {
            game.name.trim().is_empty()
                || game
                    .rating
                    .is_some_and(|r| !r.is_finite() || !(0.0..=5.0).contains(&r))
        });

        match bad {
            None => Ok(()),
            Some((_, game)) if game.name.trim().is_empty() => Err(
                CatalogError::ValidationError(format!("game {} has an empty name", game.id)),
            ),
            Some((_, game)) => Err(CatalogError::InvalidValue {
                field: format!("rating of game {}", game.id),
                value: game.rating.map(|r| r.to_string()).unwrap_or_default(),
            }),
        }
    }

    /// Case-insensitive substring search over names, sorted by name
    pub fn search_by_name(&self, needle: &str) -> Vec<&Game> {
        let needle = needle.trim().to_lowercase();
        let mut hits: Vec<&Game> = self
            .games
            .values()
            .filter(|g| g.name.to_lowercase().contains(&needle))
            .collect();
        hits.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        hits
    }
}
