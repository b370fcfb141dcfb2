//! # Catalog Crate
//!
//! The game catalog the recommendation engines read from.
//!
//! ## Main Components
//!
//! - **types**: `Game`, the `GameRepository` seam and the in-memory `CatalogIndex`
//! - **table**: Delimited (CSV) table reader/writer shared by every exported file
//! - **parser**: Parse the catalog CSV into `Game`s
//! - **index**: Load, index and validate a catalog
//! - **error**: Error types for catalog loading
//!
//! ## Example Usage
//!
//! ```ignore
//! use catalog::{CatalogIndex, GameRepository};
//! use std::path::Path;
//!
//! let index = CatalogIndex::load_from_file(Path::new("games.csv"))?;
//! let halo = index.find_by_name("halo").unwrap();
//! println!("{} is rated {:?}", halo.name, halo.rating);
//! ```

pub mod error;
pub mod index;
pub mod parser;
pub mod table;
pub mod types;

pub use error::{CatalogError, Result};
pub use table::DelimitedTable;
pub use types::{CatalogIndex, Game, GameId, GameRepository, UNKNOWN_LABEL};

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_index() -> CatalogIndex {
        CatalogIndex::from_games(vec![
            Game::new(3, "Portal").with_rating(4.8),
            Game::new(1, "Halo")
                .with_rating(4.5)
                .with_genres(&["Shooter", "Action"])
                .with_platforms(&["Xbox"])
                .with_esrb("Mature"),
            Game::new(2, "Tetris").with_rating(4.0),
        ])
    }

    #[test]
    fn test_catalog_index_creation() {
        let index = CatalogIndex::new();
        assert_eq!(index.counts(), (0, 0, 0));
        assert!(index.is_empty());
        assert!(index.list_all().is_empty());
    }

    #[test]
    fn test_game_accessors() {
        let index = sample_index();
        let halo = index.get(1).unwrap();
        assert_eq!(halo.primary_genre(), "Shooter");
        assert_eq!(halo.primary_platform(), "Xbox");
        assert_eq!(halo.esrb_label(), "Mature");

        let tetris = index.get(2).unwrap();
        assert_eq!(tetris.primary_genre(), UNKNOWN_LABEL);
        assert_eq!(tetris.primary_platform(), UNKNOWN_LABEL);
        assert_eq!(tetris.esrb_label(), UNKNOWN_LABEL);
        assert_eq!(Game::new(9, "x").rating_or_zero(), 0.0);
    }

    #[test]
    fn test_repository_queries() {
        let index = sample_index();

        let all: Vec<GameId> = index.list_all().iter().map(|g| g.id).collect();
        assert_eq!(all, vec![1, 2, 3]);

        let some: Vec<GameId> = index
            .list_by_ids(&[3, 99, 1, 3])
            .iter()
            .map(|g| g.id)
            .collect();
        assert_eq!(some.len(), 2);
        assert!(some.contains(&1) && some.contains(&3));

        assert_eq!(index.find_by_name(" PORTAL ").map(|g| g.id), Some(3));
        assert!(index.find_by_name("Doom").is_none());
        assert!(index.get(99).is_none());
    }
}
