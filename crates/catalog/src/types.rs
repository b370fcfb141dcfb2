//! Core domain types for the game catalog.
//!
//! This module defines the game record consumed by the recommendation
//! engines, the read-only repository seam they query through, and the
//! in-memory `CatalogIndex` that implements it.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

// =============================================================================
// Type Aliases
// =============================================================================

/// Stable, unique identifier of a game in the catalog
pub type GameId = u32;

/// Label used when a categorical attribute is missing
pub const UNKNOWN_LABEL: &str = "Unknown";

// =============================================================================
// Game
// =============================================================================

/// A game as stored in the catalog.
///
/// Genres and platforms are ordered lists; the first entry is the "primary"
/// value used for feature encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub id: GameId,
    /// Display name. Also the join key for exports that predate catalog ids.
    pub name: String,
    /// Rating on a 0-5 scale, if the game has been rated
    pub rating: Option<f32>,
    pub genres: Vec<String>,
    pub platforms: Vec<String>,
    /// Content rating label (e.g. "Teen", "Mature")
    pub esrb: Option<String>,
    pub cover_image_url: Option<String>,
}

impl Game {
    /// Creates a game with only an id and a name; everything else is empty
    pub fn new(id: GameId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            rating: None,
            genres: Vec::new(),
            platforms: Vec::new(),
            esrb: None,
            cover_image_url: None,
        }
    }

    pub fn with_rating(mut self, rating: f32) -> Self {
        self.rating = Some(rating);
        self
    }

    pub fn with_genres(mut self, genres: &[&str]) -> Self {
        self.genres = genres.iter().map(|g| g.to_string()).collect();
        self
    }

    pub fn with_platforms(mut self, platforms: &[&str]) -> Self {
        self.platforms = platforms.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn with_esrb(mut self, esrb: impl Into<String>) -> Self {
        self.esrb = Some(esrb.into());
        self
    }

    /// First genre, or "Unknown"
    pub fn primary_genre(&self) -> &str {
        self.genres.first().map(String::as_str).unwrap_or(UNKNOWN_LABEL)
    }

    /// First platform, or "Unknown"
    pub fn primary_platform(&self) -> &str {
        self.platforms
            .first()
            .map(String::as_str)
            .unwrap_or(UNKNOWN_LABEL)
    }

    /// Content rating label, or "Unknown"
    pub fn esrb_label(&self) -> &str {
        match self.esrb.as_deref() {
            Some(label) if !label.trim().is_empty() => label,
            _ => UNKNOWN_LABEL,
        }
    }

    /// Rating with missing values treated as 0 (the feature-space convention)
    pub fn rating_or_zero(&self) -> f32 {
        self.rating.unwrap_or(0.0)
    }
}

// =============================================================================
// Repository seam
// =============================================================================

/// Read-only access to the catalog.
///
/// The recommendation engines only ever read games through this trait, so
/// any storage backend can sit behind it. `Send + Sync` lets one repository
/// be shared across request handlers.
pub trait GameRepository: Send + Sync {
    /// Fetch a single game by id
    fn get(&self, id: GameId) -> Option<Game>;

    /// Fetch every game in the catalog
    fn list_all(&self) -> Vec<Game>;

    /// Fetch the games whose ids are in `ids`.
    ///
    /// The result order is NOT tied to the order of `ids`; callers that
    /// need a ranking must re-sort. Unknown ids are silently absent.
    fn list_by_ids(&self, ids: &[GameId]) -> Vec<Game>;

    /// Case-insensitive exact name match
    fn find_by_name(&self, name: &str) -> Option<Game>;
}

// =============================================================================
// CatalogIndex - the in-memory catalog
// =============================================================================

/// In-memory catalog with O(1) id and name lookups.
#[derive(Debug)]
pub struct CatalogIndex {
    pub(crate) games: HashMap<GameId, Game>,

    /// Lower-cased name -> id (first game inserted with a name wins)
    pub(crate) name_index: HashMap<String, GameId>,

    // Secondary indices
    pub(crate) genre_index: BTreeMap<String, Vec<GameId>>,
    pub(crate) platform_index: BTreeMap<String, Vec<GameId>>,
}

impl CatalogIndex {
    pub fn new() -> Self {
        Self {
            games: HashMap::new(),
            name_index: HashMap::new(),
            genre_index: BTreeMap::new(),
            platform_index: BTreeMap::new(),
        }
    }

    /// Builds an index from a list of games and computes secondary indices
    pub fn from_games(games: impl IntoIterator<Item = Game>) -> Self {
        let mut index = Self::new();
        for game in games {
            index.insert_game(game);
        }
        index.build_secondary_indices();
        index
    }

    pub fn get_game(&self, id: GameId) -> Option<&Game> {
        self.games.get(&id)
    }

    pub fn get_game_by_name(&self, name: &str) -> Option<&Game> {
        self.name_index
            .get(&name.trim().to_lowercase())
            .and_then(|id| self.games.get(id))
    }

    /// All game ids, sorted ascending
    pub fn get_all_game_ids(&self) -> Vec<GameId> {
        let mut ids: Vec<GameId> = self.games.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn get_games_by_genre(&self, genre: &str) -> &[GameId] {
        self.genre_index
            .get(genre)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn get_games_by_platform(&self, platform: &str) -> &[GameId] {
        self.platform_index
            .get(platform)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Insert a game, replacing any previous game with the same id
    pub fn insert_game(&mut self, game: Game) {
        self.name_index
            .entry(game.name.trim().to_lowercase())
            .or_insert(game.id);
        self.games.insert(game.id, game);
    }

    /// Number of games, genres and platforms
    pub fn counts(&self) -> (usize, usize, usize) {
        (
            self.games.len(),
            self.genre_index.len(),
            self.platform_index.len(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }
}

impl Default for CatalogIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl GameRepository for CatalogIndex {
    fn get(&self, id: GameId) -> Option<Game> {
        self.games.get(&id).cloned()
    }

    fn list_all(&self) -> Vec<Game> {
        self.get_all_game_ids()
            .into_iter()
            .filter_map(|id| self.games.get(&id).cloned())
            .collect()
    }

    fn list_by_ids(&self, ids: &[GameId]) -> Vec<Game> {
        let mut wanted: Vec<GameId> = ids.to_vec();
        wanted.sort_unstable();
        wanted.dedup();
        wanted
            .into_iter()
            .filter_map(|id| self.games.get(&id).cloned())
            .collect()
    }

    fn find_by_name(&self, name: &str) -> Option<Game> {
        self.get_game_by_name(name).cloned()
    }
}
