//! Fitted feature-space configuration.
//!
//! Training returns a [`FeatureSpace`] and inference takes one explicitly,
//! so a model can only ever be queried with the encoders and scaler it was
//! trained with.

use crate::encoder::LabelEncoder;
use crate::error::{FeatureError, Result};
use crate::scaler::StandardScaler;
use catalog::Game;
use serde::{Deserialize, Serialize};

/// Column layout of features derived from live catalog records
pub const LIVE_COLUMNS: [&str; 4] = ["rating", "genre_encoded", "platform_encoded", "esrb_encoded"];

/// The three categorical encoders fit in one training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalEncoders {
    pub genre: LabelEncoder,
    pub platform: LabelEncoder,
    pub esrb: LabelEncoder,
}

impl CategoricalEncoders {
    pub fn fit(games: &[Game]) -> Self {
        Self {
            genre: LabelEncoder::fit(games.iter().map(Game::primary_genre)),
            platform: LabelEncoder::fit(games.iter().map(Game::primary_platform)),
            esrb: LabelEncoder::fit(games.iter().map(Game::esrb_label)),
        }
    }

    /// Encode one game as `[rating, genre, platform, esrb]`
    pub fn encode(&self, game: &Game) -> Result<Vec<f64>> {
        Ok(vec![
            game.rating_or_zero() as f64,
            self.genre.transform("genre", game.primary_genre())? as f64,
            self.platform.transform("platform", game.primary_platform())? as f64,
            self.esrb.transform("esrb", game.esrb_label())? as f64,
        ])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSpace {
    pub columns: Vec<String>,
    /// Absent when features were read pre-encoded from a snapshot, or when
    /// an old artifact did not record them
    pub encoders: Option<CategoricalEncoders>,
    pub scaler: StandardScaler,
}

impl FeatureSpace {
    pub fn new(
        columns: Vec<String>,
        encoders: Option<CategoricalEncoders>,
        scaler: StandardScaler,
    ) -> Self {
        Self {
            columns,
            encoders,
            scaler,
        }
    }

    /// The live 4-column layout with no encoders and an identity scaler
    pub fn live_default() -> Self {
        Self::new(
            LIVE_COLUMNS.iter().map(|c| c.to_string()).collect(),
            None,
            StandardScaler::identity(LIVE_COLUMNS.len()),
        )
    }

    /// Whether new catalog records can be mapped into this space
    pub fn can_transform(&self) -> bool {
        self.encoders.is_some() && self.scaler.is_fitted()
    }

    /// Encode and scale games with the fitted configuration
    pub fn transform_games(&self, games: &[Game]) -> Result<Vec<Vec<f64>>> {
        let encoders = self
            .encoders
            .as_ref()
            .ok_or(FeatureError::NotFitted("CategoricalEncoders"))?;
        let raw = games
            .iter()
            .map(|g| encoders.encode(g))
            .collect::<Result<Vec<_>>>()?;
        self.scaler.transform(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn games() -> Vec<Game> {
        vec![
            Game::new(1, "Halo")
                .with_rating(4.5)
                .with_genres(&["Shooter"])
                .with_platforms(&["Xbox"])
                .with_esrb("Mature"),
            Game::new(2, "Tetris")
                .with_rating(4.0)
                .with_genres(&["Puzzle"])
                .with_platforms(&["NES"])
                .with_esrb("Everyone"),
        ]
    }

    #[test]
    fn test_encode_uses_primary_values() {
        let games = games();
        let enc = CategoricalEncoders::fit(&games);
        assert_eq!(enc.encode(&games[0]).unwrap(), vec![4.5, 1.0, 1.0, 1.0]);
        assert_eq!(enc.encode(&games[1]).unwrap(), vec![4.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_transform_requires_encoders() {
        let space = FeatureSpace::live_default();
        assert!(!space.can_transform());
        assert!(matches!(
            space.transform_games(&games()),
            Err(FeatureError::NotFitted(_))
        ));
    }

    #[test]
    fn test_mismatched_encoders_are_rejected() {
        let enc = CategoricalEncoders::fit(&games());
        let stranger = Game::new(3, "Forza").with_genres(&["Racing"]);
        assert!(matches!(
            enc.encode(&stranger),
            Err(FeatureError::UnknownCategory { .. })
        ));
    }
}
