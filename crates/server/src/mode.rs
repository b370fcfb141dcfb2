//! Recommendation modes accepted by the orchestrator.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecommendationMode {
    /// Cosine similarity neighbours
    Similar,
    /// Other members of the anchor's cluster
    Clustering,
    /// Randomized blend of both
    Hybrid,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unrecognized recommendation mode {0:?}")]
pub struct UnknownMode(pub String);

impl RecommendationMode {
    pub const ALL: [RecommendationMode; 3] = [
        RecommendationMode::Similar,
        RecommendationMode::Clustering,
        RecommendationMode::Hybrid,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationMode::Similar => "similar",
            RecommendationMode::Clustering => "clustering",
            RecommendationMode::Hybrid => "hybrid",
        }
    }
}

impl FromStr for RecommendationMode {
    type Err = UnknownMode;

    /// Exact, case-sensitive match on the mode name
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| UnknownMode(s.to_string()))
    }
}

impl fmt::Display for RecommendationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_modes() {
        for mode in RecommendationMode::ALL {
            assert_eq!(mode.to_string().parse::<RecommendationMode>(), Ok(mode));
        }
        assert_eq!(
            "unknown_mode".parse::<RecommendationMode>(),
            Err(UnknownMode("unknown_mode".to_string()))
        );
        assert!("Hybrid".parse::<RecommendationMode>().is_err());
    }
}
