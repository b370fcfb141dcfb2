//! Prioritized loader chains.
//!
//! Each engine knows several places (and shapes) its artifact may live in,
//! newest first. Every one of them is a [`LoadStrategy`]; a [`LoaderChain`]
//! tries them in order and stops at the first success.

use crate::error::{ArtifactError, Result};
use crate::store::ArtifactStore;
use tracing::{debug, info, warn};

/// One way of producing a `T` from the artifact store.
///
/// `Send + Sync` lets a chain be built once and shared.
pub trait LoadStrategy<T>: Send + Sync {
    /// Name used in logs and reported as the load source
    fn name(&self) -> &str;

    fn load(&self, store: &ArtifactStore) -> Result<T>;
}

/// A successfully loaded value and the strategy that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct Loaded<T> {
    pub value: T,
    pub source: String,
}

/// Chains strategies together using the builder pattern.
///
/// ## Usage
/// ```ignore
/// let chain = LoaderChain::new("kmeans")
///     .add_strategy(CurrentBundle::new(KMEANS_MODEL))
///     .add_strategy(LegacyBundle::new(KMEANS_MODEL_LEGACY));
///
/// let loaded = chain.load_first(&store)?;
/// ```
pub struct LoaderChain<T> {
    kind: String,
    strategies: Vec<Box<dyn LoadStrategy<T>>>,
}

impl<T> LoaderChain<T> {
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            strategies: Vec::new(),
        }
    }

    /// Append a strategy (tried after every strategy already added)
    pub fn add_strategy(mut self, strategy: impl LoadStrategy<T> + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Try every strategy in order.
    ///
    /// ## Algorithm
    /// 1. For each strategy in order:
    ///    a. Attempt the load
    ///    b. On success, return it with the strategy name
    ///    c. On absence, log at debug and continue
    ///    d. On any other failure, log it with its hint and continue
    /// 2. If nothing succeeded, return `Exhausted`
    pub fn load_first(&self, store: &ArtifactStore) -> Result<Loaded<T>> {
        for strategy in &self.strategies {
            match strategy.load(store) {
                Ok(value) => {
                    info!(kind = %self.kind, source = strategy.name(), "Loaded artifact");
                    return Ok(Loaded {
                        value,
                        source: strategy.name().to_string(),
                    });
                }
                Err(e) if e.is_not_found() => {
                    debug!(kind = %self.kind, source = strategy.name(), "Artifact not present");
                }
                Err(e) => {
                    warn!(
                        kind = %self.kind,
                        source = strategy.name(),
                        error = %e,
                        hint = e.hint().unwrap_or("-"),
                        "Artifact failed to load, trying next source"
                    );
                }
            }
        }

        Err(ArtifactError::Exhausted {
            kind: self.kind.clone(),
            attempts: self.strategies.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed {
        name: &'static str,
        outcome: std::result::Result<u32, &'static str>,
    }

    impl LoadStrategy<u32> for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        fn load(&self, _store: &ArtifactStore) -> Result<u32> {
            match self.outcome {
                Ok(v) => Ok(v),
                Err("missing") => Err(ArtifactError::NotFound {
                    name: self.name.to_string(),
                }),
                Err(reason) => Err(ArtifactError::UnrecognizedShape {
                    name: self.name.to_string(),
                    reason: reason.to_string(),
                }),
            }
        }
    }

    fn store() -> ArtifactStore {
        ArtifactStore::new("/nonexistent")
    }

    #[test]
    fn test_first_success_wins() {
        let chain = LoaderChain::new("test")
            .add_strategy(Fixed { name: "newest", outcome: Err("missing") })
            .add_strategy(Fixed { name: "broken", outcome: Err("bad shape") })
            .add_strategy(Fixed { name: "legacy", outcome: Ok(7) })
            .add_strategy(Fixed { name: "oldest", outcome: Ok(1) });

        let loaded = chain.load_first(&store()).unwrap();
        assert_eq!(loaded.value, 7);
        assert_eq!(loaded.source, "legacy");
        assert_eq!(chain.strategy_names(), vec!["newest", "broken", "legacy", "oldest"]);
    }

    #[test]
    fn test_exhausted_chain() {
        let chain = LoaderChain::new("test")
            .add_strategy(Fixed { name: "a", outcome: Err("missing") })
            .add_strategy(Fixed { name: "b", outcome: Err("bad") });

        let err = chain.load_first(&store()).unwrap_err();
        assert!(matches!(err, ArtifactError::Exhausted { attempts: 2, .. }));
    }

    #[test]
    fn test_empty_chain() {
        let chain: LoaderChain<u32> = LoaderChain::new("test");
        assert!(chain.is_empty());
        assert!(chain.load_first(&store()).is_err());
    }
}
