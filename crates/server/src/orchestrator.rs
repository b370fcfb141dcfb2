//! # Hybrid Orchestrator
//!
//! Single entry point for the presentation layer:
//! 1. Resolve the anchor game by id
//! 2. Parse the mode (`similar`, `clustering` or `hybrid`)
//! 3. Delegate to one engine, or blend both (see [`crate::blend`])
//! 4. Return the games, or an empty list for any miss or fault
//!
//! There is no popularity fallback: an unknown anchor, an unknown mode or
//! an engine with nothing loaded all answer with `[]`.
//!
//! Both engines are loaded once at construction and only queried after
//! that, so one orchestrator can be shared across threads.

use std::sync::Arc;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, error, info, instrument, warn};

use catalog::{Game, GameId, GameRepository};
use engines::{ClusteringEngine, EngineError, SimilarityEngine};

use crate::blend::{BlendPlan, blend_pools};
use crate::config::{BlendConfig, EngineConfig};
use crate::mode::RecommendationMode;

pub struct HybridOrchestrator {
    catalog: Arc<dyn GameRepository>,
    clustering: ClusteringEngine,
    similarity: SimilarityEngine,
    blend: BlendConfig,
}

impl HybridOrchestrator {
    /// Create an orchestrator and load both engines' artifacts.
    ///
    /// Each engine loads independently; one that finds nothing simply
    /// answers with empty results later.
    pub fn new(catalog: Arc<dyn GameRepository>, config: &EngineConfig) -> Self {
        let start = Instant::now();

        let mut clustering = config.clustering_engine(catalog.clone());
        let clustering_loaded = clustering.load_model(config.kmeans_model_path.as_deref());

        let mut similarity = config.similarity_engine(catalog.clone());
        let similarity_loaded = similarity.load_model(None);

        info!(
            clustering_loaded,
            similarity_loaded,
            artifact_dir = %config.artifact_dir.display(),
            elapsed = ?start.elapsed(),
            "Hybrid orchestrator ready"
        );

        Self::from_engines(catalog, clustering, similarity, config.blend.clone())
    }

    /// Assemble an orchestrator from engines that are already fit or loaded
    pub fn from_engines(
        catalog: Arc<dyn GameRepository>,
        clustering: ClusteringEngine,
        similarity: SimilarityEngine,
        blend: BlendConfig,
    ) -> Self {
        Self {
            catalog,
            clustering,
            similarity,
            blend,
        }
    }

    pub fn clustering(&self) -> &ClusteringEngine {
        &self.clustering
    }

    pub fn similarity(&self) -> &SimilarityEngine {
        &self.similarity
    }

    pub fn catalog(&self) -> &Arc<dyn GameRepository> {
        &self.catalog
    }

    /// Recommendations for `anchor_id`, using a fresh OS-seeded RNG
    pub fn get_recommendations(
        &self,
        anchor_id: Option<GameId>,
        count: usize,
        mode: &str,
    ) -> Vec<Game> {
        let mut rng = StdRng::from_os_rng();
        self.get_recommendations_with_rng(anchor_id, count, mode, &mut rng)
    }

    /// Same as [`get_recommendations`](Self::get_recommendations) with the
    /// caller's random source
    #[instrument(skip(self, rng))]
    pub fn get_recommendations_with_rng<R: Rng + ?Sized>(
        &self,
        anchor_id: Option<GameId>,
        count: usize,
        mode: &str,
        rng: &mut R,
    ) -> Vec<Game> {
        let start = Instant::now();

        let Some(anchor_id) = anchor_id else {
            warn!("No anchor game given");
            return Vec::new();
        };
        if count == 0 {
            return Vec::new();
        }
        let mode: RecommendationMode = match mode.parse() {
            Ok(mode) => mode,
            Err(e) => {
                warn!(error = %e, "Returning no recommendations");
                return Vec::new();
            }
        };
        let Some(anchor) = self.catalog.get(anchor_id) else {
            warn!(anchor_id, "Anchor game not found");
            return Vec::new();
        };

        let recommendations = match mode {
            RecommendationMode::Clustering => {
                self.clustering.get_cluster_recommendations(&anchor, count)
            }
            RecommendationMode::Similar => self.similarity.get_similar_games(anchor.id, count),
            RecommendationMode::Hybrid => match self.hybrid(&anchor, count, rng) {
                Ok(games) => games,
                Err(e) => {
                    error!(error = %e, "Hybrid blending failed");
                    Vec::new()
                }
            },
        };

        info!(
            anchor = %anchor.name,
            %mode,
            requested = count,
            returned = recommendations.len(),
            elapsed = ?start.elapsed(),
            "Recommendations served"
        );
        recommendations
    }

    fn hybrid<R: Rng + ?Sized>(
        &self,
        anchor: &Game,
        count: usize,
        rng: &mut R,
    ) -> Result<Vec<Game>, EngineError> {
        let plan = BlendPlan::new(count, &self.blend, rng);
        debug!(?plan, "Hybrid split");

        let clustering_pool = self
            .clustering
            .try_cluster_recommendations(anchor, plan.clustering_pool)?;
        let similarity_pool = self
            .similarity
            .try_similar_games(anchor.id, plan.similarity_pool)?;
        debug!(
            clustering = clustering_pool.len(),
            similarity = similarity_pool.len(),
            "Hybrid pools fetched"
        );

        Ok(blend_pools(
            anchor.id,
            count,
            &plan,
            clustering_pool,
            similarity_pool,
            rng,
        ))
    }
}
