//! Clustering Engine - K-Means over the game feature space
//!
//! Answers "which other games share the anchor's cluster", ranked by rating.
//!
//! ## Training
//! 1. Derive live features from the catalog records
//! 2. Standardize them and fit K-Means
//! 3. Score the partition (silhouette; 0 when it collapses to one cluster)
//! 4. Persist the model bundle and a flat id -> cluster export
//!
//! ## Serving
//! Cluster recommendations come from the flat export only, so they keep
//! working with exports from older training runs that predate the current
//! model format.

use crate::error::{EngineError, Result};
use crate::export::{ClusterExport, ClusterSummary, ExportRow, export_chain};
use crate::kmeans::{KMeans, KMeansModel};
use crate::silhouette::silhouette_score;
use artifacts::names::{CLUSTER_EXPORT, KIND_KMEANS, KMEANS_MODEL, KMEANS_MODEL_LEGACY};
use artifacts::{
    ArtifactError, ArtifactStore, LoadStrategy, LoaderChain, read_envelope, write_envelope,
};
use catalog::{Game, GameId, GameRepository};
use features::{
    CategoricalEncoders, FeaturePreparer, FeatureSpace, LIVE_COLUMNS, StandardScaler,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock};
use tracing::{debug, error, info, instrument, warn};

pub const DEFAULT_N_CLUSTERS: usize = 5;

/// Everything one training run produces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringModel {
    pub kmeans: KMeansModel,
    pub space: FeatureSpace,
    pub n_clusters: usize,
    pub silhouette_score: f64,
}

/// Bundles written before the versioned envelope; every field but the
/// model itself may be missing
#[derive(Debug, Deserialize)]
struct UnversionedBundle {
    kmeans_model: KMeansModel,
    scaler: Option<StandardScaler>,
    label_encoders: Option<CategoricalEncoders>,
    feature_columns: Option<Vec<String>>,
    n_clusters: Option<usize>,
    silhouette_score: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LegacyShape {
    Bundle(UnversionedBundle),
    Bare(KMeansModel),
}

impl From<LegacyShape> for ClusteringModel {
    fn from(shape: LegacyShape) -> Self {
        let (kmeans, scaler, encoders, columns, n_clusters, score) = match shape {
            LegacyShape::Bundle(b) => (
                b.kmeans_model,
                b.scaler,
                b.label_encoders,
                b.feature_columns,
                b.n_clusters,
                b.silhouette_score,
            ),
            LegacyShape::Bare(model) => (model, None, None, None, None, None),
        };

        let columns: Vec<String> =
            columns.unwrap_or_else(|| LIVE_COLUMNS.iter().map(|c| c.to_string()).collect());
        let scaler = scaler.unwrap_or_else(|| StandardScaler::identity(columns.len()));
        let n_clusters = n_clusters.unwrap_or_else(|| kmeans.n_clusters());

        ClusteringModel {
            kmeans,
            space: FeatureSpace::new(columns, encoders, scaler),
            n_clusters,
            silhouette_score: score.unwrap_or(0.0),
        }
    }
}

/// A loaded model and when it was trained (unknown for legacy shapes)
#[derive(Debug, Clone)]
struct StoredModel {
    model: ClusteringModel,
    trained_at: Option<u64>,
}

/// Reads a model file in any supported shape.
///
/// Files with a `format_version` header must be a valid envelope; files
/// without one are decoded as an unversioned bundle or a bare model.
struct ModelFile(String);

impl LoadStrategy<StoredModel> for ModelFile {
    fn name(&self) -> &str {
        &self.0
    }

    fn load(&self, store: &ArtifactStore) -> artifacts::Result<StoredModel> {
        let value: serde_json::Value = store.read_json(&self.0)?;

        if value.get("format_version").is_some() {
            let envelope = read_envelope::<ClusteringModel>(store, &self.0, KIND_KMEANS)?;
            return Ok(StoredModel {
                model: envelope.payload,
                trained_at: Some(envelope.trained_at),
            });
        }

        let shape: LegacyShape =
            serde_json::from_value(value).map_err(|source| ArtifactError::Json {
                name: self.0.clone(),
                source,
            })?;
        if matches!(shape, LegacyShape::Bare(_)) {
            warn!(artifact = %self.0, "Bare K-Means model has no encoders; predict is unavailable");
        }
        Ok(StoredModel {
            model: shape.into(),
            trained_at: None,
        })
    }
}

/// Summary of the loaded model for tooling
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusteringModelInfo {
    pub loaded: bool,
    pub source: Option<String>,
    pub n_clusters: usize,
    pub feature_columns: Vec<String>,
    pub silhouette_score: Option<f64>,
    pub can_predict: bool,
    pub trained_at: Option<u64>,
    pub export_source: Option<String>,
}

pub struct ClusteringEngine {
    /// Shared read-only catalog
    catalog: Arc<dyn GameRepository>,
    store: ArtifactStore,

    n_clusters: usize,
    random_state: u64,
    n_init: usize,
    max_iter: usize,

    model: Option<ClusteringModel>,
    model_source: Option<String>,
    trained_at: Option<u64>,

    /// Read on first use; `None` inside means no export could be loaded
    export: OnceLock<Option<ClusterExport>>,
}

impl ClusteringEngine {
    pub fn new(catalog: Arc<dyn GameRepository>, store: ArtifactStore) -> Self {
        Self {
            catalog,
            store,
            n_clusters: DEFAULT_N_CLUSTERS,
            random_state: 42,
            n_init: 10,
            max_iter: 300,
            model: None,
            model_source: None,
            trained_at: None,
            export: OnceLock::new(),
        }
    }

    /// Configure the cluster count (default: 5)
    pub fn with_n_clusters(mut self, n_clusters: usize) -> Self {
        self.n_clusters = n_clusters.max(1);
        self
    }

    /// Configure the random seed (default: 42)
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Configure K-Means initializations (default: 10)
    pub fn with_n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init;
        self
    }

    /// Configure the K-Means iteration cap (default: 300)
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn model(&self) -> Option<&ClusteringModel> {
        self.model.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        self.model.is_some()
    }

    /// Train on `games` and persist the model and export.
    ///
    /// Returns one cluster label per game in input order, or an empty
    /// vector when there is nothing to train on. Persistence failures are
    /// logged; the labels are still returned.
    pub fn fit(&mut self, games: &[Game]) -> Vec<usize> {
        match self.try_fit(games) {
            Ok(labels) => labels,
            Err(EngineError::EmptyInput) => {
                error!("Cannot cluster: no game data");
                Vec::new()
            }
            Err(e) => {
                error!(error = %e, "Clustering fit failed");
                Vec::new()
            }
        }
    }

    fn try_fit(&mut self, games: &[Game]) -> Result<Vec<usize>> {
        let prepared = FeaturePreparer::live().prepare(games);
        if prepared.table.is_empty() {
            return Err(EngineError::EmptyInput);
        }
        let table = prepared.table;

        let (scaler, scaled) = StandardScaler::fit_transform(&table.matrix())?;
        let fit = KMeans::new(self.n_clusters)
            .with_n_init(self.n_init)
            .with_max_iter(self.max_iter)
            .with_random_state(self.random_state)
            .fit(&scaled)?;

        let distinct = fit.labels.iter().collect::<HashSet<_>>().len();
        let score = if distinct > 1 {
            silhouette_score(&scaled, &fit.labels)
        } else {
            warn!("Only one cluster found, silhouette score = 0");
            0.0
        };
        info!(
            games = table.len(),
            clusters = fit.model.n_clusters(),
            silhouette = score,
            "Clustering trained"
        );

        let model = ClusteringModel {
            n_clusters: fit.model.n_clusters(),
            kmeans: fit.model,
            space: FeatureSpace::new(table.columns().to_vec(), prepared.encoders, scaler),
            silhouette_score: score,
        };

        if let Err(e) = write_envelope(&self.store, KMEANS_MODEL, KIND_KMEANS, &model) {
            error!(error = %e, hint = e.hint().unwrap_or("-"), "Failed to save clustering model");
        } else {
            info!(artifact = KMEANS_MODEL, "Clustering model saved");
        }

        let export = ClusterExport::from_training(table.rows(), &fit.labels);
        match export
            .to_table(table.rows())
            .and_then(|csv| Ok((csv.len(), csv.to_csv_string()?)))
        {
            Ok((rows, text)) => match self.store.write(CLUSTER_EXPORT, text.as_bytes()) {
                Ok(()) => info!(artifact = CLUSTER_EXPORT, rows, "Cluster export saved"),
                Err(e) => error!(error = %e, "Failed to save cluster export"),
            },
            Err(e) => error!(error = %e, "Failed to build cluster export"),
        }

        self.model = Some(model);
        self.model_source = Some(KMEANS_MODEL.to_string());
        self.trained_at = Some(crate::unix_now());
        self.export = OnceLock::from(Some(export));

        Ok(fit.labels)
    }

    /// Cluster labels for new games using the fitted feature space.
    ///
    /// Empty when no model is loaded or the model cannot map these games
    /// (no encoders, or a category unseen at training).
    pub fn predict(&self, games: &[Game]) -> Vec<usize> {
        match self.try_predict(games) {
            Ok(labels) => labels,
            Err(e) => {
                error!(error = %e, "Cluster prediction failed");
                Vec::new()
            }
        }
    }

    pub fn try_predict(&self, games: &[Game]) -> Result<Vec<usize>> {
        let model = self.model.as_ref().ok_or(EngineError::NotLoaded("Clustering"))?;
        if games.is_empty() {
            return Ok(Vec::new());
        }
        let scaled = model.space.transform_games(games)?;
        model.kmeans.predict(&scaled)
    }

    /// Other games in the anchor's cluster, best rated first
    #[instrument(skip(self, anchor), fields(anchor_id = anchor.id))]
    pub fn get_cluster_recommendations(&self, anchor: &Game, n: usize) -> Vec<Game> {
        match self.try_cluster_recommendations(anchor, n) {
            Ok(games) => games,
            Err(e) => {
                error!(error = %e, "Cluster recommendations failed");
                Vec::new()
            }
        }
    }

    /// Fallible form of [`get_cluster_recommendations`](Self::get_cluster_recommendations).
    ///
    /// ## Algorithm
    /// 1. Find the anchor's row in the export (by catalog id when the
    ///    export has ids, otherwise by exact name)
    /// 2. Collect the other rows in the same cluster
    /// 3. Stable-sort them by rating, descending (unrated last)
    /// 4. Resolve the first `n` against the catalog, keeping that order
    pub fn try_cluster_recommendations(&self, anchor: &Game, n: usize) -> Result<Vec<Game>> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let Some(export) = self.export() else {
            warn!("No cluster export available");
            return Ok(Vec::new());
        };

        let is_anchor = |row: &ExportRow| {
            if export.keyed_by_id {
                row.id == Some(anchor.id)
            } else {
                row.name == anchor.name
            }
        };

        let Some(anchor_row) = export.rows.iter().find(|r| is_anchor(*r)) else {
            warn!(anchor = %anchor.name, "Anchor not found in cluster export");
            return Ok(Vec::new());
        };
        let cluster = anchor_row.cluster;

        let mut members: Vec<_> = export
            .rows
            .iter()
            .filter(|r| r.cluster == cluster && !is_anchor(*r))
            .collect();
        members.sort_by(|a, b| match (a.rating, b.rating) {
            (Some(x), Some(y)) => y.total_cmp(&x),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });
        debug!(cluster, members = members.len(), "Cluster members selected");

        let games = if export.keyed_by_id {
            let ids: Vec<GameId> = members.iter().filter_map(|r| r.id).take(n).collect();
            let mut by_id: HashMap<GameId, Game> = self
                .catalog
                .list_by_ids(&ids)
                .into_iter()
                .map(|g| (g.id, g))
                .collect();
            ids.iter().filter_map(|id| by_id.remove(id)).collect::<Vec<_>>()
        } else {
            // Names resolve case-insensitively, so a differently cased row can
            // still be the anchor or a repeat of an earlier member
            let mut seen = HashSet::from([anchor.id]);
            members
                .iter()
                .filter_map(|r| self.catalog.find_by_name(&r.name))
                .filter(|g| seen.insert(g.id))
                .take(n)
                .collect()
        };

        if games.is_empty() {
            warn!(cluster, "Clustering produced no recommendations");
        } else {
            info!(cluster, count = games.len(), "Cluster recommendations found");
        }
        Ok(games)
    }

    /// Load the newest readable model.
    ///
    /// Tries the canonical model first, then `legacy` (a store-relative
    /// name or an absolute path; defaults to the legacy model name).
    /// Returns whether a model was loaded; failures are logged only.
    pub fn load_model(&mut self, legacy: Option<&str>) -> bool {
        let chain = LoaderChain::new("kmeans")
            .add_strategy(ModelFile(KMEANS_MODEL.to_string()))
            .add_strategy(ModelFile(legacy.unwrap_or(KMEANS_MODEL_LEGACY).to_string()));

        match chain.load_first(&self.store) {
            Ok(loaded) => {
                let stored = loaded.value;
                info!(
                    source = %loaded.source,
                    clusters = stored.model.n_clusters,
                    can_predict = stored.model.space.can_transform(),
                    "Clustering model loaded"
                );
                self.model = Some(stored.model);
                self.model_source = Some(loaded.source);
                self.trained_at = stored.trained_at;
                true
            }
            Err(e) => {
                error!(error = %e, "No clustering model could be loaded");
                false
            }
        }
    }

    /// Per-cluster size, mean rating and sample names from the export
    pub fn cluster_info(&self) -> Vec<ClusterSummary> {
        self.export().map(ClusterExport::summaries).unwrap_or_default()
    }

    pub fn model_info(&self) -> ClusteringModelInfo {
        let model = self.model.as_ref();
        ClusteringModelInfo {
            loaded: model.is_some(),
            source: self.model_source.clone(),
            n_clusters: model.map(|m| m.n_clusters).unwrap_or(0),
            feature_columns: model.map(|m| m.space.columns.clone()).unwrap_or_default(),
            silhouette_score: model.map(|m| m.silhouette_score),
            can_predict: model.is_some_and(|m| m.space.can_transform()),
            trained_at: self.trained_at,
            export_source: self.export().map(|e| e.source.clone()),
        }
    }

    fn export(&self) -> Option<&ClusterExport> {
        self.export
            .get_or_init(|| match export_chain().load_first(&self.store) {
                Ok(loaded) => Some(loaded.value),
                Err(e) => {
                    warn!(error = %e, "No cluster export could be loaded");
                    None
                }
            })
            .as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog::CatalogIndex;

    fn create_test_index() -> Arc<dyn GameRepository> {
        let games = vec![
            Game::new(1, "Halo").with_rating(4.5).with_genres(&["Shooter"]).with_esrb("Mature"),
            Game::new(2, "Doom").with_rating(4.0).with_genres(&["Shooter"]).with_esrb("Mature"),
            Game::new(3, "Quake").with_rating(3.0).with_genres(&["Shooter"]).with_esrb("Mature"),
            Game::new(4, "Tetris").with_rating(4.8).with_genres(&["Puzzle"]).with_esrb("Everyone"),
        ];
        Arc::new(CatalogIndex::from_games(games))
    }

    #[test]
    fn test_legacy_bundle_defaults() {
        let json = r#"{"kmeans_model": {"centroids": [[0.0, 0.0, 0.0, 0.0], [1.0, 1.0, 1.0, 1.0]]}}"#;
        let shape: LegacyShape = serde_json::from_str(json).unwrap();
        assert!(matches!(shape, LegacyShape::Bundle(_)));

        let model: ClusteringModel = shape.into();
        assert_eq!(model.n_clusters, 2);
        assert_eq!(model.space.columns, LIVE_COLUMNS);
        assert_eq!(model.space.scaler, StandardScaler::identity(4));
        assert!(model.space.encoders.is_none());
        assert_eq!(model.silhouette_score, 0.0);
    }

    #[test]
    fn test_bare_model_shape() {
        let json = r#"{"centroids": [[0.5]], "inertia": 1.5}"#;
        let shape: LegacyShape = serde_json::from_str(json).unwrap();
        assert!(matches!(shape, LegacyShape::Bare(_)));
    }

    #[test]
    fn test_export_missing_means_empty() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = create_test_index();
        let engine = ClusteringEngine::new(catalog.clone(), ArtifactStore::new(dir.path()));
        let anchor = catalog.get(1).unwrap();

        assert!(engine.get_cluster_recommendations(&anchor, 3).is_empty());
        assert!(engine.cluster_info().is_empty());
    }

    #[test]
    fn test_predict_without_model_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = create_test_index();
        let engine = ClusteringEngine::new(catalog.clone(), ArtifactStore::new(dir.path()));
        assert!(engine.predict(&catalog.list_all()).is_empty());
        assert!(matches!(
            engine.try_predict(&catalog.list_all()),
            Err(EngineError::NotLoaded(_))
        ));
    }

    #[test]
    fn test_load_model_nothing_present() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = ClusteringEngine::new(create_test_index(), ArtifactStore::new(dir.path()));
        assert!(!engine.load_model(None));
        assert!(!engine.model_info().loaded);
    }
}
