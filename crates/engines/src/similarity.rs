//! Similarity Engine - pairwise cosine similarity over standardized features
//!
//! Training builds one dense N x N matrix indexed by training-time row
//! order plus a game id -> row map. Queries read a row, drop the anchor by
//! position and identity, and return the best-scoring games.
//!
//! ## Loading
//! Sources are tried newest and cheapest first:
//! 1. Raw matrix file plus its companion content snapshot (row order is
//!    recovered by replaying feature preparation on the snapshot)
//! 2. Canonical JSON bundle (versioned envelope, or an unversioned bundle
//!    with best-effort recovery of everything except the matrix)

use crate::error::{EngineError, Result};
use artifacts::names::{
    KIND_SIMILARITY, SIMILARITY_MATRIX, SIMILARITY_MATRIX_COMPANION, SIMILARITY_MODEL,
};
use artifacts::{
    ArtifactError, ArtifactStore, DenseMatrix, LoadStrategy, LoaderChain, read_envelope,
    read_matrix, write_envelope, write_matrix,
};
use catalog::{Game, GameId, GameRepository};
use features::{CategoricalEncoders, FeaturePreparer, FeatureSpace, StandardScaler};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Persisted similarity bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityModel {
    pub similarity_matrix: DenseMatrix,
    /// Game id of each matrix row
    pub game_ids: Vec<GameId>,
    pub game_index_map: BTreeMap<GameId, usize>,
    pub space: FeatureSpace,
}

/// Unversioned bundle; only the matrix is mandatory
#[derive(Debug, Deserialize)]
struct PartialBundle {
    similarity_matrix: Option<DenseMatrix>,
    game_ids: Option<Vec<GameId>>,
    game_index_map: Option<BTreeMap<GameId, usize>>,
    feature_columns: Option<Vec<String>>,
    scaler: Option<StandardScaler>,
    label_encoders: Option<CategoricalEncoders>,
}

/// In-memory state of a fitted or loaded engine
#[derive(Debug, Clone)]
struct LoadedMatrix {
    matrix: DenseMatrix,
    /// Game id per row; `None` for rows whose id could not be recovered
    row_ids: Vec<Option<GameId>>,
    index: HashMap<GameId, usize>,
    space: FeatureSpace,
    trained_at: Option<u64>,
}

impl LoadedMatrix {
    fn from_ids(
        matrix: DenseMatrix,
        ids: &[GameId],
        space: FeatureSpace,
        trained_at: Option<u64>,
    ) -> Self {
        let mut index = HashMap::with_capacity(ids.len());
        for (row, &id) in ids.iter().enumerate() {
            index.entry(id).or_insert(row);
        }
        let mut row_ids = vec![None; matrix.size()];
        for (slot, &id) in row_ids.iter_mut().zip(ids) {
            *slot = Some(id);
        }
        Self {
            matrix,
            row_ids,
            index,
            space,
            trained_at,
        }
    }

    fn from_index_map(
        matrix: DenseMatrix,
        map: BTreeMap<GameId, usize>,
        space: FeatureSpace,
    ) -> Self {
        let mut row_ids = vec![None; matrix.size()];
        for (&id, &row) in &map {
            if let Some(slot) = row_ids.get_mut(row) {
                *slot = Some(id);
            }
        }
        Self {
            matrix,
            row_ids,
            index: map.into_iter().collect(),
            space,
            trained_at: None,
        }
    }
}

/// Raw matrix file paired with the snapshot it was computed from
struct RawMatrixFastPath {
    catalog: Arc<dyn GameRepository>,
    preparer: FeaturePreparer,
}

impl LoadStrategy<LoadedMatrix> for RawMatrixFastPath {
    fn name(&self) -> &str {
        SIMILARITY_MATRIX
    }

    fn load(&self, store: &ArtifactStore) -> artifacts::Result<LoadedMatrix> {
        if !store.exists(SIMILARITY_MATRIX) {
            return Err(ArtifactError::NotFound {
                name: SIMILARITY_MATRIX.to_string(),
            });
        }
        let companion: Option<PathBuf> = self
            .preparer
            .snapshot_dir()
            .map(|dir| dir.join(SIMILARITY_MATRIX_COMPANION));
        if !companion.is_some_and(|p| p.exists()) {
            return Err(ArtifactError::NotFound {
                name: SIMILARITY_MATRIX_COMPANION.to_string(),
            });
        }

        let matrix = read_matrix(store, SIMILARITY_MATRIX)?;
        let table = self
            .preparer
            .prepare_snapshot(&self.catalog.list_all())
            .ok_or_else(|| ArtifactError::UnrecognizedShape {
                name: SIMILARITY_MATRIX_COMPANION.to_string(),
                reason: "companion snapshot could not be replayed".to_string(),
            })?;
        if table.len() != matrix.size() {
            return Err(ArtifactError::MatrixMismatch {
                name: SIMILARITY_MATRIX.to_string(),
                expected: table.len(),
                found: matrix.size(),
            });
        }

        let scaler = StandardScaler::fit(&table.matrix()).map_err(|e| {
            ArtifactError::UnrecognizedShape {
                name: SIMILARITY_MATRIX_COMPANION.to_string(),
                reason: e.to_string(),
            }
        })?;
        let space = FeatureSpace::new(table.columns().to_vec(), None, scaler);
        Ok(LoadedMatrix::from_ids(matrix, &table.ids(), space, None))
    }
}

/// JSON bundle in the current or an unversioned shape
struct BundleFile(String);

impl LoadStrategy<LoadedMatrix> for BundleFile {
    fn name(&self) -> &str {
        &self.0
    }

    fn load(&self, store: &ArtifactStore) -> artifacts::Result<LoadedMatrix> {
        let value: serde_json::Value = store.read_json(&self.0)?;

        if value.get("format_version").is_some() {
            let envelope = read_envelope::<SimilarityModel>(store, &self.0, KIND_SIMILARITY)?;
            let model = envelope.payload;
            check_rows(&self.0, &model.similarity_matrix, model.game_ids.len())?;
            return Ok(LoadedMatrix::from_ids(
                model.similarity_matrix,
                &model.game_ids,
                model.space,
                Some(envelope.trained_at),
            ));
        }

        let bundle: PartialBundle =
            serde_json::from_value(value).map_err(|source| ArtifactError::Json {
                name: self.0.clone(),
                source,
            })?;
        let matrix = bundle
            .similarity_matrix
            .ok_or_else(|| ArtifactError::UnrecognizedShape {
                name: self.0.clone(),
                reason: "bundle has no similarity_matrix".to_string(),
            })?;

        let columns = bundle.feature_columns.unwrap_or_default();
        let scaler = bundle
            .scaler
            .unwrap_or_else(|| StandardScaler::identity(columns.len()));
        let space = FeatureSpace::new(columns, bundle.label_encoders, scaler);

        match (bundle.game_index_map, bundle.game_ids) {
            (Some(map), _) => Ok(LoadedMatrix::from_index_map(matrix, map, space)),
            (None, Some(ids)) => {
                check_rows(&self.0, &matrix, ids.len())?;
                Ok(LoadedMatrix::from_ids(matrix, &ids, space, None))
            }
            (None, None) => {
                warn!(artifact = %self.0, "Bundle has no game index; every lookup will miss");
                Ok(LoadedMatrix::from_ids(matrix, &[], space, None))
            }
        }
    }
}

fn check_rows(name: &str, matrix: &DenseMatrix, rows: usize) -> artifacts::Result<()> {
    if matrix.size() == rows {
        Ok(())
    } else {
        Err(ArtifactError::MatrixMismatch {
            name: name.to_string(),
            expected: rows,
            found: matrix.size(),
        })
    }
}

/// Pairwise cosine similarity of the given rows.
///
/// A zero-norm row has similarity 0 with every other row. The diagonal is
/// always 1.0 and every entry is clamped to [-1, 1].
pub fn cosine_matrix(rows: &[Vec<f64>]) -> Result<DenseMatrix> {
    let n = rows.len();
    let norms: Vec<f64> = rows
        .iter()
        .map(|r| r.iter().map(|v| v * v).sum::<f64>().sqrt())
        .collect();

    let values: Vec<f32> = (0..n)
        .into_par_iter()
        .flat_map_iter(|i| {
            let norms = &norms;
            (0..n).map(move |j| {
                if i == j {
                    return 1.0;
                }
                if norms[i] == 0.0 || norms[j] == 0.0 {
                    return 0.0;
                }
                let dot: f64 = rows[i].iter().zip(&rows[j]).map(|(a, b)| a * b).sum();
                (dot / (norms[i] * norms[j])).clamp(-1.0, 1.0) as f32
            })
        })
        .collect();

    DenseMatrix::new(n, values).map_err(EngineError::InvalidMatrix)
}

/// Summary of the loaded matrix for tooling
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarityModelInfo {
    pub loaded: bool,
    pub source: Option<String>,
    pub n_games: usize,
    pub feature_columns: Vec<String>,
    pub avg_similarity: Option<f32>,
    pub min_similarity: Option<f32>,
    pub max_similarity: Option<f32>,
    pub trained_at: Option<u64>,
}

pub struct SimilarityEngine {
    catalog: Arc<dyn GameRepository>,
    store: ArtifactStore,
    preparer: FeaturePreparer,
    state: Option<LoadedMatrix>,
    model_source: Option<String>,
}

impl SimilarityEngine {
    /// Snapshots are looked up in the artifact directory by default
    pub fn new(catalog: Arc<dyn GameRepository>, store: ArtifactStore) -> Self {
        let preparer = FeaturePreparer::with_snapshot_dir(store.root());
        Self {
            catalog,
            store,
            preparer,
            state: None,
            model_source: None,
        }
    }

    /// Look for content snapshots in `dir`
    pub fn with_snapshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.preparer = FeaturePreparer::with_snapshot_dir(dir);
        self
    }

    /// Replace the feature preparer (e.g. [`FeaturePreparer::live`])
    pub fn with_preparer(mut self, preparer: FeaturePreparer) -> Self {
        self.preparer = preparer;
        self
    }

    pub fn is_loaded(&self) -> bool {
        self.state.is_some()
    }

    /// Train on `games` and persist the result.
    ///
    /// Returns the similarity matrix, empty when there is nothing to train
    /// on. Persistence failures are logged; the matrix is still returned.
    pub fn fit(&mut self, games: &[Game]) -> DenseMatrix {
        match self.try_fit(games) {
            Ok(matrix) => matrix,
            Err(EngineError::EmptyInput) => {
                error!("Cannot build similarity matrix: no game data");
                DenseMatrix::empty()
            }
            Err(e) => {
                error!(error = %e, "Similarity fit failed");
                DenseMatrix::empty()
            }
        }
    }

    fn try_fit(&mut self, games: &[Game]) -> Result<DenseMatrix> {
        let prepared = self.preparer.prepare(games);
        let table = prepared.table;
        if table.is_empty() {
            return Err(EngineError::EmptyInput);
        }

        let (scaler, scaled) = StandardScaler::fit_transform(&table.matrix())?;
        let matrix = cosine_matrix(&scaled)?;
        let ids = table.ids();
        info!(
            games = table.len(),
            source = ?table.source(),
            "Similarity matrix computed"
        );

        let model = SimilarityModel {
            similarity_matrix: matrix.clone(),
            game_ids: ids.clone(),
            game_index_map: table.index_map().into_iter().collect(),
            space: FeatureSpace::new(table.columns().to_vec(), prepared.encoders, scaler),
        };

        match write_envelope(&self.store, SIMILARITY_MODEL, KIND_SIMILARITY, &model) {
            Ok(()) => info!(artifact = SIMILARITY_MODEL, "Similarity model saved"),
            Err(e) => {
                error!(error = %e, hint = e.hint().unwrap_or("-"), "Failed to save similarity model")
            }
        }
        if table.source().is_snapshot() {
            match write_matrix(&self.store, SIMILARITY_MATRIX, &matrix) {
                Ok(()) => info!(artifact = SIMILARITY_MATRIX, "Raw similarity matrix saved"),
                Err(e) => error!(error = %e, "Failed to save raw similarity matrix"),
            }
        }

        self.state = Some(LoadedMatrix::from_ids(
            model.similarity_matrix,
            &ids,
            model.space,
            Some(crate::unix_now()),
        ));
        self.model_source = Some(SIMILARITY_MODEL.to_string());
        Ok(matrix)
    }

    /// The `n` games most similar to `game_id`, best first
    #[instrument(skip(self))]
    pub fn get_similar_games(&self, game_id: GameId, n: usize) -> Vec<Game> {
        match self.try_similar_games(game_id, n) {
            Ok(games) => games,
            Err(e) => {
                error!(error = %e, "Similar games lookup failed");
                Vec::new()
            }
        }
    }

    /// Fallible form of [`get_similar_games`](Self::get_similar_games).
    ///
    /// ## Algorithm
    /// 1. Find the anchor's row (unknown anchor: empty)
    /// 2. Rank every other row by score, descending (ties by row order),
    ///    skipping the anchor's own row and any row carrying its id
    /// 3. Take the first `n` and resolve them against the catalog, keeping
    ///    rank order and skipping ids the catalog does not know
    pub fn try_similar_games(&self, game_id: GameId, n: usize) -> Result<Vec<Game>> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let Some(state) = self.state.as_ref() else {
            warn!("No similarity matrix loaded");
            return Ok(Vec::new());
        };
        let Some(&row) = state.index.get(&game_id) else {
            warn!(game_id, "Game not found in similarity matrix");
            return Ok(Vec::new());
        };
        let scores = state.matrix.row(row).ok_or(EngineError::IndexOutOfRange {
            index: row,
            size: state.matrix.size(),
        })?;

        let mut ranked: Vec<(usize, f32)> = scores
            .iter()
            .copied()
            .enumerate()
            .filter(|&(j, _)| j != row)
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

        let mut ids: Vec<GameId> = Vec::with_capacity(n.min(ranked.len()));
        for (j, _) in ranked {
            match state.row_ids.get(j).copied().flatten() {
                Some(id) if id != game_id && !ids.contains(&id) => ids.push(id),
                _ => continue,
            }
            if ids.len() == n {
                break;
            }
        }
        debug!(candidates = ids.len(), "Similarity candidates ranked");

        let mut by_id: HashMap<GameId, Game> = self
            .catalog
            .list_by_ids(&ids)
            .into_iter()
            .map(|g| (g.id, g))
            .collect();
        let games: Vec<Game> = ids.iter().filter_map(|id| by_id.remove(id)).collect();
        if games.len() < ids.len() {
            debug!(
                missing = ids.len() - games.len(),
                "Skipped similar games missing from the catalog"
            );
        }
        Ok(games)
    }

    /// Symmetric pairwise similarity; 0.0 when either id is unknown
    pub fn get_similarity_score(&self, a: GameId, b: GameId) -> f32 {
        let Some(state) = self.state.as_ref() else {
            return 0.0;
        };
        match (state.index.get(&a), state.index.get(&b)) {
            (Some(&i), Some(&j)) => state.matrix.get(i, j).unwrap_or(0.0),
            _ => 0.0,
        }
    }

    /// Load the fastest readable source.
    ///
    /// `bundle` names an extra bundle (store-relative or absolute) tried
    /// after the canonical one. Returns whether a matrix was loaded.
    pub fn load_model(&mut self, bundle: Option<&str>) -> bool {
        let mut chain = LoaderChain::new("cosine similarity")
            .add_strategy(RawMatrixFastPath {
                catalog: self.catalog.clone(),
                preparer: self.preparer.clone(),
            })
            .add_strategy(BundleFile(SIMILARITY_MODEL.to_string()));
        if let Some(path) = bundle.filter(|p| *p != SIMILARITY_MODEL) {
            chain = chain.add_strategy(BundleFile(path.to_string()));
        }

        match chain.load_first(&self.store) {
            Ok(loaded) => {
                info!(
                    source = %loaded.source,
                    games = loaded.value.matrix.size(),
                    "Similarity model loaded"
                );
                self.state = Some(loaded.value);
                self.model_source = Some(loaded.source);
                true
            }
            Err(e) => {
                error!(error = %e, "No similarity model could be loaded");
                false
            }
        }
    }

    pub fn model_info(&self) -> SimilarityModelInfo {
        let state = self.state.as_ref();
        let stats = state.and_then(|s| s.matrix.stats());
        SimilarityModelInfo {
            loaded: state.is_some(),
            source: self.model_source.clone(),
            n_games: state.map(|s| s.matrix.size()).unwrap_or(0),
            feature_columns: state.map(|s| s.space.columns.clone()).unwrap_or_default(),
            avg_similarity: stats.map(|s| s.0),
            min_similarity: stats.map(|s| s.1),
            max_similarity: stats.map(|s| s.2),
            trained_at: state.and_then(|s| s.trained_at),
        }
    }
}
