//! # Engines Crate
//!
//! The two recommendation engines behind the hybrid orchestrator.
//!
//! ## Components
//!
//! ### Clustering Engine
//! Partition the catalog with K-Means:
//! - "Other games in the same cluster, best rated first"
//! - Served from a flat id -> cluster export, so old exports keep working
//!
//! ### Similarity Engine
//! Pairwise cosine similarity over standardized features:
//! - "Games whose features point the same way as this one"
//! - Served from an in-memory N x N matrix
//!
//! Both engines load independently through prioritized loader chains and
//! answer with empty results rather than errors when nothing is loaded.
//!
//! ## Example Usage
//!
//! ```ignore
//! use artifacts::ArtifactStore;
//! use catalog::{CatalogIndex, GameRepository};
//! use engines::{ClusteringEngine, SimilarityEngine};
//! use std::sync::Arc;
//!
//! let catalog: Arc<dyn GameRepository> = Arc::new(CatalogIndex::load_from_file(path)?);
//! let store = ArtifactStore::new("artifacts");
//!
//! let mut similarity = SimilarityEngine::new(catalog.clone(), store.clone());
//! similarity.load_model(None);
//! let similar = similarity.get_similar_games(42, 10);
//!
//! let mut clustering = ClusteringEngine::new(catalog.clone(), store);
//! clustering.load_model(None);
//! let anchor = catalog.get(42).unwrap();
//! let same_cluster = clustering.get_cluster_recommendations(&anchor, 10);
//! ```

pub mod clustering;
pub mod error;
pub mod export;
pub mod kmeans;
pub mod silhouette;
pub mod similarity;

pub use clustering::{ClusteringEngine, ClusteringModel, ClusteringModelInfo, DEFAULT_N_CLUSTERS};
pub use error::{EngineError, Result};
pub use export::{ClusterExport, ClusterSummary, ExportRow};
pub use kmeans::{KMeans, KMeansFit, KMeansModel};
pub use silhouette::silhouette_score;
pub use similarity::{SimilarityEngine, SimilarityModel, SimilarityModelInfo, cosine_matrix};

/// Current time in Unix seconds
pub(crate) fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
