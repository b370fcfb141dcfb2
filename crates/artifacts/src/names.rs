//! Well-known artifact names, newest first within each group.

/// Clustering model written by training
pub const KMEANS_MODEL: &str = "kmeans_model.json";
/// Clustering model from earlier training runs
pub const KMEANS_MODEL_LEGACY: &str = "model_kmeans.json";

/// Cluster export keyed by catalog id (written by training)
pub const CLUSTER_EXPORT: &str = "games_clustered_with_ids.csv";
/// Cluster export keyed by name
pub const CLUSTER_EXPORT_LEGACY: &str = "games_clustered.csv";
/// Oldest cluster export, keyed by name
pub const CLUSTER_EXPORT_OLDEST: &str = "df_clustering.csv";

/// Cluster exports in read order
pub const CLUSTER_EXPORTS: [&str; 3] = [CLUSTER_EXPORT, CLUSTER_EXPORT_LEGACY, CLUSTER_EXPORT_OLDEST];

/// Raw similarity matrix, only valid together with its content snapshot
pub const SIMILARITY_MATRIX: &str = "cosine_similarity_matrix.bin";
/// Content snapshot that must accompany the raw matrix
pub const SIMILARITY_MATRIX_COMPANION: &str = "df_cb_content_ready.csv";
/// Full similarity bundle written by training
pub const SIMILARITY_MODEL: &str = "cosine_similarity_model.json";

/// Envelope kinds
pub const KIND_KMEANS: &str = "kmeans";
pub const KIND_SIMILARITY: &str = "cosine_similarity";
