mod file_config;

pub use file_config::{BlendFileConfig, FileConfig};

use anyhow::{Result, bail};
use artifacts::ArtifactStore;
use catalog::GameRepository;
use engines::{ClusteringEngine, DEFAULT_N_CLUSTERS, SimilarityEngine};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Hybrid blending constants
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlendConfig {
    /// Pool size as a multiple of a half's target count
    pub pool_multiplier: usize,
    /// Upper bound on any single pool
    pub pool_cap: usize,
    /// The split between the halves moves by up to this many games
    pub split_jitter: i64,
}

impl Default for BlendConfig {
    fn default() -> Self {
        Self {
            pool_multiplier: 3,
            pool_cap: 20,
            split_jitter: 2,
        }
    }
}

/// Everything needed to build, train and load both engines
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub artifact_dir: PathBuf,
    /// Where content snapshots are looked up; defaults to `artifact_dir`
    pub snapshot_dir: Option<PathBuf>,
    pub kmeans_model_path: Option<String>,
    pub n_clusters: usize,
    pub random_state: u64,
    pub n_init: usize,
    pub max_iter: usize,
    pub blend: BlendConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            artifact_dir: PathBuf::from("."),
            snapshot_dir: None,
            kmeans_model_path: None,
            n_clusters: DEFAULT_N_CLUSTERS,
            random_state: 42,
            n_init: 10,
            max_iter: 300,
            blend: BlendConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn with_artifact_dir(artifact_dir: impl Into<PathBuf>) -> Self {
        Self {
            artifact_dir: artifact_dir.into(),
            ..Self::default()
        }
    }

    pub fn snapshot_root(&self) -> &Path {
        self.snapshot_dir.as_deref().unwrap_or(&self.artifact_dir)
    }

    pub fn store(&self) -> ArtifactStore {
        ArtifactStore::new(&self.artifact_dir)
    }

    /// An unloaded clustering engine with this configuration
    pub fn clustering_engine(&self, catalog: Arc<dyn GameRepository>) -> ClusteringEngine {
        ClusteringEngine::new(catalog, self.store())
            .with_n_clusters(self.n_clusters)
            .with_random_state(self.random_state)
            .with_n_init(self.n_init)
            .with_max_iter(self.max_iter)
    }

    /// An unloaded similarity engine with this configuration
    pub fn similarity_engine(&self, catalog: Arc<dyn GameRepository>) -> SimilarityEngine {
        SimilarityEngine::new(catalog, self.store()).with_snapshot_dir(self.snapshot_root())
    }
}

/// Base values taken from command-line flags
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub catalog: PathBuf,
    pub artifact_dir: PathBuf,
    pub snapshot_dir: Option<PathBuf>,
    pub n_clusters: usize,
    pub random_state: u64,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            catalog: PathBuf::from("games.csv"),
            artifact_dir: PathBuf::from("."),
            snapshot_dir: None,
            n_clusters: DEFAULT_N_CLUSTERS,
            random_state: 42,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub catalog: PathBuf,
    pub engine: EngineConfig,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();
        let defaults = EngineConfig::default();

        let catalog = file
            .catalog
            .map(PathBuf::from)
            .unwrap_or_else(|| cli.catalog.clone());
        let artifact_dir = file
            .artifact_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| cli.artifact_dir.clone());
        if artifact_dir.exists() && !artifact_dir.is_dir() {
            bail!("artifact_dir is not a directory: {:?}", artifact_dir);
        }
        let snapshot_dir = file
            .snapshot_dir
            .map(PathBuf::from)
            .or_else(|| cli.snapshot_dir.clone());

        let n_clusters = file.n_clusters.unwrap_or(cli.n_clusters);
        if n_clusters == 0 {
            bail!("n_clusters must be at least 1");
        }
        let random_state = file.random_state.unwrap_or(cli.random_state);
        let n_init = file.n_init.unwrap_or(defaults.n_init);
        let max_iter = file.max_iter.unwrap_or(defaults.max_iter);
        if n_init == 0 || max_iter == 0 {
            bail!("n_init and max_iter must be at least 1");
        }

        let blend_file = file.blend.unwrap_or_default();
        let blend = BlendConfig {
            pool_multiplier: blend_file
                .pool_multiplier
                .unwrap_or(defaults.blend.pool_multiplier),
            pool_cap: blend_file.pool_cap.unwrap_or(defaults.blend.pool_cap),
            split_jitter: blend_file
                .split_jitter
                .unwrap_or(defaults.blend.split_jitter),
        };
        if blend.pool_multiplier == 0 || blend.pool_cap == 0 {
            bail!("blend.pool_multiplier and blend.pool_cap must be at least 1");
        }
        if blend.split_jitter < 0 {
            bail!("blend.split_jitter cannot be negative");
        }

        Ok(Self {
            catalog,
            engine: EngineConfig {
                artifact_dir,
                snapshot_dir,
                kmeans_model_path: file.kmeans_model_path,
                n_clusters,
                random_state,
                n_init,
                max_iter,
                blend,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_cli_only() {
        let cli = CliConfig {
            catalog: PathBuf::from("/data/games.csv"),
            artifact_dir: PathBuf::from("/models"),
            snapshot_dir: None,
            n_clusters: 8,
            random_state: 7,
        };

        let config = AppConfig::resolve(&cli, None).unwrap();

        assert_eq!(config.catalog, PathBuf::from("/data/games.csv"));
        assert_eq!(config.engine.artifact_dir, PathBuf::from("/models"));
        assert_eq!(config.engine.snapshot_root(), Path::new("/models"));
        assert_eq!(config.engine.n_clusters, 8);
        assert_eq!(config.engine.random_state, 7);
        assert_eq!(config.engine.n_init, 10);
        assert_eq!(config.engine.max_iter, 300);
        assert_eq!(config.engine.blend, BlendConfig::default());
    }

    #[test]
    fn test_toml_overrides_cli() {
        let toml_str = r#"
            artifact_dir = "/srv/artifacts"
            snapshot_dir = "/srv/snapshots"
            n_clusters = 6
            max_iter = 100

            [blend]
            pool_cap = 30
        "#;
        let file: FileConfig = toml::from_str(toml_str).unwrap();

        let config = AppConfig::resolve(&CliConfig::default(), Some(file)).unwrap();

        assert_eq!(config.catalog, PathBuf::from("games.csv"));
        assert_eq!(config.engine.artifact_dir, PathBuf::from("/srv/artifacts"));
        assert_eq!(config.engine.snapshot_root(), Path::new("/srv/snapshots"));
        assert_eq!(config.engine.n_clusters, 6);
        assert_eq!(config.engine.random_state, 42);
        assert_eq!(config.engine.max_iter, 100);
        assert_eq!(config.engine.blend.pool_cap, 30);
        assert_eq!(config.engine.blend.pool_multiplier, 3);
        assert_eq!(config.engine.blend.split_jitter, 2);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let file: FileConfig = toml::from_str("n_clusters = 0").unwrap();
        assert!(AppConfig::resolve(&CliConfig::default(), Some(file)).is_err());

        let file: FileConfig = toml::from_str("[blend]\nsplit_jitter = -1").unwrap();
        assert!(AppConfig::resolve(&CliConfig::default(), Some(file)).is_err());
    }

    #[test]
    fn test_artifact_dir_must_be_a_directory() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("not_a_dir");
        std::fs::write(&file_path, "x").unwrap();

        let cli = CliConfig {
            artifact_dir: file_path,
            ..CliConfig::default()
        };
        assert!(AppConfig::resolve(&cli, None).is_err());
    }

    #[test]
    fn test_load_file_config() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("engine.toml");
        std::fs::write(&path, "random_state = 99\n[blend]\npool_multiplier = 4\n").unwrap();

        let file = FileConfig::load(&path).unwrap();
        assert_eq!(file.random_state, Some(99));
        assert_eq!(file.blend.unwrap().pool_multiplier, Some(4));

        assert!(FileConfig::load(&temp_dir.path().join("missing.toml")).is_err());
    }
}
