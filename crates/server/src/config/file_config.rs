use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Optional TOML configuration; every present value overrides the CLI
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    pub catalog: Option<String>,
    pub artifact_dir: Option<String>,
    pub snapshot_dir: Option<String>,
    /// Extra clustering model tried after the canonical one
    pub kmeans_model_path: Option<String>,

    // Training
    pub n_clusters: Option<usize>,
    pub random_state: Option<u64>,
    pub n_init: Option<usize>,
    pub max_iter: Option<usize>,

    pub blend: Option<BlendFileConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct BlendFileConfig {
    pub pool_multiplier: Option<usize>,
    pub pool_cap: Option<usize>,
    pub split_jitter: Option<i64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
