//! Flat cluster export.
//!
//! Training writes one row per game with its assigned cluster so that
//! recommendations can be served without loading the model. Exports from
//! earlier training runs only carry names, so reading is lenient:
//!
//! | column              | aliases             | required |
//! |---------------------|---------------------|----------|
//! | catalog id          | `db_id`             | no       |
//! | name                | `name`, `Name`      | yes      |
//! | rating              | `rating`, `Rating`  | no       |
//! | cluster             | `Cluster`, `cluster`| yes      |

use artifacts::names::CLUSTER_EXPORTS;
use artifacts::{ArtifactError, ArtifactStore, LoadStrategy, LoaderChain};
use catalog::{CatalogError, DelimitedTable, GameId};
use features::FeatureRow;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct ExportRow {
    pub id: Option<GameId>,
    pub name: String,
    pub rating: Option<f32>,
    pub cluster: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClusterExport {
    /// File the export was read from
    pub source: String,
    /// Whether rows are matched by catalog id rather than by name
    pub keyed_by_id: bool,
    pub rows: Vec<ExportRow>,
}

/// Size, mean rating and a few member names of one cluster
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ClusterSummary {
    pub cluster: i64,
    pub size: usize,
    pub mean_rating: Option<f32>,
    pub sample_names: Vec<String>,
}

const SAMPLE_NAMES: usize = 5;

impl ClusterExport {
    /// Parse an export table. `file` is only used in errors.
    pub fn from_table(table: &DelimitedTable, file: &str) -> Result<Self, ArtifactError> {
        let shape = |reason: String| ArtifactError::UnrecognizedShape {
            name: file.to_string(),
            reason,
        };

        let id_col = table.column(&["db_id"]);
        let name_col = table
            .column(&["name", "Name"])
            .ok_or_else(|| shape("missing name column".to_string()))?;
        let cluster_col = table
            .column(&["Cluster", "cluster"])
            .ok_or_else(|| shape("missing Cluster column".to_string()))?;
        let rating_col = table.column(&["rating", "Rating"]);

        let mut rows = Vec::with_capacity(table.len());
        for (idx, cells) in table.rows().iter().enumerate() {
            let raw_cluster = cells[cluster_col].trim();
            let cluster = parse_integer(raw_cluster).ok_or_else(|| {
                shape(format!("line {}: bad cluster {raw_cluster:?}", idx + 2))
            })?;
            rows.push(ExportRow {
                id: id_col.and_then(|c| parse_integer(cells[c].trim())).and_then(|v| {
                    GameId::try_from(v).ok()
                }),
                name: cells[name_col].trim().to_string(),
                rating: rating_col
                    .and_then(|c| cells[c].trim().parse::<f32>().ok())
                    .filter(|r| r.is_finite()),
                cluster,
            });
        }

        Ok(Self {
            source: file.to_string(),
            keyed_by_id: id_col.is_some(),
            rows,
        })
    }

    /// Build the export written after training
    pub fn from_training(rows: &[FeatureRow], labels: &[usize]) -> Self {
        Self {
            source: artifacts::names::CLUSTER_EXPORT.to_string(),
            keyed_by_id: true,
            rows: rows
                .iter()
                .zip(labels)
                .map(|(row, &label)| ExportRow {
                    id: Some(row.id),
                    name: row.name.clone(),
                    rating: Some(row.rating),
                    cluster: label as i64,
                })
                .collect(),
        }
    }

    /// Serialize as the canonical id-keyed table
    pub fn to_table(&self, extra: &[FeatureRow]) -> Result<DelimitedTable, CatalogError> {
        let mut table =
            DelimitedTable::new(&["db_id", "name", "rating", "genre", "platform", "esrb", "Cluster"]);
        for (i, row) in self.rows.iter().enumerate() {
            let attrs = extra.get(i);
            table.push_row(vec![
                row.id.map(|id| id.to_string()).unwrap_or_default(),
                row.name.clone(),
                row.rating.map(|r| r.to_string()).unwrap_or_default(),
                attrs.map(|a| a.genre.clone()).unwrap_or_default(),
                attrs.map(|a| a.platform.clone()).unwrap_or_default(),
                attrs.map(|a| a.esrb.clone()).unwrap_or_default(),
                row.cluster.to_string(),
            ])?;
        }
        Ok(table)
    }

    /// Cluster summaries in cluster order
    pub fn summaries(&self) -> Vec<ClusterSummary> {
        let mut groups: BTreeMap<i64, Vec<&ExportRow>> = BTreeMap::new();
        for row in &self.rows {
            groups.entry(row.cluster).or_default().push(row);
        }

        groups
            .into_iter()
            .map(|(cluster, members)| {
                let rated: Vec<f32> = members.iter().filter_map(|r| r.rating).collect();
                let mean_rating =
                    (!rated.is_empty()).then(|| rated.iter().sum::<f32>() / rated.len() as f32);
                ClusterSummary {
                    cluster,
                    size: members.len(),
                    mean_rating,
                    sample_names: members
                        .iter()
                        .take(SAMPLE_NAMES)
                        .map(|r| r.name.clone())
                        .collect(),
                }
            })
            .collect()
    }
}

/// Cells written by spreadsheet tools may carry a ".0" suffix
fn parse_integer(raw: &str) -> Option<i64> {
    raw.strip_suffix(".0").unwrap_or(raw).parse().ok()
}

/// Reads one export file from the store
pub struct ExportFile(pub &'static str);

impl LoadStrategy<ClusterExport> for ExportFile {
    fn name(&self) -> &str {
        self.0
    }

    fn load(&self, store: &ArtifactStore) -> artifacts::Result<ClusterExport> {
        if !store.exists(self.0) {
            return Err(ArtifactError::NotFound {
                name: self.0.to_string(),
            });
        }
        let table = DelimitedTable::read(&store.path(self.0)).map_err(|e| {
            ArtifactError::UnrecognizedShape {
                name: self.0.to_string(),
                reason: e.to_string(),
            }
        })?;
        ClusterExport::from_table(&table, self.0)
    }
}

/// Every known export, newest first
pub fn export_chain() -> LoaderChain<ClusterExport> {
    CLUSTER_EXPORTS
        .iter()
        .fold(LoaderChain::new("cluster export"), |chain, &name| {
            chain.add_strategy(ExportFile(name))
        })
}
