//! Content snapshot reader.
//!
//! A content snapshot is a pre-processed CSV exported by an earlier
//! data-preparation run. It carries already-scaled and already-encoded
//! columns, which are reused as-is instead of being derived again:
//!
//! | column           | use                                         |
//! |------------------|---------------------------------------------|
//! | `db_id`          | catalog id (optional; else join on `Name`)  |
//! | `Name`           | display name / join key                     |
//! | `Rating_scaled`  | feature, required                           |
//! | `ESRB_cat`       | feature, required                           |
//! | `Genres_list`    | hashed into `genres_encoded` when present   |
//! | `Platforms_list` | hashed into `platforms_encoded` when present|
//!
//! Raw `Rating`, `Genres`, `Platforms` and `ESRB` columns are carried along
//! for display when present.

use crate::error::{FeatureError, Result};
use crate::table::{FeatureRow, FeatureSource, FeatureTable};
use catalog::{DelimitedTable, Game, GameId, UNKNOWN_LABEL};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// Snapshot keyed by catalog id
pub const SNAPSHOT_WITH_IDS: &str = "df_cb_content_ready_with_ids.csv";
/// Snapshot keyed by name only
pub const SNAPSHOT_PLAIN: &str = "df_cb_content_ready.csv";
/// Read order
pub const SNAPSHOT_CANDIDATES: [&str; 2] = [SNAPSHOT_WITH_IDS, SNAPSHOT_PLAIN];

/// Number of buckets list columns are hashed into
pub const HASH_BUCKETS: u64 = 1000;

/// Stable bucket for a list-valued cell (FNV-1a, 64 bit)
pub fn hash_bucket(text: &str) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    let hash = text
        .bytes()
        .fold(OFFSET, |h, b| (h ^ b as u64).wrapping_mul(PRIME));
    hash % HASH_BUCKETS
}

/// Read a snapshot file, joining names against `games` when it has no ids
pub fn read_snapshot(path: &Path, games: &[Game]) -> Result<FeatureTable> {
    let file = path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let table = DelimitedTable::read(path)?;
    let features = parse_snapshot(&table, &file, games)?;
    info!(
        file = %file,
        games = features.len(),
        columns = ?features.columns(),
        "Loaded content snapshot"
    );
    Ok(features)
}

pub fn parse_snapshot(table: &DelimitedTable, file: &str, games: &[Game]) -> Result<FeatureTable> {
    let malformed = |reason: String| FeatureError::MalformedSnapshot {
        file: file.to_string(),
        reason,
    };

    let id_col = table.column(&["db_id"]);
    let name_col = table
        .column(&["Name", "name"])
        .ok_or_else(|| malformed("missing Name column".to_string()))?;
    let rating_scaled = table
        .column(&["Rating_scaled"])
        .ok_or_else(|| malformed("missing Rating_scaled column".to_string()))?;
    let esrb_cat = table
        .column(&["ESRB_cat"])
        .ok_or_else(|| malformed("missing ESRB_cat column".to_string()))?;
    let genres_list = table.column(&["Genres_list"]);
    let platforms_list = table.column(&["Platforms_list"]);

    let raw_rating = table.column(&["Rating", "rating"]);
    let raw_genres = table.column(&["Genres", "genres"]);
    let raw_platforms = table.column(&["Platforms", "platforms"]);
    let raw_esrb = table.column(&["ESRB", "esrb"]);

    let mut columns = vec!["Rating_scaled".to_string(), "ESRB_cat".to_string()];
    if genres_list.is_some() {
        columns.push("genres_encoded".to_string());
    }
    if platforms_list.is_some() {
        columns.push("platforms_encoded".to_string());
    }

    let name_to_id: HashMap<String, GameId> = games
        .iter()
        .map(|g| (g.name.trim().to_lowercase(), g.id))
        .collect();

    let mut rows = Vec::with_capacity(table.len());
    let mut unmatched = 0usize;

    for (idx, cells) in table.rows().iter().enumerate() {
        let line = idx + 2;
        let name = cells[name_col].trim();

        let id = match id_col {
            Some(c) => {
                let raw = cells[c].trim();
                if raw.is_empty() {
                    unmatched += 1;
                    continue;
                }
                parse_id(raw).ok_or_else(|| malformed(format!("line {line}: bad db_id {raw:?}")))?
            }
            None => match name_to_id.get(&name.to_lowercase()) {
                Some(&id) => id,
                None => {
                    unmatched += 1;
                    continue;
                }
            },
        };

        let number = |col: usize, label: &str| -> Result<f64> {
            let raw = cells[col].trim();
            raw.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| malformed(format!("line {line}: non-numeric {label} {raw:?}")))
        };

        let mut values = vec![
            number(rating_scaled, "Rating_scaled")?,
            number(esrb_cat, "ESRB_cat")?,
        ];
        for col in [genres_list, platforms_list].into_iter().flatten() {
            let cell = cells[col].trim();
            values.push(if cell.is_empty() { 0.0 } else { hash_bucket(cell) as f64 });
        }

        let text = |col: Option<usize>| -> String {
            col.map(|c| cells[c].trim())
                .filter(|s| !s.is_empty())
                .unwrap_or(UNKNOWN_LABEL)
                .to_string()
        };

        rows.push(FeatureRow {
            id,
            name: name.to_string(),
            rating: raw_rating
                .and_then(|c| cells[c].trim().parse::<f32>().ok())
                .unwrap_or(0.0),
            genre: text(raw_genres),
            platform: text(raw_platforms),
            esrb: text(raw_esrb),
            values,
        });
    }

    if unmatched > 0 {
        debug!(file, unmatched, "Dropped snapshot rows without a catalog id");
    }

    Ok(FeatureTable::new(
        columns,
        rows,
        FeatureSource::Snapshot {
            file: file.to_string(),
        },
    ))
}

fn parse_id(raw: &str) -> Option<GameId> {
    raw.strip_suffix(".0").unwrap_or(raw).parse().ok()
}
