//! Parser for the game catalog CSV.
//!
//! Expected header columns (any order, extra columns ignored):
//! `id` (optional), `Name`, `Rating`, `Genres`, `Platforms`, `ESRB`, `ImageURL`
//!
//! `Genres` and `Platforms` are comma separated lists inside one quoted
//! field, e.g. `"Action, Shooter"`. Only `Name` is required.

use crate::error::{CatalogError, Result};
use crate::table::DelimitedTable;
use crate::types::{Game, GameId};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, warn};

/// Column positions resolved once from the header row
#[derive(Debug, Clone, Copy)]
struct Columns {
    id: Option<usize>,
    name: usize,
    rating: Option<usize>,
    genres: Option<usize>,
    platforms: Option<usize>,
    esrb: Option<usize>,
    image_url: Option<usize>,
}

impl Columns {
    fn resolve(table: &DelimitedTable, file: &str) -> Result<Self> {
        Ok(Self {
            id: table.column(&["id", "db_id"]),
            name: table.require_column(file, &["Name", "name"])?,
            rating: table.column(&["Rating", "rating"]),
            genres: table.column(&["Genres", "genres"]),
            platforms: table.column(&["Platforms", "platforms"]),
            esrb: table.column(&["ESRB", "esrb"]),
            image_url: table.column(&["ImageURL", "image_url", "cover_image_url"]),
        })
    }
}

/// Parse the catalog file at `path`
pub fn parse_games(path: &Path) -> Result<Vec<Game>> {
    let table = DelimitedTable::read(path)?;
    let file = path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    parse_games_table(&table, &file)
}

/// Parse an already loaded catalog table.
///
/// Rows with a blank name are skipped with a warning. Without an `id`
/// column, ids are assigned sequentially from 1 and a repeated name updates
/// the earlier game instead of creating a second one.
pub fn parse_games_table(table: &DelimitedTable, file: &str) -> Result<Vec<Game>> {
    let columns = Columns::resolve(table, file)?;

    // Rows are independent, so cell parsing runs in parallel.
    // Line numbers are row index + 2 (1-based, after the header).
    let parsed: Vec<Option<ParsedRow>> = table
        .rows()
        .par_iter()
        .enumerate()
        .map(|(idx, row)| parse_row(row, &columns, file, idx + 2))
        .collect::<Result<_>>()?;

    let mut games: Vec<Game> = Vec::with_capacity(parsed.len());
    let mut by_name: HashMap<String, usize> = HashMap::new();
    let mut seen_ids: HashSet<GameId> = HashSet::new();
    let mut skipped = 0usize;

    for (idx, row) in parsed.into_iter().enumerate() {
        let Some(row) = row else {
            warn!(file, line = idx + 2, "Skipping row with a blank game name");
            skipped += 1;
            continue;
        };

        match row.id {
            Some(id) => {
                if !seen_ids.insert(id) {
                    return Err(CatalogError::DuplicateId(id));
                }
                by_name.entry(row.game.name.to_lowercase()).or_insert(games.len());
                games.push(Game { id, ..row.game });
            }
            None => {
                let key = row.game.name.to_lowercase();
                if let Some(&pos) = by_name.get(&key) {
                    update_game(&mut games[pos], row.game);
                } else {
                    let id = next_free_id(&seen_ids, games.len() as GameId + 1);
                    seen_ids.insert(id);
                    by_name.insert(key, games.len());
                    games.push(Game { id, ..row.game });
                }
            }
        }
    }

    debug!(file, games = games.len(), skipped, "Parsed catalog table");
    Ok(games)
}

fn next_free_id(taken: &HashSet<GameId>, mut candidate: GameId) -> GameId {
    while taken.contains(&candidate) {
        candidate += 1;
    }
    candidate
}

struct ParsedRow {
    id: Option<GameId>,
    game: Game,
}

fn parse_row(
    row: &[String],
    columns: &Columns,
    file: &str,
    line: usize,
) -> Result<Option<ParsedRow>> {
    let name = row[columns.name].trim();
    if name.is_empty() {
        return Ok(None);
    }

    let id = match columns.id.map(|c| row[c].trim()) {
        Some(raw) if !raw.is_empty() => {
            Some(parse_id(raw).map_err(|reason| CatalogError::ParseError {
                file: file.to_string(),
                line,
                reason,
            })?)
        }
        _ => None,
    };

    let rating = match columns.rating.map(|c| row[c].trim()) {
        Some(raw) if !raw.is_empty() => {
            Some(raw.parse::<f32>().map_err(|e| CatalogError::ParseError {
                file: file.to_string(),
                line,
                reason: format!("Invalid rating {raw:?}: {e}"),
            })?)
        }
        _ => None,
    };

    let cell = |col: Option<usize>| col.map(|c| row[c].as_str()).unwrap_or("");

    let game = Game {
        id: 0,
        name: name.to_string(),
        rating,
        genres: split_list(cell(columns.genres)),
        platforms: split_list(cell(columns.platforms)),
        esrb: non_empty(cell(columns.esrb)),
        cover_image_url: non_empty(cell(columns.image_url)),
    };

    Ok(Some(ParsedRow { id, game }))
}

/// Ids exported by spreadsheet tools sometimes carry a ".0" suffix
fn parse_id(raw: &str) -> std::result::Result<GameId, String> {
    let digits = raw.strip_suffix(".0").unwrap_or(raw);
    digits
        .parse::<GameId>()
        .map_err(|e| format!("Invalid id {raw:?}: {e}"))
}

/// Split a comma separated list, dropping blanks
pub fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

/// A repeated row refreshes scalar attributes; list attributes are kept
/// from the first occurrence
fn update_game(existing: &mut Game, newer: Game) {
    existing.rating = newer.rating;
    existing.esrb = newer.esrb;
    existing.cover_image_url = newer.cover_image_url;
    if existing.genres.is_empty() {
        existing.genres = newer.genres;
    }
    if existing.platforms.is_empty() {
        existing.platforms = newer.platforms;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(text: &str) -> DelimitedTable {
        DelimitedTable::parse(text, "games.csv").unwrap()
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list("Action, Shooter ,,"), vec!["Action", "Shooter"]);
        assert!(split_list("  ").is_empty());
    }

    #[test]
    fn test_parse_without_id_column() {
        let t = table(
            "Name,Rating,Genres,Platforms,ESRB,ImageURL\n\
             Halo,4.5,\"Shooter, Action\",Xbox,Mature,http://img/halo.png\n\
             Tetris,,Puzzle,\"NES, Game Boy\",,\n",
        );
        let games = parse_games_table(&t, "games.csv").unwrap();

        assert_eq!(games.len(), 2);
        assert_eq!(games[0].id, 1);
        assert_eq!(games[0].genres, vec!["Shooter", "Action"]);
        assert_eq!(games[0].esrb.as_deref(), Some("Mature"));
        assert_eq!(games[0].cover_image_url.as_deref(), Some("http://img/halo.png"));

        assert_eq!(games[1].id, 2);
        assert_eq!(games[1].rating, None);
        assert_eq!(games[1].platforms, vec!["NES", "Game Boy"]);
        assert_eq!(games[1].esrb, None);
    }

    #[test]
    fn test_blank_names_are_skipped() {
        let t = table("Name,Rating\n  ,4.0\nPortal,4.8\n");
        let games = parse_games_table(&t, "games.csv").unwrap();
        assert_eq!(games.len(), 1);
        assert_eq!(games[0].name, "Portal");
    }

    #[test]
    fn test_repeated_name_updates_existing_game() {
        let t = table("Name,Rating,Genres\nPortal,4.0,Puzzle\nportal,4.8,Action\n");
        let games = parse_games_table(&t, "games.csv").unwrap();
        assert_eq!(games.len(), 1);
        assert_eq!(games[0].rating, Some(4.8));
        assert_eq!(games[0].genres, vec!["Puzzle"]);
    }

    #[test]
    fn test_explicit_ids() {
        let t = table("id,Name\n10.0,Doom\n7,Quake\n");
        let games = parse_games_table(&t, "games.csv").unwrap();
        assert_eq!(games[0].id, 10);
        assert_eq!(games[1].id, 7);
    }

    #[test]
    fn test_duplicate_id_is_an_error() {
        let t = table("id,Name\n1,Doom\n1,Quake\n");
        let err = parse_games_table(&t, "games.csv").unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateId(1)));
    }

    #[test]
    fn test_invalid_rating_reports_line() {
        let t = table("Name,Rating\nDoom,4.0\nQuake,great\n");
        let err = parse_games_table(&t, "games.csv").unwrap_err();
        assert!(matches!(err, CatalogError::ParseError { line: 3, .. }));
    }

    #[test]
    fn test_missing_name_column() {
        let t = table("Title,Rating\nDoom,4.0\n");
        let err = parse_games_table(&t, "games.csv").unwrap_err();
        assert!(matches!(err, CatalogError::MissingColumn { .. }));
    }
}
