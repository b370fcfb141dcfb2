//! Load a games CSV and report timing and index sizes.
//!
//! Run with: cargo run --package catalog --example load_catalog -- games.csv

use catalog::CatalogIndex;
use std::path::PathBuf;
use std::time::Instant;

fn main() -> Result<(), catalog::CatalogError> {
    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("games.csv"));

    println!("Loading game catalog from {}...\n", path.display());

    let start = Instant::now();
    let index = CatalogIndex::load_from_file(&path)?;
    let elapsed = start.elapsed();

    let (games, genres, platforms) = index.counts();

    println!("=== Load Complete ===");
    println!("Time taken: {:?}", elapsed);
    println!("Games: {}", games);
    println!("Genres: {}", genres);
    println!("Platforms: {}", platforms);
    println!(
        "\nPerformance: {:.0} games/second",
        games as f64 / elapsed.as_secs_f64().max(f64::EPSILON)
    );
    Ok(())
}
