use anyhow::{anyhow, bail, Context, Result};
use catalog::{CatalogIndex, Game, GameId, GameRepository};
use clap::{Parser, Subcommand};
use colored::Colorize;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::SeedableRng;
use server::{AppConfig, CliConfig, EngineConfig, FileConfig, HybridOrchestrator};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// GameRecs - Hybrid Game Recommendation Engine
#[derive(Parser)]
#[command(name = "game-recs")]
#[command(about = "Game recommendations from K-Means clusters and cosine similarity", long_about = None)]
struct Cli {
    /// Path to the game catalog CSV
    #[arg(short, long, default_value = "games.csv")]
    catalog: PathBuf,

    /// Directory holding trained artifacts
    #[arg(short, long, default_value = ".")]
    artifacts: PathBuf,

    /// Directory holding content snapshots (defaults to the artifact directory)
    #[arg(long)]
    snapshots: Option<PathBuf>,

    /// Optional TOML config; its values override these flags
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train the clustering and similarity models
    Train {
        /// Number of K-Means clusters
        #[arg(long, default_value = "5")]
        clusters: usize,

        /// Minimum catalog size needed to train clustering
        #[arg(long, default_value = "10")]
        min_games: usize,

        /// Do not train the clustering model
        #[arg(long)]
        skip_kmeans: bool,

        /// Do not train the similarity model
        #[arg(long)]
        skip_similarity: bool,
    },

    /// Get recommendations for a game
    Recommend {
        /// Anchor game ID
        #[arg(long)]
        game_id: GameId,

        /// Number of recommendations to return
        #[arg(long, default_value = "10")]
        limit: usize,

        /// similar, clustering or hybrid
        #[arg(long, default_value = "hybrid")]
        mode: String,

        /// Seed for hybrid blending (random when absent)
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Show the similarity score of two games
    Score {
        #[arg(long)]
        a: GameId,

        #[arg(long)]
        b: GameId,
    },

    /// Summarize the clusters from the latest export
    Clusters,

    /// Show what each engine has loaded
    Models,

    /// Search for games by name
    Search {
        /// Case-insensitive substring of the game name
        #[arg(long)]
        name: String,
    },

    /// Run benchmark to test performance
    Benchmark {
        /// Number of requests to make
        #[arg(long, default_value = "100")]
        requests: usize,

        /// Recommendations per request
        #[arg(long, default_value = "10")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let file_config = cli
        .config
        .as_deref()
        .map(FileConfig::load)
        .transpose()?;
    let clusters = match &cli.command {
        Commands::Train { clusters, .. } => *clusters,
        _ => engines::DEFAULT_N_CLUSTERS,
    };
    let config = AppConfig::resolve(
        &CliConfig {
            catalog: cli.catalog.clone(),
            artifact_dir: cli.artifacts.clone(),
            snapshot_dir: cli.snapshots.clone(),
            n_clusters: clusters,
            ..CliConfig::default()
        },
        file_config,
    )?;

    println!("Loading game catalog from {}...", config.catalog.display());
    let start = Instant::now();
    let index = Arc::new(
        CatalogIndex::load_from_file(&config.catalog).context("Failed to load game catalog")?,
    );
    let (games, genres, platforms) = index.counts();
    println!(
        "{} Loaded {} games ({} genres, {} platforms) in {:?}",
        "✓".green(),
        games,
        genres,
        platforms,
        start.elapsed()
    );
    let catalog: Arc<dyn GameRepository> = index.clone();

    // Dispatch to appropriate command handler
    match cli.command {
        Commands::Train {
            min_games,
            skip_kmeans,
            skip_similarity,
            ..
        } => handle_train(catalog, config.engine, min_games, skip_kmeans, skip_similarity).await?,
        Commands::Recommend {
            game_id,
            limit,
            mode,
            seed,
        } => handle_recommend(catalog, &config.engine, game_id, limit, &mode, seed)?,
        Commands::Score { a, b } => handle_score(catalog, &config.engine, a, b)?,
        Commands::Clusters => handle_clusters(catalog, &config.engine),
        Commands::Models => handle_models(catalog, &config.engine)?,
        Commands::Search { name } => handle_search(&index, &name),
        Commands::Benchmark { requests, limit } => {
            handle_benchmark(catalog, &config.engine, requests, limit).await?
        }
    }

    Ok(())
}

/// Handle the 'train' command
async fn handle_train(
    catalog: Arc<dyn GameRepository>,
    mut config: EngineConfig,
    min_games: usize,
    skip_kmeans: bool,
    skip_similarity: bool,
) -> Result<()> {
    let games = catalog.list_all();
    if games.is_empty() {
        bail!("The catalog has no games; import games first");
    }

    let train_kmeans = if skip_kmeans {
        false
    } else if games.len() < min_games {
        println!(
            "{} Not enough games for clustering. Found: {}, minimum: {}",
            "!".yellow(),
            games.len(),
            min_games
        );
        false
    } else {
        // Don't create too many clusters
        config.n_clusters = config.n_clusters.min(games.len() / 2).max(1);
        true
    };

    let games = Arc::new(games);
    let start = Instant::now();

    // Both fits write disjoint artifacts, so they can run side by side
    let (kmeans_result, similarity_result) = tokio::join!(
        tokio::task::spawn_blocking({
            let mut engine = config.clustering_engine(catalog.clone());
            let games = games.clone();
            move || {
                if !train_kmeans {
                    return None;
                }
                let labels = engine.fit(&games);
                Some((labels, engine.model_info()))
            }
        }),
        tokio::task::spawn_blocking({
            let mut engine = config.similarity_engine(catalog.clone());
            let games = games.clone();
            move || (!skip_similarity).then(|| engine.fit(&games).size())
        })
    );

    let kmeans = kmeans_result.context("Clustering task panicked")?;
    let similarity = similarity_result.context("Similarity task panicked")?;
    info!(elapsed = ?start.elapsed(), "Training finished");

    if let Some((labels, model_info)) = kmeans {
        if labels.is_empty() {
            println!("{} Failed to train K-Means model", "✗".red());
        } else {
            let unique: std::collections::HashSet<_> = labels.iter().collect();
            println!(
                "{} K-Means model trained successfully with {} clusters",
                "✓".green(),
                unique.len()
            );
            if let Some(score) = model_info.silhouette_score {
                println!("  Silhouette Score: {:.3}", score);
            }

            // Smoke test: the model just written must load back
            let mut reloaded = config.clustering_engine(catalog.clone());
            if reloaded.load_model(config.kmeans_model_path.as_deref()) {
                println!("  {} Reloaded {:?}", "✓".green(), reloaded.model_info().source);
            } else {
                warn!("Trained clustering model could not be reloaded");
            }
        }
    }

    if let Some(size) = similarity {
        if size == 0 {
            println!("{} Failed to train cosine similarity model", "✗".red());
        } else {
            println!(
                "{} Cosine similarity model trained successfully with matrix shape: ({}, {})",
                "✓".green(),
                size,
                size
            );
        }
    }

    println!("Training completed in {:?}", start.elapsed());
    Ok(())
}

/// Handle the 'recommend' command
fn handle_recommend(
    catalog: Arc<dyn GameRepository>,
    config: &EngineConfig,
    game_id: GameId,
    limit: usize,
    mode: &str,
    seed: Option<u64>,
) -> Result<()> {
    let anchor = catalog
        .get(game_id)
        .ok_or_else(|| anyhow!("Game {} not found", game_id))?;

    let orchestrator = HybridOrchestrator::new(catalog, config);
    let recommendations = match seed {
        Some(seed) => {
            let mut rng = StdRng::seed_from_u64(seed);
            orchestrator.get_recommendations_with_rng(Some(game_id), limit, mode, &mut rng)
        }
        None => orchestrator.get_recommendations(Some(game_id), limit, mode),
    };

    println!(
        "{}",
        format!("Recommendations for '{}' ({}):", anchor.name, mode)
            .bold()
            .blue()
    );
    if recommendations.is_empty() {
        println!("  No recommendations available.");
    }
    print_games(&recommendations, |game| {
        let score = orchestrator.similarity().get_similarity_score(game_id, game.id);
        format!("similarity {:.3}", score)
    });
    Ok(())
}

/// Handle the 'score' command
fn handle_score(
    catalog: Arc<dyn GameRepository>,
    config: &EngineConfig,
    a: GameId,
    b: GameId,
) -> Result<()> {
    let first = catalog.get(a).ok_or_else(|| anyhow!("Game {} not found", a))?;
    let second = catalog.get(b).ok_or_else(|| anyhow!("Game {} not found", b))?;

    let mut engine = config.similarity_engine(catalog);
    if !engine.load_model(None) {
        bail!("No similarity model available; run `game-recs train` first");
    }
    println!(
        "{} <-> {}: {:.4}",
        first.name.bold(),
        second.name.bold(),
        engine.get_similarity_score(a, b)
    );
    Ok(())
}

/// Handle the 'clusters' command
fn handle_clusters(catalog: Arc<dyn GameRepository>, config: &EngineConfig) {
    let engine = config.clustering_engine(catalog);
    let clusters = engine.cluster_info();

    if clusters.is_empty() {
        println!("No cluster export found; run `game-recs train` first.");
        return;
    }
    println!("{}", "Clusters:".bold().blue());
    for cluster in clusters {
        let mean = cluster
            .mean_rating
            .map(|r| format!("{:.2}", r))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{} {} games, mean rating {}",
            format!("Cluster {}:", cluster.cluster).green(),
            cluster.size,
            mean
        );
        println!("   e.g. {}", cluster.sample_names.join(", "));
    }
}

/// Handle the 'models' command
fn handle_models(catalog: Arc<dyn GameRepository>, config: &EngineConfig) -> Result<()> {
    let orchestrator = HybridOrchestrator::new(catalog, config);

    let clustering = orchestrator.clustering().model_info();
    println!("{}", "Clustering model:".bold().blue());
    if clustering.loaded {
        println!("{}Source: {}", "• ".green(), clustering.source.unwrap_or_default());
        println!("{}Clusters: {}", "• ".green(), clustering.n_clusters);
        println!("{}Features: {}", "• ".green(), clustering.feature_columns.join(", "));
        println!(
            "{}Silhouette: {}",
            "• ".green(),
            clustering
                .silhouette_score
                .map(|s| format!("{:.3}", s))
                .unwrap_or_else(|| "-".to_string())
        );
        println!("{}Can predict: {}", "• ".green(), clustering.can_predict);
    } else {
        println!("{}not loaded", "• ".red());
    }
    println!(
        "{}Export: {}",
        "• ".cyan(),
        clustering.export_source.unwrap_or_else(|| "none".to_string())
    );

    let similarity = orchestrator.similarity().model_info();
    println!("{}", "Similarity model:".bold().blue());
    if similarity.loaded {
        println!("{}Source: {}", "• ".green(), similarity.source.unwrap_or_default());
        println!(
            "{}Shape: ({}, {})",
            "• ".green(),
            similarity.n_games,
            similarity.n_games
        );
        println!("{}Features: {}", "• ".green(), similarity.feature_columns.join(", "));
        if let (Some(avg), Some(min), Some(max)) = (
            similarity.avg_similarity,
            similarity.min_similarity,
            similarity.max_similarity,
        ) {
            println!(
                "{}Similarity avg {:.3}, min {:.3}, max {:.3}",
                "• ".cyan(),
                avg,
                min,
                max
            );
        }
    } else {
        println!("{}not loaded", "• ".red());
    }
    Ok(())
}

/// Handle the 'search' command
fn handle_search(index: &CatalogIndex, name: &str) {
    let matches = index.search_by_name(name);
    let needle = name.trim().to_lowercase();

    // Exact match first, then by rating
    let mut ranked: Vec<&Game> = matches;
    ranked.sort_by(|a, b| {
        let a_exact = a.name.to_lowercase() != needle;
        let b_exact = b.name.to_lowercase() != needle;
        a_exact
            .cmp(&b_exact)
            .then_with(|| b.rating_or_zero().total_cmp(&a.rating_or_zero()))
    });

    println!("{}", format!("Search results for '{}':", name).bold().blue());
    for game in ranked.iter().take(20) {
        println!(
            "{}: {} [{}] {} rated {}",
            game.id,
            game.name,
            game.genres.join(", "),
            game.primary_platform(),
            game.rating
                .map(|r| format!("{:.1}", r))
                .unwrap_or_else(|| "-".to_string())
        );
    }
}

/// Handle the 'benchmark' command
async fn handle_benchmark(
    catalog: Arc<dyn GameRepository>,
    config: &EngineConfig,
    requests: usize,
    limit: usize,
) -> Result<()> {
    if requests == 0 {
        bail!("--requests must be at least 1");
    }
    let ids: Vec<GameId> = catalog.list_all().iter().map(|g| g.id).collect();
    if ids.is_empty() {
        bail!("The catalog has no games to benchmark with");
    }

    let orchestrator = Arc::new(HybridOrchestrator::new(catalog, config));

    // Pick random anchors
    let mut rng = StdRng::from_os_rng();
    let anchors: Vec<GameId> = (0..requests)
        .filter_map(|_| ids.choose(&mut rng).copied())
        .collect();

    let wall = Instant::now();
    let mut handles = vec![];
    for anchor in anchors {
        let orchestrator = orchestrator.clone();
        handles.push(tokio::task::spawn_blocking(move || {
            let start = Instant::now();
            let games = orchestrator.get_recommendations(Some(anchor), limit, "hybrid");
            (start.elapsed(), games.len())
        }));
    }

    // Wait for all tasks to complete and collect timings
    let mut timings: Vec<Duration> = Vec::with_capacity(handles.len());
    let mut empty = 0usize;
    for handle in handles {
        let (elapsed, returned) = handle.await.context("Benchmark task panicked")?;
        if returned == 0 {
            empty += 1;
        }
        timings.push(elapsed);
    }
    let total_time = wall.elapsed();

    let latency_sum: Duration = timings.iter().sum();
    let avg_latency = latency_sum / (timings.len() as u32);
    timings.sort();
    let p50 = timings[timings.len() / 2];
    let p95 = timings[(timings.len() as f32 * 0.95) as usize];
    let p99 = timings[(timings.len() as f32 * 0.99) as usize];
    let throughput = requests as f32 / total_time.as_secs_f32();

    println!("{}", "Benchmark results:".bold().blue());
    println!("Total time: {:?}", total_time);
    println!("Average latency: {:?}", avg_latency);
    println!("P50 latency: {:?}", p50);
    println!("P95 latency: {:?}", p95);
    println!("P99 latency: {:?}", p99);
    println!("Throughput: {:.2} requests/second", throughput);
    if empty > 0 {
        println!("{} {} requests returned no recommendations", "!".yellow(), empty);
    }

    Ok(())
}

/// Print a numbered list of games with a per-game detail column
fn print_games(games: &[Game], detail: impl Fn(&Game) -> String) {
    for (rank, game) in games.iter().enumerate() {
        println!(
            "{}. {} [{}] {} rated {} - {}",
            (rank + 1).to_string().green(),
            game.name,
            game.primary_genre(),
            game.primary_platform(),
            game.rating
                .map(|r| format!("{:.1}", r))
                .unwrap_or_else(|| "-".to_string()),
            detail(game)
        );
    }
}
