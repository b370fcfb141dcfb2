//! Clustering engine against real artifact directories.

use artifacts::ArtifactStore;
use artifacts::names::{CLUSTER_EXPORT, KMEANS_MODEL, KMEANS_MODEL_LEGACY};
use catalog::{CatalogIndex, DelimitedTable, Game, GameId, GameRepository};
use engines::ClusteringEngine;
use std::sync::Arc;

fn create_test_games() -> Vec<Game> {
    let specs: [(GameId, &str, f32, &str, &str, &str); 12] = [
        (1, "Halo", 4.5, "Shooter", "Xbox", "Mature"),
        (2, "Doom", 4.0, "Shooter", "PC", "Mature"),
        (3, "Quake", 3.0, "Shooter", "PC", "Mature"),
        (4, "Tetris", 4.8, "Puzzle", "NES", "Everyone"),
        (5, "Portal", 4.7, "Puzzle", "PC", "Teen"),
        (6, "Lumines", 3.9, "Puzzle", "PSP", "Everyone"),
        (7, "Forza", 4.1, "Racing", "Xbox", "Everyone"),
        (8, "Gran Turismo", 4.2, "Racing", "PlayStation", "Everyone"),
        (9, "Burnout", 3.7, "Racing", "PlayStation", "Teen"),
        (10, "Skyrim", 4.6, "RPG", "PC", "Mature"),
        (11, "Chrono Trigger", 4.9, "RPG", "SNES", "Everyone"),
        (12, "Fable", 3.5, "RPG", "Xbox", "Teen"),
    ];
    specs
        .iter()
        .map(|&(id, name, rating, genre, platform, esrb)| {
            Game::new(id, name)
                .with_rating(rating)
                .with_genres(&[genre])
                .with_platforms(&[platform])
                .with_esrb(esrb)
        })
        .collect()
}

fn create_test_catalog() -> Arc<dyn GameRepository> {
    Arc::new(CatalogIndex::from_games(create_test_games()))
}

fn engine_in(dir: &std::path::Path) -> ClusteringEngine {
    ClusteringEngine::new(create_test_catalog(), ArtifactStore::new(dir)).with_n_clusters(3)
}

#[test]
fn test_fit_labels_every_game_and_persists() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = engine_in(dir.path());
    let games = create_test_games();

    let labels = engine.fit(&games);

    assert_eq!(labels.len(), games.len());
    assert!(labels.iter().all(|&l| l < 3));
    assert!(dir.path().join(KMEANS_MODEL).is_file());
    assert!(dir.path().join(CLUSTER_EXPORT).is_file());

    let info = engine.model_info();
    assert!(info.loaded);
    assert!(info.can_predict);
    assert_eq!(info.n_clusters, 3);
    assert!((-1.0..=1.0).contains(&info.silhouette_score.unwrap()));
}

#[test]
fn test_fit_replaces_export_without_leftovers() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = engine_in(dir.path());
    let games = create_test_games();
    let labels = engine.fit(&games);

    assert!(!dir.path().join(format!(".{CLUSTER_EXPORT}.tmp")).exists());

    let table = DelimitedTable::read(&dir.path().join(CLUSTER_EXPORT)).unwrap();
    assert_eq!(table.len(), games.len());
    assert!(table.column(&["db_id"]).is_some());

    // A fresh engine sees the same clusters through the written export
    let fresh = engine_in(dir.path());
    let total: usize = fresh.cluster_info().iter().map(|c| c.size).sum();
    assert_eq!(total, labels.len());
    let anchor = &games[4];
    let ids = |recs: Vec<Game>| recs.iter().map(|g| g.id).collect::<Vec<_>>();
    assert_eq!(
        ids(fresh.get_cluster_recommendations(anchor, 5)),
        ids(engine.get_cluster_recommendations(anchor, 5))
    );
}

#[test]
fn test_oversized_n_returns_whole_cluster() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = engine_in(dir.path());
    let games = create_test_games();
    let labels = engine.fit(&games);

    let anchor = &games[0];
    let cluster_size = labels.iter().filter(|&&l| l == labels[0]).count();
    for n in [games.len() * 10, usize::MAX] {
        let recs = engine.get_cluster_recommendations(anchor, n);
        assert_eq!(recs.len(), cluster_size - 1);
        assert!(engine.try_cluster_recommendations(anchor, n).is_ok());
    }
}

#[test]
fn test_fit_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = engine_in(dir.path());
    let games = create_test_games();

    let first = engine.fit(&games);
    let first_model = engine.model().cloned().unwrap();
    let second = engine.fit(&games);
    let second_model = engine.model().cloned().unwrap();

    assert_eq!(first, second);
    assert_eq!(first_model.n_clusters, second_model.n_clusters);
    assert_eq!(first_model.kmeans, second_model.kmeans);
}

#[test]
fn test_fit_without_games_returns_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = engine_in(dir.path());

    assert!(engine.fit(&[]).is_empty());
    assert!(!engine.is_loaded());
    assert!(!dir.path().join(KMEANS_MODEL).exists());
}

#[test]
fn test_predict_reuses_training_space() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = engine_in(dir.path());
    let games = create_test_games();
    let labels = engine.fit(&games);

    assert_eq!(engine.predict(&games), labels);

    // A genre never seen at training cannot be mapped
    let stranger = Game::new(99, "Flight Sim")
        .with_rating(4.0)
        .with_genres(&["Simulation"])
        .with_platforms(&["PC"])
        .with_esrb("Everyone");
    assert!(engine.predict(&[stranger]).is_empty());
}

#[test]
fn test_recommendations_after_fit_exclude_anchor() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = engine_in(dir.path());
    let games = create_test_games();
    let labels = engine.fit(&games);

    let anchor = &games[0];
    let recs = engine.get_cluster_recommendations(anchor, 20);

    let expected = labels.iter().filter(|&&l| l == labels[0]).count() - 1;
    assert_eq!(recs.len(), expected);
    assert!(recs.iter().all(|g| g.id != anchor.id));
    for pair in recs.windows(2) {
        assert!(pair[0].rating >= pair[1].rating);
    }
    for game in &recs {
        let pos = games.iter().position(|g| g.id == game.id).unwrap();
        assert_eq!(labels[pos], labels[0]);
    }
}

#[test]
fn test_cluster_recommendations_ordered_by_rating() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path());
    store
        .write(
            CLUSTER_EXPORT,
            b"db_id,name,rating,Cluster\n3,Quake,3.0,0\n1,Halo,4.5,0\n2,Doom,4.0,0\n4,Tetris,4.8,1\n",
        )
        .unwrap();
    let catalog = create_test_catalog();
    let engine = ClusteringEngine::new(catalog.clone(), store);

    let halo = catalog.get(1).unwrap();
    let names: Vec<String> = engine
        .get_cluster_recommendations(&halo, 2)
        .into_iter()
        .map(|g| g.name)
        .collect();
    assert_eq!(names, vec!["Doom", "Quake"]);

    // Tetris is alone in its cluster
    let tetris = catalog.get(4).unwrap();
    assert!(engine.get_cluster_recommendations(&tetris, 5).is_empty());
}

#[test]
fn test_name_keyed_export_fallback() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path());
    store
        .write(
            "games_clustered.csv",
            b"Name,Rating,Cluster\nHalo,4.5,0\nDoom,4.0,0\nQuake,3.0,0\n",
        )
        .unwrap();
    let catalog = create_test_catalog();
    let engine = ClusteringEngine::new(catalog.clone(), store);

    let halo = catalog.get(1).unwrap();
    let ids: Vec<GameId> = engine
        .get_cluster_recommendations(&halo, 2)
        .iter()
        .map(|g| g.id)
        .collect();
    assert_eq!(ids, vec![2, 3]);
    assert_eq!(
        engine.model_info().export_source.as_deref(),
        Some("games_clustered.csv")
    );
}

#[test]
fn test_name_keyed_export_never_resolves_to_anchor() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path());
    store
        .write(
            "games_clustered.csv",
            b"Name,Rating,Cluster\nHalo,4.5,0\nhalo,4.9,0\nDoom,4.0,0\nDOOM,3.9,0\nQuake,3.0,0\n",
        )
        .unwrap();
    let catalog = create_test_catalog();
    let engine = ClusteringEngine::new(catalog.clone(), store);

    let halo = catalog.get(1).unwrap();
    let ids: Vec<GameId> = engine
        .get_cluster_recommendations(&halo, 3)
        .iter()
        .map(|g| g.id)
        .collect();
    assert_eq!(ids, vec![2, 3]);
}

#[test]
fn test_anchor_missing_from_export() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path());
    store
        .write(CLUSTER_EXPORT, b"db_id,name,rating,Cluster\n1,Halo,4.5,0\n2,Doom,4.0,0\n")
        .unwrap();
    let catalog = create_test_catalog();
    let engine = ClusteringEngine::new(catalog.clone(), store);

    let skyrim = catalog.get(10).unwrap();
    assert!(engine.get_cluster_recommendations(&skyrim, 3).is_empty());
    assert!(engine.try_cluster_recommendations(&skyrim, 3).unwrap().is_empty());
}

#[test]
fn test_cluster_info_from_export() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path());
    store
        .write(
            CLUSTER_EXPORT,
            b"db_id,name,rating,Cluster\n1,Halo,4.5,0\n2,Doom,3.5,0\n4,Tetris,4.8,1\n",
        )
        .unwrap();
    let engine = ClusteringEngine::new(create_test_catalog(), store);

    let info = engine.cluster_info();
    assert_eq!(info.len(), 2);
    assert_eq!(info[0].size, 2);
    assert_eq!(info[0].mean_rating, Some(4.0));
    assert_eq!(info[1].sample_names, vec!["Tetris"]);
}

#[test]
fn test_load_model_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let games = create_test_games();
    let mut trained = engine_in(dir.path());
    let labels = trained.fit(&games);

    let mut fresh = engine_in(dir.path());
    assert!(fresh.load_model(None));

    let info = fresh.model_info();
    assert_eq!(info.source.as_deref(), Some(KMEANS_MODEL));
    assert!(info.can_predict);
    assert!(info.trained_at.is_some());
    assert_eq!(info.n_clusters, trained.model_info().n_clusters);
    assert_eq!(fresh.predict(&games), labels);
}

#[test]
fn test_load_bare_legacy_model() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path());
    store
        .write(
            KMEANS_MODEL_LEGACY,
            br#"{"centroids": [[0.0, 0.0, 0.0, 0.0], [1.0, 1.0, 1.0, 1.0]]}"#,
        )
        .unwrap();
    let mut engine = ClusteringEngine::new(create_test_catalog(), store);

    assert!(engine.load_model(None));
    let info = engine.model_info();
    assert_eq!(info.source.as_deref(), Some(KMEANS_MODEL_LEGACY));
    assert_eq!(info.n_clusters, 2);
    assert!(!info.can_predict);
    assert!(engine.predict(&create_test_games()).is_empty());
}

#[test]
fn test_newer_format_falls_back_to_legacy_bundle() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path());
    store
        .write(
            KMEANS_MODEL,
            br#"{"format_version": 99, "kind": "kmeans", "trained_at": 0, "payload": {}}"#,
        )
        .unwrap();
    store
        .write(
            KMEANS_MODEL_LEGACY,
            br#"{"kmeans_model": {"centroids": [[0.5, 0.5, 0.5, 0.5]]}, "n_clusters": 1, "silhouette_score": 0.0}"#,
        )
        .unwrap();
    let mut engine = ClusteringEngine::new(create_test_catalog(), store);

    assert!(engine.load_model(None));
    let info = engine.model_info();
    assert_eq!(info.source.as_deref(), Some(KMEANS_MODEL_LEGACY));
    assert_eq!(info.feature_columns.len(), 4);
}

#[test]
fn test_load_model_from_explicit_path() {
    let dir = tempfile::tempdir().unwrap();
    let elsewhere = tempfile::tempdir().unwrap();
    let path = elsewhere.path().join("old_model.json");
    std::fs::write(&path, br#"{"centroids": [[1.0, 2.0, 3.0, 4.0]]}"#).unwrap();

    let mut engine = ClusteringEngine::new(create_test_catalog(), ArtifactStore::new(dir.path()));
    assert!(engine.load_model(path.to_str()));
    assert_eq!(engine.model_info().n_clusters, 1);
}

#[test]
fn test_corrupt_artifacts_yield_false() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path());
    store.write(KMEANS_MODEL, b"{\"format_version\": 2, \"ki").unwrap();
    store.write(KMEANS_MODEL_LEGACY, b"[1, 2, 3]").unwrap();
    let mut engine = ClusteringEngine::new(create_test_catalog(), store);

    assert!(!engine.load_model(None));
    assert!(!engine.is_loaded());
}
