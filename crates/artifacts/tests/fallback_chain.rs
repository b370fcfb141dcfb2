//! End-to-end loader chain behavior against real files.

use artifacts::{
    ArtifactError, ArtifactStore, DenseMatrix, LoadStrategy, LoaderChain, read_envelope,
    read_matrix, write_envelope, write_matrix,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Model {
    clusters: usize,
}

struct Enveloped(&'static str);

impl LoadStrategy<Model> for Enveloped {
    fn name(&self) -> &str {
        self.0
    }

    fn load(&self, store: &ArtifactStore) -> artifacts::Result<Model> {
        Ok(read_envelope(store, self.0, "kmeans")?.payload)
    }
}

struct Bare(&'static str);

impl LoadStrategy<Model> for Bare {
    fn name(&self) -> &str {
        self.0
    }

    fn load(&self, store: &ArtifactStore) -> artifacts::Result<Model> {
        store.read_json(self.0)
    }
}

fn chain() -> LoaderChain<Model> {
    LoaderChain::new("kmeans")
        .add_strategy(Enveloped("current.json"))
        .add_strategy(Bare("legacy.json"))
}

#[test]
fn test_current_artifact_preferred() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path());
    write_envelope(&store, "current.json", "kmeans", &Model { clusters: 5 }).unwrap();
    store.write_json("legacy.json", &Model { clusters: 3 }).unwrap();

    let loaded = chain().load_first(&store).unwrap();
    assert_eq!(loaded.value, Model { clusters: 5 });
    assert_eq!(loaded.source, "current.json");
}

#[test]
fn test_corrupt_current_falls_back_to_legacy() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path());
    store.write("current.json", b"{\"format_version\": 2, \"ki").unwrap();
    store.write_json("legacy.json", &Model { clusters: 3 }).unwrap();

    let loaded = chain().load_first(&store).unwrap();
    assert_eq!(loaded.value, Model { clusters: 3 });
    assert_eq!(loaded.source, "legacy.json");
}

#[test]
fn test_nothing_loadable() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path());
    store.write("legacy.json", b"[1, 2, 3]").unwrap();

    let err = chain().load_first(&store).unwrap_err();
    assert!(matches!(err, ArtifactError::Exhausted { attempts: 2, .. }));
}

#[test]
fn test_matrix_file_round_trip_through_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path());
    let m = DenseMatrix::from_rows(vec![vec![1.0, 0.2], vec![0.2, 1.0]]).unwrap();

    write_matrix(&store, "m.bin", &m).unwrap();
    assert_eq!(read_matrix(&store, "m.bin").unwrap(), m);
    assert!(read_matrix(&store, "absent.bin").unwrap_err().is_not_found());
}
