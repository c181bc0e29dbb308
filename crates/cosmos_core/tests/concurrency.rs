use cosmos_core::db::initialize_schema;
use cosmos_core::resources::schema_registry;
use cosmos_core::{
    DatasetCreate, DatasetRepository, DatasetUpdate, Environment, SessionFactory, StoreConfig,
};
use std::collections::HashSet;
use std::thread;

const THREADS: usize = 4;
const CREATES_PER_THREAD: usize = 10;
const MEMORY_ROUNDS: usize = 50;

fn file_repo(dir: &tempfile::TempDir) -> DatasetRepository {
    let sessions = SessionFactory::open(&StoreConfig::file(dir.path().join("cosmos.db"))).unwrap();
    initialize_schema(&sessions, &schema_registry(), Environment::Dev).unwrap();
    DatasetRepository::try_new(sessions).unwrap()
}

#[test]
fn concurrent_creates_from_many_threads_all_persist() {
    let dir = tempfile::tempdir().unwrap();
    let repo = file_repo(&dir);

    let handles: Vec<_> = (0..THREADS)
        .map(|worker| {
            let repo = repo.clone();
            thread::spawn(move || {
                (0..CREATES_PER_THREAD)
                    .map(|index| {
                        repo.create(DatasetCreate::new(format!("w{worker}-{index}")))
                            .unwrap()
                            .meta
                            .id
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut ids = HashSet::new();
    for handle in handles {
        ids.extend(handle.join().unwrap());
    }

    assert_eq!(ids.len(), THREADS * CREATES_PER_THREAD);
    assert_eq!(repo.list(1_000, 0).unwrap().len(), THREADS * CREATES_PER_THREAD);
}

#[test]
fn concurrent_updates_to_one_record_last_commit_wins() {
    let dir = tempfile::tempdir().unwrap();
    let repo = file_repo(&dir);
    let created = repo.create(DatasetCreate::new("contended")).unwrap();
    let id = created.meta.id;

    let handles: Vec<_> = (0..THREADS)
        .map(|worker| {
            let repo = repo.clone();
            thread::spawn(move || {
                repo.update(id, DatasetUpdate::new(format!("writer-{worker}")))
                    .unwrap()
            })
        })
        .collect();

    let results: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();

    let latest = results
        .iter()
        .max_by_key(|dataset| dataset.meta.updated_at)
        .unwrap();
    let stored = repo.get(id).unwrap();

    assert_eq!(&stored, latest);
    assert!(stored.meta.updated_at > created.meta.updated_at);
    let distinct: HashSet<i64> = results.iter().map(|d| d.meta.updated_at).collect();
    assert_eq!(distinct.len(), THREADS);
}

#[test]
fn memory_store_serves_overlapping_create_update_get() {
    let sessions = SessionFactory::in_memory().unwrap();
    initialize_schema(&sessions, &schema_registry(), Environment::Dev).unwrap();
    let repo = DatasetRepository::try_new(sessions).unwrap();

    let handles: Vec<_> = (0..THREADS)
        .map(|worker| {
            let repo = repo.clone();
            thread::spawn(move || {
                for round in 0..MEMORY_ROUNDS {
                    let created = repo
                        .create(DatasetCreate::new(format!("m{worker}-{round}")))
                        .unwrap();
                    let renamed = format!("m{worker}-{round}-renamed");
                    repo.update(created.meta.id, DatasetUpdate::new(renamed.clone()))
                        .unwrap();
                    assert_eq!(repo.get(created.meta.id).unwrap().name, renamed);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(
        repo.list(1_000, 0).unwrap().len(),
        THREADS * MEMORY_ROUNDS
    );
}
