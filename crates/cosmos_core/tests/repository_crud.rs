use cosmos_core::db::initialize_schema;
use cosmos_core::resources::schema_registry;
use cosmos_core::{
    DatasetCreate, DatasetRepository, DatasetUpdate, DbError, Environment, RepoError,
    SessionFactory,
};
use rusqlite::TransactionBehavior;
use std::collections::HashSet;
use uuid::Uuid;

fn dataset_repo() -> (SessionFactory, DatasetRepository) {
    let sessions = SessionFactory::in_memory().unwrap();
    initialize_schema(&sessions, &schema_registry(), Environment::Dev).unwrap();
    let repo = DatasetRepository::try_new(sessions.clone()).unwrap();
    (sessions, repo)
}

fn described(name: &str, description: &str) -> DatasetCreate {
    DatasetCreate {
        name: name.to_string(),
        description: Some(description.to_string()),
    }
}

#[test]
fn create_assigns_identity_and_equal_timestamps() {
    let (_sessions, repo) = dataset_repo();

    let created = repo.create(DatasetCreate::new("x")).unwrap();

    assert!(!created.meta.id.is_nil());
    assert_eq!(created.meta.created_at, created.meta.updated_at);
    assert_eq!(created.name, "x");
    assert_eq!(created.description, None);
}

#[test]
fn create_then_get_returns_same_model() {
    let (_sessions, repo) = dataset_repo();

    let created = repo.create(described("weather", "hourly readings")).unwrap();
    let loaded = repo.get(created.meta.id).unwrap();

    assert_eq!(loaded, created);
}

#[test]
fn unknown_id_fails_with_not_found_for_every_lookup() {
    let (_sessions, repo) = dataset_repo();
    repo.create(DatasetCreate::new("present")).unwrap();
    let missing = Uuid::new_v4();

    let errors = [
        repo.get(missing).unwrap_err(),
        repo.update(missing, DatasetUpdate::new("y")).unwrap_err(),
        repo.delete(missing).unwrap_err(),
    ];

    for err in errors {
        match err {
            RepoError::NotFound(not_found) => {
                assert_eq!(not_found.kind, "Dataset");
                assert_eq!(not_found.id, missing);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}

#[test]
fn delete_then_lookups_fail_with_not_found() {
    let (_sessions, repo) = dataset_repo();
    let created = repo.create(DatasetCreate::new("short lived")).unwrap();
    let id = created.meta.id;

    repo.delete(id).unwrap();

    assert!(matches!(repo.get(id), Err(RepoError::NotFound(err)) if err.id == id));
    assert!(matches!(repo.delete(id), Err(RepoError::NotFound(err)) if err.id == id));
    assert!(matches!(
        repo.update(id, DatasetUpdate::new("again")),
        Err(RepoError::NotFound(err)) if err.id == id
    ));
}

#[test]
fn update_replaces_fields_and_advances_updated_at() {
    let (_sessions, repo) = dataset_repo();
    let created = repo.create(described("draft", "first version")).unwrap();

    let updated = repo
        .update(
            created.meta.id,
            DatasetUpdate {
                name: "final".to_string(),
                description: Some("second version".to_string()),
            },
        )
        .unwrap();
    let loaded = repo.get(created.meta.id).unwrap();

    assert_eq!(loaded, updated);
    assert_eq!(loaded.name, "final");
    assert_eq!(loaded.description.as_deref(), Some("second version"));
    assert_eq!(loaded.meta.id, created.meta.id);
    assert_eq!(loaded.meta.created_at, created.meta.created_at);
    assert!(loaded.meta.updated_at > created.meta.updated_at);
}

#[test]
fn update_is_full_replacement_not_a_merge() {
    let (_sessions, repo) = dataset_repo();
    let created = repo.create(described("keep", "will be cleared")).unwrap();

    let updated = repo
        .update(created.meta.id, DatasetUpdate::new("keep"))
        .unwrap();

    assert_eq!(updated.name, "keep");
    assert_eq!(updated.description, None);
}

#[test]
fn repeated_updates_keep_advancing_updated_at() {
    let (_sessions, repo) = dataset_repo();
    let created = repo.create(DatasetCreate::new("v0")).unwrap();

    let mut previous = created.meta.updated_at;
    for round in 1..=5 {
        let updated = repo
            .update(created.meta.id, DatasetUpdate::new(format!("v{round}")))
            .unwrap();
        assert!(updated.meta.updated_at > previous);
        previous = updated.meta.updated_at;
    }
}

#[test]
fn list_respects_limit_and_offset_in_insertion_order() {
    let (_sessions, repo) = dataset_repo();
    let ids: Vec<Uuid> = ["a", "b", "c", "d"]
        .iter()
        .map(|name| repo.create(DatasetCreate::new(*name)).unwrap().meta.id)
        .collect();

    let first_two = repo.list(2, 0).unwrap();
    assert_eq!(first_two.len(), 2);
    assert_eq!(first_two[0].meta.id, ids[0]);
    assert_eq!(first_two[1].meta.id, ids[1]);

    let tail = repo.list(10, 3).unwrap();
    assert_eq!(tail.len(), 1);
    assert_eq!(tail[0].meta.id, ids[3]);

    let all: HashSet<Uuid> = repo
        .list(100, 0)
        .unwrap()
        .into_iter()
        .map(|dataset| dataset.meta.id)
        .collect();
    assert_eq!(all, ids.iter().copied().collect::<HashSet<_>>());
}

#[test]
fn list_never_errors_on_empty_or_exhausted_ranges() {
    let (_sessions, repo) = dataset_repo();
    assert!(repo.list(100, 0).unwrap().is_empty());

    repo.create(DatasetCreate::new("only")).unwrap();
    assert!(repo.list(100, 1).unwrap().is_empty());
    assert!(repo.list(100, 1_000).unwrap().is_empty());
    assert!(repo.list(0, 0).unwrap().is_empty());
}

#[test]
fn create_update_delete_scenario() {
    let (_sessions, repo) = dataset_repo();

    let a = repo.create(DatasetCreate::new("x")).unwrap();
    assert_eq!(a.meta.created_at, a.meta.updated_at);

    repo.update(a.meta.id, DatasetUpdate::new("y")).unwrap();
    let after_update = repo.get(a.meta.id).unwrap();
    assert_eq!(after_update.name, "y");
    assert!(after_update.meta.updated_at > after_update.meta.created_at);

    repo.delete(a.meta.id).unwrap();
    let err = repo.get(a.meta.id).unwrap_err();
    assert_eq!(err.to_string(), format!("Dataset '{}' not found.", a.meta.id));

    let first = repo.create(DatasetCreate::new("first")).unwrap();
    repo.create(DatasetCreate::new("second")).unwrap();
    let page = repo.list(1, 0).unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].meta.id, first.meta.id);
}

#[test]
fn store_failure_propagates_unchanged_and_rolls_back() {
    let sessions = SessionFactory::in_memory().unwrap();
    sessions
        .scope(TransactionBehavior::Immediate, |session| -> Result<(), DbError> {
            session.conn().execute_batch(
                "CREATE TABLE datasets (
                    id TEXT PRIMARY KEY NOT NULL,
                    created_at INTEGER NOT NULL,
                    updated_at INTEGER NOT NULL,
                    name TEXT NOT NULL CHECK (length(name) <= 5),
                    description TEXT
                );",
            )?;
            session.commit()
        })
        .unwrap();
    let repo = DatasetRepository::try_new(sessions).unwrap();

    let err = repo.create(DatasetCreate::new("far too long")).unwrap_err();
    assert!(matches!(err, RepoError::Db(DbError::Sqlite(_))));
    assert!(repo.list(100, 0).unwrap().is_empty());

    let kept = repo.create(DatasetCreate::new("short")).unwrap();
    let err = repo
        .update(kept.meta.id, DatasetUpdate::new("far too long"))
        .unwrap_err();
    assert!(matches!(err, RepoError::Db(_)));
    assert_eq!(repo.get(kept.meta.id).unwrap(), kept);
}

#[test]
fn update_whose_row_vanishes_before_commit_persists_nothing() {
    let (sessions, repo) = dataset_repo();
    let created = repo.create(DatasetCreate::new("kept")).unwrap();
    sessions
        .scope(TransactionBehavior::Immediate, |session| -> Result<(), DbError> {
            session.conn().execute_batch(
                "CREATE TRIGGER drop_renamed AFTER UPDATE ON datasets
                 WHEN NEW.name = 'renamed'
                 BEGIN DELETE FROM datasets WHERE id = NEW.id; END;",
            )?;
            session.commit()
        })
        .unwrap();

    let err = repo
        .update(created.meta.id, DatasetUpdate::new("renamed"))
        .unwrap_err();

    assert_eq!(err.as_not_found().unwrap().id, created.meta.id);
    assert_eq!(repo.get(created.meta.id).unwrap(), created);
}

#[test]
fn corrupt_persisted_id_is_reported_as_invalid_data() {
    let (sessions, repo) = dataset_repo();
    sessions
        .scope(TransactionBehavior::Immediate, |session| -> Result<(), DbError> {
            session.conn().execute(
                "INSERT INTO datasets (id, created_at, updated_at, name) VALUES ('not-a-uuid', 1, 1, 'bad');",
                [],
            )?;
            session.commit()
        })
        .unwrap();

    let err = repo.list(100, 0).unwrap_err();
    assert!(matches!(err, RepoError::InvalidData(message) if message.contains("not-a-uuid")));
}

#[test]
fn repository_rejects_store_without_table() {
    let sessions = SessionFactory::in_memory().unwrap();

    let result = DatasetRepository::try_new(sessions);
    assert!(matches!(
        result,
        Err(RepoError::MissingRequiredTable("datasets"))
    ));
}

#[test]
fn repository_rejects_table_missing_a_column() {
    let sessions = SessionFactory::in_memory().unwrap();
    sessions
        .scope(TransactionBehavior::Immediate, |session| -> Result<(), DbError> {
            session.conn().execute_batch(
                "CREATE TABLE datasets (
                    id TEXT PRIMARY KEY NOT NULL,
                    created_at INTEGER NOT NULL,
                    updated_at INTEGER NOT NULL,
                    name TEXT NOT NULL
                );",
            )?;
            session.commit()
        })
        .unwrap();

    let result = DatasetRepository::try_new(sessions);
    assert!(matches!(
        result,
        Err(RepoError::MissingRequiredColumn {
            table: "datasets",
            column: "description"
        })
    ));
}

#[test]
fn repository_calls_return_connections_to_the_pool() {
    let (sessions, repo) = dataset_repo();
    let created = repo.create(DatasetCreate::new("pooled")).unwrap();
    let idle_after_create = sessions.idle_connections();

    for _ in 0..10 {
        repo.get(created.meta.id).unwrap();
        let _ = repo.get(Uuid::new_v4());
    }

    assert_eq!(sessions.idle_connections(), idle_after_create);
}
