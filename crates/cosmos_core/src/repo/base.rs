//! Generic CRUD repository over one storage-record type.
//!
//! # Responsibility
//! - Run create/get/list/update/delete against `R::TABLE`, one session
//!   scope per call.
//! - Convert records to the in-memory model `M` on the way out.
//! - Centralize the not-found check for every id lookup.
//!
//! # Invariants
//! - Writes commit exactly once, after the written row is read back;
//!   failures roll back through the scope.
//! - `id` and `created_at` are never rewritten by `update`.
//! - `update` strictly advances `updated_at`.
//! - The repository never logs; callers own observability.

use super::error::{RepoError, RepoResult};
use crate::db::record::{select_columns, RecordMeta, StorageRecord, META_COLUMNS};
use crate::db::schema::table_columns;
use crate::db::{Session, SessionFactory};
use crate::model::base::{CreateInput, UpdateInput};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Row, TransactionBehavior};
use std::marker::PhantomData;
use uuid::Uuid;

/// Page size used when the caller does not supply one.
pub const DEFAULT_LIST_LIMIT: u32 = 100;

/// Pagination window for `list`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListParams {
    pub limit: u32,
    pub offset: u32,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIST_LIMIT,
            offset: 0,
        }
    }
}

/// Resource-agnostic CRUD contract consumed by the service layer.
pub trait Crud {
    /// Resource kind, as reported in not-found errors.
    const KIND: &'static str;

    type Model;
    type Create;
    type Update;

    fn create(&self, input: Self::Create) -> RepoResult<Self::Model>;
    fn get(&self, id: Uuid) -> RepoResult<Self::Model>;
    fn list(&self, limit: u32, offset: u32) -> RepoResult<Vec<Self::Model>>;
    fn update(&self, id: Uuid, input: Self::Update) -> RepoResult<Self::Model>;
    fn delete(&self, id: Uuid) -> RepoResult<()>;
}

/// Repository binding a model `M`, record `R`, create input `C` and update
/// input `U`.
///
/// Holds only the session factory, so it is cheap to clone and safe to
/// share across threads.
pub struct Repository<M, R, C, U> {
    sessions: SessionFactory,
    _types: PhantomData<fn() -> (M, R, C, U)>,
}

impl<M, R, C, U> Clone for Repository<M, R, C, U> {
    fn clone(&self) -> Self {
        Self {
            sessions: self.sessions.clone(),
            _types: PhantomData,
        }
    }
}

impl<M, R, C, U> Repository<M, R, C, U>
where
    R: StorageRecord,
    M: From<R>,
    C: CreateInput<R>,
    U: UpdateInput<R>,
{
    /// Constructs a repository after checking that `R::TABLE` and all of
    /// its columns exist.
    pub fn try_new(sessions: SessionFactory) -> RepoResult<Self> {
        sessions.scope(TransactionBehavior::Deferred, |session| -> RepoResult<()> {
            ensure_table_ready::<R>(session)
        })?;

        Ok(Self {
            sessions,
            _types: PhantomData,
        })
    }

    /// Inserts a new record built from `input` and returns its model.
    ///
    /// Identity and timestamps are assigned here, never taken from input.
    pub fn create(&self, input: C) -> RepoResult<M> {
        self.sessions
            .scope(TransactionBehavior::Immediate, |session| -> RepoResult<M> {
                let record = self.insert(session, input)?;
                let reloaded = self.get_by_id(session, record.meta().id)?;
                session.commit()?;
                Ok(M::from(reloaded))
            })
    }

    /// Returns the model for `id`, or `NotFound`.
    pub fn get(&self, id: Uuid) -> RepoResult<M> {
        self.sessions
            .scope(TransactionBehavior::Deferred, |session| -> RepoResult<M> {
                Ok(M::from(self.get_by_id(session, id)?))
            })
    }

    /// Returns at most `limit` models after skipping `offset`, in insertion
    /// order. An offset past the end yields an empty list.
    pub fn list(&self, limit: u32, offset: u32) -> RepoResult<Vec<M>> {
        self.sessions
            .scope(TransactionBehavior::Deferred, |session| -> RepoResult<Vec<M>> {
                let sql = format!(
                    "SELECT {} FROM {} ORDER BY rowid LIMIT ?1 OFFSET ?2;",
                    select_columns::<R>(),
                    R::TABLE
                );
                let mut stmt = session.conn().prepare(&sql)?;
                let mut rows = stmt.query(params![i64::from(limit), i64::from(offset)])?;
                let mut models = Vec::new();

                while let Some(row) = rows.next()? {
                    models.push(M::from(parse_record::<R>(row)?));
                }

                Ok(models)
            })
    }

    /// Replaces every field named by `input` on record `id`.
    ///
    /// Fails with `NotFound` before any write when `id` does not exist.
    pub fn update(&self, id: Uuid, input: U) -> RepoResult<M> {
        self.sessions
            .scope(TransactionBehavior::Immediate, |session| -> RepoResult<M> {
                let mut record = self.get_by_id(session, id)?;
                let meta = *record.meta();
                input.apply_to(&mut record);
                *record.meta_mut() = meta;
                record.meta_mut().touch();

                let mut bind_values = checked_values(&record)?;
                let column_count = R::COLUMNS.len();
                let mut assignments: Vec<String> = R::COLUMNS
                    .iter()
                    .enumerate()
                    .map(|(index, column)| format!("{} = ?{}", column.name, index + 1))
                    .collect();
                assignments.push(format!("updated_at = ?{}", column_count + 1));

                let sql = format!(
                    "UPDATE {} SET {} WHERE id = ?{};",
                    R::TABLE,
                    assignments.join(", "),
                    column_count + 2
                );
                bind_values.push(Value::Integer(record.meta().updated_at));
                bind_values.push(Value::Text(id.to_string()));
                session.conn().execute(&sql, params_from_iter(bind_values))?;

                let reloaded = self.get_by_id(session, id)?;
                session.commit()?;
                Ok(M::from(reloaded))
            })
    }

    /// Deletes record `id`, or fails with `NotFound`.
    pub fn delete(&self, id: Uuid) -> RepoResult<()> {
        self.sessions
            .scope(TransactionBehavior::Immediate, |session| -> RepoResult<()> {
                let record = self.get_by_id(session, id)?;
                session.conn().execute(
                    &format!("DELETE FROM {} WHERE id = ?1;", R::TABLE),
                    [record.meta().id.to_string()],
                )?;
                session.commit()?;
                Ok(())
            })
    }

    /// Id lookup shared by get/update/delete.
    fn get_by_id(&self, session: &Session, id: Uuid) -> RepoResult<R> {
        let sql = format!(
            "SELECT {} FROM {} WHERE id = ?1;",
            select_columns::<R>(),
            R::TABLE
        );
        let mut stmt = session.conn().prepare(&sql)?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return parse_record::<R>(row);
        }

        Err(RepoError::not_found(R::KIND, id))
    }

    /// Builds a record from `input` and inserts it without committing.
    fn insert(&self, session: &Session, input: C) -> RepoResult<R> {
        let meta = RecordMeta::fresh();
        let mut record = input.into_record(meta);
        *record.meta_mut() = meta;

        let values = checked_values(&record)?;
        let placeholders = (1..=META_COLUMNS.len() + R::COLUMNS.len())
            .map(|index| format!("?{index}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({});",
            R::TABLE,
            select_columns::<R>(),
            placeholders
        );

        let mut bind_values = vec![
            Value::Text(meta.id.to_string()),
            Value::Integer(meta.created_at),
            Value::Integer(meta.updated_at),
        ];
        bind_values.extend(values);
        session.conn().execute(&sql, params_from_iter(bind_values))?;

        Ok(record)
    }
}

impl<M, R, C, U> Crud for Repository<M, R, C, U>
where
    R: StorageRecord,
    M: From<R>,
    C: CreateInput<R>,
    U: UpdateInput<R>,
{
    const KIND: &'static str = R::KIND;

    type Model = M;
    type Create = C;
    type Update = U;

    fn create(&self, input: C) -> RepoResult<M> {
        Repository::create(self, input)
    }

    fn get(&self, id: Uuid) -> RepoResult<M> {
        Repository::get(self, id)
    }

    fn list(&self, limit: u32, offset: u32) -> RepoResult<Vec<M>> {
        Repository::list(self, limit, offset)
    }

    fn update(&self, id: Uuid, input: U) -> RepoResult<M> {
        Repository::update(self, id, input)
    }

    fn delete(&self, id: Uuid) -> RepoResult<()> {
        Repository::delete(self, id)
    }
}

fn ensure_table_ready<R: StorageRecord>(session: &Session) -> RepoResult<()> {
    let Some(columns) = table_columns(session.conn(), R::TABLE)? else {
        return Err(RepoError::MissingRequiredTable(R::TABLE));
    };

    let required = META_COLUMNS
        .iter()
        .copied()
        .chain(R::COLUMNS.iter().map(|column| column.name));
    for column in required {
        if !columns.iter().any(|existing| existing == column) {
            return Err(RepoError::MissingRequiredColumn {
                table: R::TABLE,
                column,
            });
        }
    }

    Ok(())
}

fn checked_values<R: StorageRecord>(record: &R) -> RepoResult<Vec<Value>> {
    let values = record.column_values();
    if values.len() != R::COLUMNS.len() {
        return Err(RepoError::InvalidData(format!(
            "{} maps {} values onto {} columns",
            R::KIND,
            values.len(),
            R::COLUMNS.len()
        )));
    }
    Ok(values)
}

fn parse_record<R: StorageRecord>(row: &Row<'_>) -> RepoResult<R> {
    let id_text: String = row.get("id")?;
    let id = Uuid::parse_str(&id_text).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid uuid value `{id_text}` in {}.id",
            R::TABLE
        ))
    })?;

    let meta = RecordMeta {
        id,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    };
    if meta.updated_at < meta.created_at {
        return Err(RepoError::InvalidData(format!(
            "{}.updated_at precedes created_at for `{id}`",
            R::TABLE
        )));
    }

    Ok(R::from_row(meta, row)?)
}
