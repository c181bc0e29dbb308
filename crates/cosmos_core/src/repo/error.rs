//! Repository error contract.
//!
//! # Invariants
//! - `NotFound` is produced only by id lookups (`get`, `update`, `delete`).
//! - Store failures are wrapped unchanged in `Db`, never reinterpreted.

use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type RepoResult<T> = Result<T, RepoError>;

/// Lookup of `kind` by `id` found no row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotFoundError {
    pub kind: &'static str,
    pub id: Uuid,
}

impl Display for NotFoundError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} '{}' not found.", self.kind, self.id)
    }
}

impl Error for NotFoundError {}

#[derive(Debug)]
pub enum RepoError {
    NotFound(NotFoundError),
    Db(DbError),
    InvalidData(String),
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl RepoError {
    pub fn not_found(kind: &'static str, id: Uuid) -> Self {
        Self::NotFound(NotFoundError { kind, id })
    }

    /// The missing resource, when this is a not-found failure.
    pub fn as_not_found(&self) -> Option<&NotFoundError> {
        match self {
            Self::NotFound(err) => Some(err),
            _ => None,
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::MissingRequiredTable(table) => write!(f, "required table `{table}` is missing"),
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "required column `{table}.{column}` is missing")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::NotFound(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::InvalidData(_)
            | Self::MissingRequiredTable(_)
            | Self::MissingRequiredColumn { .. } => None,
        }
    }
}

impl From<NotFoundError> for RepoError {
    fn from(value: NotFoundError) -> Self {
        Self::NotFound(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

#[cfg(test)]
mod tests {
    use super::RepoError;
    use uuid::Uuid;

    #[test]
    fn not_found_message_names_kind_and_id() {
        let id = Uuid::parse_str("11111111-2222-4333-8444-555555555555").unwrap();
        let err = RepoError::not_found("Dataset", id);

        assert_eq!(
            err.to_string(),
            "Dataset '11111111-2222-4333-8444-555555555555' not found."
        );
        assert_eq!(err.as_not_found().map(|missing| missing.id), Some(id));
    }
}
