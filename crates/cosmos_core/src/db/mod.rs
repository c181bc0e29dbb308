//! SQLite storage layer: connection targets, sessions, records and schema.
//!
//! # Responsibility
//! - Describe where the store lives (`StoreTarget`) and how to connect.
//! - Own connection lifecycle through the session provider.
//! - Define the shared persisted-record shape used by every resource kind.
//!
//! # Invariants
//! - Only `session` opens or closes store connections.
//! - Every persisted table carries `id`, `created_at` and `updated_at`.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub mod record;
pub mod schema;
pub mod session;

pub use record::{now_epoch_ms, Column, RecordMeta, StorageRecord};
pub use schema::{initialize_schema, SchemaError, SchemaRegistry, TableDef};
pub use session::{Session, SessionFactory};

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_MAX_CONNECTIONS: u32 = 8;

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    Pool(r2d2::Error),
    InvalidTarget(String),
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::Pool(err) => write!(f, "connection pool: {err}"),
            Self::InvalidTarget(message) => write!(f, "invalid store target: {message}"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Pool(err) => Some(err),
            Self::InvalidTarget(_) => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<r2d2::Error> for DbError {
    fn from(value: r2d2::Error) -> Self {
        Self::Pool(value)
    }
}

/// Physical location of the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreTarget {
    /// Database file on disk; created when missing.
    File(PathBuf),
    /// Process-private in-memory database served by a single pooled
    /// connection.
    Memory,
}

impl StoreTarget {
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self::File(path.as_ref().to_path_buf())
    }

    /// Short label used in log events.
    pub fn mode(&self) -> &'static str {
        match self {
            Self::File(_) => "file",
            Self::Memory => "memory",
        }
    }
}

/// Connection settings handed to `SessionFactory::open`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub target: StoreTarget,
    /// How long a connection waits on a locked database before failing.
    pub busy_timeout: Duration,
    /// Upper bound on pooled connections for file stores. Memory stores
    /// always use one.
    pub max_connections: u32,
    /// How long `session` waits for a free pooled connection.
    pub acquire_timeout: Duration,
}

impl StoreConfig {
    pub fn new(target: StoreTarget) -> Self {
        Self {
            target,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
        }
    }

    pub fn file(path: impl AsRef<Path>) -> Self {
        Self::new(StoreTarget::file(path))
    }

    pub fn in_memory() -> Self {
        Self::new(StoreTarget::Memory)
    }
}
