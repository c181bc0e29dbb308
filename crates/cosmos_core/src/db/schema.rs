//! Development schema bootstrap and table introspection.
//!
//! # Responsibility
//! - Derive table DDL from `StorageRecord` declarations.
//! - Create missing tables for local development stores.
//! - Report which columns an existing table has.
//!
//! # Invariants
//! - Schema creation is refused in production; production schema is
//!   provisioned out of band.
//! - Creation is idempotent (`CREATE TABLE IF NOT EXISTS`) and atomic.

use super::record::{Column, StorageRecord};
use super::session::SessionFactory;
use super::DbError;
use crate::config::Environment;
use log::{error, info};
use rusqlite::{Connection, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

#[derive(Debug)]
pub enum SchemaError {
    Db(DbError),
    ProductionEnvironment,
}

impl Display for SchemaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::ProductionEnvironment => {
                write!(f, "schema initialization is not allowed in production")
            }
        }
    }
}

impl Error for SchemaError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::ProductionEnvironment => None,
        }
    }
}

impl From<DbError> for SchemaError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for SchemaError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Table definition derived from a record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDef {
    pub name: &'static str,
    pub columns: &'static [Column],
}

impl TableDef {
    pub fn of<R: StorageRecord>() -> Self {
        Self {
            name: R::TABLE,
            columns: R::COLUMNS,
        }
    }

    pub fn create_sql(&self) -> String {
        let mut sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (
    id TEXT PRIMARY KEY NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL",
            self.name
        );
        for column in self.columns {
            sql.push_str(&format!(",\n    {} {}", column.name, column.decl));
        }
        sql.push_str(",\n    CHECK (updated_at >= created_at)\n);");
        sql
    }
}

/// Set of record tables known to the application.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    tables: Vec<TableDef>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `R`'s table. Registering the same table twice is a no-op.
    pub fn register<R: StorageRecord>(mut self) -> Self {
        if !self.tables.iter().any(|table| table.name == R::TABLE) {
            self.tables.push(TableDef::of::<R>());
        }
        self
    }

    pub fn tables(&self) -> &[TableDef] {
        &self.tables
    }
}

/// Creates every registered table that does not exist yet.
///
/// Development helper only: returns `SchemaError::ProductionEnvironment`
/// without touching the store when `env` is production.
///
/// # Side effects
/// - Emits `schema_init` logging events with duration and status.
pub fn initialize_schema(
    sessions: &SessionFactory,
    registry: &SchemaRegistry,
    env: Environment,
) -> Result<(), SchemaError> {
    if env == Environment::Prod {
        error!(
            "event=schema_init module=db status=error error_code=schema_init_in_prod"
        );
        return Err(SchemaError::ProductionEnvironment);
    }

    let started_at = Instant::now();
    let result = sessions.scope(TransactionBehavior::Immediate, |session| -> Result<(), SchemaError> {
        for table in registry.tables() {
            session.conn().execute_batch(&table.create_sql())?;
        }
        session.commit()?;
        Ok(())
    });

    match &result {
        Ok(()) => info!(
            "event=schema_init module=db status=ok tables={} duration_ms={}",
            registry.tables().len(),
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event=schema_init module=db status=error duration_ms={} error={}",
            started_at.elapsed().as_millis(),
            err
        ),
    }
    result
}

/// Column names of `table`, or `None` when the table does not exist.
pub fn table_columns(conn: &Connection, table: &str) -> rusqlite::Result<Option<Vec<String>>> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1);")?;
    let columns = stmt
        .query_map([table], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    if columns.is_empty() {
        return Ok(None);
    }
    Ok(Some(columns))
}
