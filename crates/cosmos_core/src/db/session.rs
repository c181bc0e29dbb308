//! Session provider: pooled connections and scoped transactions.
//!
//! # Responsibility
//! - Build an `r2d2` pool of SQLite connections for a `StoreTarget`.
//! - Hand out `Session` guards, each holding one open transaction.
//! - Guarantee rollback on failure and release on every exit path.
//!
//! # Invariants
//! - Pooled connections have `foreign_keys=ON` and a busy timeout.
//! - A memory store has exactly one pooled connection, so its sessions run
//!   one at a time.
//! - A session never starts on a connection that still holds a transaction.
//! - `scope` returns the body's error unchanged after rolling back.

use super::{DbError, DbResult, StoreConfig, StoreTarget};
use log::{error, info, warn};
use parking_lot::Mutex;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, TransactionBehavior};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

type SqlitePool = Pool<SqliteConnectionManager>;

/// Factory for scoped transactional sessions over a shared connection pool.
///
/// Cheap to clone; all clones share one pool.
#[derive(Clone)]
pub struct SessionFactory {
    store: Arc<Store>,
}

struct Store {
    target: StoreTarget,
    pool: SqlitePool,
    // Shared-cache memory databases vanish once their last connection closes,
    // and r2d2 recycles pooled connections on its own schedule.
    _anchor: Option<Mutex<Connection>>,
}

impl SessionFactory {
    /// Builds the pool and waits for its first connection.
    ///
    /// # Side effects
    /// - Creates the database file when missing.
    /// - Emits `store_open` logging events with duration and status.
    pub fn open(config: &StoreConfig) -> DbResult<Self> {
        let started_at = Instant::now();
        let mode = config.target.mode();
        info!("event=store_open module=db status=start mode={mode}");

        match Self::open_pool(config) {
            Ok(factory) => {
                info!(
                    "event=store_open module=db status=ok mode={} duration_ms={}",
                    mode,
                    started_at.elapsed().as_millis()
                );
                Ok(factory)
            }
            Err(err) => {
                error!(
                    "event=store_open module=db status=error mode={} duration_ms={} error_code=store_open_failed error={}",
                    mode,
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    /// Shorthand for a fresh, process-private in-memory store.
    pub fn in_memory() -> DbResult<Self> {
        Self::open(&StoreConfig::in_memory())
    }

    fn open_pool(config: &StoreConfig) -> DbResult<Self> {
        if config.max_connections == 0 {
            return Err(DbError::InvalidTarget(
                "connection pool needs at least one connection".to_string(),
            ));
        }

        let (manager, anchor, max_size) = match &config.target {
            StoreTarget::File(path) => (
                SqliteConnectionManager::file(path),
                None,
                config.max_connections,
            ),
            StoreTarget::Memory => {
                let uri = format!(
                    "file:cosmos-{}?mode=memory&cache=shared",
                    Uuid::new_v4().simple()
                );
                let anchor = Connection::open(&uri)?;
                // Shared-cache lock conflicts fail with SQLITE_LOCKED and never
                // wait on the busy timeout; one connection queues sessions in r2d2.
                (SqliteConnectionManager::file(uri), Some(Mutex::new(anchor)), 1)
            }
        };

        let busy_timeout = config.busy_timeout;
        let wal = matches!(config.target, StoreTarget::File(_));
        let manager = manager.with_init(move |conn| configure_connection(conn, busy_timeout, wal));

        let pool = Pool::builder()
            .max_size(max_size)
            .min_idle(Some(1))
            .connection_timeout(config.acquire_timeout)
            .build(manager)?;

        Ok(Self {
            store: Arc::new(Store {
                target: config.target.clone(),
                pool,
                _anchor: anchor,
            }),
        })
    }

    pub fn target(&self) -> &StoreTarget {
        &self.store.target
    }

    /// Number of connections currently parked in the pool.
    pub fn idle_connections(&self) -> usize {
        self.store.pool.state().idle_connections as usize
    }

    /// Acquires a connection and begins a transaction with `behavior`.
    ///
    /// Waits up to the acquire timeout when every pooled connection is in
    /// use. Use `Deferred` for reads and `Immediate` for writes so that a
    /// writer takes the store lock up front and waits on the busy timeout
    /// instead of failing on lock upgrade.
    pub fn session(&self, behavior: TransactionBehavior) -> DbResult<Session> {
        let conn = self.store.pool.get()?;
        if !conn.is_autocommit() {
            // Left behind by a release whose rollback failed.
            conn.execute_batch("ROLLBACK;")?;
        }
        conn.execute_batch(begin_sql(behavior))?;
        Ok(Session { conn })
    }

    /// Runs `body` inside one session.
    ///
    /// On `Err` the transaction is rolled back and the error is returned
    /// unchanged. Work the body did not commit is discarded on release.
    pub fn scope<T, E, F>(&self, behavior: TransactionBehavior, body: F) -> Result<T, E>
    where
        F: FnOnce(&mut Session) -> Result<T, E>,
        E: From<DbError>,
    {
        let mut session = self.session(behavior)?;
        match body(&mut session) {
            Ok(value) => Ok(value),
            Err(err) => {
                session.rollback_quietly();
                Err(err)
            }
        }
    }
}

fn configure_connection(
    conn: &mut Connection,
    busy_timeout: Duration,
    wal: bool,
) -> rusqlite::Result<()> {
    conn.busy_timeout(busy_timeout)?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    if wal {
        let _mode: String = conn.query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))?;
    }
    Ok(())
}

/// One transactional unit of work against the store.
///
/// Dropping a session rolls back anything left uncommitted and returns the
/// connection to the pool.
pub struct Session {
    conn: PooledConnection<SqliteConnectionManager>,
}

impl Session {
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn in_transaction(&self) -> bool {
        !self.conn.is_autocommit()
    }

    /// Commits the open transaction.
    ///
    /// Statements issued afterwards run in autocommit mode on the same
    /// connection until the session is released.
    pub fn commit(&mut self) -> DbResult<()> {
        self.conn.execute_batch("COMMIT;")?;
        Ok(())
    }

    /// Rolls back the open transaction, if any.
    pub fn rollback(&mut self) -> DbResult<()> {
        if self.in_transaction() {
            self.conn.execute_batch("ROLLBACK;")?;
        }
        Ok(())
    }

    fn rollback_quietly(&mut self) {
        if let Err(err) = self.rollback() {
            warn!("event=session_rollback module=db status=error error={err}");
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.conn.is_autocommit() {
            return;
        }
        if let Err(err) = self.conn.execute_batch("ROLLBACK;") {
            warn!(
                "event=session_release module=db status=error error_code=rollback_failed error={err}"
            );
        }
    }
}

fn begin_sql(behavior: TransactionBehavior) -> &'static str {
    match behavior {
        TransactionBehavior::Immediate => "BEGIN IMMEDIATE;",
        TransactionBehavior::Exclusive => "BEGIN EXCLUSIVE;",
        _ => "BEGIN DEFERRED;",
    }
}

#[cfg(test)]
mod tests {
    use super::SessionFactory;
    use crate::db::{DbError, StoreConfig};
    use rusqlite::TransactionBehavior;

    fn factory_with_table() -> SessionFactory {
        let factory = SessionFactory::in_memory().unwrap();
        factory
            .scope(TransactionBehavior::Immediate, |session| -> Result<(), DbError> {
                session
                    .conn()
                    .execute_batch("CREATE TABLE items (name TEXT NOT NULL);")?;
                session.commit()
            })
            .unwrap();
        factory
    }

    fn count_items(factory: &SessionFactory) -> i64 {
        factory
            .scope(TransactionBehavior::Deferred, |session| -> Result<i64, DbError> {
                Ok(session
                    .conn()
                    .query_row("SELECT COUNT(*) FROM items;", [], |row| row.get(0))?)
            })
            .unwrap()
    }

    #[test]
    fn scope_commits_when_body_commits() {
        let factory = factory_with_table();
        factory
            .scope(TransactionBehavior::Immediate, |session| -> Result<(), DbError> {
                session
                    .conn()
                    .execute("INSERT INTO items (name) VALUES ('a');", [])?;
                session.commit()
            })
            .unwrap();

        assert_eq!(count_items(&factory), 1);
    }

    #[test]
    fn scope_discards_uncommitted_work_on_success() {
        let factory = factory_with_table();
        factory
            .scope(TransactionBehavior::Immediate, |session| -> Result<(), DbError> {
                session
                    .conn()
                    .execute("INSERT INTO items (name) VALUES ('a');", [])?;
                Ok(())
            })
            .unwrap();

        assert_eq!(count_items(&factory), 0);
    }

    #[test]
    fn scope_rolls_back_and_returns_body_error_unchanged() {
        let factory = factory_with_table();
        let err = factory
            .scope(TransactionBehavior::Immediate, |session| -> Result<(), DbError> {
                session
                    .conn()
                    .execute("INSERT INTO items (name) VALUES ('a');", [])?;
                Err(DbError::InvalidTarget("boom".to_string()))
            })
            .unwrap_err();

        assert!(matches!(err, DbError::InvalidTarget(ref message) if message == "boom"));
        assert_eq!(count_items(&factory), 0);
    }

    #[test]
    fn dropped_session_rolls_back_and_is_reused() {
        let factory = factory_with_table();
        {
            let session = factory.session(TransactionBehavior::Immediate).unwrap();
            assert!(session.in_transaction());
            session
                .conn()
                .execute("INSERT INTO items (name) VALUES ('a');", [])
                .unwrap();
        }

        assert_eq!(factory.idle_connections(), 1);
        assert_eq!(count_items(&factory), 0);
        assert_eq!(factory.idle_connections(), 1);
    }

    #[test]
    fn memory_stores_are_isolated_from_each_other() {
        let first = factory_with_table();
        let second = SessionFactory::open(&StoreConfig::in_memory()).unwrap();

        let result = second.scope(TransactionBehavior::Deferred, |session| -> Result<i64, DbError> {
            Ok(session
                .conn()
                .query_row("SELECT COUNT(*) FROM items;", [], |row| row.get(0))?)
        });

        assert!(result.is_err());
        assert_eq!(count_items(&first), 0);
    }

    #[test]
    fn zero_sized_pool_is_rejected() {
        let mut config = StoreConfig::in_memory();
        config.max_connections = 0;

        let result = SessionFactory::open(&config);

        assert!(matches!(result, Err(DbError::InvalidTarget(_))));
    }

    #[test]
    fn memory_store_keeps_data_with_a_single_connection() {
        let mut config = StoreConfig::in_memory();
        config.max_connections = 4;
        let factory = SessionFactory::open(&config).unwrap();
        factory
            .scope(TransactionBehavior::Immediate, |session| -> Result<(), DbError> {
                session
                    .conn()
                    .execute_batch("CREATE TABLE items (name TEXT NOT NULL);")?;
                session.commit()
            })
            .unwrap();

        assert_eq!(count_items(&factory), 0);
        assert_eq!(factory.idle_connections(), 1);
    }
}
