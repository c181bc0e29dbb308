//! Persisted-record base shared by every resource table.
//!
//! # Responsibility
//! - Define the identity + audit shape (`RecordMeta`) stored on every row.
//! - Define the per-resource mapping contract (`StorageRecord`).
//!
//! # Invariants
//! - `id` never changes after insertion.
//! - `updated_at >= created_at`, and every mutation strictly advances
//!   `updated_at`.
//! - `column_values()` yields exactly one value per entry in `COLUMNS`.

use rusqlite::types::Value;
use rusqlite::Row;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Identity and audit timestamps of a persisted row.
///
/// Timestamps are Unix epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordMeta {
    pub id: Uuid,
    pub created_at: i64,
    pub updated_at: i64,
}

impl RecordMeta {
    /// Fresh metadata for a row about to be inserted.
    pub fn fresh() -> Self {
        let now = now_epoch_ms();
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Advances `updated_at` for a mutation.
    ///
    /// Uses the wall clock, but never goes backwards and never repeats the
    /// previous value, even when two writes land in the same millisecond.
    pub fn touch(&mut self) {
        self.updated_at = now_epoch_ms().max(self.updated_at + 1);
    }
}

/// Resource-specific column declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    /// SQL type and constraints, e.g. `TEXT NOT NULL`.
    pub decl: &'static str,
}

impl Column {
    pub const fn new(name: &'static str, decl: &'static str) -> Self {
        Self { name, decl }
    }
}

/// Columns every record table carries ahead of its resource columns.
pub const META_COLUMNS: [&str; 3] = ["id", "created_at", "updated_at"];

/// Mapping contract between one resource kind and its table.
///
/// Implementations list their fields explicitly; nothing is copied by
/// reflection, so a field missing from `COLUMNS` can never be written.
pub trait StorageRecord: Sized {
    /// Table holding this resource kind.
    const TABLE: &'static str;
    /// Resource kind reported in not-found errors.
    const KIND: &'static str;
    /// Resource columns, excluding the meta columns.
    const COLUMNS: &'static [Column];

    fn meta(&self) -> &RecordMeta;

    fn meta_mut(&mut self) -> &mut RecordMeta;

    /// Values for `COLUMNS`, in the same order.
    fn column_values(&self) -> Vec<Value>;

    /// Rebuilds a record from a row selected with `select_columns::<Self>()`.
    fn from_row(meta: RecordMeta, row: &Row<'_>) -> rusqlite::Result<Self>;
}

/// Comma-separated column list: meta columns first, then `R::COLUMNS`.
pub fn select_columns<R: StorageRecord>() -> String {
    META_COLUMNS
        .iter()
        .copied()
        .chain(R::COLUMNS.iter().map(|column| column.name))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
