//! Shared transport shape and write-input contracts.
//!
//! # Invariants
//! - `ModelMeta` mirrors `RecordMeta` exactly.
//! - Serialized names are camel case; deserialization also accepts the
//!   storage (snake case) names.
//! - Inputs never carry identity or audit fields.

use crate::db::record::{RecordMeta, StorageRecord, META_COLUMNS};
use crate::util::transform::to_camel;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity and audit fields every transport model exposes.
///
/// Concrete models embed it with `#[serde(flatten)]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelMeta {
    pub id: Uuid,
    /// Epoch milliseconds.
    #[serde(alias = "created_at")]
    pub created_at: i64,
    /// Epoch milliseconds.
    #[serde(alias = "updated_at")]
    pub updated_at: i64,
}

impl From<RecordMeta> for ModelMeta {
    fn from(value: RecordMeta) -> Self {
        Self {
            id: value.id,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

/// Payload that builds a brand-new record of type `R`.
pub trait CreateInput<R: StorageRecord> {
    /// Builds the record. Identity and timestamps come from `meta` only.
    fn into_record(self, meta: RecordMeta) -> R;
}

/// Payload that replaces the mutable fields of an existing record.
pub trait UpdateInput<R: StorageRecord> {
    /// Overwrites every field this input names, including unchanged ones.
    ///
    /// Must not touch `record.meta()`; the repository owns audit fields.
    fn apply_to(self, record: &mut R);
}

/// External (camel case) names of every field a record exposes.
pub fn external_field_names<R: StorageRecord>() -> Vec<String> {
    META_COLUMNS
        .iter()
        .copied()
        .chain(R::COLUMNS.iter().map(|column| column.name))
        .map(to_camel)
        .collect()
}
