//! Dataset resource: a named collection of data shared through Cosmos.
//!
//! # Responsibility
//! - Declare the `datasets` table and its explicit field mapping.
//! - Provide the transport model and write inputs for the resource.
//!
//! # Invariants
//! - Record columns and model fields correspond 1:1 by name.
//! - `name` is non-blank and at most `NAME_MAX_CHARS` characters.

use crate::db::record::{Column, RecordMeta, StorageRecord};
use crate::model::base::{CreateInput, ModelMeta, UpdateInput};
use crate::model::validation::{require_text, Validate, ValidationError};
use crate::repo::base::Repository;
use rusqlite::types::Value;
use rusqlite::Row;
use serde::{Deserialize, Serialize};

pub const NAME_MAX_CHARS: usize = 256;
const DESCRIPTION_MAX_CHARS: usize = 4096;

/// Persisted row of the `datasets` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetRecord {
    pub meta: RecordMeta,
    pub name: String,
    pub description: Option<String>,
}

impl StorageRecord for DatasetRecord {
    const TABLE: &'static str = "datasets";
    const KIND: &'static str = "Dataset";
    const COLUMNS: &'static [Column] = &[
        Column::new("name", "TEXT NOT NULL"),
        Column::new("description", "TEXT"),
    ];

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn column_values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.name.clone()),
            self.description.clone().map_or(Value::Null, Value::Text),
        ]
    }

    fn from_row(meta: RecordMeta, row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            meta,
            name: row.get("name")?,
            description: row.get("description")?,
        })
    }
}

/// Transport representation of a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    #[serde(flatten)]
    pub meta: ModelMeta,
    pub name: String,
    pub description: Option<String>,
}

impl From<DatasetRecord> for Dataset {
    fn from(value: DatasetRecord) -> Self {
        Self {
            meta: value.meta.into(),
            name: value.name,
            description: value.description,
        }
    }
}

/// Payload for creating a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DatasetCreate {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl DatasetCreate {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
        }
    }
}

impl CreateInput<DatasetRecord> for DatasetCreate {
    fn into_record(self, meta: RecordMeta) -> DatasetRecord {
        DatasetRecord {
            meta,
            name: self.name,
            description: self.description,
        }
    }
}

impl Validate for DatasetCreate {
    fn validate(&self) -> Result<(), ValidationError> {
        validate_fields(&self.name, self.description.as_deref())
    }
}

/// Full replacement of a dataset's mutable fields.
///
/// An absent `description` clears the stored one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DatasetUpdate {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl DatasetUpdate {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
        }
    }
}

impl UpdateInput<DatasetRecord> for DatasetUpdate {
    fn apply_to(self, record: &mut DatasetRecord) {
        record.name = self.name;
        record.description = self.description;
    }
}

impl Validate for DatasetUpdate {
    fn validate(&self) -> Result<(), ValidationError> {
        validate_fields(&self.name, self.description.as_deref())
    }
}

fn validate_fields(name: &str, description: Option<&str>) -> Result<(), ValidationError> {
    require_text("name", name, NAME_MAX_CHARS)?;
    if let Some(description) = description {
        if description.chars().count() > DESCRIPTION_MAX_CHARS {
            return Err(ValidationError::new(
                "description",
                format!("must be at most {DESCRIPTION_MAX_CHARS} characters"),
            ));
        }
    }
    Ok(())
}

pub type DatasetRepository = Repository<Dataset, DatasetRecord, DatasetCreate, DatasetUpdate>;
