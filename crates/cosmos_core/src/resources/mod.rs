//! Concrete resource kinds served by Cosmos.
//!
//! Each module pairs a storage record with its transport model and inputs.

use crate::db::schema::SchemaRegistry;

pub mod dataset;

/// Registry of every resource table, used for development schema setup.
pub fn schema_registry() -> SchemaRegistry {
    SchemaRegistry::new().register::<dataset::DatasetRecord>()
}
