//! Core of the Cosmos data service.
//!
//! Storage records, in-memory models and the generic repository that maps
//! CRUD operations between them live here, together with the settings,
//! logging and schema bootstrap the service needs at startup.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod resources;
pub mod service;
pub mod util;

pub use config::{ConfigError, Environment, OpenApiInfo, Settings};
pub use db::{DbError, DbResult, Session, SessionFactory, StoreConfig, StoreTarget};
pub use logging::{default_log_level, init_logging, logging_status, LogTarget};
pub use model::base::{CreateInput, ModelMeta, UpdateInput};
pub use model::validation::{Validate, ValidationError};
pub use repo::base::{Crud, ListParams, Repository, DEFAULT_LIST_LIMIT};
pub use repo::error::{NotFoundError, RepoError, RepoResult};
pub use resources::dataset::{
    Dataset, DatasetCreate, DatasetRecord, DatasetRepository, DatasetUpdate,
};
pub use service::resource_service::{ResourceService, ServiceError, ServiceResult};

/// Liveness probe used by health checks.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
