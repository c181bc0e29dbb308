//! Application settings loaded from the process environment.
//!
//! # Responsibility
//! - Parse `COSMOS_*` variables into one explicit `Settings` value.
//! - Validate values at startup so later layers can trust them.
//! - Translate the database URL into a `StoreTarget`.
//!
//! # Invariants
//! - Settings are never global; callers pass them to constructors.
//! - Nested keys use `__` as delimiter (`COSMOS_OPENAPI__TITLE`).

use crate::db::{StoreConfig, StoreTarget};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::str::FromStr;

const ENV_PREFIX: &str = "COSMOS_";
const NESTED_DELIMITER: &str = "__";
const DEFAULT_API_PREFIX: &str = "/api";
const DEFAULT_DATABASE_URL: &str = "sqlite:///cosmos.db";
const DEFAULT_OPENAPI_TITLE: &str = "Cosmos";
const DEFAULT_OPENAPI_SUMMARY: &str = "A system for processing, storing, and sharing data";
const SQLITE_SCHEME: &str = "sqlite://";
const MEMORY_DATABASE: &str = ":memory:";

static API_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^$|^/[a-zA-Z0-9\-._~]+$").expect("api prefix pattern is valid"));
static ORIGIN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://[A-Za-z0-9.\-]+(:[0-9]{1,5})?(/\S*)?$").expect("origin pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue { key: String, message: String },
    UnsupportedDatabase(String),
    /// A well-formed URL for a backend other than SQLite.
    NonSqliteBackend { scheme: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { key, message } => write!(f, "invalid value for {key}: {message}"),
            Self::UnsupportedDatabase(url) => write!(
                f,
                "unsupported database url `{url}`; expected sqlite:///<path>, a file path or :memory:"
            ),
            Self::NonSqliteBackend { scheme } => write!(
                f,
                "`{scheme}` databases are not supported; this build stores data in SQLite only"
            ),
        }
    }
}

impl Error for ConfigError {}

/// Operating environment of the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Dev,
    Prod,
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "dev" => Ok(Self::Dev),
            "prod" => Ok(Self::Prod),
            other => Err(format!("expected dev|prod, got `{other}`")),
        }
    }
}

/// OpenAPI `info` metadata handed to the routing layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpenApiInfo {
    pub title: String,
    pub description: Option<String>,
    pub summary: Option<String>,
}

impl Default for OpenApiInfo {
    fn default() -> Self {
        Self {
            title: DEFAULT_OPENAPI_TITLE.to_string(),
            description: None,
            summary: Some(DEFAULT_OPENAPI_SUMMARY.to_string()),
        }
    }
}

/// Root application settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settings {
    /// URL path prefix for every route, empty or `/segment`.
    pub api_prefix: String,
    /// Trusted CORS origins.
    pub cors_origins: Vec<String>,
    pub env: Environment,
    pub openapi: OpenApiInfo,
    /// `sqlite:///<path>`, a plain path, or `:memory:`.
    pub database_url: String,
    /// Log level override; build-mode default when unset.
    pub log_level: Option<String>,
    /// Absolute log directory; logs go to stderr when unset.
    pub log_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            cors_origins: Vec::new(),
            env: Environment::Dev,
            openapi: OpenApiInfo::default(),
            database_url: DEFAULT_DATABASE_URL.to_string(),
            log_level: None,
            log_dir: None,
        }
    }
}

impl Settings {
    /// Loads settings from `COSMOS_*` process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads settings through `lookup`, which receives full variable names.
    ///
    /// Unset variables keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |field: &str| lookup(&format!("{ENV_PREFIX}{field}"));
        let nested = |section: &str, field: &str| {
            lookup(&format!("{ENV_PREFIX}{section}{NESTED_DELIMITER}{field}"))
        };
        let mut settings = Self::default();

        if let Some(value) = get("API_PREFIX") {
            settings.api_prefix = parse_api_prefix(&value)?;
        }
        if let Some(value) = get("CORS_ORIGINS") {
            settings.cors_origins = parse_cors_origins(&value)?;
        }
        if let Some(value) = get("ENV") {
            settings.env = value.parse().map_err(|message| invalid("COSMOS_ENV", message))?;
        }
        if let Some(value) = nested("OPENAPI", "TITLE") {
            settings.openapi.title = value;
        }
        if let Some(value) = nested("OPENAPI", "DESCRIPTION") {
            settings.openapi.description = Some(value);
        }
        if let Some(value) = nested("OPENAPI", "SUMMARY") {
            settings.openapi.summary = Some(value);
        }
        if let Some(value) = get("DATABASE_URL") {
            parse_database_url(&value)?;
            settings.database_url = value;
        }
        if let Some(value) = get("LOG_LEVEL") {
            settings.log_level = Some(value);
        }
        if let Some(value) = get("LOG_DIR") {
            let path = PathBuf::from(value.trim());
            if !path.is_absolute() {
                return Err(invalid(
                    "COSMOS_LOG_DIR",
                    format!("expected an absolute path, got `{}`", path.display()),
                ));
            }
            settings.log_dir = Some(path);
        }

        Ok(settings)
    }

    pub fn store_target(&self) -> Result<StoreTarget, ConfigError> {
        parse_database_url(&self.database_url)
    }

    pub fn store_config(&self) -> Result<StoreConfig, ConfigError> {
        self.store_target().map(StoreConfig::new)
    }
}

fn invalid(key: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.into(),
    }
}

fn parse_api_prefix(value: &str) -> Result<String, ConfigError> {
    let trimmed = value.trim();
    if !API_PREFIX_RE.is_match(trimmed) {
        return Err(invalid(
            "COSMOS_API_PREFIX",
            format!("`{trimmed}` must be empty or a single `/segment`"),
        ));
    }
    Ok(trimmed.to_string())
}

fn parse_cors_origins(value: &str) -> Result<Vec<String>, ConfigError> {
    let origins: Vec<String> = serde_json::from_str(value).map_err(|err| {
        invalid(
            "COSMOS_CORS_ORIGINS",
            format!("expected a JSON array of strings: {err}"),
        )
    })?;

    for origin in &origins {
        if !ORIGIN_RE.is_match(origin) {
            return Err(invalid(
                "COSMOS_CORS_ORIGINS",
                format!("`{origin}` is not an http(s) URL"),
            ));
        }
    }
    Ok(origins)
}

/// Maps a database URL onto a store target.
pub fn parse_database_url(url: &str) -> Result<StoreTarget, ConfigError> {
    let trimmed = url.trim();
    if trimmed == MEMORY_DATABASE || trimmed == "sqlite://:memory:" {
        return Ok(StoreTarget::Memory);
    }

    if let Some(rest) = trimmed.strip_prefix(SQLITE_SCHEME) {
        // `sqlite:///relative.db` and `sqlite:////abs/path.db`
        let path = rest.strip_prefix('/').unwrap_or(rest);
        if path.is_empty() {
            return Err(ConfigError::UnsupportedDatabase(url.to_string()));
        }
        return Ok(StoreTarget::file(path));
    }

    if let Some((scheme, _)) = trimmed.split_once("://") {
        if !scheme.is_empty() {
            return Err(ConfigError::NonSqliteBackend {
                scheme: scheme.to_string(),
            });
        }
    }
    if trimmed.is_empty() || trimmed.contains("://") {
        return Err(ConfigError::UnsupportedDatabase(url.to_string()));
    }
    Ok(StoreTarget::file(trimmed))
}
