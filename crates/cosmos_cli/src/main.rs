//! `cosmos` command-line entry point.
//!
//! # Responsibility
//! - Bootstrap settings, logging and the session factory in that order.
//! - Expose health, settings, schema and dataset CRUD commands.
//! - Print results as camel case JSON on stdout.
//!
//! # Exit codes
//! - `0` success, `1` any failure, `2` resource not found.

use clap::{Parser, Subcommand};
use cosmos_core::config::parse_database_url;
use cosmos_core::db::{initialize_schema, SchemaError};
use cosmos_core::resources::schema_registry;
use cosmos_core::{
    core_version, default_log_level, init_logging, ping, ConfigError, DatasetCreate,
    DatasetRepository, DatasetUpdate, DbError, Environment, ListParams, LogTarget, RepoError,
    ResourceService, ServiceError, SessionFactory, Settings, DEFAULT_LIST_LIMIT,
};
use log::info;
use serde_json::json;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::process::ExitCode;
use uuid::Uuid;

const STDERR_DEFAULT_LEVEL: &str = "warn";

#[derive(Debug, Parser)]
#[command(name = "cosmos", version, about = "Cosmos data service toolbox")]
struct Cli {
    /// Database URL; overrides COSMOS_DATABASE_URL.
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Liveness probe; never touches the store.
    Ping,
    /// Print the effective settings.
    Settings,
    /// Create missing tables (development environments only).
    InitDb,
    /// Dataset resource operations.
    Dataset {
        #[command(subcommand)]
        action: DatasetAction,
    },
}

#[derive(Debug, Subcommand)]
enum DatasetAction {
    Create {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    Get {
        id: Uuid,
    },
    List {
        #[arg(long, default_value_t = DEFAULT_LIST_LIMIT)]
        limit: u32,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },
    /// Replace every mutable field; an omitted description is cleared.
    Update {
        id: Uuid,
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    Delete {
        id: Uuid,
    },
}

#[derive(Debug)]
enum CliError {
    Config(ConfigError),
    Logging(String),
    Db(DbError),
    Schema(SchemaError),
    Repo(RepoError),
    Service(ServiceError),
    Output(serde_json::Error),
}

impl CliError {
    fn exit_code(&self) -> ExitCode {
        match self {
            Self::Service(ServiceError::ResourceMissing(_)) => ExitCode::from(2),
            _ => ExitCode::FAILURE,
        }
    }
}

impl Display for CliError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "configuration: {err}"),
            Self::Logging(message) => write!(f, "logging: {message}"),
            Self::Db(err) => write!(f, "store: {err}"),
            Self::Schema(err) => write!(f, "schema: {err}"),
            Self::Repo(err) => write!(f, "repository: {err}"),
            Self::Service(err) => write!(f, "{err}"),
            Self::Output(err) => write!(f, "output: {err}"),
        }
    }
}

impl Error for CliError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Logging(_) => None,
            Self::Db(err) => Some(err),
            Self::Schema(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::Service(err) => Some(err),
            Self::Output(err) => Some(err),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<DbError> for CliError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<SchemaError> for CliError {
    fn from(value: SchemaError) -> Self {
        Self::Schema(value)
    }
}

impl From<RepoError> for CliError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<ServiceError> for CliError {
    fn from(value: ServiceError) -> Self {
        Self::Service(value)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(value: serde_json::Error) -> Self {
        Self::Output(value)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            err.exit_code()
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let settings = load_settings(cli.database_url)?;
    init_cli_logging(&settings)?;

    match cli.command {
        Command::Ping => print_json(&json!({ "ping": ping(), "version": core_version() })),
        Command::Settings => print_json(&settings),
        Command::InitDb => {
            let sessions = open_store(&settings)?;
            initialize_schema(&sessions, &schema_registry(), settings.env)?;
            print_json(&json!({ "schema": "ready" }))
        }
        Command::Dataset { action } => {
            let sessions = open_store(&settings)?;
            if settings.env == Environment::Dev {
                initialize_schema(&sessions, &schema_registry(), settings.env)?;
            }
            let service = ResourceService::new(DatasetRepository::try_new(sessions)?);
            run_dataset(&service, action)
        }
    }
}

fn load_settings(database_url: Option<String>) -> Result<Settings, CliError> {
    let mut settings = Settings::from_env()?;
    if let Some(url) = database_url {
        parse_database_url(&url)?;
        settings.database_url = url;
    }
    Ok(settings)
}

fn init_cli_logging(settings: &Settings) -> Result<(), CliError> {
    let target = LogTarget::from_dir(settings.log_dir.as_deref());
    let level = match (&settings.log_level, &target) {
        (Some(level), _) => level.as_str(),
        (None, LogTarget::Stderr) => STDERR_DEFAULT_LEVEL,
        (None, LogTarget::Directory(_)) => default_log_level(),
    };
    init_logging(level, target).map_err(CliError::Logging)
}

fn open_store(settings: &Settings) -> Result<SessionFactory, CliError> {
    let config = settings.store_config()?;
    let sessions = SessionFactory::open(&config)?;
    info!(
        "event=cli_bootstrap module=cli status=ok env={:?} mode={}",
        settings.env,
        config.target.mode()
    );
    Ok(sessions)
}

fn run_dataset(
    service: &ResourceService<DatasetRepository>,
    action: DatasetAction,
) -> Result<(), CliError> {
    match action {
        DatasetAction::Create { name, description } => {
            let created = service.create(DatasetCreate { name, description })?;
            print_json(&created)
        }
        DatasetAction::Get { id } => print_json(&service.get(id)?),
        DatasetAction::List { limit, offset } => {
            print_json(&service.list(ListParams { limit, offset })?)
        }
        DatasetAction::Update {
            id,
            name,
            description,
        } => {
            let updated = service.update(id, DatasetUpdate { name, description })?;
            print_json(&updated)
        }
        DatasetAction::Delete { id } => {
            service.delete(id)?;
            print_json(&json!({ "deleted": id }))
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
