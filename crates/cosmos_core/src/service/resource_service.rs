//! Resource use-case service.
//!
//! # Responsibility
//! - Validate write inputs before they reach the repository.
//! - Delegate persistence to a `Crud` implementation.
//! - Translate repository failures into caller-facing outcomes.
//!
//! # Invariants
//! - Invalid input never reaches the repository.
//! - `NotFound` always maps to `ResourceMissing`; every other repository
//!   failure maps to `Failure`.

use crate::model::validation::{Validate, ValidationError};
use crate::repo::base::{Crud, ListParams};
use crate::repo::error::{NotFoundError, RepoError};
use log::{debug, error, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Caller-facing failure classes.
#[derive(Debug)]
pub enum ServiceError {
    /// Input was rejected by its own validation.
    Invalid(ValidationError),
    /// The addressed resource does not exist.
    ResourceMissing(NotFoundError),
    /// Store or data failure; details stay in logs.
    Failure(RepoError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Invalid(err) => write!(f, "{err}"),
            Self::ResourceMissing(err) => write!(f, "{err}"),
            Self::Failure(err) => write!(f, "internal failure: {err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Invalid(err) => Some(err),
            Self::ResourceMissing(err) => Some(err),
            Self::Failure(err) => Some(err),
        }
    }
}

impl From<ValidationError> for ServiceError {
    fn from(value: ValidationError) -> Self {
        Self::Invalid(value)
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(missing) => Self::ResourceMissing(missing),
            other => Self::Failure(other),
        }
    }
}

/// Use-case wrapper around one resource repository.
pub struct ResourceService<R: Crud> {
    repo: R,
}

impl<R> ResourceService<R>
where
    R: Crud,
    R::Create: Validate,
    R::Update: Validate,
{
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn create(&self, input: R::Create) -> ServiceResult<R::Model> {
        input.validate().map_err(|err| rejected::<R>("create", err))?;
        observe::<R, _>("create", self.repo.create(input))
    }

    pub fn get(&self, id: Uuid) -> ServiceResult<R::Model> {
        observe::<R, _>("get", self.repo.get(id))
    }

    /// Lists one page; `ListParams::default()` gives limit 100, offset 0.
    pub fn list(&self, params: ListParams) -> ServiceResult<Vec<R::Model>> {
        observe::<R, _>("list", self.repo.list(params.limit, params.offset))
    }

    pub fn update(&self, id: Uuid, input: R::Update) -> ServiceResult<R::Model> {
        input.validate().map_err(|err| rejected::<R>("update", err))?;
        observe::<R, _>("update", self.repo.update(id, input))
    }

    pub fn delete(&self, id: Uuid) -> ServiceResult<()> {
        observe::<R, _>("delete", self.repo.delete(id))
    }
}

fn rejected<R: Crud>(op: &str, err: ValidationError) -> ServiceError {
    warn!(
        "event=resource_call module=service kind={} op={} status=error error_code=invalid_input field={}",
        R::KIND,
        op,
        err.field
    );
    ServiceError::Invalid(err)
}

fn observe<R: Crud, T>(op: &str, result: Result<T, RepoError>) -> ServiceResult<T> {
    match result {
        Ok(value) => {
            debug!(
                "event=resource_call module=service kind={} op={} status=ok",
                R::KIND,
                op
            );
            Ok(value)
        }
        Err(RepoError::NotFound(missing)) => {
            warn!(
                "event=resource_call module=service kind={} op={} status=error error_code=not_found id={}",
                R::KIND,
                op,
                missing.id
            );
            Err(ServiceError::ResourceMissing(missing))
        }
        Err(err) => {
            error!(
                "event=resource_call module=service kind={} op={} status=error error_code=repository_failure error={}",
                R::KIND,
                op,
                err
            );
            Err(ServiceError::Failure(err))
        }
    }
}
