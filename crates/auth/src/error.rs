//! Error taxonomy for the permission engine.
//!
//! - [`RegistryError`]: configuration problems, fatal at startup.
//! - [`AuthzError`]: request-time outcomes of `check`/`policy`.
//! - [`AssignmentError`]: administrative role assignment failures.
//! - [`StoreError`]: storage adapters failing underneath any of the above.

use thiserror::Error;

use permscope_core::{BoundaryId, DomainError, ScopeRef, ScopeTypeName, SubjectRef};

use crate::operations::OperationName;
use crate::roles::RoleId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("unknown scope type '{0}'")]
    UnknownScopeType(ScopeTypeName),

    #[error("scope type '{name}' declares unknown parent '{parent}'")]
    UnknownParentScopeType {
        name: ScopeTypeName,
        parent: ScopeTypeName,
    },

    #[error("scope type '{0}' is already registered with a different parent")]
    DuplicateScopeType(ScopeTypeName),

    #[error("unknown operation '{0}'")]
    UnknownOperation(String),

    #[error("operation '{0}' is already registered with different scopes")]
    DuplicateOperation(OperationName),

    #[error("unknown role '{0}'")]
    UnknownRole(RoleId),

    #[error("role '{role}' grants unknown operation '{operation}'")]
    RoleGrantsUnknownOperation { role: RoleId, operation: OperationName },

    #[error("permission system is missing its {0}")]
    MissingComponent(&'static str),

    #[error("invalid configuration value for {key}: {value}")]
    InvalidConfig { key: &'static str, value: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn poisoned(what: &str) -> Self {
        Self::Unavailable(format!("{what} lock poisoned"))
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    /// The expected, user-facing denial. Never retried.
    #[error("permission denied: {actor} may not '{operation}'")]
    PermissionDenied {
        actor: SubjectRef,
        operation: OperationName,
    },

    #[error("operation '{operation}' expects a '{expected}' context, got '{actual}'")]
    ContextTypeMismatch {
        operation: OperationName,
        expected: ScopeTypeName,
        actual: ScopeTypeName,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl AuthzError {
    pub fn is_denied(&self) -> bool {
        matches!(self, AuthzError::PermissionDenied { .. })
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AssignmentError {
    #[error("{subject} is not part of boundary {boundary}")]
    SubjectNotInBoundary {
        subject: SubjectRef,
        boundary: BoundaryId,
    },

    #[error("scope {scope} does not exist in boundary {boundary}")]
    ScopeNotInBoundary { scope: ScopeRef, boundary: BoundaryId },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
