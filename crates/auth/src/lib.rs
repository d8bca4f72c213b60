//! `permscope-auth`: hierarchical, scope-based permission resolution.
//!
//! This crate is decoupled from HTTP and storage: object trees, role
//! definitions, assignments and memberships come in through traits.

pub mod assignment;
pub mod audit;
pub mod authorize;
pub mod config;
pub mod error;
pub mod events;
pub mod filter;
pub mod handler;
pub mod operations;
pub mod roles;
pub mod scope_types;
pub mod setup;
pub mod standard;

pub use assignment::{
    AssignmentKey, AssignmentRepository, AssignmentResolver, MembershipDirectory, PurgeFilter,
    RoleAssignment, ScopedGrant,
};
pub use audit::{AuditSink, DenialEvent, TracingAuditSink};
pub use authorize::{PermissionManager, operation_policy, permitted_operations};
pub use config::PermissionsConfig;
pub use error::{AssignmentError, AuthzError, RegistryError, StoreError};
pub use events::PermissionEvent;
pub use filter::{EffectivePolicy, FilterTarget, ObjectFilter, apply};
pub use handler::{NewRoleAssignment, RoleAssignmentHandler};
pub use operations::{Operation, OperationName, OperationRegistry};
pub use roles::{OperationSet, Role, RoleId, RoleRepository, RoleStore};
pub use scope_types::{ScopeObjects, ScopeType, ScopeTypeRegistry};
pub use setup::{PermissionSystem, PermissionSystemBuilder};
