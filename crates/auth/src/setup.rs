//! Startup wiring: register the schema, seed roles, validate, and hand out
//! the resolver and the assignment handler.
//!
//! A [`PermissionSystem`] only exists once every registration is consistent,
//! so a process that fails here never serves a permission check.

use std::sync::Arc;

use permscope_core::ScopeTypeName;
use permscope_events::{EventBus, EventEnvelope};

use crate::assignment::{AssignmentRepository, AssignmentResolver, MembershipDirectory};
use crate::audit::{AuditSink, TracingAuditSink};
use crate::authorize::PermissionManager;
use crate::config::PermissionsConfig;
use crate::error::RegistryError;
use crate::events::PermissionEvent;
use crate::handler::RoleAssignmentHandler;
use crate::operations::{Operation, OperationRegistry};
use crate::roles::{Role, RoleRepository, RoleStore};
use crate::scope_types::{ScopeObjects, ScopeType, ScopeTypeRegistry};
use crate::standard;

pub struct PermissionSystemBuilder {
    config: PermissionsConfig,
    scope_types: ScopeTypeRegistry,
    operations: OperationRegistry,
    seed_roles: Vec<Role>,
    roles: Option<Arc<dyn RoleRepository>>,
    assignments: Option<Arc<dyn AssignmentRepository>>,
    membership: Option<Arc<dyn MembershipDirectory>>,
    audit: Arc<dyn AuditSink>,
}

impl PermissionSystemBuilder {
    pub fn new(config: PermissionsConfig) -> Self {
        Self {
            config,
            scope_types: ScopeTypeRegistry::new(),
            operations: OperationRegistry::new(),
            seed_roles: Vec::new(),
            roles: None,
            assignments: None,
            membership: None,
            audit: Arc::new(TracingAuditSink),
        }
    }

    pub fn scope_type(mut self, scope_type: ScopeType) -> Result<Self, RegistryError> {
        self.scope_types.register(scope_type)?;
        Ok(self)
    }

    pub fn operation(mut self, operation: Operation) -> Result<Self, RegistryError> {
        self.operations.register(operation, &self.scope_types)?;
        Ok(self)
    }

    /// Queue a role to be written to the role repository at build time.
    ///
    /// Its operations must already be registered.
    pub fn seed_role(mut self, role: Role) -> Result<Self, RegistryError> {
        let operations = &self.operations;
        if let Some(unknown) = role.operations.iter().find(|op| !operations.contains(op.as_str())) {
            return Err(RegistryError::RoleGrantsUnknownOperation {
                role: role.id.clone(),
                operation: unknown.clone(),
            });
        }
        self.seed_roles.push(role);
        Ok(self)
    }

    /// Register the built-in workspace hierarchy, its operations and default
    /// roles. `objects` supplies storage for each scope type.
    pub fn standard_catalog<F>(mut self, objects: F) -> Result<Self, RegistryError>
    where
        F: Fn(&ScopeTypeName) -> Arc<dyn ScopeObjects>,
    {
        for (name, parent) in standard::scope_hierarchy() {
            let storage = objects(&name);
            self = self.scope_type(ScopeType::new(name, parent, storage))?;
        }
        for operation in standard::operations() {
            self = self.operation(operation)?;
        }
        for role in standard::default_roles() {
            self = self.seed_role(role)?;
        }
        Ok(self)
    }

    pub fn role_repository(mut self, roles: Arc<dyn RoleRepository>) -> Self {
        self.roles = Some(roles);
        self
    }

    pub fn assignment_repository(mut self, assignments: Arc<dyn AssignmentRepository>) -> Self {
        self.assignments = Some(assignments);
        self
    }

    pub fn membership_directory(mut self, membership: Arc<dyn MembershipDirectory>) -> Self {
        self.membership = Some(membership);
        self
    }

    pub fn audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn build(self) -> Result<PermissionSystem, RegistryError> {
        let roles = self.roles.ok_or(RegistryError::MissingComponent("role repository"))?;
        let assignments = self
            .assignments
            .ok_or(RegistryError::MissingComponent("assignment repository"))?;
        let membership = self
            .membership
            .ok_or(RegistryError::MissingComponent("membership directory"))?;

        self.scope_types.get(&self.config.boundary_scope_type)?;

        // Seeding is an upsert, so restarts rewrite the same definitions.
        for role in self.seed_roles {
            roles.upsert(role)?;
        }

        let all_roles = roles.all()?;
        for role in &all_roles {
            let unknown = role
                .operations
                .iter()
                .find(|op| !self.operations.contains(op.as_str()));
            if let Some(unknown) = unknown {
                return Err(RegistryError::RoleGrantsUnknownOperation {
                    role: role.id.clone(),
                    operation: unknown.clone(),
                });
            }
        }
        for required in [
            &self.config.admin_role,
            &self.config.baseline_read_role,
            &self.config.no_access_role,
        ] {
            if !all_roles.iter().any(|role| &role.id == required) {
                return Err(RegistryError::UnknownRole(required.clone()));
            }
        }

        let config = Arc::new(self.config);
        let scope_types = Arc::new(self.scope_types);
        let operations = Arc::new(self.operations);
        let role_store = Arc::new(RoleStore::new(roles, config.baseline_read_role.clone()));

        let resolver = AssignmentResolver::new(
            config.clone(),
            scope_types.clone(),
            role_store.clone(),
            assignments,
            membership,
        );
        let manager = PermissionManager::new(resolver.clone(), operations.clone(), self.audit);

        tracing::info!(
            boundary_scope_type = %config.boundary_scope_type,
            scope_types = scope_types.all().count(),
            operations = operations.len(),
            roles = all_roles.len(),
            strict_context_checks = config.strict_context_checks,
            "permission system ready"
        );

        Ok(PermissionSystem {
            config,
            scope_types,
            operations,
            roles: role_store,
            resolver,
            manager,
        })
    }
}

/// Validated, shareable permission engine.
#[derive(Clone)]
pub struct PermissionSystem {
    config: Arc<PermissionsConfig>,
    scope_types: Arc<ScopeTypeRegistry>,
    operations: Arc<OperationRegistry>,
    roles: Arc<RoleStore>,
    resolver: AssignmentResolver,
    manager: PermissionManager,
}

impl PermissionSystem {
    pub fn builder(config: PermissionsConfig) -> PermissionSystemBuilder {
        PermissionSystemBuilder::new(config)
    }

    pub fn manager(&self) -> &PermissionManager {
        &self.manager
    }

    pub fn resolver(&self) -> &AssignmentResolver {
        &self.resolver
    }

    pub fn config(&self) -> &PermissionsConfig {
        &self.config
    }

    pub fn scope_types(&self) -> &ScopeTypeRegistry {
        &self.scope_types
    }

    pub fn operations(&self) -> &OperationRegistry {
        &self.operations
    }

    pub fn roles(&self) -> &RoleStore {
        &self.roles
    }

    /// Assignment administration publishing its notifications on `bus`.
    pub fn assignment_handler<B>(&self, bus: B) -> RoleAssignmentHandler<B>
    where
        B: EventBus<EventEnvelope<PermissionEvent>>,
    {
        RoleAssignmentHandler::new(self.resolver.clone(), bus)
    }
}

impl core::fmt::Debug for PermissionSystem {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PermissionSystem")
            .field("config", &self.config)
            .field("scope_types", &self.scope_types)
            .finish_non_exhaustive()
    }
}
