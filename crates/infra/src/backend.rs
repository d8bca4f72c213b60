//! One-stop in-memory wiring of every storage port.

use std::sync::Arc;

use permscope_auth::{PermissionSystem, PermissionSystemBuilder, PermissionsConfig, RegistryError};

use crate::assignments::InMemoryAssignmentRepository;
use crate::audit::MemoryAuditSink;
use crate::membership::InMemoryMembershipDirectory;
use crate::object_tree::InMemoryObjectTree;
use crate::roles::InMemoryRoleRepository;

/// In-memory storage shared by a [`PermissionSystem`] and the code feeding it.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    pub tree: Arc<InMemoryObjectTree>,
    pub roles: Arc<InMemoryRoleRepository>,
    pub assignments: Arc<InMemoryAssignmentRepository>,
    pub membership: Arc<InMemoryMembershipDirectory>,
    pub audit: Arc<MemoryAuditSink>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder with every repository of this backend plugged in and nothing
    /// registered yet.
    pub fn builder(&self, config: PermissionsConfig) -> PermissionSystemBuilder {
        PermissionSystem::builder(config)
            .role_repository(self.roles.clone())
            .assignment_repository(self.assignments.clone())
            .membership_directory(self.membership.clone())
            .audit_sink(self.audit.clone())
    }

    /// The built-in workspace catalog over this backend's object tree.
    pub fn standard_system(
        &self,
        config: PermissionsConfig,
    ) -> Result<PermissionSystem, RegistryError> {
        let tree = self.tree.clone();
        self.builder(config)
            .standard_catalog(|scope_type| tree.scope_objects(scope_type.clone()))?
            .build()
    }
}
