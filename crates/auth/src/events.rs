//! Change notifications for role assignments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use permscope_core::{BoundaryId, ScopeRef, SubjectRef};
use permscope_events::Event;

use crate::roles::RoleId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PermissionEvent {
    AssignmentCreated {
        subject: SubjectRef,
        scope: ScopeRef,
        role: RoleId,
        occurred_at: DateTime<Utc>,
    },
    AssignmentUpdated {
        subject: SubjectRef,
        scope: ScopeRef,
        previous_role: RoleId,
        role: RoleId,
        occurred_at: DateTime<Utc>,
    },
    AssignmentDeleted {
        subject: SubjectRef,
        scope: ScopeRef,
        role: RoleId,
        occurred_at: DateTime<Utc>,
    },
    /// Permissions of `subject` in the boundary may have changed.
    PermissionsUpdated {
        subject: SubjectRef,
        boundary_id: BoundaryId,
        occurred_at: DateTime<Utc>,
    },
}

impl PermissionEvent {
    pub fn subject(&self) -> &SubjectRef {
        match self {
            PermissionEvent::AssignmentCreated { subject, .. }
            | PermissionEvent::AssignmentUpdated { subject, .. }
            | PermissionEvent::AssignmentDeleted { subject, .. }
            | PermissionEvent::PermissionsUpdated { subject, .. } => subject,
        }
    }
}

impl Event for PermissionEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PermissionEvent::AssignmentCreated { .. } => "permissions.role_assignment.created",
            PermissionEvent::AssignmentUpdated { .. } => "permissions.role_assignment.updated",
            PermissionEvent::AssignmentDeleted { .. } => "permissions.role_assignment.deleted",
            PermissionEvent::PermissionsUpdated { .. } => "permissions.updated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PermissionEvent::AssignmentCreated { occurred_at, .. }
            | PermissionEvent::AssignmentUpdated { occurred_at, .. }
            | PermissionEvent::AssignmentDeleted { occurred_at, .. }
            | PermissionEvent::PermissionsUpdated { occurred_at, .. } => *occurred_at,
        }
    }
}
