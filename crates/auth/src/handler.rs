//! Administrative role assignment: create, update, remove, list, and the
//! cascading cleanup triggered by deletions elsewhere.
//!
//! Boundary-level roles of users are not stored as assignments. They live in
//! the legacy membership flag so other consumers of that flag keep working.

use std::collections::BTreeSet;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use permscope_core::{BoundaryId, ScopeRef, SubjectRef, UserId};
use permscope_events::{EventBus, EventEnvelope};

use crate::assignment::{AssignmentKey, AssignmentResolver, PurgeFilter, RoleAssignment};
use crate::error::{AssignmentError, RegistryError};
use crate::events::PermissionEvent;
use crate::roles::RoleId;

/// One entry of a batch assignment. `role: None` removes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRoleAssignment {
    pub subject: SubjectRef,
    pub role: Option<RoleId>,
    #[serde(default)]
    pub scope: Option<ScopeRef>,
}

pub struct RoleAssignmentHandler<B> {
    resolver: AssignmentResolver,
    bus: B,
}

impl<B> RoleAssignmentHandler<B>
where
    B: EventBus<EventEnvelope<PermissionEvent>>,
{
    pub fn new(resolver: AssignmentResolver, bus: B) -> Self {
        Self { resolver, bus }
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    fn is_boundary_user(
        &self,
        subject: &SubjectRef,
        boundary_id: BoundaryId,
        scope: &ScopeRef,
    ) -> Option<UserId> {
        if scope == &self.resolver.boundary_scope(boundary_id) {
            subject.as_user()
        } else {
            None
        }
    }

    /// The role `subject` holds directly on `scope` (the boundary when `None`).
    pub fn current_role_assignment(
        &self,
        subject: SubjectRef,
        boundary_id: BoundaryId,
        scope: Option<ScopeRef>,
    ) -> Result<Option<RoleAssignment>, AssignmentError> {
        let scope = scope.unwrap_or_else(|| self.resolver.boundary_scope(boundary_id));

        if let Some(user) = self.is_boundary_user(&subject, boundary_id, &scope) {
            let Some(flag) = self.resolver.membership().member_flag(boundary_id, user)? else {
                return Ok(None);
            };
            let role = self.role_for_flag(&flag)?;
            return Ok(Some(RoleAssignment::new(boundary_id, subject, role, scope)));
        }

        Ok(self.resolver.assignments().get(&AssignmentKey {
            boundary_id,
            subject,
            scope,
        })?)
    }

    /// Grant `role` to `subject` on `scope` (the boundary when `None`),
    /// replacing whatever it held there. `role: None` removes instead.
    pub fn assign_role(
        &self,
        subject: SubjectRef,
        boundary_id: BoundaryId,
        role: Option<RoleId>,
        scope: Option<ScopeRef>,
    ) -> Result<Option<RoleAssignment>, AssignmentError> {
        let scope = scope.unwrap_or_else(|| self.resolver.boundary_scope(boundary_id));

        let Some(role) = role else {
            self.remove_role(subject, boundary_id, Some(scope))?;
            return Ok(None);
        };

        self.ensure_subject_in_boundary(&subject, boundary_id)?;
        self.ensure_scope_in_boundary(&scope, boundary_id)?;
        if !self.resolver.roles().exists(&role)? {
            return Err(RegistryError::UnknownRole(role).into());
        }

        if let Some(user) = self.is_boundary_user(&subject, boundary_id, &scope) {
            let flag = self.resolver.config().member_flag_for_role(&role);
            let previous = self
                .resolver
                .membership()
                .set_member_flag(boundary_id, user, flag)?;

            tracing::info!(
                boundary_id = %boundary_id,
                user_id = %user,
                role = %role,
                "boundary role updated"
            );

            let previous_role = previous.map(|flag| self.role_for_flag(&flag)).transpose()?;
            self.announce_change(boundary_id, &subject, &scope, previous_role, Some(role.clone()));
            return Ok(Some(RoleAssignment::new(boundary_id, subject, role, scope)));
        }

        let assignment = RoleAssignment::new(boundary_id, subject, role.clone(), scope.clone());
        let previous = self.resolver.assignments().upsert(assignment.clone())?;

        tracing::info!(
            boundary_id = %boundary_id,
            subject = %subject,
            scope = %scope,
            role = %role,
            "role assigned"
        );

        self.announce_change(boundary_id, &subject, &scope, previous.map(|a| a.role), Some(role));
        Ok(Some(assignment))
    }

    /// Drop the role `subject` holds on `scope`. At boundary scope a user's
    /// membership flag is downgraded to no access instead.
    pub fn remove_role(
        &self,
        subject: SubjectRef,
        boundary_id: BoundaryId,
        scope: Option<ScopeRef>,
    ) -> Result<(), AssignmentError> {
        let scope = scope.unwrap_or_else(|| self.resolver.boundary_scope(boundary_id));

        if let Some(user) = self.is_boundary_user(&subject, boundary_id, &scope) {
            let no_access = self.resolver.config().no_access_role.clone();
            let flag = self.resolver.config().member_flag_for_role(&no_access);
            let previous = self
                .resolver
                .membership()
                .set_member_flag(boundary_id, user, flag)?;

            if let Some(previous) = previous {
                let previous_role = self.role_for_flag(&previous)?;
                if previous_role == no_access {
                    return Ok(());
                }
                tracing::info!(
                    boundary_id = %boundary_id,
                    user_id = %user,
                    "boundary role revoked"
                );
                self.announce_change(boundary_id, &subject, &scope, Some(previous_role), None);
            }
            return Ok(());
        }

        let key = AssignmentKey {
            boundary_id,
            subject,
            scope,
        };
        if let Some(removed) = self.resolver.assignments().remove(&key)? {
            tracing::info!(
                boundary_id = %boundary_id,
                subject = %subject,
                scope = %removed.scope,
                "role removed"
            );
            self.announce_change(boundary_id, &subject, &removed.scope, Some(removed.role), None);
        }
        Ok(())
    }

    /// Apply several assignments in order, stopping at the first failure.
    pub fn assign_role_batch(
        &self,
        boundary_id: BoundaryId,
        assignments: Vec<NewRoleAssignment>,
    ) -> Result<Vec<Option<RoleAssignment>>, AssignmentError> {
        assignments
            .into_iter()
            .map(|a| self.assign_role(a.subject, boundary_id, a.role, a.scope))
            .collect()
    }

    /// Assignments held directly on `scope` (the boundary when `None`).
    ///
    /// At boundary scope every member is listed with its membership role,
    /// followed by stored team assignments.
    pub fn role_assignments_at(
        &self,
        boundary_id: BoundaryId,
        scope: Option<ScopeRef>,
    ) -> Result<Vec<RoleAssignment>, AssignmentError> {
        let boundary_scope = self.resolver.boundary_scope(boundary_id);
        let scope = scope.unwrap_or_else(|| boundary_scope.clone());
        let stored = self.resolver.assignments().at_scope(boundary_id, &scope)?;

        if scope != boundary_scope {
            return Ok(stored);
        }

        let mut listed = Vec::new();
        for (user, flag) in self.resolver.membership().members(boundary_id)? {
            let role = self.role_for_flag(&flag)?;
            listed.push(RoleAssignment::new(
                boundary_id,
                SubjectRef::User(user),
                role,
                scope.clone(),
            ));
        }
        listed.extend(stored.into_iter().filter(|a| a.subject.as_user().is_none()));
        Ok(listed)
    }

    /// Cleanup after a user or team was deleted.
    pub fn subject_deleted(&self, subject: SubjectRef) -> Result<usize, AssignmentError> {
        self.purge(PurgeFilter::Subject(subject))
    }

    /// Cleanup after a scope object was deleted.
    pub fn scope_deleted(&self, scope: &ScopeRef) -> Result<usize, AssignmentError> {
        self.purge(PurgeFilter::Scope(scope.clone()))
    }

    pub fn boundary_deleted(&self, boundary_id: BoundaryId) -> Result<usize, AssignmentError> {
        self.purge(PurgeFilter::Boundary(boundary_id))
    }

    /// Cleanup after a user left a boundary.
    pub fn member_removed(
        &self,
        boundary_id: BoundaryId,
        user: UserId,
    ) -> Result<usize, AssignmentError> {
        self.purge(PurgeFilter::Member {
            boundary_id,
            subject: SubjectRef::User(user),
        })
    }

    fn purge(&self, filter: PurgeFilter) -> Result<usize, AssignmentError> {
        let removed = self.resolver.assignments().purge(&filter)?;
        if removed.is_empty() {
            return Ok(0);
        }

        tracing::info!(filter = ?filter, removed = removed.len(), "role assignments purged");

        let mut touched = BTreeSet::new();
        for assignment in &removed {
            self.publish(
                assignment.boundary_id,
                PermissionEvent::AssignmentDeleted {
                    subject: assignment.subject,
                    scope: assignment.scope.clone(),
                    role: assignment.role.clone(),
                    occurred_at: Utc::now(),
                },
            );
            touched.insert((assignment.boundary_id, assignment.subject));
        }
        for (boundary_id, subject) in touched {
            self.publish(
                boundary_id,
                PermissionEvent::PermissionsUpdated {
                    subject,
                    boundary_id,
                    occurred_at: Utc::now(),
                },
            );
        }

        Ok(removed.len())
    }

    fn role_for_flag(&self, flag: &str) -> Result<RoleId, AssignmentError> {
        let role = self.resolver.config().role_for_member_flag(flag);
        if self.resolver.roles().exists(&role)? {
            Ok(role)
        } else {
            Ok(self.resolver.config().no_access_role.clone())
        }
    }

    fn ensure_subject_in_boundary(
        &self,
        subject: &SubjectRef,
        boundary_id: BoundaryId,
    ) -> Result<(), AssignmentError> {
        let membership = self.resolver.membership();
        let present = match subject {
            SubjectRef::User(user) => membership.member_flag(boundary_id, *user)?.is_some(),
            SubjectRef::Team(team) => membership.team_in_boundary(boundary_id, *team)?,
        };

        if present {
            Ok(())
        } else {
            Err(AssignmentError::SubjectNotInBoundary {
                subject: *subject,
                boundary: boundary_id,
            })
        }
    }

    fn ensure_scope_in_boundary(
        &self,
        scope: &ScopeRef,
        boundary_id: BoundaryId,
    ) -> Result<(), AssignmentError> {
        let boundary_scope = self.resolver.boundary_scope(boundary_id);
        let scope_types = self.resolver.scope_types();
        if scope == &boundary_scope || scope_types.scope_includes_object(&boundary_scope, scope) {
            Ok(())
        } else {
            Err(AssignmentError::ScopeNotInBoundary {
                scope: scope.clone(),
                boundary: boundary_id,
            })
        }
    }

    fn announce_change(
        &self,
        boundary_id: BoundaryId,
        subject: &SubjectRef,
        scope: &ScopeRef,
        previous: Option<RoleId>,
        current: Option<RoleId>,
    ) {
        let occurred_at = Utc::now();
        let event = match (previous, current) {
            (None, Some(role)) => PermissionEvent::AssignmentCreated {
                subject: *subject,
                scope: scope.clone(),
                role,
                occurred_at,
            },
            (Some(previous_role), Some(role)) if previous_role != role => {
                PermissionEvent::AssignmentUpdated {
                    subject: *subject,
                    scope: scope.clone(),
                    previous_role,
                    role,
                    occurred_at,
                }
            }
            (Some(role), None) => PermissionEvent::AssignmentDeleted {
                subject: *subject,
                scope: scope.clone(),
                role,
                occurred_at,
            },
            _ => return,
        };

        self.publish(boundary_id, event);
        self.publish(
            boundary_id,
            PermissionEvent::PermissionsUpdated {
                subject: *subject,
                boundary_id,
                occurred_at,
            },
        );
    }

    /// Notification failures never undo a committed change.
    fn publish(&self, boundary_id: BoundaryId, event: PermissionEvent) {
        let envelope = EventEnvelope::wrap(boundary_id, event);
        if let Err(err) = self.bus.publish(envelope) {
            tracing::warn!(
                boundary_id = %boundary_id,
                error = ?err,
                "permission event not published"
            );
        }
    }
}

impl<B> core::fmt::Debug for RoleAssignmentHandler<B> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RoleAssignmentHandler").finish_non_exhaustive()
    }
}
