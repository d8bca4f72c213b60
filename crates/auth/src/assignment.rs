//! Role assignments: the persisted model, its storage ports, and the per-actor
//! resolution into an ordered list of scoped grants.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use permscope_core::{BoundaryId, ScopeRef, SubjectRef, TeamId, UserId};

use crate::config::PermissionsConfig;
use crate::error::{AuthzError, StoreError};
use crate::roles::{OperationSet, RoleId, RoleStore};
use crate::scope_types::ScopeTypeRegistry;

/// A role granted to a subject on one scope object inside a boundary.
///
/// `(boundary_id, subject, scope)` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub boundary_id: BoundaryId,
    pub subject: SubjectRef,
    pub role: RoleId,
    pub scope: ScopeRef,
}

impl RoleAssignment {
    pub fn new(
        boundary_id: BoundaryId,
        subject: SubjectRef,
        role: RoleId,
        scope: ScopeRef,
    ) -> Self {
        Self {
            boundary_id,
            subject,
            role,
            scope,
        }
    }

    pub fn key(&self) -> AssignmentKey {
        AssignmentKey {
            boundary_id: self.boundary_id,
            subject: self.subject,
            scope: self.scope.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssignmentKey {
    pub boundary_id: BoundaryId,
    pub subject: SubjectRef,
    pub scope: ScopeRef,
}

/// Selects assignments for cascading cleanup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurgeFilter {
    Subject(SubjectRef),
    Scope(ScopeRef),
    Boundary(BoundaryId),
    /// One subject's assignments inside one boundary.
    Member {
        boundary_id: BoundaryId,
        subject: SubjectRef,
    },
}

impl PurgeFilter {
    pub fn matches(&self, assignment: &RoleAssignment) -> bool {
        match self {
            PurgeFilter::Subject(subject) => &assignment.subject == subject,
            PurgeFilter::Scope(scope) => &assignment.scope == scope,
            PurgeFilter::Boundary(boundary_id) => &assignment.boundary_id == boundary_id,
            PurgeFilter::Member {
                boundary_id,
                subject,
            } => &assignment.boundary_id == boundary_id && &assignment.subject == subject,
        }
    }
}

/// Persistence port for [`RoleAssignment`]s.
///
/// Listing methods must return a stable order for identical contents.
pub trait AssignmentRepository: Send + Sync {
    /// Insert or replace the assignment for its key, returning the previous one.
    fn upsert(&self, assignment: RoleAssignment) -> Result<Option<RoleAssignment>, StoreError>;

    fn remove(&self, key: &AssignmentKey) -> Result<Option<RoleAssignment>, StoreError>;

    fn get(&self, key: &AssignmentKey) -> Result<Option<RoleAssignment>, StoreError>;

    fn for_subjects(
        &self,
        boundary_id: BoundaryId,
        subjects: &[SubjectRef],
    ) -> Result<Vec<RoleAssignment>, StoreError>;

    fn at_scope(
        &self,
        boundary_id: BoundaryId,
        scope: &ScopeRef,
    ) -> Result<Vec<RoleAssignment>, StoreError>;

    /// Delete every matching assignment and return what was deleted.
    fn purge(&self, filter: &PurgeFilter) -> Result<Vec<RoleAssignment>, StoreError>;
}

impl<T> AssignmentRepository for Arc<T>
where
    T: AssignmentRepository + ?Sized,
{
    fn upsert(&self, assignment: RoleAssignment) -> Result<Option<RoleAssignment>, StoreError> {
        (**self).upsert(assignment)
    }

    fn remove(&self, key: &AssignmentKey) -> Result<Option<RoleAssignment>, StoreError> {
        (**self).remove(key)
    }

    fn get(&self, key: &AssignmentKey) -> Result<Option<RoleAssignment>, StoreError> {
        (**self).get(key)
    }

    fn for_subjects(
        &self,
        boundary_id: BoundaryId,
        subjects: &[SubjectRef],
    ) -> Result<Vec<RoleAssignment>, StoreError> {
        (**self).for_subjects(boundary_id, subjects)
    }

    fn at_scope(
        &self,
        boundary_id: BoundaryId,
        scope: &ScopeRef,
    ) -> Result<Vec<RoleAssignment>, StoreError> {
        (**self).at_scope(boundary_id, scope)
    }

    fn purge(&self, filter: &PurgeFilter) -> Result<Vec<RoleAssignment>, StoreError> {
        (**self).purge(filter)
    }
}

/// Port to the legacy flat membership subsystem.
///
/// A user is a member of a boundary iff it has a membership flag there.
pub trait MembershipDirectory: Send + Sync {
    fn member_flag(&self, boundary_id: BoundaryId, user: UserId)
        -> Result<Option<String>, StoreError>;

    /// Overwrite the flag of an existing member. Returns the previous flag, or
    /// `None` (and changes nothing) if the user is not a member.
    fn set_member_flag(
        &self,
        boundary_id: BoundaryId,
        user: UserId,
        flag: String,
    ) -> Result<Option<String>, StoreError>;

    fn members(&self, boundary_id: BoundaryId) -> Result<Vec<(UserId, String)>, StoreError>;

    fn teams_of(&self, boundary_id: BoundaryId, user: UserId) -> Result<Vec<TeamId>, StoreError>;

    fn team_in_boundary(&self, boundary_id: BoundaryId, team: TeamId) -> Result<bool, StoreError>;
}

impl<T> MembershipDirectory for Arc<T>
where
    T: MembershipDirectory + ?Sized,
{
    fn member_flag(
        &self,
        boundary_id: BoundaryId,
        user: UserId,
    ) -> Result<Option<String>, StoreError> {
        (**self).member_flag(boundary_id, user)
    }

    fn set_member_flag(
        &self,
        boundary_id: BoundaryId,
        user: UserId,
        flag: String,
    ) -> Result<Option<String>, StoreError> {
        (**self).set_member_flag(boundary_id, user, flag)
    }

    fn members(&self, boundary_id: BoundaryId) -> Result<Vec<(UserId, String)>, StoreError> {
        (**self).members(boundary_id)
    }

    fn teams_of(&self, boundary_id: BoundaryId, user: UserId) -> Result<Vec<TeamId>, StoreError> {
        (**self).teams_of(boundary_id, user)
    }

    fn team_in_boundary(&self, boundary_id: BoundaryId, team: TeamId) -> Result<bool, StoreError> {
        (**self).team_in_boundary(boundary_id, team)
    }
}

/// Roles in effect on one scope object, with their operations already expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopedGrant {
    pub scope: ScopeRef,
    pub roles: Vec<RoleId>,
    pub operations: Arc<OperationSet>,
}

/// Turns stored assignments and membership flags into the ordered grant list
/// the resolver walks.
#[derive(Clone)]
pub struct AssignmentResolver {
    config: Arc<PermissionsConfig>,
    scope_types: Arc<ScopeTypeRegistry>,
    roles: Arc<RoleStore>,
    assignments: Arc<dyn AssignmentRepository>,
    membership: Arc<dyn MembershipDirectory>,
}

impl AssignmentResolver {
    pub fn new(
        config: Arc<PermissionsConfig>,
        scope_types: Arc<ScopeTypeRegistry>,
        roles: Arc<RoleStore>,
        assignments: Arc<dyn AssignmentRepository>,
        membership: Arc<dyn MembershipDirectory>,
    ) -> Self {
        Self {
            config,
            scope_types,
            roles,
            assignments,
            membership,
        }
    }

    pub fn config(&self) -> &PermissionsConfig {
        &self.config
    }

    pub fn scope_types(&self) -> &ScopeTypeRegistry {
        &self.scope_types
    }

    pub fn roles(&self) -> &RoleStore {
        &self.roles
    }

    pub fn assignments(&self) -> &Arc<dyn AssignmentRepository> {
        &self.assignments
    }

    pub fn membership(&self) -> &Arc<dyn MembershipDirectory> {
        &self.membership
    }

    /// The boundary itself as a scope instance.
    pub fn boundary_scope(&self, boundary_id: BoundaryId) -> ScopeRef {
        ScopeRef::boundary(self.config.boundary_scope_type.clone(), boundary_id)
    }

    /// Role a user holds through its membership flag.
    ///
    /// Non-members and unknown flags resolve to the no-access role.
    pub fn top_level_role(
        &self,
        boundary_id: BoundaryId,
        user: UserId,
    ) -> Result<RoleId, AuthzError> {
        let Some(flag) = self.membership.member_flag(boundary_id, user)? else {
            return Ok(self.config.no_access_role.clone());
        };

        let role = self.config.role_for_member_flag(&flag);
        if self.roles.exists(&role)? {
            Ok(role)
        } else {
            tracing::warn!(
                boundary_id = %boundary_id,
                user_id = %user,
                flag = %flag,
                "unknown membership flag, falling back to no access"
            );
            Ok(self.config.no_access_role.clone())
        }
    }

    /// Only users carry administrative membership.
    pub fn is_admin(
        &self,
        subject: &SubjectRef,
        boundary_id: BoundaryId,
    ) -> Result<bool, AuthzError> {
        match subject.as_user() {
            Some(user) => Ok(self.top_level_role(boundary_id, user)? == self.config.admin_role),
            None => Ok(false),
        }
    }

    /// Subjects whose assignments apply to `subject`: itself plus, for users,
    /// the teams it belongs to in the boundary.
    pub fn effective_subjects(
        &self,
        subject: &SubjectRef,
        boundary_id: BoundaryId,
    ) -> Result<Vec<SubjectRef>, AuthzError> {
        let mut subjects = vec![*subject];
        if let Some(user) = subject.as_user() {
            subjects.extend(
                self.membership
                    .teams_of(boundary_id, user)?
                    .into_iter()
                    .map(SubjectRef::Team),
            );
        }
        Ok(subjects)
    }

    /// Roles per scope, boundary first, then from broadest to narrowest scope
    /// type. Scopes of equal depth keep repository order.
    ///
    /// At one scope, a user's own assignment beats its teams' assignments;
    /// assignments of equal priority are merged.
    pub fn roles_per_scope(
        &self,
        subject: &SubjectRef,
        boundary_id: BoundaryId,
    ) -> Result<Vec<(ScopeRef, Vec<RoleId>)>, AuthzError> {
        let boundary_scope = self.boundary_scope(boundary_id);
        let subjects = self.effective_subjects(subject, boundary_id)?;
        let rows = self.assignments.for_subjects(boundary_id, &subjects)?;

        let mut entries: Vec<(ScopeRef, u8, Vec<RoleId>)> = Vec::new();
        let mut index: HashMap<ScopeRef, usize> = HashMap::new();

        for row in rows {
            if row.role == self.config.low_priority_role {
                continue;
            }
            if !self.scope_types.contains(&row.scope.scope_type) {
                tracing::warn!(
                    scope = %row.scope,
                    "assignment on unregistered scope type ignored"
                );
                continue;
            }
            if row.scope != boundary_scope && !self.scope_types.exists(&row.scope) {
                tracing::debug!(scope = %row.scope, "assignment scope no longer exists, ignored");
                continue;
            }

            let priority = row.subject.priority();
            match index.get(&row.scope) {
                None => {
                    index.insert(row.scope.clone(), entries.len());
                    entries.push((row.scope, priority, vec![row.role]));
                }
                Some(&at) => {
                    let (_, existing, roles) = &mut entries[at];
                    if priority < *existing {
                        *existing = priority;
                        *roles = vec![row.role];
                    } else if priority == *existing && !roles.contains(&row.role) {
                        roles.push(row.role);
                    }
                }
            }
        }

        let inherited = index.get(&boundary_scope).map(|&at| entries.remove(at).2);

        let boundary_roles = match subject.as_user() {
            Some(user) => {
                let top = self.top_level_role(boundary_id, user)?;
                if top == self.config.low_priority_role {
                    inherited
                        .filter(|roles| !roles.is_empty())
                        .unwrap_or_else(|| vec![self.config.no_access_role.clone()])
                } else {
                    vec![top]
                }
            }
            None => inherited
                .filter(|roles| !roles.is_empty())
                .unwrap_or_else(|| vec![self.config.no_access_role.clone()]),
        };

        entries.sort_by_key(|(scope, _, _)| self.scope_types.depth(&scope.scope_type));

        let mut ordered = Vec::with_capacity(entries.len() + 1);
        ordered.push((boundary_scope, boundary_roles));
        ordered.extend(entries.into_iter().map(|(scope, _, roles)| (scope, roles)));
        Ok(ordered)
    }

    /// Ordered grants with operation sets expanded through the role store.
    ///
    /// Unknown roles are dropped from their scope; the scope stays in the list
    /// with whatever the remaining roles grant.
    pub fn assignments_for(
        &self,
        subject: &SubjectRef,
        boundary_id: BoundaryId,
    ) -> Result<Vec<ScopedGrant>, AuthzError> {
        let per_scope = self.roles_per_scope(subject, boundary_id)?;
        let mut grants = Vec::with_capacity(per_scope.len());

        for (scope, roles) in per_scope {
            let mut sets = Vec::with_capacity(roles.len());
            for role in &roles {
                match self.roles.operations_for(role) {
                    Ok(ops) => sets.push(ops),
                    Err(err) => {
                        tracing::warn!(role = %role, scope = %scope, error = %err, "role ignored");
                    }
                }
            }

            let operations = match sets.len() {
                0 => Arc::new(OperationSet::new()),
                1 => sets.remove(0),
                _ => Arc::new(sets.iter().flat_map(|s| s.iter().cloned()).collect()),
            };

            grants.push(ScopedGrant {
                scope,
                roles,
                operations,
            });
        }

        Ok(grants)
    }
}

impl core::fmt::Debug for AssignmentResolver {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AssignmentResolver")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
