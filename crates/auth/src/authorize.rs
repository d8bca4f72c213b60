use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use permscope_core::{BoundaryId, ScopeRef, SubjectRef};

use crate::assignment::{AssignmentResolver, ScopedGrant};
use crate::audit::{AuditSink, DenialEvent};
use crate::error::{AuthzError, RegistryError};
use crate::filter::{EffectivePolicy, FilterTarget, apply};
use crate::operations::{Operation, OperationName, OperationRegistry};
use crate::roles::{OperationSet, RoleId};
use crate::scope_types::ScopeTypeRegistry;

/// Operations permitted on `context`, given grants ordered broadest first.
///
/// - A grant whose scope contains `context` replaces the working set.
/// - A non-empty grant below `context` adds `baseline` so the actor can
///   navigate down to it.
///
/// No IO beyond parent lookups, no panics.
pub fn permitted_operations(
    scope_types: &ScopeTypeRegistry,
    grants: &[ScopedGrant],
    context: &ScopeRef,
    baseline: &OperationSet,
) -> OperationSet {
    let mut permitted = OperationSet::new();

    for grant in grants {
        if scope_types.scope_includes_object(&grant.scope, context) {
            permitted = (*grant.operations).clone();
        } else if !grant.operations.is_empty()
            && scope_types.scope_includes_object(context, &grant.scope)
        {
            permitted.extend(baseline.iter().cloned());
        }
    }

    permitted
}

/// Bulk counterpart of [`permitted_operations`] for one operation.
///
/// The first grant (the boundary) decides `default`; later grants flip the
/// objects of the base scope type they cover. Grants below the base type only
/// matter for read-type operations, exposing their ancestor at base-type
/// granularity. Cost is linear in `grants`.
pub fn operation_policy(
    scope_types: &ScopeTypeRegistry,
    grants: &[ScopedGrant],
    operation: &Operation,
    use_object_scope: bool,
    read_type: bool,
) -> Result<EffectivePolicy, RegistryError> {
    let Some((boundary, narrower)) = grants.split_first() else {
        return Ok(EffectivePolicy::deny_all());
    };

    let name = operation.name.as_str();
    let base = operation.base_scope(use_object_scope);
    let default = boundary.operations.contains(name);
    let mut exceptions = BTreeSet::new();

    for grant in narrower {
        let scope_type = &grant.scope.scope_type;

        if scope_types.includes(scope_type, base) {
            let objects = scope_types.objects_under_scope(&grant.scope, base)?;
            if grant.operations.contains(name) == default {
                for object in &objects {
                    exceptions.remove(object);
                }
            } else {
                exceptions.extend(objects);
            }
        } else if read_type
            && !grant.operations.is_empty()
            && scope_types.includes(base, scope_type)
            && let Some(ancestor) = scope_types.ancestor_at(&grant.scope, base)
        {
            if default {
                exceptions.remove(&ancestor.id);
            } else {
                exceptions.insert(ancestor.id);
            }
        }
    }

    Ok(EffectivePolicy {
        default,
        exceptions,
    })
}

/// Answers permission questions for actors inside a boundary.
#[derive(Clone)]
pub struct PermissionManager {
    resolver: AssignmentResolver,
    operations: Arc<OperationRegistry>,
    audit: Arc<dyn AuditSink>,
}

impl PermissionManager {
    pub fn new(
        resolver: AssignmentResolver,
        operations: Arc<OperationRegistry>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            resolver,
            operations,
            audit,
        }
    }

    pub fn resolver(&self) -> &AssignmentResolver {
        &self.resolver
    }

    pub fn operations(&self) -> &OperationRegistry {
        &self.operations
    }

    fn scope_types(&self) -> &ScopeTypeRegistry {
        self.resolver.scope_types()
    }

    /// Allow or deny `operation` on `context`.
    ///
    /// Denials are reported to the audit sink and returned as
    /// [`AuthzError::PermissionDenied`].
    pub fn check(
        &self,
        actor: &SubjectRef,
        operation: &str,
        boundary_id: BoundaryId,
        context: &ScopeRef,
    ) -> Result<(), AuthzError> {
        let operation = self.operations.get(operation)?;
        if self.decide(actor, operation, boundary_id, context)? {
            return Ok(());
        }

        tracing::debug!(
            actor = %actor,
            operation = %operation.name,
            boundary_id = %boundary_id,
            context = %context,
            "check denied"
        );
        self.audit.record_denial(&DenialEvent::new(
            *actor,
            operation.name.clone(),
            boundary_id,
            context.clone(),
        ));
        Err(AuthzError::PermissionDenied {
            actor: *actor,
            operation: operation.name.clone(),
        })
    }

    /// Same answer as [`Self::check`] as a boolean. Nothing reaches the audit
    /// sink; other errors still propagate.
    pub fn has_permission(
        &self,
        actor: &SubjectRef,
        operation: &str,
        boundary_id: BoundaryId,
        context: &ScopeRef,
    ) -> Result<bool, AuthzError> {
        let operation = self.operations.get(operation)?;
        self.decide(actor, operation, boundary_id, context)
    }

    fn decide(
        &self,
        actor: &SubjectRef,
        operation: &Operation,
        boundary_id: BoundaryId,
        context: &ScopeRef,
    ) -> Result<bool, AuthzError> {
        self.verify_context(operation, context)?;

        if self.resolver.is_admin(actor, boundary_id)? {
            return Ok(true);
        }

        let permitted = self.permitted_on(actor, boundary_id, context)?;
        Ok(permitted.contains(operation.name.as_str()))
    }

    /// Every operation the actor holds on `context`, ignoring the admin bypass.
    pub fn permitted_on(
        &self,
        actor: &SubjectRef,
        boundary_id: BoundaryId,
        context: &ScopeRef,
    ) -> Result<OperationSet, AuthzError> {
        let grants = self.resolver.assignments_for(actor, boundary_id)?;
        let baseline = self.resolver.roles().baseline_read_operations()?;
        Ok(permitted_operations(self.scope_types(), &grants, context, &baseline))
    }

    /// Default/exception policy of `operation` over the boundary.
    pub fn policy(
        &self,
        actor: &SubjectRef,
        operation: &str,
        boundary_id: BoundaryId,
        use_object_scope: bool,
    ) -> Result<EffectivePolicy, AuthzError> {
        let operation = self.operations.get(operation)?;

        if self.resolver.is_admin(actor, boundary_id)? {
            return Ok(EffectivePolicy::allow_all());
        }

        let grants = self.resolver.assignments_for(actor, boundary_id)?;
        self.policy_from_grants(&grants, operation, use_object_scope)
    }

    fn policy_from_grants(
        &self,
        grants: &[ScopedGrant],
        operation: &Operation,
        use_object_scope: bool,
    ) -> Result<EffectivePolicy, AuthzError> {
        let read_type = grants.len() > 1
            && self
                .resolver
                .roles()
                .baseline_read_operations()?
                .contains(operation.name.as_str());

        Ok(operation_policy(
            self.scope_types(),
            grants,
            operation,
            use_object_scope,
            read_type,
        )?)
    }

    /// Policies of every registered operation on its context scope.
    ///
    /// Entries denied everywhere are omitted.
    pub fn permissions_object(
        &self,
        actor: &SubjectRef,
        boundary_id: BoundaryId,
    ) -> Result<BTreeMap<OperationName, EffectivePolicy>, AuthzError> {
        if self.resolver.is_admin(actor, boundary_id)? {
            return Ok(self
                .operations
                .all()
                .map(|op| (op.name.clone(), EffectivePolicy::allow_all()))
                .collect());
        }

        let grants = self.resolver.assignments_for(actor, boundary_id)?;
        let mut object = BTreeMap::new();
        for operation in self.operations.all() {
            let policy = self.policy_from_grants(&grants, operation, false)?;
            if !policy.is_deny_all() {
                object.insert(operation.name.clone(), policy);
            }
        }
        Ok(object)
    }

    /// Roles in effect on `context`: those of the most specific scope holding
    /// it, plus the baseline role when a nested scope carries a real grant.
    pub fn computed_roles(
        &self,
        actor: &SubjectRef,
        boundary_id: BoundaryId,
        context: &ScopeRef,
    ) -> Result<Vec<RoleId>, AuthzError> {
        let config = self.resolver.config();
        let mut roles = vec![config.no_access_role.clone()];

        for (scope, scope_roles) in self.resolver.roles_per_scope(actor, boundary_id)? {
            if self.scope_types().scope_includes_object(&scope, context) {
                roles = scope_roles;
            } else if self.scope_types().scope_includes_object(context, &scope)
                && scope_roles.iter().any(|r| r != &config.no_access_role)
                && !roles.contains(&config.baseline_read_role)
            {
                roles.push(config.baseline_read_role.clone());
            }
        }

        Ok(roles)
    }

    /// Narrow `target` to the objects the actor may apply `operation` to.
    ///
    /// `target` holds objects of the operation's object scope type.
    pub fn filter<Q: FilterTarget>(
        &self,
        actor: &SubjectRef,
        operation: &str,
        boundary_id: BoundaryId,
        target: Q,
    ) -> Result<Q, AuthzError> {
        let policy = self.policy(actor, operation, boundary_id, true)?;
        Ok(apply(&policy, target))
    }

    fn verify_context(&self, operation: &Operation, context: &ScopeRef) -> Result<(), AuthzError> {
        if context.scope_type == operation.context_scope {
            return Ok(());
        }

        if self.resolver.config().strict_context_checks {
            return Err(AuthzError::ContextTypeMismatch {
                operation: operation.name.clone(),
                expected: operation.context_scope.clone(),
                actual: context.scope_type.clone(),
            });
        }

        tracing::warn!(
            operation = %operation.name,
            expected = %operation.context_scope,
            actual = %context.scope_type,
            "context type mismatch ignored"
        );
        Ok(())
    }
}

impl core::fmt::Debug for PermissionManager {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PermissionManager")
            .field("operations", &self.operations.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use permscope_core::{ObjectId, ScopeTypeName};

    use super::*;
    use crate::scope_types::{ScopeObjects, ScopeType};

    /// group -> database -> table, everything in one parent map.
    #[derive(Default)]
    struct Tree {
        parents: HashMap<ObjectId, ScopeRef>,
        types: HashMap<ObjectId, ScopeTypeName>,
    }

    struct TypeView {
        tree: Arc<Tree>,
        scope_type: ScopeTypeName,
    }

    impl ScopeObjects for TypeView {
        fn parent_of(&self, id: ObjectId) -> Option<ScopeRef> {
            self.tree.parents.get(&id).cloned()
        }

        fn exists(&self, id: ObjectId) -> bool {
            self.tree.types.get(&id) == Some(&self.scope_type)
        }

        fn objects_in(&self, scope: &ScopeRef) -> Vec<ObjectId> {
            self.tree
                .types
                .iter()
                .filter(|(_, t)| **t == self.scope_type)
                .map(|(id, _)| ScopeRef::new(self.scope_type.clone(), *id))
                .filter(|object| {
                    let mut current = Some(object.clone());
                    while let Some(c) = current {
                        if &c == scope {
                            return true;
                        }
                        current = self.tree.parents.get(&c.id).cloned();
                    }
                    false
                })
                .map(|object| object.id)
                .collect()
        }
    }

    struct Fixture {
        registry: ScopeTypeRegistry,
        group: ScopeRef,
        database: ScopeRef,
        table: ScopeRef,
        sibling: ScopeRef,
    }

    fn fixture() -> Fixture {
        let group = ScopeRef::new("group", ObjectId::new());
        let database = ScopeRef::new("database", ObjectId::new());
        let table = ScopeRef::new("table", ObjectId::new());
        let sibling = ScopeRef::new("table", ObjectId::new());

        let mut tree = Tree::default();
        for (child, parent) in [(&database, &group), (&table, &database), (&sibling, &database)] {
            tree.parents.insert(child.id, parent.clone());
        }
        for object in [&group, &database, &table, &sibling] {
            tree.types.insert(object.id, object.scope_type.clone());
        }
        let tree = Arc::new(tree);

        let mut registry = ScopeTypeRegistry::new();
        let types = [("group", None), ("database", Some("group")), ("table", Some("database"))];
        for (name, parent) in types {
            registry
                .register(ScopeType::new(
                    name,
                    parent.map(ScopeTypeName::from),
                    Arc::new(TypeView {
                        tree: tree.clone(),
                        scope_type: name.into(),
                    }),
                ))
                .unwrap();
        }

        Fixture {
            registry,
            group,
            database,
            table,
            sibling,
        }
    }

    fn grant(scope: &ScopeRef, ops: &[&'static str]) -> ScopedGrant {
        ScopedGrant {
            scope: scope.clone(),
            roles: Vec::new(),
            operations: Arc::new(ops.iter().map(|o| OperationName::new(*o)).collect()),
        }
    }

    fn baseline() -> OperationSet {
        ["read"].into_iter().map(OperationName::new).collect()
    }

    #[test]
    fn narrower_grant_replaces_broader_one() {
        let f = fixture();
        let grants = [grant(&f.group, &["read"]), grant(&f.table, &["read", "write"])];

        let on_table = permitted_operations(&f.registry, &grants, &f.table, &baseline());
        let on_sibling = permitted_operations(&f.registry, &grants, &f.sibling, &baseline());

        assert!(on_table.contains("write"));
        assert!(!on_sibling.contains("write"));
        assert!(on_sibling.contains("read"));
    }

    #[test]
    fn nested_grant_exposes_ancestor_for_reading() {
        let f = fixture();
        let grants = [grant(&f.group, &[]), grant(&f.table, &["write"])];

        let on_database = permitted_operations(&f.registry, &grants, &f.database, &baseline());
        assert!(on_database.contains("read"));
        assert!(!on_database.contains("write"));

        let empty_nested = [grant(&f.group, &[]), grant(&f.table, &[])];
        let permitted = permitted_operations(&f.registry, &empty_nested, &f.database, &baseline());
        assert!(permitted.is_empty());
    }

    #[test]
    fn policy_lists_exceptions_at_base_granularity() {
        let f = fixture();
        let write = Operation::new("write", "table");
        let grants = [grant(&f.group, &["read"]), grant(&f.table, &["read", "write"])];

        let policy = operation_policy(&f.registry, &grants, &write, false, false).unwrap();
        assert!(!policy.default);
        assert_eq!(policy.exceptions, [f.table.id].into_iter().collect());

        let revoked = [grant(&f.group, &["read", "write"]), grant(&f.database, &["read"])];
        let policy = operation_policy(&f.registry, &revoked, &write, false, false).unwrap();
        assert!(policy.default);
        assert_eq!(policy.exceptions.len(), 2);
    }

    #[test]
    fn read_policy_exposes_ancestors_of_nested_grants() {
        let f = fixture();
        let read = Operation::new("read", "database");
        let grants = [grant(&f.group, &[]), grant(&f.table, &["write"])];

        let policy = operation_policy(&f.registry, &grants, &read, false, true).unwrap();
        assert!(!policy.default);
        assert!(policy.allows(f.database.id));

        let not_read = operation_policy(&f.registry, &grants, &read, false, false).unwrap();
        assert!(not_read.is_deny_all());
    }

    #[test]
    fn no_grants_means_deny_all() {
        let f = fixture();
        let read = Operation::new("read", "table");
        let policy = operation_policy(&f.registry, &[], &read, false, true).unwrap();
        assert_eq!(policy, EffectivePolicy::deny_all());
    }
}
