//! Scope type registry: the schema of the object hierarchy.
//!
//! Each [`ScopeType`] is a plain descriptor (name, parent name, storage
//! capability). Hierarchy questions are answered by walking the registered
//! parent names, never by recursing through objects.

use std::collections::BTreeMap;
use std::sync::Arc;

use permscope_core::{ObjectId, ScopeRef, ScopeTypeName};

use crate::error::RegistryError;

/// Storage capability a scope type needs to take part in resolution.
///
/// Implementations are expected to sit on indexed lookups: `objects_in` is the
/// `WHERE ancestor_fk = ?` query used to materialize policy exceptions.
pub trait ScopeObjects: Send + Sync {
    /// Direct parent of an object of this type, `None` for roots and unknown ids.
    fn parent_of(&self, id: ObjectId) -> Option<ScopeRef>;

    fn exists(&self, id: ObjectId) -> bool;

    /// Every object of this type located under `scope` (or `scope` itself if it
    /// is of this type).
    fn objects_in(&self, scope: &ScopeRef) -> Vec<ObjectId>;
}

impl<T> ScopeObjects for Arc<T>
where
    T: ScopeObjects + ?Sized,
{
    fn parent_of(&self, id: ObjectId) -> Option<ScopeRef> {
        (**self).parent_of(id)
    }

    fn exists(&self, id: ObjectId) -> bool {
        (**self).exists(id)
    }

    fn objects_in(&self, scope: &ScopeRef) -> Vec<ObjectId> {
        (**self).objects_in(scope)
    }
}

#[derive(Clone)]
pub struct ScopeType {
    name: ScopeTypeName,
    parent: Option<ScopeTypeName>,
    objects: Arc<dyn ScopeObjects>,
}

impl ScopeType {
    pub fn new(
        name: impl Into<ScopeTypeName>,
        parent: Option<ScopeTypeName>,
        objects: Arc<dyn ScopeObjects>,
    ) -> Self {
        Self {
            name: name.into(),
            parent,
            objects,
        }
    }

    pub fn name(&self) -> &ScopeTypeName {
        &self.name
    }

    pub fn parent(&self) -> Option<&ScopeTypeName> {
        self.parent.as_ref()
    }

    pub fn objects(&self) -> &dyn ScopeObjects {
        self.objects.as_ref()
    }
}

impl core::fmt::Debug for ScopeType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ScopeType")
            .field("name", &self.name)
            .field("parent", &self.parent)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default, Clone)]
pub struct ScopeTypeRegistry {
    types: BTreeMap<ScopeTypeName, ScopeType>,
    depths: BTreeMap<ScopeTypeName, usize>,
}

impl ScopeTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a scope type. Parents must be registered first, which keeps the
    /// parent relation a tree.
    ///
    /// Registering the same name with the same parent again replaces the storage
    /// capability and is otherwise a no-op.
    pub fn register(&mut self, scope_type: ScopeType) -> Result<(), RegistryError> {
        if let Some(existing) = self.types.get(&scope_type.name)
            && existing.parent != scope_type.parent
        {
            return Err(RegistryError::DuplicateScopeType(scope_type.name.clone()));
        }

        let depth = match &scope_type.parent {
            None => 0,
            Some(parent) => match self.depths.get(parent) {
                Some(parent_depth) => parent_depth + 1,
                None => {
                    return Err(RegistryError::UnknownParentScopeType {
                        name: scope_type.name.clone(),
                        parent: parent.clone(),
                    });
                }
            },
        };

        tracing::debug!(scope_type = %scope_type.name, depth, "registered scope type");
        self.depths.insert(scope_type.name.clone(), depth);
        self.types.insert(scope_type.name.clone(), scope_type);
        Ok(())
    }

    pub fn get(&self, name: &ScopeTypeName) -> Result<&ScopeType, RegistryError> {
        self.types
            .get(name)
            .ok_or_else(|| RegistryError::UnknownScopeType(name.clone()))
    }

    pub fn contains(&self, name: &ScopeTypeName) -> bool {
        self.types.contains_key(name)
    }

    pub fn all(&self) -> impl Iterator<Item = &ScopeType> {
        self.types.values()
    }

    /// Distance from the root scope type. Unknown names sort last.
    pub fn depth(&self, name: &ScopeTypeName) -> usize {
        self.depths.get(name).copied().unwrap_or(usize::MAX)
    }

    /// True if `candidate` is `scope_type` or one of its descendant types.
    pub fn includes(&self, scope_type: &ScopeTypeName, candidate: &ScopeTypeName) -> bool {
        let mut current = Some(candidate);
        while let Some(name) = current {
            if name == scope_type {
                return true;
            }
            current = self.types.get(name).and_then(|t| t.parent.as_ref());
        }
        false
    }

    /// Direct parent object of `object`, if any.
    pub fn parent_of(&self, object: &ScopeRef) -> Option<ScopeRef> {
        self.types
            .get(&object.scope_type)
            .and_then(|t| t.objects.parent_of(object.id))
    }

    /// True if the object is known to its scope type's storage.
    pub fn exists(&self, object: &ScopeRef) -> bool {
        self.types
            .get(&object.scope_type)
            .is_some_and(|t| t.objects.exists(object.id))
    }

    /// Ancestor-or-self of `object` whose type is `scope_type`.
    pub fn ancestor_at(&self, object: &ScopeRef, scope_type: &ScopeTypeName) -> Option<ScopeRef> {
        if !self.includes(scope_type, &object.scope_type) {
            return None;
        }

        let mut current = object.clone();
        loop {
            if &current.scope_type == scope_type {
                return Some(current);
            }
            current = self.parent_of(&current)?;
        }
    }

    /// True if `object` is `scope` or reachable from it through the parent chain.
    pub fn scope_includes_object(&self, scope: &ScopeRef, object: &ScopeRef) -> bool {
        self.ancestor_at(object, &scope.scope_type)
            .is_some_and(|ancestor| ancestor.id == scope.id)
    }

    /// Objects of `target` type under `scope`, through the target type's index.
    pub fn objects_under_scope(
        &self,
        scope: &ScopeRef,
        target: &ScopeTypeName,
    ) -> Result<Vec<ObjectId>, RegistryError> {
        let target_type = self.get(target)?;
        if !self.includes(&scope.scope_type, target) {
            return Ok(Vec::new());
        }
        Ok(target_type.objects.objects_in(scope))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    /// Parent table shared by all test types; good enough for a handful of objects.
    #[derive(Default)]
    struct Parents {
        scope_type: &'static str,
        parents: HashMap<ObjectId, ScopeRef>,
        roots: Vec<ObjectId>,
    }

    impl ScopeObjects for Parents {
        fn parent_of(&self, id: ObjectId) -> Option<ScopeRef> {
            self.parents.get(&id).cloned()
        }

        fn exists(&self, id: ObjectId) -> bool {
            self.parents.contains_key(&id) || self.roots.contains(&id)
        }

        fn objects_in(&self, scope: &ScopeRef) -> Vec<ObjectId> {
            if scope.scope_type.as_str() == self.scope_type {
                return vec![scope.id];
            }
            self.parents
                .iter()
                .filter(|(_, parent)| *parent == scope)
                .map(|(id, _)| *id)
                .collect()
        }
    }

    fn registry(group: ObjectId, table: ObjectId) -> ScopeTypeRegistry {
        let mut registry = ScopeTypeRegistry::new();
        registry
            .register(ScopeType::new(
                "group",
                None,
                Arc::new(Parents {
                    scope_type: "group",
                    roots: vec![group],
                    ..Parents::default()
                }),
            ))
            .unwrap();
        let mut tables = Parents {
            scope_type: "table",
            ..Parents::default()
        };
        tables.parents.insert(table, ScopeRef::new("group", group));
        registry
            .register(ScopeType::new("table", Some("group".into()), Arc::new(tables)))
            .unwrap();
        registry
    }

    #[test]
    fn unknown_parent_is_rejected() {
        let mut registry = ScopeTypeRegistry::new();
        let err = registry
            .register(ScopeType::new(
                "table",
                Some("database".into()),
                Arc::new(Parents::default()),
            ))
            .unwrap_err();
        assert!(matches!(err, RegistryError::UnknownParentScopeType { .. }));
    }

    #[test]
    fn reregistering_is_idempotent_but_reparenting_fails() {
        let mut registry = registry(ObjectId::new(), ObjectId::new());
        registry
            .register(ScopeType::new(
                "table",
                Some("group".into()),
                Arc::new(Parents::default()),
            ))
            .unwrap();

        let err = registry
            .register(ScopeType::new("table", None, Arc::new(Parents::default())))
            .unwrap_err();
        assert_eq!(err, RegistryError::DuplicateScopeType("table".into()));
    }

    #[test]
    fn type_inclusion_follows_parents() {
        let registry = registry(ObjectId::new(), ObjectId::new());
        let group = ScopeTypeName::from("group");
        let table = ScopeTypeName::from("table");

        assert!(registry.includes(&group, &table));
        assert!(registry.includes(&table, &table));
        assert!(!registry.includes(&table, &group));
        assert_eq!(registry.depth(&table), 1);
        assert!(registry.get(&"row".into()).is_err());
    }

    #[test]
    fn object_inclusion_walks_parent_chain() {
        let group = ObjectId::new();
        let table = ObjectId::new();
        let registry = registry(group, table);

        let group_ref = ScopeRef::new("group", group);
        let table_ref = ScopeRef::new("table", table);

        assert!(registry.scope_includes_object(&group_ref, &table_ref));
        assert!(registry.scope_includes_object(&table_ref, &table_ref));
        assert!(!registry.scope_includes_object(&table_ref, &group_ref));
        let other_group = ScopeRef::new("group", ObjectId::new());
        assert!(!registry.scope_includes_object(&other_group, &table_ref));
        assert_eq!(registry.ancestor_at(&table_ref, &"group".into()), Some(group_ref.clone()));
        assert_eq!(
            registry.objects_under_scope(&group_ref, &"table".into()).unwrap(),
            vec![table]
        );
        assert!(registry
            .objects_under_scope(&table_ref, &"group".into())
            .unwrap()
            .is_empty());
    }
}
