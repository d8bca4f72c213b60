//! In-memory object hierarchy with an ancestor index.
//!
//! Every object is indexed under each of its ancestors (and itself), keyed by
//! its own scope type. `objects_in` is then a single map lookup, the in-memory
//! equivalent of `WHERE ancestor_fk = ?`.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use permscope_auth::ScopeObjects;
use permscope_core::{DomainError, DomainResult, ObjectId, ScopeRef, ScopeTypeName};

#[derive(Debug, Clone)]
struct Node {
    object: ScopeRef,
    parent: Option<ScopeRef>,
}

#[derive(Debug, Default)]
struct TreeState {
    nodes: HashMap<ObjectId, Node>,
    by_ancestor: HashMap<(ScopeRef, ScopeTypeName), BTreeSet<ObjectId>>,
}

impl TreeState {
    /// `object` followed by its ancestors, nearest first.
    fn lineage(&self, object: &ScopeRef) -> Vec<ScopeRef> {
        let mut lineage = vec![object.clone()];
        let mut current = self.nodes.get(&object.id).and_then(|n| n.parent.clone());
        while let Some(parent) = current {
            current = self.nodes.get(&parent.id).and_then(|n| n.parent.clone());
            lineage.push(parent);
        }
        lineage
    }
}

#[derive(Debug, Default)]
pub struct InMemoryObjectTree {
    state: RwLock<TreeState>,
    lookups: AtomicUsize,
}

impl InMemoryObjectTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an object below `parent`, which must already exist.
    pub fn insert(&self, object: ScopeRef, parent: Option<ScopeRef>) -> DomainResult<()> {
        let mut state = self
            .state
            .write()
            .map_err(|_| DomainError::invariant("object tree lock poisoned"))?;

        if state.nodes.contains_key(&object.id) {
            return Err(DomainError::conflict(format!("object {object} already exists")));
        }
        if let Some(parent) = &parent {
            match state.nodes.get(&parent.id) {
                Some(node) if &node.object == parent => {}
                _ => return Err(DomainError::not_found("scope object", parent.to_string())),
            }
        }

        state.nodes.insert(
            object.id,
            Node {
                object: object.clone(),
                parent,
            },
        );
        for ancestor in state.lineage(&object) {
            state
                .by_ancestor
                .entry((ancestor, object.scope_type.clone()))
                .or_default()
                .insert(object.id);
        }
        Ok(())
    }

    /// Remove `object` and everything below it. Returns the removed objects in
    /// no particular order.
    pub fn remove(&self, object: &ScopeRef) -> DomainResult<Vec<ScopeRef>> {
        let mut state = self
            .state
            .write()
            .map_err(|_| DomainError::invariant("object tree lock poisoned"))?;

        if state.nodes.get(&object.id).is_none_or(|n| &n.object != object) {
            return Err(DomainError::not_found("scope object", object.to_string()));
        }

        let doomed: Vec<ObjectId> = state
            .by_ancestor
            .iter()
            .filter(|((ancestor, _), _)| ancestor == object)
            .flat_map(|(_, ids)| ids.iter().copied())
            .collect();

        let mut removed = Vec::with_capacity(doomed.len());
        for id in &doomed {
            let Some(node) = state.nodes.get(id).cloned() else {
                continue;
            };
            for ancestor in state.lineage(&node.object) {
                let key = (ancestor, node.object.scope_type.clone());
                if let Some(ids) = state.by_ancestor.get_mut(&key) {
                    ids.remove(id);
                    if ids.is_empty() {
                        state.by_ancestor.remove(&key);
                    }
                }
            }
            removed.push(node.object);
        }
        for id in &doomed {
            state.nodes.remove(id);
        }

        Ok(removed)
    }

    pub fn contains(&self, object: &ScopeRef) -> bool {
        self.state
            .read()
            .map(|s| s.nodes.get(&object.id).is_some_and(|n| &n.object == object))
            .unwrap_or(false)
    }

    pub fn objects_of_type(&self, scope_type: &ScopeTypeName) -> Vec<ScopeRef> {
        let Ok(state) = self.state.read() else {
            return Vec::new();
        };
        let mut objects: Vec<ScopeRef> = state
            .nodes
            .values()
            .filter(|n| &n.object.scope_type == scope_type)
            .map(|n| n.object.clone())
            .collect();
        objects.sort();
        objects
    }

    /// Indexed lookup of the `target` objects under `scope`.
    pub fn descendants(&self, scope: &ScopeRef, target: &ScopeTypeName) -> BTreeSet<ObjectId> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        self.state
            .read()
            .ok()
            .and_then(|s| s.by_ancestor.get(&(scope.clone(), target.clone())).cloned())
            .unwrap_or_default()
    }

    /// Number of indexed descendant lookups served so far.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::Relaxed)
    }

    /// Storage capability for one scope type, backed by this tree.
    pub fn scope_objects(
        self: &Arc<Self>,
        scope_type: impl Into<ScopeTypeName>,
    ) -> Arc<dyn ScopeObjects> {
        Arc::new(TreeScopeObjects {
            tree: Arc::clone(self),
            scope_type: scope_type.into(),
        })
    }

    fn parent(&self, object: &ScopeRef) -> Option<ScopeRef> {
        let state = self.state.read().ok()?;
        state
            .nodes
            .get(&object.id)
            .filter(|n| &n.object == object)
            .and_then(|n| n.parent.clone())
    }
}

/// [`ScopeObjects`] view of the objects of one scope type in a tree.
#[derive(Debug)]
struct TreeScopeObjects {
    tree: Arc<InMemoryObjectTree>,
    scope_type: ScopeTypeName,
}

impl ScopeObjects for TreeScopeObjects {
    fn parent_of(&self, id: ObjectId) -> Option<ScopeRef> {
        self.tree.parent(&ScopeRef::new(self.scope_type.clone(), id))
    }

    fn exists(&self, id: ObjectId) -> bool {
        self.tree.contains(&ScopeRef::new(self.scope_type.clone(), id))
    }

    fn objects_in(&self, scope: &ScopeRef) -> Vec<ObjectId> {
        self.tree.descendants(scope, &self.scope_type).into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope(t: &'static str) -> ScopeRef {
        ScopeRef::new(t, ObjectId::new())
    }

    #[test]
    fn index_covers_every_ancestor() {
        let tree = InMemoryObjectTree::new();
        let group = scope("group");
        let database = scope("application");
        let table = scope("database_table");

        tree.insert(group.clone(), None).unwrap();
        tree.insert(database.clone(), Some(group.clone())).unwrap();
        tree.insert(table.clone(), Some(database.clone())).unwrap();

        let tables = ScopeTypeName::from("database_table");
        assert!(tree.descendants(&group, &tables).contains(&table.id));
        assert!(tree.descendants(&database, &tables).contains(&table.id));
        assert_eq!(tree.descendants(&table, &tables).len(), 1);
        assert!(tree.descendants(&table, &"group".into()).is_empty());
        assert_eq!(tree.lookups(), 4);
    }

    #[test]
    fn insert_requires_existing_parent_and_fresh_id() {
        let tree = InMemoryObjectTree::new();
        let group = scope("group");
        assert!(tree.insert(scope("application"), Some(group.clone())).is_err());

        tree.insert(group.clone(), None).unwrap();
        assert!(matches!(
            tree.insert(group.clone(), None),
            Err(DomainError::Conflict(_))
        ));
    }

    #[test]
    fn remove_takes_the_subtree_along() {
        let tree = InMemoryObjectTree::new();
        let group = scope("group");
        let database = scope("application");
        let table = scope("database_table");
        tree.insert(group.clone(), None).unwrap();
        tree.insert(database.clone(), Some(group.clone())).unwrap();
        tree.insert(table.clone(), Some(database.clone())).unwrap();

        let removed = tree.remove(&database).unwrap();
        assert_eq!(removed.len(), 2);
        assert!(tree.contains(&group));
        assert!(!tree.contains(&table));
        assert!(tree.descendants(&group, &"database_table".into()).is_empty());

        assert!(tree.remove(&database).is_err());
        let retyped = ScopeRef::new("database_table", group.id);
        assert!(tree.remove(&retyped).is_err());
        assert!(tree.contains(&group));
    }

    #[test]
    fn scope_objects_answers_for_its_type_only() {
        let tree = Arc::new(InMemoryObjectTree::new());
        let group = scope("group");
        let database = scope("application");
        tree.insert(group.clone(), None).unwrap();
        tree.insert(database.clone(), Some(group.clone())).unwrap();

        let applications = tree.scope_objects("application");
        assert!(applications.exists(database.id));
        assert!(!applications.exists(group.id));
        assert_eq!(applications.parent_of(database.id), Some(group.clone()));
        assert_eq!(applications.objects_in(&group), vec![database.id]);
    }
}
