//! Lazily evaluated object listing over [`InMemoryObjectTree`].
//!
//! The permission filter is stored as a predicate on the query and evaluated
//! together with the index lookup, never as a pass over materialized results.

use std::collections::BTreeSet;
use std::sync::Arc;

use permscope_auth::FilterTarget;
use permscope_core::{ObjectId, ScopeRef, ScopeTypeName};

use crate::object_tree::InMemoryObjectTree;

#[derive(Debug, Clone, PartialEq, Eq)]
enum IdPredicate {
    Any,
    NotIn(BTreeSet<ObjectId>),
    In(BTreeSet<ObjectId>),
    Never,
}

#[derive(Debug, Clone)]
pub struct ObjectQuery {
    tree: Arc<InMemoryObjectTree>,
    scope_type: ScopeTypeName,
    within: ScopeRef,
    predicate: IdPredicate,
}

impl ObjectQuery {
    /// All `scope_type` objects under `within`.
    pub fn new(
        tree: Arc<InMemoryObjectTree>,
        scope_type: impl Into<ScopeTypeName>,
        within: ScopeRef,
    ) -> Self {
        Self {
            tree,
            scope_type: scope_type.into(),
            within,
            predicate: IdPredicate::Any,
        }
    }

    pub fn execute(&self) -> Vec<ObjectId> {
        match &self.predicate {
            IdPredicate::Never => Vec::new(),
            IdPredicate::In(ids) => {
                let candidates = self.tree.descendants(&self.within, &self.scope_type);
                ids.intersection(&candidates).copied().collect()
            }
            IdPredicate::NotIn(ids) => self
                .tree
                .descendants(&self.within, &self.scope_type)
                .difference(ids)
                .copied()
                .collect(),
            IdPredicate::Any => self
                .tree
                .descendants(&self.within, &self.scope_type)
                .into_iter()
                .collect(),
        }
    }

    /// True if the query was narrowed to nothing without touching storage.
    pub fn is_empty_by_construction(&self) -> bool {
        matches!(self.predicate, IdPredicate::Never)
    }

    fn narrow(mut self, next: IdPredicate) -> Self {
        self.predicate = match (self.predicate, next) {
            (IdPredicate::Never, _) | (_, IdPredicate::Never) => IdPredicate::Never,
            (IdPredicate::Any, p) | (p, IdPredicate::Any) => p,
            (IdPredicate::In(a), IdPredicate::In(b)) => {
                IdPredicate::In(a.intersection(&b).copied().collect())
            }
            (IdPredicate::In(a), IdPredicate::NotIn(b))
            | (IdPredicate::NotIn(b), IdPredicate::In(a)) => {
                IdPredicate::In(a.difference(&b).copied().collect())
            }
            (IdPredicate::NotIn(a), IdPredicate::NotIn(b)) => {
                IdPredicate::NotIn(a.union(&b).copied().collect())
            }
        };
        self
    }
}

impl FilterTarget for ObjectQuery {
    fn exclude_ids(self, ids: &BTreeSet<ObjectId>) -> Self {
        self.narrow(IdPredicate::NotIn(ids.clone()))
    }

    fn only_ids(self, ids: &BTreeSet<ObjectId>) -> Self {
        self.narrow(IdPredicate::In(ids.clone()))
    }

    fn none(self) -> Self {
        self.narrow(IdPredicate::Never)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicates_compose() {
        let tree = Arc::new(InMemoryObjectTree::new());
        let group = ScopeRef::new("group", ObjectId::new());
        tree.insert(group.clone(), None).unwrap();
        let apps: Vec<ScopeRef> = (0..3)
            .map(|_| ScopeRef::new("application", ObjectId::new()))
            .collect();
        for app in &apps {
            tree.insert(app.clone(), Some(group.clone())).unwrap();
        }

        let query = ObjectQuery::new(tree.clone(), "application", group.clone());
        assert_eq!(query.execute().len(), 3);

        let excluded: BTreeSet<ObjectId> = [apps[0].id].into_iter().collect();
        let only: BTreeSet<ObjectId> = [apps[0].id, apps[1].id].into_iter().collect();
        let narrowed = query.clone().exclude_ids(&excluded).only_ids(&only);
        assert_eq!(narrowed.execute(), vec![apps[1].id]);

        let nothing = query.none();
        assert!(nothing.is_empty_by_construction());
        assert!(nothing.execute().is_empty());
    }
}
