use std::collections::BTreeMap;
use std::sync::RwLock;

use permscope_auth::{AssignmentKey, AssignmentRepository, PurgeFilter, RoleAssignment, StoreError};
use permscope_core::{BoundaryId, ScopeRef, SubjectRef};

/// In-memory assignment table. The map key is the uniqueness constraint.
///
/// Intended for tests/dev. Listings come back in key order.
#[derive(Debug, Default)]
pub struct InMemoryAssignmentRepository {
    inner: RwLock<BTreeMap<AssignmentKey, RoleAssignment>>,
}

impl InMemoryAssignmentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AssignmentRepository for InMemoryAssignmentRepository {
    fn upsert(&self, assignment: RoleAssignment) -> Result<Option<RoleAssignment>, StoreError> {
        let mut map = self
            .inner
            .write()
            .map_err(|_| StoreError::poisoned("assignment"))?;
        Ok(map.insert(assignment.key(), assignment))
    }

    fn remove(&self, key: &AssignmentKey) -> Result<Option<RoleAssignment>, StoreError> {
        let mut map = self
            .inner
            .write()
            .map_err(|_| StoreError::poisoned("assignment"))?;
        Ok(map.remove(key))
    }

    fn get(&self, key: &AssignmentKey) -> Result<Option<RoleAssignment>, StoreError> {
        let map = self
            .inner
            .read()
            .map_err(|_| StoreError::poisoned("assignment"))?;
        Ok(map.get(key).cloned())
    }

    fn for_subjects(
        &self,
        boundary_id: BoundaryId,
        subjects: &[SubjectRef],
    ) -> Result<Vec<RoleAssignment>, StoreError> {
        let map = self
            .inner
            .read()
            .map_err(|_| StoreError::poisoned("assignment"))?;
        Ok(map
            .values()
            .filter(|a| a.boundary_id == boundary_id && subjects.contains(&a.subject))
            .cloned()
            .collect())
    }

    fn at_scope(
        &self,
        boundary_id: BoundaryId,
        scope: &ScopeRef,
    ) -> Result<Vec<RoleAssignment>, StoreError> {
        let map = self
            .inner
            .read()
            .map_err(|_| StoreError::poisoned("assignment"))?;
        Ok(map
            .values()
            .filter(|a| a.boundary_id == boundary_id && &a.scope == scope)
            .cloned()
            .collect())
    }

    fn purge(&self, filter: &PurgeFilter) -> Result<Vec<RoleAssignment>, StoreError> {
        let mut map = self
            .inner
            .write()
            .map_err(|_| StoreError::poisoned("assignment"))?;

        let doomed: Vec<AssignmentKey> = map
            .iter()
            .filter(|(_, a)| filter.matches(a))
            .map(|(k, _)| k.clone())
            .collect();

        Ok(doomed.iter().filter_map(|k| map.remove(k)).collect())
    }
}

#[cfg(test)]
mod tests {
    use permscope_auth::RoleId;
    use permscope_core::{ObjectId, UserId};

    use super::*;

    #[test]
    fn upsert_replaces_by_key() {
        let repo = InMemoryAssignmentRepository::new();
        let boundary = BoundaryId::new();
        let user = SubjectRef::User(UserId::new());
        let scope = ScopeRef::new("database_table", ObjectId::new());

        let first = RoleAssignment::new(boundary, user, RoleId::new("VIEWER"), scope.clone());
        assert_eq!(repo.upsert(first.clone()).unwrap(), None);

        let second = RoleAssignment::new(boundary, user, RoleId::new("EDITOR"), scope.clone());
        assert_eq!(repo.upsert(second.clone()).unwrap(), Some(first));
        assert_eq!(repo.len(), 1);
        assert_eq!(repo.get(&second.key()).unwrap(), Some(second));
    }

    #[test]
    fn purge_returns_what_it_deleted() {
        let repo = InMemoryAssignmentRepository::new();
        let boundary = BoundaryId::new();
        let other = BoundaryId::new();
        let user = SubjectRef::User(UserId::new());

        for b in [boundary, boundary, other] {
            repo.upsert(RoleAssignment::new(
                b,
                user,
                RoleId::new("VIEWER"),
                ScopeRef::new("application", ObjectId::new()),
            ))
            .unwrap();
        }

        let removed = repo.purge(&PurgeFilter::Boundary(boundary)).unwrap();
        assert_eq!(removed.len(), 2);
        assert_eq!(repo.len(), 1);
        assert_eq!(repo.for_subjects(other, &[user]).unwrap().len(), 1);
    }
}
