use std::collections::BTreeMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use permscope_auth::{Role, RoleId, RoleRepository, StoreError};

/// In-memory role definitions.
///
/// Counts single-role loads so callers can observe the role store's memoization.
#[derive(Debug, Default)]
pub struct InMemoryRoleRepository {
    inner: RwLock<BTreeMap<RoleId, Role>>,
    loads: AtomicUsize,
}

impl InMemoryRoleRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }
}

impl RoleRepository for InMemoryRoleRepository {
    fn get(&self, id: &RoleId) -> Result<Option<Role>, StoreError> {
        self.loads.fetch_add(1, Ordering::Relaxed);
        let map = self.inner.read().map_err(|_| StoreError::poisoned("role"))?;
        Ok(map.get(id).cloned())
    }

    fn all(&self) -> Result<Vec<Role>, StoreError> {
        let map = self.inner.read().map_err(|_| StoreError::poisoned("role"))?;
        Ok(map.values().cloned().collect())
    }

    fn upsert(&self, role: Role) -> Result<(), StoreError> {
        let mut map = self.inner.write().map_err(|_| StoreError::poisoned("role"))?;
        map.insert(role.id.clone(), role);
        Ok(())
    }
}
