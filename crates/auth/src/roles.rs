use std::borrow::Cow;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, StoreError};
use crate::operations::OperationName;

/// Role identifier (e.g. `"ADMIN"`, `"VIEWER"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleId(Cow<'static, str>);

impl RoleId {
    pub fn new(id: impl Into<Cow<'static, str>>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for RoleId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for RoleId {
    fn from(value: &'static str) -> Self {
        Self::new(value)
    }
}

/// Operations granted by one or more roles.
pub type OperationSet = HashSet<OperationName>;

/// A named bundle of operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub operations: BTreeSet<OperationName>,
    /// Seeded by the system rather than created by an administrator.
    #[serde(default)]
    pub default: bool,
}

impl Role {
    pub fn new(id: impl Into<RoleId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            operations: BTreeSet::new(),
            default: false,
        }
    }

    pub fn with_operations<I, O>(mut self, operations: I) -> Self
    where
        I: IntoIterator<Item = O>,
        O: Into<OperationName>,
    {
        self.operations.extend(operations.into_iter().map(Into::into));
        self
    }

    pub fn as_default(mut self) -> Self {
        self.default = true;
        self
    }

    pub fn grants(&self, operation: &str) -> bool {
        self.operations.contains(operation)
    }
}

/// Source of role definitions.
pub trait RoleRepository: Send + Sync {
    fn get(&self, id: &RoleId) -> Result<Option<Role>, StoreError>;

    fn all(&self) -> Result<Vec<Role>, StoreError>;

    /// Insert or replace a role definition.
    fn upsert(&self, role: Role) -> Result<(), StoreError>;
}

impl<T> RoleRepository for Arc<T>
where
    T: RoleRepository + ?Sized,
{
    fn get(&self, id: &RoleId) -> Result<Option<Role>, StoreError> {
        (**self).get(id)
    }

    fn all(&self) -> Result<Vec<Role>, StoreError> {
        (**self).all()
    }

    fn upsert(&self, role: Role) -> Result<(), StoreError> {
        (**self).upsert(role)
    }
}

/// Memoizing front of a [`RoleRepository`].
///
/// Operation sets are cached per role id for the life of the store and dropped
/// only by [`RoleStore::clear_cache`]. Concurrent first lookups may both load
/// from the repository; the last write wins and both values are equal.
pub struct RoleStore {
    repository: Arc<dyn RoleRepository>,
    baseline_role: RoleId,
    operations: RwLock<HashMap<RoleId, Arc<OperationSet>>>,
    baseline: RwLock<Option<Arc<OperationSet>>>,
}

impl RoleStore {
    pub fn new(repository: Arc<dyn RoleRepository>, baseline_role: RoleId) -> Self {
        Self {
            repository,
            baseline_role,
            operations: RwLock::new(HashMap::new()),
            baseline: RwLock::new(None),
        }
    }

    pub fn repository(&self) -> &Arc<dyn RoleRepository> {
        &self.repository
    }

    pub fn baseline_role(&self) -> &RoleId {
        &self.baseline_role
    }

    pub fn role(&self, id: &RoleId) -> Result<Role, RegistryError> {
        self.repository
            .get(id)?
            .ok_or_else(|| RegistryError::UnknownRole(id.clone()))
    }

    /// Served from the operation cache once the role has been loaded.
    pub fn exists(&self, id: &RoleId) -> Result<bool, RegistryError> {
        match self.operations_for(id) {
            Ok(_) => Ok(true),
            Err(RegistryError::UnknownRole(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Operations granted by `id`, memoized.
    pub fn operations_for(&self, id: &RoleId) -> Result<Arc<OperationSet>, RegistryError> {
        if let Ok(cache) = self.operations.read()
            && let Some(ops) = cache.get(id)
        {
            return Ok(Arc::clone(ops));
        }

        let role = self.role(id)?;
        let ops: Arc<OperationSet> = Arc::new(role.operations.into_iter().collect());

        if let Ok(mut cache) = self.operations.write() {
            cache.insert(id.clone(), Arc::clone(&ops));
        }
        Ok(ops)
    }

    /// Operations of the baseline read role, memoized on first access.
    pub fn baseline_read_operations(&self) -> Result<Arc<OperationSet>, RegistryError> {
        if let Ok(baseline) = self.baseline.read()
            && let Some(ops) = baseline.as_ref()
        {
            return Ok(Arc::clone(ops));
        }

        let ops = self.operations_for(&self.baseline_role)?;
        if let Ok(mut baseline) = self.baseline.write() {
            *baseline = Some(Arc::clone(&ops));
        }
        Ok(ops)
    }

    /// Drop every memoized operation set. Call after reseeding roles.
    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.operations.write() {
            cache.clear();
        }
        if let Ok(mut baseline) = self.baseline.write() {
            *baseline = None;
        }
        tracing::debug!("role operation cache cleared");
    }
}

impl core::fmt::Debug for RoleStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RoleStore")
            .field("baseline_role", &self.baseline_role)
            .finish_non_exhaustive()
    }
}
