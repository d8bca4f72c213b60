use std::borrow::{Borrow, Cow};
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use permscope_core::ScopeTypeName;

use crate::error::RegistryError;
use crate::scope_types::ScopeTypeRegistry;

/// Operation identifier.
///
/// Operations are opaque dotted strings (e.g. `"database.table.read"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationName(Cow<'static, str>);

impl OperationName {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for OperationName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for OperationName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for OperationName {
    fn from(value: &'static str) -> Self {
        Self::new(value)
    }
}

/// A permission-checkable action.
///
/// `context_scope` is the type of object handed to `check`; `object_scope` is
/// the type of the rows a listing operation filters (same as the context for
/// non-listing operations).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub name: OperationName,
    pub context_scope: ScopeTypeName,
    pub object_scope: ScopeTypeName,
}

impl Operation {
    pub fn new(name: impl Into<OperationName>, context_scope: impl Into<ScopeTypeName>) -> Self {
        let context_scope = context_scope.into();
        Self {
            name: name.into(),
            object_scope: context_scope.clone(),
            context_scope,
        }
    }

    pub fn with_object_scope(mut self, object_scope: impl Into<ScopeTypeName>) -> Self {
        self.object_scope = object_scope.into();
        self
    }

    /// Scope type policies are computed against.
    pub fn base_scope(&self, use_object_scope: bool) -> &ScopeTypeName {
        if use_object_scope {
            &self.object_scope
        } else {
            &self.context_scope
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct OperationRegistry {
    operations: BTreeMap<OperationName, Operation>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an operation whose scope types are already known.
    ///
    /// Identical re-registration is accepted; changing the scopes of a known
    /// operation is not.
    pub fn register(
        &mut self,
        operation: Operation,
        scope_types: &ScopeTypeRegistry,
    ) -> Result<(), RegistryError> {
        scope_types.get(&operation.context_scope)?;
        scope_types.get(&operation.object_scope)?;

        if let Some(existing) = self.operations.get(&operation.name) {
            if existing != &operation {
                return Err(RegistryError::DuplicateOperation(operation.name));
            }
            return Ok(());
        }

        tracing::debug!(
            operation = %operation.name,
            context_scope = %operation.context_scope,
            object_scope = %operation.object_scope,
            "registered operation"
        );
        self.operations.insert(operation.name.clone(), operation);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&Operation, RegistryError> {
        self.operations
            .get(name)
            .ok_or_else(|| RegistryError::UnknownOperation(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.operations.contains_key(name)
    }

    /// All operations, ordered by name.
    pub fn all(&self) -> impl Iterator<Item = &Operation> {
        self.operations.values()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use permscope_core::{ObjectId, ScopeRef};

    use super::*;
    use crate::scope_types::{ScopeObjects, ScopeType};

    struct NoObjects;

    impl ScopeObjects for NoObjects {
        fn parent_of(&self, _id: ObjectId) -> Option<ScopeRef> {
            None
        }

        fn exists(&self, _id: ObjectId) -> bool {
            false
        }

        fn objects_in(&self, _scope: &ScopeRef) -> Vec<ObjectId> {
            Vec::new()
        }
    }

    fn scope_types() -> ScopeTypeRegistry {
        let mut registry = ScopeTypeRegistry::new();
        registry
            .register(ScopeType::new("group", None, Arc::new(NoObjects)))
            .unwrap();
        registry
            .register(ScopeType::new("table", Some("group".into()), Arc::new(NoObjects)))
            .unwrap();
        registry
    }

    #[test]
    fn register_and_lookup() {
        let scopes = scope_types();
        let mut registry = OperationRegistry::new();
        registry
            .register(
                Operation::new("group.list_tables", "group").with_object_scope("table"),
                &scopes,
            )
            .unwrap();

        let op = registry.get("group.list_tables").unwrap();
        assert_eq!(op.base_scope(false).as_str(), "group");
        assert_eq!(op.base_scope(true).as_str(), "table");
        assert!(matches!(
            registry.get("group.delete"),
            Err(RegistryError::UnknownOperation(_))
        ));
    }

    #[test]
    fn unknown_scope_type_is_fatal() {
        let mut registry = OperationRegistry::new();
        let err = registry
            .register(Operation::new("row.read", "row"), &scope_types())
            .unwrap_err();
        assert_eq!(err, RegistryError::UnknownScopeType("row".into()));
    }

    #[test]
    fn conflicting_reregistration_is_rejected() {
        let scopes = scope_types();
        let mut registry = OperationRegistry::new();
        registry.register(Operation::new("table.read", "table"), &scopes).unwrap();
        registry.register(Operation::new("table.read", "table"), &scopes).unwrap();

        let err = registry
            .register(Operation::new("table.read", "group"), &scopes)
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateOperation(_)));
        assert_eq!(registry.len(), 1);
    }
}
