//! Scope references: a concrete object paired with its scope type.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::id::{BoundaryId, ObjectId};

/// Name of a scope type in the object hierarchy (e.g. `"group"`, `"database_table"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeTypeName(Cow<'static, str>);

impl ScopeTypeName {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for ScopeTypeName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for ScopeTypeName {
    fn from(value: &'static str) -> Self {
        Self::new(value)
    }
}

/// A concrete scope instance: "this table", "that database", "the group".
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScopeRef {
    pub scope_type: ScopeTypeName,
    pub id: ObjectId,
}

impl ScopeRef {
    pub fn new(scope_type: impl Into<ScopeTypeName>, id: ObjectId) -> Self {
        Self {
            scope_type: scope_type.into(),
            id,
        }
    }

    /// The scope instance representing a boundary itself.
    pub fn boundary(scope_type: impl Into<ScopeTypeName>, boundary: BoundaryId) -> Self {
        Self::new(scope_type, boundary.into())
    }

    pub fn is_type(&self, scope_type: &ScopeTypeName) -> bool {
        &self.scope_type == scope_type
    }
}

impl core::fmt::Display for ScopeRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}:{}", self.scope_type, self.id)
    }
}
