//! `permscope-core`: shared identifiers and domain primitives.
//!
//! This crate contains **pure domain** types only (no storage, no policy).

pub mod error;
pub mod id;
pub mod scope;
pub mod subject;

pub use error::{DomainError, DomainResult};
pub use id::{BoundaryId, ObjectId, TeamId, UserId};
pub use scope::{ScopeRef, ScopeTypeName};
pub use subject::SubjectRef;
