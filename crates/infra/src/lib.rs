//! Infrastructure layer: in-memory adapters for the permission engine's ports.

pub mod assignments;
pub mod audit;
pub mod backend;
pub mod membership;
pub mod object_tree;
pub mod query;
pub mod roles;

pub use assignments::InMemoryAssignmentRepository;
pub use audit::MemoryAuditSink;
pub use backend::InMemoryBackend;
pub use membership::InMemoryMembershipDirectory;
pub use object_tree::InMemoryObjectTree;
pub use query::ObjectQuery;
pub use roles::InMemoryRoleRepository;
