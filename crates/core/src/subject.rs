//! Subjects that can hold role assignments.

use serde::{Deserialize, Serialize};

use crate::id::{TeamId, UserId};

/// A subject of a role assignment: a single user or a team of users.
///
/// Ordering puts users before teams; when both hold a role at the same scope
/// the user's role takes priority.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum SubjectRef {
    User(UserId),
    Team(TeamId),
}

impl SubjectRef {
    /// Priority at a shared scope (lower wins).
    pub fn priority(&self) -> u8 {
        match self {
            SubjectRef::User(_) => 0,
            SubjectRef::Team(_) => 1,
        }
    }

    pub fn as_user(&self) -> Option<UserId> {
        match self {
            SubjectRef::User(id) => Some(*id),
            SubjectRef::Team(_) => None,
        }
    }
}

impl From<UserId> for SubjectRef {
    fn from(value: UserId) -> Self {
        Self::User(value)
    }
}

impl From<TeamId> for SubjectRef {
    fn from(value: TeamId) -> Self {
        Self::Team(value)
    }
}

impl core::fmt::Display for SubjectRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SubjectRef::User(id) => write!(f, "user:{id}"),
            SubjectRef::Team(id) => write!(f, "team:{id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn users_take_priority_over_teams() {
        let user = SubjectRef::User(UserId::new());
        let team = SubjectRef::Team(TeamId::new());
        assert!(user.priority() < team.priority());
    }

    #[test]
    fn serializes_as_tagged_object() {
        let user = UserId::new();
        let json = serde_json::to_value(SubjectRef::User(user)).unwrap();
        assert_eq!(json["type"], "user");
        assert_eq!(json["id"], user.to_string());
    }
}
