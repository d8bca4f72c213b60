use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::RwLock;

use permscope_auth::{MembershipDirectory, StoreError};
use permscope_core::{BoundaryId, TeamId, UserId};

#[derive(Debug, Default)]
struct BoundaryMembers {
    users: BTreeMap<UserId, String>,
    teams: BTreeMap<TeamId, BTreeSet<UserId>>,
}

/// In-memory membership flags and teams, per boundary.
#[derive(Debug, Default)]
pub struct InMemoryMembershipDirectory {
    inner: RwLock<HashMap<BoundaryId, BoundaryMembers>>,
}

impl InMemoryMembershipDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_member(&self, boundary_id: BoundaryId, user: UserId, flag: impl Into<String>) {
        if let Ok(mut map) = self.inner.write() {
            map.entry(boundary_id)
                .or_default()
                .users
                .insert(user, flag.into());
        }
    }

    /// Drop a user from the boundary and from its teams there.
    pub fn remove_member(&self, boundary_id: BoundaryId, user: UserId) -> bool {
        let Ok(mut map) = self.inner.write() else {
            return false;
        };
        let Some(members) = map.get_mut(&boundary_id) else {
            return false;
        };
        for team in members.teams.values_mut() {
            team.remove(&user);
        }
        members.users.remove(&user).is_some()
    }

    pub fn add_team(&self, boundary_id: BoundaryId, team: TeamId) {
        if let Ok(mut map) = self.inner.write() {
            map.entry(boundary_id).or_default().teams.entry(team).or_default();
        }
    }

    pub fn add_team_member(&self, boundary_id: BoundaryId, team: TeamId, user: UserId) {
        if let Ok(mut map) = self.inner.write() {
            map.entry(boundary_id)
                .or_default()
                .teams
                .entry(team)
                .or_default()
                .insert(user);
        }
    }

    pub fn remove_boundary(&self, boundary_id: BoundaryId) {
        if let Ok(mut map) = self.inner.write() {
            map.remove(&boundary_id);
        }
    }
}

impl MembershipDirectory for InMemoryMembershipDirectory {
    fn member_flag(
        &self,
        boundary_id: BoundaryId,
        user: UserId,
    ) -> Result<Option<String>, StoreError> {
        let map = self
            .inner
            .read()
            .map_err(|_| StoreError::poisoned("membership"))?;
        Ok(map.get(&boundary_id).and_then(|m| m.users.get(&user).cloned()))
    }

    fn set_member_flag(
        &self,
        boundary_id: BoundaryId,
        user: UserId,
        flag: String,
    ) -> Result<Option<String>, StoreError> {
        let mut map = self
            .inner
            .write()
            .map_err(|_| StoreError::poisoned("membership"))?;
        let Some(current) = map
            .get_mut(&boundary_id)
            .and_then(|m| m.users.get_mut(&user))
        else {
            return Ok(None);
        };
        Ok(Some(std::mem::replace(current, flag)))
    }

    fn members(&self, boundary_id: BoundaryId) -> Result<Vec<(UserId, String)>, StoreError> {
        let map = self
            .inner
            .read()
            .map_err(|_| StoreError::poisoned("membership"))?;
        Ok(map
            .get(&boundary_id)
            .map(|m| m.users.iter().map(|(u, f)| (*u, f.clone())).collect())
            .unwrap_or_default())
    }

    fn teams_of(&self, boundary_id: BoundaryId, user: UserId) -> Result<Vec<TeamId>, StoreError> {
        let map = self
            .inner
            .read()
            .map_err(|_| StoreError::poisoned("membership"))?;
        Ok(map
            .get(&boundary_id)
            .map(|m| {
                m.teams
                    .iter()
                    .filter(|(_, users)| users.contains(&user))
                    .map(|(team, _)| *team)
                    .collect()
            })
            .unwrap_or_default())
    }

    fn team_in_boundary(&self, boundary_id: BoundaryId, team: TeamId) -> Result<bool, StoreError> {
        let map = self
            .inner
            .read()
            .map_err(|_| StoreError::poisoned("membership"))?;
        Ok(map.get(&boundary_id).is_some_and(|m| m.teams.contains_key(&team)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_flag_only_touches_existing_members() {
        let directory = InMemoryMembershipDirectory::new();
        let boundary = BoundaryId::new();
        let member = UserId::new();
        directory.add_member(boundary, member, "MEMBER");

        let previous = directory
            .set_member_flag(boundary, member, "ADMIN".to_string())
            .unwrap();
        assert_eq!(previous.as_deref(), Some("MEMBER"));
        assert_eq!(directory.member_flag(boundary, member).unwrap().as_deref(), Some("ADMIN"));

        let stranger = UserId::new();
        let previous = directory.set_member_flag(boundary, stranger, "ADMIN".to_string());
        assert_eq!(previous.unwrap(), None);
        assert_eq!(directory.member_flag(boundary, stranger).unwrap(), None);
    }

    #[test]
    fn teams_are_scoped_to_their_boundary() {
        let directory = InMemoryMembershipDirectory::new();
        let boundary = BoundaryId::new();
        let user = UserId::new();
        let team = TeamId::new();
        directory.add_member(boundary, user, "VIEWER");
        directory.add_team_member(boundary, team, user);

        assert_eq!(directory.teams_of(boundary, user).unwrap(), vec![team]);
        assert!(directory.team_in_boundary(boundary, team).unwrap());
        assert!(!directory.team_in_boundary(BoundaryId::new(), team).unwrap());

        assert!(directory.remove_member(boundary, user));
        assert!(directory.teams_of(boundary, user).unwrap().is_empty());
    }
}
