use std::collections::HashMap;

use bevy::prelude::*;

use crate::agent::{AgentId, ColonyId};

#[derive(Debug, Clone)]
pub struct Colony {
    pub id: ColonyId,
    pub members: Vec<AgentId>,
}

/// Owns colony membership. Agents hold only a [`ColonyId`] handle, so
/// teardown on stage transition is a registry-side operation.
#[derive(Resource, Debug, Clone, Default)]
pub struct ColonyRegistry {
    colonies: HashMap<ColonyId, Colony>,
    next_id: u64,
}

impl ColonyRegistry {
    /// New colony with the agent as sole founding member.
    pub fn create(&mut self, founder: AgentId) -> ColonyId {
        self.next_id += 1;
        let id = ColonyId(self.next_id);
        self.colonies.insert(
            id,
            Colony {
                id,
                members: vec![founder],
            },
        );
        id
    }

    pub fn join(&mut self, colony: ColonyId, member: AgentId) -> bool {
        match self.colonies.get_mut(&colony) {
            Some(entry) => {
                if !entry.members.contains(&member) {
                    entry.members.push(member);
                }
                true
            }
            None => false,
        }
    }

    /// Drop membership; an emptied colony is removed outright.
    pub fn leave(&mut self, colony: ColonyId, member: AgentId) {
        if let Some(entry) = self.colonies.get_mut(&colony) {
            entry.members.retain(|id| *id != member);
            if entry.members.is_empty() {
                self.colonies.remove(&colony);
            }
        }
    }

    pub fn member_count(&self, colony: ColonyId) -> usize {
        self.colonies
            .get(&colony)
            .map(|entry| entry.members.len())
            .unwrap_or(0)
    }

    pub fn members(&self, colony: ColonyId) -> &[AgentId] {
        self.colonies
            .get(&colony)
            .map(|entry| entry.members.as_slice())
            .unwrap_or(&[])
    }

    pub fn colony_count(&self) -> usize {
        self.colonies.len()
    }

    pub fn clear(&mut self) {
        self.colonies.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_join_leave_lifecycle() {
        let mut registry = ColonyRegistry::default();
        let colony = registry.create(AgentId(1));
        assert_eq!(registry.member_count(colony), 1);

        assert!(registry.join(colony, AgentId(2)));
        assert!(registry.join(colony, AgentId(2)));
        assert_eq!(registry.member_count(colony), 2);

        registry.leave(colony, AgentId(1));
        assert_eq!(registry.members(colony), &[AgentId(2)]);

        registry.leave(colony, AgentId(2));
        assert_eq!(registry.member_count(colony), 0);
        assert_eq!(registry.colony_count(), 0);
    }

    #[test]
    fn joining_missing_colony_fails() {
        let mut registry = ColonyRegistry::default();
        assert!(!registry.join(ColonyId(99), AgentId(1)));
    }
}
