use std::collections::HashMap;

use bevy::prelude::*;

use crate::{agent::AgentId, world::GridWorld};

pub type RegionKey = (i32, i32);

/// Region-key to owner mapping. A region is defended only while its owner is
/// alive; claims against dead owners succeed and overwrite.
#[derive(Resource, Debug, Clone)]
pub struct TerritoryLedger {
    region_size: i32,
    owners: HashMap<RegionKey, AgentId>,
}

impl TerritoryLedger {
    pub fn new(region_size: i32) -> Self {
        Self {
            region_size: region_size.max(1),
            owners: HashMap::new(),
        }
    }

    pub fn region_of(&self, x: i32, y: i32) -> RegionKey {
        (x.div_euclid(self.region_size), y.div_euclid(self.region_size))
    }

    pub fn owner(&self, region: RegionKey) -> Option<AgentId> {
        self.owners.get(&region).copied()
    }

    /// Claim the region for `claimant`. Fails if a living agent other than
    /// the claimant holds it.
    pub fn claim(&mut self, region: RegionKey, claimant: AgentId, world: &GridWorld) -> bool {
        if let Some(current) = self.owners.get(&region) {
            if *current == claimant {
                return true;
            }
            let defended = world
                .agent(*current)
                .map(|owner| owner.alive)
                .unwrap_or(false);
            if defended {
                return false;
            }
        }
        self.owners.insert(region, claimant);
        true
    }

    pub fn release(&mut self, region: RegionKey) {
        self.owners.remove(&region);
    }

    pub fn regions_of(&self, owner: AgentId) -> Vec<RegionKey> {
        self.owners
            .iter()
            .filter(|(_, holder)| **holder == owner)
            .map(|(region, _)| *region)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (RegionKey, AgentId)> + '_ {
        self.owners.iter().map(|(region, owner)| (*region, *owner))
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    pub fn clear(&mut self) {
        self.owners.clear();
    }
}

impl Default for TerritoryLedger {
    fn default() -> Self {
        Self::new(5)
    }
}
