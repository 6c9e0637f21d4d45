//! World-state capture. One [`WorldSnapshot`] is built at the end of every
//! tick and retained in a bounded history for the network feed and for
//! inspection.

use std::collections::VecDeque;

use bevy::prelude::*;
use sim_schema::{
    AgentState, EnvironmentSnapshot, FoodState, SnapshotHeader, TerritoryState, WorldSnapshot,
};

use crate::{
    environment::EnvironmentState,
    resources::{EpisodeStatus, SimulationTick},
    territory::TerritoryLedger,
    world::GridWorld,
};

#[derive(Resource, Debug)]
pub struct SnapshotHistory {
    snapshots: VecDeque<WorldSnapshot>,
    limit: usize,
}

impl Default for SnapshotHistory {
    fn default() -> Self {
        Self::new(64)
    }
}

impl SnapshotHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            snapshots: VecDeque::with_capacity(limit),
            limit: limit.max(1),
        }
    }

    pub fn push(&mut self, snapshot: WorldSnapshot) {
        if self.snapshots.len() == self.limit {
            self.snapshots.pop_front();
        }
        self.snapshots.push_back(snapshot);
    }

    pub fn latest(&self) -> Option<&WorldSnapshot> {
        self.snapshots.back()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

pub fn build_snapshot(
    tick: u64,
    world: &GridWorld,
    env: &EnvironmentState,
    territories: &TerritoryLedger,
    status: &EpisodeStatus,
) -> WorldSnapshot {
    let mut agents: Vec<AgentState> = world
        .agents
        .iter()
        .map(|agent| AgentState {
            id: agent.id.0,
            owner: agent.owner.map(|owner| owner.0),
            x: agent.x,
            y: agent.y,
            energy: agent.energy(),
            age: agent.age,
            alive: agent.alive,
            stage: agent.stage(),
            color: agent.traits.color.clone(),
            speed: agent.traits.speed,
            diet: agent.traits.diet,
            colony: agent.colony().map(|colony| colony.0),
            parts: agent.parts().map(|parts| parts.to_state()),
        })
        .collect();
    agents.sort_by_key(|agent| agent.id);

    let mut food: Vec<FoodState> = world
        .food
        .iter()
        .map(|item| FoodState {
            id: item.id,
            x: item.x,
            y: item.y,
            kind: item.kind,
            energy_value: item.energy_value,
        })
        .collect();
    food.sort_by_key(|item| item.id);

    let mut territories_state: Vec<TerritoryState> = territories
        .iter()
        .map(|((region_x, region_y), owner)| TerritoryState {
            region_x,
            region_y,
            owner: owner.0,
        })
        .collect();
    territories_state.sort_by_key(|territory| (territory.region_x, territory.region_y));

    let environment = EnvironmentSnapshot {
        weather: env.weather,
        is_day: env.is_day(),
        visibility: env.visibility_modifier(),
        disasters: env
            .disasters
            .iter()
            .map(|disaster| sim_schema::DisasterState {
                kind: disaster.kind,
                x: disaster.x,
                y: disaster.y,
                radius: disaster.radius,
                remaining: disaster.remaining(tick),
            })
            .collect(),
    };

    let header = SnapshotHeader::new(
        tick,
        agents.len(),
        world.living_count(),
        food.len(),
        territories_state.len(),
        status.extinct,
    );

    WorldSnapshot {
        header,
        agents,
        food,
        environment,
        territories: territories_state,
    }
}

/// Closes the tick: serializes the post-mutation world into the history.
pub fn capture_snapshot(
    tick: Res<SimulationTick>,
    world: Res<GridWorld>,
    env: Res<EnvironmentState>,
    territories: Res<TerritoryLedger>,
    status: Res<EpisodeStatus>,
    mut history: ResMut<SnapshotHistory>,
) {
    let snapshot = build_snapshot(tick.0, &world, &env, &territories, &status);
    history.push(snapshot);
}
