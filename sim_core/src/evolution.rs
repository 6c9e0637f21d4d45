//! Stage transitions. Sweeps every living creature once per tick; a creature
//! that qualifies pays the evolution cost and has its payload swapped in
//! place, keeping id, position, remaining energy, age, and traits.

use bevy::prelude::*;
use tracing::info;

use crate::{
    agent::{PartSet, StagePayload},
    colony::ColonyRegistry,
    events::{EventLog, SimEvent},
    resources::{SimulationConfig, WorldRng},
    territory::TerritoryLedger,
    world::GridWorld,
};

const STAGE2_MIN_ENERGY: i32 = 80;
const STAGE2_MIN_AGE: u32 = 10;
const STAGE3_MIN_ENERGY: i32 = 90;
const STAGE3_MIN_AGE: u32 = 20;
const STAGE3_MIN_COLONY: usize = 3;

pub fn check_evolution(
    config: Res<SimulationConfig>,
    mut world: ResMut<GridWorld>,
    mut colonies: ResMut<ColonyRegistry>,
    mut territories: ResMut<TerritoryLedger>,
    mut rng: ResMut<WorldRng>,
    mut events: ResMut<EventLog>,
) {
    let rng = &mut rng.0;
    let mut first_organism = false;

    for index in 0..world.agents.len() {
        let agent = &world.agents[index];
        if !agent.alive || agent.energy() < config.evolution_cost {
            continue;
        }
        match agent.payload.clone() {
            StagePayload::Cell => {
                if agent.energy() > STAGE2_MIN_ENERGY && agent.age > STAGE2_MIN_AGE {
                    let id = agent.id;
                    // The reference behavior founds a fresh colony rather
                    // than joining an adjacent one.
                    let colony = colonies.create(id);
                    let agent = &mut world.agents[index];
                    agent.drain_energy(config.evolution_cost);
                    agent.payload = StagePayload::Colonial { colony };
                    events.push(SimEvent::Evolved { id, stage: 2 });
                    info!(%id, "evolved to colonial stage");
                }
            }
            StagePayload::Colonial { colony } => {
                if agent.energy() > STAGE3_MIN_ENERGY
                    && agent.age > STAGE3_MIN_AGE
                    && colonies.member_count(colony) >= STAGE3_MIN_COLONY
                {
                    let id = agent.id;
                    colonies.leave(colony, id);
                    let agent = &mut world.agents[index];
                    agent.drain_energy(config.evolution_cost);
                    let parts = PartSet::generate(&agent.traits, rng);
                    agent.payload = StagePayload::Organism { parts };
                    if world.max_stage < 3 {
                        world.max_stage = 3;
                        first_organism = true;
                    }
                    events.push(SimEvent::Evolved { id, stage: 3 });
                    info!(%id, "evolved to organism stage");
                }
            }
            StagePayload::Organism { .. } => {}
        }
    }

    if first_organism && world.grow_extent(config.stage3_world_extent).is_some() {
        // Region keys shifted under every claim; owners re-stake next turn.
        territories.clear();
    }
}
