//! Applies one [`ActionCommand`] per living creature, in population-list
//! order. Earlier creatures win contested cells; invalid actions resolve to
//! no-op events rather than errors.

use bevy::prelude::*;
use rand::{seq::SliceRandom, Rng};
use sim_schema::{ActionCommand, ActionKind, Direction, TraitRecord};
use tracing::debug;

use crate::{
    agent::{Agent, AgentId, PartSet, StagePayload, ENERGY_MAX},
    colony::ColonyRegistry,
    combat,
    decision::PendingActions,
    events::{EnergyEventLog, EventLog, SimEvent},
    resources::{SimulationConfig, SimulationTick, WorldRng},
    territory::TerritoryLedger,
    world::GridWorld,
};

const REPRODUCE_COST_FLOOR: i32 = 30;

/// Movement-class cost: higher stages and higher speed both shave the base,
/// floored at 1.
fn scaled_cost(base: i32, agent: &Agent) -> i32 {
    let stage_discount = (agent.stage() as i32 - 1) / 2;
    let speed_discount = (agent.speed() as i32 - 3) / 2;
    (base - stage_discount - speed_discount).max(1)
}

pub fn reproduction_cost(base: i32, stage: u8) -> i32 {
    (base - (stage as i32 - 1) * 10).max(REPRODUCE_COST_FLOOR)
}

/// Pairing success chance: 0.7 base, +0.1 for shared color, +0.1 for shared
/// diet, capped at 1.0.
pub fn compatibility(a: &TraitRecord, b: &TraitRecord) -> f32 {
    let mut score = 0.7;
    if a.color == b.color {
        score += 0.1;
    }
    if a.diet == b.diet {
        score += 0.1;
    }
    f32::min(score, 1.0)
}

fn pair_mut(agents: &mut [Agent], a: usize, b: usize) -> (&mut Agent, &mut Agent) {
    assert_ne!(a, b);
    if a < b {
        let (left, right) = agents.split_at_mut(b);
        (&mut left[a], &mut right[0])
    } else {
        let (left, right) = agents.split_at_mut(a);
        (&mut right[0], &mut left[b])
    }
}

/// Death bookkeeping shared by every damage path in this module: territory
/// released, colony membership dropped.
fn mark_death(
    world: &mut GridWorld,
    index: usize,
    territories: &mut TerritoryLedger,
    colonies: &mut ColonyRegistry,
    events: &mut EventLog,
) {
    let (id, colony) = {
        let agent = &mut world.agents[index];
        agent.alive = false;
        (agent.id, agent.colony())
    };
    for region in territories.regions_of(id) {
        territories.release(region);
    }
    if let Some(colony) = colony {
        colonies.leave(colony, id);
    }
    events.push(SimEvent::Died { id });
}

fn apply_move(
    world: &mut GridWorld,
    index: usize,
    direction: Direction,
    config: &SimulationConfig,
    events: &mut EventLog,
) {
    let (id, from) = {
        let agent = &world.agents[index];
        (agent.id, agent.pos())
    };
    let (dx, dy) = direction.delta();
    let to = world.clamp_position(from.0 + dx, from.1 + dy);
    if world.is_cell_occupied(to.0, to.1, Some(id)) {
        events.push(SimEvent::MoveBlocked { id, at: to });
        return;
    }
    let cost = scaled_cost(config.move_cost_base, &world.agents[index]);
    let agent = &mut world.agents[index];
    agent.x = to.0;
    agent.y = to.1;
    agent.drain_energy(cost);
    events.push(SimEvent::Moved { id, to });
}

fn apply_eat(
    world: &mut GridWorld,
    index: usize,
    target: Option<u64>,
    config: &SimulationConfig,
    events: &mut EventLog,
    energy_log: &mut EnergyEventLog,
) {
    let (id, x, y) = {
        let agent = &world.agents[index];
        (agent.id, agent.x, agent.y)
    };
    // A targeted id is honored at any range; stale ids fall back to any
    // adjacent item.
    let food_id = target
        .filter(|food_id| world.food_by_id(*food_id).is_some())
        .or_else(|| world.food_adjacent(x, y).map(|item| item.id));
    let Some(item) = food_id.and_then(|food_id| world.take_food(food_id)) else {
        return;
    };

    let lethal = world.food_config.profile(item.kind).is_lethal;
    let agent = &mut world.agents[index];
    if lethal {
        agent.set_energy(0);
        energy_log.record("eat", Some(item.kind), item.energy_value);
        events.push(SimEvent::LethalFood { id, kind: item.kind });
        return;
    }

    let mut delta = item.energy_value;
    if delta > 0 && agent.mouth() == Some(sim_schema::MouthKind::Sharp) {
        delta = (delta as f32 * config.sharp_mouth_gain_multiplier) as i32;
    }
    if delta >= 0 {
        agent.gain_energy(delta);
    } else {
        agent.drain_energy(-delta);
    }
    energy_log.record("eat", Some(item.kind), delta);
    events.push(SimEvent::Ate {
        id,
        food: item.id,
        kind: item.kind,
        delta,
    });
}

/// A movement verb with no parsed direction stays in place but still pays
/// the movement cost.
fn hold_position(
    world: &mut GridWorld,
    index: usize,
    base_cost: i32,
    fleeing: bool,
    events: &mut EventLog,
) {
    let cost = scaled_cost(base_cost, &world.agents[index]);
    let agent = &mut world.agents[index];
    agent.drain_energy(cost);
    let id = agent.id;
    let to = agent.pos();
    events.push(if fleeing {
        SimEvent::Fled { id, to }
    } else {
        SimEvent::Moved { id, to }
    });
}

fn apply_flee(
    world: &mut GridWorld,
    index: usize,
    direction: Direction,
    config: &SimulationConfig,
    events: &mut EventLog,
) {
    let from = world.agents[index].pos();
    let (dx, dy) = direction.delta();
    // Flee never checks occupancy; panicked retreat tramples shared cells.
    let to = world.clamp_position(from.0 + dx, from.1 + dy);
    let cost = scaled_cost(config.flee_cost_base, &world.agents[index]);
    let agent = &mut world.agents[index];
    agent.x = to.0;
    agent.y = to.1;
    agent.drain_energy(cost);
    events.push(SimEvent::Fled { id: agent.id, to });
}

fn apply_attack(
    world: &mut GridWorld,
    index: usize,
    target: Option<u64>,
    territories: &mut TerritoryLedger,
    colonies: &mut ColonyRegistry,
    events: &mut EventLog,
    energy_log: &mut EnergyEventLog,
) {
    let attacker_id = world.agents[index].id;
    let defender_index = target
        .and_then(|target| world.agent_index(AgentId(target)))
        .filter(|defender_index| *defender_index != index);
    let Some(defender_index) = defender_index else {
        events.push(SimEvent::AttackMissed { id: attacker_id });
        return;
    };

    let (attacker, defender) = pair_mut(&mut world.agents, index, defender_index);
    if !combat::can_attack(attacker, defender) {
        events.push(SimEvent::AttackMissed { id: attacker_id });
        return;
    }
    let defender_id = defender.id;
    let outcome = combat::resolve(attacker, defender);

    energy_log.record("attack", None, -combat::ATTACK_COST);
    if outcome.energy_gained > 0 {
        energy_log.record("hunt", None, outcome.energy_gained);
    }
    events.push(SimEvent::Attacked {
        attacker: attacker_id,
        defender: defender_id,
        damage: outcome.damage,
        killed: outcome.defender_killed,
        energy_gained: outcome.energy_gained,
    });
    if outcome.defender_killed {
        // resolve() already cleared `alive`; finish the bookkeeping.
        mark_death(world, defender_index, territories, colonies, events);
    }
}

fn offspring_traits(parent: &TraitRecord) -> (TraitRecord, i32) {
    let mut traits = parent.clone();
    let mut energy_delta = 0;
    if let Some(variation) = &traits.variation {
        traits.speed = (traits.speed as i8 + variation.speed_delta)
            .clamp(sim_schema::SPEED_MIN as i8, sim_schema::SPEED_MAX as i8)
            as u8;
        energy_delta = variation.starting_energy_delta as i32;
        if let Some(color) = &variation.color_override {
            traits.color = color.clone();
        }
    }
    (traits, energy_delta)
}

fn apply_reproduce(
    world: &mut GridWorld,
    index: usize,
    target: Option<u64>,
    config: &SimulationConfig,
    colonies: &mut ColonyRegistry,
    rng: &mut impl Rng,
    events: &mut EventLog,
) {
    let (id, x, y, owner, energy) = {
        let agent = &world.agents[index];
        (agent.id, agent.x, agent.y, agent.owner, agent.energy())
    };
    if energy < config.reproduce_min_energy {
        events.push(SimEvent::ReproductionFailed {
            id,
            reason: "insufficient energy",
        });
        return;
    }

    // Any adjacent creature qualifies as a partner, regardless of owner.
    let eligible = |other: &Agent| {
        other.alive
            && other.id != id
            && other.energy() >= config.reproduce_min_energy
            && (other.x - x).abs() <= 1
            && (other.y - y).abs() <= 1
    };
    let partner_index = target
        .and_then(|target| world.agent_index(AgentId(target)))
        .filter(|partner| eligible(&world.agents[*partner]))
        .or_else(|| world.agents.iter().position(eligible));
    let Some(partner_index) = partner_index else {
        events.push(SimEvent::ReproductionFailed {
            id,
            reason: "no eligible partner",
        });
        return;
    };

    let score = compatibility(
        &world.agents[index].traits,
        &world.agents[partner_index].traits,
    );
    if rng.gen::<f32>() > score {
        events.push(SimEvent::ReproductionFailed {
            id,
            reason: "incompatible pairing",
        });
        return;
    }

    let mut offsets: Vec<(i32, i32)> = Direction::ALL.iter().map(|d| d.delta()).collect();
    offsets.shuffle(rng);
    let spawn = offsets.iter().find_map(|(dx, dy)| {
        let (cx, cy) = world.clamp_position(x + dx, y + dy);
        (!world.is_cell_occupied(cx, cy, None)).then_some((cx, cy))
    });
    let Some((cx, cy)) = spawn else {
        events.push(SimEvent::ReproductionFailed {
            id,
            reason: "no free cell",
        });
        return;
    };

    let (traits, energy_delta) = offspring_traits(&world.agents[index].traits);
    let child_id = AgentId(world.allocate_id());
    let mut child = Agent::cell(child_id, traits, cx, cy, owner);
    child.set_energy((config.offspring_energy + energy_delta).clamp(0, ENERGY_MAX));

    // Offspring inherit the parent's stage tier.
    child.payload = match &world.agents[index].payload {
        StagePayload::Cell => StagePayload::Cell,
        StagePayload::Colonial { colony } => {
            colonies.join(*colony, child_id);
            StagePayload::Colonial { colony: *colony }
        }
        StagePayload::Organism { .. } => StagePayload::Organism {
            parts: PartSet::generate(&child.traits, rng),
        },
    };

    let cost = reproduction_cost(config.reproduce_cost_base, world.agents[index].stage());
    world.agents[index].drain_energy(cost);
    let partner_cost = reproduction_cost(config.reproduce_cost_base, world.agents[partner_index].stage());
    world.agents[partner_index].drain_energy(partner_cost);
    let partner_id = world.agents[partner_index].id;

    world.push_agent(child);
    events.push(SimEvent::Reproduced {
        id,
        partner: partner_id,
        offspring: child_id,
    });
    debug!(parent = %id, partner = %partner_id, offspring = %child_id, "offspring spawned");
}

fn apply_signal(world: &GridWorld, index: usize, config: &SimulationConfig, events: &mut EventLog) {
    let agent = &world.agents[index];
    let receivers = world
        .agents
        .iter()
        .filter(|other| {
            other.alive
                && other.id != agent.id
                && other.owner == agent.owner
                && other.distance_to(agent.x, agent.y) <= config.signal_radius
        })
        .count();
    events.push(SimEvent::Signaled {
        id: agent.id,
        receivers,
    });
}

fn apply_claim(
    world: &GridWorld,
    index: usize,
    territories: &mut TerritoryLedger,
    events: &mut EventLog,
) {
    let agent = &world.agents[index];
    let region = territories.region_of(agent.x, agent.y);
    if territories.claim(region, agent.id, world) {
        events.push(SimEvent::Claimed {
            id: agent.id,
            region,
        });
    } else {
        events.push(SimEvent::ClaimRejected {
            id: agent.id,
            region,
        });
    }
}

fn apply_cooperate(
    world: &mut GridWorld,
    index: usize,
    target: Option<u64>,
    config: &SimulationConfig,
    events: &mut EventLog,
    energy_log: &mut EnergyEventLog,
) {
    let (id, x, y, owner, energy) = {
        let agent = &world.agents[index];
        (agent.id, agent.x, agent.y, agent.owner, agent.energy())
    };
    let adjacent_ally = |other: &Agent| {
        other.alive
            && other.id != id
            && other.owner == owner
            && (other.x - x).abs() <= 1
            && (other.y - y).abs() <= 1
    };
    let ally_index = target
        .and_then(|target| world.agent_index(AgentId(target)))
        .filter(|ally| adjacent_ally(&world.agents[*ally]))
        .or_else(|| world.agents.iter().position(adjacent_ally));
    let amount = (energy / 10).min(config.cooperate_transfer_cap);
    let (Some(ally_index), true) = (ally_index, amount > 0) else {
        events.push(SimEvent::CooperationFailed { id });
        return;
    };

    let (donor, ally) = pair_mut(&mut world.agents, index, ally_index);
    donor.drain_energy(amount);
    ally.gain_energy(amount);
    energy_log.record("cooperate", None, amount);
    events.push(SimEvent::Cooperated {
        id,
        ally: ally.id,
        amount,
    });
}

fn apply_migrate(
    world: &mut GridWorld,
    index: usize,
    config: &SimulationConfig,
    rng: &mut impl Rng,
    events: &mut EventLog,
) {
    let (id, from) = {
        let agent = &world.agents[index];
        (agent.id, agent.pos())
    };
    let direction = world
        .richest_food_region(config.region_size)
        .and_then(|(rx, ry)| {
            let center = (
                rx * config.region_size + config.region_size / 2,
                ry * config.region_size + config.region_size / 2,
            );
            Direction::toward(from, center)
        })
        .unwrap_or_else(|| Direction::ALL[rng.gen_range(0..Direction::ALL.len())]);

    let (dx, dy) = direction.delta();
    let to = world.clamp_position(from.0 + dx, from.1 + dy);
    if world.is_cell_occupied(to.0, to.1, Some(id)) {
        events.push(SimEvent::MoveBlocked { id, at: to });
        return;
    }
    let cost = scaled_cost(config.migrate_cost_base, &world.agents[index]);
    let agent = &mut world.agents[index];
    agent.x = to.0;
    agent.y = to.1;
    agent.drain_energy(cost);
    events.push(SimEvent::Migrated { id, to });
}

/// Drains [`PendingActions`] in population-list order, then runs end-of-turn
/// upkeep: aging and the food respawn cadence.
pub fn resolve_actions(
    config: Res<SimulationConfig>,
    tick: Res<SimulationTick>,
    mut world: ResMut<GridWorld>,
    mut colonies: ResMut<ColonyRegistry>,
    mut territories: ResMut<TerritoryLedger>,
    mut pending: ResMut<PendingActions>,
    mut rng: ResMut<WorldRng>,
    mut events: ResMut<EventLog>,
    mut energy_log: ResMut<EnergyEventLog>,
) {
    let rng = &mut rng.0;

    // Offspring pushed this turn sit past `count` and act next turn.
    let count = world.agents.len();
    for index in 0..count {
        if !world.agents[index].alive {
            continue;
        }
        let id = world.agents[index].id;
        let Some(command) = pending.take(id) else {
            continue;
        };
        apply_command(
            &mut world,
            index,
            command,
            &config,
            &mut colonies,
            &mut territories,
            rng,
            &mut events,
            &mut energy_log,
        );
        if world.agents[index].alive && world.agents[index].energy() == 0 {
            mark_death(&mut world, index, &mut territories, &mut colonies, &mut events);
        }
    }
    pending.clear();

    for agent in &mut world.agents {
        if agent.alive {
            agent.age += 1;
        }
    }

    if tick.0 % config.food_respawn_interval == 0 && world.food.len() < config.food_low_watermark {
        world.spawn_resources(config.food_respawn_batch, rng);
    }
}

#[allow(clippy::too_many_arguments)]
fn apply_command(
    world: &mut GridWorld,
    index: usize,
    command: ActionCommand,
    config: &SimulationConfig,
    colonies: &mut ColonyRegistry,
    territories: &mut TerritoryLedger,
    rng: &mut impl Rng,
    events: &mut EventLog,
    energy_log: &mut EnergyEventLog,
) {
    match command.kind {
        ActionKind::Move => match command.direction {
            Some(direction) => apply_move(world, index, direction, config, events),
            None => hold_position(world, index, config.move_cost_base, false, events),
        },
        ActionKind::Eat => apply_eat(world, index, command.target, config, events, energy_log),
        ActionKind::Flee => match command.direction {
            Some(direction) => apply_flee(world, index, direction, config, events),
            None => hold_position(world, index, config.flee_cost_base, true, events),
        },
        ActionKind::Attack => apply_attack(
            world,
            index,
            command.target,
            territories,
            colonies,
            events,
            energy_log,
        ),
        ActionKind::Reproduce => {
            apply_reproduce(world, index, command.target, config, colonies, rng, events)
        }
        ActionKind::Signal => apply_signal(world, index, config, events),
        ActionKind::Claim => apply_claim(world, index, territories, events),
        ActionKind::Cooperate => {
            apply_cooperate(world, index, command.target, config, events, energy_log)
        }
        ActionKind::Migrate => apply_migrate(world, index, config, rng, events),
        ActionKind::Idle => {}
    }
}
