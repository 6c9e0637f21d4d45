use bevy::prelude::*;
use rand::Rng;
use sim_schema::{DietKind, DisasterKind, TraitRecord, WeatherKind};
use tracing::{info, warn};

use crate::{
    agent::{Agent, AgentId},
    colony::ColonyRegistry,
    events::{EventLog, SimEvent},
    resources::{SimulationConfig, SimulationTick, WorldRng},
    territory::TerritoryLedger,
    world::GridWorld,
};

const STORM_DRAIN: i32 = 1;
const HEAT_WAVE_DRAIN: i32 = 2;
const COLD_SNAP_DRAIN: i32 = 1;
const EARTHQUAKE_ONGOING_DAMAGE: i32 = 2;
const FLOOD_IMMEDIATE_DAMAGE: i32 = 5;
const FLOOD_ONGOING_DAMAGE: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HazardKind {
    PoisonZone,
    DangerousArea,
}

/// Static danger zone seeded at world start.
#[derive(Debug, Clone, Copy)]
pub struct Hazard {
    pub kind: HazardKind,
    pub x: i32,
    pub y: i32,
    pub radius: i32,
    pub damage_per_tick: i32,
}

/// Ephemeral disaster; expires once `duration` ticks have elapsed.
#[derive(Debug, Clone, Copy)]
pub struct Disaster {
    pub kind: DisasterKind,
    pub x: i32,
    pub y: i32,
    pub radius: i32,
    pub duration: u32,
    pub started: u64,
}

impl Disaster {
    pub fn remaining(&self, tick: u64) -> u32 {
        let elapsed = tick.saturating_sub(self.started) as u32;
        self.duration.saturating_sub(elapsed)
    }
}

/// Weather, hazards, disasters, predators, and the day/night counter.
#[derive(Resource, Debug, Clone)]
pub struct EnvironmentState {
    pub weather: WeatherKind,
    weather_changed_tick: u64,
    pub weather_duration: u32,
    /// Modulo-100 counter; below 50 is day.
    pub day_night: u32,
    pub hazards: Vec<Hazard>,
    pub disasters: Vec<Disaster>,
    pub predators: Vec<AgentId>,
    predator_timer: u64,
    disaster_timer: u64,
}

impl Default for EnvironmentState {
    fn default() -> Self {
        Self {
            weather: WeatherKind::Clear,
            weather_changed_tick: 0,
            weather_duration: 0,
            day_night: 0,
            hazards: Vec::new(),
            disasters: Vec::new(),
            predators: Vec::new(),
            predator_timer: 0,
            disaster_timer: 0,
        }
    }
}

impl EnvironmentState {
    /// Two poison zones and one dangerous area at random positions.
    pub fn seed_hazards(&mut self, world: &GridWorld, rng: &mut impl Rng) {
        for _ in 0..2 {
            self.hazards.push(Hazard {
                kind: HazardKind::PoisonZone,
                x: rng.gen_range(0..world.width),
                y: rng.gen_range(0..world.height),
                radius: rng.gen_range(2..=4),
                damage_per_tick: 5,
            });
        }
        self.hazards.push(Hazard {
            kind: HazardKind::DangerousArea,
            x: rng.gen_range(0..world.width),
            y: rng.gen_range(0..world.height),
            radius: rng.gen_range(1..=3),
            damage_per_tick: 3,
        });
    }

    pub fn is_day(&self) -> bool {
        self.day_night < 50
    }

    /// Detection-radius multiplier; fog and night only dim, they never drain.
    pub fn visibility_modifier(&self) -> f32 {
        let mut modifier = 1.0;
        if !self.is_day() {
            modifier *= 0.7;
        }
        if self.weather == WeatherKind::Fog {
            modifier *= 0.5;
        }
        modifier
    }

    fn weather_drain(&self) -> i32 {
        match self.weather {
            WeatherKind::Storm => STORM_DRAIN,
            WeatherKind::HeatWave => HEAT_WAVE_DRAIN,
            WeatherKind::ColdSnap => COLD_SNAP_DRAIN,
            WeatherKind::Clear | WeatherKind::Fog => 0,
        }
    }
}

// Same bookkeeping as combat deaths: territory forfeited, colony left.
fn mark_if_dead(
    agent: &mut Agent,
    territories: &mut TerritoryLedger,
    colonies: &mut ColonyRegistry,
    events: &mut EventLog,
) {
    if agent.energy() == 0 && agent.alive {
        agent.alive = false;
        for region in territories.regions_of(agent.id) {
            territories.release(region);
        }
        if let Some(colony) = agent.colony() {
            colonies.leave(colony, agent.id);
        }
        events.push(SimEvent::Died { id: agent.id });
    }
}

fn predator_traits() -> TraitRecord {
    TraitRecord {
        color: "red".to_string(),
        speed: 4,
        diet: DietKind::Carnivore,
        aggression: sim_schema::AggressionKind::High,
        ..TraitRecord::default()
    }
}

/// Passive per-tick world effects: day/night, weather transitions and drains,
/// predator spawning, disaster lifecycle, hazard damage.
pub fn apply_environment(
    config: Res<SimulationConfig>,
    tick: Res<SimulationTick>,
    mut env: ResMut<EnvironmentState>,
    mut world: ResMut<GridWorld>,
    mut territories: ResMut<TerritoryLedger>,
    mut colonies: ResMut<ColonyRegistry>,
    mut rng: ResMut<WorldRng>,
    mut events: ResMut<EventLog>,
) {
    let now = tick.0;
    let rng = &mut rng.0;

    // Drop roster entries for predators that died since last tick.
    {
        let world = &*world;
        env.predators
            .retain(|id| world.agent(*id).map(|agent| agent.alive).unwrap_or(false));
    }

    env.day_night = (((now + 1) * 10) % 100) as u32;

    if now.saturating_sub(env.weather_changed_tick) >= config.weather_interval {
        let weather = WeatherKind::VARIANTS[rng.gen_range(0..WeatherKind::VARIANTS.len())];
        env.weather = weather;
        env.weather_duration = rng.gen_range(10..=30);
        env.weather_changed_tick = now;
        events.push(SimEvent::WeatherChanged { weather });
        info!(weather = weather.as_str(), "weather changed");
    }

    env.predator_timer += 1;
    if env.predator_timer >= config.predator_spawn_interval {
        env.predator_timer = 0;
        if world.living_owned().next().is_some() {
            let (x, y) = edge_position(&world, rng);
            let id = AgentId(world.allocate_id());
            let mut predator = Agent::cell(id, predator_traits(), x, y, None);
            predator.set_energy(config.predator_spawn_energy);
            world.push_agent(predator);
            env.predators.push(id);
            events.push(SimEvent::PredatorSpawned { id, at: (x, y) });
            info!(%id, x, y, "predator spawned at world edge");
        }
    }

    env.disaster_timer += 1;
    if env.disaster_timer >= config.disaster_interval {
        env.disaster_timer = 0;
        trigger_disaster(
            now,
            &mut env,
            &mut world,
            &mut territories,
            &mut colonies,
            rng,
            &mut events,
        );
    }

    // Ongoing disaster damage, then expiry.
    for disaster in env.disasters.clone() {
        if disaster.remaining(now) == 0 {
            continue;
        }
        let ongoing = match disaster.kind {
            DisasterKind::Earthquake => EARTHQUAKE_ONGOING_DAMAGE,
            DisasterKind::Flood => FLOOD_ONGOING_DAMAGE,
        };
        for agent in &mut world.agents {
            if agent.alive && agent.distance_to(disaster.x, disaster.y) <= disaster.radius as f32 {
                agent.drain_energy(ongoing);
                mark_if_dead(agent, &mut territories, &mut colonies, &mut events);
            }
        }
    }
    env.disasters.retain(|disaster| disaster.remaining(now) > 0);

    let drain = env.weather_drain();
    if drain > 0 {
        for agent in &mut world.agents {
            if agent.alive {
                agent.drain_energy(drain);
                mark_if_dead(agent, &mut territories, &mut colonies, &mut events);
            }
        }
    }

    for hazard in env.hazards.clone() {
        for agent in &mut world.agents {
            if agent.alive && agent.distance_to(hazard.x, hazard.y) <= hazard.radius as f32 {
                agent.drain_energy(hazard.damage_per_tick);
                mark_if_dead(agent, &mut territories, &mut colonies, &mut events);
            }
        }
    }
}

fn edge_position(world: &GridWorld, rng: &mut impl Rng) -> (i32, i32) {
    match rng.gen_range(0..4) {
        0 => (0, rng.gen_range(0..world.height)),
        1 => (world.width - 1, rng.gen_range(0..world.height)),
        2 => (rng.gen_range(0..world.width), 0),
        _ => (rng.gen_range(0..world.width), world.height - 1),
    }
}

#[allow(clippy::too_many_arguments)]
fn trigger_disaster(
    now: u64,
    env: &mut EnvironmentState,
    world: &mut GridWorld,
    territories: &mut TerritoryLedger,
    colonies: &mut ColonyRegistry,
    rng: &mut impl Rng,
    events: &mut EventLog,
) {
    let kind = if rng.gen_bool(0.5) {
        DisasterKind::Earthquake
    } else {
        DisasterKind::Flood
    };

    match kind {
        DisasterKind::Earthquake => {
            let x = rng.gen_range(0..world.width);
            let y = rng.gen_range(0..world.height);
            let radius = rng.gen_range(3..=6);
            let duration = rng.gen_range(3..=5);
            warn!(x, y, radius, "earthquake triggered");

            for agent in &mut world.agents {
                if !agent.alive {
                    continue;
                }
                let dist = agent.distance_to(x, y);
                if dist <= radius as f32 {
                    // Distance-decayed shake damage: full at the epicenter.
                    let damage = (15.0 * (1.0 - dist / radius as f32)) as i32;
                    agent.drain_energy(damage);
                    mark_if_dead(agent, territories, colonies, events);
                }
            }
            env.disasters.push(Disaster {
                kind,
                x,
                y,
                radius,
                duration,
                started: now,
            });
            events.push(SimEvent::DisasterStruck {
                kind,
                at: (x, y),
                radius,
            });
        }
        DisasterKind::Flood => {
            let x = rng.gen_range(0..world.width);
            let y = rng.gen_range(0..world.height);
            let radius = rng.gen_range(4..=7);
            let duration = rng.gen_range(4..=6);
            warn!(x, y, radius, "flood triggered");

            let washed: Vec<u64> = world
                .food
                .iter()
                .filter(|item| {
                    let dx = (item.x - x) as f32;
                    let dy = (item.y - y) as f32;
                    (dx * dx + dy * dy).sqrt() <= radius as f32
                })
                .map(|item| item.id)
                .collect();
            for id in washed {
                world.take_food(id);
            }

            for agent in &mut world.agents {
                if agent.alive && agent.distance_to(x, y) <= radius as f32 {
                    agent.drain_energy(FLOOD_IMMEDIATE_DAMAGE);
                    mark_if_dead(agent, territories, colonies, events);
                }
            }
            env.disasters.push(Disaster {
                kind,
                x,
                y,
                radius,
                duration,
                started: now,
            });
            events.push(SimEvent::DisasterStruck {
                kind,
                at: (x, y),
                radius,
            });
        }
    }
}
