use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    time::Duration,
};

use bevy::prelude::*;
use rand::{rngs::SmallRng, SeedableRng};

/// Global configuration parameters for the headless simulation.
#[derive(Resource, Debug, Clone)]
pub struct SimulationConfig {
    pub grid_width: i32,
    pub grid_height: i32,
    /// Side length of a territory region in grid cells.
    pub region_size: i32,
    /// Side length of a spatial-index bucket in grid cells.
    pub spatial_cell_size: i32,
    pub initial_population: usize,
    pub initial_food: usize,
    pub food_low_watermark: usize,
    pub food_respawn_batch: usize,
    pub food_respawn_interval: u64,
    pub base_detection_radius: i32,
    pub critical_energy: i32,
    pub move_cost_base: i32,
    pub flee_cost_base: i32,
    pub migrate_cost_base: i32,
    pub reproduce_min_energy: i32,
    pub reproduce_cost_base: i32,
    pub offspring_energy: i32,
    pub sharp_mouth_gain_multiplier: f32,
    pub signal_radius: f32,
    pub cooperate_transfer_cap: i32,
    pub evolution_cost: i32,
    /// World grows to at least this extent on the first stage-3 transition.
    pub stage3_world_extent: i32,
    pub weather_interval: u64,
    pub predator_spawn_interval: u64,
    pub predator_spawn_energy: i32,
    pub disaster_interval: u64,
    pub inference_timeout: Duration,
    pub inference_batch_size: usize,
    pub snapshot_bind: SocketAddr,
    pub command_bind: SocketAddr,
    pub snapshot_history_limit: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            grid_width: 20,
            grid_height: 20,
            region_size: 5,
            spatial_cell_size: 5,
            initial_population: 6,
            initial_food: 50,
            food_low_watermark: 30,
            food_respawn_batch: 10,
            food_respawn_interval: 2,
            base_detection_radius: 3,
            critical_energy: 20,
            move_cost_base: 1,
            flee_cost_base: 2,
            migrate_cost_base: 2,
            reproduce_min_energy: 88,
            reproduce_cost_base: 50,
            offspring_energy: 50,
            sharp_mouth_gain_multiplier: 1.33,
            signal_radius: 5.0,
            cooperate_transfer_cap: 10,
            evolution_cost: 50,
            stage3_world_extent: 40,
            weather_interval: 20,
            predator_spawn_interval: 30,
            predator_spawn_energy: 80,
            disaster_interval: 50,
            inference_timeout: Duration::from_millis(500),
            inference_batch_size: 8,
            snapshot_bind: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 42000),
            command_bind: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 42001),
            snapshot_history_limit: 64,
        }
    }
}

/// Tracks total simulation ticks elapsed.
#[derive(Resource, Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationTick(pub u64);

/// Per-session random source.
///
/// The reference behavior is not replay-deterministic, so the default draws
/// from entropy; tests insert a seeded rng before the first update.
#[derive(Resource, Debug, Clone)]
pub struct WorldRng(pub SmallRng);

impl WorldRng {
    pub fn from_seed(seed: u64) -> Self {
        Self(SmallRng::seed_from_u64(seed))
    }
}

impl Default for WorldRng {
    fn default() -> Self {
        Self(SmallRng::from_entropy())
    }
}

/// Terminal-episode signal: set once all owned agents are dead. NPC predators
/// do not keep an episode alive.
#[derive(Resource, Default, Debug, Clone, Copy)]
pub struct EpisodeStatus {
    pub extinct: bool,
    pub extinct_since: Option<u64>,
}
