//! Core simulation crate for the headless creature-world engine.
//!
//! All world state lives in Bevy resources; one call to [`run_turn`] advances
//! the simulation by exactly one tick through the chained system pipeline.

mod actions;
mod agent;
mod colony;
pub mod combat;
pub mod decision;
mod environment;
mod events;
mod evolution;
pub mod network;
mod resources;
mod snapshot;
mod spatial;
mod systems;
mod territory;
mod world;

use bevy::prelude::*;

pub use actions::{compatibility, reproduction_cost};
pub use agent::{Agent, AgentId, ColonyId, PartSet, PlayerId, StagePayload, ENERGY_MAX, ENERGY_MIN};
pub use colony::{Colony, ColonyRegistry};
pub use decision::{DecisionPipeline, InferenceClient, InferenceError, PendingActions};
pub use environment::{Disaster, EnvironmentState, Hazard, HazardKind};
pub use events::{EnergyEventLog, EventLog, SimEvent};
pub use resources::{EpisodeStatus, SimulationConfig, SimulationTick, WorldRng};
pub use snapshot::{build_snapshot, SnapshotHistory};
pub use spatial::{IndexKind, Proximity, SpatialIndex};
pub use territory::{RegionKey, TerritoryLedger};
pub use world::{FoodItem, FoodTypeConfig, FoodTypeProfile, GridWorld};

/// Construct a Bevy [`App`] configured with the turn pipeline.
///
/// Tests that need a deterministic run insert a seeded [`WorldRng`] (and any
/// config overrides) before the first update; the world is built on startup.
pub fn build_headless_app() -> App {
    let mut app = App::new();

    let config = SimulationConfig::default();
    app.insert_resource(SimulationTick::default())
        .insert_resource(WorldRng::default())
        .insert_resource(EpisodeStatus::default())
        .insert_resource(SpatialIndex::new(config.spatial_cell_size))
        .insert_resource(SnapshotHistory::new(config.snapshot_history_limit))
        .insert_resource(TerritoryLedger::new(config.region_size))
        .insert_resource(ColonyRegistry::default())
        .insert_resource(EnvironmentState::default())
        .insert_resource(EventLog::default())
        .insert_resource(EnergyEventLog::default())
        .insert_resource(DecisionPipeline::rule_based())
        .insert_resource(PendingActions::default())
        .insert_resource(config)
        .add_plugins(MinimalPlugins)
        .add_systems(Startup, systems::spawn_initial_world)
        .add_systems(
            Update,
            (
                decision::gather_decisions,
                actions::resolve_actions,
                environment::apply_environment,
                evolution::check_evolution,
                systems::rebuild_spatial_index,
                systems::advance_tick,
                snapshot::capture_snapshot,
            )
                .chain(),
        );

    app
}

/// Execute a single simulation turn.
///
/// Each call processes the chained systems configured in [`build_headless_app`]
/// (decisions → actions → environment → evolution → index rebuild → tick
/// increment → snapshot). Callers are responsible for snapshot broadcasting
/// and command handling.
pub fn run_turn(app: &mut App) {
    app.update();
}
