use bevy::prelude::*;
use sim_core::{
    build_headless_app, run_turn, EnvironmentState, GridWorld, SimulationConfig, SpatialIndex,
    WorldRng,
};

/// Headless app with a seeded rng and config overrides applied before the
/// startup schedule runs.
pub fn seeded_app(seed: u64, tweak: impl FnOnce(&mut SimulationConfig)) -> App {
    let mut app = build_headless_app();
    {
        let mut config = app.world.resource_mut::<SimulationConfig>();
        tweak(&mut config);
    }
    app.insert_resource(WorldRng::from_seed(seed));
    app
}

pub fn run_ticks(app: &mut App, ticks: usize) {
    for _ in 0..ticks {
        run_turn(app);
    }
}

/// Strip the randomly seeded hazards so scenario tests see no passive damage.
#[allow(dead_code)]
pub fn clear_hazards(app: &mut App) {
    app.world.resource_mut::<EnvironmentState>().hazards.clear();
}

/// Re-index after direct world edits so the next tick's decisions see them.
#[allow(dead_code)]
pub fn reindex(app: &mut App) {
    app.world
        .resource_scope(|world, mut index: Mut<SpatialIndex>| {
            index.rebuild(world.resource::<GridWorld>());
        });
}
