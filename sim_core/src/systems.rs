//! Glue systems: world bootstrap, index rebuild, tick advancement.

use bevy::prelude::*;
use sim_schema::TraitRecord;
use tracing::{info, warn};

use crate::{
    agent::PlayerId,
    environment::EnvironmentState,
    events::{EventLog, SimEvent},
    resources::{EpisodeStatus, SimulationConfig, SimulationTick, WorldRng},
    spatial::SpatialIndex,
    world::{FoodTypeConfig, GridWorld},
};

/// Startup: grid, starting population, food stock, hazards, and a primed
/// spatial index so the first tick's decisions see the world.
pub fn spawn_initial_world(
    mut commands: Commands,
    config: Res<SimulationConfig>,
    mut rng: ResMut<WorldRng>,
    mut env: ResMut<EnvironmentState>,
    mut index: ResMut<SpatialIndex>,
) {
    let rng = &mut rng.0;
    let food_config = FoodTypeConfig::generate(rng);
    let mut world = GridWorld::new(config.grid_width, config.grid_height, food_config);

    world.populate(
        &TraitRecord::default(),
        config.initial_population,
        Some(PlayerId(1)),
        rng,
    );
    world.spawn_resources(config.initial_food, rng);
    env.seed_hazards(&world, rng);
    index.rebuild(&world);

    info!(
        width = world.width,
        height = world.height,
        population = world.living_count(),
        food = world.food.len(),
        "world initialized"
    );
    commands.insert_resource(world);
}

pub fn rebuild_spatial_index(world: Res<GridWorld>, mut index: ResMut<SpatialIndex>) {
    index.rebuild(&world);
}

/// Increments the tick counter and maintains the extinction flag. Predators
/// never keep an episode alive; a later spawn clears the flag.
pub fn advance_tick(
    world: Res<GridWorld>,
    mut tick: ResMut<SimulationTick>,
    mut status: ResMut<EpisodeStatus>,
    mut events: ResMut<EventLog>,
) {
    tick.0 += 1;

    let any_owned_alive = world.living_owned().next().is_some();
    let any_owned_ever = world.agents.iter().any(|agent| agent.owner.is_some());

    if status.extinct {
        if any_owned_alive {
            status.extinct = false;
            status.extinct_since = None;
            info!(tick = tick.0, "population restored after extinction");
        }
    } else if any_owned_ever && !any_owned_alive {
        status.extinct = true;
        status.extinct_since = Some(tick.0);
        events.push(SimEvent::Extinction { tick: tick.0 });
        warn!(tick = tick.0, "all owned creatures dead");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::ecs::system::RunSystemOnce;
    use rand::{rngs::SmallRng, SeedableRng};

    #[test]
    fn extinction_flag_follows_owned_population() {
        let mut app = bevy::app::App::new();
        let mut rng = SmallRng::seed_from_u64(21);
        let mut world = GridWorld::new(10, 10, FoodTypeConfig::generate(&mut rng));
        world.populate(&TraitRecord::default(), 2, Some(PlayerId(1)), &mut rng);
        app.insert_resource(world)
            .insert_resource(SimulationTick::default())
            .insert_resource(EpisodeStatus::default())
            .insert_resource(EventLog::default());

        app.world.run_system_once(advance_tick);
        assert!(!app.world.resource::<EpisodeStatus>().extinct);

        for agent in &mut app.world.resource_mut::<GridWorld>().agents {
            agent.alive = false;
        }
        app.world.run_system_once(advance_tick);
        let status = app.world.resource::<EpisodeStatus>();
        assert!(status.extinct);
        assert_eq!(status.extinct_since, Some(2));

        {
            let mut world = app.world.resource_mut::<GridWorld>();
            world.agents[0].alive = true;
        }
        app.world.run_system_once(advance_tick);
        assert!(!app.world.resource::<EpisodeStatus>().extinct);
    }
}
