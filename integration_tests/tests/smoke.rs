mod common;

use sim_core::{
    run_turn, EpisodeStatus, GridWorld, SimulationTick, SnapshotHistory, ENERGY_MAX, ENERGY_MIN,
};

#[test]
fn app_initializes_and_ticks() {
    let mut app = common::seeded_app(1, |_| {});
    run_turn(&mut app);

    assert_eq!(app.world.resource::<SimulationTick>().0, 1);
    let world = app.world.resource::<GridWorld>();
    assert!(world.living_count() > 0);
    assert!(!world.food.is_empty());
}

#[test]
fn energy_bounds_hold_over_many_ticks() {
    let mut app = common::seeded_app(2, |config| {
        config.initial_population = 12;
    });
    let mut peak_agent_count = 0;

    for _ in 0..80 {
        run_turn(&mut app);
        let world = app.world.resource::<GridWorld>();
        for agent in &world.agents {
            let energy = agent.energy();
            assert!(
                (ENERGY_MIN..=ENERGY_MAX).contains(&energy),
                "agent {} energy {} out of bounds",
                agent.id,
                energy
            );
            if !agent.alive {
                assert_eq!(energy, 0, "dead agent {} holds energy", agent.id);
            }
        }
        // Dead agents are retained, so the roster never shrinks.
        assert!(world.agents.len() >= peak_agent_count);
        peak_agent_count = world.agents.len();
    }

    assert_eq!(app.world.resource::<SimulationTick>().0, 80);
}

#[test]
fn snapshots_track_the_world() {
    let mut app = common::seeded_app(3, |config| {
        config.snapshot_history_limit = 16;
    });
    common::run_ticks(&mut app, 20);

    let history = app.world.resource::<SnapshotHistory>();
    assert_eq!(history.len(), 16);
    let snapshot = history.latest().expect("snapshot after 20 ticks");
    assert_eq!(snapshot.header.tick, 20);

    let world = app.world.resource::<GridWorld>();
    assert_eq!(snapshot.header.agent_count as usize, world.agents.len());
    assert_eq!(snapshot.header.living_count as usize, world.living_count());
    assert_eq!(snapshot.header.food_count as usize, world.food.len());
    assert_eq!(
        snapshot.header.extinct,
        app.world.resource::<EpisodeStatus>().extinct
    );
    assert!(snapshot.agents.windows(2).all(|pair| pair[0].id < pair[1].id));
}
