mod common;

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rand::{rngs::SmallRng, SeedableRng};
use sim_core::{
    run_turn, Agent, AgentId, DecisionPipeline, EventLog, FoodItem, FoodTypeConfig, GridWorld,
    InferenceClient, InferenceError, PlayerId, SimEvent, SimulationTick,
};
use sim_schema::{FoodKind, TraitRecord};

/// Force a food config in which `kind` heals: deterministic reseeding until
/// the coin flips land.
fn ensure_positive_kind(world: &mut GridWorld) -> FoodKind {
    let mut seed = 100;
    loop {
        if let Some(kind) = FoodKind::VARIANTS.iter().copied().find(|kind| {
            let profile = world.food_config.profile(*kind);
            profile.is_positive && !profile.is_lethal
        }) {
            return kind;
        }
        let mut rng = SmallRng::seed_from_u64(seed);
        world.food_config = FoodTypeConfig::generate(&mut rng);
        seed += 1;
    }
}

#[test]
fn starving_agent_bypasses_inference_and_eats() {
    let mut app = common::seeded_app(7, |config| {
        config.initial_population = 0;
        config.initial_food = 0;
        config.food_low_watermark = 0;
    });
    run_turn(&mut app);
    common::clear_hazards(&mut app);

    let agent_id = {
        let mut world = app.world.resource_mut::<GridWorld>();
        let kind = ensure_positive_kind(&mut world);

        let id = AgentId(world.allocate_id());
        let mut agent = Agent::cell(id, TraitRecord::default(), 5, 5, Some(PlayerId(1)));
        agent.set_energy(19);
        world.push_agent(agent);

        let food_id = world.allocate_id();
        world.food.push(FoodItem {
            id: food_id,
            x: 6,
            y: 5,
            kind,
            energy_value: 30,
        });
        id
    };
    common::reindex(&mut app);

    run_turn(&mut app);

    let world = app.world.resource::<GridWorld>();
    let agent = world.agent(agent_id).expect("agent survives the tick");
    assert!(agent.alive);
    assert_eq!(agent.energy(), 49);
    assert!(world.food.is_empty());
}

struct StallingClient {
    delay: Duration,
}

impl InferenceClient for StallingClient {
    fn complete(&self, _prompt: &str) -> Result<String, InferenceError> {
        thread::sleep(self.delay);
        Ok(String::new())
    }
}

#[test]
fn slow_inference_falls_back_within_deadline() {
    let mut app = common::seeded_app(9, |config| {
        config.initial_population = 4;
        config.inference_timeout = Duration::from_millis(50);
    });
    run_turn(&mut app);

    app.insert_resource(DecisionPipeline::with_client(Arc::new(StallingClient {
        delay: Duration::from_millis(500),
    })));

    let start = Instant::now();
    run_turn(&mut app);
    let elapsed = start.elapsed();

    // The tick must not wait out the 500ms client.
    assert!(elapsed < Duration::from_millis(400), "tick stalled: {elapsed:?}");
    assert_eq!(app.world.resource::<SimulationTick>().0, 2);
    assert!(!app.world.resource::<EventLog>().events().is_empty());
}

struct ScriptedClient {
    response: String,
}

impl InferenceClient for ScriptedClient {
    fn complete(&self, _prompt: &str) -> Result<String, InferenceError> {
        Ok(self.response.clone())
    }
}

#[test]
fn batch_responses_drive_actions() {
    let mut app = common::seeded_app(13, |config| {
        config.initial_population = 4;
    });
    run_turn(&mut app);

    // Ids are allocated sequentially from 1000 for the starting population.
    let response = (1000..1004)
        .map(|id| format!("{id}:SIGNAL"))
        .collect::<Vec<_>>()
        .join("\n");
    app.insert_resource(DecisionPipeline::with_client(Arc::new(ScriptedClient {
        response,
    })));

    run_turn(&mut app);

    let events = app.world.resource::<EventLog>();
    assert!(
        events
            .events()
            .iter()
            .any(|event| matches!(event, SimEvent::Signaled { .. })),
        "no signal landed: {:?}",
        events.events()
    );
}
