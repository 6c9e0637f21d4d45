//! Per-turn decision gathering.
//!
//! Every living creature gets exactly one [`ActionCommand`] per turn. Critical
//! creatures (starving or with a hostile in their cell) are decided by the
//! rule engine immediately; the rest are batched into prompts and fanned out
//! to the configured [`InferenceClient`] on worker threads. A single deadline
//! bounds the whole fan-out: batches that miss it are abandoned and their
//! creatures fall back to the rule engine.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use bevy::prelude::*;
use crossbeam_channel::unbounded;
use rand::Rng;
use sim_schema::response_text::parse_batch_response;
use sim_schema::{ActionCommand, Direction, PartSetState};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    agent::{Agent, AgentId, PlayerId},
    combat::{ATTACK_MIN_ENERGY, ATTACK_RANGE},
    environment::EnvironmentState,
    events::EventLog,
    resources::{SimulationConfig, WorldRng},
    spatial::{IndexKind, Proximity, SpatialIndex},
    world::GridWorld,
};

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("inference transport failure: {0}")]
    Transport(String),
    #[error("inference backend unavailable")]
    Unavailable,
}

/// Blocking completion backend. Implementations are called from worker
/// threads, one call per batch prompt.
pub trait InferenceClient: Send + Sync {
    fn complete(&self, prompt: &str) -> Result<String, InferenceError>;
}

/// Decision source for the turn pipeline. Without a client every creature is
/// driven by the rule engine.
#[derive(Resource, Clone, Default)]
pub struct DecisionPipeline {
    client: Option<Arc<dyn InferenceClient>>,
}

impl DecisionPipeline {
    pub fn rule_based() -> Self {
        Self { client: None }
    }

    pub fn with_client(client: Arc<dyn InferenceClient>) -> Self {
        Self {
            client: Some(client),
        }
    }

    pub fn client(&self) -> Option<&Arc<dyn InferenceClient>> {
        self.client.as_ref()
    }
}

/// One command per living creature, filled by `gather_decisions` and drained
/// by the action resolver.
#[derive(Resource, Debug, Default)]
pub struct PendingActions {
    actions: HashMap<u64, ActionCommand>,
}

impl PendingActions {
    pub fn insert(&mut self, id: AgentId, command: ActionCommand) {
        self.actions.insert(id.0, command);
    }

    pub fn take(&mut self, id: AgentId) -> Option<ActionCommand> {
        self.actions.remove(&id.0)
    }

    pub fn clear(&mut self) {
        self.actions.clear();
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct NearbyAgent {
    pub id: AgentId,
    pub x: i32,
    pub y: i32,
    pub dist: f32,
    pub energy: i32,
    pub stage: u8,
    pub owner: Option<PlayerId>,
    pub alive: bool,
}

/// Everything inside a creature's detection radius, sorted nearest-first.
/// Same-colony members are excluded so they never read as threats.
#[derive(Debug, Clone, Default)]
pub struct Neighborhood {
    pub food: Vec<Proximity>,
    pub agents: Vec<NearbyAgent>,
}

impl Neighborhood {
    pub fn nearest_food(&self) -> Option<&Proximity> {
        self.food.first()
    }

    pub fn nearest_hostile(&self, of: &Agent) -> Option<&NearbyAgent> {
        self.agents
            .iter()
            .find(|other| other.alive && other.owner != of.owner)
    }

    /// Partners are not filtered by owner; pairing crosses player lines.
    pub fn nearest_partner(&self, min_energy: i32) -> Option<&NearbyAgent> {
        self.agents
            .iter()
            .find(|other| other.alive && other.energy >= min_energy)
    }

    pub fn nearest_ally(&self, of: &Agent) -> Option<&NearbyAgent> {
        self.agents
            .iter()
            .find(|other| other.alive && other.owner == of.owner && other.owner.is_some())
    }
}

pub fn build_neighborhood(
    agent: &Agent,
    world: &GridWorld,
    index: &SpatialIndex,
    env: &EnvironmentState,
    config: &SimulationConfig,
) -> Neighborhood {
    let radius = agent.detection_radius(config.base_detection_radius) * env.visibility_modifier();
    let (x, y) = agent.pos();

    let food = index.query(x, y, radius, Some(IndexKind::Food));

    let agents = index
        .query(x, y, radius, Some(IndexKind::Agent))
        .into_iter()
        .filter(|hit| hit.id != agent.id.0)
        .filter_map(|hit| {
            let other = world.agent(AgentId(hit.id))?;
            if agent.colony().is_some() && agent.colony() == other.colony() {
                return None;
            }
            Some(NearbyAgent {
                id: other.id,
                x: other.x,
                y: other.y,
                dist: hit.dist,
                energy: other.energy(),
                stage: other.stage(),
                owner: other.owner,
                alive: other.alive,
            })
        })
        .collect();

    Neighborhood { food, agents }
}

/// Creatures in immediate danger skip inference entirely.
pub fn is_critical(agent: &Agent, neighborhood: &Neighborhood, config: &SimulationConfig) -> bool {
    if agent.energy() < config.critical_energy {
        return true;
    }
    neighborhood
        .nearest_hostile(agent)
        .map(|hostile| hostile.dist < 1.0)
        .unwrap_or(false)
}

fn toward_or_random(from: (i32, i32), to: (i32, i32), rng: &mut impl Rng) -> Direction {
    Direction::toward(from, to).unwrap_or_else(|| random_direction(rng))
}

fn random_direction(rng: &mut impl Rng) -> Direction {
    Direction::ALL[rng.gen_range(0..Direction::ALL.len())]
}

pub fn random_safe_move(rng: &mut impl Rng) -> ActionCommand {
    ActionCommand::with_direction(sim_schema::ActionKind::Move, random_direction(rng))
}

/// Deterministic priority ladder, highest first.
pub fn rule_decision(
    agent: &Agent,
    neighborhood: &Neighborhood,
    config: &SimulationConfig,
    rng: &mut impl Rng,
) -> ActionCommand {
    if let Some(food) = neighborhood.nearest_food() {
        if food.dist < 1.5 {
            return ActionCommand::with_target(sim_schema::ActionKind::Eat, food.id);
        }
    }

    if agent.energy() < config.critical_energy {
        if let Some(food) = neighborhood.nearest_food() {
            let direction = toward_or_random(agent.pos(), (food.x, food.y), rng);
            return ActionCommand::with_direction(sim_schema::ActionKind::Move, direction);
        }
    }

    if let Some(hostile) = neighborhood.nearest_hostile(agent) {
        if hostile.dist < 2.0 && agent.energy() < ATTACK_MIN_ENERGY {
            let away = toward_or_random(agent.pos(), (hostile.x, hostile.y), rng).opposite();
            return ActionCommand::with_direction(sim_schema::ActionKind::Flee, away);
        }
        if hostile.dist <= ATTACK_RANGE && agent.energy() >= ATTACK_MIN_ENERGY {
            return ActionCommand::with_target(sim_schema::ActionKind::Attack, hostile.id.0);
        }
    }

    if agent.energy() >= config.reproduce_min_energy {
        if let Some(partner) = neighborhood.nearest_partner(config.reproduce_min_energy) {
            if partner.dist <= 1.5 {
                return ActionCommand::with_target(sim_schema::ActionKind::Reproduce, partner.id.0);
            }
        }
    }

    if let Some(food) = neighborhood.nearest_food() {
        let direction = toward_or_random(agent.pos(), (food.x, food.y), rng);
        return ActionCommand::with_direction(sim_schema::ActionKind::Move, direction);
    }

    random_safe_move(rng)
}

/// Predators hunt the nearest player-owned creature and never use inference.
pub fn predator_decision(
    agent: &Agent,
    neighborhood: &Neighborhood,
    rng: &mut impl Rng,
) -> ActionCommand {
    let prey = neighborhood
        .agents
        .iter()
        .find(|other| other.alive && other.owner.is_some());
    match prey {
        Some(prey) if prey.dist <= ATTACK_RANGE && agent.energy() >= ATTACK_MIN_ENERGY => {
            ActionCommand::with_target(sim_schema::ActionKind::Attack, prey.id.0)
        }
        Some(prey) => {
            let direction = toward_or_random(agent.pos(), (prey.x, prey.y), rng);
            ActionCommand::with_direction(sim_schema::ActionKind::Move, direction)
        }
        None => random_safe_move(rng),
    }
}

fn legal_actions(agent: &Agent, neighborhood: &Neighborhood) -> String {
    let mut actions = vec!["MOVE <DIR>".to_string()];
    if let Some(food) = neighborhood.nearest_food() {
        if food.dist < 1.5 {
            actions.push(format!("EAT {}", food.id));
        }
    }
    if let Some(hostile) = neighborhood.nearest_hostile(agent) {
        actions.push("FLEE <DIR>".to_string());
        if hostile.dist <= ATTACK_RANGE && agent.energy() >= ATTACK_MIN_ENERGY {
            actions.push(format!("ATTACK {}", hostile.id));
        }
    }
    if let Some(partner) = neighborhood.nearest_partner(0) {
        if partner.dist <= 1.5 {
            actions.push(format!("REPRODUCE {}", partner.id));
        }
    }
    if let Some(ally) = neighborhood.nearest_ally(agent) {
        actions.push("SIGNAL".to_string());
        if ally.dist <= 1.5 {
            actions.push(format!("COOPERATE {}", ally.id));
        }
    }
    actions.push("CLAIM".to_string());
    actions.push("MIGRATE".to_string());
    for custom in &agent.traits.custom_actions {
        actions.push(custom.to_uppercase());
    }
    actions.join(", ")
}

fn part_summary(parts: Option<&PartSetState>) -> String {
    match parts {
        Some(parts) => format!(
            " parts[{:?} limbs:{} sensors:{} {:?}]",
            parts.mouth, parts.limbs, parts.sensors, parts.defense
        ),
        None => String::new(),
    }
}

/// One compact line of situational context per creature. The backend answers
/// with `id:ACTION` lines; see [`parse_batch_response`].
pub fn creature_line(agent: &Agent, neighborhood: &Neighborhood) -> String {
    let mut line = format!(
        "{}: {} stage{} E:{} @({},{}){}",
        agent.id,
        agent.traits.diet.as_str(),
        agent.stage(),
        agent.energy(),
        agent.x,
        agent.y,
        part_summary(agent.parts().map(|parts| parts.to_state()).as_ref()),
    );
    if let Some(food) = neighborhood.nearest_food() {
        let dir = Direction::toward(agent.pos(), (food.x, food.y))
            .map(|d| d.to_string())
            .unwrap_or_else(|| "HERE".to_string());
        line.push_str(&format!(" FOOD {} d{:.1}", dir, food.dist));
    }
    if let Some(hostile) = neighborhood.nearest_hostile(agent) {
        let dir = Direction::toward(agent.pos(), (hostile.x, hostile.y))
            .map(|d| d.to_string())
            .unwrap_or_else(|| "HERE".to_string());
        line.push_str(&format!(" ENEMY {} d{:.1}", dir, hostile.dist));
    }
    line.push_str(&format!(" | {}", legal_actions(agent, neighborhood)));
    line
}

pub fn build_batch_prompt(lines: &[String]) -> String {
    let mut prompt = String::from(
        "You control the creatures below, one per line. Reply with exactly one \
         line per creature in the form `id:ACTION [ARG]`.\n\n",
    );
    for line in lines {
        prompt.push_str(line);
        prompt.push('\n');
    }
    prompt
}

enum BatchOutcome {
    Completed(HashMap<u64, ActionCommand>),
    Failed,
}

/// Opens the turn: resets the event log, then fills [`PendingActions`] for
/// every living creature.
pub fn gather_decisions(
    config: Res<SimulationConfig>,
    pipeline: Res<DecisionPipeline>,
    world: Res<GridWorld>,
    index: Res<SpatialIndex>,
    env: Res<EnvironmentState>,
    mut rng: ResMut<WorldRng>,
    mut events: ResMut<EventLog>,
    mut pending: ResMut<PendingActions>,
) {
    events.reset_turn();
    pending.clear();
    let rng = &mut rng.0;

    // Per-agent work deferred to the inference fan-out.
    let mut deferred: Vec<(AgentId, String, Neighborhood)> = Vec::new();

    for agent in world.agents.iter().filter(|agent| agent.alive) {
        let neighborhood = build_neighborhood(agent, &world, &index, &env, &config);
        if agent.is_predator() {
            pending.insert(agent.id, predator_decision(agent, &neighborhood, rng));
        } else if is_critical(agent, &neighborhood, &config) {
            pending.insert(agent.id, rule_decision(agent, &neighborhood, &config, rng));
        } else {
            let line = creature_line(agent, &neighborhood);
            deferred.push((agent.id, line, neighborhood));
        }
    }

    if deferred.is_empty() {
        return;
    }

    let Some(client) = pipeline.client() else {
        for (id, _, neighborhood) in &deferred {
            if let Some(agent) = world.agent(*id) {
                pending.insert(*id, rule_decision(agent, neighborhood, &config, rng));
            }
        }
        return;
    };

    let batch_size = config.inference_batch_size.max(1);
    let batches: Vec<&[(AgentId, String, Neighborhood)]> = deferred.chunks(batch_size).collect();
    let deadline = Instant::now() + config.inference_timeout;
    let (tx, rx) = unbounded();

    for (batch_index, batch) in batches.iter().enumerate() {
        let lines: Vec<String> = batch.iter().map(|(_, line, _)| line.clone()).collect();
        let prompt = build_batch_prompt(&lines);
        let client = Arc::clone(client);
        let tx = tx.clone();
        thread::spawn(move || {
            let result = client.complete(&prompt);
            // Receiver may have given up on the deadline already.
            let _ = tx.send((batch_index, result));
        });
    }
    drop(tx);

    let mut outcomes: Vec<BatchOutcome> = (0..batches.len()).map(|_| BatchOutcome::Failed).collect();
    let mut received = 0;
    while received < batches.len() {
        match rx.recv_deadline(deadline) {
            Ok((batch_index, Ok(text))) => {
                let parsed: HashMap<u64, ActionCommand> =
                    parse_batch_response(&text).into_iter().collect();
                outcomes[batch_index] = BatchOutcome::Completed(parsed);
                received += 1;
            }
            Ok((batch_index, Err(error))) => {
                debug!(batch_index, %error, "inference batch failed");
                received += 1;
            }
            Err(_) => {
                warn!(
                    abandoned = batches.len() - received,
                    "inference deadline reached; falling back to rules"
                );
                break;
            }
        }
    }

    for (batch, outcome) in batches.iter().zip(&outcomes) {
        for (id, _, neighborhood) in *batch {
            let command = match outcome {
                BatchOutcome::Completed(parsed) => parsed
                    .get(&id.0)
                    .copied()
                    .unwrap_or_else(|| random_safe_move(rng)),
                BatchOutcome::Failed => match world.agent(*id) {
                    Some(agent) => rule_decision(agent, neighborhood, &config, rng),
                    None => random_safe_move(rng),
                },
            };
            pending.insert(*id, command);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::SmallRng, SeedableRng};
    use sim_schema::{ActionKind, TraitRecord};
    use std::time::Duration;

    fn agent_at(id: u64, x: i32, y: i32, energy: i32) -> Agent {
        let mut agent = Agent::cell(AgentId(id), TraitRecord::default(), x, y, Some(PlayerId(1)));
        agent.set_energy(energy);
        agent
    }

    fn nearby(id: u64, x: i32, y: i32, dist: f32, energy: i32, owner: Option<u32>) -> NearbyAgent {
        NearbyAgent {
            id: AgentId(id),
            x,
            y,
            dist,
            energy,
            stage: 1,
            owner: owner.map(PlayerId),
            alive: true,
        }
    }

    fn food_at(id: u64, x: i32, y: i32, dist: f32) -> Proximity {
        Proximity {
            id,
            x,
            y,
            kind: IndexKind::Food,
            dist,
        }
    }

    #[test]
    fn adjacent_food_beats_everything() {
        let mut rng = SmallRng::seed_from_u64(1);
        let config = SimulationConfig::default();
        let agent = agent_at(1000, 5, 5, 90);
        let neighborhood = Neighborhood {
            food: vec![food_at(7, 5, 6, 1.0)],
            agents: vec![nearby(1001, 6, 5, 1.0, 90, Some(2))],
        };
        let command = rule_decision(&agent, &neighborhood, &config, &mut rng);
        assert_eq!(command.kind, ActionKind::Eat);
        assert_eq!(command.target, Some(7));
    }

    #[test]
    fn weak_creature_flees_nearby_threat() {
        let mut rng = SmallRng::seed_from_u64(1);
        let config = SimulationConfig::default();
        let agent = agent_at(1000, 5, 5, 40);
        let neighborhood = Neighborhood {
            food: Vec::new(),
            agents: vec![nearby(1001, 6, 5, 1.0, 80, Some(2))],
        };
        let command = rule_decision(&agent, &neighborhood, &config, &mut rng);
        assert_eq!(command.kind, ActionKind::Flee);
        assert_eq!(command.direction, Some(Direction::Left));
    }

    #[test]
    fn strong_creature_attacks_instead() {
        let mut rng = SmallRng::seed_from_u64(1);
        let config = SimulationConfig::default();
        let agent = agent_at(1000, 5, 5, 70);
        let neighborhood = Neighborhood {
            food: Vec::new(),
            agents: vec![nearby(1001, 6, 5, 1.0, 80, Some(2))],
        };
        let command = rule_decision(&agent, &neighborhood, &config, &mut rng);
        assert_eq!(command.kind, ActionKind::Attack);
        assert_eq!(command.target, Some(1001));
    }

    #[test]
    fn energized_pair_reproduces() {
        let mut rng = SmallRng::seed_from_u64(1);
        let config = SimulationConfig::default();
        let agent = agent_at(1000, 5, 5, 95);
        let neighborhood = Neighborhood {
            food: Vec::new(),
            agents: vec![nearby(1001, 6, 5, 1.0, 92, Some(1))],
        };
        let command = rule_decision(&agent, &neighborhood, &config, &mut rng);
        assert_eq!(command.kind, ActionKind::Reproduce);
        assert_eq!(command.target, Some(1001));
    }

    #[test]
    fn starving_creature_is_critical() {
        let config = SimulationConfig::default();
        let agent = agent_at(1000, 5, 5, 10);
        assert!(is_critical(&agent, &Neighborhood::default(), &config));

        let healthy = agent_at(1001, 5, 5, 60);
        assert!(!is_critical(&healthy, &Neighborhood::default(), &config));
    }

    #[test]
    fn cohabiting_hostile_is_critical() {
        let config = SimulationConfig::default();
        let agent = agent_at(1000, 5, 5, 60);
        let neighborhood = Neighborhood {
            food: Vec::new(),
            agents: vec![nearby(1001, 5, 5, 0.0, 50, Some(2))],
        };
        assert!(is_critical(&agent, &neighborhood, &config));
    }

    #[test]
    fn predator_closes_distance_then_strikes() {
        let mut rng = SmallRng::seed_from_u64(1);
        let mut predator = Agent::cell(AgentId(2000), TraitRecord::default(), 0, 5, None);
        predator.set_energy(80);

        let far = Neighborhood {
            food: Vec::new(),
            agents: vec![nearby(1000, 4, 5, 4.0, 50, Some(1))],
        };
        let command = predator_decision(&predator, &far, &mut rng);
        assert_eq!(command.kind, ActionKind::Move);
        assert_eq!(command.direction, Some(Direction::Right));

        let close = Neighborhood {
            food: Vec::new(),
            agents: vec![nearby(1000, 1, 5, 1.0, 50, Some(1))],
        };
        let command = predator_decision(&predator, &close, &mut rng);
        assert_eq!(command.kind, ActionKind::Attack);
        assert_eq!(command.target, Some(1000));
    }

    #[test]
    fn batch_prompt_lists_one_line_per_creature() {
        let config = SimulationConfig::default();
        let agent = agent_at(1000, 5, 5, 60);
        let neighborhood = Neighborhood {
            food: vec![food_at(7, 5, 7, 2.0)],
            agents: Vec::new(),
        };
        let line = creature_line(&agent, &neighborhood);
        assert!(line.starts_with("1000:"));
        assert!(line.contains("E:60"));
        assert!(line.contains("FOOD DOWN d2.0"));
        assert!(line.contains("MOVE <DIR>"));

        let prompt = build_batch_prompt(&[line.clone(), line]);
        assert_eq!(prompt.lines().filter(|l| l.starts_with("1000:")).count(), 2);
    }

    struct SlowClient(Duration);

    impl InferenceClient for SlowClient {
        fn complete(&self, _prompt: &str) -> Result<String, InferenceError> {
            thread::sleep(self.0);
            Ok("1000:ATTACK 1".to_string())
        }
    }

    #[test]
    fn slow_backend_misses_deadline() {
        // Mirrors the barrier in gather_decisions without a full world.
        let client: Arc<dyn InferenceClient> = Arc::new(SlowClient(Duration::from_millis(200)));
        let (tx, rx) = unbounded();
        let worker = Arc::clone(&client);
        thread::spawn(move || {
            let _ = tx.send(worker.complete("prompt"));
        });
        let deadline = Instant::now() + Duration::from_millis(20);
        assert!(rx.recv_deadline(deadline).is_err());
    }
}
