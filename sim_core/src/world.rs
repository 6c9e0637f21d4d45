use std::collections::HashMap;

use bevy::prelude::*;
use rand::Rng;
use sim_schema::{FoodKind, TraitRecord};
use tracing::info;

use crate::agent::{Agent, AgentId, PlayerId};

/// Per-kind food behavior, rolled once per session and reusable across
/// episodes so a restarted attempt faces the same food economy.
#[derive(Debug, Clone, Copy)]
pub struct FoodTypeProfile {
    pub base_energy: i32,
    pub is_positive: bool,
    pub is_lethal: bool,
}

#[derive(Debug, Clone)]
pub struct FoodTypeConfig {
    profiles: HashMap<FoodKind, FoodTypeProfile>,
}

impl FoodTypeConfig {
    /// Each kind rolls a base energy in 25..=35 and a sign; exactly one kind
    /// is lethal.
    pub fn generate(rng: &mut impl Rng) -> Self {
        let lethal = FoodKind::VARIANTS[rng.gen_range(0..FoodKind::VARIANTS.len())];
        let mut profiles = HashMap::new();
        for kind in FoodKind::VARIANTS {
            let profile = FoodTypeProfile {
                base_energy: rng.gen_range(25..=35),
                is_positive: rng.gen_bool(0.5),
                is_lethal: kind == lethal,
            };
            info!(
                kind = kind.as_str(),
                base_energy = profile.base_energy,
                positive = profile.is_positive,
                lethal = profile.is_lethal,
                "food profile rolled"
            );
            profiles.insert(kind, profile);
        }
        Self { profiles }
    }

    pub fn profile(&self, kind: FoodKind) -> FoodTypeProfile {
        self.profiles
            .get(&kind)
            .copied()
            .unwrap_or(FoodTypeProfile {
                base_energy: 30,
                is_positive: true,
                is_lethal: false,
            })
    }
}

#[derive(Debug, Clone)]
pub struct FoodItem {
    pub id: u64,
    pub x: i32,
    pub y: i32,
    pub kind: FoodKind,
    pub energy_value: i32,
}

/// Canonical mutable world state. Owned by the tick schedule; nothing outside
/// it mutates agents or food.
#[derive(Resource, Debug, Clone)]
pub struct GridWorld {
    pub width: i32,
    pub height: i32,
    /// Dead agents are retained for continuity, never removed.
    pub agents: Vec<Agent>,
    pub food: Vec<FoodItem>,
    pub food_config: FoodTypeConfig,
    pub max_stage: u8,
    /// Shared id counter for agents and food. Starts high to keep early ids
    /// distinct from player slots.
    next_id: u64,
}

impl GridWorld {
    pub fn new(width: i32, height: i32, food_config: FoodTypeConfig) -> Self {
        Self {
            width,
            height,
            agents: Vec::new(),
            food: Vec::new(),
            food_config,
            max_stage: 1,
            next_id: 1000,
        }
    }

    pub fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn clamp_position(&self, x: i32, y: i32) -> (i32, i32) {
        (x.clamp(0, self.width - 1), y.clamp(0, self.height - 1))
    }

    pub fn push_agent(&mut self, agent: Agent) {
        self.max_stage = self.max_stage.max(agent.stage());
        self.agents.push(agent);
    }

    /// Spawn `count` stage-1 agents with the given traits at random free
    /// cells.
    pub fn populate(
        &mut self,
        traits: &TraitRecord,
        count: usize,
        owner: Option<PlayerId>,
        rng: &mut impl Rng,
    ) {
        for _ in 0..count {
            let (x, y) = self.random_free_cell(rng);
            let id = AgentId(self.allocate_id());
            self.push_agent(Agent::cell(id, traits.clone(), x, y, owner));
        }
    }

    /// Random cell not occupied by a living agent. Bounded retries; a crowded
    /// world accepts the last candidate rather than spinning.
    pub fn random_free_cell(&self, rng: &mut impl Rng) -> (i32, i32) {
        let mut candidate = (rng.gen_range(0..self.width), rng.gen_range(0..self.height));
        for _ in 0..64 {
            if !self.is_cell_occupied(candidate.0, candidate.1, None) {
                break;
            }
            candidate = (rng.gen_range(0..self.width), rng.gen_range(0..self.height));
        }
        candidate
    }

    pub fn spawn_resources(&mut self, count: usize, rng: &mut impl Rng) {
        for _ in 0..count {
            let (x, y) = self.random_free_cell(rng);
            let kind = FoodKind::VARIANTS[rng.gen_range(0..FoodKind::VARIANTS.len())];
            let profile = self.food_config.profile(kind);
            // Base value with +-10% jitter, negated for draining kinds.
            let jitter = rng.gen_range(0.9_f32..=1.1_f32);
            let mut energy_value = (profile.base_energy as f32 * jitter).round() as i32;
            if !profile.is_positive {
                energy_value = -energy_value;
            }
            let id = self.allocate_id();
            self.food.push(FoodItem {
                id,
                x,
                y,
                kind,
                energy_value,
            });
        }
    }

    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.iter().find(|agent| agent.id == id)
    }

    pub fn agent_mut(&mut self, id: AgentId) -> Option<&mut Agent> {
        self.agents.iter_mut().find(|agent| agent.id == id)
    }

    pub fn agent_index(&self, id: AgentId) -> Option<usize> {
        self.agents.iter().position(|agent| agent.id == id)
    }

    pub fn is_cell_occupied(&self, x: i32, y: i32, exclude: Option<AgentId>) -> bool {
        self.agents.iter().any(|agent| {
            agent.alive && agent.x == x && agent.y == y && Some(agent.id) != exclude
        })
    }

    pub fn food_by_id(&self, id: u64) -> Option<&FoodItem> {
        self.food.iter().find(|item| item.id == id)
    }

    /// First food item within Chebyshev distance 1 of the position.
    pub fn food_adjacent(&self, x: i32, y: i32) -> Option<&FoodItem> {
        self.food
            .iter()
            .find(|item| (item.x - x).abs() <= 1 && (item.y - y).abs() <= 1)
    }

    /// Removes and returns the food item. Ids are never reused.
    pub fn take_food(&mut self, id: u64) -> Option<FoodItem> {
        let index = self.food.iter().position(|item| item.id == id)?;
        Some(self.food.remove(index))
    }

    pub fn living_owned(&self) -> impl Iterator<Item = &Agent> {
        self.agents
            .iter()
            .filter(|agent| agent.alive && agent.owner.is_some())
    }

    pub fn living_count(&self) -> usize {
        self.agents.iter().filter(|agent| agent.alive).count()
    }

    pub fn region_of(&self, x: i32, y: i32, region_size: i32) -> (i32, i32) {
        (x.div_euclid(region_size), y.div_euclid(region_size))
    }

    /// Region key with the highest food count, if any food exists.
    pub fn richest_food_region(&self, region_size: i32) -> Option<(i32, i32)> {
        let mut counts: HashMap<(i32, i32), usize> = HashMap::new();
        for item in &self.food {
            *counts
                .entry(self.region_of(item.x, item.y, region_size))
                .or_default() += 1;
        }
        counts
            .into_iter()
            .max_by_key(|(region, count)| (*count, *region))
            .map(|(region, _)| region)
    }

    /// One-time world growth on the first stage-3 transition: everything is
    /// re-centered by a uniform offset so relative positions are preserved.
    pub fn grow_extent(&mut self, min_extent: i32) -> Option<(i32, i32)> {
        if self.width >= min_extent && self.height >= min_extent {
            return None;
        }
        let offset_x = (min_extent - self.width) / 2;
        let offset_y = (min_extent - self.height) / 2;
        self.width = self.width.max(min_extent);
        self.height = self.height.max(min_extent);
        for agent in &mut self.agents {
            agent.x += offset_x;
            agent.y += offset_y;
        }
        for item in &mut self.food {
            item.x += offset_x;
            item.y += offset_y;
        }
        info!(
            width = self.width,
            height = self.height,
            "world extent grown for stage 3"
        );
        Some((offset_x, offset_y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::SmallRng, SeedableRng};

    fn test_world() -> (GridWorld, SmallRng) {
        let mut rng = SmallRng::seed_from_u64(3);
        let config = FoodTypeConfig::generate(&mut rng);
        (GridWorld::new(20, 20, config), rng)
    }

    #[test]
    fn exactly_one_food_kind_is_lethal() {
        let mut rng = SmallRng::seed_from_u64(1);
        let config = FoodTypeConfig::generate(&mut rng);
        let lethal = FoodKind::VARIANTS
            .iter()
            .filter(|kind| config.profile(**kind).is_lethal)
            .count();
        assert_eq!(lethal, 1);
    }

    #[test]
    fn consumed_food_id_is_never_reissued() {
        let (mut world, mut rng) = test_world();
        world.spawn_resources(5, &mut rng);
        let id = world.food[0].id;
        assert!(world.take_food(id).is_some());
        assert!(world.take_food(id).is_none());
        world.spawn_resources(50, &mut rng);
        assert!(world.food.iter().all(|item| item.id != id));
    }

    #[test]
    fn grow_extent_recenters_agents() {
        let (mut world, _) = test_world();
        world.push_agent(Agent::cell(
            AgentId(1),
            TraitRecord::default(),
            5,
            5,
            None,
        ));
        let offset = world.grow_extent(40).expect("growth applied");
        assert_eq!(offset, (10, 10));
        assert_eq!(world.agents[0].pos(), (15, 15));
        assert_eq!(world.width, 40);
        assert!(world.grow_extent(40).is_none());
    }

    #[test]
    fn richest_region_tracks_food_density() {
        let (mut world, _) = test_world();
        for (i, (x, y)) in [(1, 1), (2, 2), (3, 1), (17, 17)].into_iter().enumerate() {
            world.food.push(FoodItem {
                id: 2000 + i as u64,
                x,
                y,
                kind: FoodKind::Apple,
                energy_value: 30,
            });
        }
        assert_eq!(world.richest_food_region(5), Some((0, 0)));
    }
}
