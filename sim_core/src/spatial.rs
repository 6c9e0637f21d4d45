use std::collections::HashMap;

use bevy::prelude::*;

use crate::world::GridWorld;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexKind {
    Agent,
    Food,
}

#[derive(Debug, Clone, Copy)]
struct IndexEntry {
    id: u64,
    x: i32,
    y: i32,
    kind: IndexKind,
}

/// One query hit. `dist` is the exact Euclidean distance; bucket granularity
/// never leaks into results.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Proximity {
    pub id: u64,
    pub x: i32,
    pub y: i32,
    pub kind: IndexKind,
    pub dist: f32,
}

/// Grid-bucketed spatial index over agents and food.
///
/// Rebuilt from scratch once per tick after all mutations; incremental
/// maintenance is deliberately not offered.
#[derive(Resource, Debug, Clone)]
pub struct SpatialIndex {
    cell_size: i32,
    buckets: HashMap<(i32, i32), Vec<IndexEntry>>,
}

impl SpatialIndex {
    pub fn new(cell_size: i32) -> Self {
        Self {
            cell_size: cell_size.max(1),
            buckets: HashMap::new(),
        }
    }

    fn bucket_of(&self, x: i32, y: i32) -> (i32, i32) {
        (x.div_euclid(self.cell_size), y.div_euclid(self.cell_size))
    }

    fn insert(&mut self, id: u64, x: i32, y: i32, kind: IndexKind) {
        let key = self.bucket_of(x, y);
        self.buckets
            .entry(key)
            .or_default()
            .push(IndexEntry { id, x, y, kind });
    }

    /// Clear and repopulate from living agents and all food.
    pub fn rebuild(&mut self, world: &GridWorld) {
        self.buckets.clear();
        for agent in &world.agents {
            if agent.alive {
                self.insert(agent.id.0, agent.x, agent.y, IndexKind::Agent);
            }
        }
        for item in &world.food {
            self.insert(item.id, item.x, item.y, IndexKind::Food);
        }
    }

    /// Every indexed entity with Euclidean distance <= radius of (x, y),
    /// optionally filtered by kind, sorted nearest first.
    pub fn query(&self, x: i32, y: i32, radius: f32, kind: Option<IndexKind>) -> Vec<Proximity> {
        let reach = (radius.ceil() as i32 + self.cell_size - 1) / self.cell_size;
        let center = self.bucket_of(x, y);
        let radius_sq = radius * radius;

        let mut hits = Vec::new();
        for bx in (center.0 - reach)..=(center.0 + reach) {
            for by in (center.1 - reach)..=(center.1 + reach) {
                let Some(entries) = self.buckets.get(&(bx, by)) else {
                    continue;
                };
                for entry in entries {
                    if kind.is_some() && kind != Some(entry.kind) {
                        continue;
                    }
                    let dx = (entry.x - x) as f32;
                    let dy = (entry.y - y) as f32;
                    let dist_sq = dx * dx + dy * dy;
                    if dist_sq <= radius_sq {
                        hits.push(Proximity {
                            id: entry.id,
                            x: entry.x,
                            y: entry.y,
                            kind: entry.kind,
                            dist: dist_sq.sqrt(),
                        });
                    }
                }
            }
        }
        hits.sort_by(|a, b| a.dist.total_cmp(&b.dist));
        hits
    }
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::new(5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::FoodTypeConfig;
    use rand::{rngs::SmallRng, Rng, SeedableRng};

    #[test]
    fn query_matches_brute_force_scan() {
        let mut rng = SmallRng::seed_from_u64(42);
        let config = FoodTypeConfig::generate(&mut rng);
        let mut world = GridWorld::new(50, 50, config);
        world.spawn_resources(120, &mut rng);

        let mut index = SpatialIndex::new(5);
        index.rebuild(&world);

        for _ in 0..40 {
            let cx = rng.gen_range(0..50);
            let cy = rng.gen_range(0..50);
            let radius = rng.gen_range(1.0_f32..12.0);

            let mut expected: Vec<u64> = world
                .food
                .iter()
                .filter(|item| {
                    let dx = (item.x - cx) as f32;
                    let dy = (item.y - cy) as f32;
                    (dx * dx + dy * dy).sqrt() <= radius
                })
                .map(|item| item.id)
                .collect();
            expected.sort_unstable();

            let mut actual: Vec<u64> = index
                .query(cx, cy, radius, Some(IndexKind::Food))
                .into_iter()
                .map(|hit| hit.id)
                .collect();
            actual.sort_unstable();

            assert_eq!(actual, expected, "mismatch at ({cx},{cy}) r={radius}");
        }
    }

    #[test]
    fn results_sorted_by_exact_distance() {
        let mut rng = SmallRng::seed_from_u64(9);
        let config = FoodTypeConfig::generate(&mut rng);
        let mut world = GridWorld::new(20, 20, config);
        world.spawn_resources(30, &mut rng);

        let mut index = SpatialIndex::new(5);
        index.rebuild(&world);
        let hits = index.query(10, 10, 15.0, None);
        for pair in hits.windows(2) {
            assert!(pair[0].dist <= pair[1].dist);
        }
        for hit in &hits {
            let dx = (hit.x - 10) as f32;
            let dy = (hit.y - 10) as f32;
            assert!((hit.dist - (dx * dx + dy * dy).sqrt()).abs() < f32::EPSILON);
        }
    }

    #[test]
    fn dead_agents_are_not_indexed() {
        use crate::agent::{Agent, AgentId};
        use sim_schema::TraitRecord;

        let mut rng = SmallRng::seed_from_u64(4);
        let config = FoodTypeConfig::generate(&mut rng);
        let mut world = GridWorld::new(10, 10, config);
        let mut dead = Agent::cell(AgentId(1), TraitRecord::default(), 3, 3, None);
        dead.alive = false;
        world.push_agent(dead);
        world.push_agent(Agent::cell(AgentId(2), TraitRecord::default(), 4, 4, None));

        let mut index = SpatialIndex::new(5);
        index.rebuild(&world);
        let hits = index.query(3, 3, 5.0, Some(IndexKind::Agent));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, 2);
    }
}
