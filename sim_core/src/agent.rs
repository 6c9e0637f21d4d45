use std::fmt;

use rand::Rng;
use sim_schema::{DefenseKind, DietKind, MouthKind, TraitRecord};

pub const ENERGY_MIN: i32 = 0;
pub const ENERGY_MAX: i32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AgentId(pub u64);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlayerId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColonyId(pub u64);

/// Stage-3 generated body plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartSet {
    pub mouth: MouthKind,
    pub limbs: u8,
    pub sensors: u8,
    pub defense: DefenseKind,
}

impl PartSet {
    /// Derive a part set from the creature's traits: mouth follows diet,
    /// limb count follows speed, sensors and defense are rolled.
    pub fn generate(traits: &TraitRecord, rng: &mut impl Rng) -> Self {
        let mouth = match traits.diet {
            DietKind::Carnivore => MouthKind::Sharp,
            DietKind::Herbivore => MouthKind::Grinding,
            DietKind::Omnivore => MouthKind::Versatile,
        };
        let limbs = if traits.speed >= 4 {
            rng.gen_range(4..=6)
        } else if traits.speed <= 2 {
            rng.gen_range(2..=3)
        } else {
            rng.gen_range(3..=4)
        };
        let sensors = rng.gen_range(2..=5);
        let defense = match rng.gen_range(0..4) {
            0 => DefenseKind::Armor,
            1 => DefenseKind::Spikes,
            2 => DefenseKind::Camouflage,
            _ => DefenseKind::None,
        };
        Self {
            mouth,
            limbs,
            sensors,
            defense,
        }
    }

    pub fn to_state(&self) -> sim_schema::PartSetState {
        sim_schema::PartSetState {
            mouth: self.mouth,
            limbs: self.limbs,
            sensors: self.sensors,
            defense: self.defense,
        }
    }
}

/// Body-plan tier. The agent id survives transitions; only the payload is
/// swapped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagePayload {
    Cell,
    Colonial { colony: ColonyId },
    Organism { parts: PartSet },
}

impl StagePayload {
    pub const fn stage(&self) -> u8 {
        match self {
            StagePayload::Cell => 1,
            StagePayload::Colonial { .. } => 2,
            StagePayload::Organism { .. } => 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Agent {
    pub id: AgentId,
    /// `None` marks an NPC predator.
    pub owner: Option<PlayerId>,
    pub x: i32,
    pub y: i32,
    energy: i32,
    pub age: u32,
    pub alive: bool,
    pub traits: TraitRecord,
    pub payload: StagePayload,
}

impl Agent {
    pub fn cell(id: AgentId, traits: TraitRecord, x: i32, y: i32, owner: Option<PlayerId>) -> Self {
        Self {
            id,
            owner,
            x,
            y,
            energy: ENERGY_MAX,
            age: 0,
            alive: true,
            traits,
            payload: StagePayload::Cell,
        }
    }

    pub const fn stage(&self) -> u8 {
        self.payload.stage()
    }

    pub const fn pos(&self) -> (i32, i32) {
        (self.x, self.y)
    }

    pub fn speed(&self) -> u8 {
        self.traits.speed
    }

    pub const fn energy(&self) -> i32 {
        self.energy
    }

    /// All energy mutation funnels through here to hold 0 <= energy <= 100.
    pub fn set_energy(&mut self, value: i32) {
        self.energy = value.clamp(ENERGY_MIN, ENERGY_MAX);
    }

    pub fn gain_energy(&mut self, amount: i32) {
        self.set_energy(self.energy + amount);
    }

    pub fn drain_energy(&mut self, amount: i32) {
        self.set_energy(self.energy - amount);
    }

    pub fn colony(&self) -> Option<ColonyId> {
        match &self.payload {
            StagePayload::Colonial { colony } => Some(*colony),
            _ => None,
        }
    }

    pub fn parts(&self) -> Option<&PartSet> {
        match &self.payload {
            StagePayload::Organism { parts } => Some(parts),
            _ => None,
        }
    }

    pub fn mouth(&self) -> Option<MouthKind> {
        self.parts().map(|parts| parts.mouth)
    }

    pub fn defense(&self) -> DefenseKind {
        self.parts()
            .map(|parts| parts.defense)
            .unwrap_or(DefenseKind::None)
    }

    pub fn is_predator(&self) -> bool {
        self.owner.is_none()
    }

    pub fn is_carnivore(&self) -> bool {
        self.traits.diet == DietKind::Carnivore
    }

    /// How far the agent can observe, before environmental visibility scaling.
    pub fn detection_radius(&self, base: i32) -> f32 {
        match self.parts() {
            Some(parts) => (base + i32::from(parts.sensors)) as f32,
            None => base as f32,
        }
    }

    pub fn distance_to(&self, x: i32, y: i32) -> f32 {
        let dx = (x - self.x) as f32;
        let dy = (y - self.y) as f32;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn chebyshev_to(&self, x: i32, y: i32) -> i32 {
        (x - self.x).abs().max((y - self.y).abs())
    }
}
