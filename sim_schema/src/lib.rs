//! Shared data contracts for the Primordium simulation.
//!
//! Everything that crosses a process or crate boundary lives here: creature
//! trait records (with lenient coercion of externally-sourced values), the
//! action vocabulary, serialized world-snapshot state, and the text grammars
//! for inference responses and control commands.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub mod command_text;
pub mod response_text;

/// Fixed color palette creatures may carry. Unknown colors coerce to blue.
pub const COLOR_PALETTE: [&str; 11] = [
    "blue", "red", "green", "yellow", "purple", "orange", "pink", "cyan", "brown", "black", "white",
];

pub const SPEED_MIN: u8 = 1;
pub const SPEED_MAX: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DietKind {
    Herbivore,
    Carnivore,
    Omnivore,
}

impl DietKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            DietKind::Herbivore => "herbivore",
            DietKind::Carnivore => "carnivore",
            DietKind::Omnivore => "omnivore",
        }
    }
}

impl FromStr for DietKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "herbivore" => Ok(DietKind::Herbivore),
            "carnivore" => Ok(DietKind::Carnivore),
            "omnivore" => Ok(DietKind::Omnivore),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SocialKind {
    Social,
    #[default]
    Solitary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AggressionKind {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SizeKind {
    Small,
    #[default]
    Medium,
    Large,
}

/// Heritable deltas applied to offspring at reproduction time.
///
/// Values arrive from the trait-extraction collaborator and are bounded during
/// coercion so a malformed record can never push an offspring outside the
/// legal stat ranges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GeneticVariation {
    #[serde(default)]
    pub speed_delta: i8,
    #[serde(default)]
    pub starting_energy_delta: i8,
    #[serde(default)]
    pub color_override: Option<String>,
}

impl GeneticVariation {
    fn coerce(&mut self) {
        self.speed_delta = self.speed_delta.clamp(-2, 2);
        self.starting_energy_delta = self.starting_energy_delta.clamp(-20, 20);
        if let Some(color) = self.color_override.take() {
            self.color_override = Some(coerce_color(&color));
        }
    }
}

/// Creature trait record as produced by the trait-extraction collaborator.
///
/// All fields are coerced to the nearest legal value on ingest; a record that
/// survives [`TraitRecord::coerce`] is valid by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraitRecord {
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default = "default_speed")]
    pub speed: u8,
    #[serde(default = "default_diet")]
    pub diet: DietKind,
    #[serde(default)]
    pub social: SocialKind,
    #[serde(default)]
    pub aggression: AggressionKind,
    #[serde(default)]
    pub size: SizeKind,
    #[serde(default)]
    pub custom_actions: Vec<String>,
    #[serde(default)]
    pub variation: Option<GeneticVariation>,
}

fn default_color() -> String {
    "blue".to_string()
}

const fn default_speed() -> u8 {
    3
}

const fn default_diet() -> DietKind {
    DietKind::Omnivore
}

impl Default for TraitRecord {
    fn default() -> Self {
        Self {
            color: default_color(),
            speed: default_speed(),
            diet: default_diet(),
            social: SocialKind::default(),
            aggression: AggressionKind::default(),
            size: SizeKind::default(),
            custom_actions: Vec::new(),
            variation: None,
        }
    }
}

impl TraitRecord {
    /// Snap every field to its nearest legal value. Never fails.
    pub fn coerce(&mut self) {
        self.color = coerce_color(&self.color);
        self.speed = self.speed.clamp(SPEED_MIN, SPEED_MAX);
        for action in &mut self.custom_actions {
            *action = action.trim().to_ascii_lowercase();
        }
        self.custom_actions.retain(|action| !action.is_empty());
        if let Some(variation) = &mut self.variation {
            variation.coerce();
        }
    }

    pub fn coerced(mut self) -> Self {
        self.coerce();
        self
    }
}

fn coerce_color(raw: &str) -> String {
    let cleaned = raw.trim().to_ascii_lowercase();
    if COLOR_PALETTE.contains(&cleaned.as_str()) {
        cleaned
    } else {
        default_color()
    }
}

/// Cardinal step direction for movement-class actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    pub const fn delta(&self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }

    /// Direction that steps toward the target along the dominant axis.
    pub fn toward(from: (i32, i32), to: (i32, i32)) -> Option<Direction> {
        let dx = to.0 - from.0;
        let dy = to.1 - from.1;
        if dx == 0 && dy == 0 {
            return None;
        }
        if dx.abs() >= dy.abs() {
            Some(if dx > 0 { Direction::Right } else { Direction::Left })
        } else {
            Some(if dy > 0 { Direction::Down } else { Direction::Up })
        }
    }

    pub fn opposite(&self) -> Direction {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Direction::Up => "UP",
            Direction::Down => "DOWN",
            Direction::Left => "LEFT",
            Direction::Right => "RIGHT",
        };
        f.write_str(label)
    }
}

/// The full per-tick action vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Move,
    Eat,
    Flee,
    Attack,
    Reproduce,
    Signal,
    Claim,
    Cooperate,
    Migrate,
    Idle,
}

impl ActionKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Move => "move",
            ActionKind::Eat => "eat",
            ActionKind::Flee => "flee",
            ActionKind::Attack => "attack",
            ActionKind::Reproduce => "reproduce",
            ActionKind::Signal => "signal",
            ActionKind::Claim => "claim",
            ActionKind::Cooperate => "cooperate",
            ActionKind::Migrate => "migrate",
            ActionKind::Idle => "idle",
        }
    }
}

/// One agent's chosen action for a tick, as parsed from an inference response
/// or produced by the rule engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionCommand {
    pub kind: ActionKind,
    pub direction: Option<Direction>,
    pub target: Option<u64>,
}

impl ActionCommand {
    pub const fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            direction: None,
            target: None,
        }
    }

    pub const fn with_direction(kind: ActionKind, direction: Direction) -> Self {
        Self {
            kind,
            direction: Some(direction),
            target: None,
        }
    }

    pub const fn with_target(kind: ActionKind, target: u64) -> Self {
        Self {
            kind,
            direction: None,
            target: Some(target),
        }
    }

    pub const fn idle() -> Self {
        Self::new(ActionKind::Idle)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FoodKind {
    Apple,
    Banana,
    Grapes,
}

impl FoodKind {
    pub const VARIANTS: [FoodKind; 3] = [FoodKind::Apple, FoodKind::Banana, FoodKind::Grapes];

    pub const fn as_str(&self) -> &'static str {
        match self {
            FoodKind::Apple => "apple",
            FoodKind::Banana => "banana",
            FoodKind::Grapes => "grapes",
        }
    }
}

impl FromStr for FoodKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "apple" => Ok(FoodKind::Apple),
            "banana" => Ok(FoodKind::Banana),
            "grapes" => Ok(FoodKind::Grapes),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouthKind {
    Sharp,
    Grinding,
    Versatile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefenseKind {
    Armor,
    Spikes,
    Camouflage,
    None,
}

impl DefenseKind {
    /// Fraction of incoming damage absorbed by this defense part.
    pub const fn reduction(&self) -> f32 {
        match self {
            DefenseKind::Armor => 0.5,
            DefenseKind::Spikes => 0.3,
            DefenseKind::Camouflage => 0.2,
            DefenseKind::None => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeatherKind {
    Clear,
    Storm,
    Fog,
    HeatWave,
    ColdSnap,
}

impl WeatherKind {
    pub const VARIANTS: [WeatherKind; 5] = [
        WeatherKind::Clear,
        WeatherKind::Storm,
        WeatherKind::Fog,
        WeatherKind::HeatWave,
        WeatherKind::ColdSnap,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            WeatherKind::Clear => "clear",
            WeatherKind::Storm => "storm",
            WeatherKind::Fog => "fog",
            WeatherKind::HeatWave => "heat_wave",
            WeatherKind::ColdSnap => "cold_snap",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisasterKind {
    Earthquake,
    Flood,
}

// ---------------------------------------------------------------------------
// Snapshot states
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SnapshotHeader {
    pub tick: u64,
    pub agent_count: u32,
    pub living_count: u32,
    pub food_count: u32,
    pub territory_count: u32,
    /// All owned agents dead; NPC predators do not keep an episode alive.
    pub extinct: bool,
}

impl SnapshotHeader {
    pub fn new(
        tick: u64,
        agent_count: usize,
        living_count: usize,
        food_count: usize,
        territory_count: usize,
        extinct: bool,
    ) -> Self {
        Self {
            tick,
            agent_count: agent_count as u32,
            living_count: living_count as u32,
            food_count: food_count as u32,
            territory_count: territory_count as u32,
            extinct,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PartSetState {
    pub mouth: MouthKind,
    pub limbs: u8,
    pub sensors: u8,
    pub defense: DefenseKind,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentState {
    pub id: u64,
    pub owner: Option<u32>,
    pub x: i32,
    pub y: i32,
    pub energy: i32,
    pub age: u32,
    pub alive: bool,
    pub stage: u8,
    pub color: String,
    pub speed: u8,
    pub diet: DietKind,
    pub colony: Option<u64>,
    pub parts: Option<PartSetState>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FoodState {
    pub id: u64,
    pub x: i32,
    pub y: i32,
    pub kind: FoodKind,
    pub energy_value: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DisasterState {
    pub kind: DisasterKind,
    pub x: i32,
    pub y: i32,
    pub radius: i32,
    pub remaining: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnvironmentSnapshot {
    pub weather: WeatherKind,
    pub is_day: bool,
    pub visibility: f32,
    pub disasters: Vec<DisasterState>,
}

impl Default for EnvironmentSnapshot {
    fn default() -> Self {
        Self {
            weather: WeatherKind::Clear,
            is_day: true,
            visibility: 1.0,
            disasters: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TerritoryState {
    pub region_x: i32,
    pub region_y: i32,
    pub owner: u64,
}

/// One serialized tick of world state, as delivered to the session layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct WorldSnapshot {
    pub header: SnapshotHeader,
    pub agents: Vec<AgentState>,
    pub food: Vec<FoodState>,
    pub environment: EnvironmentSnapshot,
    pub territories: Vec<TerritoryState>,
}

pub fn encode_snapshot(snapshot: &WorldSnapshot) -> Result<Vec<u8>, bincode::Error> {
    bincode::serialize(snapshot)
}

pub fn decode_snapshot(bytes: &[u8]) -> Result<WorldSnapshot, bincode::Error> {
    bincode::deserialize(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trait_record_coercion_snaps_to_legal_values() {
        let mut record = TraitRecord {
            color: " Chartreuse ".to_string(),
            speed: 9,
            custom_actions: vec!["  BURROW ".to_string(), "".to_string()],
            variation: Some(GeneticVariation {
                speed_delta: 7,
                starting_energy_delta: -120,
                color_override: Some("RED".to_string()),
            }),
            ..TraitRecord::default()
        };
        record.coerce();

        assert_eq!(record.color, "blue");
        assert_eq!(record.speed, SPEED_MAX);
        assert_eq!(record.custom_actions, vec!["burrow".to_string()]);
        let variation = record.variation.unwrap();
        assert_eq!(variation.speed_delta, 2);
        assert_eq!(variation.starting_energy_delta, -20);
        assert_eq!(variation.color_override.as_deref(), Some("red"));
    }

    #[test]
    fn trait_record_deserializes_with_defaults() {
        let record: TraitRecord = serde_json::from_str("{}").expect("empty record");
        assert_eq!(record, TraitRecord::default());

        let record: TraitRecord =
            serde_json::from_str(r#"{"color":"green","speed":5,"diet":"carnivore"}"#)
                .expect("partial record");
        assert_eq!(record.color, "green");
        assert_eq!(record.diet, DietKind::Carnivore);
        assert_eq!(record.social, SocialKind::Solitary);
    }

    #[test]
    fn direction_toward_prefers_dominant_axis() {
        assert_eq!(
            Direction::toward((0, 0), (5, 2)),
            Some(Direction::Right)
        );
        assert_eq!(Direction::toward((0, 0), (1, -4)), Some(Direction::Up));
        assert_eq!(Direction::toward((3, 3), (3, 3)), None);
    }

    #[test]
    fn snapshot_round_trips_through_bincode() {
        let snapshot = WorldSnapshot {
            header: SnapshotHeader::new(7, 2, 1, 3, 1, false),
            agents: vec![AgentState {
                id: 1000,
                owner: Some(1),
                x: 4,
                y: 5,
                energy: 62,
                age: 12,
                alive: true,
                stage: 3,
                color: "red".to_string(),
                speed: 4,
                diet: DietKind::Carnivore,
                colony: None,
                parts: Some(PartSetState {
                    mouth: MouthKind::Sharp,
                    limbs: 5,
                    sensors: 3,
                    defense: DefenseKind::Spikes,
                }),
            }],
            food: vec![FoodState {
                id: 1001,
                x: 0,
                y: 0,
                kind: FoodKind::Banana,
                energy_value: -28,
            }],
            environment: EnvironmentSnapshot::default(),
            territories: vec![TerritoryState {
                region_x: 0,
                region_y: 1,
                owner: 1000,
            }],
        };

        let bytes = encode_snapshot(&snapshot).expect("encode");
        let decoded = decode_snapshot(&bytes).expect("decode");
        assert_eq!(decoded, snapshot);
    }
}
