//! Pure combat math. No shared state; callers hand in both combatants.

use sim_schema::MouthKind;

use crate::agent::{Agent, ENERGY_MAX};

pub const ATTACK_RANGE: f32 = 1.5;
pub const ATTACK_MIN_ENERGY: i32 = 50;
pub const ATTACK_COST: i32 = 3;
const KILL_ENERGY_CAP: i32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CombatOutcome {
    pub damage: i32,
    pub defender_killed: bool,
    pub energy_gained: i32,
}

/// Both alive, distinct ids, distinct owners, attacker energized, in range.
pub fn can_attack(attacker: &Agent, defender: &Agent) -> bool {
    attacker.alive
        && defender.alive
        && attacker.id != defender.id
        && attacker.owner != defender.owner
        && attacker.energy() >= ATTACK_MIN_ENERGY
        && attacker.distance_to(defender.x, defender.y) <= ATTACK_RANGE
}

/// Raw damage before defense: energy- and stage-scaled base with trait,
/// stage, and speed multipliers. Never below 1.
pub fn raw_damage(attacker: &Agent) -> i32 {
    let stage = i32::from(attacker.stage());
    let base = 10 + attacker.energy() / 10 + stage * 5;
    let stage_multiplier = 1.0 + (stage - 1) as f32 * 0.2;

    let mut trait_bonus = 1.0;
    if attacker.is_carnivore() {
        trait_bonus += 0.3;
    } else if attacker.mouth() == Some(MouthKind::Sharp) {
        trait_bonus += 0.2;
    }

    let speed_bonus = 1.0 + (i32::from(attacker.speed()) - 3) as f32 * 0.1;

    let damage = (base as f32 * stage_multiplier * trait_bonus * speed_bonus) as i32;
    damage.max(1)
}

/// Stage-3 defense parts absorb a fixed fraction. Never below 1.
pub fn apply_defense(damage: i32, defender: &Agent) -> i32 {
    let reduced = (damage as f32 * (1.0 - defender.defense().reduction())) as i32;
    reduced.max(1)
}

/// Full exchange: damage, possible kill, carnivore feeding, attack cost.
pub fn resolve(attacker: &mut Agent, defender: &mut Agent) -> CombatOutcome {
    let damage = apply_defense(raw_damage(attacker), defender);
    defender.drain_energy(damage);

    let mut defender_killed = false;
    let mut energy_gained = 0;
    if defender.energy() == 0 {
        defender.alive = false;
        defender_killed = true;
        if attacker.is_carnivore() {
            // Post-death energy is clamped to zero, so the feed value is the
            // stage bounty plus a fifth of the killing blow.
            let base = i32::from(defender.stage()) * 15 + (defender.energy() + damage) / 5;
            energy_gained = base.min(KILL_ENERGY_CAP);
            attacker.set_energy((attacker.energy() + energy_gained).min(ENERGY_MAX));
        }
    }

    // Win or lose, attacking costs the same.
    attacker.drain_energy(ATTACK_COST);

    CombatOutcome {
        damage,
        defender_killed,
        energy_gained,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentId, PartSet, PlayerId, StagePayload};
    use sim_schema::{DefenseKind, DietKind, TraitRecord};

    fn fighter(id: u64, owner: u32, energy: i32) -> Agent {
        let mut agent = Agent::cell(
            AgentId(id),
            TraitRecord::default(),
            0,
            0,
            Some(PlayerId(owner)),
        );
        agent.set_energy(energy);
        agent
    }

    #[test]
    fn can_attack_requires_energy_range_and_distinct_owners() {
        let attacker = fighter(1, 1, 60);
        let mut defender = fighter(2, 2, 60);
        defender.x = 1;
        assert!(can_attack(&attacker, &defender));

        let tired = fighter(3, 1, 49);
        assert!(!can_attack(&tired, &defender));

        let mut far = fighter(4, 2, 90);
        far.x = 3;
        assert!(!can_attack(&attacker, &far));

        let teammate = fighter(5, 1, 90);
        assert!(!can_attack(&attacker, &teammate));
    }

    #[test]
    fn damage_floors_at_one_before_and_after_defense() {
        let mut weak = fighter(1, 1, 0);
        weak.traits.speed = 1;
        assert!(raw_damage(&weak) >= 1);

        let mut armored = fighter(2, 2, 50);
        armored.payload = StagePayload::Organism {
            parts: PartSet {
                mouth: sim_schema::MouthKind::Versatile,
                limbs: 4,
                sensors: 3,
                defense: DefenseKind::Armor,
            },
        };
        assert!(apply_defense(1, &armored) >= 1);
        assert_eq!(apply_defense(10, &armored), 5);
    }

    #[test]
    fn carnivore_bonus_beats_sharp_mouth_bonus() {
        let mut carnivore = fighter(1, 1, 80);
        carnivore.traits.diet = DietKind::Carnivore;
        let omnivore = fighter(2, 1, 80);
        assert!(raw_damage(&carnivore) > raw_damage(&omnivore));
    }

    #[test]
    fn kill_feeds_carnivore_up_to_cap() {
        let mut attacker = fighter(1, 1, 100);
        attacker.traits.diet = DietKind::Carnivore;
        let mut defender = fighter(2, 2, 5);
        defender.x = 1;

        let outcome = resolve(&mut attacker, &mut defender);
        assert!(outcome.defender_killed);
        assert!(!defender.alive);
        assert_eq!(defender.energy(), 0);
        assert!(outcome.energy_gained > 0);
        assert!(outcome.energy_gained <= 50);
        assert!(attacker.energy() <= 100);
    }

    #[test]
    fn attacker_pays_cost_even_without_kill() {
        let mut attacker = fighter(1, 1, 60);
        let mut defender = fighter(2, 2, 100);
        defender.x = 1;

        let before = attacker.energy();
        let outcome = resolve(&mut attacker, &mut defender);
        assert!(!outcome.defender_killed);
        assert_eq!(attacker.energy(), before - ATTACK_COST);
        assert_eq!(defender.energy(), 100 - outcome.damage);
    }
}
