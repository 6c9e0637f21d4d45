use std::collections::HashSet;

use bevy::prelude::*;
use sim_schema::{DisasterKind, FoodKind, WeatherKind};

use crate::agent::AgentId;
use crate::territory::RegionKey;

/// Per-tick event record. Invalid action targets resolve as one of these
/// rather than as errors.
#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    Moved {
        id: AgentId,
        to: (i32, i32),
    },
    MoveBlocked {
        id: AgentId,
        at: (i32, i32),
    },
    Ate {
        id: AgentId,
        food: u64,
        kind: FoodKind,
        delta: i32,
    },
    LethalFood {
        id: AgentId,
        kind: FoodKind,
    },
    Fled {
        id: AgentId,
        to: (i32, i32),
    },
    Attacked {
        attacker: AgentId,
        defender: AgentId,
        damage: i32,
        killed: bool,
        energy_gained: i32,
    },
    AttackMissed {
        id: AgentId,
    },
    Reproduced {
        id: AgentId,
        partner: AgentId,
        offspring: AgentId,
    },
    ReproductionFailed {
        id: AgentId,
        reason: &'static str,
    },
    Signaled {
        id: AgentId,
        receivers: usize,
    },
    Claimed {
        id: AgentId,
        region: RegionKey,
    },
    ClaimRejected {
        id: AgentId,
        region: RegionKey,
    },
    Cooperated {
        id: AgentId,
        ally: AgentId,
        amount: i32,
    },
    CooperationFailed {
        id: AgentId,
    },
    Migrated {
        id: AgentId,
        to: (i32, i32),
    },
    Died {
        id: AgentId,
    },
    Evolved {
        id: AgentId,
        stage: u8,
    },
    WeatherChanged {
        weather: WeatherKind,
    },
    DisasterStruck {
        kind: DisasterKind,
        at: (i32, i32),
        radius: i32,
    },
    PredatorSpawned {
        id: AgentId,
        at: (i32, i32),
    },
    Extinction {
        tick: u64,
    },
}

/// Append-only event log for the current tick; cleared when decision-making
/// opens the next tick.
#[derive(Resource, Debug, Clone, Default)]
pub struct EventLog {
    current: Vec<SimEvent>,
    pub total_recorded: u64,
}

impl EventLog {
    pub fn reset_turn(&mut self) {
        self.current.clear();
    }

    pub fn push(&mut self, event: SimEvent) {
        self.current.push(event);
        self.total_recorded += 1;
    }

    pub fn events(&self) -> &[SimEvent] {
        &self.current
    }
}

/// Deduplicated energy ledger for debugging.
///
/// Equality key is the exact triple (action name, optional food kind, energy
/// delta); repeated identical deltas collapse to one entry.
#[derive(Resource, Debug, Clone, Default)]
pub struct EnergyEventLog {
    entries: HashSet<(&'static str, Option<FoodKind>, i32)>,
}

impl EnergyEventLog {
    pub fn record(&mut self, action: &'static str, object: Option<FoodKind>, delta: i32) {
        self.entries.insert((action, object, delta));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn reset(&mut self) {
        self.entries.clear();
    }

    /// Sorted `"action [object] delta"` lines, signed like `eat apple +30`.
    pub fn formatted(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .entries
            .iter()
            .map(|(action, object, delta)| {
                let sign = if *delta > 0 { "+" } else { "" };
                match object {
                    Some(kind) => format!("{action} {} {sign}{delta}", kind.as_str()),
                    None => format!("{action} {sign}{delta}"),
                }
            })
            .collect();
        lines.sort();
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn energy_events_deduplicate_on_the_triple() {
        let mut log = EnergyEventLog::default();
        log.record("eat", Some(FoodKind::Apple), 30);
        log.record("eat", Some(FoodKind::Apple), 30);
        log.record("eat", Some(FoodKind::Apple), 28);
        log.record("move", None, -1);
        assert_eq!(log.len(), 3);

        let lines = log.formatted();
        assert!(lines.contains(&"eat apple +30".to_string()));
        assert!(lines.contains(&"move -1".to_string()));
    }

    #[test]
    fn event_log_clears_per_turn_but_keeps_totals() {
        let mut log = EventLog::default();
        log.push(SimEvent::Died { id: AgentId(1) });
        assert_eq!(log.events().len(), 1);
        log.reset_turn();
        assert!(log.events().is_empty());
        assert_eq!(log.total_recorded, 1);
    }
}
