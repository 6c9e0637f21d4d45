//! Free-text inference response grammar.
//!
//! Responses are keyword-scanned rather than strictly parsed: the inference
//! collaborator emits short free text ("MOVE UP", "EAT 1001", "12:ATTACK 7")
//! and anything unrecognized is reported as an error so the caller can fall
//! back to a random safe move.

use thiserror::Error;

use crate::{ActionCommand, ActionKind, Direction};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResponseParseError {
    #[error("empty response")]
    Empty,
    #[error("unrecognized response: {0}")]
    Unrecognized(String),
}

/// Parse a single-agent response into an action command.
pub fn parse_response(response: &str) -> Result<ActionCommand, ResponseParseError> {
    let upper = response.trim().to_ascii_uppercase();
    if upper.is_empty() {
        return Err(ResponseParseError::Empty);
    }

    // MOVE before EAT before FLEE mirrors the reference parser. The social
    // verbs scan before EAT, since "EAT" hides inside words like "CREATURE".
    // REPRODUCTION is accepted as a synonym.
    if upper.contains("MOVE") {
        return Ok(ActionCommand {
            kind: ActionKind::Move,
            direction: extract_direction(&upper),
            target: None,
        });
    }
    if upper.contains("ATTACK") {
        return Ok(ActionCommand {
            kind: ActionKind::Attack,
            direction: None,
            target: extract_target(&upper),
        });
    }
    if upper.contains("REPRODUC") {
        return Ok(ActionCommand::new(ActionKind::Reproduce));
    }
    if upper.contains("SIGNAL") {
        return Ok(ActionCommand::new(ActionKind::Signal));
    }
    if upper.contains("CLAIM") {
        return Ok(ActionCommand::new(ActionKind::Claim));
    }
    if upper.contains("COOPERATE") {
        return Ok(ActionCommand {
            kind: ActionKind::Cooperate,
            direction: None,
            target: extract_target(&upper),
        });
    }
    if upper.contains("MIGRATE") {
        return Ok(ActionCommand::new(ActionKind::Migrate));
    }
    if upper.contains("EAT") {
        return Ok(ActionCommand {
            kind: ActionKind::Eat,
            direction: None,
            target: extract_target(&upper),
        });
    }
    if upper.contains("FLEE") {
        return Ok(ActionCommand {
            kind: ActionKind::Flee,
            direction: extract_direction(&upper),
            target: None,
        });
    }

    Err(ResponseParseError::Unrecognized(
        response.trim().to_string(),
    ))
}

/// Parse a batched `id:ACTION` response, one pair per line.
///
/// Malformed lines are skipped; callers treat agents absent from the result
/// as fallback cases, so a partially garbled batch degrades per-agent rather
/// than failing whole.
pub fn parse_batch_response(response: &str) -> Vec<(u64, ActionCommand)> {
    response
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            let (id_part, action_part) = line.split_once(':')?;
            let id: u64 = id_part.trim().parse().ok()?;
            let command = parse_response(action_part).ok()?;
            Some((id, command))
        })
        .collect()
}

fn extract_direction(upper: &str) -> Option<Direction> {
    if upper.contains("UP") {
        Some(Direction::Up)
    } else if upper.contains("DOWN") {
        Some(Direction::Down)
    } else if upper.contains("LEFT") {
        Some(Direction::Left)
    } else if upper.contains("RIGHT") {
        Some(Direction::Right)
    } else {
        None
    }
}

fn extract_target(upper: &str) -> Option<u64> {
    let digits: String = upper
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}
