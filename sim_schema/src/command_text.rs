//! Text command grammar for the headless session server.

use std::num::ParseIntError;

use thiserror::Error;

use crate::TraitRecord;

#[derive(Debug, Error)]
pub enum CommandParseError {
    #[error("empty command")]
    Empty,
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("invalid integer '{value}' for {context}: {source}")]
    InvalidInteger {
        value: String,
        context: &'static str,
        source: ParseIntError,
    },
    #[error("invalid trait record: {0}")]
    InvalidTraits(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ControlCommand {
    /// Advance the simulation by `steps` ticks.
    Tick { steps: u32 },
    /// Spawn `count` owned agents carrying the given (coerced) trait record.
    Spawn { count: u32, traits: TraitRecord },
    /// Emit the latest snapshot without advancing.
    Status,
    /// Tear the episode down and start fresh.
    Reset,
}

pub fn parse_command_line(input: &str) -> Result<ControlCommand, CommandParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(CommandParseError::Empty);
    }

    let mut parts = trimmed.splitn(3, char::is_whitespace);
    let verb = parts
        .next()
        .map(|v| v.to_ascii_lowercase())
        .ok_or(CommandParseError::Empty)?;

    match verb.as_str() {
        "tick" | "turn" => {
            let steps_str = parts.next().unwrap_or("1");
            let steps = parse_u32(steps_str, "tick steps")?;
            Ok(ControlCommand::Tick { steps })
        }
        "spawn" => {
            let count_str = parts.next().unwrap_or("1");
            let count = parse_u32(count_str, "spawn count")?;
            let traits = match parts.next() {
                Some(json) if !json.trim().is_empty() => {
                    let record: TraitRecord = serde_json::from_str(json)?;
                    record.coerced()
                }
                _ => TraitRecord::default(),
            };
            Ok(ControlCommand::Spawn { count, traits })
        }
        "status" => Ok(ControlCommand::Status),
        "reset" => Ok(ControlCommand::Reset),
        other => Err(CommandParseError::UnknownCommand(other.to_string())),
    }
}

fn parse_u32(value: &str, context: &'static str) -> Result<u32, CommandParseError> {
    value
        .parse::<u32>()
        .map_err(|source| CommandParseError::InvalidInteger {
            value: value.to_string(),
            context,
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DietKind;

    #[test]
    fn tick_defaults_to_one_step() {
        assert_eq!(
            parse_command_line("tick").unwrap(),
            ControlCommand::Tick { steps: 1 }
        );
        assert_eq!(
            parse_command_line("turn 25").unwrap(),
            ControlCommand::Tick { steps: 25 }
        );
    }

    #[test]
    fn spawn_parses_and_coerces_traits() {
        let command =
            parse_command_line(r#"spawn 3 {"color":"MAGENTA","speed":8,"diet":"carnivore"}"#)
                .unwrap();
        match command {
            ControlCommand::Spawn { count, traits } => {
                assert_eq!(count, 3);
                assert_eq!(traits.color, "blue");
                assert_eq!(traits.speed, 5);
                assert_eq!(traits.diet, DietKind::Carnivore);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_or_malformed_commands() {
        assert!(matches!(
            parse_command_line("warp 9"),
            Err(CommandParseError::UnknownCommand(_))
        ));
        assert!(matches!(
            parse_command_line("tick lots"),
            Err(CommandParseError::InvalidInteger { .. })
        ));
        assert!(matches!(
            parse_command_line("  "),
            Err(CommandParseError::Empty)
        ));
    }
}
