use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::record::{Entry, MonitorRecord};

// Grammar tiers for one command occurrence, most specific first. Compiled
// once at startup and never mutated.
static CMD_KEY_ARGS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<command>\w+)\s+(?P<key>\S+)\s+(?P<args>.+)$").unwrap());
static CMD_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<command>\w+)\s+(?P<key>\S+)$").unwrap());
static CMD_ONLY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?P<command>\w+)$").unwrap());

#[derive(Debug, Error)]
#[error("no command grammar matched {text:?}")]
pub struct ParseFailure {
    pub text: String,
}

/// Capture groups of whichever grammar tier matched.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCommand {
    pub command: String,
    pub key: Option<String>,
    pub args: Option<String>,
}

impl ParsedCommand {
    pub fn into_entry(self, timestamp: f64) -> Entry {
        Entry {
            timestamp,
            command: self.command,
            key: self.key,
            args: self.args,
        }
    }
}

/// Match command text against the grammar tiers in priority order: full
/// `command key args`, then `command key`, then a bare command.
pub fn parse_command_text(text: &str) -> Result<ParsedCommand, ParseFailure> {
    if let Some(caps) = CMD_KEY_ARGS.captures(text) {
        return Ok(ParsedCommand {
            command: caps["command"].to_string(),
            key: Some(caps["key"].to_string()),
            args: Some(caps["args"].to_string()),
        });
    }
    if let Some(caps) = CMD_KEY.captures(text) {
        return Ok(ParsedCommand {
            command: caps["command"].to_string(),
            key: Some(caps["key"].to_string()),
            args: None,
        });
    }
    if let Some(caps) = CMD_ONLY.captures(text) {
        return Ok(ParsedCommand {
            command: caps["command"].to_string(),
            key: None,
            args: None,
        });
    }
    Err(ParseFailure {
        text: text.to_string(),
    })
}

/// Record mode: the structured unit already carries its own timestamp; the
/// embedded command text goes through the same grammar fallback.
pub fn parse_record(record: &MonitorRecord) -> Result<Entry, ParseFailure> {
    let parsed = parse_command_text(&record.command_text)?;
    Ok(parsed.into_entry(record.timestamp))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_grammar_wins_over_shorter_tiers() {
        let parsed = parse_command_text("SET mykey value1 value2").unwrap();
        assert_eq!(parsed.command, "SET");
        assert_eq!(parsed.key.as_deref(), Some("mykey"));
        assert_eq!(parsed.args.as_deref(), Some("value1 value2"));
    }

    #[test]
    fn command_key_grammar() {
        let parsed = parse_command_text("GET foo").unwrap();
        assert_eq!(parsed.command, "GET");
        assert_eq!(parsed.key.as_deref(), Some("foo"));
        assert_eq!(parsed.args, None);
    }

    #[test]
    fn bare_command_grammar() {
        let parsed = parse_command_text("PING").unwrap();
        assert_eq!(parsed.command, "PING");
        assert_eq!(parsed.key, None);
        assert_eq!(parsed.args, None);
    }

    #[test]
    fn whitespace_only_line_fails() {
        assert!(parse_command_text("").is_err());
        assert!(parse_command_text("   ").is_err());
    }

    #[test]
    fn non_word_command_fails() {
        assert!(parse_command_text("### garbage").is_err());
    }

    #[test]
    fn record_mode_carries_timestamp() {
        let record = MonitorRecord {
            timestamp: 1683239297.423577,
            command_text: "SCAN 0 COUNT 1000".to_string(),
        };
        let entry = parse_record(&record).unwrap();
        assert_eq!(entry.timestamp, 1683239297.423577);
        assert_eq!(entry.command, "SCAN");
        assert_eq!(entry.key.as_deref(), Some("0"));
        assert_eq!(entry.args.as_deref(), Some("COUNT 1000"));
    }
}
