//! Command grammar for the socket text protocol
//!
//! Messages look like `name,arg1,arg2,arg3` with at most three positional
//! arguments. If the first argument begins with `[`, a stack-based scan
//! isolates the matching closing bracket (nested brackets supported) and the
//! bracketed text becomes one numeric-list argument; anything after the
//! closing bracket (and its separating comma) is parsed as further
//! comma-separated arguments.

use crate::error::{BridgeError, Result};

/// Maximum positional arguments per command
pub const MAX_ARGS: usize = 3;

/// One parsed command argument
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    /// Decimal or `0x`-prefixed hex number
    Number(i64),
    /// Bracketed, comma-separated numeric list
    List(Vec<i64>),
    /// Anything else, verbatim
    Text(String),
}

impl Argument {
    /// Numeric value, if this argument is a number
    pub fn as_number(&self) -> Option<i64> {
        match self {
            Argument::Number(value) => Some(*value),
            _ => None,
        }
    }

    /// List contents, if this argument is a bracketed list
    pub fn as_list(&self) -> Option<&[i64]> {
        match self {
            Argument::List(values) => Some(values),
            _ => None,
        }
    }

    /// Text contents, if this argument is plain text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Argument::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// A decoded command: name plus positional arguments
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub name: String,
    pub args: Vec<Argument>,
}

impl Command {
    /// Parse one framed message (terminator already stripped) into a command.
    pub fn parse(message: &str) -> Result<Command> {
        let message = message.trim_end();
        if message.is_empty() {
            return Err(BridgeError::Protocol("empty message".into()));
        }

        let (name, rest) = match message.find(',') {
            Some(idx) => (&message[..idx], Some(&message[idx + 1..])),
            None => (message, None),
        };

        let mut args = Vec::new();
        if let Some(rest) = rest {
            if rest.starts_with('[') {
                let (inner, tail) = split_bracketed(rest)?;
                args.push(Argument::List(parse_number_list(inner)?));
                if let Some(tail) = tail {
                    for part in tail.split(',') {
                        args.push(parse_plain(part));
                    }
                }
            } else {
                for part in rest.split(',') {
                    args.push(parse_plain(part));
                }
            }
        }

        if args.len() > MAX_ARGS {
            return Err(BridgeError::Protocol(format!(
                "too many arguments: {} (max {})",
                args.len(),
                MAX_ARGS
            )));
        }

        Ok(Command {
            name: name.trim().to_string(),
            args,
        })
    }
}

/// Split a leading bracketed token from the remaining argument text.
///
/// Returns the text between the outermost brackets and, if anything follows
/// the closing bracket, the remainder with its separating comma removed.
fn split_bracketed(text: &str) -> Result<(&str, Option<&str>)> {
    let mut depth = 0usize;
    for (idx, ch) in text.char_indices() {
        match ch {
            '[' => depth += 1,
            ']' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| BridgeError::Protocol("unbalanced brackets".into()))?;
                if depth == 0 {
                    let inner = &text[1..idx];
                    let tail = &text[idx + 1..];
                    let tail = match tail.strip_prefix(',') {
                        Some(stripped) => Some(stripped),
                        None if tail.trim().is_empty() => None,
                        None => {
                            return Err(BridgeError::Protocol(format!(
                                "unexpected text after bracket: {tail}"
                            )));
                        }
                    };
                    return Ok((inner, tail));
                }
            }
            _ => {}
        }
    }
    Err(BridgeError::Protocol("unbalanced brackets".into()))
}

/// Parse the inside of a bracketed list as numbers, flattening any nesting.
fn parse_number_list(inner: &str) -> Result<Vec<i64>> {
    let mut values = Vec::new();
    for token in inner.split(',') {
        let token = token.trim_matches(|ch: char| ch == '[' || ch == ']' || ch.is_whitespace());
        if token.is_empty() {
            continue;
        }
        values.push(parse_number(token)?);
    }
    Ok(values)
}

/// Parse a decimal or `0x`-prefixed hex number.
fn parse_number(token: &str) -> Result<i64> {
    let token = token.trim();
    let parsed = match token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        Some(hex) => i64::from_str_radix(hex, 16),
        None => token.parse::<i64>(),
    };
    parsed.map_err(|_| BridgeError::Protocol(format!("invalid number: {token}")))
}

/// Plain (non-list) arguments are numbers when they look like numbers,
/// otherwise verbatim text.
fn parse_plain(part: &str) -> Argument {
    let trimmed = part.trim();
    match parse_number(trimmed) {
        Ok(value) => Argument::Number(value),
        Err(_) => Argument::Text(trimmed.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_name() {
        let cmd = Command::parse("bridge.controlStatus").unwrap();
        assert_eq!(cmd.name, "bridge.controlStatus");
        assert!(cmd.args.is_empty());
    }

    #[test]
    fn test_plain_args() {
        let cmd = Command::parse("bridge.holdButton,up,30").unwrap();
        assert_eq!(cmd.name, "bridge.holdButton");
        assert_eq!(cmd.args[0], Argument::Text("up".into()));
        assert_eq!(cmd.args[1], Argument::Number(30));
    }

    #[test]
    fn test_hex_numbers() {
        let cmd = Command::parse("bridge.read8,0x2037078").unwrap();
        assert_eq!(cmd.args[0], Argument::Number(0x2037078));
    }

    #[test]
    fn test_list_argument() {
        let cmd = Command::parse("bridge.controlInit,[0x1,0x2,0x3,0x4,0x5]").unwrap();
        assert_eq!(cmd.args.len(), 1);
        assert_eq!(cmd.args[0].as_list().unwrap(), &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_list_then_plain_args() {
        let cmd = Command::parse("bridge.readRanges,[0x10,4],hex").unwrap();
        assert_eq!(cmd.args[0].as_list().unwrap(), &[0x10, 4]);
        assert_eq!(cmd.args[1], Argument::Text("hex".into()));
    }

    #[test]
    fn test_nested_brackets_flatten() {
        let cmd = Command::parse("cmd,[1,[2,3],4]").unwrap();
        assert_eq!(cmd.args[0].as_list().unwrap(), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_unbalanced_brackets() {
        assert!(Command::parse("cmd,[1,2").is_err());
        assert!(Command::parse("cmd,[1,[2]").is_err());
    }

    #[test]
    fn test_bad_number_in_list() {
        assert!(Command::parse("cmd,[1,zz]").is_err());
    }

    #[test]
    fn test_too_many_args() {
        assert!(Command::parse("cmd,1,2,3,4").is_err());
    }

    #[test]
    fn test_empty_message() {
        assert!(Command::parse("").is_err());
        assert!(Command::parse("   ").is_err());
    }

    #[test]
    fn test_trailing_whitespace_trimmed() {
        let cmd = Command::parse("bridge.control,down\n").unwrap();
        assert_eq!(cmd.args[0], Argument::Text("down".into()));
    }
}
