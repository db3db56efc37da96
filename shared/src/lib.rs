//! Wire protocol shared by the race server and its clients.
//!
//! Every message is a single line of text. The server writes
//! [`ServerMessage`] lines to each connection, clients answer with a display
//! name followed by [`ClientMessage`] lines.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Port the server listens on unless told otherwise
pub const DEFAULT_PORT: u16 = 1818;
/// Participants required before the lobby reports `can_start`
pub const MIN_PLAYERS: usize = 2;
/// Progress gained per accepted click
pub const CLICK_STEP: u8 = 10;
/// Number of `countdown:<n>` lines broadcast before `go`
pub const COUNTDOWN_STEPS: u8 = 3;
/// Delay between two countdown steps
pub const COUNTDOWN_INTERVAL: std::time::Duration = std::time::Duration::from_secs(1);
/// Progress at which a participant wins
pub const MAX_PROGRESS: u8 = 100;

const PLAYERS_PREFIX: &str = "players:";
const COUNTDOWN_PREFIX: &str = "countdown:";
const WIN_PREFIX: &str = "win:";
const CLICKS_SENT_PREFIX: &str = "clicks_sent:";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("invalid number {value:?} in {line:?}")]
    InvalidNumber { line: String, value: String },
    #[error("unrecognised message {0:?}")]
    UnknownMessage(String),
}

fn parse_number<T: FromStr>(line: &str, value: &str) -> Result<T, ProtocolError> {
    value.parse().map_err(|_| ProtocolError::InvalidNumber {
        line: line.to_string(),
        value: value.to_string(),
    })
}

/// Lines sent from the server to a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Bare id, sent to a fresh connection before the name exchange
    Assigned { id: u32 },
    /// Full roster as `(id, name)` pairs
    Players(Vec<(u32, String)>),
    CanStart,
    WaitPlayers,
    Countdown(u8),
    Go,
    Progress { id: u32, progress: u8 },
    Win { name: String },
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerMessage::Assigned { id } => write!(f, "{}", id),
            ServerMessage::Players(roster) => {
                f.write_str(PLAYERS_PREFIX)?;
                for (id, name) in roster {
                    write!(f, "{}-{},", id, name)?;
                }
                Ok(())
            }
            ServerMessage::CanStart => f.write_str("can_start"),
            ServerMessage::WaitPlayers => f.write_str("wait_players"),
            ServerMessage::Countdown(n) => write!(f, "{}{}", COUNTDOWN_PREFIX, n),
            ServerMessage::Go => f.write_str("go"),
            ServerMessage::Progress { id, progress } => write!(f, "{}:{}", id, progress),
            ServerMessage::Win { name } => write!(f, "{}{}", WIN_PREFIX, name),
        }
    }
}

impl FromStr for ServerMessage {
    type Err = ProtocolError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        if let Some(roster) = line.strip_prefix(PLAYERS_PREFIX) {
            let mut entries = Vec::new();
            for entry in roster.split(',').filter(|e| !e.is_empty()) {
                let (id, name) = entry
                    .split_once('-')
                    .ok_or_else(|| ProtocolError::UnknownMessage(line.to_string()))?;
                entries.push((parse_number(line, id)?, name.to_string()));
            }
            return Ok(ServerMessage::Players(entries));
        }
        if let Some(step) = line.strip_prefix(COUNTDOWN_PREFIX) {
            return Ok(ServerMessage::Countdown(parse_number(line, step)?));
        }
        if let Some(name) = line.strip_prefix(WIN_PREFIX) {
            return Ok(ServerMessage::Win {
                name: name.to_string(),
            });
        }

        match line {
            "can_start" => Ok(ServerMessage::CanStart),
            "wait_players" => Ok(ServerMessage::WaitPlayers),
            "go" => Ok(ServerMessage::Go),
            _ => match line.split_once(':') {
                Some((id, progress)) => Ok(ServerMessage::Progress {
                    id: parse_number(line, id)?,
                    progress: parse_number(line, progress)?,
                }),
                None if !line.is_empty() && line.bytes().all(|b| b.is_ascii_digit()) => {
                    Ok(ServerMessage::Assigned {
                        id: parse_number(line, line)?,
                    })
                }
                None => Err(ProtocolError::UnknownMessage(line.to_string())),
            },
        }
    }
}

/// Lines sent from a client after its display name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    Ready,
    Click,
    /// Diagnostic click counter reported by the client
    ClicksSent(u32),
    /// Anything else; the server ignores it
    Unknown,
}

impl ClientMessage {
    /// Decodes one received line.
    ///
    /// `ready` and `click` match case-insensitively. A `clicks_sent:` line
    /// whose suffix is not a non-negative integer is a protocol violation.
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        if line.eq_ignore_ascii_case("ready") {
            Ok(ClientMessage::Ready)
        } else if line.eq_ignore_ascii_case("click") {
            Ok(ClientMessage::Click)
        } else if let Some(count) = line.strip_prefix(CLICKS_SENT_PREFIX) {
            Ok(ClientMessage::ClicksSent(parse_number(line, count)?))
        } else {
            Ok(ClientMessage::Unknown)
        }
    }
}

impl fmt::Display for ClientMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientMessage::Ready => f.write_str("ready"),
            ClientMessage::Click => f.write_str("click"),
            ClientMessage::ClicksSent(n) => write!(f, "{}{}", CLICKS_SENT_PREFIX, n),
            ClientMessage::Unknown => Ok(()),
        }
    }
}

/// Default display name for a participant that never supplied one
pub fn default_name(id: u32) -> String {
    format!("Player {}", id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roster_has_trailing_comma() {
        let msg = ServerMessage::Players(vec![(1, "A".to_string()), (2, "B".to_string())]);
        assert_eq!(msg.to_string(), "players:1-A,2-B,");
    }

    #[test]
    fn test_empty_roster() {
        assert_eq!(ServerMessage::Players(vec![]).to_string(), "players:");
        assert_eq!(
            "players:".parse::<ServerMessage>().unwrap(),
            ServerMessage::Players(vec![])
        );
    }

    #[test]
    fn test_roster_name_with_dash() {
        let parsed: ServerMessage = "players:3-Silver-Blaze,".parse().unwrap();
        assert_eq!(
            parsed,
            ServerMessage::Players(vec![(3, "Silver-Blaze".to_string())])
        );
    }

    #[test]
    fn test_server_line_encoding() {
        assert_eq!(ServerMessage::Assigned { id: 7 }.to_string(), "7");
        assert_eq!(ServerMessage::CanStart.to_string(), "can_start");
        assert_eq!(ServerMessage::WaitPlayers.to_string(), "wait_players");
        assert_eq!(ServerMessage::Countdown(2).to_string(), "countdown:2");
        assert_eq!(ServerMessage::Go.to_string(), "go");
        assert_eq!(
            ServerMessage::Progress { id: 4, progress: 30 }.to_string(),
            "4:30"
        );
        assert_eq!(
            ServerMessage::Win {
                name: "Seabiscuit".to_string()
            }
            .to_string(),
            "win:Seabiscuit"
        );
    }

    #[test]
    fn test_server_line_decoding() {
        assert_eq!(
            "12".parse::<ServerMessage>().unwrap(),
            ServerMessage::Assigned { id: 12 }
        );
        assert_eq!(
            "2:100".parse::<ServerMessage>().unwrap(),
            ServerMessage::Progress {
                id: 2,
                progress: 100
            }
        );
        assert_eq!(
            "win:a:b".parse::<ServerMessage>().unwrap(),
            ServerMessage::Win {
                name: "a:b".to_string()
            }
        );
        assert_eq!(
            "countdown:1".parse::<ServerMessage>().unwrap(),
            ServerMessage::Countdown(1)
        );
    }

    #[test]
    fn test_server_line_rejects_garbage() {
        assert!(matches!(
            "hello".parse::<ServerMessage>(),
            Err(ProtocolError::UnknownMessage(_))
        ));
        assert!(matches!(
            "x:10".parse::<ServerMessage>(),
            Err(ProtocolError::InvalidNumber { .. })
        ));
        assert!("".parse::<ServerMessage>().is_err());
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        assert_eq!(ClientMessage::parse("READY").unwrap(), ClientMessage::Ready);
        assert_eq!(ClientMessage::parse("Ready").unwrap(), ClientMessage::Ready);
        assert_eq!(ClientMessage::parse("cLiCk").unwrap(), ClientMessage::Click);
    }

    #[test]
    fn test_keywords_match_exactly() {
        assert_eq!(ClientMessage::parse("ready!").unwrap(), ClientMessage::Unknown);
        assert_eq!(ClientMessage::parse(" click").unwrap(), ClientMessage::Unknown);
        assert_eq!(ClientMessage::parse("").unwrap(), ClientMessage::Unknown);
    }

    #[test]
    fn test_clicks_sent() {
        assert_eq!(
            ClientMessage::parse("clicks_sent:15").unwrap(),
            ClientMessage::ClicksSent(15)
        );
        assert_eq!(ClientMessage::ClicksSent(15).to_string(), "clicks_sent:15");
    }

    #[test]
    fn test_clicks_sent_malformed() {
        let err = ClientMessage::parse("clicks_sent:many").unwrap_err();
        assert_eq!(
            err,
            ProtocolError::InvalidNumber {
                line: "clicks_sent:many".to_string(),
                value: "many".to_string(),
            }
        );
        assert!(ClientMessage::parse("clicks_sent:").is_err());
    }

    #[test]
    fn test_clicks_sent_rejects_negative_count() {
        let err = ClientMessage::parse("clicks_sent:-3").unwrap_err();
        assert_eq!(
            err,
            ProtocolError::InvalidNumber {
                line: "clicks_sent:-3".to_string(),
                value: "-3".to_string(),
            }
        );
    }

    #[test]
    fn test_default_name() {
        assert_eq!(default_name(3), "Player 3");
    }
}
