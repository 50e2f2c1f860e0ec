//! Parsing of the line-based commands typed into the binaries.
//!
//! A line is split on whitespace and the first word (lowercased) picks
//! the command. Empty lines parse to `None`.

use peril_game::GameError;
use peril_protocol::{Location, UnitId, UnitRank};

/// Help text printed by `peril-client`.
pub const CLIENT_HELP: &str = "\
Possible commands:
* spawn <location> <rank>
    example: spawn europe infantry
* move <location> <unitID> <unitID> <unitID>...
    example: move asia 1
* status
* spam <n>
    example: spam 5
* help
* quit";

/// Help text printed by `peril-server`.
pub const SERVER_HELP: &str = "\
Possible commands:
* pause
* resume
* help
* quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    Spawn { location: Location, rank: UnitRank },
    Move { to: Location, units: Vec<UnitId> },
    Status,
    Spam(usize),
    Help,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerCommand {
    Pause,
    Resume,
    Help,
    Quit,
}

/// Checks that `username` can stand as one word of a routing key.
///
/// Names end up in keys like `army_moves.<username>` that are matched
/// against `army_moves.*`, so they must be a single non-empty word with
/// no `.`, `*` or `#`.
pub fn validate_username(username: &str) -> Result<(), GameError> {
    if username.is_empty() {
        return Err(GameError::InvalidCommand("a username can't be empty".into()));
    }
    if let Some(bad) = username
        .chars()
        .find(|c| c.is_whitespace() || matches!(c, '.' | '*' | '#'))
    {
        return Err(GameError::InvalidCommand(format!(
            "a username can't contain {bad:?}"
        )));
    }
    Ok(())
}

fn usage(text: &str) -> GameError {
    GameError::InvalidCommand(format!("usage: {text}"))
}

fn split(line: &str) -> Option<(String, Vec<&str>)> {
    let mut words = line.split_whitespace();
    let command = words.next()?.to_lowercase();
    Some((command, words.collect()))
}

/// Parses one line of client input.
///
/// # Errors
/// [`GameError::InvalidCommand`] for unknown commands, missing
/// arguments, and unknown locations, ranks or unit IDs.
pub fn parse_client(line: &str) -> Result<Option<ClientCommand>, GameError> {
    let Some((command, args)) = split(line) else {
        return Ok(None);
    };

    let parsed = match command.as_str() {
        "spawn" => {
            let [location, rank] = args[..] else {
                return Err(usage("spawn <location> <rank>"));
            };
            ClientCommand::Spawn {
                location: parse_location(location)?,
                rank: rank
                    .parse()
                    .map_err(|e| GameError::InvalidCommand(format!("{e}")))?,
            }
        }
        "move" => {
            let Some((to, ids)) = args.split_first().filter(|(_, ids)| !ids.is_empty())
            else {
                return Err(usage("move <location> <unitID>..."));
            };
            let units = ids
                .iter()
                .map(|id| {
                    id.parse::<UnitId>().map_err(|_| {
                        GameError::InvalidCommand(format!("invalid unit id: {id}"))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            ClientCommand::Move {
                to: parse_location(to)?,
                units,
            }
        }
        "spam" => {
            let [n] = args[..] else {
                return Err(usage("spam <n>"));
            };
            let n = n
                .parse()
                .map_err(|_| GameError::InvalidCommand(format!("invalid count: {n}")))?;
            ClientCommand::Spam(n)
        }
        "status" => ClientCommand::Status,
        "help" => ClientCommand::Help,
        "quit" => ClientCommand::Quit,
        other => {
            return Err(GameError::InvalidCommand(format!("unknown command: {other}")));
        }
    };
    Ok(Some(parsed))
}

/// Parses one line of server input.
pub fn parse_server(line: &str) -> Result<Option<ServerCommand>, GameError> {
    let Some((command, _)) = split(line) else {
        return Ok(None);
    };
    match command.as_str() {
        "pause" => Ok(Some(ServerCommand::Pause)),
        "resume" => Ok(Some(ServerCommand::Resume)),
        "help" => Ok(Some(ServerCommand::Help)),
        "quit" => Ok(Some(ServerCommand::Quit)),
        other => Err(GameError::InvalidCommand(format!("unknown command: {other}"))),
    }
}

fn parse_location(word: &str) -> Result<Location, GameError> {
    word.parse()
        .map_err(|e| GameError::InvalidCommand(format!("{e}")))
}
