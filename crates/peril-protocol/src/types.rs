//! Payload types that travel on the wire.
//!
//! Every struct here is serialized into a message body by one of the
//! codecs and decoded on the other side. Field names are fixed by the
//! peers we interoperate with (`Player`, `ToLocation`, `ID`, ...), which
//! is why the serde attributes rename them instead of using Rust's
//! snake_case on the wire.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Location
// ---------------------------------------------------------------------------

/// A region of the map that units can occupy.
///
/// The declaration order is also the order in which contested locations
/// are searched during war resolution, so it must stay stable.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    Americas,
    Europe,
    Africa,
    Asia,
    Antarctica,
    Australia,
}

impl Location {
    /// Every location, in search order.
    pub const ALL: [Location; 6] = [
        Location::Americas,
        Location::Europe,
        Location::Africa,
        Location::Asia,
        Location::Antarctica,
        Location::Australia,
    ];

    /// The lowercase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Americas => "americas",
            Self::Europe => "europe",
            Self::Africa => "africa",
            Self::Asia => "asia",
            Self::Antarctica => "antarctica",
            Self::Australia => "australia",
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Location {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|loc| loc.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                ProtocolError::InvalidMessage(format!("unknown location: {s}"))
            })
    }
}

// ---------------------------------------------------------------------------
// UnitRank
// ---------------------------------------------------------------------------

/// The type of a unit. Ranks dominate each other in a cycle (see the
/// game crate's battle rules), so there is no "strongest" rank.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum UnitRank {
    Infantry,
    Cavalry,
    Artillery,
}

impl UnitRank {
    /// Every rank.
    pub const ALL: [UnitRank; 3] =
        [UnitRank::Infantry, UnitRank::Cavalry, UnitRank::Artillery];

    /// The lowercase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Infantry => "infantry",
            Self::Cavalry => "cavalry",
            Self::Artillery => "artillery",
        }
    }
}

impl fmt::Display for UnitRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnitRank {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|rank| rank.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                ProtocolError::InvalidMessage(format!("unknown unit rank: {s}"))
            })
    }
}

// ---------------------------------------------------------------------------
// Units and player snapshots
// ---------------------------------------------------------------------------

/// Unit ids are assigned by the owning player and are only unique
/// within that player's army.
pub type UnitId = u32;

/// A single unit on the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Unit {
    #[serde(rename = "ID")]
    pub id: UnitId,
    pub rank: UnitRank,
    pub location: Location,
}

/// A point-in-time copy of a player's army.
///
/// Snapshots are embedded in moves and war recognitions so the receiver
/// sees the army as it was when the message was built, not as it is
/// when the message arrives. On the wire this is the `Player` object.
///
/// `BTreeMap` (instead of `HashMap`) keeps the encoded bytes stable:
/// the same snapshot always serializes to the same body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlayerSnapshot {
    pub username: String,
    #[serde(default)]
    pub units: BTreeMap<UnitId, Unit>,
}

impl PlayerSnapshot {
    /// Creates an empty snapshot for `username`.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            units: BTreeMap::new(),
        }
    }

    /// Iterates the units standing at `location`.
    pub fn units_at(&self, location: Location) -> impl Iterator<Item = &Unit> {
        self.units.values().filter(move |u| u.location == location)
    }

    /// Returns `true` if any unit stands at `location`.
    pub fn has_units_at(&self, location: Location) -> bool {
        self.units_at(location).next().is_some()
    }
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Pause/resume broadcast from the server on `peril_direct`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlayingState {
    pub is_paused: bool,
}

/// A player moved some units. Published on `army_moves.<username>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ArmyMove {
    /// The mover's army, taken after the units were relocated.
    pub player: PlayerSnapshot,
    /// The units that moved, already carrying their new location.
    pub units: Vec<Unit>,
    pub to_location: Location,
}

/// A participant noticed hostile units on its territory and declares war.
/// Published on `war.<defender username>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RecognitionOfWar {
    pub attacker: PlayerSnapshot,
    pub defender: PlayerSnapshot,
}

/// One line of game history. Published (binary codec) on
/// `game_logs.<username>` and appended to the server's log file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GameLog {
    pub current_time: DateTime<Utc>,
    pub message: String,
    pub username: String,
}

impl GameLog {
    /// Creates a log entry stamped with the current time.
    pub fn new(username: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            current_time: Utc::now(),
            message: message.into(),
            username: username.into(),
        }
    }
}

impl fmt::Display for GameLog {
    /// The line format used by the server's log file.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}: {}",
            self.current_time.to_rfc3339(),
            self.username,
            self.message
        )
    }
}

// =========================================================================
// Tests
// =========================================================================
