//! Per-participant game state and its transitions.
//!
//! `GameState` is plain data with synchronous methods. It never touches
//! the broker: inbound messages come in as typed values, and anything
//! that should be published goes back out as a return value. The
//! coordinator actor owns one of these and serializes access to it.
//!
//! Delivery is at-least-once, so the same move or war can arrive twice
//! and moves and wars can arrive in either order. Two rules keep the
//! state convergent anyway:
//!
//! - moves merge units by ID (a union), so a duplicate move is a no-op;
//! - units that fall in a war are tombstoned per player, so a late or
//!   duplicate move can't bring them back.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use peril_protocol::{
    ArmyMove, Location, PlayerSnapshot, PlayingState, RecognitionOfWar, Unit,
    UnitId, UnitRank,
};

use crate::battle::{self, Battle};
use crate::GameError;

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// What an inbound army move means for the local player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Our own move, echoed back by the topic exchange.
    SamePlayer,
    /// Nothing of ours at the destination (or nothing left of the mover).
    Safe,
    /// The mover landed on our units; war must be declared.
    MakeWar,
}

impl fmt::Display for MoveOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SamePlayer => write!(f, "same-player"),
            Self::Safe => write!(f, "safe"),
            Self::MakeWar => write!(f, "make-war"),
        }
    }
}

/// The result of a war, from the local player's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarOutcome {
    /// Neither side is us. Someone else has to handle it.
    NotInvolved,
    /// The two armies don't meet anywhere; there is nothing to fight.
    NoUnits,
    OpponentWon,
    YouWon,
    Draw,
}

impl fmt::Display for WarOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotInvolved => write!(f, "not-involved"),
            Self::NoUnits => write!(f, "no-units"),
            Self::OpponentWon => write!(f, "opponent-won"),
            Self::YouWon => write!(f, "you-won"),
            Self::Draw => write!(f, "draw"),
        }
    }
}

/// A resolved war.
///
/// For a draw, `winner` is the attacker and `loser` the defender. For
/// `NotInvolved` and `NoUnits` both names are empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarResolution {
    pub outcome: WarOutcome,
    pub winner: String,
    pub loser: String,
    pub location: Option<Location>,
}

impl WarResolution {
    fn unresolved(outcome: WarOutcome) -> Self {
        Self {
            outcome,
            winner: String::new(),
            loser: String::new(),
            location: None,
        }
    }

    /// The game log line for this war, if there was a fight.
    pub fn log_message(&self) -> Option<String> {
        match self.outcome {
            WarOutcome::YouWon | WarOutcome::OpponentWon => {
                Some(format!("{} won a against {}", self.winner, self.loser))
            }
            WarOutcome::Draw => Some(format!(
                "A war between {} and {} resulted in a draw",
                self.winner, self.loser
            )),
            WarOutcome::NotInvolved | WarOutcome::NoUnits => None,
        }
    }
}

// ---------------------------------------------------------------------------
// StatusReport
// ---------------------------------------------------------------------------

/// What the `status` command shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub username: String,
    pub paused: bool,
    /// The local player's units, ordered by ID.
    pub units: Vec<Unit>,
}

impl StatusReport {
    /// Number of units of `rank` standing at `location`.
    pub fn count_at(&self, location: Location, rank: UnitRank) -> usize {
        self.units
            .iter()
            .filter(|u| u.location == location && u.rank == rank)
            .count()
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "You are {}, and you have {} units.",
            self.username,
            self.units.len()
        )?;
        if self.paused {
            writeln!(f, "The game is paused.")?;
        }
        for unit in &self.units {
            writeln!(f, "* {}: {}, {}", unit.id, unit.location, unit.rank)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// GameState
// ---------------------------------------------------------------------------

/// One participant's view of the game.
#[derive(Debug, Clone)]
pub struct GameState {
    /// The local player's army.
    player: PlayerSnapshot,
    paused: bool,
    next_unit_id: UnitId,
    /// Other players' armies, as far as their moves have told us.
    others: BTreeMap<String, PlayerSnapshot>,
    /// Units (per player) that fell in a war.
    fallen: BTreeMap<String, BTreeSet<UnitId>>,
}

impl GameState {
    /// Fresh state for `username`: no units, not paused.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            player: PlayerSnapshot::new(username),
            paused: false,
            next_unit_id: 1,
            others: BTreeMap::new(),
            fallen: BTreeMap::new(),
        }
    }

    pub fn username(&self) -> &str {
        &self.player.username
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// A copy of the local player's army.
    pub fn snapshot(&self) -> PlayerSnapshot {
        self.player.clone()
    }

    /// What we know about another player's army.
    pub fn known_army(&self, username: &str) -> Option<&PlayerSnapshot> {
        self.others.get(username)
    }

    /// Every unit we know of at `location`, ours and others'.
    pub fn units_at(&self, location: Location) -> usize {
        std::iter::once(&self.player)
            .chain(self.others.values())
            .map(|army| army.units_at(location).count())
            .sum()
    }

    pub fn status(&self) -> StatusReport {
        StatusReport {
            username: self.player.username.clone(),
            paused: self.paused,
            units: self.player.units.values().copied().collect(),
        }
    }

    // -- Local commands -----------------------------------------------------

    /// Adds a new unit to the local army.
    pub fn spawn(&mut self, location: Location, rank: UnitRank) -> Unit {
        let unit = Unit {
            id: self.next_unit_id,
            rank,
            location,
        };
        self.next_unit_id += 1;
        self.player.units.insert(unit.id, unit);
        tracing::debug!(username = %self.player.username, id = unit.id, %location, %rank, "unit spawned");
        unit
    }

    /// Moves local units to `to`, returning the move to announce.
    ///
    /// Checks everything before changing anything, so a failed move
    /// leaves the army untouched.
    pub fn move_units(
        &mut self,
        to: Location,
        ids: &[UnitId],
    ) -> Result<ArmyMove, GameError> {
        if self.paused {
            return Err(GameError::Paused);
        }
        if ids.is_empty() {
            return Err(GameError::InvalidCommand(
                "a move needs at least one unit".into(),
            ));
        }
        if let Some(&missing) = ids.iter().find(|id| !self.player.units.contains_key(*id)) {
            return Err(GameError::UnknownUnit(missing));
        }

        let ids: BTreeSet<UnitId> = ids.iter().copied().collect();
        let mut moved = Vec::with_capacity(ids.len());
        for id in &ids {
            if let Some(unit) = self.player.units.get_mut(id) {
                unit.location = to;
                moved.push(*unit);
            }
        }

        tracing::debug!(username = %self.player.username, units = moved.len(), location = %to, "units moved");
        Ok(ArmyMove {
            player: self.snapshot(),
            units: moved,
            to_location: to,
        })
    }

    // -- Inbound messages ---------------------------------------------------

    pub fn handle_pause(&mut self, state: PlayingState) {
        self.paused = state.is_paused;
        tracing::info!(username = %self.player.username, paused = self.paused, "pause state changed");
    }

    /// Applies another player's move and decides whether it means war.
    pub fn handle_move(&mut self, army_move: &ArmyMove) -> MoveOutcome {
        let mover = &army_move.player.username;
        if *mover == self.player.username {
            return MoveOutcome::SamePlayer;
        }

        let fallen = self.fallen.get(mover);
        let survivors: Vec<Unit> = army_move
            .units
            .iter()
            .filter(|u| !fallen.is_some_and(|f| f.contains(&u.id)))
            .map(|u| Unit {
                location: army_move.to_location,
                ..*u
            })
            .collect();

        let army = self
            .others
            .entry(mover.clone())
            .or_insert_with(|| PlayerSnapshot::new(mover.clone()));
        for unit in &survivors {
            army.units.insert(unit.id, *unit);
        }

        if survivors.is_empty() || !self.player.has_units_at(army_move.to_location) {
            return MoveOutcome::Safe;
        }
        MoveOutcome::MakeWar
    }

    /// The war declaration for a move that came out as
    /// [`MoveOutcome::MakeWar`]: the mover attacks, we defend.
    pub fn recognize_war(&self, army_move: &ArmyMove) -> RecognitionOfWar {
        RecognitionOfWar {
            attacker: self.living(&army_move.player),
            defender: self.snapshot(),
        }
    }

    /// Resolves a war we are part of.
    ///
    /// The fight is decided from the two snapshots in the message, minus
    /// the units we already know to be fallen. A player whose own client
    /// never saw the war that killed them keeps announcing those units;
    /// they take no part in later fights.
    ///
    /// The losing side's units at the contested location (both sides on
    /// a draw) are removed and tombstoned. A duplicate of a war already
    /// handled finds only fallen units and comes out as
    /// [`WarOutcome::NoUnits`], leaving the state untouched.
    pub fn handle_war(&mut self, war: &RecognitionOfWar) -> WarResolution {
        let we_attack = war.attacker.username == self.player.username;
        if !we_attack && war.defender.username != self.player.username {
            return WarResolution::unresolved(WarOutcome::NotInvolved);
        }

        let attacker = self.living(&war.attacker);
        let defender = self.living(&war.defender);
        let Some(location) = battle::contested_location(&attacker, &defender) else {
            return WarResolution::unresolved(WarOutcome::NoUnits);
        };

        let ranks = |snap: &PlayerSnapshot| -> Vec<UnitRank> {
            snap.units_at(location).map(|u| u.rank).collect()
        };
        let battle = battle::fight(&ranks(&attacker), &ranks(&defender));

        let (winner, loser) = match battle {
            Battle::AttackerWins | Battle::Draw => (&attacker, &defender),
            Battle::DefenderWins => (&defender, &attacker),
        };

        if battle == Battle::Draw {
            self.bury(&attacker, location);
            self.bury(&defender, location);
        } else {
            self.bury(loser, location);
        }

        let outcome = match (battle, we_attack) {
            (Battle::Draw, _) => WarOutcome::Draw,
            (Battle::AttackerWins, true) | (Battle::DefenderWins, false) => WarOutcome::YouWon,
            (Battle::AttackerWins, false) | (Battle::DefenderWins, true) => {
                WarOutcome::OpponentWon
            }
        };

        tracing::info!(
            username = %self.player.username,
            attacker = %war.attacker.username,
            defender = %war.defender.username,
            %location,
            %outcome,
            "war resolved"
        );

        WarResolution {
            outcome,
            winner: winner.username.clone(),
            loser: loser.username.clone(),
            location: Some(location),
        }
    }

    /// `snap` without the units we have seen fall.
    fn living(&self, snap: &PlayerSnapshot) -> PlayerSnapshot {
        let mut snap = snap.clone();
        if let Some(fallen) = self.fallen.get(&snap.username) {
            snap.units.retain(|id, _| !fallen.contains(id));
        }
        snap
    }

    /// Removes `side`'s units at `location` and remembers them as fallen.
    fn bury(&mut self, side: &PlayerSnapshot, location: Location) {
        let ids: Vec<UnitId> = side.units_at(location).map(|u| u.id).collect();
        let army = if side.username == self.player.username {
            Some(&mut self.player)
        } else {
            self.others.get_mut(&side.username)
        };
        if let Some(army) = army {
            for id in &ids {
                army.units.remove(id);
            }
        }
        self.fallen
            .entry(side.username.clone())
            .or_default()
            .extend(ids);
    }
}
