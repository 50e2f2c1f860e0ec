//! War arbitration rules.
//!
//! These are pure functions over snapshots. Both participants of a war
//! evaluate the same message, so the rules must depend on nothing but
//! the message contents.

use std::cmp::Ordering;

use peril_protocol::{Location, PlayerSnapshot, UnitRank};

/// How `a` fares against `b` in a single duel.
///
/// Rock-paper-scissors: cavalry rides down infantry, infantry overruns
/// artillery, artillery shells cavalry. Equal ranks tie.
///
/// `dominance(a, b)` is always `dominance(b, a).reverse()`.
pub fn dominance(a: UnitRank, b: UnitRank) -> Ordering {
    use UnitRank::*;
    match (a, b) {
        (Cavalry, Infantry) | (Infantry, Artillery) | (Artillery, Cavalry) => {
            Ordering::Greater
        }
        (Infantry, Cavalry) | (Artillery, Infantry) | (Cavalry, Artillery) => {
            Ordering::Less
        }
        _ => Ordering::Equal,
    }
}

/// The first location, in [`Location::ALL`] order, where both sides
/// have units. `None` means there is nothing to fight over.
pub fn contested_location(
    attacker: &PlayerSnapshot,
    defender: &PlayerSnapshot,
) -> Option<Location> {
    Location::ALL
        .into_iter()
        .find(|&loc| attacker.has_units_at(loc) && defender.has_units_at(loc))
}

/// Result of a battle, from the attacker's side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Battle {
    AttackerWins,
    DefenderWins,
    Draw,
}

/// Every attacking unit duels every defending unit; each won duel is a
/// point for its side. The side with more points wins.
pub fn fight(attackers: &[UnitRank], defenders: &[UnitRank]) -> Battle {
    let balance: i64 = attackers
        .iter()
        .flat_map(|&a| defenders.iter().map(move |&d| dominance(a, d)))
        .map(|ord| match ord {
            Ordering::Greater => 1,
            Ordering::Less => -1,
            Ordering::Equal => 0,
        })
        .sum();

    match balance.cmp(&0) {
        Ordering::Greater => Battle::AttackerWins,
        Ordering::Less => Battle::DefenderWins,
        Ordering::Equal => Battle::Draw,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use peril_protocol::Unit;

    fn snapshot(name: &str, units: &[(u32, UnitRank, Location)]) -> PlayerSnapshot {
        let mut snap = PlayerSnapshot::new(name);
        for &(id, rank, location) in units {
            snap.units.insert(id, Unit { id, rank, location });
        }
        snap
    }

    #[test]
    fn test_dominance_is_antisymmetric() {
        for a in UnitRank::ALL {
            for b in UnitRank::ALL {
                assert_eq!(dominance(a, b), dominance(b, a).reverse(), "{a} vs {b}");
            }
        }
    }

    #[test]
    fn test_dominance_self_is_equal() {
        for rank in UnitRank::ALL {
            assert_eq!(dominance(rank, rank), Ordering::Equal);
        }
    }

    #[test]
    fn test_dominance_cycle() {
        assert_eq!(dominance(UnitRank::Cavalry, UnitRank::Infantry), Ordering::Greater);
        assert_eq!(dominance(UnitRank::Infantry, UnitRank::Artillery), Ordering::Greater);
        assert_eq!(dominance(UnitRank::Artillery, UnitRank::Cavalry), Ordering::Greater);
    }

    #[test]
    fn test_fight_counts_every_pair() {
        use UnitRank::*;
        // 2 infantry vs 1 cavalry: two lost duels for the attacker.
        assert_eq!(fight(&[Infantry, Infantry], &[Cavalry]), Battle::DefenderWins);
        // 2 cavalry vs 1 infantry: two won duels.
        assert_eq!(fight(&[Cavalry, Cavalry], &[Infantry]), Battle::AttackerWins);
        // cavalry beats infantry, loses to artillery.
        assert_eq!(fight(&[Cavalry], &[Infantry, Artillery]), Battle::Draw);
        assert_eq!(fight(&[Infantry], &[Infantry]), Battle::Draw);
    }

    #[test]
    fn test_fight_swapping_sides_inverts_result() {
        use UnitRank::*;
        let a = [Cavalry, Artillery, Artillery];
        let d = [Infantry, Cavalry];
        assert_eq!(fight(&a, &d), Battle::AttackerWins);
        assert_eq!(fight(&d, &a), Battle::DefenderWins);
    }

    #[test]
    fn test_contested_location_uses_fixed_order() {
        let attacker = snapshot(
            "alice",
            &[(1, UnitRank::Infantry, Location::Asia), (2, UnitRank::Infantry, Location::Europe)],
        );
        let defender = snapshot(
            "bob",
            &[(1, UnitRank::Cavalry, Location::Asia), (2, UnitRank::Cavalry, Location::Europe)],
        );
        // Europe precedes Asia in the location order.
        assert_eq!(contested_location(&attacker, &defender), Some(Location::Europe));
    }

    #[test]
    fn test_contested_location_none_without_overlap() {
        let attacker = snapshot("alice", &[(1, UnitRank::Infantry, Location::Asia)]);
        let defender = snapshot("bob", &[(1, UnitRank::Cavalry, Location::Africa)]);
        assert_eq!(contested_location(&attacker, &defender), None);
    }
}
