//! Latest-wins resolution of duplicate stat records.
//!
//! Older clients created stat records under generated keys, so a match can
//! hold several records for the same player. Resolution picks one per player:
//! 1. A record stored under the canonical `matchId_playerId` key
//! 2. Otherwise the latest `recordedAt`; a missing timestamp is the oldest
//! 3. Equal timestamps fall to the [`TieBreak`] policy

use std::collections::BTreeMap;

use crate::models::{PlayerId, StatEntry};

/// How to settle two non-canonical records with the same timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TieBreak {
    /// The record seen last in store order wins. Store order is not
    /// guaranteed stable, so neither is the result.
    #[default]
    LastSeen,
    /// The record with the lexicographically smallest key wins.
    LowestId,
}

fn supersedes(candidate: &StatEntry, current: &StatEntry, tie_break: TieBreak) -> bool {
    match (candidate.is_canonical(), current.is_canonical()) {
        (true, false) => return true,
        (false, true) => return false,
        _ => {}
    }

    let (new_at, cur_at) = (candidate.recorded_instant(), current.recorded_instant());
    if new_at != cur_at {
        return new_at > cur_at;
    }

    match tie_break {
        TieBreak::LastSeen => true,
        TieBreak::LowestId => candidate.id < current.id,
    }
}

/// Pick the authoritative record per player from all records of one match.
///
/// The result only prefills edit forms; nothing is written back.
pub fn resolve_latest<I>(entries: I, tie_break: TieBreak) -> BTreeMap<PlayerId, StatEntry>
where
    I: IntoIterator<Item = StatEntry>,
{
    let mut resolved: BTreeMap<PlayerId, StatEntry> = BTreeMap::new();

    for entry in entries {
        match resolved.get(&entry.player_id) {
            Some(current) if !supersedes(&entry, current, tie_break) => {}
            _ => {
                resolved.insert(entry.player_id.clone(), entry);
            }
        }
    }

    resolved
}
