//! Deterministic document ids.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An application-level identifier (player, match, league, document key).
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(String);

impl EntityId {
    /// Create a new EntityId from a string.
    pub fn new(id: String) -> Self {
        Self(id)
    }

    /// Canonical key of a match stat entry: `matchId + "_" + playerId`.
    ///
    /// Repeated saves for the same match and player target this key, so they
    /// overwrite instead of duplicating.
    pub fn stat_entry(match_id: &EntityId, player_id: &EntityId) -> StatEntryId {
        Self(format!("{}_{}", match_id.0, player_id.0))
    }

    /// Key of a season aggregate: `leagueId + playerId`, no separator.
    pub fn season_aggregate(league_id: &EntityId, player_id: &EntityId) -> AggregateId {
        Self(format!("{}{}", league_id.0, player_id.0))
    }

    /// Get the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Type alias for player IDs
pub type PlayerId = EntityId;

/// Type alias for match IDs
pub type MatchId = EntityId;

/// Type alias for league IDs
pub type LeagueId = EntityId;

/// Type alias for team IDs
pub type TeamId = EntityId;

/// Type alias for stat entry document keys
pub type StatEntryId = EntityId;

/// Type alias for season aggregate document keys
pub type AggregateId = EntityId;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stat_entry_id_is_match_underscore_player() {
        let id = EntityId::stat_entry(&"m42".into(), &"p7".into());
        assert_eq!(id.as_str(), "m42_p7");
    }

    #[test]
    fn test_stat_entry_id_deterministic() {
        let m = EntityId::from("match-1");
        let p = EntityId::from("player-1");
        assert_eq!(EntityId::stat_entry(&m, &p), EntityId::stat_entry(&m, &p));
    }

    #[test]
    fn test_stat_entry_id_argument_order_matters() {
        let a = EntityId::from("a");
        let b = EntityId::from("b");
        assert_ne!(EntityId::stat_entry(&a, &b), EntityId::stat_entry(&b, &a));
    }

    #[test]
    fn test_season_aggregate_id_concatenates() {
        let id = EntityId::season_aggregate(&"league9".into(), &"p7".into());
        assert_eq!(id.as_str(), "league9p7");
    }

    #[test]
    fn test_entity_id_serializes_as_plain_string() {
        let id = EntityId::from("abc");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"abc\"");
        let back: EntityId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_entity_id_is_empty() {
        assert!(EntityId::from("  ").is_empty());
        assert!(!EntityId::from("x").is_empty());
    }

    #[test]
    fn test_entity_id_debug() {
        let id = EntityId::new("debug-test".to_string());
        assert!(format!("{:?}", id).contains("debug-test"));
    }
}
