//! Season-level aggregate statistics.

use serde::Serialize;

use super::{AggregateId, EntityId, LeagueId, PlayerId};

/// Per-player, per-league season averages.
///
/// A materialised view over that player's stat entries in the league; it is
/// recomputed wholesale and never edited on its own.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeasonAggregate {
    #[serde(skip_serializing)]
    pub id: AggregateId,

    pub league_id: LeagueId,

    pub player_id: PlayerId,

    /// Number of stat entries the averages were computed from
    pub matches: u32,

    pub average_points: f64,
    pub average_rebounds: f64,
    pub average_assists: f64,
    pub average_steals: f64,
    pub average_blocks: f64,
    pub average_turnovers: f64,
}

impl SeasonAggregate {
    /// An aggregate with no matches; every average is zero.
    pub fn empty(league_id: LeagueId, player_id: PlayerId) -> Self {
        let id = EntityId::season_aggregate(&league_id, &player_id);
        Self {
            id,
            league_id,
            player_id,
            matches: 0,
            average_points: 0.0,
            average_rebounds: 0.0,
            average_assists: 0.0,
            average_steals: 0.0,
            average_blocks: 0.0,
            average_turnovers: 0.0,
        }
    }
}
