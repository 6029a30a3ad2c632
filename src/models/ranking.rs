//! Leaderboard row and sort key models.

use serde::{Deserialize, Serialize};

use super::{EntityId, SeasonAggregate};

/// Statistic a leaderboard can be sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    Points,
    Assists,
    Rebounds,
    Steals,
    Blocks,
}

impl SortKey {
    /// Parse a user-selected sort option. `Ok(None)` means "no sort".
    pub fn parse(s: &str) -> Result<Option<SortKey>, String> {
        match s.trim().to_lowercase().as_str() {
            "" | "none" => Ok(None),
            "points" | "pts" => Ok(Some(SortKey::Points)),
            "assists" | "ast" => Ok(Some(SortKey::Assists)),
            "rebounds" | "reb" => Ok(Some(SortKey::Rebounds)),
            "steals" | "stl" => Ok(Some(SortKey::Steals)),
            "blocks" | "blk" => Ok(Some(SortKey::Blocks)),
            other => Err(format!("Unknown sort key: {}", other)),
        }
    }
}

impl std::fmt::Display for SortKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SortKey::Points => write!(f, "points"),
            SortKey::Assists => write!(f, "assists"),
            SortKey::Rebounds => write!(f, "rebounds"),
            SortKey::Steals => write!(f, "steals"),
            SortKey::Blocks => write!(f, "blocks"),
        }
    }
}

/// Reference to a player, team, or league document for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedRef {
    pub id: EntityId,
    pub name: String,
}

impl NamedRef {
    pub fn new(id: EntityId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    /// Reference whose display name falls back to the id.
    pub fn unnamed(id: EntityId) -> Self {
        let name = id.to_string();
        Self { id, name }
    }
}

/// One leaderboard row. Derived per request, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopPlayerView {
    pub player: NamedRef,
    pub team: Option<NamedRef>,
    pub league: NamedRef,
    pub average_points: Option<f64>,
    pub average_rebounds: Option<f64>,
    pub average_assists: Option<f64>,
    pub average_steals: Option<f64>,
    pub average_blocks: Option<f64>,
}

impl TopPlayerView {
    /// Build a row from an aggregate and its resolved references.
    pub fn from_aggregate(
        aggregate: &SeasonAggregate,
        player: NamedRef,
        team: Option<NamedRef>,
        league: NamedRef,
    ) -> Self {
        Self {
            player,
            team,
            league,
            average_points: Some(aggregate.average_points),
            average_rebounds: Some(aggregate.average_rebounds),
            average_assists: Some(aggregate.average_assists),
            average_steals: Some(aggregate.average_steals),
            average_blocks: Some(aggregate.average_blocks),
        }
    }

    /// Value of the given stat; missing or NaN counts as zero.
    pub fn stat(&self, key: SortKey) -> f64 {
        let value = match key {
            SortKey::Points => self.average_points,
            SortKey::Assists => self.average_assists,
            SortKey::Rebounds => self.average_rebounds,
            SortKey::Steals => self.average_steals,
            SortKey::Blocks => self.average_blocks,
        };
        value.filter(|v| !v.is_nan()).unwrap_or(0.0)
    }
}
