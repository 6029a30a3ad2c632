//! Per-match player statistics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::instant::comparable;
use super::{EntityId, LeagueId, MatchId, PlayerId, StatEntryId, TeamId};

/// Parse a stat from user text. Empty or unparseable input is zero production,
/// never an error.
pub fn parse_stat(text: &str) -> f64 {
    match text.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

/// Read a stat from a loosely typed stored value.
pub fn parse_stat_value(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().filter(|v| v.is_finite()).unwrap_or(0.0),
        Some(Value::String(s)) => parse_stat(s),
        _ => 0.0,
    }
}

/// The six tracked box-score stats for one player in one match.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StatLine {
    pub points: f64,
    pub rebounds: f64,
    pub assists: f64,
    pub steals: f64,
    pub blocks: f64,
    pub turnovers: f64,
}

impl StatLine {
    /// Normalise raw form input.
    pub fn from_raw(raw: &RawStatLine) -> Self {
        let field = |v: &Option<String>| v.as_deref().map(parse_stat).unwrap_or(0.0);
        Self {
            points: field(&raw.points),
            rebounds: field(&raw.rebounds),
            assists: field(&raw.assists),
            steals: field(&raw.steals),
            blocks: field(&raw.blocks),
            turnovers: field(&raw.turnovers),
        }
    }
}

/// Stat values exactly as typed into the match form.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawStatLine {
    #[serde(deserialize_with = "text_or_number")]
    pub points: Option<String>,
    #[serde(deserialize_with = "text_or_number")]
    pub rebounds: Option<String>,
    #[serde(deserialize_with = "text_or_number")]
    pub assists: Option<String>,
    #[serde(deserialize_with = "text_or_number")]
    pub steals: Option<String>,
    #[serde(deserialize_with = "text_or_number")]
    pub blocks: Option<String>,
    #[serde(deserialize_with = "text_or_number")]
    pub turnovers: Option<String>,
}

// Batch files written by hand often use bare numbers.
fn text_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// One player's statistics for one match, as stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatEntry {
    /// Document key in the store. Canonical for new writes, arbitrary for
    /// records left by older clients.
    #[serde(skip_serializing)]
    pub id: StatEntryId,

    pub match_id: MatchId,

    pub player_id: PlayerId,

    pub league_id: LeagueId,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_id: Option<TeamId>,

    pub recorded_at: Option<DateTime<Utc>>,

    #[serde(flatten)]
    pub stats: StatLine,
}

impl StatEntry {
    /// Create an entry keyed by its canonical id.
    pub fn new(
        match_id: MatchId,
        league_id: LeagueId,
        player_id: PlayerId,
        stats: StatLine,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        let id = EntityId::stat_entry(&match_id, &player_id);
        Self {
            id,
            match_id,
            player_id,
            league_id,
            team_id: None,
            recorded_at: Some(recorded_at),
            stats,
        }
    }

    /// Builder method to set the player's team.
    pub fn with_team(mut self, team_id: TeamId) -> Self {
        self.team_id = Some(team_id);
        self
    }

    /// The key this entry would have if written today.
    pub fn canonical_id(&self) -> StatEntryId {
        EntityId::stat_entry(&self.match_id, &self.player_id)
    }

    pub fn is_canonical(&self) -> bool {
        self.id == self.canonical_id()
    }

    /// Timestamp used for latest-wins ordering.
    pub fn recorded_instant(&self) -> DateTime<Utc> {
        comparable(self.recorded_at)
    }
}
