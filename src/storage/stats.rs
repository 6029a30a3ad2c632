//! Typed access to stat and aggregate documents.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::warn;

use super::{Collection, DocumentStore, Filter, StorageError, StoredDocument};
use crate::models::{
    parse_instant, parse_stat_value, EntityId, LeagueId, MatchId, NamedRef, PlayerId,
    SeasonAggregate, StatEntry, StatLine, TeamId,
};

/// Read a key-like field. Only non-blank strings count, matching the string
/// filters every query uses.
fn id_field(data: &Map<String, Value>, field: &str) -> Option<EntityId> {
    match data.get(field)? {
        Value::String(s) if !s.trim().is_empty() => Some(EntityId::from(s.as_str())),
        _ => None,
    }
}

fn required_id(
    doc: &StoredDocument,
    collection: Collection,
    field: &str,
) -> Result<EntityId, StorageError> {
    id_field(&doc.data, field).ok_or_else(|| StorageError::InvalidDocument {
        collection: collection.name().to_string(),
        id: doc.id.clone(),
        reason: format!("missing {}", field),
    })
}

/// Validate a stored stat document. Key fields are required; stat fields
/// default to zero and an unreadable timestamp becomes `None`.
pub fn decode_stat_entry(doc: &StoredDocument) -> Result<StatEntry, StorageError> {
    let collection = Collection::MatchStats;
    let data = &doc.data;
    let stat = |field: &str| parse_stat_value(data.get(field));

    Ok(StatEntry {
        id: EntityId::from(doc.id.as_str()),
        match_id: required_id(doc, collection, "matchId")?,
        player_id: required_id(doc, collection, "playerId")?,
        league_id: required_id(doc, collection, "leagueId")?,
        team_id: id_field(data, "teamId"),
        recorded_at: data.get("recordedAt").and_then(parse_instant),
        stats: StatLine {
            points: stat("points"),
            rebounds: stat("rebounds"),
            assists: stat("assists"),
            steals: stat("steals"),
            blocks: stat("blocks"),
            turnovers: stat("turnovers"),
        },
    })
}

/// Validate a stored season aggregate document.
pub fn decode_aggregate(doc: &StoredDocument) -> Result<SeasonAggregate, StorageError> {
    let collection = Collection::SeasonStats;
    let data = &doc.data;
    let average = |field: &str| parse_stat_value(data.get(field));
    let matches = data
        .get("matches")
        .and_then(Value::as_u64)
        .map(|m| m.min(u32::MAX as u64) as u32)
        .unwrap_or(0);

    Ok(SeasonAggregate {
        id: EntityId::from(doc.id.as_str()),
        league_id: required_id(doc, collection, "leagueId")?,
        player_id: required_id(doc, collection, "playerId")?,
        matches,
        average_points: average("averagePoints"),
        average_rebounds: average("averageRebounds"),
        average_assists: average("averageAssists"),
        average_steals: average("averageSteals"),
        average_blocks: average("averageBlocks"),
        average_turnovers: average("averageTurnovers"),
    })
}

/// Decode every document, skipping the malformed ones.
fn decode_all<T>(
    docs: Vec<StoredDocument>,
    decode: fn(&StoredDocument) -> Result<T, StorageError>,
) -> Vec<T> {
    docs.iter()
        .filter_map(|doc| match decode(doc) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Skipping document: {}", e);
                None
            }
        })
        .collect()
}

/// Stat-pipeline view of the document store.
#[derive(Clone)]
pub struct StatStore {
    store: Arc<dyn DocumentStore>,
}

impl StatStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Name of the underlying store, for logging.
    pub fn backend_name(&self) -> &'static str {
        self.store.name()
    }

    /// Write an entry under its canonical key, replacing any previous save.
    pub async fn upsert_stat_entry(&self, entry: &StatEntry) -> Result<(), StorageError> {
        let record = serde_json::to_value(entry)?;
        self.store
            .upsert(
                Collection::MatchStats,
                entry.canonical_id().as_str(),
                record,
                false,
            )
            .await
    }

    /// All stat records for a match in a league, legacy keys included.
    pub async fn stat_entries_for_match(
        &self,
        league_id: &LeagueId,
        match_id: &MatchId,
    ) -> Result<Vec<StatEntry>, StorageError> {
        let docs = self
            .store
            .query_equal(
                Collection::MatchStats,
                &[
                    Filter::field_eq("leagueId", league_id.as_str()),
                    Filter::field_eq("matchId", match_id.as_str()),
                ],
            )
            .await?;
        Ok(decode_all(docs, decode_stat_entry))
    }

    /// All stat records for a match regardless of league.
    pub async fn stat_entries_in_match(
        &self,
        match_id: &MatchId,
    ) -> Result<Vec<StatEntry>, StorageError> {
        let docs = self
            .store
            .query_equal(
                Collection::MatchStats,
                &[Filter::field_eq("matchId", match_id.as_str())],
            )
            .await?;
        Ok(decode_all(docs, decode_stat_entry))
    }

    /// A player's full stat history in a league.
    pub async fn stat_entries_for_player(
        &self,
        league_id: &LeagueId,
        player_id: &PlayerId,
    ) -> Result<Vec<StatEntry>, StorageError> {
        let docs = self
            .store
            .query_equal(
                Collection::MatchStats,
                &[
                    Filter::field_eq("leagueId", league_id.as_str()),
                    Filter::field_eq("playerId", player_id.as_str()),
                ],
            )
            .await?;
        Ok(decode_all(docs, decode_stat_entry))
    }

    /// Merge-upsert an aggregate under its deterministic key.
    pub async fn upsert_aggregate(&self, aggregate: &SeasonAggregate) -> Result<(), StorageError> {
        let record = serde_json::to_value(aggregate)?;
        let id = EntityId::season_aggregate(&aggregate.league_id, &aggregate.player_id);
        self.store
            .upsert(Collection::SeasonStats, id.as_str(), record, true)
            .await
    }

    /// Stored aggregate for one player, if any.
    pub async fn aggregate(
        &self,
        league_id: &LeagueId,
        player_id: &PlayerId,
    ) -> Result<Option<SeasonAggregate>, StorageError> {
        let id = EntityId::season_aggregate(league_id, player_id);
        let Some(doc) = self.store.get(Collection::SeasonStats, id.as_str()).await? else {
            return Ok(None);
        };
        let aggregate = decode_aggregate(&doc)?;
        // Keys concatenate without a separator, so another pair can own this key.
        if &aggregate.league_id != league_id || &aggregate.player_id != player_id {
            warn!(
                "Aggregate key {} belongs to {}/{}, not {}/{}",
                id, aggregate.league_id, aggregate.player_id, league_id, player_id
            );
            return Ok(None);
        }
        Ok(Some(aggregate))
    }

    /// Every stored aggregate for a league, in store order.
    pub async fn aggregates_for_league(
        &self,
        league_id: &LeagueId,
    ) -> Result<Vec<SeasonAggregate>, StorageError> {
        let docs = self
            .store
            .query_equal(
                Collection::SeasonStats,
                &[Filter::field_eq("leagueId", league_id.as_str())],
            )
            .await?;
        Ok(decode_all(docs, decode_aggregate))
    }

    /// Merge fields into a match document.
    pub async fn merge_match(&self, match_id: &MatchId, fields: Value) -> Result<(), StorageError> {
        self.store
            .upsert(Collection::Matches, match_id.as_str(), fields, true)
            .await
    }

    /// Display reference for a player, team, or league document. Falls back
    /// to the bare id when the document or its `name` is missing.
    pub async fn named_ref(
        &self,
        collection: Collection,
        id: &EntityId,
    ) -> Result<NamedRef, StorageError> {
        let doc = self.store.get(collection, id.as_str()).await?;
        let name = doc
            .as_ref()
            .and_then(|d| d.data.get("name"))
            .and_then(Value::as_str)
            .map(str::to_string);
        Ok(match name {
            Some(name) => NamedRef::new(id.clone(), name),
            None => NamedRef::unnamed(id.clone()),
        })
    }

    /// Team a player belongs to, per the player document.
    pub async fn player_team(&self, player_id: &PlayerId) -> Result<Option<TeamId>, StorageError> {
        let doc = self.store.get(Collection::Players, player_id.as_str()).await?;
        Ok(doc.and_then(|d| id_field(&d.data, "teamId")))
    }
}
