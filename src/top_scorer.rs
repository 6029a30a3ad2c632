//! Match top-scorer designation.
//!
//! Ingestion hands off to a [`TopScorerUpdater`] once a match's stats are
//! durable and waits for it, so readers never see fresh stats next to a stale
//! top scorer. How the standout performer is chosen is up to the updater.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info};

use crate::calculate::{resolve_latest, TieBreak};
use crate::models::{MatchId, PlayerId};
use crate::storage::{StatStore, StorageError};

/// Errors from a top-scorer update.
#[derive(Debug, Error)]
pub enum TopScorerError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Top scorer update rejected: {0}")]
    Rejected(String),
}

/// Result of a successful update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopScorer {
    pub match_id: MatchId,
    /// `None` when the match has no stats yet
    pub player_id: Option<PlayerId>,
    pub points: f64,
}

/// Collaborator that marks a match's standout performer.
#[async_trait]
pub trait TopScorerUpdater: Send + Sync {
    /// Updater identifier for logging.
    fn name(&self) -> &'static str;

    async fn update_match_top_scorer(&self, match_id: &MatchId)
        -> Result<TopScorer, TopScorerError>;
}

/// Marks the player with the most points in the match. Equal points keep the
/// earlier player in id order.
pub struct HighestPointsUpdater {
    stats: StatStore,
}

impl HighestPointsUpdater {
    pub fn new(stats: StatStore) -> Self {
        Self { stats }
    }
}

#[async_trait]
impl TopScorerUpdater for HighestPointsUpdater {
    fn name(&self) -> &'static str {
        "highest_points"
    }

    async fn update_match_top_scorer(
        &self,
        match_id: &MatchId,
    ) -> Result<TopScorer, TopScorerError> {
        let entries = self.stats.stat_entries_in_match(match_id).await?;
        let resolved = resolve_latest(entries, TieBreak::LowestId);

        let mut best: Option<(&PlayerId, f64)> = None;
        for (player_id, entry) in &resolved {
            let points = entry.stats.points;
            if best.map_or(true, |(_, top)| points > top) {
                best = Some((player_id, points));
            }
        }

        let Some((player_id, points)) = best else {
            debug!("No stats for match {}, top scorer left unset", match_id);
            return Ok(TopScorer {
                match_id: match_id.clone(),
                player_id: None,
                points: 0.0,
            });
        };

        self.stats
            .merge_match(
                match_id,
                json!({
                    "topScorerId": player_id.as_str(),
                    "topScorerPoints": points,
                }),
            )
            .await?;

        info!(
            "Top scorer for match {}: {} ({} pts)",
            match_id, player_id, points
        );

        Ok(TopScorer {
            match_id: match_id.clone(),
            player_id: Some(player_id.clone()),
            points,
        })
    }
}
