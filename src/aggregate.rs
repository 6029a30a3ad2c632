//! Season aggregate recomputation.
//!
//! After an ingestion, every affected player's season aggregate is rebuilt
//! from that player's full stat history in the league. There is no delta
//! tracking: each run reads everything and overwrites the aggregate, which
//! keeps the aggregate a pure function of the stored entries.

use std::collections::HashSet;

use futures::future::join_all;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::calculate::season_aggregate;
use crate::models::{LeagueId, PlayerId, SeasonAggregate};
use crate::storage::{StatStore, StorageError};

/// Errors recomputing a single player's aggregate.
#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("Failed to read stat history for {player_id}: {source}")]
    Read {
        player_id: PlayerId,
        source: StorageError,
    },

    #[error("Failed to write aggregate for {player_id}: {source}")]
    Write {
        player_id: PlayerId,
        source: StorageError,
    },
}

impl AggregateError {
    pub fn player_id(&self) -> &PlayerId {
        match self {
            AggregateError::Read { player_id, .. } | AggregateError::Write { player_id, .. } => {
                player_id
            }
        }
    }
}

/// Outcome of recomputing a batch of players.
#[derive(Debug, Default)]
pub struct AggregateReport {
    pub updated: Vec<SeasonAggregate>,
    pub failures: Vec<AggregateError>,
}

impl AggregateReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Rebuilds season aggregates from stored stat entries.
#[derive(Clone)]
pub struct SeasonAggregator {
    stats: StatStore,
}

impl SeasonAggregator {
    pub fn new(stats: StatStore) -> Self {
        Self { stats }
    }

    /// Recompute one player's aggregate and merge-upsert it.
    pub async fn recompute_player(
        &self,
        league_id: &LeagueId,
        player_id: &PlayerId,
    ) -> Result<SeasonAggregate, AggregateError> {
        let entries = self
            .stats
            .stat_entries_for_player(league_id, player_id)
            .await
            .map_err(|source| AggregateError::Read {
                player_id: player_id.clone(),
                source,
            })?;

        let aggregate = season_aggregate(league_id, player_id, &entries);

        self.stats
            .upsert_aggregate(&aggregate)
            .await
            .map_err(|source| AggregateError::Write {
                player_id: player_id.clone(),
                source,
            })?;

        debug!(
            "Aggregate {} updated from {} matches",
            aggregate.id, aggregate.matches
        );
        Ok(aggregate)
    }

    /// Recompute every listed player concurrently and wait for all of them.
    ///
    /// A failure for one player never stops the others; it is reported in
    /// [`AggregateReport::failures`]. Repeated ids are recomputed once.
    pub async fn recompute(&self, league_id: &LeagueId, player_ids: &[PlayerId]) -> AggregateReport {
        let mut seen = HashSet::new();
        let unique: Vec<&PlayerId> = player_ids.iter().filter(|p| seen.insert(*p)).collect();

        let results = join_all(
            unique
                .iter()
                .map(|player_id| self.recompute_player(league_id, player_id)),
        )
        .await;

        let mut report = AggregateReport::default();
        for result in results {
            match result {
                Ok(aggregate) => report.updated.push(aggregate),
                Err(e) => {
                    warn!("{}", e);
                    report.failures.push(e);
                }
            }
        }

        info!(
            "Recomputed {} season aggregates in league {} ({} failed)",
            report.updated.len(),
            league_id,
            report.failures.len()
        );
        report
    }
}
