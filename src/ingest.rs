//! Match stat ingestion.
//!
//! Saving a match's stat sheet:
//! 1. Normalise each player's raw form values (bad input counts as zero)
//! 2. Upsert one record per player under `matchId_playerId`, all concurrently
//! 3. Once every write has settled successfully, run the top-scorer update and
//!    the season aggregate recompute side by side, and wait for both
//!
//! A failed write fails the batch after the remaining writes settle. Writes
//! that did land stay in place.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::aggregate::{AggregateReport, SeasonAggregator};
use crate::calculate::{resolve_latest, TieBreak};
use crate::models::{
    LeagueId, MatchId, PlayerId, RawStatLine, StatEntry, StatEntryId, StatLine, TeamId,
};
use crate::storage::{StatStore, StorageError};
use crate::top_scorer::{TopScorer, TopScorerError, TopScorerUpdater};

/// Errors that can occur while saving a match's stats.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("No stat entries to save")]
    EmptyBatch,

    #[error("Invalid match context: {0}")]
    InvalidContext(String),

    #[error("Stat row {row} has no player id")]
    MissingPlayer { row: usize },

    #[error("{} of {} stat writes failed", .failed.len(), .total)]
    PartialWrite {
        failed: Vec<WriteFailure>,
        total: usize,
    },

    #[error("Top scorer update failed: {0}")]
    TopScorer(#[from] TopScorerError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// A stat write that failed after all retries.
#[derive(Debug)]
pub struct WriteFailure {
    pub id: StatEntryId,
    pub error: StorageError,
}

/// Retry policy for keyed stat writes.
///
/// Writes replace by key, so retrying one can never duplicate a record.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl RetryPolicy {
    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Delay before the given retry (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = self.backoff_multiplier.max(1.0).powi(retry.saturating_sub(1) as i32);
        Duration::from_millis((self.initial_delay_ms as f64 * factor) as u64)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay_ms: 200,
            backoff_multiplier: 2.0,
        }
    }
}

/// The match a stat sheet belongs to.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchContext {
    pub match_id: MatchId,
    pub league_id: LeagueId,
}

impl MatchContext {
    pub fn new(match_id: impl Into<MatchId>, league_id: impl Into<LeagueId>) -> Self {
        Self {
            match_id: match_id.into(),
            league_id: league_id.into(),
        }
    }

    fn validate(&self) -> Result<(), IngestError> {
        if self.match_id.is_empty() {
            return Err(IngestError::InvalidContext("matchId is empty".to_string()));
        }
        if self.league_id.is_empty() {
            return Err(IngestError::InvalidContext("leagueId is empty".to_string()));
        }
        Ok(())
    }
}

/// One row of the match stat form.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStatInput {
    pub player_id: PlayerId,
    #[serde(default)]
    pub team_id: Option<TeamId>,
    #[serde(flatten)]
    pub raw: RawStatLine,
}

/// A whole stat sheet, as submitted in one save.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestBatch {
    #[serde(flatten)]
    pub context: MatchContext,
    pub entries: Vec<PlayerStatInput>,
}

/// Result of a fully successful save.
#[derive(Debug)]
pub struct IngestReport {
    pub match_id: MatchId,
    pub entries_written: usize,
    pub top_scorer: TopScorer,
    pub aggregation: AggregateReport,
}

/// Saves match stat sheets and keeps derived data in step.
pub struct StatIngestService {
    stats: StatStore,
    aggregator: SeasonAggregator,
    top_scorer: Arc<dyn TopScorerUpdater>,
    retry: RetryPolicy,
}

impl StatIngestService {
    pub fn new(stats: StatStore, top_scorer: Arc<dyn TopScorerUpdater>) -> Self {
        let aggregator = SeasonAggregator::new(stats.clone());
        Self {
            stats,
            aggregator,
            top_scorer,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Build the canonical entries for a batch. A player listed twice keeps
    /// their last row.
    fn build_entries(context: &MatchContext, inputs: Vec<PlayerStatInput>) -> Vec<StatEntry> {
        let recorded_at = Utc::now();
        let mut by_player: BTreeMap<PlayerId, (usize, StatEntry)> = BTreeMap::new();

        for (position, input) in inputs.into_iter().enumerate() {
            let mut entry = StatEntry::new(
                context.match_id.clone(),
                context.league_id.clone(),
                input.player_id,
                StatLine::from_raw(&input.raw),
                recorded_at,
            );
            entry.team_id = input.team_id;
            if let Some((_, previous)) = by_player.get(&entry.player_id) {
                warn!(
                    "Player {} listed twice for match {}, keeping the later row",
                    previous.player_id, context.match_id
                );
            }
            by_player.insert(entry.player_id.clone(), (position, entry));
        }

        let mut entries: Vec<(usize, StatEntry)> = by_player.into_values().collect();
        entries.sort_by_key(|(position, _)| *position);
        entries.into_iter().map(|(_, entry)| entry).collect()
    }

    async fn write_with_retry(&self, entry: &StatEntry) -> Result<(), StorageError> {
        let mut attempt = 0;
        loop {
            match self.stats.upsert_stat_entry(entry).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.retry.max_retries => {
                    attempt += 1;
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        "Write of {} failed ({}), retry {}/{} in {:?}",
                        entry.id, e, attempt, self.retry.max_retries, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Save a match's stat sheet.
    ///
    /// Returns only after the top-scorer update has completed, so callers can
    /// rely on the match's designation matching the saved stats. Aggregate
    /// failures for individual players are reported but do not fail the save.
    pub async fn save_match_stats(
        &self,
        context: &MatchContext,
        inputs: Vec<PlayerStatInput>,
    ) -> Result<IngestReport, IngestError> {
        context.validate()?;
        if inputs.is_empty() {
            return Err(IngestError::EmptyBatch);
        }
        // Rows the read side would reject are refused before anything is written.
        if let Some(row) = inputs.iter().position(|i| i.player_id.is_empty()) {
            return Err(IngestError::MissingPlayer { row });
        }

        let entries = Self::build_entries(context, inputs);
        let total = entries.len();
        info!(
            "Saving {} stat entries for match {} in league {}",
            total, context.match_id, context.league_id
        );

        let results = join_all(entries.iter().map(|entry| self.write_with_retry(entry))).await;

        let failed: Vec<WriteFailure> = entries
            .iter()
            .zip(results)
            .filter_map(|(entry, result)| {
                result.err().map(|error| WriteFailure {
                    id: entry.id.clone(),
                    error,
                })
            })
            .collect();

        if !failed.is_empty() {
            warn!(
                "Match {}: {} of {} stat writes failed, no compensation applied",
                context.match_id,
                failed.len(),
                total
            );
            return Err(IngestError::PartialWrite { failed, total });
        }

        let player_ids: Vec<PlayerId> = entries.iter().map(|e| e.player_id.clone()).collect();
        debug!(
            "All writes durable for match {}, running {} and aggregation",
            context.match_id,
            self.top_scorer.name()
        );

        let (top_scorer, aggregation) = tokio::join!(
            self.top_scorer.update_match_top_scorer(&context.match_id),
            self.aggregator.recompute(&context.league_id, &player_ids),
        );
        let top_scorer = top_scorer?;

        info!(
            "Saved match {}: {} entries, {} aggregates updated",
            context.match_id,
            total,
            aggregation.updated.len()
        );

        Ok(IngestReport {
            match_id: context.match_id.clone(),
            entries_written: total,
            top_scorer,
            aggregation,
        })
    }

    /// Save a parsed [`IngestBatch`].
    pub async fn save_batch(&self, batch: IngestBatch) -> Result<IngestReport, IngestError> {
        self.save_match_stats(&batch.context, batch.entries).await
    }

    /// Current stats of a match, one record per player, for prefilling the
    /// edit form. Legacy duplicates are resolved, not migrated.
    pub async fn prefill(
        &self,
        context: &MatchContext,
        tie_break: TieBreak,
    ) -> Result<BTreeMap<PlayerId, StatEntry>, IngestError> {
        context.validate()?;
        let candidates = self
            .stats
            .stat_entries_for_match(&context.league_id, &context.match_id)
            .await?;
        debug!(
            "Resolving {} stat records for match {}",
            candidates.len(),
            context.match_id
        );
        Ok(resolve_latest(candidates, tie_break))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::testing::FlakyStore;
    use crate::storage::{Collection, DocumentStore, MemoryStore};
    use crate::top_scorer::testing::RecordingUpdater;
    use crate::top_scorer::HighestPointsUpdater;
    use serde_json::json;

    fn input(player: &str, points: &str, rebounds: &str) -> PlayerStatInput {
        PlayerStatInput {
            player_id: player.into(),
            team_id: None,
            raw: RawStatLine {
                points: Some(points.to_string()),
                rebounds: Some(rebounds.to_string()),
                ..Default::default()
            },
        }
    }

    fn service(store: Arc<dyn DocumentStore>, updater: Arc<dyn TopScorerUpdater>) -> StatIngestService {
        StatIngestService::new(StatStore::new(store), updater).with_retry_policy(RetryPolicy {
            max_retries: 2,
            initial_delay_ms: 1,
            backoff_multiplier: 1.0,
        })
    }

    #[test]
    fn test_retry_policy_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 2);
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
        assert_eq!(RetryPolicy::none().max_retries, 0);
    }

    #[test]
    fn test_batch_deserializes_from_form_json() {
        let batch: IngestBatch = serde_json::from_value(json!({
            "matchId": "m1",
            "leagueId": "l1",
            "entries": [
                {"playerId": "p1", "teamId": "t1", "points": "12", "assists": 3},
                {"playerId": "p2"}
            ]
        }))
        .unwrap();

        assert_eq!(batch.context, MatchContext::new("m1", "l1"));
        assert_eq!(batch.entries.len(), 2);
        assert_eq!(batch.entries[0].team_id, Some("t1".into()));
        assert_eq!(batch.entries[0].raw.points.as_deref(), Some("12"));
        assert_eq!(batch.entries[0].raw.assists.as_deref(), Some("3"));
        assert_eq!(batch.entries[1].raw, RawStatLine::default());
    }

    #[tokio::test]
    async fn test_save_writes_canonical_records() {
        let memory = Arc::new(MemoryStore::new());
        let updater = Arc::new(RecordingUpdater::default());
        let svc = service(memory.clone(), updater.clone());

        let report = svc
            .save_match_stats(
                &MatchContext::new("m1", "l1"),
                vec![input("p1", "12", "5"), input("p2", "oops", "")],
            )
            .await
            .unwrap();

        assert_eq!(report.entries_written, 2);
        let doc = memory.get(Collection::MatchStats, "m1_p1").await.unwrap().unwrap();
        assert_eq!(doc.data["points"], 12.0);
        assert_eq!(doc.data["rebounds"], 5.0);
        let doc = memory.get(Collection::MatchStats, "m1_p2").await.unwrap().unwrap();
        assert_eq!(doc.data["points"], 0.0);
        assert_eq!(doc.data["rebounds"], 0.0);
        assert_eq!(updater.calls(), vec![MatchId::from("m1")]);
    }

    #[tokio::test]
    async fn test_resave_overwrites_instead_of_duplicating() {
        let memory = Arc::new(MemoryStore::new());
        let svc = service(memory.clone(), Arc::new(RecordingUpdater::default()));
        let ctx = MatchContext::new("m1", "l1");

        svc.save_match_stats(&ctx, vec![input("p1", "12", "5")]).await.unwrap();
        svc.save_match_stats(&ctx, vec![input("p1", "12", "5")]).await.unwrap();
        assert_eq!(memory.count(Collection::MatchStats).await, 1);

        svc.save_match_stats(&ctx, vec![input("p1", "30", "5")]).await.unwrap();
        assert_eq!(memory.count(Collection::MatchStats).await, 1);
        let doc = memory.get(Collection::MatchStats, "m1_p1").await.unwrap().unwrap();
        assert_eq!(doc.data["points"], 30.0);
    }

    #[tokio::test]
    async fn test_save_updates_season_aggregates() {
        let memory = Arc::new(MemoryStore::new());
        let svc = service(memory.clone(), Arc::new(RecordingUpdater::default()));

        for (match_id, points) in [("m1", "10"), ("m2", "20"), ("m3", "30")] {
            svc.save_match_stats(&MatchContext::new(match_id, "l1"), vec![input("p1", points, "0")])
                .await
                .unwrap();
        }

        let doc = memory.get(Collection::SeasonStats, "l1p1").await.unwrap().unwrap();
        assert_eq!(doc.data["matches"], 3);
        assert_eq!(doc.data["averagePoints"], 20.0);
    }

    #[tokio::test]
    async fn test_failed_write_fails_batch_after_others_settle() {
        let flaky = Arc::new(FlakyStore::new());
        flaky.fail_writes("m1_p2", 10);
        let updater = Arc::new(RecordingUpdater::default());
        let svc = service(flaky.clone(), updater.clone());

        let result = svc
            .save_match_stats(
                &MatchContext::new("m1", "l1"),
                vec![input("p1", "1", "1"), input("p2", "2", "2"), input("p3", "3", "3")],
            )
            .await;

        match result {
            Err(IngestError::PartialWrite { failed, total }) => {
                assert_eq!(total, 3);
                assert_eq!(failed.len(), 1);
                assert_eq!(failed[0].id.as_str(), "m1_p2");
            }
            other => panic!("Expected PartialWrite, got {:?}", other.map(|r| r.entries_written)),
        }

        // The other writes landed and were not rolled back
        assert!(flaky.inner.get(Collection::MatchStats, "m1_p1").await.unwrap().is_some());
        assert!(flaky.inner.get(Collection::MatchStats, "m1_p3").await.unwrap().is_some());
        // Nothing downstream ran
        assert!(updater.calls().is_empty());
        assert_eq!(flaky.inner.count(Collection::SeasonStats).await, 0);
    }

    #[tokio::test]
    async fn test_transient_write_failure_is_retried() {
        let flaky = Arc::new(FlakyStore::new());
        flaky.fail_writes("m1_p1", 2);
        let svc = service(flaky.clone(), Arc::new(RecordingUpdater::default()));

        svc.save_match_stats(&MatchContext::new("m1", "l1"), vec![input("p1", "9", "0")])
            .await
            .unwrap();

        let attempts = flaky.upsert_calls().iter().filter(|id| *id == "m1_p1").count();
        assert_eq!(attempts, 3);
        assert_eq!(flaky.inner.count(Collection::MatchStats).await, 1);
    }

    #[tokio::test]
    async fn test_top_scorer_failure_fails_save() {
        let memory = Arc::new(MemoryStore::new());
        let svc = service(memory.clone(), Arc::new(RecordingUpdater::failing()));

        let result = svc
            .save_match_stats(&MatchContext::new("m1", "l1"), vec![input("p1", "9", "0")])
            .await;

        assert!(matches!(result, Err(IngestError::TopScorer(_))));
        // Stats and aggregates are already durable
        assert_eq!(memory.count(Collection::MatchStats).await, 1);
        assert_eq!(memory.count(Collection::SeasonStats).await, 1);
    }

    #[tokio::test]
    async fn test_top_scorer_sees_all_written_stats() {
        let memory = Arc::new(MemoryStore::new());
        let stats = StatStore::new(memory.clone());
        let svc = service(memory.clone(), Arc::new(HighestPointsUpdater::new(stats)));

        let report = svc
            .save_match_stats(
                &MatchContext::new("m1", "l1"),
                vec![input("p1", "14", "0"), input("p2", "27", "0"), input("p3", "3", "0")],
            )
            .await
            .unwrap();

        assert_eq!(report.top_scorer.player_id, Some("p2".into()));
        let doc = memory.get(Collection::Matches, "m1").await.unwrap().unwrap();
        assert_eq!(doc.data["topScorerId"], "p2");
    }

    #[tokio::test]
    async fn test_duplicate_player_rows_keep_last() {
        let memory = Arc::new(MemoryStore::new());
        let svc = service(memory.clone(), Arc::new(RecordingUpdater::default()));

        let report = svc
            .save_match_stats(
                &MatchContext::new("m1", "l1"),
                vec![input("p1", "5", "0"), input("p2", "6", "0"), input("p1", "8", "0")],
            )
            .await
            .unwrap();

        assert_eq!(report.entries_written, 2);
        let doc = memory.get(Collection::MatchStats, "m1_p1").await.unwrap().unwrap();
        assert_eq!(doc.data["points"], 8.0);
    }

    #[tokio::test]
    async fn test_rejects_empty_batch_and_context() {
        let svc = service(Arc::new(MemoryStore::new()), Arc::new(RecordingUpdater::default()));

        let empty = svc.save_match_stats(&MatchContext::new("m1", "l1"), vec![]).await;
        assert!(matches!(empty, Err(IngestError::EmptyBatch)));

        let no_match = svc
            .save_match_stats(&MatchContext::new("", "l1"), vec![input("p1", "1", "1")])
            .await;
        assert!(matches!(no_match, Err(IngestError::InvalidContext(_))));
    }

    #[tokio::test]
    async fn test_blank_player_id_rejects_whole_batch() {
        let memory = Arc::new(MemoryStore::new());
        let updater = Arc::new(RecordingUpdater::default());
        let svc = service(memory.clone(), updater.clone());

        let result = svc
            .save_match_stats(
                &MatchContext::new("m1", "l1"),
                vec![input("p1", "12", "0"), input("  ", "30", "0")],
            )
            .await;

        assert!(matches!(result, Err(IngestError::MissingPlayer { row: 1 })));
        assert_eq!(memory.count(Collection::MatchStats).await, 0);
        assert_eq!(memory.count(Collection::SeasonStats).await, 0);
        assert!(updater.calls().is_empty());
    }

    #[tokio::test]
    async fn test_prefill_prefers_canonical_over_newer_legacy() {
        let memory = Arc::new(MemoryStore::new());
        let svc = service(memory.clone(), Arc::new(RecordingUpdater::default()));
        let ctx = MatchContext::new("m1", "l1");

        svc.save_match_stats(&ctx, vec![input("p1", "10", "0")]).await.unwrap();
        // Written by an older client, later timestamp, generated key
        memory
            .insert_with_generated_id(
                Collection::MatchStats,
                json!({
                    "matchId": "m1",
                    "playerId": "p1",
                    "leagueId": "l1",
                    "points": "99",
                    "recordedAt": "2999-01-01T00:00:00Z"
                }),
            )
            .await
            .unwrap();
        memory
            .insert_with_generated_id(
                Collection::MatchStats,
                json!({"matchId": "m1", "playerId": "p2", "leagueId": "l1", "points": 4}),
            )
            .await
            .unwrap();

        let prefill = svc.prefill(&ctx, TieBreak::LastSeen).await.unwrap();
        assert_eq!(prefill.len(), 2);
        assert_eq!(prefill[&PlayerId::from("p1")].stats.points, 10.0);
        assert!(prefill[&PlayerId::from("p1")].is_canonical());
        assert_eq!(prefill[&PlayerId::from("p2")].stats.points, 4.0);
        // Prefill never writes
        assert_eq!(memory.count(Collection::MatchStats).await, 3);
    }
}
