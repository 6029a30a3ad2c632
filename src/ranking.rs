//! Leaderboard ranking and incremental loading.
//!
//! [`RankingView`] keeps a player list sorted by the selected statistic and
//! reveals it a page at a time. Every page load waits a fixed delay even
//! though all rows are already in memory, so callers are written against the
//! same async shape a server-paginated source would have.
//!
//! Load cursor states:
//! - `Idle -> Loading -> Idle` on each [`RankingView::load_more`]
//! - any state `-> Idle` with the cursor reset on a sort change

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::Notify;
use tracing::debug;

use crate::models::{LeagueId, SortKey, TopPlayerView};
use crate::storage::{Collection, StatStore, StorageError};

pub const DEFAULT_PAGE_SIZE: usize = 10;

pub const DEFAULT_LOAD_DELAY: Duration = Duration::from_millis(500);

/// Sort rows by a stat, highest first. Equal values keep their input order;
/// `None` returns the input order unchanged.
pub fn sort_rows(rows: &[TopPlayerView], key: Option<SortKey>) -> Vec<TopPlayerView> {
    let mut sorted = rows.to_vec();
    if let Some(key) = key {
        // `sort_by` is stable
        sorted.sort_by(|a, b| b.stat(key).total_cmp(&a.stat(key)));
    }
    sorted
}

/// Build leaderboard rows for every player with a stored aggregate in a league.
pub async fn rows_for_league(
    stats: &StatStore,
    league_id: &LeagueId,
) -> Result<Vec<TopPlayerView>, StorageError> {
    let aggregates = stats.aggregates_for_league(league_id).await?;
    let league = stats.named_ref(Collection::Leagues, league_id).await?;

    let rows = join_all(aggregates.iter().map(|aggregate| {
        let league = league.clone();
        async move {
            let player = stats
                .named_ref(Collection::Players, &aggregate.player_id)
                .await?;
            let team = match stats.player_team(&aggregate.player_id).await? {
                Some(team_id) => Some(stats.named_ref(Collection::Teams, &team_id).await?),
                None => None,
            };
            Ok::<_, StorageError>(TopPlayerView::from_aggregate(aggregate, player, team, league))
        }
    }))
    .await;

    rows.into_iter().collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading,
}

/// What a [`RankingView::load_more`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The cursor advanced; `displayed` is the new count
    Loaded { displayed: usize },
    /// Every row is already displayed
    AtEnd,
    /// Another load is in flight; this call did nothing
    AlreadyLoading,
    /// The sort changed or the load was cancelled while waiting
    Cancelled,
}

#[derive(Debug)]
struct Cursor {
    source: Vec<TopPlayerView>,
    sorted: Vec<TopPlayerView>,
    sort_key: Option<SortKey>,
    displayed: usize,
    state: LoadState,
    // Bumped on every reset; a load finishing under a stale generation is void.
    generation: u64,
}

/// Sorted, paginated leaderboard over an in-memory row set.
#[derive(Debug)]
pub struct RankingView {
    page_size: usize,
    load_delay: Duration,
    cursor: Mutex<Cursor>,
    cancelled: Notify,
}

/// Puts the cursor back to idle if a load future is dropped mid-wait.
struct LoadGuard<'a> {
    view: &'a RankingView,
    generation: u64,
    armed: bool,
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut cursor = self.view.lock();
        if cursor.generation == self.generation && cursor.state == LoadState::Loading {
            cursor.state = LoadState::Idle;
        }
    }
}

impl RankingView {
    pub fn new(rows: Vec<TopPlayerView>, sort_key: Option<SortKey>, page_size: usize) -> Self {
        let page_size = page_size.max(1);
        let sorted = sort_rows(&rows, sort_key);
        Self {
            page_size,
            load_delay: DEFAULT_LOAD_DELAY,
            cursor: Mutex::new(Cursor {
                source: rows,
                sorted,
                sort_key,
                displayed: page_size,
                state: LoadState::Idle,
                generation: 0,
            }),
            cancelled: Notify::new(),
        }
    }

    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = delay;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Cursor> {
        self.cursor.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reset(&self, cursor: &mut Cursor) {
        cursor.displayed = self.page_size;
        cursor.state = LoadState::Idle;
        cursor.generation += 1;
        self.cancelled.notify_waiters();
    }

    pub fn sort_key(&self) -> Option<SortKey> {
        self.lock().sort_key
    }

    pub fn total(&self) -> usize {
        self.lock().sorted.len()
    }

    /// Cursor position; may exceed [`Self::total`] when the list is short.
    pub fn displayed_count(&self) -> usize {
        self.lock().displayed
    }

    pub fn has_more(&self) -> bool {
        let cursor = self.lock();
        cursor.displayed < cursor.sorted.len()
    }

    pub fn state(&self) -> LoadState {
        self.lock().state
    }

    pub fn is_loading(&self) -> bool {
        self.state() == LoadState::Loading
    }

    /// Rows currently revealed, in ranking order.
    pub fn visible(&self) -> Vec<TopPlayerView> {
        let cursor = self.lock();
        let end = cursor.displayed.min(cursor.sorted.len());
        cursor.sorted[..end].to_vec()
    }

    /// Change the sort. Resets the cursor to one page and voids any load in
    /// flight, even when the key is unchanged.
    pub fn set_sort_key(&self, sort_key: Option<SortKey>) {
        let mut cursor = self.lock();
        cursor.sort_key = sort_key;
        cursor.sorted = sort_rows(&cursor.source, sort_key);
        self.reset(&mut cursor);
        debug!("Ranking sorted by {:?}, cursor reset", sort_key);
    }

    /// Replace the underlying rows, keeping the current sort key.
    pub fn set_rows(&self, rows: Vec<TopPlayerView>) {
        let mut cursor = self.lock();
        cursor.sorted = sort_rows(&rows, cursor.sort_key);
        cursor.source = rows;
        self.reset(&mut cursor);
    }

    /// Void an in-flight load without touching the sort or the cursor.
    pub fn cancel(&self) {
        let mut cursor = self.lock();
        if cursor.state == LoadState::Loading {
            cursor.state = LoadState::Idle;
            cursor.generation += 1;
            self.cancelled.notify_waiters();
        }
    }

    /// Reveal the next page after the load delay.
    ///
    /// A no-op when everything is shown or another load is already waiting.
    pub async fn load_more(&self) -> LoadOutcome {
        let generation = {
            let mut cursor = self.lock();
            if cursor.state == LoadState::Loading {
                return LoadOutcome::AlreadyLoading;
            }
            if cursor.displayed >= cursor.sorted.len() {
                return LoadOutcome::AtEnd;
            }
            cursor.state = LoadState::Loading;
            cursor.generation
        };
        let mut guard = LoadGuard {
            view: self,
            generation,
            armed: true,
        };

        tokio::select! {
            _ = tokio::time::sleep(self.load_delay) => {}
            _ = self.cancelled.notified() => {}
        }

        let mut cursor = self.lock();
        guard.armed = false;
        if cursor.generation != generation {
            return LoadOutcome::Cancelled;
        }

        let total = cursor.sorted.len();
        cursor.displayed = (cursor.displayed + self.page_size).min(total);
        cursor.state = LoadState::Idle;
        debug!("Ranking cursor at {}/{}", cursor.displayed, total);
        LoadOutcome::Loaded {
            displayed: cursor.displayed,
        }
    }
}
