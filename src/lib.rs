//! # Roster Stats
//!
//! Player statistics pipeline for a league roster backend.
//!
//! ## Architecture
//!
//! - **models**: Core data structures (stat entries, season aggregates, ranking rows)
//! - **storage**: Document store abstraction, typed stat adapter, in-memory and JSONL stores
//! - **ingest**: Per-match stat ingestion with keyed, idempotent upserts
//! - **aggregate**: Season aggregate recomputation from full match history
//! - **top_scorer**: Match top-scorer collaborator interface
//! - **ranking**: Sorted, paginated leaderboard view
//! - **calculate**: Pure averaging and latest-wins resolution
//! - **config**: Configuration loading and validation

pub mod aggregate;
pub mod calculate;
pub mod config;
pub mod ingest;
pub mod models;
pub mod ranking;
pub mod storage;
pub mod top_scorer;

pub use models::*;

use std::time::Duration;

/// Parse a human-friendly duration string (e.g., "6h", "30m", "90s", "300ms").
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Some(n) = s.strip_suffix("ms") {
        let millis: u64 = n.trim().parse().ok()?;
        return Some(Duration::from_millis(millis));
    }

    let (num_str, multiplier) = if let Some(n) = s.strip_suffix('h') {
        (n, 3600)
    } else if let Some(n) = s.strip_suffix('m') {
        (n, 60)
    } else if let Some(n) = s.strip_suffix('s') {
        (n, 1)
    } else {
        // Default to seconds
        (s, 1)
    };

    let num: u64 = num_str.trim().parse().ok()?;
    Some(Duration::from_secs(num * multiplier))
}
