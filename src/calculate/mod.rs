//! Statistics calculation.
//!
//! Pure functions over stat entries:
//! - Season averages from a player's match history
//! - Latest-wins resolution of duplicate match records

mod resolve;

pub use resolve::*;

use crate::models::{LeagueId, PlayerId, SeasonAggregate, StatEntry, StatLine};

/// Calculate a mean; zero when there is nothing to average.
pub fn calculate_average(sum: f64, count: u32) -> f64 {
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Running per-field totals over a set of stat lines.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StatTotals {
    pub count: u32,
    pub sums: StatLine,
}

impl StatTotals {
    pub fn add(&mut self, line: &StatLine) {
        self.count += 1;
        self.sums.points += line.points;
        self.sums.rebounds += line.rebounds;
        self.sums.assists += line.assists;
        self.sums.steals += line.steals;
        self.sums.blocks += line.blocks;
        self.sums.turnovers += line.turnovers;
    }
}

/// Compute a season aggregate from every stat entry a player has in a league.
///
/// Plain arithmetic means, no weighting or rounding. The result depends only
/// on the entries, so recomputing from the same set is byte-identical.
pub fn season_aggregate(
    league_id: &LeagueId,
    player_id: &PlayerId,
    entries: &[StatEntry],
) -> SeasonAggregate {
    let mut totals = StatTotals::default();
    for entry in entries {
        totals.add(&entry.stats);
    }

    let n = totals.count;
    let mut aggregate = SeasonAggregate::empty(league_id.clone(), player_id.clone());
    aggregate.matches = n;
    aggregate.average_points = calculate_average(totals.sums.points, n);
    aggregate.average_rebounds = calculate_average(totals.sums.rebounds, n);
    aggregate.average_assists = calculate_average(totals.sums.assists, n);
    aggregate.average_steals = calculate_average(totals.sums.steals, n);
    aggregate.average_blocks = calculate_average(totals.sums.blocks, n);
    aggregate.average_turnovers = calculate_average(totals.sums.turnovers, n);
    aggregate
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn entry(match_id: &str, points: f64, rebounds: f64) -> StatEntry {
        StatEntry::new(
            match_id.into(),
            "l1".into(),
            "p1".into(),
            StatLine {
                points,
                rebounds,
                ..Default::default()
            },
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_calculate_average() {
        assert_eq!(calculate_average(60.0, 3), 20.0);
        assert_eq!(calculate_average(5.0, 0), 0.0);
        assert!((calculate_average(10.0, 3) - 3.333).abs() < 0.001);
    }

    #[test]
    fn test_season_aggregate_averages() {
        let entries = vec![
            entry("m1", 10.0, 4.0),
            entry("m2", 20.0, 5.0),
            entry("m3", 30.0, 0.0),
        ];
        let agg = season_aggregate(&"l1".into(), &"p1".into(), &entries);

        assert_eq!(agg.id.as_str(), "l1p1");
        assert_eq!(agg.matches, 3);
        assert_eq!(agg.average_points, 20.0);
        assert_eq!(agg.average_rebounds, 3.0);
        assert_eq!(agg.average_assists, 0.0);
    }

    #[test]
    fn test_season_aggregate_no_entries() {
        let agg = season_aggregate(&"l1".into(), &"p1".into(), &[]);
        assert_eq!(agg.matches, 0);
        assert_eq!(agg.average_points, 0.0);
        assert_eq!(agg, SeasonAggregate::empty("l1".into(), "p1".into()));
    }

    #[test]
    fn test_season_aggregate_is_idempotent() {
        let entries = vec![entry("m1", 7.0, 1.0), entry("m2", 8.0, 2.0)];
        let first = season_aggregate(&"l1".into(), &"p1".into(), &entries);
        let second = season_aggregate(&"l1".into(), &"p1".into(), &entries);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_stat_totals_accumulates_every_field() {
        let mut totals = StatTotals::default();
        let line = StatLine {
            points: 1.0,
            rebounds: 2.0,
            assists: 3.0,
            steals: 4.0,
            blocks: 5.0,
            turnovers: 6.0,
        };
        totals.add(&line);
        totals.add(&line);
        assert_eq!(totals.count, 2);
        assert_eq!(totals.sums.turnovers, 12.0);
        assert_eq!(totals.sums.blocks, 10.0);
    }
}
