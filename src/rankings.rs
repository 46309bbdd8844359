//! As-of backward join between matches and FIFA ranking publications.
//!
//! A ranking published on the match day counts as known for that match.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::dataset::{Match, RankingSnapshot};

/// Ranking publications grouped per team, each series sorted by date.
#[derive(Debug, Clone, Default)]
pub struct RankingBook {
    by_team: HashMap<String, Vec<RankingSnapshot>>,
}

impl RankingBook {
    pub fn new(snapshots: impl IntoIterator<Item = RankingSnapshot>) -> Self {
        let mut by_team: HashMap<String, Vec<RankingSnapshot>> = HashMap::new();
        for snap in snapshots {
            by_team.entry(snap.team.clone()).or_default().push(snap);
        }
        for series in by_team.values_mut() {
            series.sort_by_key(|s| s.rank_date);
            series.dedup_by_key(|s| s.rank_date);
        }
        Self { by_team }
    }

    /// Latest snapshot for `team` with `rank_date <= date`.
    pub fn latest_at(&self, team: &str, date: NaiveDate) -> Option<&RankingSnapshot> {
        let series = self.by_team.get(team)?;
        let idx = series.partition_point(|s| s.rank_date <= date);
        idx.checked_sub(1).map(|i| &series[i])
    }

    pub fn cursor(&self) -> AsOfCursor<'_> {
        AsOfCursor {
            book: self,
            positions: HashMap::new(),
        }
    }

    pub fn contains_team(&self, team: &str) -> bool {
        self.by_team.contains_key(team)
    }

    pub fn teams(&self) -> impl Iterator<Item = &str> {
        self.by_team.keys().map(|s| s.as_str())
    }

    pub fn snapshot_count(&self) -> usize {
        self.by_team.values().map(|s| s.len()).sum()
    }

    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first = self.by_team.values().filter_map(|s| s.first()).map(|s| s.rank_date).min()?;
        let last = self.by_team.values().filter_map(|s| s.last()).map(|s| s.rank_date).max()?;
        Some((first, last))
    }
}

/// Sweep form of the join: one forward-moving pointer per team.
pub struct AsOfCursor<'a> {
    book: &'a RankingBook,
    // team -> (snapshots at or before `last`, last query date)
    positions: HashMap<&'a str, (usize, NaiveDate)>,
}

impl<'a> AsOfCursor<'a> {
    pub fn advance(&mut self, team: &str, date: NaiveDate) -> Option<&'a RankingSnapshot> {
        let book = self.book;
        let (key, series) = book.by_team.get_key_value(team)?;
        let pos = self.positions.entry(key.as_str()).or_insert((0, date));

        if date < pos.1 {
            pos.0 = series.partition_point(|s| s.rank_date <= date);
        } else {
            while pos.0 < series.len() && series[pos.0].rank_date <= date {
                pos.0 += 1;
            }
        }
        pos.1 = date;
        pos.0.checked_sub(1).map(|i| &series[i])
    }
}

/// Home and away ranking rows joined onto one match.
#[derive(Debug, Clone, Copy, Default)]
pub struct RankingPair<'a> {
    pub home: Option<&'a RankingSnapshot>,
    pub away: Option<&'a RankingSnapshot>,
}

/// Joins every match (sorted by date) to both sides' latest known ranking.
pub fn join_backward<'a>(book: &'a RankingBook, matches: &[Match]) -> Vec<RankingPair<'a>> {
    let mut cursor = book.cursor();
    matches
        .iter()
        .map(|m| RankingPair {
            home: cursor.advance(&m.home_team, m.date),
            away: cursor.advance(&m.away_team, m.date),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn snap(date: NaiveDate, team: &str, rank: u32) -> RankingSnapshot {
        RankingSnapshot {
            rank_date: date,
            team: team.to_string(),
            rank,
            total_points: 1500.0 - rank as f64,
            rank_change: 0,
        }
    }

    fn book() -> RankingBook {
        RankingBook::new(vec![
            snap(d(2020, 3, 1), "Ghana", 50),
            snap(d(2020, 1, 1), "Ghana", 52),
            snap(d(2020, 2, 1), "Mali", 55),
        ])
    }

    #[test]
    fn lookup_is_backward_and_inclusive() {
        let b = book();
        assert!(b.latest_at("Ghana", d(2019, 12, 31)).is_none());
        assert_eq!(b.latest_at("Ghana", d(2020, 1, 1)).unwrap().rank, 52);
        assert_eq!(b.latest_at("Ghana", d(2020, 2, 29)).unwrap().rank, 52);
        assert_eq!(b.latest_at("Ghana", d(2020, 3, 1)).unwrap().rank, 50);
        assert!(b.latest_at("Togo", d(2021, 1, 1)).is_none());
    }

    #[test]
    fn cursor_matches_binary_search() {
        let b = book();
        let mut cursor = b.cursor();
        let dates = [d(2019, 6, 1), d(2020, 1, 1), d(2020, 2, 15), d(2020, 3, 1), d(2021, 1, 1)];
        for date in dates {
            for team in ["Ghana", "Mali", "Togo"] {
                let swept = cursor.advance(team, date).map(|s| s.rank);
                let searched = b.latest_at(team, date).map(|s| s.rank);
                assert_eq!(swept, searched, "{team} at {date}");
            }
        }
    }

    #[test]
    fn backward_join_agrees_with_lookup() {
        let b = book();
        let game = |date: NaiveDate, home: &str, away: &str| Match {
            seq: 0,
            date,
            home_team: home.to_string(),
            away_team: away.to_string(),
            home_score: 0,
            away_score: 0,
            tournament: "Friendly".to_string(),
            city: String::new(),
            country: String::new(),
            neutral: true,
        };
        let matches = [
            game(d(2019, 12, 1), "Ghana", "Mali"),
            game(d(2020, 1, 1), "Mali", "Ghana"),
            game(d(2020, 2, 1), "Ghana", "Togo"),
            game(d(2020, 3, 1), "Mali", "Ghana"),
        ];
        let joined = join_backward(&b, &matches);
        assert_eq!(joined.len(), matches.len());
        for (m, pair) in matches.iter().zip(&joined) {
            assert_eq!(pair.home, b.latest_at(&m.home_team, m.date));
            assert_eq!(pair.away, b.latest_at(&m.away_team, m.date));
        }
        assert_eq!(joined[3].away.map(|s| s.rank), Some(50));
        assert!(joined[2].away.is_none());
    }

    #[test]
    fn cursor_rewinds_on_earlier_query() {
        let b = book();
        let mut cursor = b.cursor();
        assert_eq!(cursor.advance("Ghana", d(2020, 6, 1)).unwrap().rank, 50);
        assert_eq!(cursor.advance("Ghana", d(2020, 1, 15)).unwrap().rank, 52);
    }
}
