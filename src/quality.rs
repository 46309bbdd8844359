use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDate};
use tracing::{info, warn};

use crate::dataset::Match;
use crate::features::{DropCounts, FeatureRow, model_ready};
use crate::rankings::RankingBook;
use crate::team_names::{CAF_TEAMS, is_caf_member};

const MISSING_EXAMPLES: usize = 5;

#[derive(Debug, Clone, Default)]
pub struct QualityReport {
    pub matches: usize,
    pub ranking_snapshots: usize,
    /// Match teams with no ranking history at all, sorted.
    pub teams_missing_rankings: Vec<String>,
    pub match_dates: Option<(NaiveDate, NaiveDate)>,
    pub ranking_dates: Option<(NaiveDate, NaiveDate)>,
    pub matches_per_year: BTreeMap<i32, usize>,
    pub matches_before_rankings: usize,
    pub caf_teams_covered: usize,
    pub caf_teams_total: usize,
    pub feature_drops: DropCounts,
}

impl QualityReport {
    pub fn build(matches: &[Match], rankings: &RankingBook, rows: &[FeatureRow]) -> Self {
        let teams: BTreeSet<&str> = matches
            .iter()
            .flat_map(|m| [m.home_team.as_str(), m.away_team.as_str()])
            .collect();
        let teams_missing_rankings = teams
            .iter()
            .filter(|t| !rankings.contains_team(t))
            .map(|t| t.to_string())
            .collect();

        let match_dates = matches
            .iter()
            .map(|m| m.date)
            .min()
            .zip(matches.iter().map(|m| m.date).max());
        let ranking_dates = rankings.date_range();

        let mut matches_per_year = BTreeMap::new();
        for m in matches {
            *matches_per_year.entry(m.date.year()).or_insert(0) += 1;
        }

        let matches_before_rankings = match ranking_dates {
            Some((first, _)) => matches.iter().filter(|m| m.date < first).count(),
            None => matches.len(),
        };

        Self {
            matches: matches.len(),
            ranking_snapshots: rankings.snapshot_count(),
            teams_missing_rankings,
            match_dates,
            ranking_dates,
            matches_per_year,
            matches_before_rankings,
            caf_teams_covered: teams.iter().filter(|t| is_caf_member(t)).count(),
            caf_teams_total: CAF_TEAMS.len(),
            feature_drops: model_ready(rows).drops,
        }
    }

    pub fn log(&self) {
        info!(
            matches = self.matches,
            ranking_snapshots = self.ranking_snapshots,
            caf_covered = self.caf_teams_covered,
            caf_total = self.caf_teams_total,
            "data quality"
        );
        if let Some((first, last)) = self.match_dates {
            info!(%first, %last, "match date range");
        }
        if let Some((first, last)) = self.ranking_dates {
            info!(%first, %last, "ranking date range");
        }
        for (year, count) in self.matches_per_year.iter().rev().take(5) {
            info!(year, count, "matches per year");
        }
        if !self.teams_missing_rankings.is_empty() {
            warn!(
                count = self.teams_missing_rankings.len(),
                examples = ?&self.teams_missing_rankings[..self.teams_missing_rankings.len().min(MISSING_EXAMPLES)],
                "teams in matches without ranking history"
            );
        }
        if self.matches_before_rankings > 0 {
            warn!(
                count = self.matches_before_rankings,
                "matches before the earliest ranking publication"
            );
        }
        let d = &self.feature_drops;
        info!(
            rows = d.total,
            ready = d.ready,
            missing_home_rank = d.missing_home_rank,
            missing_away_rank = d.missing_away_rank,
            missing_form = d.missing_form,
            "feature coverage"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::RankingSnapshot;

    fn game(y: i32, home: &str, away: &str) -> Match {
        Match {
            seq: 0,
            date: NaiveDate::from_ymd_opt(y, 1, 1).unwrap(),
            home_team: home.to_string(),
            away_team: away.to_string(),
            home_score: 0,
            away_score: 0,
            tournament: "Friendly".to_string(),
            city: String::new(),
            country: String::new(),
            neutral: true,
        }
    }

    #[test]
    fn report_counts_gaps() {
        let book = RankingBook::new(vec![RankingSnapshot {
            rank_date: NaiveDate::from_ymd_opt(1993, 8, 8).unwrap(),
            team: "Ghana".to_string(),
            rank: 30,
            total_points: 0.0,
            rank_change: 0,
        }]);
        let matches = vec![
            game(1990, "Ghana", "Togo"),
            game(2000, "Ghana", "Brazil"),
            game(2000, "Togo", "Ghana"),
        ];
        let report = QualityReport::build(&matches, &book, &[]);
        assert_eq!(report.matches, 3);
        assert_eq!(report.teams_missing_rankings, vec!["Brazil", "Togo"]);
        assert_eq!(report.matches_before_rankings, 1);
        assert_eq!(report.caf_teams_covered, 2);
        assert_eq!(report.matches_per_year[&2000], 2);
        assert_eq!(report.caf_teams_total, 54);
    }
}
