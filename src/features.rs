//! Flat per-match feature rows assembled from rankings, form, Elo, head-to-head,
//! travel and competition context.
//!
//! History is processed in date batches. Form and head-to-head read the state
//! left by strictly earlier dates and are updated once the whole batch has been
//! featurized. Elo moves match by match in (date, seq) order.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::competition::{is_home_advantage, tournament_weight};
use crate::dataset::{Fixture, Match, RankingSnapshot, sort_chronologically};
use crate::elo::{EloConfig, EloFeatures, EloRegistry};
use crate::form::{DEFAULT_WINDOW, FormStats, FormTracker};
use crate::h2h::{H2hStats, H2hTally};
use crate::rankings::{RankingBook, RankingPair, join_backward};
use crate::squad::{SquadBook, SquadEntry, SquadFeatures};
use crate::travel::TravelEstimator;

pub const MODEL_FEATURE_COUNT: usize = 24;

/// Column order of every model input vector.
pub const MODEL_FEATURES: [&str; MODEL_FEATURE_COUNT] = [
    "home_rank",
    "away_rank",
    "home_points",
    "away_points",
    "home_form",
    "away_form",
    "home_weighted_form",
    "away_weighted_form",
    "home_goal_diff_form",
    "away_goal_diff_form",
    "rank_diff",
    "point_diff",
    "home_rank_momentum",
    "away_rank_momentum",
    "h2h_win_rate",
    "h2h_game_count",
    "is_home_adv",
    "is_neutral",
    "tournament_weight",
    "home_elo",
    "away_elo",
    "elo_diff",
    "home_travel_dist",
    "away_travel_dist",
];

pub type ModelInput = [f64; MODEL_FEATURE_COUNT];

/// One row of the feature table. Optional fields are empty in CSV when the
/// underlying history is missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub date: NaiveDate,
    pub home_team: String,
    pub away_team: String,
    pub home_score: Option<u32>,
    pub away_score: Option<u32>,
    pub tournament: String,
    pub city: String,
    pub country: String,
    pub neutral: bool,

    pub home_rank: Option<u32>,
    pub away_rank: Option<u32>,
    pub home_points: Option<f64>,
    pub away_points: Option<f64>,
    pub rank_diff: Option<i64>,
    pub point_diff: Option<f64>,
    pub home_rank_momentum: Option<i32>,
    pub away_rank_momentum: Option<i32>,

    pub home_form: Option<f64>,
    pub away_form: Option<f64>,
    pub home_weighted_form: Option<f64>,
    pub away_weighted_form: Option<f64>,
    pub home_goals_for: Option<f64>,
    pub home_goals_against: Option<f64>,
    pub away_goals_for: Option<f64>,
    pub away_goals_against: Option<f64>,
    pub home_goal_diff_form: Option<f64>,
    pub away_goal_diff_form: Option<f64>,

    pub h2h_win_rate: f64,
    pub h2h_game_count: u32,

    pub home_elo: f64,
    pub away_elo: f64,
    pub elo_diff: f64,

    pub home_travel_dist: f64,
    pub away_travel_dist: f64,

    pub home_squad_value: f64,
    pub away_squad_value: f64,
    pub home_squad_quality: f64,
    pub away_squad_quality: f64,
    pub log_home_value: f64,
    pub log_away_value: f64,
    pub value_diff: f64,
    pub value_ratio: f64,
    pub quality_diff: f64,

    pub is_home_adv: u8,
    pub is_neutral: u8,
    pub tournament_weight: f64,

    /// 0 home win, 1 draw, 2 away win; empty for fixtures.
    pub target: Option<u8>,
}

/// Where and what a match is, independent of the teams' form.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchContext {
    pub date: NaiveDate,
    pub tournament: String,
    pub city: String,
    pub country: String,
    pub neutral: bool,
}

/// One team's side of a feature row.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TeamSnapshot {
    pub rank: Option<u32>,
    pub points: Option<f64>,
    pub rank_momentum: Option<i32>,
    pub form: Option<f64>,
    pub weighted_form: Option<f64>,
    pub goals_for: Option<f64>,
    pub goals_against: Option<f64>,
    pub goal_diff_form: Option<f64>,
    pub elo: f64,
    pub squad: SquadEntry,
}

impl TeamSnapshot {
    fn from_parts(
        rank: Option<&RankingSnapshot>,
        form: Option<FormStats>,
        elo: f64,
        squad: SquadEntry,
    ) -> Self {
        Self {
            rank: rank.map(|r| r.rank),
            points: rank.map(|r| r.total_points),
            rank_momentum: rank.map(|r| r.rank_change),
            form: form.map(|f| f.points),
            weighted_form: form.map(|f| f.weighted_points),
            goals_for: form.map(|f| f.goals_for),
            goals_against: form.map(|f| f.goals_against),
            goal_diff_form: form.map(|f| f.goal_diff()),
            elo,
            squad,
        }
    }
}

impl FeatureRow {
    /// Builds a row from each side's snapshot. Scores and target stay empty.
    pub fn from_snapshots(
        home_team: &str,
        away_team: &str,
        home: &TeamSnapshot,
        away: &TeamSnapshot,
        h2h: H2hStats,
        ctx: &MatchContext,
        travel: &TravelEstimator,
    ) -> Self {
        let squad = SquadFeatures::new(home.squad, away.squad);
        Self {
            date: ctx.date,
            home_team: home_team.to_string(),
            away_team: away_team.to_string(),
            home_score: None,
            away_score: None,
            tournament: ctx.tournament.clone(),
            city: ctx.city.clone(),
            country: ctx.country.clone(),
            neutral: ctx.neutral,
            home_rank: home.rank,
            away_rank: away.rank,
            home_points: home.points,
            away_points: away.points,
            rank_diff: home.rank.zip(away.rank).map(|(h, a)| h as i64 - a as i64),
            point_diff: home.points.zip(away.points).map(|(h, a)| h - a),
            home_rank_momentum: home.rank_momentum,
            away_rank_momentum: away.rank_momentum,
            home_form: home.form,
            away_form: away.form,
            home_weighted_form: home.weighted_form,
            away_weighted_form: away.weighted_form,
            home_goals_for: home.goals_for,
            home_goals_against: home.goals_against,
            away_goals_for: away.goals_for,
            away_goals_against: away.goals_against,
            home_goal_diff_form: home.goal_diff_form,
            away_goal_diff_form: away.goal_diff_form,
            h2h_win_rate: h2h.win_rate,
            h2h_game_count: h2h.game_count,
            home_elo: home.elo,
            away_elo: away.elo,
            elo_diff: home.elo - away.elo,
            home_travel_dist: travel.distance_km(home_team, &ctx.city),
            away_travel_dist: travel.distance_km(away_team, &ctx.city),
            home_squad_value: squad.home_squad_value,
            away_squad_value: squad.away_squad_value,
            home_squad_quality: squad.home_squad_quality,
            away_squad_quality: squad.away_squad_quality,
            log_home_value: squad.log_home_value,
            log_away_value: squad.log_away_value,
            value_diff: squad.value_diff,
            value_ratio: squad.value_ratio,
            quality_diff: squad.quality_diff,
            is_home_adv: is_home_advantage(home_team, &ctx.country) as u8,
            is_neutral: ctx.neutral as u8,
            tournament_weight: tournament_weight(&ctx.tournament),
            target: None,
        }
    }

    /// The side of this row played by `team`, if it played.
    pub fn side(&self, team: &str) -> Option<TeamSnapshot> {
        if self.home_team == team {
            Some(TeamSnapshot {
                rank: self.home_rank,
                points: self.home_points,
                rank_momentum: self.home_rank_momentum,
                form: self.home_form,
                weighted_form: self.home_weighted_form,
                goals_for: self.home_goals_for,
                goals_against: self.home_goals_against,
                goal_diff_form: self.home_goal_diff_form,
                elo: self.home_elo,
                squad: SquadEntry {
                    value: self.home_squad_value,
                    quality: self.home_squad_quality,
                },
            })
        } else if self.away_team == team {
            Some(TeamSnapshot {
                rank: self.away_rank,
                points: self.away_points,
                rank_momentum: self.away_rank_momentum,
                form: self.away_form,
                weighted_form: self.away_weighted_form,
                goals_for: self.away_goals_for,
                goals_against: self.away_goals_against,
                goal_diff_form: self.away_goal_diff_form,
                elo: self.away_elo,
                squad: SquadEntry {
                    value: self.away_squad_value,
                    quality: self.away_squad_quality,
                },
            })
        } else {
            None
        }
    }

    /// Model inputs in `MODEL_FEATURES` order, or `None` if any is missing.
    pub fn model_input(&self) -> Option<ModelInput> {
        let input = [
            self.home_rank? as f64,
            self.away_rank? as f64,
            self.home_points?,
            self.away_points?,
            self.home_form?,
            self.away_form?,
            self.home_weighted_form?,
            self.away_weighted_form?,
            self.home_goal_diff_form?,
            self.away_goal_diff_form?,
            self.rank_diff? as f64,
            self.point_diff?,
            self.home_rank_momentum? as f64,
            self.away_rank_momentum? as f64,
            self.h2h_win_rate,
            self.h2h_game_count as f64,
            self.is_home_adv as f64,
            self.is_neutral as f64,
            self.tournament_weight,
            self.home_elo,
            self.away_elo,
            self.elo_diff,
            self.home_travel_dist,
            self.away_travel_dist,
        ];
        input.iter().all(|v| v.is_finite()).then_some(input)
    }

    fn missing_form(&self) -> bool {
        self.home_form.is_none()
            || self.away_form.is_none()
            || self.home_weighted_form.is_none()
            || self.away_weighted_form.is_none()
            || self.home_goal_diff_form.is_none()
            || self.away_goal_diff_form.is_none()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DropCounts {
    pub total: usize,
    pub ready: usize,
    pub dropped: usize,
    /// Per-reason counts; one row can count under several reasons.
    pub missing_home_rank: usize,
    pub missing_away_rank: usize,
    pub missing_form: usize,
}

/// Rows usable as model input, with their input vectors.
#[derive(Debug, Clone, Default)]
pub struct ModelReady<'a> {
    pub rows: Vec<&'a FeatureRow>,
    pub inputs: Vec<ModelInput>,
    pub drops: DropCounts,
}

pub fn model_ready(rows: &[FeatureRow]) -> ModelReady<'_> {
    let mut out = ModelReady::default();
    out.drops.total = rows.len();
    for row in rows {
        if let Some(input) = row.model_input() {
            out.rows.push(row);
            out.inputs.push(input);
            continue;
        }
        out.drops.dropped += 1;
        if row.home_rank.is_none() {
            out.drops.missing_home_rank += 1;
        }
        if row.away_rank.is_none() {
            out.drops.missing_away_rank += 1;
        }
        if row.missing_form() {
            out.drops.missing_form += 1;
        }
    }
    out.drops.ready = out.rows.len();
    out
}

#[derive(Debug, Clone, Copy)]
pub struct FeatureConfig {
    pub rolling_window: usize,
    pub elo: EloConfig,
    pub travel: TravelEstimator,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            rolling_window: DEFAULT_WINDOW,
            elo: EloConfig::default(),
            travel: TravelEstimator::default(),
        }
    }
}

/// Owns every piece of sequential state the rows depend on.
#[derive(Debug, Clone)]
pub struct FeatureBuilder {
    rankings: RankingBook,
    form: FormTracker,
    h2h: H2hTally,
    elo: EloRegistry,
    travel: TravelEstimator,
    squads: SquadBook,
    history_end: Option<NaiveDate>,
    ingested: usize,
}

impl FeatureBuilder {
    pub fn new(rankings: RankingBook, cfg: FeatureConfig) -> Self {
        Self {
            rankings,
            form: FormTracker::new(cfg.rolling_window),
            h2h: H2hTally::new(),
            elo: EloRegistry::new(cfg.elo),
            travel: cfg.travel,
            squads: SquadBook::absent(),
            history_end: None,
            ingested: 0,
        }
    }

    pub fn rankings(&self) -> &RankingBook {
        &self.rankings
    }

    pub fn elo(&self) -> &EloRegistry {
        &self.elo
    }

    /// Replaces the neutral squad values used by default.
    pub fn with_squads(mut self, squads: SquadBook) -> Self {
        self.squads = squads;
        self
    }

    /// Date of the last ingested match.
    pub fn history_end(&self) -> Option<NaiveDate> {
        self.history_end
    }

    /// Featurizes `matches` in (date, seq) order and folds them into the state.
    /// Later calls must continue after the dates already ingested.
    pub fn ingest_history(&mut self, matches: &[Match]) -> Result<Vec<FeatureRow>> {
        let mut ordered = matches.to_vec();
        sort_chronologically(&mut ordered);

        if let (Some(end), Some(first)) = (self.history_end, ordered.first())
            && first.date <= end
        {
            bail!(
                "history batch starts {} but matches up to {end} were already ingested",
                first.date
            );
        }

        let joined = join_backward(&self.rankings, &ordered);
        let mut rows = Vec::with_capacity(ordered.len());
        let mut start = 0;
        while start < ordered.len() {
            let date = ordered[start].date;
            let end = start + ordered[start..].partition_point(|m| m.date == date);
            let batch = &ordered[start..end];

            for (m, ranks) in batch.iter().zip(&joined[start..end]) {
                let elo = self.elo.apply(m);
                let row = self.assemble(
                    m,
                    ranks,
                    elo,
                    self.h2h.stats(&m.home_team, &m.away_team),
                );
                rows.push(row);
            }
            for m in batch {
                self.form.record_match(m);
                self.h2h.record(m);
            }
            start = end;
        }

        if let Some(last) = ordered.last() {
            self.history_end = Some(last.date);
        }
        self.ingested += ordered.len();
        info!(
            rows = rows.len(),
            total_ingested = self.ingested,
            rated_teams = self.elo.len(),
            h2h_pairs = self.h2h.pair_count(),
            "assembled history features"
        );
        Ok(rows)
    }

    fn assemble(
        &self,
        m: &Match,
        ranks: &RankingPair<'_>,
        elo: EloFeatures,
        h2h: H2hStats,
    ) -> FeatureRow {
        let home = TeamSnapshot::from_parts(
            ranks.home,
            self.form.form(&m.home_team),
            elo.home_elo,
            self.squads.entry(&m.home_team),
        );
        let away = TeamSnapshot::from_parts(
            ranks.away,
            self.form.form(&m.away_team),
            elo.away_elo,
            self.squads.entry(&m.away_team),
        );
        let ctx = MatchContext {
            date: m.date,
            tournament: m.tournament.clone(),
            city: m.city.clone(),
            country: m.country.clone(),
            neutral: m.neutral,
        };
        let mut row = FeatureRow::from_snapshots(
            &m.home_team,
            &m.away_team,
            &home,
            &away,
            h2h,
            &ctx,
            &self.travel,
        );
        row.home_score = Some(m.home_score);
        row.away_score = Some(m.away_score);
        row.target = Some(m.outcome().target());
        row
    }

    /// Features for an unplayed match from the state after all ingested
    /// history, with rankings as of the fixture date.
    pub fn featurize_fixture(&self, fixture: &Fixture) -> FeatureRow {
        if let Some(end) = self.history_end
            && fixture.date < end
        {
            warn!(
                date = %fixture.date,
                history_end = %end,
                home = %fixture.home_team,
                away = %fixture.away_team,
                "fixture predates ingested history"
            );
        }
        let country = fixture.country.clone().unwrap_or_default();
        let neutral = fixture
            .neutral
            .unwrap_or_else(|| country != fixture.home_team);
        let ctx = MatchContext {
            date: fixture.date,
            tournament: fixture.tournament.clone(),
            city: fixture.city.clone(),
            country,
            neutral,
        };
        let home = self.current_snapshot(&fixture.home_team, fixture.date);
        let away = self.current_snapshot(&fixture.away_team, fixture.date);
        FeatureRow::from_snapshots(
            &fixture.home_team,
            &fixture.away_team,
            &home,
            &away,
            self.h2h.stats(&fixture.home_team, &fixture.away_team),
            &ctx,
            &self.travel,
        )
    }

    fn current_snapshot(&self, team: &str, date: NaiveDate) -> TeamSnapshot {
        TeamSnapshot::from_parts(
            self.rankings.latest_at(team, date),
            self.form.form(team),
            self.elo.rating(team),
            self.squads.entry(team),
        )
    }
}

pub fn write_feature_table(path: &Path, rows: &[FeatureRow]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create dir {}", parent.display()))?;
    }
    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    write_features(file, rows).with_context(|| format!("write features {}", path.display()))?;
    info!(rows = rows.len(), path = %path.display(), "wrote feature table");
    Ok(())
}

pub fn read_feature_table(path: &Path) -> Result<Vec<FeatureRow>> {
    let file = File::open(path).with_context(|| format!("open features {}", path.display()))?;
    read_features(file).with_context(|| format!("read features {}", path.display()))
}

pub fn write_features<W: Write>(writer: W, rows: &[FeatureRow]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn read_features<R: Read>(reader: R) -> Result<Vec<FeatureRow>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut out = Vec::new();
    for (line, row) in rdr.deserialize::<FeatureRow>().enumerate() {
        out.push(row.with_context(|| format!("decode feature row {}", line + 1))?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn game(seq: usize, date: NaiveDate, home: &str, away: &str, hs: u32, aws: u32) -> Match {
        Match {
            seq,
            date,
            home_team: home.to_string(),
            away_team: away.to_string(),
            home_score: hs,
            away_score: aws,
            tournament: "Friendly".to_string(),
            city: "Rabat".to_string(),
            country: home.to_string(),
            neutral: false,
        }
    }

    fn snap(date: NaiveDate, team: &str, rank: u32) -> RankingSnapshot {
        RankingSnapshot {
            rank_date: date,
            team: team.to_string(),
            rank,
            total_points: 1600.0 - rank as f64,
            rank_change: 1,
        }
    }

    fn builder() -> FeatureBuilder {
        let book = RankingBook::new(vec![
            snap(d(2022, 1, 1), "Morocco", 12),
            snap(d(2022, 1, 1), "Senegal", 18),
        ]);
        FeatureBuilder::new(book, FeatureConfig::default())
    }

    #[test]
    fn first_appearance_has_no_form() {
        let mut b = builder();
        let rows = b
            .ingest_history(&[game(0, d(2022, 3, 1), "Morocco", "Senegal", 1, 0)])
            .unwrap();
        assert_eq!(rows[0].home_rank, Some(12));
        assert_eq!(rows[0].rank_diff, Some(-6));
        assert!(rows[0].home_form.is_none());
        assert_eq!(rows[0].target, Some(0));
        assert_eq!(rows[0].is_home_adv, 1);
        assert!(rows[0].model_input().is_none());
    }

    #[test]
    fn same_day_matches_do_not_see_each_other() {
        let mut b = builder();
        let day = d(2022, 3, 1);
        let rows = b
            .ingest_history(&[
                game(0, day, "Morocco", "Senegal", 3, 0),
                game(1, day, "Senegal", "Morocco", 0, 2),
            ])
            .unwrap();
        assert!(rows[1].home_form.is_none());
        assert_eq!(rows[1].h2h_game_count, 0);
        // Elo is sequential within the day.
        assert!(rows[1].away_elo > 1500.0);
    }

    #[test]
    fn later_batches_must_move_forward() {
        let mut b = builder();
        b.ingest_history(&[game(0, d(2022, 3, 1), "Morocco", "Senegal", 1, 0)])
            .unwrap();
        assert!(
            b.ingest_history(&[game(1, d(2022, 2, 1), "Morocco", "Senegal", 1, 0)])
                .is_err()
        );
    }

    #[test]
    fn fixture_uses_post_history_state_without_mutating() {
        let mut b = builder();
        b.ingest_history(&[
            game(0, d(2022, 3, 1), "Morocco", "Senegal", 1, 0),
            game(1, d(2022, 6, 1), "Senegal", "Morocco", 1, 1),
        ])
        .unwrap();
        let fixture = Fixture {
            date: d(2023, 1, 1),
            home_team: "Morocco".to_string(),
            away_team: "Senegal".to_string(),
            city: "Rabat".to_string(),
            tournament: "African Cup of Nations".to_string(),
            country: Some("Morocco".to_string()),
            neutral: None,
        };
        let row = b.featurize_fixture(&fixture);
        let again = b.featurize_fixture(&fixture);
        assert_eq!(row, again);
        assert_eq!(row.h2h_game_count, 2);
        assert_eq!(row.is_neutral, 0);
        assert_eq!(row.is_home_adv, 1);
        assert_eq!(row.tournament_weight, 8.0);
        assert!(row.target.is_none());
        assert!(row.model_input().is_some());
        assert_eq!(row.home_travel_dist, 0.0);
    }

    #[test]
    fn drop_counts_name_each_reason() {
        let mut b = builder();
        let rows = b
            .ingest_history(&[
                game(0, d(2021, 6, 1), "Morocco", "Senegal", 1, 0),
                game(1, d(2022, 3, 1), "Morocco", "Senegal", 1, 0),
                game(2, d(2022, 4, 1), "Morocco", "Senegal", 2, 2),
            ])
            .unwrap();
        let ready = model_ready(&rows);
        assert_eq!(ready.drops.total, 3);
        assert_eq!(ready.drops.ready, 2);
        assert_eq!(ready.drops.dropped, 1);
        assert_eq!(ready.drops.missing_home_rank, 1);
        assert_eq!(ready.drops.missing_form, 1);
        assert_eq!(ready.inputs.len(), ready.rows.len());
    }

    #[test]
    fn squad_columns_follow_the_book() {
        let match_day = [game(0, d(2022, 3, 1), "Morocco", "Senegal", 1, 0)];
        let neutral = builder().ingest_history(&match_day).unwrap();
        assert_eq!(neutral[0].home_squad_value, 50.0);
        assert_eq!(neutral[0].away_squad_value, 50.0);
        assert_eq!(neutral[0].value_diff, 0.0);

        let squads = SquadBook::new([(
            "Morocco".to_string(),
            SquadEntry {
                value: 380.0,
                quality: 19.0,
            },
        )]);
        let rows = builder()
            .with_squads(squads)
            .ingest_history(&match_day)
            .unwrap();
        assert_eq!(rows[0].home_squad_value, 380.0);
        assert_eq!(rows[0].away_squad_value, 10.0);
        assert_eq!(rows[0].quality_diff, 19.0);
        assert_eq!(rows[0].side("Senegal").unwrap().squad.value, 10.0);
    }

    #[test]
    fn feature_table_survives_csv() {
        let mut b = builder();
        let rows = b
            .ingest_history(&[
                game(0, d(2022, 3, 1), "Morocco", "Senegal", 1, 0),
                game(1, d(2022, 4, 1), "Senegal", "Morocco", 2, 1),
            ])
            .unwrap();
        let mut buf = Vec::new();
        write_features(&mut buf, &rows).unwrap();
        let back = read_features(buf.as_slice()).unwrap();
        assert_eq!(back.len(), rows.len());
        assert_eq!(back[0].home_form, None);
        assert_eq!(back[1].home_rank, rows[1].home_rank);
        assert_eq!(back[1].target, Some(0));
    }
}
