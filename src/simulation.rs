//! Monte-Carlo knockout bracket.
//!
//! Every pairing that can occur is priced once up front; playouts only sample.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::calibration::Prob3;
use crate::classifier::{OutcomeModel, predict_checked, validate_probs};
use crate::features::{FeatureRow, MatchContext, ModelInput, TeamSnapshot};
use crate::h2h::{H2hStats, H2hTally};
use crate::team_names::normalize_team_name;
use crate::travel::TravelEstimator;

pub const DEFAULT_RUNS: usize = 10_000;

/// Prior used when a pair cannot be featurized.
pub const FALLBACK_PROBS: Prob3 = Prob3 {
    home: 0.33,
    draw: 0.34,
    away: 0.33,
};

pub const ROUND_COUNT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Round {
    RoundOf16,
    QuarterFinal,
    SemiFinal,
    Final,
    Champion,
}

impl Round {
    pub const ALL: [Round; ROUND_COUNT] = [
        Round::RoundOf16,
        Round::QuarterFinal,
        Round::SemiFinal,
        Round::Final,
        Round::Champion,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn next(self) -> Round {
        match self {
            Round::RoundOf16 => Round::QuarterFinal,
            Round::QuarterFinal => Round::SemiFinal,
            Round::SemiFinal => Round::Final,
            Round::Final | Round::Champion => Round::Champion,
        }
    }

    /// Teams still alive in this round.
    pub fn slots(self) -> usize {
        match self {
            Round::RoundOf16 => 16,
            Round::QuarterFinal => 8,
            Round::SemiFinal => 4,
            Round::Final => 2,
            Round::Champion => 1,
        }
    }

    fn for_field(teams: usize) -> Option<Round> {
        Round::ALL.into_iter().find(|r| r.slots() == teams && *r != Round::Champion)
    }

    pub fn label(self) -> &'static str {
        match self {
            Round::RoundOf16 => "round_of_16",
            Round::QuarterFinal => "quarterfinal",
            Round::SemiFinal => "semifinal",
            Round::Final => "final",
            Round::Champion => "champion",
        }
    }
}

/// First-round pairings in bracket order. Winners of adjacent pairings meet.
#[derive(Debug, Clone, PartialEq)]
pub struct Bracket {
    teams: Vec<String>,
    first_round: Round,
}

#[derive(Debug, Deserialize)]
struct BracketRow {
    home_team: String,
    away_team: String,
}

impl Bracket {
    pub fn new(pairings: Vec<(String, String)>) -> Result<Self> {
        let teams: Vec<String> = pairings.into_iter().flat_map(|(h, a)| [h, a]).collect();
        let Some(first_round) = Round::for_field(teams.len()) else {
            bail!(
                "bracket needs 1, 2, 4 or 8 pairings, got {}",
                teams.len() / 2
            );
        };
        let mut seen = HashSet::new();
        for team in &teams {
            if team.trim().is_empty() {
                bail!("bracket has an empty team name");
            }
            if !seen.insert(team.as_str()) {
                bail!("{team} appears twice in the bracket");
            }
        }
        Ok(Self { teams, first_round })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("open bracket {}", path.display()))?;
        Self::read(file).with_context(|| format!("read bracket {}", path.display()))
    }

    pub fn read<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(reader);
        let mut pairings = Vec::new();
        for (line, row) in rdr.deserialize::<BracketRow>().enumerate() {
            let row = row.with_context(|| format!("decode bracket row {}", line + 1))?;
            pairings.push((
                normalize_team_name(&row.home_team),
                normalize_team_name(&row.away_team),
            ));
        }
        Self::new(pairings)
    }

    /// Participants in slot order.
    pub fn teams(&self) -> &[String] {
        &self.teams
    }

    pub fn first_round(&self) -> Round {
        self.first_round
    }
}

/// Latest known state per team plus the head-to-head record, taken from a
/// historical feature table.
#[derive(Debug, Clone, Default)]
pub struct HistorySnapshots {
    latest: HashMap<String, (NaiveDate, TeamSnapshot)>,
    h2h: H2hTally,
    last_date: Option<NaiveDate>,
}

impl HistorySnapshots {
    /// Later rows win ties on date.
    pub fn from_rows(rows: &[FeatureRow]) -> Self {
        let mut out = Self::default();
        for row in rows {
            for team in [&row.home_team, &row.away_team] {
                let Some(snap) = row.side(team) else {
                    continue;
                };
                let newer = out
                    .latest
                    .get(team.as_str())
                    .is_none_or(|(date, _)| row.date >= *date);
                if newer {
                    out.latest.insert(team.clone(), (row.date, snap));
                }
            }
            if let (Some(hs), Some(aws)) = (row.home_score, row.away_score) {
                out.h2h.record_result(&row.home_team, &row.away_team, hs, aws);
            }
            out.last_date = out.last_date.max(Some(row.date));
        }
        out
    }

    pub fn snapshot(&self, team: &str) -> Option<&TeamSnapshot> {
        self.latest.get(team).map(|(_, snap)| snap)
    }

    pub fn h2h(&self, home: &str, away: &str) -> H2hStats {
        self.h2h.stats(home, away)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.last_date
    }

    pub fn team_count(&self) -> usize {
        self.latest.len()
    }
}

/// Venue and competition shared by every simulated match.
#[derive(Debug, Clone)]
pub struct TournamentContext {
    pub date: NaiveDate,
    pub tournament: String,
    pub host_country: String,
    pub host_city: String,
    pub travel: TravelEstimator,
}

impl TournamentContext {
    fn match_context(&self, home: &str) -> MatchContext {
        MatchContext {
            date: self.date,
            tournament: self.tournament.clone(),
            city: self.host_city.clone(),
            country: self.host_country.clone(),
            neutral: home != self.host_country,
        }
    }

    /// Model row for `home` against `away`, or `None` when either side lacks history.
    pub fn pair_row(&self, history: &HistorySnapshots, home: &str, away: &str) -> Option<FeatureRow> {
        let home_snap = history.snapshot(home)?;
        let away_snap = history.snapshot(away)?;
        Some(FeatureRow::from_snapshots(
            home,
            away,
            home_snap,
            away_snap,
            history.h2h(home, away),
            &self.match_context(home),
            &self.travel,
        ))
    }
}

/// Outcome triple for every unordered pair of bracket participants, stored
/// from the earlier slot's perspective. A pair involving the host nation is
/// priced with the host at home whichever slot it occupies.
#[derive(Debug, Clone)]
pub struct PairwiseTable {
    teams: Vec<String>,
    probs: Vec<Prob3>,
    fallback_pairs: usize,
}

impl PairwiseTable {
    /// Prices every pair with one batched model call.
    pub fn build(
        bracket: &Bracket,
        history: &HistorySnapshots,
        ctx: &TournamentContext,
        model: &dyn OutcomeModel,
    ) -> Result<Self> {
        let teams = bracket.teams().to_vec();
        let n = teams.len();
        let mut probs = vec![FALLBACK_PROBS; n * n];
        // (earlier slot, later slot, host priced from the later slot)
        let mut pending: Vec<(usize, usize, bool)> = Vec::new();
        let mut inputs: Vec<ModelInput> = Vec::new();
        let mut fallback_pairs = 0usize;

        for i in 0..n {
            for j in (i + 1)..n {
                let host_later = teams[j] == ctx.host_country;
                let (home, away) = if host_later {
                    (&teams[j], &teams[i])
                } else {
                    (&teams[i], &teams[j])
                };
                match ctx.pair_row(history, home, away).and_then(|r| r.model_input()) {
                    Some(input) => {
                        pending.push((i, j, host_later));
                        inputs.push(input);
                    }
                    None => {
                        fallback_pairs += 1;
                        warn!(%home, %away, "no usable history; using uniform prior");
                    }
                }
            }
        }

        let predicted = predict_checked(model, &inputs).context("price bracket pairs")?;
        for ((i, j, host_later), p) in pending.into_iter().zip(predicted) {
            let p = if host_later { p.swapped() } else { p };
            debug!(
                home = %teams[i],
                away = %teams[j],
                host_later,
                p_home = p.home,
                p_draw = p.draw,
                p_away = p.away,
                "priced pair"
            );
            probs[i * n + j] = p;
        }

        info!(
            teams = n,
            history_teams = history.team_count(),
            priced = inputs.len(),
            fallback_pairs,
            model = model.name(),
            "built pairwise table"
        );
        Ok(Self {
            teams,
            probs,
            fallback_pairs,
        })
    }

    /// Prices pairs with `price(home, away)`; every triple is validated.
    pub fn from_fn(
        bracket: &Bracket,
        mut price: impl FnMut(&str, &str) -> Prob3,
    ) -> Result<Self> {
        let teams = bracket.teams().to_vec();
        let n = teams.len();
        let mut probs = vec![FALLBACK_PROBS; n * n];
        for i in 0..n {
            for j in (i + 1)..n {
                let p = price(&teams[i], &teams[j]);
                validate_probs(&p).with_context(|| format!("{} vs {}", teams[i], teams[j]))?;
                probs[i * n + j] = p;
            }
        }
        Ok(Self {
            teams,
            probs,
            fallback_pairs: 0,
        })
    }

    pub fn teams(&self) -> &[String] {
        &self.teams
    }

    pub fn len(&self) -> usize {
        self.teams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.teams.is_empty()
    }

    pub fn fallback_pairs(&self) -> usize {
        self.fallback_pairs
    }

    /// Triple with slot `home` as the home side.
    pub fn get(&self, home: usize, away: usize) -> Prob3 {
        let n = self.teams.len();
        if home < away {
            self.probs[home * n + away]
        } else {
            self.probs[away * n + home].swapped()
        }
    }

    pub fn lookup(&self, home: &str, away: &str) -> Option<Prob3> {
        let h = self.teams.iter().position(|t| t == home)?;
        let a = self.teams.iter().position(|t| t == away)?;
        (h != a).then(|| self.get(h, a))
    }
}

/// Winner of one knockout match. Draws go to a coin flip.
pub fn play_match(p: Prob3, rng: &mut impl Rng) -> bool {
    let u: f64 = rng.gen_range(0.0..1.0);
    if u < p.home {
        true
    } else if u < p.home + p.draw {
        rng.gen_bool(0.5)
    } else {
        false
    }
}

/// One playout. Returns the furthest round reached by each slot.
pub fn play_bracket(table: &PairwiseTable, first_round: Round, rng: &mut impl Rng) -> Vec<Round> {
    // Field sizes are powers of two, so every chunk below is a full pair.
    let mut furthest = vec![first_round; table.len()];
    let mut alive: Vec<usize> = (0..table.len()).collect();
    let mut round = first_round;
    while alive.len() > 1 {
        let next = round.next();
        alive = alive
            .chunks(2)
            .map(|pair| {
                let (home, away) = (pair[0], pair[1]);
                let winner = if play_match(table.get(home, away), rng) {
                    home
                } else {
                    away
                };
                furthest[winner] = next;
                winner
            })
            .collect();
        round = next;
    }
    furthest
}

#[derive(Debug, Clone, Copy)]
pub struct SimulationConfig {
    pub runs: usize,
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            runs: DEFAULT_RUNS,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvancementRow {
    pub team: String,
    pub quarterfinal: f64,
    pub semifinal: f64,
    #[serde(rename = "final")]
    pub final_: f64,
    pub champion: f64,
}

#[derive(Debug, Clone)]
pub struct SimulationReport {
    pub runs: usize,
    pub base_seed: u64,
    /// False when no seed was configured.
    pub reproducible: bool,
    pub first_round: Round,
    pub teams: Vec<String>,
    /// Runs in which each team (slot order) reached each round. Rounds before
    /// the bracket's first round count as reached.
    pub reached: Vec<[u64; ROUND_COUNT]>,
    /// Sorted by title probability, best first.
    pub advancement: Vec<AdvancementRow>,
}

impl SimulationReport {
    pub fn reach_count(&self, team: &str, round: Round) -> Option<u64> {
        let idx = self.teams.iter().position(|t| t == team)?;
        Some(self.reached[idx][round.index()])
    }
}

pub fn simulate(
    bracket: &Bracket,
    table: &PairwiseTable,
    cfg: &SimulationConfig,
) -> Result<SimulationReport> {
    if table.teams() != bracket.teams() {
        bail!("pairwise table does not cover this bracket");
    }
    if cfg.runs == 0 {
        bail!("simulation needs at least one run");
    }
    let (base_seed, reproducible) = match cfg.seed {
        Some(seed) => (seed, true),
        None => {
            let seed = rand::random::<u64>();
            warn!(base_seed = seed, "no seed configured; results are not reproducible");
            (seed, false)
        }
    };

    let n = table.len();
    let first_round = bracket.first_round();
    let reached = (0..cfg.runs as u64)
        .into_par_iter()
        .fold(
            || vec![[0u64; ROUND_COUNT]; n],
            |mut acc, run| {
                let mut rng = StdRng::seed_from_u64(base_seed.wrapping_add(run));
                for (slot, furthest) in play_bracket(table, first_round, &mut rng)
                    .into_iter()
                    .enumerate()
                {
                    for r in 0..=furthest.index() {
                        acc[slot][r] += 1;
                    }
                }
                acc
            },
        )
        .reduce(
            || vec![[0u64; ROUND_COUNT]; n],
            |mut a, b| {
                for (x, y) in a.iter_mut().zip(b) {
                    for r in 0..ROUND_COUNT {
                        x[r] += y[r];
                    }
                }
                a
            },
        );

    let total = cfg.runs as f64;
    let mut advancement: Vec<AdvancementRow> = table
        .teams()
        .iter()
        .zip(&reached)
        .map(|(team, counts)| AdvancementRow {
            team: team.clone(),
            quarterfinal: counts[Round::QuarterFinal.index()] as f64 / total,
            semifinal: counts[Round::SemiFinal.index()] as f64 / total,
            final_: counts[Round::Final.index()] as f64 / total,
            champion: counts[Round::Champion.index()] as f64 / total,
        })
        .collect();
    advancement.sort_by(|a, b| {
        b.champion
            .total_cmp(&a.champion)
            .then_with(|| b.final_.total_cmp(&a.final_))
            .then_with(|| a.team.cmp(&b.team))
    });

    if let Some(top) = advancement.first() {
        info!(
            runs = cfg.runs,
            base_seed,
            favourite = %top.team,
            title_prob = top.champion,
            "simulation finished"
        );
    }

    Ok(SimulationReport {
        runs: cfg.runs,
        base_seed,
        reproducible,
        first_round,
        teams: table.teams().to_vec(),
        reached,
        advancement,
    })
}

pub fn write_advancement(path: &Path, rows: &[AdvancementRow]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create dir {}", parent.display()))?;
    }
    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    write_advancement_to(file, rows)
        .with_context(|| format!("write simulation {}", path.display()))?;
    info!(rows = rows.len(), path = %path.display(), "wrote simulation results");
    Ok(())
}

pub fn write_advancement_to<W: Write>(writer: W, rows: &[AdvancementRow]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bracket(n_pairs: usize) -> Bracket {
        let pairings = (0..n_pairs)
            .map(|i| (format!("T{}", 2 * i), format!("T{}", 2 * i + 1)))
            .collect();
        Bracket::new(pairings).unwrap()
    }

    #[test]
    fn bracket_size_sets_first_round() {
        assert_eq!(bracket(8).first_round(), Round::RoundOf16);
        assert_eq!(bracket(4).first_round(), Round::QuarterFinal);
        assert_eq!(bracket(1).first_round(), Round::Final);
        assert!(Bracket::new(vec![("A".into(), "B".into()); 3]).is_err());
        assert!(Bracket::new(vec![("A".into(), "B".into()), ("B".into(), "C".into())]).is_err());
    }

    #[test]
    fn table_reads_from_either_side() {
        let b = bracket(2);
        let table = PairwiseTable::from_fn(&b, |_, _| Prob3::new(0.6, 0.3, 0.1)).unwrap();
        assert_eq!(table.get(0, 3), Prob3::new(0.6, 0.3, 0.1));
        assert_eq!(table.get(3, 0), Prob3::new(0.1, 0.3, 0.6));
        assert_eq!(table.lookup("T3", "T0"), Some(Prob3::new(0.1, 0.3, 0.6)));
        assert!(PairwiseTable::from_fn(&b, |_, _| Prob3::new(0.6, 0.6, 0.1)).is_err());
    }

    #[test]
    fn certain_winner_always_advances() {
        let b = bracket(4);
        let table = PairwiseTable::from_fn(&b, |home, _| {
            if home == "T0" {
                Prob3::new(1.0, 0.0, 0.0)
            } else {
                Prob3::new(0.4, 0.2, 0.4)
            }
        })
        .unwrap();
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..50 {
            let furthest = play_bracket(&table, Round::QuarterFinal, &mut rng);
            assert_eq!(furthest[0], Round::Champion);
            assert_eq!(furthest.iter().filter(|r| **r == Round::Champion).count(), 1);
        }
    }

    #[test]
    fn draws_split_evenly_on_penalties() {
        let mut rng = StdRng::seed_from_u64(3);
        let p = Prob3::new(0.0, 1.0, 0.0);
        let home_wins = (0..4000).filter(|_| play_match(p, &mut rng)).count();
        assert!((1800..2200).contains(&home_wins), "{home_wins}");
    }

    #[test]
    fn unseeded_runs_are_flagged() {
        let b = bracket(1);
        let table = PairwiseTable::from_fn(&b, |_, _| Prob3::new(0.5, 0.0, 0.5)).unwrap();
        let report = simulate(&b, &table, &SimulationConfig { runs: 10, seed: None }).unwrap();
        assert!(!report.reproducible);
        let report = simulate(&b, &table, &SimulationConfig { runs: 10, seed: Some(1) }).unwrap();
        assert!(report.reproducible);
        assert_eq!(report.reach_count("T0", Round::Final), Some(10));
    }

    #[test]
    fn zero_runs_rejected() {
        let b = bracket(1);
        let table = PairwiseTable::from_fn(&b, |_, _| Prob3::uniform()).unwrap();
        assert!(simulate(&b, &table, &SimulationConfig { runs: 0, seed: Some(1) }).is_err());
    }
}
