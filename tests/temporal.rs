use approx::assert_relative_eq;
use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use afcon_forecast::dataset::{Match, RankingSnapshot};
use afcon_forecast::elo::{EloConfig, EloRegistry};
use afcon_forecast::features::{FeatureBuilder, FeatureConfig, FeatureRow};
use afcon_forecast::h2h::{H2hTally, h2h_scan};
use afcon_forecast::rankings::RankingBook;

const TEAMS: [&str; 6] = ["Morocco", "Senegal", "Egypt", "Nigeria", "Ghana", "Mali"];
const TOURNAMENTS: [&str; 4] = [
    "Friendly",
    "African Cup of Nations",
    "FIFA World Cup qualification",
    "COSAFA Cup",
];

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2018, 1, 1).unwrap()
}

/// Random history with several matches on some days.
fn history(seed: u64, n: usize) -> Vec<Match> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut date = start();
    (0..n)
        .map(|seq| {
            if rng.gen_bool(0.6) {
                date += Duration::days(rng.gen_range(1..20));
            }
            let h = rng.gen_range(0..TEAMS.len());
            let mut a = rng.gen_range(0..TEAMS.len() - 1);
            if a >= h {
                a += 1;
            }
            Match {
                seq,
                date,
                home_team: TEAMS[h].to_string(),
                away_team: TEAMS[a].to_string(),
                home_score: rng.gen_range(0..4),
                away_score: rng.gen_range(0..4),
                tournament: TOURNAMENTS[rng.gen_range(0..TOURNAMENTS.len())].to_string(),
                city: "Casablanca".to_string(),
                country: TEAMS[h].to_string(),
                neutral: rng.gen_bool(0.2),
            }
        })
        .collect()
}

fn rankings(until: NaiveDate) -> Vec<RankingSnapshot> {
    let mut out = Vec::new();
    let mut date = start() - Duration::days(30);
    let mut round = 0u32;
    while date <= until {
        for (i, team) in TEAMS.iter().enumerate() {
            out.push(RankingSnapshot {
                rank_date: date,
                team: team.to_string(),
                rank: 10 + ((i as u32 * 7 + round) % 40),
                total_points: 1400.0 + (i as f64) * 10.0 + round as f64,
                rank_change: (round % 3) as i32 - 1,
            });
        }
        date += Duration::days(45);
        round += 1;
    }
    out
}

fn build(matches: &[Match], snaps: Vec<RankingSnapshot>) -> Vec<FeatureRow> {
    let mut builder = FeatureBuilder::new(RankingBook::new(snaps), FeatureConfig::default());
    builder.ingest_history(matches).unwrap()
}

#[test]
fn future_records_do_not_change_past_features() {
    let matches = history(7, 300);
    let cutoff = matches[150].date;
    let end = matches.last().unwrap().date;
    let full = build(&matches, rankings(end));

    let past: Vec<Match> = matches.iter().filter(|m| m.date <= cutoff).cloned().collect();
    let past_rows = build(&past, rankings(cutoff));
    assert_eq!(past_rows.as_slice(), &full[..past.len()]);

    // Mutated future results and extra future matches leave the past alone.
    let mut mutated = matches.clone();
    for m in mutated.iter_mut().filter(|m| m.date > cutoff) {
        std::mem::swap(&mut m.home_score, &mut m.away_score);
        m.home_score += 2;
    }
    let last = mutated.last().unwrap().clone();
    mutated.push(Match {
        seq: last.seq + 1,
        date: last.date + Duration::days(3),
        ..last
    });
    let mutated_rows = build(&mutated, rankings(end + Duration::days(90)));
    assert_eq!(&mutated_rows[..past.len()], &full[..past.len()]);
}

#[test]
fn form_uses_only_strictly_earlier_dates() {
    let matches = history(11, 200);
    let rows = build(&matches, rankings(matches.last().unwrap().date));
    for (i, row) in rows.iter().enumerate() {
        let prior = matches[..i]
            .iter()
            .filter(|m| m.date < row.date && m.involves(&row.home_team))
            .count();
        assert_eq!(row.home_form.is_some(), prior > 0, "row {i}");
    }
}

#[test]
fn tally_agrees_with_scan() {
    let matches = history(3, 250);
    let rows = build(&matches, rankings(matches.last().unwrap().date));
    for row in &rows {
        let scanned = h2h_scan(&matches, &row.home_team, &row.away_team, row.date);
        assert_eq!(row.h2h_game_count, scanned.game_count);
        assert_eq!(row.h2h_win_rate, scanned.win_rate);
    }
}

#[test]
fn h2h_is_symmetric_under_label_swap() {
    let matches = history(5, 120);
    let swapped: Vec<Match> = matches
        .iter()
        .map(|m| Match {
            home_team: m.away_team.clone(),
            away_team: m.home_team.clone(),
            home_score: m.away_score,
            away_score: m.home_score,
            ..m.clone()
        })
        .collect();

    let mut original = H2hTally::new();
    let mut mirrored = H2hTally::new();
    for (m, s) in matches.iter().zip(&swapped) {
        original.record(m);
        mirrored.record(s);
    }
    for a in TEAMS {
        for b in TEAMS {
            if a == b {
                continue;
            }
            let x = original.stats(a, b);
            let y = mirrored.stats(b, a);
            assert_eq!(x.game_count, y.game_count);
            if x.game_count > 0 {
                assert_relative_eq!(x.win_rate, 1.0 - y.win_rate, epsilon = 1e-12);
            }
        }
    }
}

#[test]
fn elo_scenarios() {
    let day = start();
    let friendly_draw = Match {
        seq: 0,
        date: day,
        home_team: "Togo".to_string(),
        away_team: "Benin".to_string(),
        home_score: 0,
        away_score: 0,
        tournament: "Friendly".to_string(),
        city: String::new(),
        country: String::new(),
        neutral: true,
    };
    let mut elo = EloRegistry::new(EloConfig::default());
    elo.apply(&friendly_draw);
    assert_eq!(elo.rating("Togo"), 1500.0);
    assert_eq!(elo.rating("Benin"), 1500.0);

    // Level teams, AFCON win: K = 10 * 8, expected 0.5.
    let afcon_win = Match {
        home_score: 1,
        tournament: "African Cup of Nations".to_string(),
        ..friendly_draw
    };
    elo.apply(&afcon_win);
    assert_relative_eq!(elo.rating("Togo"), 1540.0, epsilon = 1e-9);
    assert_relative_eq!(elo.rating("Benin"), 1460.0, epsilon = 1e-9);
}

#[test]
fn no_prior_meetings_is_neutral() {
    let matches = history(9, 40);
    let rows = build(&matches, rankings(matches.last().unwrap().date));
    let first = &rows[0];
    assert_eq!(first.h2h_game_count, 0);
    assert_eq!(first.h2h_win_rate, 0.5);
    assert_eq!(first.home_elo, 1500.0);
}
