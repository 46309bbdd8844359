use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::info;

use crate::calibration::{Outcome, classify_outcome};
use crate::team_names::{is_caf_member, normalize_team_name};

/// A played international match after cleaning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    /// Position in the cleaned input; tiebreak for same-day matches.
    pub seq: usize,
    pub date: NaiveDate,
    pub home_team: String,
    pub away_team: String,
    pub home_score: u32,
    pub away_score: u32,
    pub tournament: String,
    pub city: String,
    pub country: String,
    pub neutral: bool,
}

impl Match {
    pub fn outcome(&self) -> Outcome {
        classify_outcome(self.home_score as i32, self.away_score as i32)
    }

    pub fn involves(&self, team: &str) -> bool {
        self.home_team == team || self.away_team == team
    }
}

/// One FIFA ranking publication for one team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingSnapshot {
    pub rank_date: NaiveDate,
    pub team: String,
    pub rank: u32,
    pub total_points: f64,
    pub rank_change: i32,
}

/// An upcoming match. Scores are absent by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fixture {
    pub date: NaiveDate,
    pub home_team: String,
    pub away_team: String,
    pub city: String,
    pub tournament: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default, deserialize_with = "de_opt_flag")]
    pub neutral: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RawMatchRow {
    date: NaiveDate,
    home_team: String,
    away_team: String,
    #[serde(default)]
    home_score: Option<String>,
    #[serde(default)]
    away_score: Option<String>,
    #[serde(default)]
    tournament: String,
    #[serde(default)]
    city: String,
    #[serde(default)]
    country: String,
    #[serde(default, deserialize_with = "de_opt_flag")]
    neutral: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RawRankingRow {
    rank_date: NaiveDate,
    #[serde(alias = "team")]
    country_full: String,
    rank: u32,
    total_points: f64,
    #[serde(default, deserialize_with = "de_opt_i32")]
    rank_change: Option<i32>,
}

pub fn load_matches(path: &Path) -> Result<Vec<Match>> {
    let file = File::open(path).with_context(|| format!("open matches {}", path.display()))?;
    read_matches(file).with_context(|| format!("read matches {}", path.display()))
}

pub fn load_rankings(path: &Path) -> Result<Vec<RankingSnapshot>> {
    let file = File::open(path).with_context(|| format!("open rankings {}", path.display()))?;
    read_rankings(file).with_context(|| format!("read rankings {}", path.display()))
}

pub fn load_fixtures(path: &Path) -> Result<Vec<Fixture>> {
    let file = File::open(path).with_context(|| format!("open fixtures {}", path.display()))?;
    read_fixtures(file).with_context(|| format!("read fixtures {}", path.display()))
}

/// Reads the public results schema, keeping played matches with at least one CAF side.
pub fn read_matches<R: Read>(reader: R) -> Result<Vec<Match>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut out = Vec::new();
    let mut unplayed = 0usize;
    let mut outside_caf = 0usize;

    for (line, row) in rdr.deserialize::<RawMatchRow>().enumerate() {
        let row = row.with_context(|| format!("decode match row {}", line + 1))?;
        let home_score = parse_score(row.home_score.as_deref())
            .with_context(|| format!("match row {} home_score", line + 1))?;
        let away_score = parse_score(row.away_score.as_deref())
            .with_context(|| format!("match row {} away_score", line + 1))?;
        let (Some(home_score), Some(away_score)) = (home_score, away_score) else {
            unplayed += 1;
            continue;
        };
        let home_team = normalize_team_name(&row.home_team);
        let away_team = normalize_team_name(&row.away_team);
        if !is_caf_member(&home_team) && !is_caf_member(&away_team) {
            outside_caf += 1;
            continue;
        }
        out.push(Match {
            seq: out.len(),
            date: row.date,
            home_team,
            away_team,
            home_score,
            away_score,
            tournament: row.tournament.trim().to_string(),
            city: row.city.trim().to_string(),
            country: normalize_team_name(&row.country),
            neutral: row.neutral.unwrap_or(false),
        });
    }

    info!(
        kept = out.len(),
        unplayed, outside_caf, "loaded match history"
    );
    Ok(out)
}

/// Reads FIFA ranking rows; duplicates on (team, date) keep the first record.
pub fn read_rankings<R: Read>(reader: R) -> Result<Vec<RankingSnapshot>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    let mut duplicates = 0usize;

    for (line, row) in rdr.deserialize::<RawRankingRow>().enumerate() {
        let row = row.with_context(|| format!("decode ranking row {}", line + 1))?;
        let team = normalize_team_name(&row.country_full);
        if !seen.insert((team.clone(), row.rank_date)) {
            duplicates += 1;
            continue;
        }
        out.push(RankingSnapshot {
            rank_date: row.rank_date,
            team,
            rank: row.rank,
            total_points: row.total_points,
            rank_change: row.rank_change.unwrap_or(0),
        });
    }

    // Stable: same-day publications keep file order.
    out.sort_by_key(|s| s.rank_date);
    info!(snapshots = out.len(), duplicates, "loaded ranking history");
    Ok(out)
}

pub fn read_fixtures<R: Read>(reader: R) -> Result<Vec<Fixture>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut out = Vec::new();
    for (line, row) in rdr.deserialize::<Fixture>().enumerate() {
        let mut fixture = row.with_context(|| format!("decode fixture row {}", line + 1))?;
        fixture.home_team = normalize_team_name(&fixture.home_team);
        fixture.away_team = normalize_team_name(&fixture.away_team);
        fixture.country = fixture.country.as_deref().map(normalize_team_name);
        out.push(fixture);
    }
    out.sort_by_key(|f| f.date);
    Ok(out)
}

/// Orders matches by (date, input order).
pub fn sort_chronologically(matches: &mut [Match]) {
    matches.sort_by(|a, b| a.date.cmp(&b.date).then(a.seq.cmp(&b.seq)));
}

/// Goals for a played match, `None` for an unplayed one (empty or `NA`).
/// Anything else that is not a whole non-negative number is an error.
fn parse_score(raw: Option<&str>) -> Result<Option<u32>> {
    let Some(raw) = raw.map(str::trim) else {
        return Ok(None);
    };
    if raw.is_empty() || raw.eq_ignore_ascii_case("na") || raw.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 && v.fract() == 0.0 && v <= u32::MAX as f64 => {
            Ok(Some(v as u32))
        }
        _ => bail!("malformed score {raw:?}"),
    }
}

fn de_opt_i32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i32>, D::Error> {
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .map(|v| v.round() as i32))
}

fn de_opt_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<bool>, D::Error> {
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|s| parse_flag(&s)))
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" => Some(true),
        "false" | "f" | "0" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESULTS: &str = "\
date,home_team,away_team,home_score,away_score,tournament,city,country,neutral
2019-06-21,Egypt,Zimbabwe,1,0,African Cup of Nations,Cairo,Egypt,FALSE
2019-06-22,France,Bolivia,2,0,Friendly,Nantes,France,FALSE
2019-06-23,Côte d'Ivoire,South Africa,1,0,African Cup of Nations,Cairo,Egypt,TRUE
2025-12-21,Morocco,Comoros,NA,NA,African Cup of Nations,Rabat,Morocco,FALSE
";

    #[test]
    fn cleaning_filters_and_normalizes() {
        let matches = read_matches(RESULTS.as_bytes()).unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[1].home_team, "Ivory Coast");
        assert!(matches[1].neutral);
        assert!(!matches[0].neutral);
        assert_eq!(matches[1].seq, 1);
        assert_eq!(matches[0].outcome(), Outcome::Home);
    }

    #[test]
    fn ranking_duplicates_collapse() {
        let csv = "\
rank_date,country_full,rank,total_points,previous_points,rank_change,confederation
2020-02-20,Senegal,20,1555.0,1550.0,0,CAF
2019-12-19,Senegal,20,1550.0,1540.0,1,CAF
2020-02-20,Senegal,21,1500.0,1550.0,-1,CAF
";
        let snaps = read_rankings(csv.as_bytes()).unwrap();
        assert_eq!(snaps.len(), 2);
        assert!(snaps[0].rank_date < snaps[1].rank_date);
        assert_eq!(snaps[1].rank, 20);
    }

    #[test]
    fn malformed_scores_fail_with_row_context() {
        for bad in ["1.5", "x", "-1"] {
            let csv = format!(
                "date,home_team,away_team,home_score,away_score,tournament,city,country,neutral\n\
                 2019-06-21,Egypt,Zimbabwe,{bad},0,Friendly,Cairo,Egypt,FALSE\n"
            );
            let err = read_matches(csv.as_bytes()).unwrap_err();
            assert!(format!("{err:#}").contains("row 1"), "{err:#}");
        }
        assert_eq!(parse_score(Some(" nan ")).unwrap(), None);
        assert_eq!(parse_score(Some("2.0")).unwrap(), Some(2));
        assert_eq!(parse_score(None).unwrap(), None);
    }

    #[test]
    fn flags_accept_common_spellings() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
