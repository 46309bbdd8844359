//! Squad market value and top-league player counts per team.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{info, warn};

use crate::team_names::normalize_team_name;

/// Per-side value when no squad file is available at all.
pub const NO_FILE_SQUAD_VALUE: f64 = 50.0;
/// Value for a team missing from a loaded squad file.
pub const UNKNOWN_TEAM_SQUAD_VALUE: f64 = 10.0;
const RATIO_EPSILON: f64 = 1e-6;

/// One team's squad figures: market value in millions and players in the
/// top five European leagues.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SquadEntry {
    pub value: f64,
    pub quality: f64,
}

#[derive(Debug, Deserialize)]
struct RawSquadRow {
    team: String,
    market_value_mln: f64,
    #[serde(default)]
    top_five_league_players: Option<f64>,
}

/// Squad lookup. A book built without a file answers every team with the
/// same neutral value.
#[derive(Debug, Clone, Default)]
pub struct SquadBook {
    teams: Option<HashMap<String, SquadEntry>>,
}

impl SquadBook {
    pub fn new(entries: impl IntoIterator<Item = (String, SquadEntry)>) -> Self {
        Self {
            teams: Some(entries.into_iter().collect()),
        }
    }

    /// Book used when no squad file exists.
    pub fn absent() -> Self {
        Self { teams: None }
    }

    /// Loads `path`, or falls back to [`SquadBook::absent`] with a warning
    /// when the file does not exist.
    pub fn load_or_absent(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(path = %path.display(), "squad file not found; using neutral squad values");
            return Ok(Self::absent());
        }
        let file = File::open(path).with_context(|| format!("open squads {}", path.display()))?;
        Self::read(file).with_context(|| format!("read squads {}", path.display()))
    }

    pub fn read<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(reader);
        let mut teams = HashMap::new();
        for (line, row) in rdr.deserialize::<RawSquadRow>().enumerate() {
            let row = row.with_context(|| format!("decode squad row {}", line + 1))?;
            teams
                .entry(normalize_team_name(&row.team))
                .or_insert(SquadEntry {
                    value: row.market_value_mln,
                    quality: row.top_five_league_players.unwrap_or(0.0),
                });
        }
        info!(teams = teams.len(), "loaded squad values");
        Ok(Self { teams: Some(teams) })
    }

    pub fn is_absent(&self) -> bool {
        self.teams.is_none()
    }

    pub fn entry(&self, team: &str) -> SquadEntry {
        match &self.teams {
            None => SquadEntry {
                value: NO_FILE_SQUAD_VALUE,
                quality: 0.0,
            },
            Some(teams) => teams.get(team).copied().unwrap_or(SquadEntry {
                value: UNKNOWN_TEAM_SQUAD_VALUE,
                quality: 0.0,
            }),
        }
    }
}

/// Squad columns of one feature row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SquadFeatures {
    pub home_squad_value: f64,
    pub away_squad_value: f64,
    pub home_squad_quality: f64,
    pub away_squad_quality: f64,
    pub log_home_value: f64,
    pub log_away_value: f64,
    pub value_diff: f64,
    pub value_ratio: f64,
    pub quality_diff: f64,
}

impl SquadFeatures {
    pub fn new(home: SquadEntry, away: SquadEntry) -> Self {
        Self {
            home_squad_value: home.value,
            away_squad_value: away.value,
            home_squad_quality: home.quality,
            away_squad_quality: away.quality,
            // Market values span orders of magnitude.
            log_home_value: home.value.ln_1p(),
            log_away_value: away.value.ln_1p(),
            value_diff: home.value - away.value,
            value_ratio: home.value / (away.value + RATIO_EPSILON),
            quality_diff: home.quality - away.quality,
        }
    }
}
