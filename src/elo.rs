use std::collections::HashMap;

use crate::competition::tournament_weight;
use crate::dataset::Match;

#[derive(Debug, Clone, Copy)]
pub struct EloConfig {
    pub base_k: f64,
    pub initial_rating: f64,
}

impl Default for EloConfig {
    fn default() -> Self {
        Self {
            base_k: 10.0,
            initial_rating: 1500.0,
        }
    }
}

/// Pre-match ratings recorded as a match's features.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EloFeatures {
    pub home_elo: f64,
    pub away_elo: f64,
}

impl EloFeatures {
    pub fn diff(&self) -> f64 {
        self.home_elo - self.away_elo
    }
}

/// Current rating per team. Replayed strictly in match order; never reset mid-run.
#[derive(Debug, Clone, Default)]
pub struct EloRegistry {
    ratings: HashMap<String, f64>,
    cfg: EloConfig,
}

impl EloRegistry {
    pub fn new(cfg: EloConfig) -> Self {
        Self {
            ratings: HashMap::new(),
            cfg,
        }
    }

    pub fn rating(&self, team: &str) -> f64 {
        self.ratings
            .get(team)
            .copied()
            .unwrap_or(self.cfg.initial_rating)
    }

    pub fn len(&self) -> usize {
        self.ratings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }

    /// Records pre-match ratings, then applies the result with
    /// K = base_k * tournament weight. Returns the pre-match ratings.
    pub fn apply(&mut self, m: &Match) -> EloFeatures {
        let k = self.cfg.base_k * tournament_weight(&m.tournament);
        self.apply_with_k(&m.home_team, &m.away_team, m.home_score, m.away_score, k)
    }

    pub fn apply_with_k(
        &mut self,
        home: &str,
        away: &str,
        home_goals: u32,
        away_goals: u32,
        k: f64,
    ) -> EloFeatures {
        let eh = self.rating(home);
        let ea = self.rating(away);

        let expected_home = expected_score(eh, ea);
        let s_home = if home_goals > away_goals {
            1.0
        } else if home_goals < away_goals {
            0.0
        } else {
            0.5
        };

        // Away change is k * ((1 - s_home) - (1 - expected_home)) = -delta.
        let delta = k * (s_home - expected_home);
        self.ratings.insert(home.to_string(), eh + delta);
        self.ratings.insert(away.to_string(), ea - delta);

        EloFeatures {
            home_elo: eh,
            away_elo: ea,
        }
    }

    /// Ratings sorted best first.
    pub fn table(&self) -> Vec<(String, f64)> {
        let mut out = self
            .ratings
            .iter()
            .map(|(team, r)| (team.clone(), *r))
            .collect::<Vec<_>>();
        out.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        out
    }
}

/// Replays `matches` (already in chronological order) into `registry`.
pub fn replay(matches: &[Match], mut registry: EloRegistry) -> (Vec<EloFeatures>, EloRegistry) {
    let features = matches.iter().map(|m| registry.apply(m)).collect();
    (features, registry)
}

pub fn expected_score(r_a: f64, r_b: f64) -> f64 {
    1.0 / (1.0 + 10.0_f64.powf((r_b - r_a) / 400.0))
}
