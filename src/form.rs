use std::collections::{HashMap, VecDeque};

use crate::dataset::Match;

pub const DEFAULT_WINDOW: usize = 5;

/// One team's view of a finished match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeamResult {
    pub goals_for: u32,
    pub goals_against: u32,
}

impl TeamResult {
    pub fn points(&self) -> u32 {
        match self.goals_for.cmp(&self.goals_against) {
            std::cmp::Ordering::Greater => 3,
            std::cmp::Ordering::Equal => 1,
            std::cmp::Ordering::Less => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FormStats {
    /// Entries in the window (1..=W).
    pub matches: usize,
    pub points: f64,
    pub weighted_points: f64,
    pub goals_for: f64,
    pub goals_against: f64,
}

impl FormStats {
    pub fn goal_diff(&self) -> f64 {
        self.goals_for - self.goals_against
    }
}

/// Trailing results per team, newest at the back.
#[derive(Debug, Clone)]
pub struct FormTracker {
    window: usize,
    history: HashMap<String, VecDeque<TeamResult>>,
}

impl Default for FormTracker {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl FormTracker {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            history: HashMap::new(),
        }
    }

    /// Form over results recorded so far; `None` before a team's first result.
    pub fn form(&self, team: &str) -> Option<FormStats> {
        let results = self.history.get(team)?;
        rolling_stats(results.iter().copied())
    }

    pub fn record(&mut self, team: &str, result: TeamResult) {
        let window = self.window;
        let results = self.history.entry(team.to_string()).or_default();
        results.push_back(result);
        while results.len() > window {
            results.pop_front();
        }
    }

    pub fn record_match(&mut self, m: &Match) {
        self.record(
            &m.home_team,
            TeamResult {
                goals_for: m.home_score,
                goals_against: m.away_score,
            },
        );
        self.record(
            &m.away_team,
            TeamResult {
                goals_for: m.away_score,
                goals_against: m.home_score,
            },
        );
    }
}

/// Means over `results` (oldest first). Points are also averaged with linear
/// weights 1..k, the newest result weighted k.
pub fn rolling_stats(results: impl IntoIterator<Item = TeamResult>) -> Option<FormStats> {
    let mut n = 0usize;
    let mut points = 0.0;
    let mut weighted = 0.0;
    let mut weight_sum = 0.0;
    let mut goals_for = 0.0;
    let mut goals_against = 0.0;

    for (idx, r) in results.into_iter().enumerate() {
        let w = (idx + 1) as f64;
        let p = r.points() as f64;
        points += p;
        weighted += p * w;
        weight_sum += w;
        goals_for += r.goals_for as f64;
        goals_against += r.goals_against as f64;
        n += 1;
    }

    if n == 0 {
        return None;
    }
    let k = n as f64;
    Some(FormStats {
        matches: n,
        points: points / k,
        weighted_points: weighted / weight_sum,
        goals_for: goals_for / k,
        goals_against: goals_against / k,
    })
}
