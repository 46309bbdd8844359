//! Head-to-head record between two teams, from strictly earlier meetings.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::dataset::Match;

pub const NEUTRAL_WIN_RATE: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct H2hStats {
    pub win_rate: f64,
    pub game_count: u32,
}

impl Default for H2hStats {
    fn default() -> Self {
        Self {
            win_rate: NEUTRAL_WIN_RATE,
            game_count: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct PairRecord {
    meetings: u32,
    draws: u32,
    // wins by the lexicographically smaller / larger team of the pair
    first_wins: u32,
    second_wins: u32,
}

/// Running tally per unordered pair.
#[derive(Debug, Clone, Default)]
pub struct H2hTally {
    pairs: HashMap<(String, String), PairRecord>,
}

impl H2hTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record from `home`'s perspective, counting wins in either venue role.
    pub fn stats(&self, home: &str, away: &str) -> H2hStats {
        let (key, home_is_first) = pair_key(home, away);
        let Some(rec) = self.pairs.get(&key) else {
            return H2hStats::default();
        };
        if rec.meetings == 0 {
            return H2hStats::default();
        }
        let home_wins = if home_is_first {
            rec.first_wins
        } else {
            rec.second_wins
        };
        H2hStats {
            win_rate: (home_wins as f64 + 0.5 * rec.draws as f64) / rec.meetings as f64,
            game_count: rec.meetings,
        }
    }

    pub fn record(&mut self, m: &Match) {
        self.record_result(&m.home_team, &m.away_team, m.home_score, m.away_score);
    }

    pub fn record_result(&mut self, home: &str, away: &str, home_goals: u32, away_goals: u32) {
        let (key, home_is_first) = pair_key(home, away);
        let rec = self.pairs.entry(key).or_default();
        rec.meetings += 1;
        match home_goals.cmp(&away_goals) {
            std::cmp::Ordering::Equal => rec.draws += 1,
            std::cmp::Ordering::Greater if home_is_first => rec.first_wins += 1,
            std::cmp::Ordering::Greater => rec.second_wins += 1,
            std::cmp::Ordering::Less if home_is_first => rec.second_wins += 1,
            std::cmp::Ordering::Less => rec.first_wins += 1,
        }
    }

    pub fn pair_count(&self) -> usize {
        self.pairs.len()
    }
}

fn pair_key(a: &str, b: &str) -> ((String, String), bool) {
    if a <= b {
        ((a.to_string(), b.to_string()), true)
    } else {
        ((b.to_string(), a.to_string()), false)
    }
}

/// Direct scan over `history` for meetings dated before `before`.
/// Linear per call; the tally answers the same question in O(1).
pub fn h2h_scan(history: &[Match], home: &str, away: &str, before: NaiveDate) -> H2hStats {
    let mut meetings = 0u32;
    let mut home_wins = 0u32;
    let mut draws = 0u32;

    for m in history.iter().filter(|m| m.date < before) {
        let same_pair = (m.home_team == home && m.away_team == away)
            || (m.home_team == away && m.away_team == home);
        if !same_pair {
            continue;
        }
        meetings += 1;
        if m.home_score == m.away_score {
            draws += 1;
        } else if (m.home_team == home && m.home_score > m.away_score)
            || (m.away_team == home && m.away_score > m.home_score)
        {
            home_wins += 1;
        }
    }

    if meetings == 0 {
        return H2hStats::default();
    }
    H2hStats {
        win_rate: (home_wins as f64 + 0.5 * draws as f64) / meetings as f64,
        game_count: meetings,
    }
}
