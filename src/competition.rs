use std::collections::HashMap;

use once_cell::sync::Lazy;

/// Weight for competitions missing from the table.
pub const DEFAULT_TOURNAMENT_WEIGHT: f64 = 2.0;

static TOURNAMENT_WEIGHTS: Lazy<HashMap<&'static str, f64>> = Lazy::new(|| {
    HashMap::from([
        ("FIFA World Cup", 10.0),
        ("African Cup of Nations", 8.0),
        ("FIFA World Cup qualification", 7.0),
        ("African Cup of Nations qualification", 6.0),
        ("Confederations Cup", 5.0),
        ("Arab Cup", 4.0),
        ("Gold Cup", 4.0),
        ("COSAFA Cup", 3.0),
        ("CECAFA Cup", 3.0),
        ("Friendly", 1.0),
    ])
});

/// Ordinal importance of a competition; also scales the Elo K-factor.
pub fn tournament_weight(tournament: &str) -> f64 {
    TOURNAMENT_WEIGHTS
        .get(tournament.trim())
        .copied()
        .unwrap_or(DEFAULT_TOURNAMENT_WEIGHT)
}

pub fn max_tournament_weight() -> f64 {
    TOURNAMENT_WEIGHTS
        .values()
        .copied()
        .fold(DEFAULT_TOURNAMENT_WEIGHT, f64::max)
}

/// Home team playing in its own country.
pub fn is_home_advantage(home_team: &str, venue_country: &str) -> bool {
    !venue_country.is_empty() && home_team == venue_country
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlisted_competitions_get_default_weight() {
        assert_eq!(tournament_weight("African Cup of Nations"), 8.0);
        assert_eq!(tournament_weight("Friendly"), 1.0);
        assert_eq!(tournament_weight("Amílcar Cabral Cup"), DEFAULT_TOURNAMENT_WEIGHT);
        assert_eq!(max_tournament_weight(), 10.0);
    }

    #[test]
    fn home_advantage_needs_matching_country() {
        assert!(is_home_advantage("Morocco", "Morocco"));
        assert!(!is_home_advantage("Senegal", "Morocco"));
        assert!(!is_home_advantage("Senegal", ""));
    }
}
