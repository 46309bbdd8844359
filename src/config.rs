//! Paths and knobs shared by the binaries.
//!
//! Resolution order: defaults, then `AFCON_*` environment variables (after
//! loading `.env.local` and `.env`), then `--flag=value` / `--flag value`
//! arguments.

use std::env;
use std::path::PathBuf;

use tracing::warn;

use crate::elo::EloConfig;
use crate::evaluate::DEFAULT_TEST_FROM_YEAR;
use crate::features::FeatureConfig;
use crate::form::DEFAULT_WINDOW;
use crate::simulation::{DEFAULT_RUNS, SimulationConfig};
use crate::team_names::normalize_team_name;
use crate::travel::{DEFAULT_FALLBACK_CITY, TravelEstimator};

// (command-line flag, environment key)
const FLAGS: &[(&str, &str)] = &[
    ("--matches", "AFCON_MATCHES_PATH"),
    ("--rankings", "AFCON_RANKINGS_PATH"),
    ("--features", "AFCON_FEATURES_PATH"),
    ("--fixtures", "AFCON_FIXTURES_PATH"),
    ("--squads", "AFCON_SQUAD_PATH"),
    ("--bracket", "AFCON_BRACKET_PATH"),
    ("--model", "AFCON_MODEL_PATH"),
    ("--predictions", "AFCON_PREDICTIONS_PATH"),
    ("--simulation-out", "AFCON_SIMULATION_PATH"),
    ("--window", "AFCON_ROLLING_WINDOW"),
    ("--elo-k", "AFCON_ELO_BASE_K"),
    ("--simulations", "AFCON_SIMULATIONS"),
    ("--seed", "AFCON_SEED"),
    ("--host-country", "AFCON_HOST_COUNTRY"),
    ("--host-city", "AFCON_HOST_CITY"),
    ("--tournament", "AFCON_TOURNAMENT"),
    ("--test-from-year", "AFCON_TEST_FROM_YEAR"),
];

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub matches_path: PathBuf,
    pub rankings_path: PathBuf,
    pub features_path: PathBuf,
    pub fixtures_path: PathBuf,
    /// Optional; neutral squad values are used when the file is missing.
    pub squad_path: PathBuf,
    pub bracket_path: PathBuf,
    /// Softmax weight file; the Elo baseline is used when unset.
    pub model_path: Option<PathBuf>,
    pub predictions_path: PathBuf,
    pub simulation_path: PathBuf,
    pub rolling_window: usize,
    pub elo_base_k: f64,
    pub simulations: usize,
    pub seed: Option<u64>,
    pub host_country: String,
    pub host_city: String,
    pub tournament: String,
    pub test_from_year: i32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            matches_path: PathBuf::from("data/raw/matches.csv"),
            rankings_path: PathBuf::from("data/raw/fifa_ranking.csv"),
            features_path: PathBuf::from("data/processed/features.csv"),
            fixtures_path: PathBuf::from("data/raw/fixtures.csv"),
            squad_path: PathBuf::from("data/raw/squad_values.csv"),
            bracket_path: PathBuf::from("data/raw/bracket.csv"),
            model_path: None,
            predictions_path: PathBuf::from("outputs/predictions.csv"),
            simulation_path: PathBuf::from("outputs/simulation.csv"),
            rolling_window: DEFAULT_WINDOW,
            elo_base_k: EloConfig::default().base_k,
            simulations: DEFAULT_RUNS,
            seed: None,
            host_country: "Morocco".to_string(),
            host_city: DEFAULT_FALLBACK_CITY.to_string(),
            tournament: "African Cup of Nations".to_string(),
            test_from_year: DEFAULT_TEST_FROM_YEAR,
        }
    }
}

impl PipelineConfig {
    /// Defaults overridden by the process environment and arguments.
    pub fn load() -> Self {
        let _ = dotenvy::from_filename(".env.local");
        let _ = dotenvy::from_filename(".env");

        let mut cfg = Self::default();
        cfg.apply_env(|key| env::var(key).ok());
        let args = env::args().skip(1).collect::<Vec<_>>();
        cfg.apply_args(&args);
        cfg
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        for (_, key) in FLAGS {
            if let Some(value) = lookup(key) {
                self.set(key, &value);
            }
        }
    }

    pub fn apply_args(&mut self, args: &[String]) {
        for (idx, arg) in args.iter().enumerate() {
            for (flag, key) in FLAGS {
                if let Some(raw) = arg.strip_prefix(&format!("{flag}=")) {
                    self.set(key, raw);
                } else if arg == flag
                    && let Some(next) = args.get(idx + 1)
                {
                    self.set(key, next);
                }
            }
        }
    }

    /// Unparseable values keep the previous setting.
    fn set(&mut self, key: &str, raw: &str) {
        let value = raw.trim();
        if value.is_empty() {
            return;
        }
        match key {
            "AFCON_MATCHES_PATH" => self.matches_path = PathBuf::from(value),
            "AFCON_RANKINGS_PATH" => self.rankings_path = PathBuf::from(value),
            "AFCON_FEATURES_PATH" => self.features_path = PathBuf::from(value),
            "AFCON_FIXTURES_PATH" => self.fixtures_path = PathBuf::from(value),
            "AFCON_SQUAD_PATH" => self.squad_path = PathBuf::from(value),
            "AFCON_BRACKET_PATH" => self.bracket_path = PathBuf::from(value),
            "AFCON_MODEL_PATH" => self.model_path = Some(PathBuf::from(value)),
            "AFCON_PREDICTIONS_PATH" => self.predictions_path = PathBuf::from(value),
            "AFCON_SIMULATION_PATH" => self.simulation_path = PathBuf::from(value),
            "AFCON_ROLLING_WINDOW" => match value.parse::<usize>() {
                Ok(v) => self.rolling_window = v.clamp(1, 50),
                Err(_) => warn!(key, value, "ignoring invalid setting"),
            },
            "AFCON_ELO_BASE_K" => match value.parse::<f64>() {
                Ok(v) if v.is_finite() => self.elo_base_k = v.clamp(1.0, 100.0),
                _ => warn!(key, value, "ignoring invalid setting"),
            },
            "AFCON_SIMULATIONS" => match value.parse::<usize>() {
                Ok(v) => self.simulations = v.clamp(1, 10_000_000),
                Err(_) => warn!(key, value, "ignoring invalid setting"),
            },
            "AFCON_SEED" => match value.parse::<u64>() {
                Ok(v) => self.seed = Some(v),
                Err(_) => warn!(key, value, "ignoring invalid setting"),
            },
            "AFCON_HOST_COUNTRY" => self.host_country = normalize_team_name(value),
            "AFCON_HOST_CITY" => self.host_city = value.to_string(),
            "AFCON_TOURNAMENT" => self.tournament = value.to_string(),
            "AFCON_TEST_FROM_YEAR" => match value.parse::<i32>() {
                Ok(v) => self.test_from_year = v.clamp(1872, 2100),
                Err(_) => warn!(key, value, "ignoring invalid setting"),
            },
            _ => {}
        }
    }

    /// Feature settings; fails when the host city is not a known venue.
    pub fn feature_config(&self) -> anyhow::Result<FeatureConfig> {
        Ok(FeatureConfig {
            rolling_window: self.rolling_window,
            elo: EloConfig {
                base_k: self.elo_base_k,
                ..EloConfig::default()
            },
            travel: TravelEstimator::new(&self.host_city)?,
        })
    }

    pub fn simulation_config(&self) -> SimulationConfig {
        SimulationConfig {
            runs: self.simulations,
            seed: self.seed,
        }
    }
}

/// Installs the fmt subscriber; `RUST_LOG` overrides the `info` default.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn env_then_args_override_defaults() {
        let env = HashMap::from([
            ("AFCON_SIMULATIONS", "500"),
            ("AFCON_SEED", "42"),
            ("AFCON_HOST_CITY", "Tangier"),
        ]);
        let mut cfg = PipelineConfig::default();
        cfg.apply_env(|key| env.get(key).map(|v| v.to_string()));
        cfg.apply_args(&args(&["--simulations=2000", "--model", "models/w.json"]));
        assert_eq!(cfg.simulations, 2000);
        assert_eq!(cfg.seed, Some(42));
        assert_eq!(cfg.host_city, "Tangier");
        assert_eq!(cfg.model_path, Some(PathBuf::from("models/w.json")));
        assert!(cfg.feature_config().is_ok());
    }

    #[test]
    fn bad_values_are_ignored_or_clamped() {
        let mut cfg = PipelineConfig::default();
        cfg.apply_args(&args(&["--window=0", "--seed=abc", "--elo-k", "-5"]));
        assert_eq!(cfg.rolling_window, 1);
        assert_eq!(cfg.seed, None);
        assert_eq!(cfg.elo_base_k, 1.0);
    }

    #[test]
    fn host_country_uses_canonical_name() {
        let mut cfg = PipelineConfig::default();
        cfg.apply_env(|key| (key == "AFCON_HOST_COUNTRY").then(|| "Côte d'Ivoire".to_string()));
        assert_eq!(cfg.host_country, "Ivory Coast");
    }

    #[test]
    fn unknown_host_city_fails_feature_config() {
        let mut cfg = PipelineConfig::default();
        cfg.apply_args(&args(&["--host-city", "Lagos"]));
        assert!(cfg.feature_config().is_err());
    }
}
