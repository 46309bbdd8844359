//! The outcome classifier seam: anything that maps model inputs to
//! home/draw/away probabilities.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::calibration::Prob3;
use crate::elo::expected_score;
use crate::features::{MODEL_FEATURE_COUNT, MODEL_FEATURES, ModelInput};

pub const PROB_SUM_TOLERANCE: f64 = 1e-6;

const IDX_IS_HOME_ADV: usize = 16;
const IDX_ELO_DIFF: usize = 21;

pub trait OutcomeModel: Sync {
    /// One probability triple per input row, in order.
    fn predict_proba(&self, rows: &[ModelInput]) -> Result<Vec<Prob3>>;

    fn name(&self) -> &str;
}

/// Runs `model` and rejects a wrong row count or any malformed triple.
pub fn predict_checked(model: &dyn OutcomeModel, rows: &[ModelInput]) -> Result<Vec<Prob3>> {
    let probs = model
        .predict_proba(rows)
        .with_context(|| format!("{} predict_proba", model.name()))?;
    if probs.len() != rows.len() {
        bail!(
            "{} returned {} predictions for {} rows",
            model.name(),
            probs.len(),
            rows.len()
        );
    }
    for (idx, p) in probs.iter().enumerate() {
        validate_probs(p).with_context(|| format!("{} row {idx}", model.name()))?;
    }
    Ok(probs)
}

pub fn validate_probs(p: &Prob3) -> Result<()> {
    for v in [p.home, p.draw, p.away] {
        if !v.is_finite() || !(0.0..=1.0).contains(&v) {
            bail!("probability {v} outside [0, 1]");
        }
    }
    let sum = p.sum();
    if (sum - 1.0).abs() > PROB_SUM_TOLERANCE {
        bail!("probabilities sum to {sum}");
    }
    Ok(())
}

/// Weight file written by the external trainer: a standard scaler followed by
/// a multinomial logistic regression over `MODEL_FEATURES`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoftmaxWeights {
    pub feature_names: Vec<String>,
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
    /// Rows in class order home, draw, away.
    pub coefficients: Vec<Vec<f64>>,
    pub intercepts: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct SoftmaxModel {
    mean: ModelInput,
    scale: ModelInput,
    coefficients: [ModelInput; 3],
    intercepts: [f64; 3],
}

impl SoftmaxModel {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read model weights {}", path.display()))?;
        let weights: SoftmaxWeights = serde_json::from_str(&raw)
            .with_context(|| format!("parse model weights {}", path.display()))?;
        let model = Self::from_weights(weights)
            .with_context(|| format!("model weights {}", path.display()))?;
        info!(path = %path.display(), "loaded softmax model");
        Ok(model)
    }

    pub fn from_weights(w: SoftmaxWeights) -> Result<Self> {
        if w.feature_names.len() != MODEL_FEATURE_COUNT
            || w.feature_names.iter().zip(MODEL_FEATURES).any(|(a, b)| a != b)
        {
            bail!(
                "feature_names {:?} do not match the expected columns",
                w.feature_names
            );
        }
        let mean = to_input(&w.mean, "mean")?;
        let scale = to_input(&w.scale, "scale")?;
        if scale.iter().any(|s| !s.is_finite() || *s == 0.0) {
            bail!("scale must be finite and non-zero");
        }
        if w.coefficients.len() != 3 {
            bail!("expected 3 coefficient rows, got {}", w.coefficients.len());
        }
        let coefficients = [
            to_input(&w.coefficients[0], "coefficients[0]")?,
            to_input(&w.coefficients[1], "coefficients[1]")?,
            to_input(&w.coefficients[2], "coefficients[2]")?,
        ];
        let intercepts: [f64; 3] = w
            .intercepts
            .as_slice()
            .try_into()
            .map_err(|_| anyhow!("expected 3 intercepts, got {}", w.intercepts.len()))?;
        Ok(Self {
            mean,
            scale,
            coefficients,
            intercepts,
        })
    }

    fn predict_row(&self, row: &ModelInput) -> Prob3 {
        let mut logits = self.intercepts;
        for (class, coef) in self.coefficients.iter().enumerate() {
            for i in 0..MODEL_FEATURE_COUNT {
                let z = (row[i] - self.mean[i]) / self.scale[i];
                logits[class] += coef[i] * z;
            }
        }
        let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let exp = logits.map(|l| (l - max).exp());
        let total: f64 = exp.iter().sum();
        Prob3::new(exp[0] / total, exp[1] / total, exp[2] / total)
    }
}

fn to_input(values: &[f64], what: &str) -> Result<ModelInput> {
    values.try_into().map_err(|_| {
        anyhow!(
            "{what} has {} values, expected {MODEL_FEATURE_COUNT}",
            values.len()
        )
    })
}

impl OutcomeModel for SoftmaxModel {
    fn predict_proba(&self, rows: &[ModelInput]) -> Result<Vec<Prob3>> {
        Ok(rows.iter().map(|row| self.predict_row(row)).collect())
    }

    fn name(&self) -> &str {
        "softmax"
    }
}

/// Untrained fallback driven by the pre-match Elo difference.
#[derive(Debug, Clone, Copy)]
pub struct EloBaseline {
    /// Elo points added to the home side when it plays in its own country.
    pub home_advantage: f64,
    /// Draw mass when both sides are level.
    pub draw_rate: f64,
}

impl Default for EloBaseline {
    fn default() -> Self {
        Self {
            home_advantage: 100.0,
            draw_rate: 0.28,
        }
    }
}

impl EloBaseline {
    pub fn probs(&self, elo_diff: f64, home_adv: bool) -> Prob3 {
        let bonus = if home_adv { self.home_advantage } else { 0.0 };
        let e = expected_score(elo_diff + bonus, 0.0);
        let draw = self.draw_rate.clamp(0.0, 1.0) * (1.0 - (2.0 * e - 1.0).abs());
        let home = (e - draw / 2.0).max(0.0);
        let away = (1.0 - e - draw / 2.0).max(0.0);
        let total = home + draw + away;
        Prob3::new(home / total, draw / total, away / total)
    }
}

impl OutcomeModel for EloBaseline {
    fn predict_proba(&self, rows: &[ModelInput]) -> Result<Vec<Prob3>> {
        Ok(rows
            .iter()
            .map(|row| self.probs(row[IDX_ELO_DIFF], row[IDX_IS_HOME_ADV] > 0.5))
            .collect())
    }

    fn name(&self) -> &str {
        "elo_baseline"
    }
}

/// Softmax weights when a path is configured, the Elo baseline otherwise.
pub fn load_model(path: Option<&Path>) -> Result<Box<dyn OutcomeModel>> {
    match path {
        Some(path) => Ok(Box::new(SoftmaxModel::load(path)?)),
        None => {
            info!("no model weights configured; using elo baseline");
            Ok(Box::new(EloBaseline::default()))
        }
    }
}
