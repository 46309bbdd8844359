//! Out-of-time evaluation of a model on the feature table.

use anyhow::{Context, Result, bail};
use chrono::Datelike;
use tracing::info;

use crate::calibration::{
    CalibrationBin, Metrics, Outcome, Prob3, argmax, calibration_bins, empirical_outcome_probs,
    evaluate_probs,
};
use crate::classifier::{OutcomeModel, predict_checked};
use crate::features::{DropCounts, FeatureRow, model_ready};

pub const DEFAULT_TEST_FROM_YEAR: i32 = 2024;
pub const DEFAULT_CALIBRATION_BINS: usize = 10;

/// A test-period row with the model's probabilities and the actual result.
#[derive(Debug, Clone)]
pub struct ScoredRow<'a> {
    pub row: &'a FeatureRow,
    pub probs: Prob3,
    pub outcome: Outcome,
}

#[derive(Debug, Clone)]
pub struct ScoredSplit<'a> {
    pub train_outcomes: Vec<Outcome>,
    pub test: Vec<ScoredRow<'a>>,
    pub drops: DropCounts,
}

/// Splits model-ready rows with a known result at `test_from_year` and scores
/// the later part.
pub fn score_test_rows<'a>(
    rows: &'a [FeatureRow],
    model: &dyn OutcomeModel,
    test_from_year: i32,
) -> Result<ScoredSplit<'a>> {
    let ready = model_ready(rows);
    let mut train_outcomes = Vec::new();
    let mut test_rows = Vec::new();
    let mut test_inputs = Vec::new();

    for (row, input) in ready.rows.iter().zip(&ready.inputs) {
        let Some(outcome) = row.target.and_then(Outcome::from_target) else {
            continue;
        };
        if row.date.year() < test_from_year {
            train_outcomes.push(outcome);
        } else {
            test_rows.push((*row, outcome));
            test_inputs.push(*input);
        }
    }

    let probs = predict_checked(model, &test_inputs).context("score test period")?;
    let test = test_rows
        .into_iter()
        .zip(probs)
        .map(|((row, outcome), probs)| ScoredRow {
            row,
            probs,
            outcome,
        })
        .collect();

    Ok(ScoredSplit {
        train_outcomes,
        test,
        drops: ready.drops,
    })
}

#[derive(Debug, Clone)]
pub struct Evaluation {
    pub train_rows: usize,
    pub test_rows: usize,
    pub drops: DropCounts,
    pub metrics: Metrics,
    /// Scores of always predicting the training-period outcome frequencies.
    pub prior_metrics: Metrics,
    pub train_frequencies: Prob3,
    /// `confusion[actual][predicted]`, indexed by class target.
    pub confusion: [[usize; 3]; 3],
    pub calibration: Vec<(Outcome, Vec<CalibrationBin>)>,
}

impl Evaluation {
    /// Share of actual `class` results the model picked.
    pub fn recall(&self, class: Outcome) -> f64 {
        let row = self.confusion[class.target() as usize];
        let total: usize = row.iter().sum();
        if total == 0 {
            return 0.0;
        }
        row[class.target() as usize] as f64 / total as f64
    }

    /// Share of `class` picks that were right.
    pub fn precision(&self, class: Outcome) -> f64 {
        let c = class.target() as usize;
        let picked: usize = self.confusion.iter().map(|r| r[c]).sum();
        if picked == 0 {
            return 0.0;
        }
        self.confusion[c][c] as f64 / picked as f64
    }
}

pub fn evaluate(
    rows: &[FeatureRow],
    model: &dyn OutcomeModel,
    test_from_year: i32,
    bins: usize,
) -> Result<Evaluation> {
    let split = score_test_rows(rows, model, test_from_year)?;
    if split.test.is_empty() {
        bail!("no model-ready rows dated {test_from_year} or later");
    }

    let probs: Vec<Prob3> = split.test.iter().map(|s| s.probs).collect();
    let outcomes: Vec<Outcome> = split.test.iter().map(|s| s.outcome).collect();
    let metrics = evaluate_probs(&probs, &outcomes);

    let train_frequencies = empirical_outcome_probs(&split.train_outcomes);
    let prior_metrics = evaluate_probs(&vec![train_frequencies; outcomes.len()], &outcomes);

    let mut confusion = [[0usize; 3]; 3];
    for (p, actual) in probs.iter().zip(&outcomes) {
        confusion[actual.target() as usize][argmax(*p).target() as usize] += 1;
    }

    let calibration = [Outcome::Home, Outcome::Draw, Outcome::Away]
        .into_iter()
        .map(|class| (class, calibration_bins(&probs, &outcomes, class, bins)))
        .collect();

    info!(
        model = model.name(),
        train = split.train_outcomes.len(),
        test = outcomes.len(),
        brier = metrics.brier,
        log_loss = metrics.log_loss,
        accuracy = metrics.accuracy,
        prior_log_loss = prior_metrics.log_loss,
        "evaluated model"
    );

    Ok(Evaluation {
        train_rows: split.train_outcomes.len(),
        test_rows: outcomes.len(),
        drops: split.drops,
        metrics,
        prior_metrics,
        train_frequencies,
        confusion,
        calibration,
    })
}
