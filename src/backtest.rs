//! Flat-stake betting replay over the test period.
//!
//! No historical odds are available, so each bet is settled at the model's own
//! fair price shaded by a bookmaker margin.

use anyhow::Result;
use tracing::info;

use crate::calibration::argmax;
use crate::classifier::OutcomeModel;
use crate::evaluate::{ScoredRow, score_test_rows};
use crate::features::FeatureRow;

pub const BOOKMAKER_MARGIN: f64 = 0.95;
pub const DEFAULT_STAKE: f64 = 10.0;
pub const DEFAULT_THRESHOLDS: [f64; 3] = [0.5, 0.6, 0.7];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BacktestResult {
    pub threshold: f64,
    pub bets: usize,
    pub wins: usize,
    pub hit_rate: f64,
    pub profit: f64,
    /// Profit over total staked, in percent.
    pub roi_pct: f64,
}

/// Bets `stake` on the favourite of every row whose top probability reaches
/// `threshold`, at odds `(1 / p) * BOOKMAKER_MARGIN`.
pub fn settle(scored: &[ScoredRow<'_>], threshold: f64, stake: f64) -> BacktestResult {
    let mut bets = 0usize;
    let mut wins = 0usize;
    let mut profit = 0.0;

    for s in scored {
        let p = s.probs.max();
        if p < threshold || p <= 0.0 {
            continue;
        }
        bets += 1;
        if argmax(s.probs) == s.outcome {
            wins += 1;
            profit += stake * ((1.0 / p) * BOOKMAKER_MARGIN - 1.0);
        } else {
            profit -= stake;
        }
    }

    let (hit_rate, roi_pct) = if bets == 0 {
        (0.0, 0.0)
    } else {
        (
            wins as f64 / bets as f64,
            profit / (bets as f64 * stake) * 100.0,
        )
    };
    BacktestResult {
        threshold,
        bets,
        wins,
        hit_rate,
        profit,
        roi_pct,
    }
}

/// Scores the test period once and settles every threshold against it.
pub fn backtest(
    rows: &[FeatureRow],
    model: &dyn OutcomeModel,
    test_from_year: i32,
    thresholds: &[f64],
    stake: f64,
) -> Result<Vec<BacktestResult>> {
    let split = score_test_rows(rows, model, test_from_year)?;
    let results = thresholds
        .iter()
        .map(|t| settle(&split.test, *t, stake))
        .collect::<Vec<_>>();
    for r in &results {
        info!(
            threshold = r.threshold,
            bets = r.bets,
            hit_rate = r.hit_rate,
            profit = r.profit,
            roi_pct = r.roi_pct,
            "backtest"
        );
    }
    Ok(results)
}
