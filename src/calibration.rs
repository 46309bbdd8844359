use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Home,
    Draw,
    Away,
}

impl Outcome {
    /// Class index used by the feature table's `target` column.
    pub fn target(self) -> u8 {
        match self {
            Outcome::Home => 0,
            Outcome::Draw => 1,
            Outcome::Away => 2,
        }
    }

    pub fn from_target(target: u8) -> Option<Self> {
        match target {
            0 => Some(Outcome::Home),
            1 => Some(Outcome::Draw),
            2 => Some(Outcome::Away),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prob3 {
    pub home: f64,
    pub draw: f64,
    pub away: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct Metrics {
    pub samples: usize,
    pub brier: f64,
    pub log_loss: f64,
    pub accuracy: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct CalibrationBin {
    pub bucket_start: f64,
    pub bucket_end: f64,
    pub count: usize,
    pub avg_pred: f64,
    pub actual_rate: f64,
}

impl Prob3 {
    pub fn new(home: f64, draw: f64, away: f64) -> Self {
        Self { home, draw, away }
    }

    pub fn uniform() -> Self {
        Self {
            home: 1.0 / 3.0,
            draw: 1.0 / 3.0,
            away: 1.0 / 3.0,
        }
    }

    pub fn sum(&self) -> f64 {
        self.home + self.draw + self.away
    }

    pub fn get(&self, outcome: Outcome) -> f64 {
        match outcome {
            Outcome::Home => self.home,
            Outcome::Draw => self.draw,
            Outcome::Away => self.away,
        }
    }

    /// Same match seen from the other bench.
    pub fn swapped(&self) -> Self {
        Self {
            home: self.away,
            draw: self.draw,
            away: self.home,
        }
    }

    pub fn max(&self) -> f64 {
        self.home.max(self.draw).max(self.away)
    }
}

pub fn classify_outcome(home_goals: i32, away_goals: i32) -> Outcome {
    if home_goals > away_goals {
        Outcome::Home
    } else if home_goals < away_goals {
        Outcome::Away
    } else {
        Outcome::Draw
    }
}

/// Observed home/draw/away frequencies; uniform when there is nothing to count.
pub fn empirical_outcome_probs(outcomes: &[Outcome]) -> Prob3 {
    if outcomes.is_empty() {
        return Prob3::uniform();
    }
    let mut counts = [0usize; 3];
    for outcome in outcomes {
        counts[outcome.target() as usize] += 1;
    }
    let n = outcomes.len() as f64;
    Prob3::new(
        counts[0] as f64 / n,
        counts[1] as f64 / n,
        counts[2] as f64 / n,
    )
}

/// Mean multi-class Brier score, log-loss and argmax accuracy. Mismatched or
/// empty inputs give an all-zero result with `samples == 0`.
pub fn evaluate_probs(predictions: &[Prob3], outcomes: &[Outcome]) -> Metrics {
    if predictions.is_empty() || predictions.len() != outcomes.len() {
        return Metrics {
            samples: 0,
            brier: 0.0,
            log_loss: 0.0,
            accuracy: 0.0,
        };
    }

    let (brier, log_loss, correct) = predictions.iter().zip(outcomes).fold(
        (0.0_f64, 0.0_f64, 0usize),
        |(brier, log_loss, correct), (p, &actual)| {
            let squared: f64 = [Outcome::Home, Outcome::Draw, Outcome::Away]
                .into_iter()
                .map(|class| {
                    let y = if class == actual { 1.0 } else { 0.0 };
                    (p.get(class) - y).powi(2)
                })
                .sum();
            let hit = usize::from(argmax(*p) == actual);
            (
                brier + squared,
                log_loss - p.get(actual).clamp(1e-12, 1.0).ln(),
                correct + hit,
            )
        },
    );

    let n = predictions.len() as f64;
    Metrics {
        samples: predictions.len(),
        brier: brier / n,
        log_loss: log_loss / n,
        accuracy: correct as f64 / n,
    }
}

/// Reliability table for one class: equal-width probability buckets over
/// [0, 1], at least two.
pub fn calibration_bins(
    predictions: &[Prob3],
    outcomes: &[Outcome],
    class: Outcome,
    bins: usize,
) -> Vec<CalibrationBin> {
    let bins = bins.max(2);
    let width = 1.0 / bins as f64;
    let mut out: Vec<CalibrationBin> = (0..bins)
        .map(|i| CalibrationBin {
            bucket_start: i as f64 * width,
            bucket_end: (i + 1) as f64 * width,
            count: 0,
            avg_pred: 0.0,
            actual_rate: 0.0,
        })
        .collect();

    for (p, outcome) in predictions.iter().zip(outcomes) {
        let prob = p.get(class).clamp(0.0, 1.0);
        let bin = &mut out[((prob * bins as f64) as usize).min(bins - 1)];
        bin.count += 1;
        bin.avg_pred += prob;
        if *outcome == class {
            bin.actual_rate += 1.0;
        }
    }
    // Sums become means.
    for bin in out.iter_mut().filter(|b| b.count > 0) {
        bin.avg_pred /= bin.count as f64;
        bin.actual_rate /= bin.count as f64;
    }
    out
}

/// Most likely outcome; ties prefer home, then draw.
pub fn argmax(p: Prob3) -> Outcome {
    if p.home >= p.draw && p.home >= p.away {
        Outcome::Home
    } else if p.draw >= p.away {
        Outcome::Draw
    } else {
        Outcome::Away
    }
}

#[cfg(test)]
mod tests {
    use super::{Outcome, Prob3, calibration_bins, empirical_outcome_probs, evaluate_probs};

    #[test]
    fn perfect_predictions_have_zero_brier() {
        let preds = vec![
            Prob3::new(1.0, 0.0, 0.0),
            Prob3::new(0.0, 1.0, 0.0),
            Prob3::new(0.0, 0.0, 1.0),
        ];
        let outcomes = vec![Outcome::Home, Outcome::Draw, Outcome::Away];
        let m = evaluate_probs(&preds, &outcomes);
        assert_eq!(m.samples, 3);
        assert!(m.brier < 1e-12);
        assert!((m.accuracy - 1.0).abs() < 1e-12);
    }

    #[test]
    fn uniform_prediction_log_loss_is_ln3() {
        let preds = vec![Prob3::uniform(); 4];
        let outcomes = vec![Outcome::Home, Outcome::Away, Outcome::Draw, Outcome::Home];
        let m = evaluate_probs(&preds, &outcomes);
        assert!((m.log_loss - 3.0_f64.ln()).abs() < 1e-9);
    }

    #[test]
    fn bins_count_every_prediction() {
        let preds = vec![Prob3::new(0.05, 0.25, 0.70), Prob3::new(0.95, 0.04, 0.01)];
        let outcomes = vec![Outcome::Away, Outcome::Home];
        let bins = calibration_bins(&preds, &outcomes, Outcome::Home, 10);
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), 2);
        assert_eq!(bins[9].count, 1);
        assert!((bins[9].actual_rate - 1.0).abs() < 1e-12);
    }

    #[test]
    fn target_round_trips_through_index() {
        for o in [Outcome::Home, Outcome::Draw, Outcome::Away] {
            assert_eq!(Outcome::from_target(o.target()), Some(o));
        }
        assert_eq!(Outcome::from_target(7), None);
        let p = empirical_outcome_probs(&[Outcome::Home, Outcome::Home, Outcome::Draw]);
        assert!((p.home - 2.0 / 3.0).abs() < 1e-12);
    }
}
