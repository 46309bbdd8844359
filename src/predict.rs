use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::classifier::{OutcomeModel, predict_checked};
use crate::dataset::Fixture;
use crate::features::FeatureBuilder;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRow {
    pub date: NaiveDate,
    pub home_team: String,
    pub away_team: String,
    pub p_home: f64,
    pub p_draw: f64,
    pub p_away: f64,
}

#[derive(Debug, Clone, Default)]
pub struct FixturePredictions {
    pub rows: Vec<PredictionRow>,
    /// Fixtures skipped for missing rank or form, as "home vs away".
    pub dropped: Vec<String>,
}

/// Prices upcoming fixtures from the builder's post-history state. Fixtures
/// that cannot be fully featurized are skipped.
pub fn predict_fixtures(
    builder: &FeatureBuilder,
    fixtures: &[Fixture],
    model: &dyn OutcomeModel,
) -> Result<FixturePredictions> {
    let mut kept = Vec::new();
    let mut inputs = Vec::new();
    let mut dropped = Vec::new();

    for fixture in fixtures {
        let row = builder.featurize_fixture(fixture);
        match row.model_input() {
            Some(input) => {
                kept.push(fixture);
                inputs.push(input);
            }
            None => {
                warn!(
                    date = %fixture.date,
                    home = %fixture.home_team,
                    away = %fixture.away_team,
                    "fixture lacks features; skipped"
                );
                dropped.push(format!("{} vs {}", fixture.home_team, fixture.away_team));
            }
        }
    }

    let probs = predict_checked(model, &inputs).context("predict fixtures")?;
    let rows = kept
        .into_iter()
        .zip(probs)
        .map(|(f, p)| PredictionRow {
            date: f.date,
            home_team: f.home_team.clone(),
            away_team: f.away_team.clone(),
            p_home: p.home,
            p_draw: p.draw,
            p_away: p.away,
        })
        .collect::<Vec<_>>();

    info!(
        predicted = rows.len(),
        dropped = dropped.len(),
        model = model.name(),
        "priced fixtures"
    );
    Ok(FixturePredictions { rows, dropped })
}

pub fn write_predictions(path: &Path, rows: &[PredictionRow]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create dir {}", parent.display()))?;
    }
    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    write_predictions_to(file, rows)
        .with_context(|| format!("write predictions {}", path.display()))
}

pub fn write_predictions_to<W: Write>(writer: W, rows: &[PredictionRow]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}
