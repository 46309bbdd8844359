use anyhow::Result;
use tracing::info;

use afcon_forecast::calibration::Outcome;
use afcon_forecast::classifier::load_model;
use afcon_forecast::config::{PipelineConfig, init_tracing};
use afcon_forecast::dataset::{load_matches, load_rankings};
use afcon_forecast::evaluate::{DEFAULT_CALIBRATION_BINS, evaluate};
use afcon_forecast::features::{FeatureBuilder, write_feature_table};
use afcon_forecast::quality::QualityReport;
use afcon_forecast::rankings::RankingBook;
use afcon_forecast::squad::SquadBook;

fn main() -> Result<()> {
    init_tracing();
    let cfg = PipelineConfig::load();

    let matches = load_matches(&cfg.matches_path)?;
    let rankings = RankingBook::new(load_rankings(&cfg.rankings_path)?);

    let squads = SquadBook::load_or_absent(&cfg.squad_path)?;
    let mut builder =
        FeatureBuilder::new(rankings, cfg.feature_config()?).with_squads(squads);
    let rows = builder.ingest_history(&matches)?;
    write_feature_table(&cfg.features_path, &rows)?;

    QualityReport::build(&matches, builder.rankings(), &rows).log();

    let top = builder.elo().table();
    for (team, rating) in top.iter().take(10) {
        info!(%team, rating = format!("{rating:.1}"), "elo");
    }

    if cfg.model_path.is_none() {
        info!("no model configured; skipping evaluation");
        return Ok(());
    }
    let model = load_model(cfg.model_path.as_deref())?;
    let eval = evaluate(
        &rows,
        model.as_ref(),
        cfg.test_from_year,
        DEFAULT_CALIBRATION_BINS,
    )?;

    println!(
        "Test rows: {} (train {}), from {}",
        eval.test_rows, eval.train_rows, cfg.test_from_year
    );
    println!(
        "Brier {:.4}  log-loss {:.4}  accuracy {:.1}%",
        eval.metrics.brier,
        eval.metrics.log_loss,
        eval.metrics.accuracy * 100.0
    );
    println!(
        "Prior  Brier {:.4}  log-loss {:.4}",
        eval.prior_metrics.brier, eval.prior_metrics.log_loss
    );
    for class in [Outcome::Home, Outcome::Draw, Outcome::Away] {
        println!(
            "{class:?}: precision {:.1}%  recall {:.1}%",
            eval.precision(class) * 100.0,
            eval.recall(class) * 100.0
        );
    }
    for (class, bins) in &eval.calibration {
        for bin in bins.iter().filter(|b| b.count > 0) {
            println!(
                "{class:?} [{:.1}, {:.1}): n={} pred {:.3} actual {:.3}",
                bin.bucket_start, bin.bucket_end, bin.count, bin.avg_pred, bin.actual_rate
            );
        }
    }
    Ok(())
}
