use anyhow::Result;

use afcon_forecast::classifier::load_model;
use afcon_forecast::config::{PipelineConfig, init_tracing};
use afcon_forecast::dataset::{load_fixtures, load_matches, load_rankings};
use afcon_forecast::features::FeatureBuilder;
use afcon_forecast::predict::{predict_fixtures, write_predictions};
use afcon_forecast::rankings::RankingBook;
use afcon_forecast::squad::SquadBook;

fn main() -> Result<()> {
    init_tracing();
    let cfg = PipelineConfig::load();

    let matches = load_matches(&cfg.matches_path)?;
    let rankings = RankingBook::new(load_rankings(&cfg.rankings_path)?);
    let fixtures = load_fixtures(&cfg.fixtures_path)?;
    let model = load_model(cfg.model_path.as_deref())?;

    let squads = SquadBook::load_or_absent(&cfg.squad_path)?;
    let mut builder =
        FeatureBuilder::new(rankings, cfg.feature_config()?).with_squads(squads);
    builder.ingest_history(&matches)?;

    let out = predict_fixtures(&builder, &fixtures, model.as_ref())?;
    write_predictions(&cfg.predictions_path, &out.rows)?;

    for row in &out.rows {
        println!(
            "{} {:>24} v {:<24} H {:>5.1}%  D {:>5.1}%  A {:>5.1}%",
            row.date,
            row.home_team,
            row.away_team,
            row.p_home * 100.0,
            row.p_draw * 100.0,
            row.p_away * 100.0
        );
    }
    if !out.dropped.is_empty() {
        println!("Skipped (missing history): {}", out.dropped.join(", "));
    }
    Ok(())
}
