use anyhow::{Context, Result};

use afcon_forecast::classifier::load_model;
use afcon_forecast::config::{PipelineConfig, init_tracing};
use afcon_forecast::features::read_feature_table;
use afcon_forecast::simulation::{
    Bracket, HistorySnapshots, PairwiseTable, TournamentContext, simulate, write_advancement,
};
use afcon_forecast::travel::TravelEstimator;

fn main() -> Result<()> {
    init_tracing();
    let cfg = PipelineConfig::load();

    let rows = read_feature_table(&cfg.features_path)?;
    let bracket = Bracket::load(&cfg.bracket_path)?;
    let model = load_model(cfg.model_path.as_deref())?;

    let history = HistorySnapshots::from_rows(&rows);
    let ctx = TournamentContext {
        date: history
            .last_date()
            .context("feature table is empty; run the pipeline first")?,
        tournament: cfg.tournament.clone(),
        host_country: cfg.host_country.clone(),
        host_city: cfg.host_city.clone(),
        travel: TravelEstimator::new(&cfg.host_city)?,
    };
    let table = PairwiseTable::build(&bracket, &history, &ctx, model.as_ref())?;
    let report = simulate(&bracket, &table, &cfg.simulation_config())?;
    write_advancement(&cfg.simulation_path, &report.advancement)?;

    println!(
        "{} runs from the {}, seed {}{}",
        report.runs,
        report.first_round.label(),
        report.base_seed,
        if report.reproducible { "" } else { " (unseeded)" }
    );
    println!(
        "{:<26} {:>8} {:>8} {:>8} {:>8}",
        "team", "QF", "SF", "F", "champ"
    );
    for row in &report.advancement {
        println!(
            "{:<26} {:>7.1}% {:>7.1}% {:>7.1}% {:>7.1}%",
            row.team,
            row.quarterfinal * 100.0,
            row.semifinal * 100.0,
            row.final_ * 100.0,
            row.champion * 100.0
        );
    }
    Ok(())
}
