use anyhow::Result;

use afcon_forecast::backtest::{DEFAULT_STAKE, DEFAULT_THRESHOLDS, backtest};
use afcon_forecast::classifier::load_model;
use afcon_forecast::config::{PipelineConfig, init_tracing};
use afcon_forecast::features::read_feature_table;

fn main() -> Result<()> {
    init_tracing();
    let cfg = PipelineConfig::load();

    let rows = read_feature_table(&cfg.features_path)?;
    let model = load_model(cfg.model_path.as_deref())?;
    let stake = parse_f64_arg("--stake").unwrap_or(DEFAULT_STAKE).max(0.01);

    let results = backtest(
        &rows,
        model.as_ref(),
        cfg.test_from_year,
        &DEFAULT_THRESHOLDS,
        stake,
    )?;
    for r in results {
        println!("--- threshold {:.2} ---", r.threshold);
        if r.bets == 0 {
            println!("No bets at this threshold");
            continue;
        }
        println!("Bets: {}", r.bets);
        println!("Hit rate: {:.2}%", r.hit_rate * 100.0);
        println!("Profit: {:.2}", r.profit);
        println!("ROI: {:.2}%", r.roi_pct);
    }
    Ok(())
}

fn parse_f64_arg(name: &str) -> Option<f64> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    for (idx, arg) in args.iter().enumerate() {
        if let Some(raw) = arg.strip_prefix(&format!("{name}="))
            && let Ok(v) = raw.trim().parse::<f64>()
        {
            return Some(v);
        }
        if arg == name
            && let Some(next) = args.get(idx + 1)
            && let Ok(v) = next.trim().parse::<f64>()
        {
            return Some(v);
        }
    }
    None
}
