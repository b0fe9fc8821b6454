use anyhow::{bail, Context};
use tradegrid::config::ConfigManager;
use tradegrid::data::CsvConnector;
use tradegrid::optimizer::OptimizerController;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 2 {
        bail!("usage: tradegrid <config.yaml> <market_data.csv> [iterations] [state_dir]");
    }
    let config_path = &args[0];
    let data_path = &args[1];
    let iterations: usize = args
        .get(2)
        .map(|s| s.parse())
        .transpose()
        .context("iterations must be an integer")?
        .unwrap_or(100);
    let state_dir = args
        .get(3)
        .map(String::as_str)
        .unwrap_or("tradegrid_state");

    let manager = ConfigManager::new();
    manager
        .load_from_file(config_path)
        .with_context(|| format!("loading {}", config_path))?;
    let config = manager.get();

    let data = CsvConnector::load_and_validate(data_path, 100)
        .with_context(|| format!("loading {}", data_path))?;
    log::info!("loaded {} bars from {}", data.height(), data_path);

    let mut controller = OptimizerController::new(config.ribs, state_dir)?;
    if controller.resume_from_latest() {
        log::info!("resumed from latest checkpoint");
    }

    let elites = controller.run_optimization_cycle(&data, iterations)?;
    let stats = controller.get_archive_stats();

    println!(
        "optimization complete: {} elites, coverage {:.1}%, best objective {:.2}",
        stats.num_elites,
        stats.coverage * 100.0,
        stats.best_objective
    );
    for elite in elites.iter().take(5) {
        println!(
            "  {}: objective {:.2}, sharpe {:.2}, drawdown {:.1}%, win rate {:.1}%",
            elite.id, elite.objective, elite.behavior[0], elite.behavior[1], elite.behavior[2]
        );
    }

    Ok(())
}
