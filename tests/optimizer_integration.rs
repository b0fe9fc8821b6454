use polars::df;
use polars::prelude::DataFrame;
use tradegrid::config::SearchConfig;
use tradegrid::optimizer::{
    check_checkpoint_freshness, read_status, FreshnessStatus, OptimizerController,
};
use tradegrid::search::{ArchiveStats, SearchBackend};
use tradegrid::types::EliteStrategy;

fn rising_series(bars: usize) -> DataFrame {
    let closes: Vec<f64> = (0..bars).map(|i| 100.0 + i as f64).collect();
    df! { "close" => &closes }.unwrap()
}

fn oscillating_series(bars: usize) -> DataFrame {
    let closes: Vec<f64> = (0..bars)
        .map(|i| 100.0 + (i as f64 * 0.3).sin() * 10.0)
        .collect();
    df! { "close" => &closes }.unwrap()
}

fn small_config() -> SearchConfig {
    SearchConfig {
        num_emitters: 2,
        batch_size: 4,
        progress_interval: 1,
        checkpoint_interval: 1,
        ..Default::default()
    }
}

#[test]
fn cycle_completes_and_finalizes_status() {
    let dir = tempfile::tempdir().unwrap();
    let mut controller = OptimizerController::new(small_config(), dir.path()).unwrap();

    let data = rising_series(150);
    let elites = controller.run_optimization_cycle(&data, 2).unwrap();

    // The run returns a (possibly empty) elite list and always leaves a
    // finalized status document behind.
    let status = read_status(dir.path()).unwrap();
    assert!(!status.running);
    assert_eq!(status.progress_percent, 100.0);
    assert!(status.error.is_none());
    assert_eq!(status.elites.len(), elites.len());
    assert_eq!(status.objectives.len(), elites.len());
    assert_eq!(status.behaviors_x.len(), elites.len());
}

#[test]
fn cycle_populates_archive_on_tradeable_data() {
    let dir = tempfile::tempdir().unwrap();
    let mut controller = OptimizerController::new(small_config(), dir.path()).unwrap();

    controller
        .run_optimization_cycle(&oscillating_series(300), 5)
        .unwrap();

    let stats = controller.get_archive_stats();
    assert!(stats.num_elites > 0, "archive stayed empty");
    assert!(stats.coverage > 0.0);
    assert!(controller.best_objective().is_finite());
    assert!(controller.best_solution().is_some());
}

#[test]
fn elites_get_stable_synthetic_ids() {
    let dir = tempfile::tempdir().unwrap();
    let mut controller = OptimizerController::new(small_config(), dir.path()).unwrap();
    controller
        .run_optimization_cycle(&oscillating_series(300), 5)
        .unwrap();

    let elites = controller.get_elite_strategies(10);
    for (n, elite) in elites.iter().enumerate() {
        assert_eq!(elite.id, format!("ribs_elite_{}", n));
        assert!(elite.params.in_bounds());
        assert_eq!(elite.solution.len(), 10);
    }
}

#[test]
fn checkpoints_are_fresh_after_a_run() {
    let dir = tempfile::tempdir().unwrap();
    let mut controller = OptimizerController::new(small_config(), dir.path()).unwrap();
    controller
        .run_optimization_cycle(&rising_series(150), 2)
        .unwrap();

    let report = check_checkpoint_freshness(dir.path(), 300.0);
    assert_eq!(report.status, FreshnessStatus::Ok);
    assert!(report.latest_checkpoint.is_some());
    assert!(report.age_seconds.unwrap() < 60.0);
}

#[test]
fn freshness_is_missing_before_any_run() {
    let dir = tempfile::tempdir().unwrap();
    let report = check_checkpoint_freshness(dir.path(), 300.0);
    assert_eq!(report.status, FreshnessStatus::Missing);
}

#[test]
fn short_data_still_completes_with_penalties() {
    let dir = tempfile::tempdir().unwrap();
    let mut controller = OptimizerController::new(small_config(), dir.path()).unwrap();

    // 10 bars is far below the backtest minimum; every candidate gets
    // the penalty objective but the loop itself must not fail.
    let elites = controller
        .run_optimization_cycle(&rising_series(10), 2)
        .unwrap();
    assert!(elites.is_empty());

    let status = read_status(dir.path()).unwrap();
    assert!(!status.running);
    assert_eq!(status.archive_stats.num_elites, 0);
}

/// Backend that cannot propose candidates, aborting the loop at once.
struct StalledBackend;

impl SearchBackend for StalledBackend {
    fn ask(&mut self) -> Vec<Vec<f64>> {
        Vec::new()
    }

    fn tell(&mut self, _: &[f64], _: &[[f64; 3]]) -> tradegrid::Result<usize> {
        Ok(0)
    }

    fn stats(&self) -> ArchiveStats {
        ArchiveStats::default()
    }

    fn sample_elites(&mut self, _: usize) -> Vec<EliteStrategy> {
        Vec::new()
    }

    fn restore(&mut self, _: &[EliteStrategy]) {}
}

#[test]
fn failed_cycle_still_finalizes_status_with_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut controller = OptimizerController::with_backend(
        small_config(),
        Box::new(StalledBackend),
        dir.path(),
    );

    let result = controller.run_optimization_cycle(&rising_series(150), 5);
    assert!(result.is_err());

    // The loop aborted, but a complete non-running status document is
    // still left behind, carrying the error and the iteration reached.
    let status = read_status(dir.path()).unwrap();
    assert!(!status.running);
    assert!(status.error.is_some());
    assert_eq!(status.current_iteration, 0);
    assert!(status.progress_percent < 100.0);
}

#[test]
fn same_seed_gives_reproducible_search() {
    let data = oscillating_series(300);

    let run = |dir: &std::path::Path| {
        let mut controller = OptimizerController::new(small_config(), dir).unwrap();
        controller.run_optimization_cycle(&data, 3).unwrap();
        controller.best_objective()
    };

    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();
    assert_eq!(run(dir_a.path()), run(dir_b.path()));
}
