use polars::df;
use polars::prelude::DataFrame;
use std::collections::BTreeMap;
use std::time::Duration;
use tradegrid::config::DeployConfig;
use tradegrid::deploy::{
    overrides, AdmissionGate, CooldownDispatcher, StrategyArtifact,
};

fn oscillating_series(bars: usize) -> DataFrame {
    let closes: Vec<f64> = (0..bars)
        .map(|i| 100.0 + (i as f64 * 0.3).sin() * 10.0)
        .collect();
    df! { "close" => &closes }.unwrap()
}

fn lenient_config() -> DeployConfig {
    DeployConfig {
        min_return: -1000.0,
        min_sharpe: -1000.0,
        max_drawdown: 100.0,
        min_win_rate: 0.0,
        backtest_hours: 120,
        action_cooldown_secs: 900,
    }
}

#[test]
fn gate_rejects_with_named_metric_and_values() {
    let dir = tempfile::tempdir().unwrap();
    let config = DeployConfig {
        min_win_rate: 101.0, // unattainable
        ..lenient_config()
    };
    let gate = AdmissionGate::new(config, dir.path());

    let outcome = gate.deploy_strategy(&[0.0; 10], "s1", &oscillating_series(300));
    assert!(!outcome.success);
    assert!(outcome.message.contains("win_rate"));
    assert!(outcome.message.contains("101"));
    // No artifact for a rejected strategy.
    assert!(!dir.path().join("strategy_s1.json").exists());
}

#[test]
fn gate_accepts_and_persists_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let gate = AdmissionGate::new(lenient_config(), dir.path());

    let outcome = gate.deploy_strategy(&[0.0; 10], "alpha-1", &oscillating_series(300));
    assert!(outcome.success, "rejected: {}", outcome.message);

    let raw = std::fs::read_to_string(dir.path().join("strategy_alpha-1.json")).unwrap();
    let artifact: StrategyArtifact = serde_json::from_str(&raw).unwrap();
    assert_eq!(artifact.strategy_id, "alpha-1");
    assert!(artifact.params.in_bounds());
    assert!(artifact.metrics.total_return.is_finite());
}

#[test]
fn override_file_takes_precedence_per_key() {
    let dir = tempfile::tempdir().unwrap();
    let mut values = BTreeMap::new();
    values.insert(overrides::KEY_MIN_RETURN.to_string(), 5.5);
    overrides::write_overrides(dir.path(), &values).unwrap();

    let gate = AdmissionGate::new(DeployConfig::default(), dir.path());
    let effective = gate.effective_thresholds();
    assert_eq!(effective.min_return, 5.5);
    assert_eq!(effective.min_sharpe, 0.5);
    assert_eq!(effective.max_drawdown, 25.0);
    assert_eq!(effective.min_win_rate, 40.0);
    assert_eq!(effective.backtest_hours, 168);
}

#[test]
fn redeploy_same_id_overwrites_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let gate = AdmissionGate::new(lenient_config(), dir.path());
    let data = oscillating_series(300);

    assert!(gate.deploy_strategy(&[0.0; 10], "dup", &data).success);
    assert!(gate.deploy_strategy(&[0.1; 10], "dup", &data).success);

    // Last write wins; the artifact reflects the second solution.
    let raw = std::fs::read_to_string(dir.path().join("strategy_dup.json")).unwrap();
    let artifact: StrategyArtifact = serde_json::from_str(&raw).unwrap();
    assert_eq!(artifact.solution, vec![0.1; 10]);
}

#[test]
fn cooldown_blocks_then_releases() {
    let mut dispatcher = CooldownDispatcher::new(Duration::from_millis(50));
    dispatcher.register("restart_optimizer", || Ok("restarted".to_string()));

    let first = dispatcher.execute_auto_fix_action("restart_optimizer");
    assert!(first.success);

    let second = dispatcher.execute_auto_fix_action("restart_optimizer");
    assert!(!second.success);
    assert!(second.message.contains("cooldown"));

    std::thread::sleep(Duration::from_millis(60));
    let third = dispatcher.execute_auto_fix_action("restart_optimizer");
    assert!(third.success);
}
