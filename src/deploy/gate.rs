use super::cooldown::{ActionState, CooldownDispatcher};
use super::overrides::effective_thresholds;
use crate::backtest::Backtester;
use crate::config::DeployConfig;
use crate::error::Result;
use crate::optimizer::{decode_solution, StrategyParams};
use crate::types::BacktestMetrics;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Result of an admission decision or an auto-fix dispatch. Rejections
/// are ordinary outcomes, not errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployOutcome {
    pub success: bool,
    pub message: String,
}

impl DeployOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Accepted-strategy artifact persisted for the external deployment
/// mechanism.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyArtifact {
    pub strategy_id: String,
    pub params: StrategyParams,
    pub solution: Vec<f64>,
    pub objective: f64,
    pub behavior: [f64; 3],
    pub metrics: BacktestMetrics,
    pub accepted_at: chrono::DateTime<chrono::Utc>,
}

/// Gate between a discovered elite and a live strategy: re-runs the
/// backtest fresh and compares every metric against the effective
/// thresholds (defaults merged with persisted overrides).
pub struct AdmissionGate {
    defaults: DeployConfig,
    state_dir: PathBuf,
    backtester: Backtester,
    dispatcher: CooldownDispatcher,
}

impl AdmissionGate {
    pub fn new(defaults: DeployConfig, state_dir: impl Into<PathBuf>) -> Self {
        Self {
            dispatcher: CooldownDispatcher::from_config(&defaults),
            defaults,
            state_dir: state_dir.into(),
            backtester: Backtester::default(),
        }
    }

    /// Register an auto-remediation handler under `key`.
    pub fn register_auto_fix<F>(&mut self, key: impl Into<String>, handler: F)
    where
        F: Fn() -> Result<String> + Send + Sync + 'static,
    {
        self.dispatcher.register(key, handler);
    }

    /// Invoke a registered auto-fix action, subject to the configured
    /// `action_cooldown_secs` window.
    pub fn execute_auto_fix_action(&self, key: &str) -> DeployOutcome {
        self.dispatcher.execute_auto_fix_action(key)
    }

    pub fn action_state(&self, key: &str) -> ActionState {
        self.dispatcher.action_state(key)
    }

    /// Thresholds in force right now (overrides win per key).
    pub fn effective_thresholds(&self) -> DeployConfig {
        effective_thresholds(&self.defaults, &self.state_dir)
    }

    /// Decide whether `solution` may be promoted to a live strategy.
    ///
    /// Checks run in a fixed order and stop at the first failure, whose
    /// message names the metric and the required vs. actual values. On
    /// acceptance the strategy artifact is persisted atomically;
    /// concurrent deploys of the same id are last-write-wins.
    pub fn deploy_strategy(
        &self,
        solution: &[f64],
        strategy_id: &str,
        data: &DataFrame,
    ) -> DeployOutcome {
        let thresholds = self.effective_thresholds();
        let params = decode_solution(solution);

        if data.height() < thresholds.backtest_hours {
            return DeployOutcome::rejected(format!(
                "insufficient lookback window: required {} bars, got {}",
                thresholds.backtest_hours,
                data.height()
            ));
        }

        let window = data.tail(Some(thresholds.backtest_hours));
        let metrics = match self.backtester.run(&params, &window) {
            Ok(metrics) => metrics,
            Err(e) => {
                return DeployOutcome::rejected(format!("admission backtest failed: {}", e));
            }
        };

        if metrics.total_return < thresholds.min_return {
            return DeployOutcome::rejected(format!(
                "total_return {:.2}% below required {:.2}%",
                metrics.total_return, thresholds.min_return
            ));
        }
        if metrics.sharpe_ratio < thresholds.min_sharpe {
            return DeployOutcome::rejected(format!(
                "sharpe_ratio {:.2} below required {:.2}",
                metrics.sharpe_ratio, thresholds.min_sharpe
            ));
        }
        if metrics.max_drawdown > thresholds.max_drawdown {
            return DeployOutcome::rejected(format!(
                "max_drawdown {:.2}% above allowed {:.2}%",
                metrics.max_drawdown, thresholds.max_drawdown
            ));
        }
        if metrics.win_rate < thresholds.min_win_rate {
            return DeployOutcome::rejected(format!(
                "win_rate {:.2}% below required {:.2}%",
                metrics.win_rate, thresholds.min_win_rate
            ));
        }

        let artifact = StrategyArtifact {
            strategy_id: strategy_id.to_string(),
            params,
            solution: solution.to_vec(),
            objective: metrics.total_return,
            behavior: metrics.behavior(),
            metrics,
            accepted_at: chrono::Utc::now(),
        };
        match self.persist_artifact(&artifact) {
            Ok(path) => DeployOutcome::ok(format!(
                "strategy {} accepted; artifact at {}",
                strategy_id,
                path.display()
            )),
            Err(e) => DeployOutcome::rejected(format!(
                "strategy {} passed all checks but could not be persisted: {}",
                strategy_id, e
            )),
        }
    }

    fn persist_artifact(&self, artifact: &StrategyArtifact) -> Result<PathBuf> {
        fs::create_dir_all(&self.state_dir)?;
        let path = self
            .state_dir
            .join(format!("strategy_{}.json", artifact.strategy_id));
        let tmp = path.with_extension("json.tmp");
        let payload = serde_json::to_vec_pretty(artifact)?;
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&payload)?;
            file.flush()?;
        }
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::df;

    fn lenient_config() -> DeployConfig {
        DeployConfig {
            min_return: -1000.0,
            min_sharpe: -1000.0,
            max_drawdown: 100.0,
            min_win_rate: 0.0,
            backtest_hours: 100,
            action_cooldown_secs: 900,
        }
    }

    fn market_data(bars: usize) -> DataFrame {
        let closes: Vec<f64> = (0..bars)
            .map(|i| 100.0 + (i as f64 * 0.3).sin() * 10.0)
            .collect();
        df! { "close" => &closes }.unwrap()
    }

    #[test]
    fn short_window_rejected_naming_lookback() {
        let dir = tempfile::tempdir().unwrap();
        let gate = AdmissionGate::new(DeployConfig::default(), dir.path());
        let outcome = gate.deploy_strategy(&[0.0; 10], "s1", &market_data(50));
        assert!(!outcome.success);
        assert!(outcome.message.contains("lookback"));
    }

    #[test]
    fn failing_metric_named_in_rejection() {
        let dir = tempfile::tempdir().unwrap();
        let config = DeployConfig {
            min_return: 1_000_000.0,
            ..lenient_config()
        };
        let gate = AdmissionGate::new(config, dir.path());
        let outcome = gate.deploy_strategy(&[0.0; 10], "s1", &market_data(150));
        assert!(!outcome.success);
        assert!(outcome.message.contains("total_return"));
        assert!(outcome.message.contains("1000000"));
    }

    #[test]
    fn acceptance_persists_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let gate = AdmissionGate::new(lenient_config(), dir.path());
        let outcome = gate.deploy_strategy(&[0.0; 10], "winner", &market_data(150));
        assert!(outcome.success, "unexpected rejection: {}", outcome.message);

        let artifact_path = dir.path().join("strategy_winner.json");
        assert!(artifact_path.exists());
        let artifact: StrategyArtifact =
            serde_json::from_str(&fs::read_to_string(artifact_path).unwrap()).unwrap();
        assert_eq!(artifact.strategy_id, "winner");
        assert!(artifact.params.in_bounds());
        assert_eq!(artifact.solution.len(), 10);
    }

    #[test]
    fn auto_fix_uses_configured_cooldown() {
        let dir = tempfile::tempdir().unwrap();

        // A zero-second window never blocks.
        let config = DeployConfig {
            action_cooldown_secs: 0,
            ..DeployConfig::default()
        };
        let mut gate = AdmissionGate::new(config, dir.path());
        gate.register_auto_fix("restart_optimizer", || Ok("restarted".to_string()));
        assert!(gate.execute_auto_fix_action("restart_optimizer").success);
        assert!(gate.execute_auto_fix_action("restart_optimizer").success);

        // A long window blocks the immediate retry.
        let config = DeployConfig {
            action_cooldown_secs: 3600,
            ..DeployConfig::default()
        };
        let mut gate = AdmissionGate::new(config, dir.path());
        gate.register_auto_fix("restart_optimizer", || Ok("restarted".to_string()));
        assert!(gate.execute_auto_fix_action("restart_optimizer").success);
        let retry = gate.execute_auto_fix_action("restart_optimizer");
        assert!(!retry.success);
        assert!(retry.message.contains("cooldown"));
        assert!(matches!(
            gate.action_state("restart_optimizer"),
            ActionState::RecentlyTriggered { .. }
        ));
    }

    #[test]
    fn overrides_tighten_the_gate() {
        let dir = tempfile::tempdir().unwrap();
        // Lenient defaults, but an override demands an impossible return.
        let mut overrides = std::collections::BTreeMap::new();
        overrides.insert(
            super::super::overrides::KEY_MIN_RETURN.to_string(),
            1_000_000.0,
        );
        super::super::overrides::write_overrides(dir.path(), &overrides).unwrap();

        let gate = AdmissionGate::new(lenient_config(), dir.path());
        let outcome = gate.deploy_strategy(&[0.0; 10], "s1", &market_data(150));
        assert!(!outcome.success);
        assert!(outcome.message.contains("total_return"));
    }
}
