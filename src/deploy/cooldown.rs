use super::gate::DeployOutcome;
use crate::config::DeployConfig;
use crate::error::Result;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

type AutoFixHandler = Box<dyn Fn() -> Result<String> + Send + Sync>;

/// Hysteresis state of one action key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionState {
    Idle,
    /// Invoked within the cooldown window; `remaining` until it can
    /// fire again.
    RecentlyTriggered { remaining: Duration },
}

/// Cooldown-guarded dispatcher for auto-remediation actions.
///
/// Each key transitions `Idle -> RecentlyTriggered` on invocation and
/// back once the cooldown window elapses; a trigger during
/// `RecentlyTriggered` is rejected without running the handler. This is
/// what prevents oscillating auto-fixes. Callable from concurrent
/// request handlers: the state map lives behind a mutex.
pub struct CooldownDispatcher {
    cooldown: Duration,
    handlers: HashMap<String, AutoFixHandler>,
    last_invoked: Mutex<HashMap<String, Instant>>,
}

impl CooldownDispatcher {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            handlers: HashMap::new(),
            last_invoked: Mutex::new(HashMap::new()),
        }
    }

    /// Dispatcher whose window is the configured `action_cooldown_secs`.
    pub fn from_config(config: &DeployConfig) -> Self {
        Self::new(Duration::from_secs(config.action_cooldown_secs))
    }

    pub fn register<F>(&mut self, key: impl Into<String>, handler: F)
    where
        F: Fn() -> Result<String> + Send + Sync + 'static,
    {
        self.handlers.insert(key.into(), Box::new(handler));
    }

    /// Current hysteresis state for a key.
    pub fn action_state(&self, key: &str) -> ActionState {
        let last_invoked = self.last_invoked.lock().unwrap();
        match last_invoked.get(key) {
            Some(&at) => {
                let elapsed = at.elapsed();
                if elapsed < self.cooldown {
                    ActionState::RecentlyTriggered {
                        remaining: self.cooldown - elapsed,
                    }
                } else {
                    ActionState::Idle
                }
            }
            None => ActionState::Idle,
        }
    }

    /// Invoke the handler for `key` unless it is cooling down.
    ///
    /// The invocation time is recorded on every successful dispatch;
    /// retrying during the window keeps being rejected rather than
    /// extending or bypassing it.
    pub fn execute_auto_fix_action(&self, key: &str) -> DeployOutcome {
        let handler = match self.handlers.get(key) {
            Some(handler) => handler,
            None => {
                return DeployOutcome::rejected(format!("unknown auto-fix action {:?}", key));
            }
        };

        {
            let mut last_invoked = self.last_invoked.lock().unwrap();
            if let Some(&at) = last_invoked.get(key) {
                let elapsed = at.elapsed();
                if elapsed < self.cooldown {
                    let remaining = self.cooldown - elapsed;
                    return DeployOutcome::rejected(format!(
                        "action {:?} is in cooldown for another {}s",
                        key,
                        remaining.as_secs().max(1)
                    ));
                }
            }
            last_invoked.insert(key.to_string(), Instant::now());
        }

        match handler() {
            Ok(message) => DeployOutcome::ok(message),
            Err(e) => {
                log::warn!("auto-fix action {:?} failed: {}", key, e);
                DeployOutcome::rejected(format!("action {:?} failed: {}", key, e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dispatcher(cooldown: Duration) -> CooldownDispatcher {
        let mut dispatcher = CooldownDispatcher::new(cooldown);
        dispatcher.register("restart_feed", || Ok("feed restarted".to_string()));
        dispatcher
    }

    #[test]
    fn window_comes_from_deploy_config() {
        let config = DeployConfig {
            action_cooldown_secs: 60,
            ..DeployConfig::default()
        };
        let dispatcher = CooldownDispatcher::from_config(&config);
        assert_eq!(dispatcher.cooldown, Duration::from_secs(60));
    }

    #[test]
    fn immediate_retry_hits_cooldown() {
        let dispatcher = dispatcher(Duration::from_secs(60));

        let first = dispatcher.execute_auto_fix_action("restart_feed");
        assert!(first.success);

        let second = dispatcher.execute_auto_fix_action("restart_feed");
        assert!(!second.success);
        assert!(second.message.contains("cooldown"));
    }

    #[test]
    fn action_recovers_after_window() {
        let dispatcher = dispatcher(Duration::from_millis(30));

        assert!(dispatcher.execute_auto_fix_action("restart_feed").success);
        assert!(!dispatcher.execute_auto_fix_action("restart_feed").success);

        std::thread::sleep(Duration::from_millis(40));
        assert!(dispatcher.execute_auto_fix_action("restart_feed").success);
    }

    #[test]
    fn unknown_key_is_rejected() {
        let dispatcher = dispatcher(Duration::from_secs(60));
        let outcome = dispatcher.execute_auto_fix_action("nonexistent");
        assert!(!outcome.success);
        assert!(outcome.message.contains("unknown"));
    }

    #[test]
    fn state_machine_view_transitions() {
        let dispatcher = dispatcher(Duration::from_millis(30));
        assert_eq!(dispatcher.action_state("restart_feed"), ActionState::Idle);

        dispatcher.execute_auto_fix_action("restart_feed");
        assert!(matches!(
            dispatcher.action_state("restart_feed"),
            ActionState::RecentlyTriggered { .. }
        ));

        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(dispatcher.action_state("restart_feed"), ActionState::Idle);
    }

    #[test]
    fn keys_cool_down_independently() {
        let mut dispatcher = CooldownDispatcher::new(Duration::from_secs(60));
        dispatcher.register("a", || Ok("a done".to_string()));
        dispatcher.register("b", || Ok("b done".to_string()));

        assert!(dispatcher.execute_auto_fix_action("a").success);
        assert!(dispatcher.execute_auto_fix_action("b").success);
        assert!(!dispatcher.execute_auto_fix_action("a").success);
    }

    #[test]
    fn handler_failure_still_records_invocation() {
        let mut dispatcher = CooldownDispatcher::new(Duration::from_secs(60));
        dispatcher.register("flaky", || {
            Err(crate::error::TradeGridError::Search("boom".to_string()))
        });

        let first = dispatcher.execute_auto_fix_action("flaky");
        assert!(!first.success);
        assert!(first.message.contains("boom"));

        // The failed attempt consumed the window; retry sees cooldown.
        let second = dispatcher.execute_auto_fix_action("flaky");
        assert!(second.message.contains("cooldown"));
    }
}
