use crate::optimizer::status::{check_checkpoint_freshness, FreshnessReport, FreshnessStatus};
use std::path::Path;
use std::time::Duration;

/// Environment variable carrying the alert webhook URL.
pub const WEBHOOK_ENV: &str = "RIBS_ALERT_WEBHOOK";

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(5);

/// Watches checkpoint recency and raises a best-effort webhook alert
/// when the optimizer looks stalled. Alert delivery can never affect
/// optimizer correctness: every failure is swallowed.
pub struct HealthMonitor {
    max_age_seconds: f64,
    webhook_url: Option<String>,
}

impl HealthMonitor {
    /// Webhook URL comes from `RIBS_ALERT_WEBHOOK`; unset means alerts
    /// are disabled and checks still run.
    pub fn new(max_age_seconds: f64) -> Self {
        Self {
            max_age_seconds,
            webhook_url: std::env::var(WEBHOOK_ENV).ok().filter(|u| !u.is_empty()),
        }
    }

    pub fn with_webhook(max_age_seconds: f64, webhook_url: Option<String>) -> Self {
        Self {
            max_age_seconds,
            webhook_url,
        }
    }

    /// Classify checkpoint freshness and alert on `Stale` or `Missing`.
    pub fn check_and_alert(&self, state_dir: &Path) -> FreshnessReport {
        let report = check_checkpoint_freshness(state_dir, self.max_age_seconds);
        match report.status {
            FreshnessStatus::Stale => {
                let age = report.age_seconds.unwrap_or(0.0);
                self.send_alert(&format!(
                    "optimizer checkpoint is stale: last checkpoint {:.0}s ago (limit {:.0}s)",
                    age, self.max_age_seconds
                ));
            }
            FreshnessStatus::Missing => {
                self.send_alert("optimizer status file is missing; optimizer may be down");
            }
            _ => {}
        }
        report
    }

    /// Fire-and-forget `{"text": message}` POST. Missing configuration,
    /// network failures and non-2xx responses are all logged at debug
    /// level and otherwise ignored.
    pub fn send_alert(&self, message: &str) {
        let url = match &self.webhook_url {
            Some(url) => url,
            None => {
                log::debug!("alert webhook not configured; dropping alert: {}", message);
                return;
            }
        };

        let client = match reqwest::blocking::Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                log::debug!("could not build alert client: {}", e);
                return;
            }
        };

        match client
            .post(url)
            .json(&serde_json::json!({ "text": message }))
            .send()
        {
            Ok(response) if !response.status().is_success() => {
                log::debug!("alert webhook returned {}", response.status());
            }
            Ok(_) => {}
            Err(e) => log::debug!("alert delivery failed: {}", e),
        }
    }
}
