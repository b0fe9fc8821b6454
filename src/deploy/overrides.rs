use crate::config::DeployConfig;
use crate::error::Result;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Overrides file name; part of the cross-process protocol.
pub const OVERRIDES_FILE: &str = "ribs_deploy_overrides.json";

pub const KEY_MIN_RETURN: &str = "ribs_deploy_min_return";
pub const KEY_MIN_SHARPE: &str = "ribs_deploy_min_sharpe";
pub const KEY_MAX_DRAWDOWN: &str = "ribs_deploy_max_drawdown";
pub const KEY_MIN_WIN_RATE: &str = "ribs_deploy_min_win_rate";
pub const KEY_BACKTEST_HOURS: &str = "ribs_deploy_backtest_hours";

const ALLOWED_KEYS: [&str; 5] = [
    KEY_MIN_RETURN,
    KEY_MIN_SHARPE,
    KEY_MAX_DRAWDOWN,
    KEY_MIN_WIN_RATE,
    KEY_BACKTEST_HOURS,
];

fn overrides_path(dir: &Path) -> PathBuf {
    dir.join(OVERRIDES_FILE)
}

/// Read the overrides file tolerantly: a missing file, unreadable JSON,
/// unknown keys or badly typed values all degrade to "no override".
pub fn read_overrides(dir: &Path) -> BTreeMap<String, f64> {
    let contents = match fs::read_to_string(overrides_path(dir)) {
        Ok(contents) => contents,
        Err(_) => return BTreeMap::new(),
    };
    let parsed: Value = match serde_json::from_str(&contents) {
        Ok(parsed) => parsed,
        Err(e) => {
            log::warn!("ignoring malformed overrides file: {}", e);
            return BTreeMap::new();
        }
    };
    let object = match parsed.as_object() {
        Some(object) => object,
        None => {
            log::warn!("overrides file is not a JSON object; ignoring");
            return BTreeMap::new();
        }
    };

    let mut out = BTreeMap::new();
    for (key, value) in object {
        if !ALLOWED_KEYS.contains(&key.as_str()) {
            log::warn!("ignoring unknown override key {:?}", key);
            continue;
        }
        // Accept numbers and numeric strings; anything else is dropped.
        let number = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        match number {
            Some(n) if n.is_finite() => {
                out.insert(key.clone(), n);
            }
            _ => log::warn!("ignoring non-numeric override {:?}={:?}", key, value),
        }
    }
    out
}

/// Atomically persist overrides (temp + rename), restricted to the
/// allowed keys.
pub fn write_overrides(dir: &Path, overrides: &BTreeMap<String, f64>) -> Result<()> {
    fs::create_dir_all(dir)?;
    let filtered: BTreeMap<&str, f64> = overrides
        .iter()
        .filter(|(k, _)| ALLOWED_KEYS.contains(&k.as_str()))
        .map(|(k, &v)| (k.as_str(), v))
        .collect();

    let path = overrides_path(dir);
    let tmp = path.with_extension("json.tmp");
    let payload = serde_json::to_vec_pretty(&filtered)?;
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(&payload)?;
        file.flush()?;
    }
    if let Err(e) = fs::rename(&tmp, &path) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

/// Compiled-in defaults with per-key overrides applied.
pub fn effective_thresholds(defaults: &DeployConfig, dir: &Path) -> DeployConfig {
    let overrides = read_overrides(dir);
    let mut effective = *defaults;
    if let Some(&v) = overrides.get(KEY_MIN_RETURN) {
        effective.min_return = v;
    }
    if let Some(&v) = overrides.get(KEY_MIN_SHARPE) {
        effective.min_sharpe = v;
    }
    if let Some(&v) = overrides.get(KEY_MAX_DRAWDOWN) {
        effective.max_drawdown = v;
    }
    if let Some(&v) = overrides.get(KEY_MIN_WIN_RATE) {
        effective.min_win_rate = v;
    }
    if let Some(&v) = overrides.get(KEY_BACKTEST_HOURS) {
        // Integer-valued key; round rather than truncate.
        effective.backtest_hours = v.round().max(1.0) as usize;
    }
    effective
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_overrides(dir.path()).is_empty());
    }

    #[test]
    fn malformed_json_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(OVERRIDES_FILE), b"{oops").unwrap();
        assert!(read_overrides(dir.path()).is_empty());
    }

    #[test]
    fn unknown_and_mistyped_keys_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(OVERRIDES_FILE),
            serde_json::json!({
                "ribs_deploy_min_return": 5.5,
                "ribs_deploy_min_sharpe": "0.75",
                "mystery_key": 1.0,
                "ribs_deploy_max_drawdown": [1, 2],
            })
            .to_string(),
        )
        .unwrap();

        let overrides = read_overrides(dir.path());
        assert_eq!(overrides.get(KEY_MIN_RETURN), Some(&5.5));
        assert_eq!(overrides.get(KEY_MIN_SHARPE), Some(&0.75));
        assert_eq!(overrides.len(), 2);
    }

    #[test]
    fn effective_merges_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(OVERRIDES_FILE),
            serde_json::json!({ "ribs_deploy_min_return": 5.5 }).to_string(),
        )
        .unwrap();

        let effective = effective_thresholds(&DeployConfig::default(), dir.path());
        assert_eq!(effective.min_return, 5.5);
        // Everything else stays at its default.
        assert_eq!(effective.min_sharpe, 0.5);
        assert_eq!(effective.max_drawdown, 25.0);
        assert_eq!(effective.min_win_rate, 40.0);
        assert_eq!(effective.backtest_hours, 168);
    }

    #[test]
    fn writer_round_trips_through_reader() {
        let dir = tempfile::tempdir().unwrap();
        let mut overrides = BTreeMap::new();
        overrides.insert(KEY_MAX_DRAWDOWN.to_string(), 15.0);
        overrides.insert("not_allowed".to_string(), 1.0);
        write_overrides(dir.path(), &overrides).unwrap();

        let loaded = read_overrides(dir.path());
        assert_eq!(loaded.get(KEY_MAX_DRAWDOWN), Some(&15.0));
        assert_eq!(loaded.len(), 1);
    }
}
