use crate::error::{Result, TradeGridError};
use crate::search::ArchiveStats;
use crate::types::EliteStrategy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Cross-process status file name; polled by external consumers, so the
/// name is part of the protocol.
pub const STATUS_FILE: &str = "ribs_status.json";

/// Elites included in a final status document for visualization.
pub const STATUS_ELITE_LIMIT: usize = 20;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointInfo {
    pub path: String,
    /// Modification time, seconds since the Unix epoch.
    pub mtime: f64,
    pub size: u64,
}

/// The whole-file JSON document consumers poll. Eventually consistent:
/// a reader sees either the previous or the current complete document,
/// never a partial write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusDocument {
    pub running: bool,
    pub current_iteration: usize,
    pub total_iterations: usize,
    pub progress_percent: f64,
    #[serde(default)]
    pub archive_stats: ArchiveStats,
    #[serde(default)]
    pub latest_checkpoint: Option<CheckpointInfo>,
    #[serde(default)]
    pub elites: Vec<EliteStrategy>,
    #[serde(default)]
    pub behaviors_x: Vec<f64>,
    #[serde(default)]
    pub behaviors_y: Vec<f64>,
    #[serde(default)]
    pub behaviors_z: Vec<f64>,
    #[serde(default)]
    pub objectives: Vec<f64>,
    #[serde(default)]
    pub error: Option<String>,
    pub updated_at: f64,
}

impl StatusDocument {
    pub fn running(current_iteration: usize, total_iterations: usize) -> Self {
        let progress = if total_iterations == 0 {
            0.0
        } else {
            100.0 * current_iteration as f64 / total_iterations as f64
        };
        Self {
            running: true,
            current_iteration,
            total_iterations,
            progress_percent: progress,
            archive_stats: ArchiveStats::default(),
            latest_checkpoint: None,
            elites: Vec::new(),
            behaviors_x: Vec::new(),
            behaviors_y: Vec::new(),
            behaviors_z: Vec::new(),
            objectives: Vec::new(),
            error: None,
            updated_at: unix_now(),
        }
    }

    /// Attach elite strategies plus the flattened behavior/objective
    /// arrays downstream dashboards plot directly.
    pub fn with_elites(mut self, elites: Vec<EliteStrategy>) -> Self {
        self.behaviors_x = elites.iter().map(|e| e.behavior[0]).collect();
        self.behaviors_y = elites.iter().map(|e| e.behavior[1]).collect();
        self.behaviors_z = elites.iter().map(|e| e.behavior[2]).collect();
        self.objectives = elites.iter().map(|e| e.objective).collect();
        self.elites = elites;
        self
    }
}

pub fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

fn status_path(dir: &Path) -> PathBuf {
    dir.join(STATUS_FILE)
}

/// Atomically rewrite the status document (temp file + rename).
pub fn write_status(dir: &Path, document: &StatusDocument) -> Result<()> {
    fs::create_dir_all(dir)?;
    let path = status_path(dir);
    let tmp = path.with_extension("json.tmp");

    let payload = serde_json::to_vec_pretty(document)?;
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

/// Read the status document. Absence means "not running" to consumers,
/// so a missing file is a distinct error from a corrupt one.
pub fn read_status(dir: &Path) -> Result<StatusDocument> {
    let path = status_path(dir);
    let contents = fs::read_to_string(&path)?;
    serde_json::from_str(&contents).map_err(Into::into)
}

/// Checkpoint-recency classification for the health monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FreshnessStatus {
    Ok,
    Stale,
    NoCheckpoint,
    Missing,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreshnessReport {
    pub status: FreshnessStatus,
    pub latest_checkpoint: Option<String>,
    pub age_seconds: Option<f64>,
}

/// Classify checkpoint recency from the status document alone:
/// `now - latest_checkpoint.mtime` against the threshold.
pub fn check_checkpoint_freshness(dir: &Path, max_age_seconds: f64) -> FreshnessReport {
    let document = match read_status(dir) {
        Ok(doc) => doc,
        Err(TradeGridError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            return FreshnessReport {
                status: FreshnessStatus::Missing,
                latest_checkpoint: None,
                age_seconds: None,
            };
        }
        Err(e) => {
            log::warn!("unreadable status file in {}: {}", dir.display(), e);
            return FreshnessReport {
                status: FreshnessStatus::Unknown,
                latest_checkpoint: None,
                age_seconds: None,
            };
        }
    };

    match document.latest_checkpoint {
        None => FreshnessReport {
            status: FreshnessStatus::NoCheckpoint,
            latest_checkpoint: None,
            age_seconds: None,
        },
        Some(info) => {
            let age = unix_now() - info.mtime;
            let status = if age <= max_age_seconds {
                FreshnessStatus::Ok
            } else {
                FreshnessStatus::Stale
            };
            FreshnessReport {
                status,
                latest_checkpoint: Some(info.path),
                age_seconds: Some(age),
            }
        }
    }
}
