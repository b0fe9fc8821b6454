use crate::error::{Result, TradeGridError};
use crate::types::EliteStrategy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Checkpoint file extension. Kept from the original protocol so
/// existing tooling that globs for `ribs_checkpoint_*.pkl` still works;
/// the encoding is bincode.
pub const CHECKPOINT_PREFIX: &str = "ribs_checkpoint_";
pub const CHECKPOINT_EXT: &str = "pkl";

/// One line of optimization history kept across checkpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationRecord {
    pub iteration: usize,
    pub best_objective: f64,
    pub num_elites: usize,
}

/// Durable snapshot of optimizer state enabling resume-after-crash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub elites: Vec<EliteStrategy>,
    pub best_solution: Option<Vec<f64>>,
    pub best_objective: f64,
    pub history: Vec<IterationRecord>,
    /// Seconds since the Unix epoch at save time.
    pub timestamp: f64,
}

/// Atomically persist a checkpoint into `dir`.
///
/// Write path: temp file → flush → fsync → non-zero length check →
/// rename over the canonical name. Any failure leaves the previously
/// committed checkpoint intact and removes the temp file. After a
/// successful save, stray `.tmp` files and zero-byte `.pkl` files from
/// earlier crashes are swept away.
pub fn save_checkpoint(dir: &Path, checkpoint: &Checkpoint) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let name = format!(
        "{}{}.{}",
        CHECKPOINT_PREFIX, checkpoint.timestamp as u64, CHECKPOINT_EXT
    );
    let path = dir.join(name);
    let tmp = path.with_extension(format!("{}.tmp", CHECKPOINT_EXT));

    let result = write_atomic(&path, &tmp, checkpoint);
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
        return result;
    }

    sweep_partial_files(dir);
    result
}

fn write_atomic(path: &Path, tmp: &Path, checkpoint: &Checkpoint) -> Result<PathBuf> {
    let payload = bincode::serialize(checkpoint)?;
    {
        let mut file = fs::File::create(tmp)?;
        file.write_all(&payload)?;
        file.flush()?;
        file.sync_all()?;
    }

    let written = fs::metadata(tmp)?.len();
    if written == 0 {
        return Err(TradeGridError::Checkpoint(format!(
            "refusing to commit zero-byte checkpoint {}",
            tmp.display()
        )));
    }

    fs::rename(tmp, path)?;
    Ok(path.to_path_buf())
}

/// Best-effort removal of partial-write debris. Never fails the save.
fn sweep_partial_files(dir: &Path) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return,
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            None => continue,
        };
        let is_tmp = name.ends_with(".tmp");
        let is_empty_pkl = name.ends_with(&format!(".{}", CHECKPOINT_EXT))
            && fs::metadata(&path).map(|m| m.len() == 0).unwrap_or(false);
        if is_tmp || is_empty_pkl {
            if let Err(e) = fs::remove_file(&path) {
                log::warn!("could not sweep {}: {}", path.display(), e);
            } else {
                log::debug!("swept partial file {}", path.display());
            }
        }
    }
}

pub fn load_checkpoint(path: &Path) -> Result<Checkpoint> {
    let bytes = fs::read(path)?;
    bincode::deserialize(&bytes).map_err(Into::into)
}

/// Most recently modified checkpoint in `dir`, if any.
pub fn latest_checkpoint(dir: &Path) -> Option<PathBuf> {
    let entries = fs::read_dir(dir).ok()?;
    entries
        .flatten()
        .filter(|e| {
            e.file_name()
                .to_str()
                .map(|n| {
                    n.starts_with(CHECKPOINT_PREFIX) && n.ends_with(&format!(".{}", CHECKPOINT_EXT))
                })
                .unwrap_or(false)
        })
        .filter_map(|e| {
            let mtime = e.metadata().ok()?.modified().ok()?;
            Some((e.path(), mtime))
        })
        .max_by_key(|(_, mtime)| *mtime)
        .map(|(path, _)| path)
}
