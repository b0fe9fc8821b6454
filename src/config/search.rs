use super::traits::ConfigSection;
use crate::error::TradeGridError;
use serde::{Deserialize, Serialize};

/// Settings for the quality-diversity search (`ribs` section of the
/// YAML config; the section name is part of the cross-process protocol).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Length of each candidate solution vector.
    #[serde(default = "default_solution_dim")]
    pub solution_dim: usize,
    /// Bucket counts per behavior dimension.
    #[serde(default = "default_archive_dimensions")]
    pub archive_dimensions: Vec<usize>,
    /// `[min, max]` range per behavior dimension.
    #[serde(default = "default_archive_ranges")]
    pub archive_ranges: Vec<(f64, f64)>,
    #[serde(default = "default_num_emitters")]
    pub num_emitters: usize,
    /// Initial sampling spread for each emitter.
    #[serde(default = "default_sigma0")]
    pub sigma0: f64,
    /// Candidates per emitter per ask.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Status document rewrite period, in iterations.
    #[serde(default = "default_progress_interval")]
    pub progress_interval: usize,
    /// Checkpoint save period, in iterations.
    #[serde(default = "default_checkpoint_interval")]
    pub checkpoint_interval: usize,
    /// Minimum objective a candidate needs to ever enter the archive.
    #[serde(default = "default_threshold_min")]
    pub threshold_min: f64,
    /// How aggressively a replaced cell's threshold moves toward the
    /// incoming objective.
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    /// Base seed; emitter `i` is seeded with `seed + i`.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_solution_dim() -> usize {
    10
}
fn default_archive_dimensions() -> Vec<usize> {
    vec![10, 10, 10]
}
fn default_archive_ranges() -> Vec<(f64, f64)> {
    vec![(-3.0, 3.0), (0.0, 100.0), (0.0, 100.0)]
}
fn default_num_emitters() -> usize {
    4
}
fn default_sigma0() -> f64 {
    0.5
}
fn default_batch_size() -> usize {
    8
}
fn default_progress_interval() -> usize {
    10
}
fn default_checkpoint_interval() -> usize {
    25
}
fn default_threshold_min() -> f64 {
    -10.0
}
fn default_learning_rate() -> f64 {
    0.1
}
fn default_seed() -> u64 {
    42
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            solution_dim: default_solution_dim(),
            archive_dimensions: default_archive_dimensions(),
            archive_ranges: default_archive_ranges(),
            num_emitters: default_num_emitters(),
            sigma0: default_sigma0(),
            batch_size: default_batch_size(),
            progress_interval: default_progress_interval(),
            checkpoint_interval: default_checkpoint_interval(),
            threshold_min: default_threshold_min(),
            learning_rate: default_learning_rate(),
            seed: default_seed(),
        }
    }
}

impl ConfigSection for SearchConfig {
    fn section_name() -> &'static str {
        "ribs"
    }

    fn validate(&self) -> Result<(), TradeGridError> {
        if self.solution_dim == 0 {
            return Err(TradeGridError::Configuration(
                "solution_dim must be at least 1".to_string(),
            ));
        }
        if self.archive_dimensions.len() != self.archive_ranges.len() {
            return Err(TradeGridError::Configuration(
                "archive_dimensions and archive_ranges must have the same length".to_string(),
            ));
        }
        if self.archive_dimensions.iter().any(|&d| d == 0) {
            return Err(TradeGridError::Configuration(
                "archive dimensions must be non-zero".to_string(),
            ));
        }
        if self.archive_ranges.iter().any(|(lo, hi)| hi <= lo) {
            return Err(TradeGridError::Configuration(
                "archive ranges must satisfy min < max".to_string(),
            ));
        }
        if self.num_emitters == 0 || self.batch_size == 0 {
            return Err(TradeGridError::Configuration(
                "num_emitters and batch_size must be non-zero".to_string(),
            ));
        }
        if self.sigma0 <= 0.0 {
            return Err(TradeGridError::Configuration(
                "sigma0 must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.learning_rate) {
            return Err(TradeGridError::Configuration(
                "learning_rate must be between 0 and 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(SearchConfig::default().validate().is_ok());
    }

    #[test]
    fn mismatched_archive_shape_rejected() {
        let config = SearchConfig {
            archive_dimensions: vec![10, 10],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn inverted_range_rejected() {
        let config = SearchConfig {
            archive_ranges: vec![(3.0, -3.0), (0.0, 100.0), (0.0, 100.0)],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
