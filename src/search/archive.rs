use crate::error::{Result, TradeGridError};
use crate::optimizer::StrategyParams;
use crate::types::{EliteStrategy, BEHAVIOR_DIM};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Summary statistics over the archive grid.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ArchiveStats {
    pub num_elites: usize,
    /// Occupied cells / total cells, in [0, 1].
    pub coverage: f64,
    /// Sum of (objective - threshold_min) over all elites.
    pub qd_score: f64,
    pub best_objective: f64,
}

/// Outcome of offering a candidate to the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddStatus {
    /// Rejected: below the global minimum or the cell's threshold.
    NotAdded,
    /// Filled a previously empty cell.
    New,
    /// Replaced a lower-objective elite in an occupied cell.
    Improved,
}

impl AddStatus {
    pub fn is_improvement(self) -> bool {
        !matches!(self, AddStatus::NotAdded)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Cell {
    elite: EliteStrategy,
    /// Acceptance threshold for this cell. Starts at the first stored
    /// objective and moves toward each replacement by the learning rate.
    threshold: f64,
}

/// Grid-indexed store of elite solutions keyed by behavior descriptor.
///
/// Each cell holds at most one elite; a candidate enters only if its
/// objective clears both the global `threshold_min` and the cell's own
/// threshold. Elites are never removed except by a full reset.
#[derive(Debug, Clone)]
pub struct GridArchive {
    solution_dim: usize,
    dims: Vec<usize>,
    ranges: Vec<(f64, f64)>,
    threshold_min: f64,
    learning_rate: f64,
    cells: HashMap<usize, Cell>,
}

impl GridArchive {
    pub fn new(
        solution_dim: usize,
        dims: Vec<usize>,
        ranges: Vec<(f64, f64)>,
        threshold_min: f64,
        learning_rate: f64,
    ) -> Result<Self> {
        if dims.len() != BEHAVIOR_DIM || ranges.len() != BEHAVIOR_DIM {
            return Err(TradeGridError::Search(format!(
                "archive must have {} behavior dimensions, got {}x{}",
                BEHAVIOR_DIM,
                dims.len(),
                ranges.len()
            )));
        }
        if dims.iter().any(|&d| d == 0) {
            return Err(TradeGridError::Search(
                "archive dimensions must be non-zero".to_string(),
            ));
        }
        Ok(Self {
            solution_dim,
            dims,
            ranges,
            threshold_min,
            learning_rate,
            cells: HashMap::new(),
        })
    }

    pub fn solution_dim(&self) -> usize {
        self.solution_dim
    }

    pub fn threshold_min(&self) -> f64 {
        self.threshold_min
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Flat cell index for a behavior descriptor. Out-of-range values
    /// clamp to the boundary buckets.
    fn cell_index(&self, behavior: &[f64; BEHAVIOR_DIM]) -> usize {
        let mut index = 0;
        for (dim, (&value, (&buckets, &(lo, hi)))) in behavior
            .iter()
            .zip(self.dims.iter().zip(self.ranges.iter()))
            .enumerate()
        {
            let span = hi - lo;
            let t = ((value - lo) / span).clamp(0.0, 1.0);
            let bucket = ((t * buckets as f64) as usize).min(buckets - 1);
            let stride: usize = self.dims[..dim].iter().product();
            index += bucket * stride;
        }
        index
    }

    /// Offer a candidate to the archive.
    pub fn add(
        &mut self,
        solution: Vec<f64>,
        objective: f64,
        behavior: [f64; BEHAVIOR_DIM],
        params: StrategyParams,
    ) -> AddStatus {
        if !objective.is_finite() || objective <= self.threshold_min {
            return AddStatus::NotAdded;
        }

        let index = self.cell_index(&behavior);
        let elite = EliteStrategy {
            id: format!("cell_{}", index),
            solution,
            objective,
            behavior,
            params,
        };

        match self.cells.get_mut(&index) {
            None => {
                self.cells.insert(
                    index,
                    Cell {
                        elite,
                        threshold: objective,
                    },
                );
                AddStatus::New
            }
            Some(cell) => {
                if objective > cell.threshold {
                    cell.threshold += self.learning_rate * (objective - cell.threshold);
                    cell.elite = elite;
                    AddStatus::Improved
                } else {
                    AddStatus::NotAdded
                }
            }
        }
    }

    pub fn stats(&self) -> ArchiveStats {
        let total_cells: usize = self.dims.iter().product();
        let best_objective = self
            .cells
            .values()
            .map(|c| c.elite.objective)
            .fold(f64::NEG_INFINITY, f64::max);
        ArchiveStats {
            num_elites: self.cells.len(),
            coverage: self.cells.len() as f64 / total_cells as f64,
            qd_score: self
                .cells
                .values()
                .map(|c| c.elite.objective - self.threshold_min)
                .sum(),
            best_objective: if self.cells.is_empty() {
                0.0
            } else {
                best_objective
            },
        }
    }

    /// Sample up to `n` distinct elites uniformly at random.
    pub fn sample_elites<R: Rng>(&self, n: usize, rng: &mut R) -> Vec<EliteStrategy> {
        let mut elites: Vec<&Cell> = self.cells.values().collect();
        elites.shuffle(rng);
        elites
            .into_iter()
            .take(n)
            .map(|c| c.elite.clone())
            .collect()
    }

    pub fn iter_elites(&self) -> impl Iterator<Item = &EliteStrategy> {
        self.cells.values().map(|c| &c.elite)
    }

    /// Drop every stored elite. Only used when restoring from a checkpoint.
    pub fn reset(&mut self) {
        self.cells.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn archive() -> GridArchive {
        GridArchive::new(
            4,
            vec![10, 10, 10],
            vec![(-3.0, 3.0), (0.0, 100.0), (0.0, 100.0)],
            -10.0,
            0.1,
        )
        .unwrap()
    }

    fn params() -> StrategyParams {
        crate::optimizer::decode_solution(&[0.0; 10])
    }

    #[test]
    fn fills_empty_cell_above_threshold() {
        let mut archive = archive();
        let status = archive.add(vec![0.0; 4], 5.0, [1.0, 10.0, 55.0], params());
        assert_eq!(status, AddStatus::New);
        assert_eq!(archive.len(), 1);
    }

    #[test]
    fn rejects_below_global_minimum() {
        let mut archive = archive();
        let status = archive.add(vec![0.0; 4], -50.0, [1.0, 10.0, 55.0], params());
        assert_eq!(status, AddStatus::NotAdded);
        assert!(archive.is_empty());
    }

    #[test]
    fn replaces_only_for_higher_objective() {
        let mut archive = archive();
        archive.add(vec![0.0; 4], 5.0, [1.0, 10.0, 55.0], params());

        let worse = archive.add(vec![1.0; 4], 2.0, [1.0, 10.0, 55.0], params());
        assert_eq!(worse, AddStatus::NotAdded);

        let better = archive.add(vec![2.0; 4], 9.0, [1.0, 10.0, 55.0], params());
        assert_eq!(better, AddStatus::Improved);

        let elite = archive.iter_elites().next().unwrap();
        assert_eq!(elite.objective, 9.0);
        assert_eq!(archive.len(), 1);
    }

    #[test]
    fn distinct_behaviors_occupy_distinct_cells() {
        let mut archive = archive();
        archive.add(vec![0.0; 4], 5.0, [-2.5, 5.0, 10.0], params());
        archive.add(vec![0.0; 4], 5.0, [2.5, 95.0, 90.0], params());
        assert_eq!(archive.len(), 2);
    }

    #[test]
    fn out_of_range_behavior_clamps_to_boundary_cell() {
        let mut archive = archive();
        let status = archive.add(vec![0.0; 4], 5.0, [999.0, -50.0, 200.0], params());
        assert_eq!(status, AddStatus::New);
    }

    #[test]
    fn stats_track_coverage_and_best() {
        let mut archive = archive();
        archive.add(vec![0.0; 4], 5.0, [-2.5, 5.0, 10.0], params());
        archive.add(vec![0.0; 4], 8.0, [2.5, 95.0, 90.0], params());

        let stats = archive.stats();
        assert_eq!(stats.num_elites, 2);
        assert!((stats.coverage - 2.0 / 1000.0).abs() < 1e-12);
        assert_eq!(stats.best_objective, 8.0);
        // qd_score measures headroom above threshold_min (-10).
        assert!((stats.qd_score - (15.0 + 18.0)).abs() < 1e-9);
    }

    #[test]
    fn sampling_caps_at_population() {
        let mut archive = archive();
        archive.add(vec![0.0; 4], 5.0, [-2.5, 5.0, 10.0], params());
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(archive.sample_elites(10, &mut rng).len(), 1);
    }
}
