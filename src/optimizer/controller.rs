use super::checkpoint::{
    latest_checkpoint, load_checkpoint, save_checkpoint, Checkpoint, IterationRecord,
};
use super::params::decode_solution;
use super::status::{
    unix_now, write_status, CheckpointInfo, StatusDocument, STATUS_ELITE_LIMIT,
};
use crate::backtest::Backtester;
use crate::config::{ConfigSection, SearchConfig};
use crate::error::{Result, TradeGridError};
use crate::search::{ArchiveStats, GaussianEmitter, GridArchive, Scheduler, SearchBackend};
use crate::types::{EliteStrategy, EvaluationOutcome, BEHAVIOR_DIM};
use polars::prelude::DataFrame;
use rayon::prelude::*;
use std::path::{Path, PathBuf};

/// Upper bound on evaluation workers per iteration.
const MAX_EVAL_WORKERS: usize = 8;

/// Owns the archive/emitters/scheduler, evaluates candidates against a
/// backtest, and persists progress. Drives the whole search loop; all
/// backend mutation happens on the controlling thread.
pub struct OptimizerController {
    config: SearchConfig,
    backend: Box<dyn SearchBackend>,
    backtester: Backtester,
    state_dir: PathBuf,
    best_solution: Option<Vec<f64>>,
    best_objective: f64,
    history: Vec<IterationRecord>,
    latest_checkpoint_path: Option<PathBuf>,
}

impl OptimizerController {
    /// Build a controller with the built-in grid-archive backend.
    pub fn new(config: SearchConfig, state_dir: impl Into<PathBuf>) -> Result<Self> {
        config.validate()?;
        let archive = GridArchive::new(
            config.solution_dim,
            config.archive_dimensions.clone(),
            config.archive_ranges.clone(),
            config.threshold_min,
            config.learning_rate,
        )?;
        let emitters = (0..config.num_emitters)
            .map(|i| {
                GaussianEmitter::new(
                    config.solution_dim,
                    config.batch_size,
                    config.sigma0,
                    config.seed + i as u64,
                )
            })
            .collect();
        let backend = Box::new(Scheduler::new(archive, emitters, config.seed));
        Ok(Self::with_backend(config, backend, state_dir))
    }

    /// Build a controller over any QD backend (alternate implementations
    /// plug in here).
    pub fn with_backend(
        config: SearchConfig,
        backend: Box<dyn SearchBackend>,
        state_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            config,
            backend,
            backtester: Backtester::default(),
            state_dir: state_dir.into(),
            best_solution: None,
            best_objective: f64::NEG_INFINITY,
            history: Vec::new(),
            latest_checkpoint_path: None,
        }
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    pub fn best_objective(&self) -> f64 {
        self.best_objective
    }

    pub fn best_solution(&self) -> Option<&[f64]> {
        self.best_solution.as_deref()
    }

    /// Evaluate one candidate. Never fails: decode is total, and any
    /// backtest error is logged with the offending solution and mapped
    /// to the fixed penalty outcome so the loop keeps moving.
    pub fn evaluate_solution(&self, solution: &[f64], data: &DataFrame) -> EvaluationOutcome {
        evaluate_candidate(&self.backtester, solution, data)
    }

    /// Run the search for `iterations` iterations and return the elites.
    ///
    /// Writes a running status before the first iteration, updates it
    /// every `progress_interval` iterations, checkpoints every
    /// `checkpoint_interval`, and always leaves a final non-running
    /// status document, including after a loop-level failure.
    pub fn run_optimization_cycle(
        &mut self,
        data: &DataFrame,
        iterations: usize,
    ) -> Result<Vec<EliteStrategy>> {
        let mut status = StatusDocument::running(0, iterations);
        status.archive_stats = self.get_archive_stats();
        status.latest_checkpoint = self.latest_checkpoint_info();
        if let Err(e) = write_status(&self.state_dir, &status) {
            log::warn!("could not write initial status: {}", e);
        }

        let mut completed = 0;
        let result = self.run_loop(data, iterations, &mut completed);

        // On abort the document reports the iteration actually reached,
        // not the requested count.
        let elites = self.get_elite_strategies(STATUS_ELITE_LIMIT);
        let mut final_status =
            StatusDocument::running(completed, iterations).with_elites(elites.clone());
        final_status.running = false;
        final_status.archive_stats = self.get_archive_stats();
        final_status.latest_checkpoint = self.latest_checkpoint_info();
        if let Err(ref e) = result {
            final_status.error = Some(e.to_string());
        }
        if let Err(e) = write_status(&self.state_dir, &final_status) {
            log::warn!("could not write final status: {}", e);
        }

        result.map(|_| elites)
    }

    fn run_loop(
        &mut self,
        data: &DataFrame,
        iterations: usize,
        completed: &mut usize,
    ) -> Result<()> {
        for iteration in 1..=iterations {
            let solutions = self.backend.ask();
            if solutions.is_empty() {
                return Err(TradeGridError::Search(
                    "backend returned an empty ask batch".to_string(),
                ));
            }

            let outcomes = self.evaluate_batch(&solutions, data)?;

            // Sanitize before the backend ever sees a value: coerce to
            // finite floats, penalty on anything else.
            let mut objectives = Vec::with_capacity(outcomes.len());
            let mut behaviors = Vec::with_capacity(outcomes.len());
            for outcome in &outcomes {
                let (objective, behavior) = sanitize_outcome(outcome);
                objectives.push(objective);
                behaviors.push(behavior);
            }

            self.backend.tell(&objectives, &behaviors)?;

            for (solution, &objective) in solutions.iter().zip(objectives.iter()) {
                if objective > self.best_objective {
                    self.best_objective = objective;
                    self.best_solution = Some(solution.clone());
                }
            }

            let stats = self.get_archive_stats();
            self.history.push(IterationRecord {
                iteration,
                best_objective: self.best_objective,
                num_elites: stats.num_elites,
            });

            if iteration % self.config.progress_interval == 0 {
                let mut status = StatusDocument::running(iteration, iterations);
                status.archive_stats = stats;
                status.latest_checkpoint = self.latest_checkpoint_info();
                if let Err(e) = write_status(&self.state_dir, &status) {
                    log::warn!("could not write progress status: {}", e);
                }
            }

            if iteration % self.config.checkpoint_interval == 0 {
                self.checkpoint_now();
            }

            log::debug!(
                "iteration {}/{}: best={:.3} elites={}",
                iteration,
                iterations,
                self.best_objective,
                stats.num_elites
            );
            *completed = iteration;
        }

        self.checkpoint_now();
        Ok(())
    }

    /// Evaluate a batch on a bounded worker pool. Workers share only the
    /// read-only market data; results come back in batch order.
    fn evaluate_batch(
        &self,
        solutions: &[Vec<f64>],
        data: &DataFrame,
    ) -> Result<Vec<EvaluationOutcome>> {
        let workers = solutions.len().clamp(1, MAX_EVAL_WORKERS);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|e| TradeGridError::Search(format!("evaluation pool: {}", e)))?;

        let backtester = &self.backtester;
        Ok(pool.install(|| {
            solutions
                .par_iter()
                .map(|solution| evaluate_candidate(backtester, solution, data))
                .collect()
        }))
    }

    /// Save a checkpoint now. Persistence failures are logged, never
    /// propagated: the loop must survive a full disk or missing dir.
    pub fn checkpoint_now(&mut self) {
        let checkpoint = Checkpoint {
            elites: self.backend.sample_elites(usize::MAX),
            best_solution: self.best_solution.clone(),
            best_objective: self.best_objective,
            history: self.history.clone(),
            timestamp: unix_now(),
        };
        match save_checkpoint(&self.state_dir, &checkpoint) {
            Ok(path) => {
                log::info!("checkpoint saved to {}", path.display());
                self.latest_checkpoint_path = Some(path);
            }
            Err(e) => log::warn!("checkpoint save failed: {}", e),
        }
    }

    /// Restore archive/best/history from a checkpoint file. Failure is
    /// logged and leaves in-memory state untouched.
    pub fn load_checkpoint(&mut self, path: &Path) -> bool {
        match load_checkpoint(path) {
            Ok(checkpoint) => {
                self.backend.restore(&checkpoint.elites);
                self.best_solution = checkpoint.best_solution;
                self.best_objective = checkpoint.best_objective;
                self.history = checkpoint.history;
                self.latest_checkpoint_path = Some(path.to_path_buf());
                log::info!(
                    "restored checkpoint {} ({} elites, best {:.3})",
                    path.display(),
                    self.backend.stats().num_elites,
                    self.best_objective
                );
                true
            }
            Err(e) => {
                log::warn!("could not load checkpoint {}: {}", path.display(), e);
                false
            }
        }
    }

    /// Restore the most recent checkpoint in the state dir, if any.
    pub fn resume_from_latest(&mut self) -> bool {
        match latest_checkpoint(&self.state_dir) {
            Some(path) => self.load_checkpoint(&path),
            None => false,
        }
    }

    pub fn get_archive_stats(&self) -> ArchiveStats {
        self.backend.stats()
    }

    /// Up to `top_n` elites with stable synthetic ids. Records whose
    /// solution length disagrees with the configured dimension are
    /// skipped with a warning rather than failing the whole call.
    pub fn get_elite_strategies(&mut self, top_n: usize) -> Vec<EliteStrategy> {
        let mut out = Vec::new();
        for mut elite in self.backend.sample_elites(top_n) {
            if elite.solution.len() != self.config.solution_dim
                || !elite.objective.is_finite()
                || elite.behavior.iter().any(|b| !b.is_finite())
            {
                log::warn!("skipping malformed archive record {:?}", elite.id);
                continue;
            }
            // Ids are assigned after the filter so they stay dense even
            // when records are skipped.
            elite.id = format!("ribs_elite_{}", out.len());
            out.push(elite);
        }
        out
    }

    fn latest_checkpoint_info(&self) -> Option<CheckpointInfo> {
        let path = self.latest_checkpoint_path.as_ref()?;
        let metadata = std::fs::metadata(path).ok()?;
        let mtime = metadata
            .modified()
            .ok()?
            .duration_since(std::time::UNIX_EPOCH)
            .ok()?
            .as_secs_f64();
        Some(CheckpointInfo {
            path: path.to_string_lossy().into_owned(),
            mtime,
            size: metadata.len(),
        })
    }
}

/// Decode + backtest one candidate, mapping every failure to the fixed
/// penalty outcome. Free function so the rayon workers capture only the
/// backtester, not the controller.
fn evaluate_candidate(
    backtester: &Backtester,
    solution: &[f64],
    data: &DataFrame,
) -> EvaluationOutcome {
    let params = decode_solution(solution);
    match backtester.run(&params, data) {
        Ok(metrics) => {
            let outcome = EvaluationOutcome {
                objective: metrics.total_return,
                behavior: metrics.behavior(),
            };
            let (objective, behavior) = sanitize_outcome(&outcome);
            EvaluationOutcome {
                objective,
                behavior,
            }
        }
        Err(e) => {
            log::error!(
                "evaluation failed for solution {:?}: {}; substituting penalty",
                solution,
                e
            );
            EvaluationOutcome::penalty()
        }
    }
}

/// Coerce an outcome to finite floats; any non-finite component demotes
/// the whole pair to the penalty values.
fn sanitize_outcome(outcome: &EvaluationOutcome) -> (f64, [f64; BEHAVIOR_DIM]) {
    let finite =
        outcome.objective.is_finite() && outcome.behavior.iter().all(|b| b.is_finite());
    if finite {
        (outcome.objective, outcome.behavior)
    } else {
        let penalty = EvaluationOutcome::penalty();
        (penalty.objective, penalty.behavior)
    }
}
