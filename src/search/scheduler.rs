use super::archive::{AddStatus, ArchiveStats, GridArchive};
use super::emitter::{CandidateFeedback, GaussianEmitter};
use crate::error::{Result, TradeGridError};
use crate::optimizer::decode_solution;
use crate::types::{EliteStrategy, BEHAVIOR_DIM};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Pluggable interface over the QD primitives, so an alternate backend
/// can replace the built-in archive/emitter stack without touching the
/// optimizer controller.
pub trait SearchBackend: Send {
    /// Collect a batch of candidate solutions from all emitters.
    fn ask(&mut self) -> Vec<Vec<f64>>;
    /// Report evaluated objective/behavior pairs for the most recent
    /// `ask` batch, in the same order.
    fn tell(&mut self, objectives: &[f64], behaviors: &[[f64; BEHAVIOR_DIM]]) -> Result<usize>;
    fn stats(&self) -> ArchiveStats;
    fn sample_elites(&mut self, n: usize) -> Vec<EliteStrategy>;
    /// Reinsert previously archived elites (checkpoint restore).
    fn restore(&mut self, elites: &[EliteStrategy]);
}

/// Coordinates ask/tell between the archive and its emitters.
pub struct Scheduler {
    archive: GridArchive,
    emitters: Vec<GaussianEmitter>,
    /// Candidates from the most recent `ask`, flat, in emitter order.
    pending: Vec<Vec<f64>>,
    sample_rng: StdRng,
}

impl Scheduler {
    pub fn new(archive: GridArchive, emitters: Vec<GaussianEmitter>, seed: u64) -> Self {
        Self {
            archive,
            emitters,
            pending: Vec::new(),
            sample_rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn archive(&self) -> &GridArchive {
        &self.archive
    }
}

impl SearchBackend for Scheduler {
    fn ask(&mut self) -> Vec<Vec<f64>> {
        let mut batch = Vec::new();
        for emitter in &mut self.emitters {
            batch.extend(emitter.ask(&self.archive));
        }
        self.pending = batch.clone();
        batch
    }

    fn tell(&mut self, objectives: &[f64], behaviors: &[[f64; BEHAVIOR_DIM]]) -> Result<usize> {
        if self.pending.is_empty() {
            return Err(TradeGridError::Search(
                "tell called without a pending ask batch".to_string(),
            ));
        }
        if objectives.len() != self.pending.len() || behaviors.len() != self.pending.len() {
            return Err(TradeGridError::Search(format!(
                "tell batch mismatch: asked {}, got {} objectives / {} behaviors",
                self.pending.len(),
                objectives.len(),
                behaviors.len()
            )));
        }

        let pending = std::mem::take(&mut self.pending);
        let mut feedback: Vec<CandidateFeedback> = Vec::with_capacity(pending.len());
        let mut new_elites = 0;

        for ((solution, &objective), behavior) in
            pending.into_iter().zip(objectives).zip(behaviors)
        {
            let params = decode_solution(&solution);
            let status = self
                .archive
                .add(solution.clone(), objective, *behavior, params);
            if status.is_improvement() {
                new_elites += 1;
            }
            feedback.push(CandidateFeedback {
                solution,
                objective,
                improved: status != AddStatus::NotAdded,
            });
        }

        // Route each emitter its own slice of the batch.
        let mut offset = 0;
        for emitter in &mut self.emitters {
            let end = (offset + emitter.batch_size()).min(feedback.len());
            emitter.tell(&feedback[offset..end]);
            offset = end;
        }

        Ok(new_elites)
    }

    fn stats(&self) -> ArchiveStats {
        self.archive.stats()
    }

    fn sample_elites(&mut self, n: usize) -> Vec<EliteStrategy> {
        self.archive.sample_elites(n, &mut self.sample_rng)
    }

    fn restore(&mut self, elites: &[EliteStrategy]) {
        self.archive.reset();
        for elite in elites {
            self.archive.add(
                elite.solution.clone(),
                elite.objective,
                elite.behavior,
                elite.params.clone(),
            );
        }
    }
}
