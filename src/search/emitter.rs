use super::archive::GridArchive;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

/// Feedback for one candidate previously proposed by an emitter.
#[derive(Debug, Clone)]
pub struct CandidateFeedback {
    pub solution: Vec<f64>,
    pub objective: f64,
    /// Whether the candidate entered the archive (new cell or replacement).
    pub improved: bool,
}

/// Isotropic Gaussian evolution-strategy emitter.
///
/// Samples candidates around a moving mean with a global step size.
/// Feedback recombines the best half of the batch into a new mean using
/// log-rank weights and adapts sigma: expansion while the batch keeps
/// improving the archive, contraction when it stalls, and a restart from
/// a random elite once the step size collapses. Each emitter owns a
/// deterministic rng stream (`base_seed + index`), so reruns with the
/// same seed reproduce the same search and emitters differ only in
/// their pseudo-random streams.
pub struct GaussianEmitter {
    dimension: usize,
    batch_size: usize,
    mean: Vec<f64>,
    sigma: f64,
    sigma0: f64,
    rng: StdRng,
}

impl GaussianEmitter {
    pub fn new(dimension: usize, batch_size: usize, sigma0: f64, seed: u64) -> Self {
        Self {
            dimension,
            batch_size,
            mean: vec![0.0; dimension],
            sigma: sigma0,
            sigma0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Propose a batch of candidate solutions.
    pub fn ask(&mut self, archive: &GridArchive) -> Vec<Vec<f64>> {
        // A collapsed distribution has stopped producing useful
        // candidates; restart around a random elite (or the origin).
        if self.sigma < 0.05 * self.sigma0 {
            self.restart(archive);
        }

        (0..self.batch_size)
            .map(|_| {
                (0..self.dimension)
                    .map(|d| {
                        let z: f64 = self.rng.sample(StandardNormal);
                        self.mean[d] + self.sigma * z
                    })
                    .collect()
            })
            .collect()
    }

    /// Absorb evaluated feedback for the batch this emitter proposed.
    pub fn tell(&mut self, feedback: &[CandidateFeedback]) {
        if feedback.is_empty() {
            return;
        }

        let mut ranked: Vec<&CandidateFeedback> = feedback.iter().collect();
        ranked.sort_by(|a, b| {
            b.objective
                .partial_cmp(&a.objective)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        // Log-rank recombination weights over the top half, as in the
        // standard evolution-strategy formulation.
        let mu = (ranked.len() / 2).max(1);
        let raw_weights: Vec<f64> = (0..mu)
            .map(|i| (mu as f64 + 0.5).ln() - ((i + 1) as f64).ln())
            .collect();
        let weight_sum: f64 = raw_weights.iter().sum();

        let mut new_mean = vec![0.0; self.dimension];
        for (candidate, raw) in ranked.iter().take(mu).zip(&raw_weights) {
            let w = raw / weight_sum;
            for (acc, &x) in new_mean.iter_mut().zip(candidate.solution.iter()) {
                *acc += w * x;
            }
        }
        self.mean = new_mean;

        let improvements = feedback.iter().filter(|f| f.improved).count();
        if improvements > 0 {
            self.sigma = (self.sigma * 1.05).min(3.0 * self.sigma0);
        } else {
            self.sigma *= 0.9;
        }
    }

    fn restart(&mut self, archive: &GridArchive) {
        let elites = archive.sample_elites(1, &mut self.rng);
        self.mean = match elites.into_iter().next() {
            Some(elite) if elite.solution.len() == self.dimension => elite.solution,
            _ => vec![0.0; self.dimension],
        };
        self.sigma = self.sigma0;
    }
}
