// file: `src/lj_pot.rs`
use nalgebra::Vector3;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::state::{minimum_image_vec, ParticleState};

/// Anything that can fill the force buffer of a [`ParticleState`].
pub trait ForceProvider {
    /// Zero the forces, accumulate new ones and return the potential energy.
    fn compute_forces(&self, state: &mut ParticleState) -> f64;
}

/// How the potential energy of the ordered-pair double loop is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EnergyConvention {
    /// Each physical pair counted once.
    #[default]
    Physical,
    /// Sum over every ordered pair, i.e. twice the physical energy. Forces are
    /// doubled as well so they stay the gradient of the reported energy.
    Doubled,
}

impl EnergyConvention {
    fn scale(self) -> f64 {
        match self {
            EnergyConvention::Physical => 0.5,
            EnergyConvention::Doubled => 1.0,
        }
    }
}

/// Truncated Lennard-Jones pair potential in a periodic cubic box.
///
/// Pairs with `r² <= tolerance` or `r² >= cutoff²` do not interact.
#[derive(Debug, Clone)]
pub struct LennardJones {
    pub epsilon: f64,
    pub sigma: f64,
    pub cutoff: f64,
    pub tolerance: f64,
    pub convention: EnergyConvention,
    pub parallel: bool,
}

impl LennardJones {
    pub fn new(epsilon: f64, sigma: f64, cutoff: f64, tolerance: f64) -> Self {
        LennardJones {
            epsilon,
            sigma,
            cutoff,
            tolerance,
            convention: EnergyConvention::Physical,
            parallel: false,
        }
    }

    pub fn with_convention(mut self, convention: EnergyConvention) -> Self {
        self.convention = convention;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// `4ε[(σ²/r²)^6 - (σ²/r²)^3]`
    #[inline]
    pub fn potential(&self, r2: f64) -> f64 {
        let s = self.sigma * self.sigma / r2;
        let s3 = s * s * s;
        4.0 * self.epsilon * (s3 * s3 - s3)
    }

    /// `-dV/dr`; positive values push the pair apart.
    #[inline]
    pub fn force_magnitude(&self, r2: f64) -> f64 {
        let s = self.sigma * self.sigma / r2;
        let s3 = s * s * s;
        24.0 * self.epsilon * (2.0 * s3 * s3 - s3) / r2.sqrt()
    }

    #[inline]
    fn interacts(&self, r2: f64) -> bool {
        r2 > self.tolerance && r2 < self.cutoff * self.cutoff
    }

    /// Force on particle `i` and its share of the ordered-pair energy sum.
    ///
    /// Only `positions` is read; the result belongs to `i` alone, so the outer
    /// loop can run on any number of threads without sharing accumulators.
    fn accumulate_row(&self, i: usize, positions: &[Vector3<f64>], box_length: f64) -> (Vector3<f64>, f64) {
        let xi = positions[i];
        let mut force = Vector3::zeros();
        let mut energy = 0.0;

        for (j, xj) in positions.iter().enumerate() {
            if j == i {
                continue;
            }
            let d = minimum_image_vec(xj - xi, box_length);
            let r2 = d.norm_squared();
            if !self.interacts(r2) {
                continue;
            }
            let r = r2.sqrt();
            energy += self.potential(r2);
            force -= d * (self.force_magnitude(r2) / r);
        }

        (force, energy)
    }

    /// Potential energy only, using the configured convention.
    pub fn energy(&self, state: &ParticleState) -> f64 {
        let positions = state.positions();
        let l = state.box_length();
        let total: f64 = (0..positions.len())
            .map(|i| self.accumulate_row(i, positions, l).1)
            .sum();
        total * self.convention.scale()
    }
}

impl ForceProvider for LennardJones {
    fn compute_forces(&self, state: &mut ParticleState) -> f64 {
        let l = state.box_length();
        let (positions, forces) = state.positions_and_forces_mut();
        forces.iter_mut().for_each(|f| *f = Vector3::zeros());

        // Both halves of the double loop land on `force[i]`; doubling the
        // forces keeps them consistent with a doubled energy.
        let force_scale = 2.0 * self.convention.scale();

        let ordered_sum: f64 = if self.parallel {
            forces
                .par_iter_mut()
                .enumerate()
                .map(|(i, f)| {
                    let (row_force, row_energy) = self.accumulate_row(i, positions, l);
                    *f += row_force * force_scale;
                    row_energy
                })
                .sum()
        } else {
            let mut sum = 0.0;
            for (i, f) in forces.iter_mut().enumerate() {
                let (row_force, row_energy) = self.accumulate_row(i, positions, l);
                *f += row_force * force_scale;
                sum += row_energy;
            }
            sum
        };

        ordered_sum * self.convention.scale()
    }
}
