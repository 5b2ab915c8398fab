//! Read-only observables used for logging and the abort policy.

use crate::state::ParticleState;

/// Statistics of the per-particle force norm `|F_i|`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForceStats {
    pub min: f64,
    pub max: f64,
    pub rms: f64,
}

impl ForceStats {
    pub fn compute(state: &ParticleState) -> Self {
        let forces = state.forces();
        if forces.is_empty() {
            return ForceStats {
                min: 0.0,
                max: 0.0,
                rms: 0.0,
            };
        }

        let mut min2 = f64::MAX;
        let mut max2: f64 = 0.0;
        let mut sum2 = 0.0;
        for f in forces {
            let f2 = f.norm_squared();
            min2 = min2.min(f2);
            max2 = max2.max(f2);
            sum2 += f2;
        }

        ForceStats {
            min: min2.sqrt(),
            max: max2.sqrt(),
            rms: (sum2 / forces.len() as f64).sqrt(),
        }
    }
}

/// `½ Σ |v|²` for unit masses.
pub fn kinetic_energy(state: &ParticleState) -> f64 {
    0.5 * state
        .velocities()
        .iter()
        .map(|v| v.norm_squared())
        .sum::<f64>()
}

/// Instantaneous temperature `2 KE / (3 k_B (N - 1))`.
///
/// The centre-of-mass degrees of freedom are excluded, so a single particle
/// yields a zero denominator (NaN or infinity).
pub fn temperature(state: &ParticleState, k_boltzmann: f64) -> f64 {
    let dof = 3.0 * (state.len() as f64 - 1.0);
    2.0 * kinetic_energy(state) / (dof * k_boltzmann)
}

/// Total linear momentum, useful to check for drift.
pub fn momentum(state: &ParticleState) -> nalgebra::Vector3<f64> {
    state.velocities().iter().sum()
}
