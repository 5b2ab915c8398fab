//! Steepest descent relaxation of the starting configuration

use crate::diagnostics::ForceStats;
use crate::lj_pot::ForceProvider;
use crate::state::ParticleState;

/// Result of a relaxation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Relaxation {
    pub iterations: usize,
    pub converged: bool,
    pub energy: f64,
    pub max_force: f64,
}

/// Moves every particle along its force, `x += step * F`, until the largest
/// force drops below the threshold.
pub struct SteepestDescent<'a, F: ForceProvider> {
    provider: &'a F,
    step_size: f64,
    max_iterations: usize,
    convergence_threshold: f64,
}

impl<'a, F: ForceProvider> SteepestDescent<'a, F> {
    pub fn new(provider: &'a F, step_size: f64, convergence_threshold: f64, max_iterations: usize) -> Self {
        SteepestDescent {
            provider,
            step_size,
            max_iterations,
            convergence_threshold,
        }
    }

    /// Relax positions in place. Velocities are not touched; on return the
    /// force buffer matches the final positions.
    pub fn minimize(&self, state: &mut ParticleState) -> Relaxation {
        tracing::info!("---------- Starting steepest descent ----------");

        let mut energy = self.provider.compute_forces(state);
        let mut stats = ForceStats::compute(state);
        tracing::info!("  Initial state: Epot = {:.8e}, max|F| = {:.4e}", energy, stats.max);

        for iteration in 1..=self.max_iterations {
            if stats.max < self.convergence_threshold {
                tracing::info!("Steepest descent converged after {} iterations", iteration - 1);
                return Relaxation {
                    iterations: iteration - 1,
                    converged: true,
                    energy,
                    max_force: stats.max,
                };
            }

            {
                let (positions, _, forces) = state.kinematics_mut();
                for (x, f) in positions.iter_mut().zip(forces) {
                    *x += f * self.step_size;
                }
            }
            state.wrap_positions();

            energy = self.provider.compute_forces(state);
            stats = ForceStats::compute(state);
            tracing::debug!(
                "  Iteration {}: Epot = {:.8e}, max|F| = {:.4e}, rms|F| = {:.4e}",
                iteration,
                energy,
                stats.max,
                stats.rms
            );
        }

        let converged = stats.max < self.convergence_threshold;
        if converged {
            tracing::info!("Steepest descent converged after {} iterations", self.max_iterations);
        } else {
            tracing::warn!(
                "Steepest descent stopped after {} iterations without converging (max|F| = {:.4e})",
                self.max_iterations,
                stats.max
            );
        }

        Relaxation {
            iterations: self.max_iterations,
            converged,
            energy,
            max_force: stats.max,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lj_pot::LennardJones;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    #[test]
    fn test_pair_relaxes_to_minimum() {
        let lj = LennardJones::new(1.0, 1.0, 2.5, 1e-6);
        let mut state = ParticleState::new(
            vec![Vector3::zeros(), Vector3::new(1.4, 0.0, 0.0)],
            vec![Vector3::zeros(); 2],
            20.0,
        );
        let sd = SteepestDescent::new(&lj, 0.01, 1e-8, 1000);
        let result = sd.minimize(&mut state);

        assert!(result.converged);
        let r = (state.positions()[1] - state.positions()[0]).norm();
        assert_relative_eq!(r, 2f64.powf(1.0 / 6.0), epsilon = 1e-8);
        assert_relative_eq!(result.energy, -1.0, epsilon = 1e-10);
    }

    #[test]
    fn test_energy_goes_down() {
        let lj = LennardJones::new(1.0, 1.0, 2.5, 1e-6);
        let mut state = ParticleState::on_jittered_lattice(27, 4.0, 13);
        let start = lj.energy(&state);

        let sd = SteepestDescent::new(&lj, 1e-6, 1e-12, 50);
        let result = sd.minimize(&mut state);
        assert!(result.energy < start, "{} !< {}", result.energy, start);
        assert_eq!(result.iterations, 50);
        for pos in state.positions() {
            for k in 0..3 {
                assert!(pos[k] >= -2.0 && pos[k] < 2.0);
            }
        }
    }

    #[test]
    fn test_already_converged() {
        let lj = LennardJones::new(1.0, 1.0, 2.5, 1e-6);
        let mut state = ParticleState::new(
            vec![Vector3::zeros(), Vector3::new(5.0, 0.0, 0.0)],
            vec![Vector3::zeros(); 2],
            20.0,
        );
        let result = SteepestDescent::new(&lj, 0.01, 1e-6, 100).minimize(&mut state);
        assert!(result.converged);
        assert_eq!(result.iterations, 0);
        assert_eq!(state.positions()[1].x, 5.0);
    }
}
