use itertools::izip;

use crate::lj_pot::ForceProvider;
use crate::state::{wrap_coordinate, ParticleState};

pub trait Integrator {
    /// Fill the force buffer for the current positions and return the potential energy.
    fn prime(&self, state: &mut ParticleState) -> f64;

    /// Advance the system by one time step and return the new potential energy.
    fn advance(&mut self, state: &mut ParticleState) -> f64;

    /// Time step
    fn dt(&self) -> f64;
}

/// Velocity-Verlet for unit masses.
///
/// The forces held in the state on entry must belong to the current
/// positions; call [`Integrator::prime`] once before the first step.
pub struct VelocityVerlet<F: ForceProvider> {
    provider: F,
    dt: f64,
}

impl<F: ForceProvider> VelocityVerlet<F> {
    pub fn new(provider: F, dt: f64) -> Self {
        VelocityVerlet { provider, dt }
    }
}

impl<F: ForceProvider> Integrator for VelocityVerlet<F> {
    fn prime(&self, state: &mut ParticleState) -> f64 {
        self.provider.compute_forces(state)
    }

    fn advance(&mut self, state: &mut ParticleState) -> f64 {
        let dt = self.dt;
        let half_dt = 0.5 * dt;
        let l = state.box_length();

        // Half kick with the old forces, then drift and re-wrap
        {
            let (positions, velocities, forces) = state.kinematics_mut();
            for (x, v, &f) in izip!(positions.iter_mut(), velocities.iter_mut(), forces) {
                *v += f * half_dt;
                *x += *v * dt;
                for k in 0..3 {
                    x[k] = wrap_coordinate(x[k], l);
                }
            }
        }

        let potential = self.provider.compute_forces(state);

        // Second half kick with the new forces
        let (_, velocities, forces) = state.kinematics_mut();
        for (v, &f) in velocities.iter_mut().zip(forces) {
            *v += f * half_dt;
        }

        potential
    }

    fn dt(&self) -> f64 {
        self.dt
    }
}
