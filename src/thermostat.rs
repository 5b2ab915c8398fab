use crate::diagnostics::temperature;
use crate::state::ParticleState;

/// Outcome of one thermostat application.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rescale {
    /// Temperature measured before rescaling.
    pub temperature: f64,
    /// Factor applied to every velocity component.
    pub lambda: f64,
}

/// Berendsen weak-coupling thermostat.
///
/// Relaxes the instantaneous temperature towards the target with time
/// constant `tau`: `λ = sqrt(1 + (dt/τ)(T₀/T - 1))`.
#[derive(Debug, Clone)]
pub struct Berendsen {
    pub target_temperature: f64,
    pub tau: f64,
    pub dt: f64,
    pub k_boltzmann: f64,
}

impl Berendsen {
    pub fn new(target_temperature: f64, tau: f64, dt: f64, k_boltzmann: f64) -> Self {
        Berendsen {
            target_temperature,
            tau,
            dt,
            k_boltzmann,
        }
    }

    pub fn scaling_factor(&self, current: f64) -> f64 {
        (1.0 + (self.dt / self.tau) * (self.target_temperature / current - 1.0)).sqrt()
    }

    /// Rescale the velocities in place.
    ///
    /// A system at exactly zero temperature has nothing to rescale and is left
    /// untouched (`λ = 1`). Non-finite temperatures are not intercepted.
    pub fn apply(&self, state: &mut ParticleState) -> Rescale {
        let t = temperature(state, self.k_boltzmann);
        if t == 0.0 {
            return Rescale {
                temperature: t,
                lambda: 1.0,
            };
        }

        let lambda = self.scaling_factor(t);
        for v in state.velocities_mut() {
            *v *= lambda;
        }

        Rescale {
            temperature: t,
            lambda,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    const KB: f64 = 0.831451115;

    fn moving_state(speed: f64) -> ParticleState {
        let velocities = vec![
            Vector3::new(speed, 0.0, 0.0),
            Vector3::new(-speed, 0.5 * speed, 0.0),
            Vector3::new(0.0, -0.5 * speed, speed),
            Vector3::new(0.0, 0.0, -speed),
        ];
        ParticleState::new(vec![Vector3::zeros(); 4], velocities, 10.0)
    }

    #[test]
    fn test_relaxes_monotonically_from_above() {
        let target = 1.5;
        let thermostat = Berendsen::new(target, 0.1, 0.001, KB);
        let mut state = moving_state(4.0);

        let mut previous = temperature(&state, KB);
        assert!(previous > target);
        for _ in 0..2000 {
            thermostat.apply(&mut state);
            let t = temperature(&state, KB);
            assert!(t <= previous + 1e-12, "temperature went up: {previous} -> {t}");
            assert!(t >= target - 1e-12);
            previous = t;
        }
        assert_relative_eq!(previous, target, max_relative = 1e-6);
    }

    #[test]
    fn test_relaxes_monotonically_from_below() {
        let target = 80.0;
        let thermostat = Berendsen::new(target, 0.5, 0.002, KB);
        let mut state = moving_state(0.3);

        let mut previous = temperature(&state, KB);
        for _ in 0..5000 {
            thermostat.apply(&mut state);
            let t = temperature(&state, KB);
            assert!(t >= previous - 1e-12);
            previous = t;
        }
        assert_relative_eq!(previous, target, max_relative = 1e-6);
    }

    #[test]
    fn test_single_application_matches_formula() {
        let thermostat = Berendsen::new(2.0, 0.2, 0.01, 1.0);
        let mut state = moving_state(1.0);
        let t0 = temperature(&state, 1.0);
        let rescale = thermostat.apply(&mut state);

        assert_relative_eq!(rescale.temperature, t0);
        let expected = (1.0 + 0.05 * (2.0 / t0 - 1.0)).sqrt();
        assert_relative_eq!(rescale.lambda, expected, epsilon = 1e-15);
        assert_relative_eq!(temperature(&state, 1.0), t0 * expected * expected, max_relative = 1e-12);
    }

    #[test]
    fn test_stationary_system_is_left_alone() {
        let thermostat = Berendsen::new(300.0, 0.1, 0.001, KB);
        let mut state = moving_state(0.0);
        let rescale = thermostat.apply(&mut state);
        assert_eq!(rescale.temperature, 0.0);
        assert_eq!(rescale.lambda, 1.0);
        assert!(state.velocities().iter().all(|v| *v == Vector3::zeros()));
    }
}
