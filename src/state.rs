// file: `src/state.rs`
//! Particle storage and periodic wrapping for a cubic box.

use nalgebra::Vector3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};

/// Wrap a single coordinate into `[-L/2, L/2)`.
///
/// Uses `x -= floor(x/L + 0.5) * L`. Rounding can leave a value on or just
/// outside either face; those are pinned onto `-L/2`.
#[inline]
pub fn wrap_coordinate(x: f64, box_length: f64) -> f64 {
    let half = 0.5 * box_length;
    let mut w = x - (x / box_length + 0.5).floor() * box_length;
    if w >= half {
        w -= box_length;
    }
    if w < -half {
        w = -half;
    }
    w
}

/// Minimum-image separation for one axis.
#[inline]
pub fn minimum_image(d: f64, box_length: f64) -> f64 {
    d - (d / box_length + 0.5).floor() * box_length
}

/// Minimum-image separation vector.
#[inline]
pub fn minimum_image_vec(mut d: Vector3<f64>, box_length: f64) -> Vector3<f64> {
    for k in 0..3 {
        d[k] = minimum_image(d[k], box_length);
    }
    d
}

/// Positions, velocities and forces of N identical unit-mass particles.
///
/// N and the box length are fixed at construction. Only the per-particle
/// buffers can be mutated.
#[derive(Debug, Clone)]
pub struct ParticleState {
    box_length: f64,
    positions: Vec<Vector3<f64>>,
    velocities: Vec<Vector3<f64>>,
    forces: Vec<Vector3<f64>>,
}

impl ParticleState {
    /// Build a state from explicit coordinates. Positions are wrapped into the box.
    pub fn new(positions: Vec<Vector3<f64>>, velocities: Vec<Vector3<f64>>, box_length: f64) -> Self {
        assert_eq!(
            positions.len(),
            velocities.len(),
            "positions and velocities must have the same length"
        );
        let n = positions.len();
        let mut state = ParticleState {
            box_length,
            positions,
            velocities,
            forces: vec![Vector3::zeros(); n],
        };
        state.wrap_positions();
        state
    }

    /// Place `n_atoms` near the sites of a simple cubic lattice filling the box.
    ///
    /// The lattice has `floor(N^(1/3)) + 1` sites per side; each coordinate gets
    /// a uniform jitter of up to 30% of the spacing. Velocities start at zero.
    pub fn on_jittered_lattice(n_atoms: usize, box_length: f64, seed: u64) -> Self {
        let n_side = (n_atoms as f64).cbrt().floor() as usize + 1;
        let spacing = box_length / n_side as f64;
        let mut rng = StdRng::seed_from_u64(seed);

        let mut positions = Vec::with_capacity(n_atoms);
        'fill: for i in 0..n_side {
            for j in 0..n_side {
                for k in 0..n_side {
                    if positions.len() >= n_atoms {
                        break 'fill;
                    }
                    let site = Vector3::new(i as f64, j as f64, k as f64).add_scalar(0.5) * spacing;
                    let jitter = Vector3::new(
                        rng.gen::<f64>(),
                        rng.gen::<f64>(),
                        rng.gen::<f64>(),
                    ) * (0.3 * spacing);
                    positions.push(site + jitter);
                }
            }
        }

        let velocities = vec![Vector3::zeros(); n_atoms];
        ParticleState::new(positions, velocities, box_length)
    }

    /// Draw Maxwell-Boltzmann velocities for unit masses at `temperature`.
    ///
    /// The centre-of-mass drift is removed and the result rescaled so the
    /// instantaneous temperature (3(N-1) degrees of freedom) equals the target.
    pub fn assign_maxwell_boltzmann(&mut self, temperature: f64, k_boltzmann: f64, seed: u64) {
        let n = self.len();
        if n < 2 || temperature <= 0.0 {
            self.velocities.iter_mut().for_each(|v| *v = Vector3::zeros());
            return;
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let width = (k_boltzmann * temperature).sqrt();
        for v in &mut self.velocities {
            *v = Vector3::<f64>::new(
                StandardNormal.sample(&mut rng),
                StandardNormal.sample(&mut rng),
                StandardNormal.sample(&mut rng),
            ) * width;
        }

        let v_cm: Vector3<f64> = self.velocities.iter().sum::<Vector3<f64>>() / n as f64;
        for v in &mut self.velocities {
            *v -= v_cm;
        }

        let sum_v2: f64 = self.velocities.iter().map(|v| v.norm_squared()).sum();
        let current = sum_v2 / (3.0 * k_boltzmann * (n - 1) as f64);
        if current > 0.0 {
            let scale = (temperature / current).sqrt();
            for v in &mut self.velocities {
                *v *= scale;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn box_length(&self) -> f64 {
        self.box_length
    }

    pub fn positions(&self) -> &[Vector3<f64>] {
        &self.positions
    }

    pub fn velocities(&self) -> &[Vector3<f64>] {
        &self.velocities
    }

    pub fn forces(&self) -> &[Vector3<f64>] {
        &self.forces
    }

    pub fn positions_mut(&mut self) -> &mut [Vector3<f64>] {
        &mut self.positions
    }

    pub fn velocities_mut(&mut self) -> &mut [Vector3<f64>] {
        &mut self.velocities
    }

    pub fn forces_mut(&mut self) -> &mut [Vector3<f64>] {
        &mut self.forces
    }

    /// Split borrow used by the force field: positions read, forces written.
    pub fn positions_and_forces_mut(&mut self) -> (&[Vector3<f64>], &mut [Vector3<f64>]) {
        (&self.positions, &mut self.forces)
    }

    /// Split borrow used by the integrator.
    pub fn kinematics_mut(
        &mut self,
    ) -> (&mut [Vector3<f64>], &mut [Vector3<f64>], &[Vector3<f64>]) {
        (&mut self.positions, &mut self.velocities, &self.forces)
    }

    /// Re-wrap every position component into `[-L/2, L/2)`.
    pub fn wrap_positions(&mut self) {
        let l = self.box_length;
        for pos in &mut self.positions {
            for k in 0..3 {
                pos[k] = wrap_coordinate(pos[k], l);
            }
        }
    }

    /// Replace coordinates with a frame read back from a trajectory.
    pub fn load_frame(&mut self, positions: &[Vector3<f64>], velocities: &[Vector3<f64>]) {
        assert_eq!(positions.len(), self.len(), "frame has wrong particle count");
        assert_eq!(velocities.len(), self.len(), "frame has wrong particle count");
        self.positions.copy_from_slice(positions);
        self.velocities.copy_from_slice(velocities);
        self.forces.iter_mut().for_each(|f| *f = Vector3::zeros());
        self.wrap_positions();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_minimum_image_wraps_near_box_length() {
        let l = 10.0;
        let eps = 1e-3;
        assert_relative_eq!(minimum_image(l - eps, l), -eps, epsilon = 1e-12);
        assert_relative_eq!(minimum_image(-(l - eps), l), eps, epsilon = 1e-12);
        assert_relative_eq!(minimum_image(0.25, l), 0.25, epsilon = 1e-15);
    }

    #[test]
    fn test_wrap_coordinate_half_open() {
        let l = 4.0;
        assert_eq!(wrap_coordinate(2.0, l), -2.0);
        assert_eq!(wrap_coordinate(-2.0, l), -2.0);
        assert_relative_eq!(wrap_coordinate(5.5, l), 1.5, epsilon = 1e-12);
        assert_relative_eq!(wrap_coordinate(-6.5, l), 1.5, epsilon = 1e-12);

        // A value a hair below -L/2 must not land on +L/2.
        let w = wrap_coordinate(-2.0 - 1e-17, l);
        assert!(w >= -2.0 && w < 2.0);
    }

    #[test]
    fn test_wrap_just_above_upper_face() {
        // x - L rounds to one ulp below -L/2 for this box
        let l = 113.49937918939168;
        let x = 56.74968959469583;
        let w = wrap_coordinate(x, l);
        assert!(w >= -0.5 * l && w < 0.5 * l, "{w} outside box {l}");

        let state = ParticleState::new(vec![Vector3::new(x, 0.0, 0.0)], vec![Vector3::zeros()], l);
        let pos = state.positions()[0];
        assert!(pos.x >= -0.5 * l && pos.x < 0.5 * l, "{pos}");
    }

    #[test]
    fn test_wrap_scan_near_faces() {
        for &l in &[1.0, 3.7, 10.0, 113.49937918939168, 1234.5678] {
            let half = 0.5 * l;
            for &edge in &[half, -half] {
                let mut x = edge;
                for _ in 0..64 {
                    let w = wrap_coordinate(x, l);
                    assert!(w >= -half && w < half, "x = {x}, L = {l} gave {w}");
                    x = f64::from_bits(x.to_bits() + 1);
                }
                let mut x = edge;
                for _ in 0..64 {
                    let w = wrap_coordinate(x, l);
                    assert!(w >= -half && w < half, "x = {x}, L = {l} gave {w}");
                    x = f64::from_bits(x.to_bits() - 1);
                }
            }
        }
    }

    #[test]
    fn test_lattice_fills_box() {
        let l = 12.0;
        let state = ParticleState::on_jittered_lattice(30, l, 47329);
        assert_eq!(state.len(), 30);
        for pos in state.positions() {
            for k in 0..3 {
                assert!(pos[k] >= -0.5 * l && pos[k] < 0.5 * l);
            }
        }
        assert!(state.velocities().iter().all(|v| v.norm() == 0.0));
        assert!(state.forces().iter().all(|f| f.norm() == 0.0));
    }

    #[test]
    fn test_lattice_is_seeded() {
        let a = ParticleState::on_jittered_lattice(8, 5.0, 7);
        let b = ParticleState::on_jittered_lattice(8, 5.0, 7);
        let c = ParticleState::on_jittered_lattice(8, 5.0, 8);
        assert_eq!(a.positions(), b.positions());
        assert_ne!(a.positions(), c.positions());
    }

    #[test]
    fn test_lattice_sites_are_separated() {
        // Jitter is at most 0.3 spacing, so neighbours stay at least 0.7 spacing apart.
        let l = 10.0;
        let state = ParticleState::on_jittered_lattice(20, l, 1);
        let spacing = l / 3.0;
        let pos = state.positions();
        for i in 0..pos.len() {
            for j in (i + 1)..pos.len() {
                let d = minimum_image_vec(pos[j] - pos[i], l).norm();
                assert!(d > 0.69 * spacing, "pair {i},{j} too close: {d}");
            }
        }
    }

    #[test]
    fn test_maxwell_boltzmann_hits_target() {
        let kb = 0.831451115;
        let mut state = ParticleState::on_jittered_lattice(64, 20.0, 3);
        state.assign_maxwell_boltzmann(120.0, kb, 11);

        let v_cm: Vector3<f64> = state.velocities().iter().sum::<Vector3<f64>>() / 64.0;
        assert!(v_cm.norm() < 1e-10);

        let sum_v2: f64 = state.velocities().iter().map(|v| v.norm_squared()).sum();
        let t = sum_v2 / (3.0 * kb * 63.0);
        assert_relative_eq!(t, 120.0, max_relative = 1e-10);
    }

    #[test]
    fn test_load_frame_rewraps() {
        let mut state = ParticleState::on_jittered_lattice(2, 4.0, 0);
        let pos = vec![Vector3::new(3.0, 0.0, 0.0), Vector3::new(0.0, -5.0, 1.0)];
        let vel = vec![Vector3::new(1.0, 2.0, 3.0), Vector3::zeros()];
        state.load_frame(&pos, &vel);
        assert_relative_eq!(state.positions()[0].x, -1.0, epsilon = 1e-12);
        assert_relative_eq!(state.positions()[1].y, -1.0, epsilon = 1e-12);
        assert_eq!(state.velocities()[0], Vector3::new(1.0, 2.0, 3.0));
    }
}
