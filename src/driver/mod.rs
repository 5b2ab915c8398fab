//! Step loop: integrate, measure, thermostat, dump.
//!
//! The driver owns the integrator, the optional thermostat and the trajectory
//! sink, and borrows the particle state for the duration of a run.

use std::fmt;
use std::io;
use tracing::{debug, info, warn};

use crate::config::SimulationParameters;
use crate::diagnostics::{temperature, ForceStats};
use crate::io::{OpenMode, TrajectoryWriter};
use crate::lj_pot::LennardJones;
use crate::run_md::{Integrator, VelocityVerlet};
use crate::state::ParticleState;
use crate::thermostat::Berendsen;


/// Steps that are never checked for runaway temperature.
pub const WARMUP_STEPS: usize = 100;
/// A run is aborted once the temperature exceeds this multiple of the target.
pub const RUNAWAY_FACTOR: f64 = 1000.0;

/// Loop settings that are not part of the integrator or thermostat.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverOptions {
    pub nsteps: usize,
    pub dump_interval: usize,
    pub target_temperature: f64,
    pub k_boltzmann: f64,
    pub warmup_steps: usize,
    pub runaway_factor: f64,
    /// Steps between `INFO` log lines; the others go to `DEBUG`.
    pub log_every: usize,
}

impl From<&SimulationParameters> for DriverOptions {
    fn from(params: &SimulationParameters) -> Self {
        DriverOptions {
            nsteps: params.nsteps,
            dump_interval: params.dump_interval,
            target_temperature: params.target_temperature,
            k_boltzmann: params.k_boltzmann,
            warmup_steps: WARMUP_STEPS,
            runaway_factor: RUNAWAY_FACTOR,
            log_every: params.log_every,
        }
    }
}

/// How the step loop ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Termination {
    Completed,
    /// Temperature ran away at `step`.
    Aborted { step: usize, temperature: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub steps_run: usize,
    pub termination: Termination,
    pub final_temperature: f64,
    pub final_potential_energy: f64,
    pub frames_written: usize,
}

impl RunSummary {
    pub fn aborted(&self) -> bool {
        matches!(self.termination, Termination::Aborted { .. })
    }
}

/// One line of step output.
struct StepReport {
    step: usize,
    potential: f64,
    forces: ForceStats,
    temperature: f64,
    lambda: f64,
}

impl fmt::Display for StepReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Step {:6} Epot= {:15.5e} rms(F)= {:10.3e} min(F)= {:10.3e} max(F)= {:10.3e} T= {:15.6e} l= {:10.3e}",
            self.step,
            self.potential,
            self.forces.rms,
            self.forces.min,
            self.forces.max,
            self.temperature,
            self.lambda
        )
    }
}

pub struct SimulationDriver<I: Integrator, W: TrajectoryWriter> {
    integrator: I,
    thermostat: Option<Berendsen>,
    writer: W,
    options: DriverOptions,
}

impl<I: Integrator, W: TrajectoryWriter> SimulationDriver<I, W> {
    pub fn new(integrator: I, thermostat: Option<Berendsen>, writer: W, options: DriverOptions) -> Self {
        SimulationDriver {
            integrator,
            thermostat,
            writer,
            options,
        }
    }

    pub fn into_writer(self) -> W {
        self.writer
    }

    /// Run the configured number of steps on `state`.
    ///
    /// The trajectory is created with the starting frame, extended every
    /// `dump_interval` steps and closed with the last frame. A temperature
    /// runaway after the warm-up ends the loop early but is not an error;
    /// only trajectory I/O failures are.
    pub fn run(&mut self, state: &mut ParticleState) -> io::Result<RunSummary> {
        let opts = self.options.clone();
        let threshold = opts.runaway_factor * opts.target_temperature;

        let mut potential = self.integrator.prime(state);
        self.writer.write_frame(state, OpenMode::Create)?;
        let mut frames_written = 1;
        let mut last_dumped: Option<usize> = None;

        info!(
            "Starting MD: {} particles, {} steps, dt = {}, Epot(0) = {:.6e}",
            state.len(),
            opts.nsteps,
            self.integrator.dt(),
            potential
        );

        let mut termination = Termination::Completed;
        let mut current_temperature = temperature(state, opts.k_boltzmann);
        let mut steps_run = 0;

        for step in 0..opts.nsteps {
            potential = self.integrator.advance(state);
            let forces = ForceStats::compute(state);

            let (t, lambda) = match &self.thermostat {
                Some(thermostat) => {
                    let rescale = thermostat.apply(state);
                    (rescale.temperature, rescale.lambda)
                }
                None => (temperature(state, opts.k_boltzmann), 1.0),
            };
            current_temperature = t;
            steps_run = step + 1;

            let report = StepReport {
                step,
                potential,
                forces,
                temperature: t,
                lambda,
            };
            if step % opts.log_every == 0 {
                info!("{}", report);
            } else {
                debug!("{}", report);
            }

            if step > opts.warmup_steps && t > threshold {
                warn!(
                    "Temperature ran away at step {}: T = {:.6e} exceeds {:.6e}, stopping",
                    step, t, threshold
                );
                termination = Termination::Aborted { step, temperature: t };
                break;
            }

            if step % opts.dump_interval == 0 {
                self.writer.write_frame(state, OpenMode::Append)?;
                frames_written += 1;
                last_dumped = Some(step);
            }
        }

        let last_step = steps_run.checked_sub(1);
        if last_step.is_some() && last_step != last_dumped {
            self.writer.write_frame(state, OpenMode::Append)?;
            frames_written += 1;
        }

        let summary = RunSummary {
            steps_run,
            termination,
            final_temperature: current_temperature,
            final_potential_energy: potential,
            frames_written,
        };
        match summary.termination {
            Termination::Completed => info!(
                "MD finished after {} steps: T = {:.6e}, Epot = {:.6e}",
                summary.steps_run, summary.final_temperature, summary.final_potential_energy
            ),
            Termination::Aborted { step, .. } => {
                warn!("MD aborted at step {}; {} frames kept", step, summary.frames_written)
            }
        }
        Ok(summary)
    }
}

/// Force field described by the parameters.
pub fn force_field(params: &SimulationParameters, parallel: bool) -> LennardJones {
    LennardJones::new(params.epsilon, params.sigma, params.cutoff, params.tolerance)
        .with_convention(params.energy)
        .with_parallel(parallel)
}

/// Berendsen thermostat, or `None` when switched off.
pub fn thermostat(params: &SimulationParameters) -> Option<Berendsen> {
    params.thermostat.then(|| {
        Berendsen::new(
            params.target_temperature,
            params.tau,
            params.dt,
            params.k_boltzmann,
        )
    })
}

/// Driver wired up with velocity-Verlet and the LJ force field.
pub fn build_driver<W: TrajectoryWriter>(
    params: &SimulationParameters,
    writer: W,
    parallel: bool,
) -> SimulationDriver<VelocityVerlet<LennardJones>, W> {
    let integrator = VelocityVerlet::new(force_field(params, parallel), params.dt);
    SimulationDriver::new(integrator, thermostat(params), writer, DriverOptions::from(params))
}
