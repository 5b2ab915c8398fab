//! MD Command-Line Interface
//!
//! Reads a parameter file, builds the starting configuration and runs
//! velocity-Verlet dynamics with a Berendsen thermostat.

use clap::Parser;
use color_eyre::eyre::{eyre, Result, WrapErr};
use tracing::{info, warn};

use ljmd::config::{Args, SimulationParameters};
use ljmd::driver::{build_driver, force_field};
use ljmd::io::{read_last_frame, setup_output, DumpFile};
use ljmd::minimize::SteepestDescent;
use ljmd::ParticleState;

fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    setup_output(args.output.as_ref(), args.verbose);

    info!("Reading parameters from: {}", args.config_file);
    let mut params = SimulationParameters::from_file(&args.config_file)
        .wrap_err_with(|| format!("Unable to load parameters from {}", args.config_file))?;
    apply_overrides(&mut params, &args);
    info!("Parameters loaded:\n{:#?}", params);

    if params.cutoff > 0.5 * params.box_length {
        warn!(
            "LJ_cutoff {} exceeds half the box ({}); only the nearest image interacts",
            params.cutoff,
            0.5 * params.box_length
        );
    }

    let mut state = initial_state(&params, &args)?;

    if params.minimize {
        let lj = force_field(&params, args.parallel);
        let relaxed = SteepestDescent::new(&lj, params.sd_step, params.sd_threshold, params.sd_max_steps)
            .minimize(&mut state);
        info!(
            "Relaxed in {} iterations: Epot = {:.6e}, max|F| = {:.4e}",
            relaxed.iterations, relaxed.energy, relaxed.max_force
        );
    }

    let writer = DumpFile::new(&params.dump_file);
    let mut driver = build_driver(&params, writer, args.parallel);
    let summary = driver
        .run(&mut state)
        .wrap_err_with(|| format!("Failed writing trajectory {}", params.dump_file))?;

    if summary.aborted() {
        warn!(
            "Run stopped early after {} steps; trajectory kept in {}",
            summary.steps_run, params.dump_file
        );
    }
    info!("{} frames written to {}", summary.frames_written, params.dump_file);

    Ok(())
}

fn apply_overrides(params: &mut SimulationParameters, args: &Args) {
    if let Some(nsteps) = args.nsteps {
        info!("Overriding nsteps with: {}", nsteps);
        params.nsteps = nsteps;
    }
    if let Some(ref dump_file) = args.dump_file {
        info!("Overriding dump_file with: {}", dump_file);
        params.dump_file = dump_file.clone();
    }
    if args.minimize {
        params.minimize = true;
    }
}

/// Fresh jittered lattice, or the last frame of a previous trajectory.
fn initial_state(params: &SimulationParameters, args: &Args) -> Result<ParticleState> {
    let mut state = ParticleState::on_jittered_lattice(params.n_atoms, params.box_length, params.seed);

    match args.restart {
        Some(ref path) => {
            let frame = read_last_frame(path)
                .wrap_err_with(|| format!("Unable to read restart frame from {}", path))?;
            if frame.positions.len() != params.n_atoms {
                return Err(eyre!(
                    "Restart frame has {} particles but natoms is {}",
                    frame.positions.len(),
                    params.n_atoms
                ));
            }
            if (frame.box_length - params.box_length).abs() > 1e-4 * params.box_length {
                warn!(
                    "Restart frame box {} differs from lattice {}; using the parameter file",
                    frame.box_length, params.box_length
                );
            }
            state.load_frame(&frame.positions, &frame.velocities);
            info!("Restarted from last frame of {}", path);
        }
        None => {
            if params.initial_temperature > 0.0 {
                state.assign_maxwell_boltzmann(
                    params.initial_temperature,
                    params.k_boltzmann,
                    params.velocity_seed(),
                );
                info!("Initial velocities drawn at T = {}", params.initial_temperature);
            }
        }
    }

    Ok(state)
}
