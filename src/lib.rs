// Lennard-Jones molecular dynamics in a periodic cubic box

pub mod config;
pub mod diagnostics;
pub mod driver;
pub mod io;
pub mod lj_pot;
pub mod minimize;
pub mod run_md;
pub mod state;
pub mod thermostat;

pub use config::{ConfigError, SimulationParameters};
pub use driver::{build_driver, RunSummary, SimulationDriver, Termination};
pub use lj_pot::{EnergyConvention, ForceProvider, LennardJones};
pub use run_md::{Integrator, VelocityVerlet};
pub use state::ParticleState;
pub use thermostat::Berendsen;
