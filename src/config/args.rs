//! Command-line argument parsing for MD runs

use clap::Parser;

/// Lennard-Jones molecular dynamics in a periodic cubic box
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the parameter file (`key value` lines, or YAML for .yaml/.yml)
    #[arg(short, long, default_value = "conf.dat")]
    pub config_file: String,

    /// Write the log to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<String>,

    /// Override the number of MD steps
    #[arg(long)]
    pub nsteps: Option<usize>,

    /// Override the trajectory file
    #[arg(long)]
    pub dump_file: Option<String>,

    /// Start from the last frame of an existing trajectory
    #[arg(long)]
    pub restart: Option<String>,

    /// Relax the starting configuration with steepest descent first
    #[arg(long)]
    pub minimize: bool,

    /// Evaluate forces on all cores
    #[arg(long)]
    pub parallel: bool,

    /// Log every step
    #[arg(short, long)]
    pub verbose: bool,
}
