//! Input/Output for MD runs
//!
//! This module handles trajectory dumps and logging setup.

mod output;
pub mod trajectory;

pub use output::setup_output;
pub use trajectory::{read_last_frame, DumpFile, Frame, OpenMode, TrajectoryWriter};
